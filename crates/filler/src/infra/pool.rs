use {
    chain::StateMachine,
    futures::future::BoxFuture,
    std::{collections::HashMap, sync::Arc},
    thiserror::Error,
    tokio::{
        sync::{Semaphore, mpsc},
        task::JoinHandle,
    },
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("no execution pool for chain {0}")]
    MissingChain(StateMachine),
    #[error("pool is shutting down")]
    Closed,
}

/// The bounded pool order analysis runs on. Admission is FIFO (the tokio
/// semaphore is fair); completion is unordered.
pub struct AnalysisPool {
    permits: Arc<Semaphore>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl AnalysisPool {
    pub fn new(limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            tasks: Default::default(),
        }
    }

    /// Schedules a task. It starts once one of the pool's permits frees up.
    pub fn spawn(&self, task: impl Future<Output = ()> + Send + 'static) {
        let permits = self.permits.clone();
        let handle = tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                // Pool closed during shutdown; drop the task.
                return;
            };
            task.await;
        });
        let mut tasks = self.tasks.lock().unwrap();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Waits for every scheduled task to finish, including tasks scheduled
    /// by tasks that were already draining.
    pub async fn drain(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                let _ = task.await;
            }
        }
    }
}

type Job = BoxFuture<'static, ()>;

/// One serial worker per destination chain. Jobs submitted to a chain run
/// strictly in submission order, which is what keeps the filler account's
/// nonces straight.
pub struct ChainPools {
    workers: HashMap<StateMachine, mpsc::UnboundedSender<Job>>,
    tasks: Vec<JoinHandle<()>>,
}

impl ChainPools {
    pub fn new(chains: impl IntoIterator<Item = StateMachine>) -> Self {
        let mut workers = HashMap::new();
        let mut tasks = Vec::new();
        for chain in chains {
            let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
            tasks.push(tokio::spawn(async move {
                while let Some(job) = receiver.recv().await {
                    job.await;
                }
            }));
            workers.insert(chain, sender);
        }
        Self { workers, tasks }
    }

    /// Enqueues a job on the chain's serial worker.
    pub fn submit(
        &self,
        chain: &StateMachine,
        job: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), Error> {
        let worker = self
            .workers
            .get(chain)
            .ok_or_else(|| Error::MissingChain(chain.clone()))?;
        worker.send(Box::pin(job)).map_err(|_| Error::Closed)
    }

    /// Closes submission and waits until every queued job has run.
    pub async fn drain(mut self) {
        self.workers.clear();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        std::{
            sync::Mutex,
            time::Duration,
        },
    };

    #[tokio::test]
    async fn chain_pool_runs_jobs_in_submission_order() {
        let pools = ChainPools::new([StateMachine::Evm(1)]);
        let trace = Arc::new(Mutex::new(Vec::new()));
        for index in 0..10u64 {
            let trace = trace.clone();
            pools
                .submit(&StateMachine::Evm(1), async move {
                    // Later jobs finish faster; order must still hold.
                    tokio::time::sleep(Duration::from_millis(10 - index)).await;
                    trace.lock().unwrap().push(index);
                })
                .unwrap();
        }
        pools.drain().await;
        assert_eq!(*trace.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn chain_pools_are_independent() {
        let pools = ChainPools::new([StateMachine::Evm(1), StateMachine::Evm(2)]);
        let trace = Arc::new(Mutex::new(Vec::new()));

        let slow = trace.clone();
        pools
            .submit(&StateMachine::Evm(1), async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                slow.lock().unwrap().push("slow");
            })
            .unwrap();
        let fast = trace.clone();
        pools
            .submit(&StateMachine::Evm(2), async move {
                fast.lock().unwrap().push("fast");
            })
            .unwrap();

        pools.drain().await;
        assert_eq!(*trace.lock().unwrap(), vec!["fast", "slow"]);
    }

    #[tokio::test]
    async fn unknown_chain_is_rejected() {
        let pools = ChainPools::new([StateMachine::Evm(1)]);
        assert!(matches!(
            pools.submit(&StateMachine::Evm(2), async {}),
            Err(Error::MissingChain(_))
        ));
    }

    #[tokio::test]
    async fn analysis_pool_bounds_concurrency() {
        let pool = AnalysisPool::new(2);
        let running = Arc::new(Mutex::new((0usize, 0usize))); // (current, peak)
        for _ in 0..8 {
            let running = running.clone();
            pool.spawn(async move {
                {
                    let mut state = running.lock().unwrap();
                    state.0 += 1;
                    state.1 = state.1.max(state.0);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.lock().unwrap().0 -= 1;
            });
        }
        pool.drain().await;
        let (current, peak) = *running.lock().unwrap();
        assert_eq!(current, 0);
        assert!(peak <= 2, "peak concurrency {peak} exceeded the bound");
    }
}
