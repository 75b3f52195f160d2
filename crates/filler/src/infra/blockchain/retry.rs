use {
    std::{fmt::Display, future::Future, time::Duration},
    thiserror::Error,
};

/// How often a single RPC is attempted before giving up.
pub const MAX_ATTEMPTS: u32 = 3;
/// Fixed pause between attempts.
pub const BACKOFF: Duration = Duration::from_millis(250);

/// A transient RPC error that survived every retry.
#[derive(Debug, Error)]
#[error("{label} failed after {attempts} attempts: {last}")]
pub struct RpcExhausted {
    pub label: &'static str,
    pub attempts: u32,
    pub last: String,
}

/// Runs an RPC operation with a bounded retry budget. Transient errors are
/// logged and retried after a fixed backoff; the final error is returned as
/// [`RpcExhausted`].
pub async fn rpc<T, E, F, Fut>(label: &'static str, mut op: F) -> Result<T, RpcExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut last = String::new();
    for attempt in 1..=MAX_ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::warn!(label, attempt, %err, "rpc attempt failed");
                last = err.to_string();
                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(BACKOFF).await;
                }
            }
        }
    }
    Err(RpcExhausted {
        label,
        attempts: MAX_ATTEMPTS,
        last,
    })
}

#[cfg(test)]
mod test {
    use {
        super::*,
        std::sync::atomic::{AtomicU32, Ordering},
    };

    #[tokio::test(start_paused = true)]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = rpc("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = rpc("test", || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err("boom".to_string())
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn backs_off_between_attempts() {
        let start = tokio::time::Instant::now();
        let _: Result<(), _> = rpc("test", || async { Err("boom".to_string()) }).await;
        // two pauses for three attempts
        assert_eq!(start.elapsed(), BACKOFF * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = rpc("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("boom".to_string()) }
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.attempts, MAX_ATTEMPTS);
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
        assert!(err.to_string().contains("boom"));
    }
}
