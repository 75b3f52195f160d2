#[tokio::main]
async fn main() {
    filler::start(std::env::args()).await;
}
