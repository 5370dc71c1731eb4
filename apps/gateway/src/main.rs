#[tokio::main]
async fn main() {
    if let Err(err) = gateway::server::run().await {
        tracing::error!(?err, "gateway exited with error");
        std::process::exit(1);
    }
}
