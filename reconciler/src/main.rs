#[tokio::main]
async fn main() -> anyhow::Result<()> {
    reconciler::run_cli().await
}
