#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    alice_cli::run().await
}
