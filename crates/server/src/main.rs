#[tokio::main]
async fn main() -> anyhow::Result<()> {
    botfather_server::start().await
}
