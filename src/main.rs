#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dbchat::run().await
}
