#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cert_anchor::server::run().await
}
