#[tokio::main]
async fn main() -> anyhow::Result<()> {
    light_controller::app::run().await
}
