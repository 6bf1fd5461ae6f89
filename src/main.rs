#[tokio::main]
async fn main() {
    bloomiq_lib::init_tracing();

    if let Err(e) = bloomiq_lib::run().await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
