#[tokio::main]
async fn main() {
    dartsight_lib::init_tracing();
    if let Err(e) = dartsight_lib::run().await {
        tracing::error!(error = %e, "dartsight exited with error");
        std::process::exit(1);
    }
}
