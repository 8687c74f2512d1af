#[tokio::main]
async fn main() {
    if torii::rp::main().await.is_err() {
        std::process::exit(1);
    }
}
