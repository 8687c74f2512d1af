#[tokio::main]
async fn main() {
    if torii::provider::main().await.is_err() {
        std::process::exit(1);
    }
}
