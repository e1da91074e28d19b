#[tokio::main]
async fn main() {
    if let Err(e) = gemchat::cli::run().await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
