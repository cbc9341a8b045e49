#[tokio::main]
async fn main() {
    if let Err(err) = toolbench::mcp::server::run_stdio().await {
        eprintln!("toolbench: {}", err);
        std::process::exit(1);
    }
}
