use clap::Parser;

use graph_file_proxy::{Cli, run_server};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logging may not be up yet when startup fails
    if let Err(e) = run_server(cli).await {
        eprintln!("graph-file-proxy failed to start: {:#}", e);
        std::process::exit(1);
    }
}
