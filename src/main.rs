use clap::Parser;

use brewauth::cli::{run_command, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    brewauth::logging::init(if cli.verbose { "debug" } else { "info" });

    if let Err(e) = run_command(cli.command).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
