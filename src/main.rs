use budget_assistant::api::{run_all, run_gateway, run_service};
use budget_assistant::config::{Cli, Command};
use budget_assistant::logging::init_tracing;
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    let result = match cli.command {
        Command::Gateway(config) => run_gateway(config).await,
        Command::Service(args) => run_service(args.kind, &args.host, args.port()).await,
        Command::ServeAll(config) => run_all(config).await,
    };

    if let Err(e) = result {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
