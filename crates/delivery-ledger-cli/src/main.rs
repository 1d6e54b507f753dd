use delivery_ledger_cli::run_cli;
use tracing::error;

#[tokio::main]
async fn main() {
    // Run CLI and handle errors
    if let Err(e) = run_cli().await {
        error!("CLI error: {}", e);
        eprintln!("error: {e}");

        // Exit with appropriate code based on error type
        let exit_code = match e {
            delivery_ledger_cli::CliError::Configuration(_) => 1,
            delivery_ledger_cli::CliError::Service(_) => 2,
            delivery_ledger_cli::CliError::CommandFailed { .. } => 3,
            delivery_ledger_cli::CliError::Io(_) => 4,
            delivery_ledger_cli::CliError::Store(_) => 5,
        };

        std::process::exit(exit_code);
    }
}
