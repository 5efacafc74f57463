//! device-grant CLI binary entry point.

use device_grant::cli::{auth, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();

    let result = match cli.load_config() {
        Ok(config) => match &cli.command {
            Commands::Login(args) => auth::handle_login(&config, &cli.profile, args).await,
            Commands::Status => auth::handle_status(&config, &cli.profile).await,
            Commands::Logout => auth::handle_logout(&config, &cli.profile).await,
        },
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
