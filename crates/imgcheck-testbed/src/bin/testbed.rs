//! Standalone testbed server: a simulated image-service deployment to run
//! the validation suite (or manual checks) against.

use clap::Parser;
use imgcheck_testbed::{TestbedOptions, start_server};

#[derive(Parser)]
#[command(name = "imgcheck-testbed")]
#[command(about = "Simulated image-service deployment for the validation suite")]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "8774")]
    port: u16,
    /// Deployment release, e.g. "bionic_queens" or "focal_ussuri".
    #[arg(long)]
    release: Option<String>,
    /// Options file (JSON or YAML); flags override its values.
    #[arg(long)]
    options: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() {
    imgcheck::telemetry::init();
    let cli = Cli::parse();

    let mut options = match &cli.options {
        Some(path) => TestbedOptions::from_path(path).unwrap_or_else(|error| {
            eprintln!("{error}");
            std::process::exit(1);
        }),
        None => TestbedOptions::default(),
    };
    if let Some(release) = &cli.release {
        options.release = release.parse().unwrap_or_else(|error| {
            eprintln!("{error}");
            std::process::exit(1);
        });
    }

    if let Err(error) = start_server(cli.port, &options).await {
        eprintln!("{error}");
        std::process::exit(1);
    }
}
