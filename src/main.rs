use clap::Parser;
use sitegen::server;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "gen-server")]
#[command(about = "Serve a generated site, gzipped files included")]
#[command(long_about = "\
Serve a generated site from a directory

Files that start with the gzip magic bytes are sent with
`Content-Encoding: gzip`, so a site written by the gzip transform is served
without decompressing it. Paths without an extension are served the
`index.html` inside them.

Set RUST_LOG to change the log level (default: info).")]
#[command(version)]
struct Cli {
    /// Port to serve from
    #[arg(long)]
    port: Option<u16>,

    /// Directory with static files
    #[arg(long)]
    directory: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    let Some(port) = cli.port else {
        tracing::error!("must pass --port to serve from");
        return ExitCode::FAILURE;
    };
    let Some(directory) = cli.directory else {
        tracing::error!("must pass --directory with static files");
        return ExitCode::FAILURE;
    };

    match server::serve(port, directory).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
