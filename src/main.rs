use std::{io::stdout, path::PathBuf, process::ExitCode, sync::Arc};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tidepool::{
    config::{context::build_context, schema::load_config},
    frontend::http::run_server,
    utils::run_one_off_command,
};

const DEFAULT_LOG_FILTER: &str = "tidepool=info,warp=info";

#[derive(Debug, Parser)]
#[clap(name = "tidepool", about, version)]
struct Args {
    #[clap(
        short,
        long,
        default_value = "tidepool.toml",
        help = "Path to the config file (optional, environment variables take precedence)"
    )]
    config_path: PathBuf,

    #[clap(long, help = "Emit logs as JSON")]
    json_logs: bool,

    #[clap(
        long,
        help = "Run the given SQL, print each result row as a JSON line and exit"
    )]
    one_off: Option<String>,
}

fn prepare_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // Logs go to stderr so that one-off results on stdout stay machine-readable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    prepare_tracing(args.json_logs);

    info!("Starting tidepool {}", env!("CARGO_PKG_VERSION"));

    let config = match load_config(&args.config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading the config from {:?}: {e}", args.config_path);
            return ExitCode::FAILURE;
        }
    };

    let context = match build_context(&config).await {
        Ok(context) => Arc::new(context),
        Err(e) => {
            error!("Error connecting to the database: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(one_off_cmd) = args.one_off {
        return match run_one_off_command(context.repository.clone(), &one_off_cmd, stdout())
            .await
        {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Error running the one-off command: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error listening for Ctrl-C, the server has to be killed: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl-C, shutting down");
    };

    match run_server(context, config.frontend.http, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
