use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use movie_gateway::config::{Config, LogFormat};

#[derive(Parser, Debug)]
#[command(name = "movie-gateway")]
#[command(about = "HTTP gateway for the Douban movie API", long_about = None)]
struct Args {
    /// Optional YAML config file; environment variables override it.
    #[arg(short, long)]
    config: Option<String>,
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    config.debug_logs = args.debug;

    let default_filter = if args.debug {
        "movie_gateway=debug,tower_http=debug"
    } else {
        "movie_gateway=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match config.logformat {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    if let Err(e) = movie_gateway::run(config).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
