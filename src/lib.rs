pub mod cache;
pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod domain;
pub mod library;
pub mod parser;
pub mod scheduler;
pub mod services;
pub mod state;

use std::sync::Arc;
use tokio::signal;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, cmd_init, cmd_monitor, cmd_scan, cmd_schedule, cmd_unignore};
pub use config::Config;
use scheduler::Scheduler;
use state::RefreshContext;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    cli.refresh.apply_to(&mut config);

    init_tracing(&config)?;

    let command = cli.command.unwrap_or(Commands::Scan);
    match command {
        Commands::Init => return cmd_init(),
        Commands::Unignore { title_id } => return cmd_unignore(&config, &title_id).await,
        Commands::Scan | Commands::Schedule | Commands::Monitor => {}
    }

    config.validate()?;

    let ctx = Arc::new(
        RefreshContext::new(config)
            .await
            .context("Failed to initialize refresh context")?,
    );
    let scheduler = Scheduler::new(ctx);

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    match command {
        Commands::Schedule => cmd_schedule(&scheduler, cancel).await,
        Commands::Monitor => cmd_monitor(&scheduler, cancel).await,
        _ => cmd_scan(&scheduler, &cancel).await,
    }
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let mut builder = tracing_loki::builder();
        for (key, value) in &config.observability.loki_labels {
            builder = builder.label(key, value)?;
        }
        let (layer, task) = builder.build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Error listening for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Error listening for shutdown: {}", e);
                return;
            }
        }
        () = terminate => {}
    }

    info!("Shutdown signal received");
    cancel.cancel();
}
