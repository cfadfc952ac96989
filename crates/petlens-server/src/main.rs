use anyhow::Context;
use clap::Parser;
use petlens_server::cli::{Cli, Commands};
use petlens_server::server::run_server;
use petlens_server::settings::AppConfig;
use petlens_server::state::AppState;
use petlens_server::telemetry::{init_logging, init_metrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            model,
            listen,
            port,
            verbose,
            log_json,
        } => {
            init_logging(verbose, log_json);

            let mut overrides = model.overrides();
            overrides.host = listen;
            overrides.port = port;

            let config = AppConfig::load(&model.config, &overrides)?;
            let addr = config.server.socket_addr()?;

            tracing::info!("Starting petlens v{}", env!("CARGO_PKG_VERSION"));
            tracing::info!("Model source: {}", config.model.source);

            let metrics_handle = init_metrics()?;
            let state = AppState::load(config).await?.with_metrics(metrics_handle);

            run_server(state, addr).await?;
        }

        Commands::Classify {
            image,
            model,
            verbose,
        } => {
            init_logging(verbose, false);

            let config = AppConfig::load(&model.config, &model.overrides())?;
            let state = AppState::load(config).await?;
            let classifier = state.classifier.clone().with_context(|| {
                format!(
                    "Model not found at {}; nothing to classify with",
                    state.config.model.source
                )
            })?;

            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("Failed to read {}", image.display()))?;
            let prediction = classifier.classify(&bytes).await?;

            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }

        Commands::Config { model } => {
            let config = AppConfig::load(&model.config, &model.overrides())?;
            print!("{}", config.to_yaml()?);
        }
    }

    Ok(())
}
