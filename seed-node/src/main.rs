use dotenv::dotenv;
use seed_node::server::{create_app, run_server};
use seed_node::{Config, Dependencies};
use seed_node_pipeline::errors::ServiceError;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "seed_node=info,seed_node_pipeline=info,seed_node_repository=info".into()
            }),
        )
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .json(),
        )
        .init();
}

/// Main entry point for the seed node.
///
/// Loads configuration, wires the pipeline, starts ingestion, the optional
/// gap repair loop and the subscription server, and runs until ctrl-c or a
/// fatal upstream failure.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    let dependencies = Dependencies::new(&config).await?;
    let service = dependencies.service;

    let mut ingest = service.start(&dependencies.streamer)?;
    info!(workers = config.workers, "Seed node started");

    let backfill = dependencies.backfill.map(|backfill| tokio::spawn(backfill.run()));

    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;
    let shutdown = service.cancellation_token().cancelled_owned();
    let server = tokio::spawn(run_server(create_app(dependencies.api), listener, shutdown));

    let outcome: Result<(), ServiceError> = tokio::select! {
        result = &mut ingest => result.unwrap_or_else(|e| Err(ServiceError::from(e))),
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            Ok(())
        }
    };

    service.stop();
    if let Err(e) = server.await? {
        error!(error = %e, "Server exited with an error");
    }
    if let Some(backfill) = backfill {
        backfill.await?;
    }
    info!("Seed node stopped");

    outcome?;
    Ok(())
}
