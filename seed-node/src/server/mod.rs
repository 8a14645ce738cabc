//! Websocket subscription server.
pub mod handlers;
pub mod state;

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use axum::http::Method;
use axum::routing::get;
use seed_node_pipeline::SeedNodeApi;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use self::state::AppState;
use crate::errors::SeedNodeError;

fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
}

/// Create the Axum application router with all routes and middleware
pub fn create_app(api: SeedNodeApi) -> Router {
    let state = AppState { api };

    Router::new()
        .route("/stream", get(handlers::stream_handler))
        .route("/health", get(handlers::health_check))
        .layer(create_cors_layer())
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` resolves.
pub async fn run_server(
    app: Router,
    listener: tokio::net::TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), SeedNodeError> {
    let addr: SocketAddr = listener.local_addr()?;
    info!(%addr, "Server listening");
    info!("- Stream endpoint: ws://{}/stream", addr);
    info!("- Health endpoint: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use ipfs::MockIpfsClient;
    use seed_node_pipeline::{Service, ServiceConfig, ServiceDependencies};
    use seed_node_repository::CidIndexSource;

    use super::*;

    async fn api() -> (Arc<Service>, SeedNodeApi) {
        let index = CidIndexSource::mock().into_index().await.unwrap();
        let deps = ServiceDependencies::eth(index, Arc::new(MockIpfsClient::new()));
        let service = Arc::new(Service::new(deps, ServiceConfig::default()));
        (service.clone(), SeedNodeApi::new(service))
    }

    #[tokio::test]
    async fn test_health_check() {
        let (service, api) = api().await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = service.cancellation_token().cancelled_owned();
        let server = tokio::spawn(run_server(create_app(api), listener, shutdown));

        let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        service.stop();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_stream_requires_upgrade() {
        let (service, api) = api().await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = service.cancellation_token().cancelled_owned();
        tokio::spawn(run_server(create_app(api), listener, shutdown));

        let response = reqwest::get(format!("http://{addr}/stream")).await.unwrap();
        assert!(response.status().is_client_error());
        assert_eq!(service.subscriber_count(), 0);
        service.stop();
    }
}
