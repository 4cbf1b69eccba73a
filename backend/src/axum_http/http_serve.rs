use crate::{
    axum_http::{
        admin_guard::ADMIN_SECRET_HEADER,
        default_routers,
        error_responses::{json_error_responses, panic_response},
        routers,
    },
    config::config_model::DotEnvyConfig,
};
use anyhow::Result;
use axum::{
    Router,
    http::{HeaderName, Method, header::CONTENT_TYPE},
    middleware,
    routing::get,
};
use crates::infra::db::postgres::postgres_connection::PgPoolSquad;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

pub fn app(config: &DotEnvyConfig, db_pool: Arc<PgPoolSquad>) -> Result<Router> {
    Ok(Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/subscriptions",
            routers::subscriptions::routes(Arc::clone(&db_pool), config.admin.clone()),
        )
        .nest("/costs", routers::costs::routes(Arc::clone(&db_pool)))
        .route("/health-check", get(default_routers::health_check))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TimeoutLayer::new(Duration::from_secs(config.server.timeout)))
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes()?))
        .layer(middleware::map_response(json_error_responses))
        .layer(
            CorsLayer::new()
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                ])
                .allow_headers([CONTENT_TYPE, HeaderName::from_static(ADMIN_SECRET_HEADER)])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http()))
}

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let app = app(&config, db_pool)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config_model::{AdminSecret, Database, Server};
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header::CONTENT_LENGTH},
    };
    use diesel::{
        PgConnection,
        r2d2::{ConnectionManager, Pool},
    };
    use tower::ServiceExt;

    fn test_config() -> DotEnvyConfig {
        DotEnvyConfig {
            server: Server {
                port: 0,
                body_limit: 1,
                timeout: 5,
            },
            database: Database {
                url: "postgres://localhost/unused".to_string(),
                max_connections: 1,
            },
            admin: AdminSecret {
                secret: "s3cr3t".to_string(),
            },
        }
    }

    fn lazy_pool(config: &DotEnvyConfig) -> Arc<PgPoolSquad> {
        // Never connects: handlers under test do not touch the store.
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(0))
            .build_unchecked(ConnectionManager::<PgConnection>::new(
                config.database.url.clone(),
            ));
        Arc::new(pool)
    }

    fn test_app() -> Router {
        let config = test_config();
        app(&config, lazy_pool(&config)).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let content_type = response.headers()[CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("application/json"), "{content_type}");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_check_is_ok() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/health-check")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let response = test_app()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Not Found");
    }

    #[tokio::test]
    async fn admin_listing_is_guarded_when_nested() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/subscriptions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn oversized_body_is_json_413() {
        let payload = vec![b'a'; 2 * 1024 * 1024];
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/subscriptions")
                    .header(CONTENT_TYPE, "application/json")
                    .header(CONTENT_LENGTH, payload.len())
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(response).await["error"], "Payload Too Large");
    }

    #[tokio::test]
    async fn unrouted_method_is_json_405() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/subscriptions/1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json_body(response).await["error"], "Method Not Allowed");
    }

    #[tokio::test]
    async fn timed_out_request_is_json_408() {
        async fn slow() -> &'static str {
            tokio::time::sleep(Duration::from_secs(60)).await;
            "late"
        }

        let app = Router::new()
            .route("/slow", get(slow))
            .layer(TimeoutLayer::new(Duration::from_millis(10)))
            .layer(middleware::map_response(json_error_responses));

        let response = app
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(json_body(response).await["error"], "Request Timeout");
    }

    #[test]
    fn overflowing_body_limit_is_a_config_error() {
        let mut config = test_config();
        config.server.body_limit = u64::MAX;

        assert!(app(&config, lazy_pool(&config)).is_err());
    }
}
