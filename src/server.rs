//! HTTP surface: health endpoints, optionally sharing a port with the webhook.

use axum::Router;
use axum::routing::{MethodFilter, on};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Paths answered by [`health_router`]. Nothing else may be mounted on them.
pub const HEALTH_PATHS: [&str; 2] = ["/", "/health"];

async fn root() -> axum::Json<Value> {
    axum::Json(json!({"status": "ok", "message": "Telegram bot webhook is running!"}))
}

async fn health() -> axum::Json<Value> {
    axum::Json(json!({"status": "ok", "message": "healthy"}))
}

/// `/` and `/health`, answering GET, HEAD and POST.
pub fn health_router() -> Router {
    let methods = MethodFilter::GET.or(MethodFilter::HEAD).or(MethodFilter::POST);
    Router::new()
        .route(HEALTH_PATHS[0], on(methods, root))
        .route(HEALTH_PATHS[1], on(methods, health))
}

/// Serves `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match listener.local_addr() {
        Ok(addr) => info!("🌐 HTTP listening on {}", addr),
        Err(e) => error!("HTTP listener has no local address: {e}"),
    }

    if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(shutdown).await {
        error!("HTTP server stopped: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn_health() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, health_router(), std::future::pending()));
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_health_get() {
        let base = spawn_health().await;
        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"status": "ok", "message": "healthy"}));
    }

    #[tokio::test]
    async fn test_root_accepts_post_and_head() {
        let base = spawn_health().await;
        let client = reqwest::Client::new();

        let post = client.post(format!("{base}/")).send().await.unwrap();
        assert!(post.status().is_success());
        let body: Value = post.json().await.unwrap();
        assert_eq!(body["status"], "ok");

        let head = client.head(format!("{base}/health")).send().await.unwrap();
        assert!(head.status().is_success());
    }

    #[test]
    fn test_merges_with_webhook_route_off_health_paths() {
        let webhook = Router::new().route("/webhook", axum::routing::post(|| async {}));
        let _ = webhook.merge(health_router());
    }

    #[test]
    #[should_panic]
    fn test_webhook_on_health_path_conflicts() {
        let webhook = Router::new().route("/", axum::routing::post(|| async {}));
        let _ = webhook.merge(health_router());
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let base = spawn_health().await;
        let resp = reqwest::get(format!("{base}/nope")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
