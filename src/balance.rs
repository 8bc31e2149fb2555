//! Balance lookup against the transport card-status API.
//!
//! One POST per check, no retries. Every failure collapses into
//! [`BalanceResult::Unavailable`] so a broken API never leaks into a chat.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::conversation::CardNumber;

/// Shown instead of a trip count when the API has nothing usable.
pub const NO_ACTIVE_PASS: &str = "⚠️ No active pass found on this card";

/// Outcome of a single balance check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceResult {
    Trips(String),
    Unavailable,
}

impl fmt::Display for BalanceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceResult::Trips(trips) => f.write_str(trips),
            BalanceResult::Unavailable => f.write_str(NO_ACTIVE_PASS),
        }
    }
}

/// Something that can report the remaining trips on a card.
#[async_trait]
pub trait BalanceLookup: Send + Sync {
    async fn check_balance(&self, card: &CardNumber) -> BalanceResult;
}

#[derive(Debug)]
pub enum LookupError {
    Http(String),
    Status(u16),
    Parse(String),
    MissingSubscription,
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::Http(e) => write!(f, "HTTP error: {e}"),
            LookupError::Status(code) => write!(f, "API returned status {code}"),
            LookupError::Parse(e) => write!(f, "Parse error: {e}"),
            LookupError::MissingSubscription => {
                write!(f, "No subscription with TripsLeft in response")
            }
        }
    }
}

impl std::error::Error for LookupError {}

#[derive(Serialize)]
struct CardStatusRequest<'a> {
    card_number: &'a str,
}

/// HTTP client for the card-status endpoint.
pub struct BalanceClient {
    url: reqwest::Url,
    client: reqwest::Client,
}

impl BalanceClient {
    pub fn new(url: reqwest::Url, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Http(e.to_string()))?;

        Ok(Self { url, client })
    }

    async fn fetch(&self, card: &CardNumber) -> Result<String, LookupError> {
        let response = self
            .client
            .post(self.url.clone())
            .header("Content-Type", "application/json")
            .json(&CardStatusRequest { card_number: card.as_str() })
            .send()
            .await
            .map_err(|e| LookupError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LookupError::Parse(e.to_string()))?;

        trips_left(&body)
    }
}

#[async_trait]
impl BalanceLookup for BalanceClient {
    async fn check_balance(&self, card: &CardNumber) -> BalanceResult {
        match self.fetch(card).await {
            Ok(trips) => {
                info!("Balance for card {}: {}", card.masked(), trips);
                BalanceResult::Trips(trips)
            }
            Err(e) => {
                warn!("Balance check failed for card {}: {}", card.masked(), e);
                BalanceResult::Unavailable
            }
        }
    }
}

/// Extracts `card_status.Subscriptions[0].TripsLeft` as text.
fn trips_left(body: &Value) -> Result<String, LookupError> {
    let value = body
        .get("card_status")
        .and_then(|status| status.get("Subscriptions"))
        .and_then(|subs| subs.get(0))
        .and_then(|sub| sub.get("TripsLeft"))
        .ok_or(LookupError::MissingSubscription)?;

    match value {
        Value::Null => Err(LookupError::MissingSubscription),
        Value::String(s) => Ok(s.clone()),
        other => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn card() -> CardNumber {
        CardNumber::parse("1234567890123456").unwrap()
    }

    /// Serves `router` on an ephemeral local port and returns its base URL.
    async fn serve(router: Router) -> reqwest::Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        reqwest::Url::parse(&format!("http://{addr}/api/citizen/card-status/")).unwrap()
    }

    fn client(url: reqwest::Url) -> BalanceClient {
        BalanceClient::new(url, Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_trips_left_number() {
        let body = json!({"card_status": {"Subscriptions": [{"TripsLeft": 5}]}});
        assert_eq!(trips_left(&body).unwrap(), "5");
    }

    #[test]
    fn test_trips_left_string_verbatim() {
        let body = json!({"card_status": {"Subscriptions": [{"TripsLeft": "12"}]}});
        assert_eq!(trips_left(&body).unwrap(), "12");
    }

    #[test]
    fn test_trips_left_uses_first_subscription() {
        let body = json!({"card_status": {"Subscriptions": [{"TripsLeft": 1}, {"TripsLeft": 9}]}});
        assert_eq!(trips_left(&body).unwrap(), "1");
    }

    #[test]
    fn test_trips_left_missing_pieces() {
        for body in [
            json!({}),
            json!({"card_status": {}}),
            json!({"card_status": {"Subscriptions": []}}),
            json!({"card_status": {"Subscriptions": [{}]}}),
            json!({"card_status": {"Subscriptions": [{"TripsLeft": null}]}}),
            json!({"card_status": {"Subscriptions": null}}),
        ] {
            assert!(
                matches!(trips_left(&body), Err(LookupError::MissingSubscription)),
                "expected missing subscription for {body}"
            );
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(BalanceResult::Trips("7".into()).to_string(), "7");
        assert_eq!(BalanceResult::Unavailable.to_string(), NO_ACTIVE_PASS);
    }

    #[tokio::test]
    async fn test_success_sends_card_number() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let seen_in_handler = seen.clone();
        let router = Router::new().route(
            "/api/citizen/card-status/",
            post(move |axum::Json(body): axum::Json<Value>| {
                let seen = seen_in_handler.clone();
                async move {
                    *seen.lock().unwrap() = Some(body);
                    axum::Json(json!({"card_status": {"Subscriptions": [{"TripsLeft": 5}]}}))
                }
            }),
        );
        let url = serve(router).await;

        let result = client(url).check_balance(&card()).await;

        assert_eq!(result, BalanceResult::Trips("5".into()));
        let body = seen.lock().unwrap().clone().expect("request body recorded");
        assert_eq!(body, json!({"card_number": "1234567890123456"}));
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let router = Router::new().route(
            "/api/citizen/card-status/",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let url = serve(router).await;

        assert_eq!(client(url).check_balance(&card()).await, BalanceResult::Unavailable);
    }

    #[tokio::test]
    async fn test_missing_subscriptions_is_unavailable() {
        let router = Router::new().route(
            "/api/citizen/card-status/",
            post(|| async { axum::Json(json!({"card_status": {"Error": "not found"}})) }),
        );
        let url = serve(router).await;

        assert_eq!(client(url).check_balance(&card()).await, BalanceResult::Unavailable);
    }

    #[tokio::test]
    async fn test_malformed_json_is_unavailable() {
        let router = Router::new().route(
            "/api/citizen/card-status/",
            post(|| async { "<html>maintenance</html>" }),
        );
        let url = serve(router).await;

        assert_eq!(client(url).check_balance(&card()).await, BalanceResult::Unavailable);
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let router = Router::new().route(
            "/api/citizen/card-status/",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                axum::Json(json!({"card_status": {"Subscriptions": [{"TripsLeft": 5}]}}))
            }),
        );
        let url = serve(router).await;
        let client = BalanceClient::new(url, Duration::from_millis(200)).unwrap();

        assert_eq!(client.check_balance(&card()).await, BalanceResult::Unavailable);
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = reqwest::Url::parse(&format!("http://{addr}/")).unwrap();

        assert_eq!(client(url).check_balance(&card()).await, BalanceResult::Unavailable);
    }
}
