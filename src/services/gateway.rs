use serde::Serialize;
use std::time::Duration;

use crate::models::{ErrorKind, ExtractedPayload, Failure, ProviderRequest, ProviderResponse};

/// One external generative provider behind a uniform contract.
///
/// Implementations own their wire format, credentials and timeout. Callers
/// never branch on which provider they hold.
#[async_trait::async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Short name used in logs and failure descriptions.
    fn name(&self) -> &'static str;

    /// Issue one call. Never panics or errors out: every outcome, including
    /// missing configuration, is a `ProviderResponse`.
    async fn call(&self, request: &ProviderRequest) -> ProviderResponse;

    /// Normalise a successful raw body into an `ExtractedPayload`.
    fn extract(&self, raw_body: &str) -> Result<ExtractedPayload, Failure>;
}

pub(crate) fn build_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(client)
}

/// POST `body` as JSON and map the reply onto a `ProviderResponse`.
pub(crate) async fn send_json<B: Serialize + ?Sized>(
    provider: &str,
    request: reqwest::RequestBuilder,
    body: &B,
) -> ProviderResponse {
    let response = match request.json(body).send().await {
        Ok(response) => response,
        Err(e) => return transport_failure(provider, e),
    };

    let status = response.status();
    log::debug!("📥 {} response status: {}", provider, status);

    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => return transport_failure(provider, e),
    };
    log::debug!("📄 {} raw response size: {} bytes", provider, text.len());

    if !status.is_success() {
        log::error!("❌ {} API error ({}): {}", provider, status, text);
        let detail = if text.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, text)
        };
        return ProviderResponse::failure(ErrorKind::ProviderError, detail);
    }

    if text.trim().is_empty() {
        log::warn!("⚠️ {} answered {} with an empty body", provider, status);
        return ProviderResponse::failure(
            ErrorKind::EmptyResponse,
            format!("{} returned an empty body", provider),
        );
    }

    ProviderResponse::Success { raw_body: text }
}

pub(crate) fn missing_api_key(provider: &str) -> ProviderResponse {
    log::warn!("⚠️ {} API key is not configured, skipping call", provider);
    ProviderResponse::failure(
        ErrorKind::ConfigurationError,
        format!("{} API key is not configured", provider),
    )
}

fn transport_failure(provider: &str, e: reqwest::Error) -> ProviderResponse {
    log::error!("❌ {} transport error: {}", provider, e);
    let detail = if e.is_timeout() {
        format!("request to {} timed out: {}", provider, e)
    } else {
        format!("request to {} failed: {}", provider, e)
    };
    ProviderResponse::failure(ErrorKind::TransportError, detail)
}

/// Local HTTP stand-ins for provider endpoints.
#[cfg(test)]
pub(crate) mod stub {
    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode, Uri},
        Router,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub uri: String,
        pub headers: HeaderMap,
        pub body: String,
    }

    #[derive(Clone)]
    struct StubState {
        status: StatusCode,
        body: String,
        delay: Duration,
        hits: Arc<AtomicUsize>,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
    }

    pub struct StubServer {
        pub base_url: String,
        hits: Arc<AtomicUsize>,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
    }

    impl StubServer {
        pub async fn spawn(status: u16, body: &str) -> Self {
            Self::spawn_delayed(status, body, Duration::ZERO).await
        }

        pub async fn spawn_delayed(status: u16, body: &str, delay: Duration) -> Self {
            let hits = Arc::new(AtomicUsize::new(0));
            let requests = Arc::new(Mutex::new(Vec::new()));
            let state = StubState {
                status: StatusCode::from_u16(status).unwrap(),
                body: body.to_string(),
                delay,
                hits: hits.clone(),
                requests: requests.clone(),
            };

            let app = Router::new().fallback(record).with_state(state);
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            Self {
                base_url: format!("http://{}", addr),
                hits,
                requests,
            }
        }

        pub fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }

        pub fn last_request(&self) -> RecordedRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    async fn record(
        State(state): State<StubState>,
        uri: Uri,
        headers: HeaderMap,
        body: String,
    ) -> (StatusCode, String) {
        state.hits.fetch_add(1, Ordering::SeqCst);
        state.requests.lock().unwrap().push(RecordedRequest {
            uri: uri.to_string(),
            headers,
            body,
        });
        tokio::time::sleep(state.delay).await;
        (state.status, state.body.clone())
    }

    /// Base URL of a port nothing listens on.
    pub async fn closed_port_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }
}
