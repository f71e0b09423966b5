//! HTTP client for a running funnel server.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use servicefunnel_shared::{
    AnswerRequest, ClientConfig, ErrorBody, FunnelStep, Result, ServiceFunnelError,
    StartRequest, StepReply,
};
use tracing::{debug, instrument};
use url::Url;

use crate::service::FunnelBackend;

/// User-Agent string for funnel requests.
const USER_AGENT: &str = concat!("ServiceFunnel/", env!("CARGO_PKG_VERSION"));

/// Which endpoint a request went to; decides how a 404 is reported.
#[derive(Debug, Clone, Copy)]
enum Route {
    Start,
    Answer,
}

impl Route {
    fn path(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Answer => "answer",
        }
    }
}

/// [`FunnelBackend`] that POSTs to `{server_url}/start` and `{server_url}/answer`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    /// Create a backend for the server at `server_url`.
    pub fn new(server_url: &Url, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                ServiceFunnelError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        // Url::join replaces the last path segment unless the base ends in '/'.
        let mut base = server_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self { client, base })
    }

    /// Create a backend from the `[client]` config section.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(&config.server_url()?, config.timeout_secs)
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn post<B, T>(&self, route: Route, body: &B, category_id: &str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let url = self
            .base
            .join(route.path())
            .map_err(|e| ServiceFunnelError::Network(format!("invalid endpoint: {e}")))?;

        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceFunnelError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        debug!(%url, %status, "funnel response");

        if status == StatusCode::NOT_FOUND {
            // Only a funnel server's error body means "no such category/service";
            // a bare 404 is a wrong URL or a proxy in the way.
            return Err(match response.json::<ErrorBody>().await {
                Ok(_) => match route {
                    Route::Start => ServiceFunnelError::CategoryNotFound {
                        category_id: category_id.to_string(),
                    },
                    Route::Answer => ServiceFunnelError::NoMatchingService {
                        category_id: category_id.to_string(),
                    },
                },
                Err(_) => ServiceFunnelError::Network(format!(
                    "{url}: HTTP {status} (not a funnel server endpoint?)"
                )),
            });
        }

        if !status.is_success() {
            let detail = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_default();
            return Err(ServiceFunnelError::Network(format!(
                "{url}: HTTP {status} {detail}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceFunnelError::Network(format!("{url}: invalid response: {e}")))
    }
}

impl FunnelBackend for HttpBackend {
    #[instrument(skip(self), fields(server = %self.base))]
    async fn start(&self, category_id: &str) -> Result<FunnelStep> {
        let body = StartRequest {
            category_id: category_id.to_string(),
        };
        let reply: StepReply = self.post(Route::Start, &body, category_id).await?;
        match reply {
            StepReply::Question { question, options } => Ok(FunnelStep { question, options }),
            StepReply::Complete { .. } => Err(ServiceFunnelError::Network(
                "server answered /start with a completed funnel".into(),
            )),
        }
    }

    #[instrument(skip(self), fields(server = %self.base, depth = answers.len()))]
    async fn answer(&self, category_id: &str, answers: &[String]) -> Result<StepReply> {
        let body = AnswerRequest {
            category_id: category_id.to_string(),
            answers: answers.to_vec(),
        };
        self.post(Route::Answer, &body, category_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn backend(server: &MockServer) -> HttpBackend {
        HttpBackend::new(&Url::parse(&server.uri()).unwrap(), 5).unwrap()
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = Url::parse("http://localhost:5000/chat").unwrap();
        let backend = HttpBackend::new(&url, 5).unwrap();
        assert_eq!(backend.base_url().as_str(), "http://localhost:5000/chat/");
        assert_eq!(
            backend.base_url().join("start").unwrap().as_str(),
            "http://localhost:5000/chat/start"
        );
    }

    #[tokio::test]
    async fn start_posts_category() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/start"))
            .and(body_json(serde_json::json!({"categoryId": "1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "question": "Type",
                "options": ["Repair", "Install"],
            })))
            .mount(&server)
            .await;

        let step = backend(&server).await.start("1").await.unwrap();
        assert_eq!(step.question, "Type");
        assert_eq!(step.options, ["Repair", "Install"]);
    }

    #[tokio::test]
    async fn answer_posts_full_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/answer"))
            .and(body_json(serde_json::json!({
                "categoryId": "1",
                "answers": ["Repair", "Wood"],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "All questions answered.",
                "serviceId": 100,
            })))
            .mount(&server)
            .await;

        let reply = backend(&server)
            .await
            .answer("1", &["Repair".into(), "Wood".into()])
            .await
            .unwrap();
        assert_eq!(reply, StepReply::complete("100"));
    }

    #[tokio::test]
    async fn not_found_maps_per_route() {
        let server = MockServer::start().await;
        for route in ["/start", "/answer"] {
            Mock::given(method("POST"))
                .and(path(route))
                .respond_with(
                    ResponseTemplate::new(404)
                        .set_body_json(serde_json::json!({"error": "not here"})),
                )
                .mount(&server)
                .await;
        }

        let backend = backend(&server).await;
        assert!(matches!(
            backend.start("9").await,
            Err(ServiceFunnelError::CategoryNotFound { .. })
        ));
        assert!(matches!(
            backend.answer("1", &["Paint".into()]).await,
            Err(ServiceFunnelError::NoMatchingService { .. })
        ));
    }

    #[tokio::test]
    async fn bare_not_found_is_a_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/start"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/answer"))
            .respond_with(ResponseTemplate::new(404).set_body_string("<h1>Not Found</h1>"))
            .mount(&server)
            .await;

        let backend = backend(&server).await;
        let err = backend.start("1").await.unwrap_err();
        assert!(matches!(err, ServiceFunnelError::Network(_)));
        assert!(err.to_string().contains("404"));
        assert!(matches!(
            backend.answer("1", &["Repair".into()]).await,
            Err(ServiceFunnelError::Network(_))
        ));
    }

    #[tokio::test]
    async fn server_error_is_a_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/start"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"error": "dataset exploded"})),
            )
            .mount(&server)
            .await;

        let err = backend(&server).await.start("1").await.unwrap_err();
        assert!(matches!(err, ServiceFunnelError::Network(_)));
        assert!(err.to_string().contains("dataset exploded"));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        // Port 9 (discard) is not serving HTTP.
        let url = Url::parse("http://127.0.0.1:9").unwrap();
        let backend = HttpBackend::new(&url, 2).unwrap();
        assert!(matches!(
            backend.start("1").await,
            Err(ServiceFunnelError::Network(_))
        ));
    }
}
