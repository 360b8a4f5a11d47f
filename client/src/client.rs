use std::time::Duration;

use log::{debug, info, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::{
    error::{GenerateError, PollError},
    graph::{JobGraph, build_job_graph},
    params::GenerationParams,
};

mod history;
pub use history::{History, HistoryEntry, ImageRef, StageOutput};

pub const DEFAULT_CLIENT_ID: &str = "huobao_drama";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub client_id: Option<String>,
}

/// How often and how long to wait for a submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 300,
            interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    prompt: &'a JobGraph,
    client_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    prompt_id: Option<String>,
}

/// Submits text-to-image jobs to a ComfyUI server and waits for the result.
#[derive(Debug, Clone)]
pub struct ComfyClient {
    config: ClientConfig,
    http: reqwest::Client,
    poll: PollPolicy,
}

impl ComfyClient {
    pub fn new(config: ClientConfig) -> Self {
        let http = http_client().unwrap_or_else(|e| {
            warn!("falling back to an http client without request timeout: {e}");
            reqwest::Client::new()
        });
        Self::with_http(config, http)
    }

    pub fn with_http(config: ClientConfig, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Runs one generation and returns the `/view` URL of the produced image.
    pub async fn generate(&self, params: GenerationParams) -> Result<String, GenerateError> {
        let base = base_url(&self.config.base_url)?;
        let client_id = match self.config.client_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => DEFAULT_CLIENT_ID,
        };

        let params = params.normalize();
        debug!("normalized params: {params:#?}");
        let graph = build_job_graph(&params);

        let job_id = self.submit(base, &graph, client_id).await?;
        info!("submitted job {job_id} (seed {})", params.seed);

        self.wait_for_image(base, &job_id).await
    }

    async fn submit(
        &self,
        base: &str,
        graph: &JobGraph,
        client_id: &str,
    ) -> Result<String, GenerateError> {
        let body = SubmitBody {
            prompt: graph,
            client_id,
        };

        let resp = self
            .http
            .post(format!("{base}/prompt"))
            .json(&body)
            .send()
            .await
            .map_err(GenerateError::SubmitTransport)?;

        let status = resp.status();
        let text = resp.text().await.map_err(GenerateError::SubmitTransport)?;
        if status != StatusCode::OK {
            return Err(GenerateError::Submit { status, body: text });
        }

        let SubmitResponse { prompt_id } =
            serde_json::from_str(&text).map_err(GenerateError::SubmitDecode)?;

        prompt_id
            .filter(|id| !id.is_empty())
            .ok_or(GenerateError::MissingJobId)
    }

    async fn wait_for_image(&self, base: &str, job_id: &str) -> Result<String, GenerateError> {
        for attempt in 1..=self.poll.attempts {
            sleep(self.poll.interval).await;

            let history = match self.fetch_history(base, job_id).await {
                Ok(history) => history,
                Err(e) => {
                    debug!("poll {attempt} of job {job_id}: {e}");
                    continue;
                }
            };

            let Some(entry) = history.get(job_id) else {
                continue;
            };

            if let Some(image) = entry.first_image() {
                let url = image.view_url(base);
                info!("job {job_id} finished after {attempt} polls: {url}");
                return Ok(url);
            }
        }

        Err(GenerateError::Timeout {
            attempts: self.poll.attempts,
        })
    }

    async fn fetch_history(&self, base: &str, job_id: &str) -> Result<History, PollError> {
        let resp = self
            .http
            .get(format!("{base}/history/{job_id}"))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(PollError::Status(resp.status()));
        }

        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()
}

fn base_url(raw: &str) -> Result<&str, GenerateError> {
    if raw.is_empty() {
        return Err(GenerateError::MissingBaseUrl);
    }
    Ok(raw.strip_suffix('/').unwrap_or(raw))
}

#[cfg(test)]
mod test {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use axum::{
        Json, Router,
        extract::{Path, State},
        routing::{get, post},
    };
    use serde_json::{Value, json};

    use super::*;
    use crate::params::TranslationCredentials;

    type HistoryFn = dyn Fn(usize, &str) -> (StatusCode, String) + Send + Sync;

    /// In-process stand-in for the ComfyUI endpoints.
    #[derive(Clone)]
    struct FakeComfy {
        submit: (StatusCode, String),
        history: Arc<HistoryFn>,
        history_calls: Arc<AtomicUsize>,
        submitted: Arc<Mutex<Option<Value>>>,
    }

    impl FakeComfy {
        fn new(
            submit: (StatusCode, &str),
            history: impl Fn(usize, &str) -> (StatusCode, String) + Send + Sync + 'static,
        ) -> Self {
            Self {
                submit: (submit.0, submit.1.to_string()),
                history: Arc::new(history),
                history_calls: Arc::default(),
                submitted: Arc::default(),
            }
        }

        fn history_calls(&self) -> usize {
            self.history_calls.load(Ordering::SeqCst)
        }

        fn submitted(&self) -> Value {
            self.submitted.lock().unwrap().clone().unwrap()
        }

        async fn serve(&self) -> String {
            let app = Router::new()
                .route("/prompt", post(prompt))
                .route("/history/{id}", get(history))
                .with_state(self.clone());

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
            format!("http://{addr}")
        }
    }

    async fn prompt(State(fake): State<FakeComfy>, Json(body): Json<Value>) -> (StatusCode, String) {
        *fake.submitted.lock().unwrap() = Some(body);
        fake.submit.clone()
    }

    async fn history(
        State(fake): State<FakeComfy>,
        Path(id): Path<String>,
    ) -> (StatusCode, String) {
        let n = fake.history_calls.fetch_add(1, Ordering::SeqCst);
        (fake.history)(n, &id)
    }

    const ACCEPTED: (StatusCode, &str) = (StatusCode::OK, r#"{"prompt_id": "job-1", "number": 0}"#);

    fn finished(id: &str) -> String {
        json!({
            id: {
                "outputs": {
                    "8": {"images": [{"filename": "a.png", "subfolder": "", "type": "output"}]}
                }
            }
        })
        .to_string()
    }

    fn local_http() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    fn client(base: impl Into<String>) -> ComfyClient {
        ComfyClient::with_http(
            ClientConfig {
                base_url: base.into(),
                client_id: None,
            },
            local_http(),
        )
        .with_poll_policy(PollPolicy {
            attempts: 300,
            interval: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn generate_returns_view_url() {
        let fake = FakeComfy::new(ACCEPTED, |n, id| {
            if n < 2 {
                (StatusCode::OK, "{}".into())
            } else {
                (StatusCode::OK, finished(id))
            }
        });
        let base = fake.serve().await;

        let url = client(&base)
            .generate(GenerationParams {
                prompt: "a cat".into(),
                seed: 5,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(url, format!("{base}/view?filename=a.png&subfolder=&type=output"));
        assert_eq!(fake.history_calls(), 3);

        let body = fake.submitted();
        assert_eq!(body["client_id"], "huobao_drama");
        assert_eq!(body["prompt"]["21"]["inputs"]["text"], "a cat");
        assert_eq!(body["prompt"]["15"]["inputs"]["seed"], 5);
        assert_eq!(body["prompt"]["20"]["inputs"]["width"], 1080);
        assert!(body["prompt"].get("24").is_none());
    }

    #[tokio::test]
    async fn trailing_slash_is_stripped() {
        let fake = FakeComfy::new(ACCEPTED, |_, id| (StatusCode::OK, finished(id)));
        let base = fake.serve().await;

        let plain = client(&base).generate(GenerationParams::new("x")).await.unwrap();
        let slashed = client(format!("{base}/"))
            .generate(GenerationParams::new("x"))
            .await
            .unwrap();

        assert_eq!(plain, slashed);
        assert_eq!(plain, format!("{base}/view?filename=a.png&subfolder=&type=output"));
    }

    #[tokio::test]
    async fn custom_client_id_and_translation_are_submitted() {
        let fake = FakeComfy::new(ACCEPTED, |_, id| (StatusCode::OK, finished(id)));
        let base = fake.serve().await;

        let client = ComfyClient::with_http(
            ClientConfig {
                base_url: base,
                client_id: Some("studio".into()),
            },
            local_http(),
        )
        .with_poll_policy(PollPolicy {
            attempts: 1,
            interval: Duration::ZERO,
        });
        client
            .generate(GenerationParams {
                prompt: "一只猫".into(),
                translation: Some(TranslationCredentials {
                    app_id: "id".into(),
                    app_key: "key".into(),
                }),
                ..Default::default()
            })
            .await
            .unwrap();

        let body = fake.submitted();
        assert_eq!(body["client_id"], "studio");
        assert_eq!(body["prompt"]["21"]["inputs"]["text"], json!(["24", 0]));
        assert_eq!(body["prompt"]["24"]["inputs"]["text"], "一只猫");
    }

    #[tokio::test]
    async fn submit_error_carries_status_and_body() {
        let fake = FakeComfy::new((StatusCode::INTERNAL_SERVER_ERROR, "boom"), |_, id| {
            (StatusCode::OK, finished(id))
        });
        let base = fake.serve().await;

        let err = client(base).generate(GenerationParams::new("x")).await.unwrap_err();

        assert!(matches!(err, GenerateError::Submit { .. }));
        let msg = err.to_string();
        assert!(msg.contains("500"), "{msg}");
        assert!(msg.contains("boom"), "{msg}");
        assert_eq!(fake.history_calls(), 0);
    }

    #[tokio::test]
    async fn undecodable_submit_response() {
        let fake = FakeComfy::new((StatusCode::OK, "<html>"), |_, id| {
            (StatusCode::OK, finished(id))
        });
        let base = fake.serve().await;

        let err = client(base).generate(GenerationParams::new("x")).await.unwrap_err();
        assert!(matches!(err, GenerateError::SubmitDecode(_)), "{err:?}");
        assert_eq!(fake.history_calls(), 0);
    }

    #[tokio::test]
    async fn submit_response_without_job_id() {
        for body in [r#"{"number": 3}"#, r#"{"prompt_id": ""}"#] {
            let fake = FakeComfy::new((StatusCode::OK, body), |_, id| {
                (StatusCode::OK, finished(id))
            });
            let base = fake.serve().await;

            let err = client(base).generate(GenerationParams::new("x")).await.unwrap_err();
            assert!(matches!(err, GenerateError::MissingJobId), "{err:?}");
            assert_eq!(fake.history_calls(), 0);
        }
    }

    #[tokio::test]
    async fn missing_base_url() {
        let err = client("").generate(GenerationParams::new("x")).await.unwrap_err();
        assert!(matches!(err, GenerateError::MissingBaseUrl));
    }

    #[tokio::test]
    async fn times_out_when_job_never_shows_up() {
        let fake = FakeComfy::new(ACCEPTED, |_, _| (StatusCode::OK, r#"{"other": {}}"#.into()));
        let base = fake.serve().await;

        let err = client(base).generate(GenerationParams::new("x")).await.unwrap_err();

        assert!(matches!(err, GenerateError::Timeout { attempts: 300 }), "{err:?}");
        assert_eq!(fake.history_calls(), 300);
    }

    #[tokio::test]
    async fn bad_polls_count_as_not_ready() {
        let fake = FakeComfy::new(ACCEPTED, |n, id| match n {
            0 => (StatusCode::OK, "not json".into()),
            1 => (StatusCode::INTERNAL_SERVER_ERROR, "oops".into()),
            2 => (
                StatusCode::OK,
                json!({ id: {"outputs": {"8": {"images": []}}} }).to_string(),
            ),
            _ => (StatusCode::OK, finished(id)),
        });
        let base = fake.serve().await;

        let url = client(&base).generate(GenerationParams::new("x")).await.unwrap();

        assert!(url.ends_with("/view?filename=a.png&subfolder=&type=output"));
        assert_eq!(fake.history_calls(), 4);
    }

    #[tokio::test]
    async fn null_images_in_another_stage() {
        let fake = FakeComfy::new(ACCEPTED, |_, id| {
            let history = json!({
                id: {
                    "outputs": {
                        "3": {"images": null},
                        "8": {"images": [{"filename": "a.png", "subfolder": "", "type": "output"}]}
                    }
                }
            });
            (StatusCode::OK, history.to_string())
        });
        let base = fake.serve().await;

        let url = client(&base).generate(GenerationParams::new("x")).await.unwrap();

        assert_eq!(url, format!("{base}/view?filename=a.png&subfolder=&type=output"));
        assert_eq!(fake.history_calls(), 1);
    }

    #[tokio::test]
    async fn unreachable_history_times_out() {
        let fake = FakeComfy::new(ACCEPTED, |_, id| (StatusCode::OK, finished(id)));
        let base = fake.serve().await;

        // submission succeeds against the fake, polling hits a dead port
        let submit_only = client(&base);
        let graph = build_job_graph(&GenerationParams::new("x").normalize());
        let job_id = submit_only.submit(&base, &graph, "c").await.unwrap();
        assert_eq!(job_id, "job-1");

        let dead = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_base = format!("http://{}", dead.local_addr().unwrap());
        drop(dead);

        let poller = client(&dead_base).with_poll_policy(PollPolicy {
            attempts: 3,
            interval: Duration::ZERO,
        });
        let err = poller.wait_for_image(&dead_base, &job_id).await.unwrap_err();
        assert!(matches!(err, GenerateError::Timeout { attempts: 3 }));
    }

    #[test]
    fn default_http_client_builds() {
        assert!(http_client().is_ok());
    }

    #[test]
    fn base_url_strips_one_slash() {
        assert_eq!(base_url("http://x/").unwrap(), "http://x");
        assert_eq!(base_url("http://x").unwrap(), "http://x");
        assert_eq!(base_url("http://x//").unwrap(), "http://x/");
        assert!(matches!(base_url(""), Err(GenerateError::MissingBaseUrl)));
    }
}
