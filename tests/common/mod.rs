//! Shared harness: the full router on an ephemeral port with in-memory
//! backends, a manual clock, and a scripted AI model.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use outfit_api::ai::{AiError, Fetched, GenerativeModel};
use outfit_api::auth::User;
use outfit_api::backends::MemoryBackends;
use outfit_api::clock::{Clock, ManualClock};
use outfit_api::config::AppConfig;
use outfit_api::{HttpServer, Shutdown};

pub const START_MS: u64 = 1_700_000_000_000;
pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const SITE_URL: &str = "https://outfit.test";
pub const OAUTH_AUTHORIZE_URL: &str = "https://id.outfit.test/authorize";

/// One recorded `run` call.
#[derive(Debug, Clone)]
pub struct RunCall {
    pub model: String,
    pub input: Value,
}

/// Answers `run` from a queue and serves one fixed image on `fetch`.
#[derive(Default)]
pub struct ScriptedModel {
    answers: Mutex<VecDeque<Result<Value, AiError>>>,
    calls: Mutex<Vec<RunCall>>,
    pub output_content_type: Option<String>,
}

impl ScriptedModel {
    pub fn with_output(content_type: &str) -> Self {
        Self {
            output_content_type: Some(content_type.to_string()),
            ..Self::default()
        }
    }

    pub async fn push(&self, answer: Value) {
        self.answers.lock().await.push_back(Ok(answer));
    }

    pub async fn push_err(&self, err: AiError) {
        self.answers.lock().await.push_back(Err(err));
    }

    pub async fn calls(&self) -> Vec<RunCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn run(&self, model: &str, input: Value) -> Result<Value, AiError> {
        self.calls.lock().await.push(RunCall {
            model: model.to_string(),
            input,
        });
        self.answers
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(AiError::Provider("no scripted answer".into())))
    }

    async fn upload(&self, bytes: Bytes, content_type: &str) -> Result<String, AiError> {
        Ok(format!("data:{};len={}", content_type, bytes.len()))
    }

    async fn fetch(&self, url: &str) -> Result<Fetched, AiError> {
        if url.contains("missing") {
            return Err(AiError::Fetch(format!("404 for {}", url)));
        }
        Ok(Fetched {
            bytes: Bytes::from_static(b"\xff\xd8\xff generated"),
            content_type: self.output_content_type.clone(),
        })
    }
}

pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub clock: Arc<ManualClock>,
    pub backends: MemoryBackends,
    pub ai: Arc<ScriptedModel>,
    pub config: Arc<AppConfig>,
    shutdown: Shutdown,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config every test starts from: billing and webhook secret set, prompts
/// read from the crate's `prompts/` directory, sweeper off.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.site.url = Some(SITE_URL.to_string());
    config.auth.oauth_authorize_url = Some(OAUTH_AUTHORIZE_URL.to_string());
    config.ai.prompts_dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("prompts")
        .to_string_lossy()
        .into_owned();
    config.billing.webhook_secret = Some(WEBHOOK_SECRET.to_string());
    config.billing.subscription_price_id = Some("price_plan".to_string());
    config.billing.promo_currency = Some("eur".to_string());
    config.billing.promo_unit_amount = Some(1000);
    config.rate_limit.sweep_interval_secs = 0;
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config(), ScriptedModel::with_output("image/png")).await
}

pub async fn spawn_app_with(config: AppConfig, ai: ScriptedModel) -> TestApp {
    let clock = Arc::new(ManualClock::new(START_MS));
    let config = Arc::new(config);
    let ai = Arc::new(ai);

    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let backends = MemoryBackends::new(&config, dyn_clock.clone());
    let state = backends.app_state(config.clone(), dyn_clock, ai.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(state);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap();

    TestApp {
        addr,
        client,
        clock,
        backends,
        ai,
        config,
        shutdown,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// A user with a live session; returns the user and its bearer token.
    pub fn user(&self, email: &str) -> (User, String) {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
        };
        let session = self.backends.identity.issue_session(&user);
        (user, session.access_token)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.unwrap()
    }

    pub async fn post_json(&self, path: &str, token: Option<&str>, body: &Value) -> reqwest::Response {
        let mut req = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.unwrap()
    }
}

/// Status plus decoded envelope.
pub async fn envelope(res: reqwest::Response) -> (u16, Value) {
    let status = res.status().as_u16();
    let body = res.json::<Value>().await.unwrap();
    (status, body)
}
