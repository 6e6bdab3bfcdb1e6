//! Shared fixtures: a scripted chat provider and an `AppState` over a temp database.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stylegen::app::AppState;
use stylegen::config::Config;
use stylegen::llm::{ChatProvider, ChatRequest, ProviderRegistry};
use stylegen::models::ProviderKind;
use stylegen::store::{SqliteStore, StyleProfile, StyleSource};
use tempfile::TempDir;

/// Answers each call with the next scripted reply; `Err` entries fail the call.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
    delays: Mutex<HashMap<usize, Duration>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            delays: Mutex::new(HashMap::new()),
        })
    }

    /// Hold the reply to the `call`-th request (0-based) for `delay`.
    pub fn delay_call(&self, call: usize, delay: Duration) {
        self.delays.lock().unwrap().insert(call, delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            let delay = self.delays.lock().unwrap().get(&call).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(anyhow::anyhow!(message)),
                None => Err(anyhow::anyhow!("script exhausted")),
            }
        })
    }
}

/// A `{title, article}` reply whose body is exactly `chars` characters long.
pub fn article_reply(title: &str, chars: usize) -> Result<String, String> {
    Ok(serde_json::json!({ "title": title, "article": "字".repeat(chars) }).to_string())
}

pub struct Harness {
    pub state: AppState,
    pub store: SqliteStore,
    pub provider: Arc<ScriptedProvider>,
    pub config: Config,
    _dir: TempDir,
}

impl Harness {
    pub async fn new(replies: Vec<Result<String, String>>) -> Self {
        Self::with_config(replies, |_| {}).await
    }

    pub async fn with_config(
        replies: Vec<Result<String, String>>,
        configure: impl FnOnce(&mut Config),
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = dir.path().to_path_buf();
        config.config_path = dir.path().join("config.toml");
        config.database_path = Some(dir.path().join("stylegen.db"));
        configure(&mut config);

        let store = SqliteStore::open(&config.database_path()).await.unwrap();
        let provider = ScriptedProvider::new(replies);
        let registry = ProviderRegistry::default()
            .with_provider(ProviderKind::Deepseek, provider.clone())
            .with_provider(ProviderKind::Openrouter, provider.clone());
        let state = AppState::assemble(&config, store.clone(), registry).unwrap();

        Self {
            state,
            store,
            provider,
            config,
            _dir: dir,
        }
    }

    pub async fn with_style(self, user_id: &str) -> Self {
        self.store
            .save_style(
                user_id,
                &StyleProfile::new("Short warm paragraphs.", serde_json::json!({"tone": "warm"})),
            )
            .await
            .unwrap();
        self
    }
}
