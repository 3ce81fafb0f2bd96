//! Running service instances for the end-to-end tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use wechat_token::app::ListenAddrs;
use wechat_token::config::Config;
use wechat_token::{Application, GroupError, Listeners, ProviderError, Signal, SignalWatcher, TokenProvider};

/// Provider answering from a fixed script and counting calls.
pub struct ScriptedProvider {
    outcome: Result<String, String>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(outcome: Result<&str, &str>) -> Arc<Self> {
        Arc::new(Self {
            outcome: outcome.map(str::to_string).map_err(str::to_string),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for ScriptedProvider {
    async fn get_token(&self, _app_id: &str, _app_secret: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone().map_err(ProviderError::Message)
    }
}

/// A service running all four actors on loopback ports.
pub struct Running {
    pub addrs: ListenAddrs,
    pub signals: mpsc::Sender<Signal>,
    pub group: JoinHandle<Result<(), GroupError>>,
}

pub async fn start(provider: Arc<dyn TokenProvider>) -> Running {
    let config = Config::from_lookup(|_| None).unwrap();
    let app = Application::new(&config, provider).unwrap();

    let listeners = Listeners::bind("127.0.0.1:0", "127.0.0.1:0", "127.0.0.1:0")
        .await
        .unwrap();
    let addrs = listeners.local_addrs().unwrap();

    let (signals, rx) = mpsc::channel(1);
    let group = tokio::spawn(app.into_group(listeners, SignalWatcher::from_channel(rx)).run());

    Running {
        addrs,
        signals,
        group,
    }
}
