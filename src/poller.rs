// Provider Poller
// One worker task per configured provider. Each worker handshakes over
// `/hello`, then fetches `/all_data` on its interval and atomically swaps
// the provider's contribution into the store.
//
// Failure model:
// - transport failure or non-2xx: the previous contribution is retained and
//   the next attempt waits for the interval deadline (no spinning, no
//   backoff curve)
// - malformed payload or missing reserved keys: the contribution is cleared
//   and the provider is marked degraded until the next good fetch
// - shutdown: observed at every suspension point; in-flight requests are
//   dropped

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{ensure, Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ProviderEntry;
use crate::http_types::{parse_sao_payload, HelloResponse, ProviderMode};
use crate::observability::with_trace_id;
use crate::store::{ObjectStore, ProviderState};
use crate::value::Sao;

/// Per-request deadline for provider HTTP calls.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle to the running worker set.
pub struct PollerSet {
    store: Arc<ObjectStore>,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl PollerSet {
    /// True while any configured provider has not completed its first
    /// attempt.
    pub fn syncing(&self) -> bool {
        self.store
            .provider_statuses()
            .iter()
            .any(|status| status.state == ProviderState::Starting)
    }

    /// Wait until every provider finished its first attempt (success or
    /// failure), or the timeout passes.
    pub async fn await_initial_sync(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while self.syncing() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Stop all workers at their next quiescent point and wait for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// Spawn one worker per provider.
pub fn spawn_pollers(
    store: Arc<ObjectStore>,
    providers: Vec<ProviderEntry>,
) -> Result<PollerSet> {
    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;
    let (shutdown, shutdown_rx) = watch::channel(false);

    let mut workers = Vec::with_capacity(providers.len());
    for entry in providers {
        store.register_provider(entry.url.as_str());
        workers.push(tokio::spawn(run_provider(
            store.clone(),
            client.clone(),
            entry,
            shutdown_rx.clone(),
        )));
    }
    Ok(PollerSet {
        store,
        shutdown,
        workers,
    })
}

/// Why a fetch produced nothing usable. The two classes drive different
/// store transitions.
enum FetchFailure {
    /// Network error, timeout, or non-2xx status. Last good data stands.
    Transport(anyhow::Error),
    /// The provider answered with a broken payload. Contribution is cleared.
    Payload(anyhow::Error),
}

async fn run_provider(
    store: Arc<ObjectStore>,
    client: reqwest::Client,
    entry: ProviderEntry,
    mut shutdown: watch::Receiver<bool>,
) {
    let url = entry.url.as_str().to_string();
    let mut source_name: Option<String> = None;

    loop {
        if *shutdown.borrow() {
            break;
        }
        let attempt_started = Instant::now();

        if source_name.is_none() {
            source_name = handshake(&store, &client, &entry.url, &url).await;
        }

        if let Some(source) = source_name.clone() {
            match fetch_all_data(&client, &entry.url).await {
                Ok(objects) => {
                    let count = objects.len();
                    store.replace_provider(&source, objects);
                    store.update_status(&url, |status| status.record_success());
                    debug!(source = %source, count, "provider contribution refreshed");
                }
                Err(FetchFailure::Transport(error)) => {
                    warn!(source = %source, %error, "provider fetch failed; keeping last snapshot");
                    store.update_status(&url, |status| {
                        status.record_failure(ProviderState::Unreachable, format!("{error:#}"));
                    });
                }
                Err(FetchFailure::Payload(error)) => {
                    warn!(source = %source, %error, "provider payload invalid; clearing contribution");
                    store.replace_provider(&source, Vec::new());
                    store.update_status(&url, |status| {
                        status.record_failure(ProviderState::Degraded, format!("{error:#}"));
                    });
                }
            }
        }

        // The next attempt is due at last_attempt + interval; fetches for
        // one provider never overlap because this worker is sequential.
        let deadline = attempt_started + entry.interval;
        let now = Instant::now();
        if deadline > now {
            tokio::select! {
                _ = tokio::time::sleep(deadline - now) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
    debug!(url = %url, "provider worker stopped");
}

/// `/hello` handshake. Returns the provider's declared source name once it
/// answers with a supported mode.
async fn handshake(
    store: &ObjectStore,
    client: &reqwest::Client,
    base: &Url,
    status_key: &str,
) -> Option<String> {
    let result = with_trace_id("provider.hello", hello(client, base)).await;
    match result {
        Ok(hello) if hello.mode == ProviderMode::AllAtOnce => {
            info!(
                name = %hello.name,
                version = %hello.version,
                "provider connected"
            );
            store.update_status(status_key, |status| {
                status.name = hello.name.clone();
                status.description = Some(hello.description.clone());
                status.version = Some(hello.version.clone());
            });
            Some(hello.name)
        }
        Ok(hello) => {
            warn!(name = %hello.name, "provider mode ON_DEMAND is not supported");
            store.update_status(status_key, |status| {
                status.name = hello.name.clone();
                status.record_failure(
                    ProviderState::Unsupported,
                    "provider mode ON_DEMAND is not supported",
                );
            });
            None
        }
        Err(error) => {
            warn!(url = status_key, %error, "provider handshake failed");
            store.update_status(status_key, |status| {
                status.record_failure(ProviderState::Unreachable, format!("{error:#}"));
            });
            None
        }
    }
}

fn endpoint(base: &Url, path: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), path)
}

async fn hello(client: &reqwest::Client, base: &Url) -> Result<HelloResponse> {
    let url = endpoint(base, "hello");
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    ensure!(
        response.status().is_success(),
        "GET {url} returned {}",
        response.status()
    );
    response
        .json::<HelloResponse>()
        .await
        .with_context(|| format!("invalid hello payload from {url}"))
}

async fn fetch_all_data(
    client: &reqwest::Client,
    base: &Url,
) -> std::result::Result<Vec<Sao>, FetchFailure> {
    let url = endpoint(base, "all_data");
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))
        .map_err(FetchFailure::Transport)?;
    if !response.status().is_success() {
        return Err(FetchFailure::Transport(anyhow::anyhow!(
            "GET {url} returned {}",
            response.status()
        )));
    }
    let body = response
        .text()
        .await
        .with_context(|| format!("reading body from {url}"))
        .map_err(FetchFailure::Transport)?;
    parse_sao_payload(&body).map_err(FetchFailure::Payload)
}
