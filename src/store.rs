// Object Store
// Owns the merged set of SAOs across providers plus the secondary indexes
// the optimizer leans on. Writers (the poller) build a complete new
// immutable snapshot and swap it in atomically; readers clone the Arc once
// and evaluate lock-free against stable indexes for the whole query.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{ensure, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::value::Sao;

/// Fully qualified identity: `(type, id, source)`.
pub type QualifiedKey = (String, String, String);

/// Logical identity: `(type, id)` across sources.
pub type LogicalKey = (String, String);

/// Shared handle to the store. One per process in the shell; tests
/// instantiate their own isolated instances.
pub struct ObjectStore {
    snapshot: RwLock<Arc<StoreSnapshot>>,
    statuses: Mutex<IndexMap<String, ProviderStatus>>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(StoreSnapshot::default())),
            statuses: Mutex::new(IndexMap::new()),
        }
    }

    /// The current immutable snapshot. Queries hold the Arc for their whole
    /// evaluation; later provider swaps do not affect it.
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        self.snapshot.read().clone()
    }

    /// Replace one provider's entire contribution and rebuild all indexes.
    ///
    /// Duplicates within the contribution collapse on `(id, source)`; the
    /// later occurrence wins. Passing an empty vector clears the provider.
    pub fn replace_provider(&self, source: &str, objects: Vec<Sao>) {
        let mut deduped: IndexMap<(String, String), Arc<Sao>> =
            IndexMap::with_capacity(objects.len());
        for sao in objects {
            let key = (sao.id().to_string(), sao.source().to_string());
            deduped.insert(key, Arc::new(sao));
        }
        let contribution: Vec<Arc<Sao>> = deduped.into_values().collect();

        let mut guard = self.snapshot.write();
        let mut contributions = guard.contributions.clone();
        contributions.insert(source.to_string(), contribution);
        let next = StoreSnapshot::rebuild(contributions);
        debug!(
            source,
            objects = next.contributions[source].len(),
            total = next.all.len(),
            "provider contribution replaced"
        );
        *guard = Arc::new(next);
    }

    /// Drop a provider's contribution entirely (it no longer appears as an
    /// empty source either).
    pub fn remove_provider(&self, source: &str) {
        let mut guard = self.snapshot.write();
        let mut contributions = guard.contributions.clone();
        if contributions.shift_remove(source).is_some() {
            *guard = Arc::new(StoreSnapshot::rebuild(contributions));
        }
    }

    // Provider status registry, keyed by configured URL. The poller writes
    // here; the CLI reads.

    pub fn register_provider(&self, url: &str) {
        self.statuses
            .lock()
            .entry(url.to_string())
            .or_insert_with(|| ProviderStatus::new(url));
    }

    pub fn update_status(&self, url: &str, update: impl FnOnce(&mut ProviderStatus)) {
        let mut statuses = self.statuses.lock();
        let status = statuses
            .entry(url.to_string())
            .or_insert_with(|| ProviderStatus::new(url));
        update(status);
    }

    pub fn provider_statuses(&self) -> Vec<ProviderStatus> {
        self.statuses.lock().values().cloned().collect()
    }
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

/// An immutable view of the merged store: primary storage plus every
/// secondary index, all built from the same contribution set.
#[derive(Debug, Default)]
pub struct StoreSnapshot {
    /// Per-provider contributions, in registration order. Ground truth for
    /// rebuilds.
    contributions: IndexMap<String, Vec<Arc<Sao>>>,
    /// Every object, provider order then contribution order. The root
    /// ObjectList queries start from.
    all: Vec<Arc<Sao>>,
    /// `(type, id, source)` -> object. Primary storage.
    by_key: HashMap<QualifiedKey, Arc<Sao>>,
    /// `(type, id)` -> objects across sources.
    by_logical: HashMap<LogicalKey, Vec<Arc<Sao>>>,
    /// type -> objects carrying that type.
    by_type: HashMap<String, Vec<Arc<Sao>>>,
    /// id -> objects, for `#id` bare lookups.
    by_id: HashMap<String, Vec<Arc<Sao>>>,
}

impl StoreSnapshot {
    fn rebuild(contributions: IndexMap<String, Vec<Arc<Sao>>>) -> Self {
        let mut snapshot = StoreSnapshot {
            contributions,
            ..Default::default()
        };
        for objects in snapshot.contributions.values() {
            for sao in objects {
                snapshot.all.push(sao.clone());
                snapshot
                    .by_id
                    .entry(sao.id().to_string())
                    .or_default()
                    .push(sao.clone());
                for t in sao.types().iter() {
                    snapshot
                        .by_type
                        .entry(t.clone())
                        .or_default()
                        .push(sao.clone());
                    snapshot
                        .by_logical
                        .entry((t.clone(), sao.id().to_string()))
                        .or_default()
                        .push(sao.clone());
                    snapshot.by_key.insert(
                        (
                            t.clone(),
                            sao.id().to_string(),
                            sao.source().to_string(),
                        ),
                        sao.clone(),
                    );
                }
            }
        }
        snapshot
    }

    /// The root object list, in stable merge order.
    pub fn all(&self) -> &[Arc<Sao>] {
        &self.all
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn by_type(&self, type_name: &str) -> &[Arc<Sao>] {
        self.by_type.get(type_name).map_or(&[], Vec::as_slice)
    }

    pub fn by_id(&self, id: &str) -> &[Arc<Sao>] {
        self.by_id.get(id).map_or(&[], Vec::as_slice)
    }

    pub fn by_logical(&self, type_name: &str, id: &str) -> &[Arc<Sao>] {
        self.by_logical
            .get(&(type_name.to_string(), id.to_string()))
            .map_or(&[], Vec::as_slice)
    }

    pub fn by_key(&self, type_name: &str, id: &str, source: &str) -> Option<&Arc<Sao>> {
        self.by_key.get(&(
            type_name.to_string(),
            id.to_string(),
            source.to_string(),
        ))
    }

    /// Sources with a (possibly empty) contribution in this snapshot.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.contributions.keys().map(String::as_str)
    }

    pub fn contribution(&self, source: &str) -> &[Arc<Sao>] {
        self.contributions.get(source).map_or(&[], Vec::as_slice)
    }

    /// Verify that every secondary index is exactly a projection of the
    /// contribution set. Exercised by the property tests; cheap enough for a
    /// debug assertion too.
    pub fn check_invariants(&self) -> Result<()> {
        let mut expected_len = 0;
        for objects in self.contributions.values() {
            expected_len += objects.len();
        }
        ensure!(
            self.all.len() == expected_len,
            "root list length {} != contribution total {}",
            self.all.len(),
            expected_len
        );

        for sao in &self.all {
            ensure!(
                self.by_id(sao.id()).iter().any(|o| Arc::ptr_eq(o, sao)),
                "object {} missing from by_id",
                sao.handle()
            );
            for t in sao.types().iter() {
                ensure!(
                    self.by_type(t).iter().any(|o| Arc::ptr_eq(o, sao)),
                    "object {} missing from by_type[{t}]",
                    sao.handle()
                );
                ensure!(
                    self.by_logical(t, sao.id())
                        .iter()
                        .any(|o| Arc::ptr_eq(o, sao)),
                    "object {} missing from by_logical[({t}, {})]",
                    sao.handle(),
                    sao.id()
                );
                ensure!(
                    self.by_key(t, sao.id(), sao.source()).is_some(),
                    "object {} missing from by_key",
                    sao.handle()
                );
            }
        }

        for (t, objects) in &self.by_type {
            for sao in objects {
                ensure!(
                    sao.types().contains(t),
                    "by_type[{t}] holds object {} without that type",
                    sao.handle()
                );
            }
        }
        for (id, objects) in &self.by_id {
            for sao in objects {
                ensure!(
                    sao.id() == id,
                    "by_id[{id}] holds object {}",
                    sao.handle()
                );
            }
        }
        Ok(())
    }
}

/// Where a provider currently stands in its fetch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// Configured but no successful handshake yet.
    Starting,
    /// Last fetch succeeded; contribution is current.
    Healthy,
    /// Transport failure; last good contribution retained.
    Unreachable,
    /// Payload failure; contribution cleared until the next good fetch.
    Degraded,
    /// Handshake succeeded but the provider mode is not supported.
    Unsupported,
}

impl std::fmt::Display for ProviderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderState::Starting => "starting",
            ProviderState::Healthy => "healthy",
            ProviderState::Unreachable => "unreachable",
            ProviderState::Degraded => "degraded",
            ProviderState::Unsupported => "unsupported",
        };
        write!(f, "{s}")
    }
}

/// Live status of one configured provider.
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    /// Provider-declared name once the handshake succeeds; the URL before.
    pub name: String,
    pub url: String,
    pub state: ProviderState,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub version: Option<String>,
}

impl ProviderStatus {
    fn new(url: &str) -> Self {
        Self {
            name: url.to_string(),
            url: url.to_string(),
            state: ProviderState::Starting,
            consecutive_failures: 0,
            last_error: None,
            last_success: None,
            description: None,
            version: None,
        }
    }

    pub fn record_success(&mut self) {
        self.state = ProviderState::Healthy;
        self.consecutive_failures = 0;
        self.last_error = None;
        self.last_success = Some(Utc::now());
    }

    pub fn record_failure(&mut self, state: ProviderState, error: impl Into<String>) {
        self.state = state;
        self.consecutive_failures += 1;
        self.last_error = Some(error.into());
    }
}
