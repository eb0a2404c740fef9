//! Model registry - explicit, process-lifetime cache of loaded engines
//!
//! Engines are keyed by (task, model id) and kept in a bounded LRU. A key is
//! loaded at most once even when several requests ask for it concurrently.
//! Calls into one key are serialized even across handles that outlive an
//! eviction, since live handles for a key share a single gate.

use anyhow::Result;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::OnceCell;

use super::{
    DecodingConfig, DefaultProviderFactory, GenerationProvider, ModelKey, ProviderFactory,
    ProviderInfo,
};
use crate::config::EngineConfig;
use crate::error::GenerationFailure;

type Gate = tokio::sync::Mutex<()>;

/// A loaded engine plus the lock that serializes calls into it.
pub struct EngineHandle {
    key: ModelKey,
    provider: Arc<dyn GenerationProvider>,
    gate: Arc<Gate>,
}

impl EngineHandle {
    fn new(key: ModelKey, provider: Arc<dyn GenerationProvider>, gate: Arc<Gate>) -> Self {
        Self { key, provider, gate }
    }

    /// Run one generation. Concurrent callers queue on the engine's gate.
    pub async fn generate(&self, prompt: &str, config: &DecodingConfig) -> Result<Vec<String>> {
        let _guard = self.gate.lock().await;
        self.provider.generate(prompt, config).await
    }

    pub fn key(&self) -> &ModelKey {
        &self.key
    }

    pub fn info(&self) -> ProviderInfo {
        self.provider.info()
    }
}

type Slot = Arc<OnceCell<Arc<EngineHandle>>>;

pub struct ModelRegistry {
    factory: Box<dyn ProviderFactory>,
    slots: Mutex<LruCache<ModelKey, Slot>>,
    /// Gates of live handles, including handles already evicted from `slots`.
    gates: Mutex<HashMap<ModelKey, Weak<Gate>>>,
    loads: AtomicUsize,
}

impl ModelRegistry {
    pub const DEFAULT_CAPACITY: usize = 3;

    /// Open a registry backed by the engine configured in `config`.
    pub fn open(config: &EngineConfig, capacity: usize) -> Self {
        tracing::info!(mode = ?config.mode, capacity = capacity, "Opening model registry");
        Self::with_factory(DefaultProviderFactory::new(config.clone()), capacity)
    }

    pub fn with_factory(factory: impl ProviderFactory + 'static, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            factory: Box::new(factory),
            slots: Mutex::new(LruCache::new(capacity)),
            gates: Mutex::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    /// Get the engine for `key`, loading it on first use.
    pub async fn engine(&self, key: &ModelKey) -> Result<Arc<EngineHandle>, GenerationFailure> {
        let slot = self.slot(key);
        let result = slot
            .get_or_try_init(|| async { self.load(key) })
            .await
            .map(Arc::clone);

        if result.is_err() {
            // Do not keep a failed key occupying an LRU entry.
            let mut slots = self.slots.lock();
            if slots.peek(key).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
                slots.pop(key);
            }
        }
        result
    }

    fn slot(&self, key: &ModelKey) -> Slot {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key) {
            return Arc::clone(slot);
        }
        let slot: Slot = Arc::new(OnceCell::new());
        if let Some((evicted, _)) = slots.push(key.clone(), Arc::clone(&slot)) {
            if &evicted != key {
                tracing::info!(model = %evicted, "Evicted engine from registry");
            }
        }
        slot
    }

    fn load(&self, key: &ModelKey) -> Result<Arc<EngineHandle>, GenerationFailure> {
        let started = Instant::now();
        let provider = self.factory.load(key).map_err(|e| {
            tracing::warn!(model = %key, error = %e, "Engine load failed");
            GenerationFailure::Unavailable(format!("{}: {:#}", key, e))
        })?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            model = %key,
            provider = %provider.info().name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Engine loaded"
        );
        Ok(Arc::new(EngineHandle::new(key.clone(), provider, self.gate(key))))
    }

    /// The gate shared by every live handle for `key`.
    fn gate(&self, key: &ModelKey) -> Arc<Gate> {
        let mut gates = self.gates.lock();
        if let Some(gate) = gates.get(key).and_then(Weak::upgrade) {
            return gate;
        }
        gates.retain(|_, gate| gate.strong_count() > 0);
        let gate = Arc::new(Gate::new(()));
        gates.insert(key.clone(), Arc::downgrade(&gate));
        gate
    }

    /// Load engines ahead of the first request.
    pub async fn preload(&self, keys: &[ModelKey]) -> Vec<(ModelKey, Result<(), GenerationFailure>)> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let outcome = self.engine(key).await.map(|_| ());
            results.push((key.clone(), outcome));
        }
        results
    }

    /// Drop a cached engine. In-flight callers keep their handle, and a
    /// reloaded engine for the same key queues behind them.
    pub fn evict(&self, key: &ModelKey) -> bool {
        self.slots.lock().pop(key).is_some()
    }

    /// Keys whose engine finished loading, most recently used first.
    pub fn loaded_keys(&self) -> Vec<ModelKey> {
        self.slots
            .lock()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of successful engine loads since the registry was opened.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}
