//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! The in-memory [`Store`] is authoritative while the process runs. Writers
//! take a [`WriteTicket`] before reading the current record, so the guard
//! check, the database write and the in-memory swap form one unit against
//! every other mutation. [`AppState::commit`] persists first and swaps the
//! new version in only once the database accepted it; side effects are
//! dispatched after the ticket is released.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use sqlx::PgPool;
use tnr_core::{CompanyTypeId, RequestId};
use tnr_state::{FeeSchedule, NameNormalizer, Outcome, Request, WorkflowEngine};

use crate::db::audit::ChainIntegrity;
use crate::dispatch::SideEffectDispatcher;
use crate::error::AppError;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// The lock is `parking_lot` and is never held across `.await`. It does not
/// poison, so a panicking writer leaves the map usable.
#[derive(Debug)]
pub struct Store<K, V> {
    data: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> Clone for Store<K, V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: K, value: V) -> Option<V> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &K) -> Option<V> {
        self.data.read().get(id).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<V> {
        self.data.read().values().cloned().collect()
    }

    /// Run a read-only query against the whole map under one read lock.
    pub fn read_with<R>(&self, f: impl FnOnce(&HashMap<K, V>) -> R) -> R {
        f(&self.data.read())
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for Store<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

// -- Application State --------------------------------------------------------

/// Application configuration.
///
/// Custom `Debug` redacts the `auth_token` to prevent credential leakage in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared bearer secret. If `None`, authentication is disabled and every
    /// caller acts as an administrator.
    pub auth_token: Option<String>,
    /// Take the client origin from `X-Forwarded-For` / `X-Real-IP`. Only
    /// safe behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            trust_proxy_headers: false,
        }
    }
}

/// Exclusive right to mutate the request store.
///
/// Held from the moment a writer reads the current record until
/// [`AppState::commit`] has swapped the new version in. Dropping it without
/// committing changes nothing.
pub struct WriteTicket<'a> {
    _guard: tokio::sync::MutexGuard<'a, ()>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub requests: Store<RequestId, Request>,
    next_request_id: Arc<AtomicU64>,
    write_gate: Arc<tokio::sync::Mutex<()>>,
    pub engine: WorkflowEngine,
    pub dispatcher: SideEffectDispatcher,
    /// Known company types. Empty means any positive id is accepted.
    pub company_types: Arc<BTreeSet<CompanyTypeId>>,
    pub db_pool: Option<PgPool>,
    pub config: AppConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("requests", &self.requests.len())
            .field("engine", &self.engine)
            .field("company_types", &self.company_types)
            .field("db_pool", &self.db_pool.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Empty state with default configuration, no fee rules and no database.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Empty state with the given configuration.
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            requests: Store::new(),
            next_request_id: Arc::new(AtomicU64::new(1)),
            write_gate: Arc::new(tokio::sync::Mutex::new(())),
            engine: WorkflowEngine::new(NameNormalizer::default(), Arc::new(FeeSchedule::new())),
            dispatcher: SideEffectDispatcher::in_memory(),
            company_types: Arc::new(BTreeSet::new()),
            db_pool: None,
            config,
        }
    }

    pub fn with_engine(mut self, engine: WorkflowEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: SideEffectDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_company_types(mut self, ids: impl IntoIterator<Item = CompanyTypeId>) -> Self {
        self.company_types = Arc::new(ids.into_iter().collect());
        self
    }

    pub fn with_db_pool(mut self, pool: Option<PgPool>) -> Self {
        self.db_pool = pool;
        self
    }

    /// Reserve the next request id.
    pub fn allocate_request_id(&self) -> RequestId {
        RequestId(self.next_request_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Whether `id` names a known company type.
    pub fn knows_company_type(&self, id: CompanyTypeId) -> bool {
        self.company_types.is_empty() || self.company_types.contains(&id)
    }

    /// Wait for exclusive write access to the request store.
    pub async fn begin_write(&self) -> WriteTicket<'_> {
        WriteTicket {
            _guard: self.write_gate.lock().await,
        }
    }

    /// Finish an operation decided under `ticket`: persist the new version,
    /// swap it into the store, release the ticket, then log the transition
    /// and dispatch its side effects.
    ///
    /// A failed database write fails the call and leaves the store, the audit
    /// chain and every subscriber untouched. Unchanged outcomes return
    /// immediately. Dispatch failures are logged by the dispatcher and never
    /// fail the call.
    pub async fn commit(&self, ticket: WriteTicket<'_>, outcome: Outcome) -> Result<Request, AppError> {
        let (request, effects) = match outcome {
            Outcome::Unchanged(request) => return Ok(request),
            Outcome::Committed(committed) => (committed.request, committed.effects),
        };
        if let Some(pool) = &self.db_pool {
            persist(pool, &request).await?;
        }
        self.requests.insert(request.id, request.clone());
        drop(ticket);

        if let Some(last) = request.history.last() {
            tracing::info!(
                request_id = request.id.get(),
                from = ?last.from_status,
                to = %last.to_status,
                actor = last.actor.get(),
                action = %last.kind,
                version = request.version,
                "request transition committed"
            );
        }
        self.dispatcher.dispatch(effects).await;
        Ok(request)
    }

    /// Re-check the audit chain and log the result. Called once on startup.
    pub async fn verify_audit_chain(&self) -> Result<ChainIntegrity, String> {
        let report = self
            .dispatcher
            .verify_audit_chain()
            .await
            .map_err(|e| format!("failed to verify audit chain: {e}"))?;
        if report.is_valid() {
            tracing::info!(events = report.total_events, "audit chain verified");
        } else {
            tracing::error!(
                events = report.total_events,
                broken_links = report.broken_links,
                altered_events = report.altered_events,
                "audit chain failed verification"
            );
        }
        Ok(report)
    }

    /// Hydrate the in-memory store from the database.
    ///
    /// Called once on startup when a database pool is available. Also moves
    /// the id sequence past the highest persisted id.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let requests = crate::db::requests::load_all(pool)
            .await
            .map_err(|e| format!("failed to load requests: {e}"))?;
        let count = requests.len();
        let max_id = requests.iter().map(|r| r.id.get()).max().unwrap_or(0);
        for request in requests {
            self.requests.insert(request.id, request);
        }
        self.next_request_id.fetch_max(max_id + 1, Ordering::SeqCst);

        tracing::info!(requests = count, next_id = max_id + 1, "Hydrated in-memory store from database");
        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Write one request version through to Postgres.
///
/// The store has not been touched yet, so any failure here is a clean
/// failure of the whole operation.
async fn persist(pool: &PgPool, request: &Request) -> Result<(), AppError> {
    match crate::db::requests::save(pool, request).await {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::error!(
                request_id = request.id.get(),
                version = request.version,
                "database already holds this version or a newer one, store left unchanged"
            );
            Err(AppError::Internal(
                "database copy is ahead of the in-memory store".to_string(),
            ))
        }
        Err(e) => {
            tracing::error!(
                request_id = request.id.get(),
                error = %e,
                "failed to persist request to database, store left unchanged"
            );
            Err(AppError::Internal("database persist failed".to_string()))
        }
    }
}
