//! # Side-Effect Dispatcher
//!
//! Executes the [`SideEffect`] intents returned by a committed operation:
//! audit append, notification delivery and the live-dashboard broadcast.
//!
//! Dispatch runs after the store commit. A failed effect is logged at
//! `warn!` and dropped; it never rolls back or fails the operation.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tnr_state::{AuditEntry, Notification, RequestSummary, SideEffect};
use tokio::sync::broadcast;

use crate::db::audit::{chain_hash, verify_links, ChainIntegrity, ChainLink, GENESIS_HASH};

/// Events re-checked when verifying the Postgres chain.
const PG_VERIFY_WINDOW: i64 = 100_000;

/// Capacity of the dashboard broadcast channel. Slow subscribers lag and
/// skip messages rather than block dispatch.
const BROADCAST_CAPACITY: usize = 256;

/// Side-effect delivery failures.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("audit sink failed: {0}")]
    Audit(String),

    #[error("notification transport failed: {0}")]
    Transport(String),
}

// ── Audit sinks ─────────────────────────────────────────────────────────────

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), DispatchError>;

    /// Re-check the chain recorded so far.
    async fn verify(&self) -> Result<ChainIntegrity, DispatchError>;
}

/// One link of the in-memory audit chain.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChainedEntry {
    entry: AuditEntry,
    previous_hash: String,
    hash: String,
}

/// Hash-chained audit log held in process memory.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    chain: Mutex<Vec<ChainedEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute every link of the chain.
    pub fn integrity(&self) -> ChainIntegrity {
        let chain = self.chain.lock();
        verify_links(chain.iter().map(|link| ChainLink {
            entry: Some(&link.entry),
            previous_hash: &link.previous_hash,
            hash: &link.hash,
        }))
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn append(&self, entry: &AuditEntry) -> Result<(), DispatchError> {
        let mut chain = self.chain.lock();
        let previous_hash = chain
            .last()
            .map_or_else(|| GENESIS_HASH.to_string(), |c| c.hash.clone());
        let hash = chain_hash(&previous_hash, entry);
        chain.push(ChainedEntry {
            entry: entry.clone(),
            previous_hash,
            hash,
        });
        Ok(())
    }

    async fn verify(&self) -> Result<ChainIntegrity, DispatchError> {
        Ok(self.integrity())
    }
}

/// Appends to the Postgres `audit_events` chain.
///
/// Appends from this process are serialized so two commits cannot read the
/// same previous hash.
pub struct PgAuditSink {
    pool: sqlx::PgPool,
    serial: tokio::sync::Mutex<()>,
}

impl PgAuditSink {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            pool,
            serial: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<(), DispatchError> {
        let _guard = self.serial.lock().await;
        crate::db::audit::append(&self.pool, entry)
            .await
            .map(|_| ())
            .map_err(|e| DispatchError::Audit(e.to_string()))
    }

    async fn verify(&self) -> Result<ChainIntegrity, DispatchError> {
        crate::db::audit::verify_chain_integrity(&self.pool, PG_VERIFY_WINDOW)
            .await
            .map_err(|e| DispatchError::Audit(e.to_string()))
    }
}

// ── Notification transports ─────────────────────────────────────────────────

/// Delivers notifications to their recipients.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), DispatchError>;
}

/// Writes notifications to the log. Used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn send(&self, notification: &Notification) -> Result<(), DispatchError> {
        tracing::info!(
            request_id = notification.request_id.get(),
            target = ?notification.target,
            category = %notification.category,
            title = %notification.title,
            "notification"
        );
        Ok(())
    }
}

/// POSTs each notification as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    client: reqwest::Client,
    url: url::Url,
}

impl WebhookTransport {
    pub fn new(url: url::Url) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationTransport for WebhookTransport {
    async fn send(&self, notification: &Notification) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(notification)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DispatchError::Transport(format!(
                "webhook responded with {}",
                response.status()
            )));
        }
        Ok(())
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────────────

/// Counts from one dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Routes side-effect intents to their sinks.
#[derive(Clone)]
pub struct SideEffectDispatcher {
    audit: Arc<dyn AuditSink>,
    transport: Arc<dyn NotificationTransport>,
    broadcast: broadcast::Sender<RequestSummary>,
}

impl std::fmt::Debug for SideEffectDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SideEffectDispatcher")
            .field("subscribers", &self.broadcast.receiver_count())
            .finish_non_exhaustive()
    }
}

impl SideEffectDispatcher {
    pub fn new(audit: Arc<dyn AuditSink>, transport: Arc<dyn NotificationTransport>) -> Self {
        let (broadcast, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            audit,
            transport,
            broadcast,
        }
    }

    /// In-memory audit chain and log-only notifications.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryAuditLog::new()), Arc::new(LogTransport))
    }

    /// Re-check the audit chain held by the configured sink.
    pub async fn verify_audit_chain(&self) -> Result<ChainIntegrity, DispatchError> {
        self.audit.verify().await
    }

    /// Live feed of request summaries after each commit.
    pub fn subscribe(&self) -> broadcast::Receiver<RequestSummary> {
        self.broadcast.subscribe()
    }

    /// Execute every intent in order. Failures are logged and counted.
    pub async fn dispatch(&self, effects: Vec<SideEffect>) -> DispatchReport {
        let mut report = DispatchReport::default();
        for effect in effects {
            let label = effect.label();
            let request_id = match &effect {
                SideEffect::Audit(e) => e.request_id,
                SideEffect::Notify(n) => n.request_id,
                SideEffect::Broadcast(s) => s.id,
            };
            let result = match &effect {
                SideEffect::Audit(entry) => self.audit.append(entry).await,
                SideEffect::Notify(notification) => self.transport.send(notification).await,
                SideEffect::Broadcast(summary) => {
                    // No subscribers is not a failure.
                    let _ = self.broadcast.send(summary.clone());
                    Ok(())
                }
            };
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        request_id = request_id.get(),
                        effect = label,
                        error = %e,
                        "side effect failed"
                    );
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tnr_core::{RequestId, Role, Timestamp, UserId};
    use tnr_state::{ActionKind, NotificationTarget, RequestStatus};

    fn entry(id: u64, after: RequestStatus) -> AuditEntry {
        AuditEntry {
            request_id: RequestId(id),
            actor: UserId(5),
            role: Some(Role::Auditor),
            action: ActionKind::AuditClaimTaken,
            before: Some(RequestStatus::New),
            after,
            summary: "claim".into(),
            origin: None,
            at: Timestamp::now(),
        }
    }

    fn notification(id: u64) -> Notification {
        Notification {
            target: NotificationTarget::Role(Role::Auditor),
            title: "t".into(),
            body: "b".into(),
            category: "c".into(),
            request_id: RequestId(id),
        }
    }

    fn summary(id: u64) -> RequestSummary {
        RequestSummary {
            id: RequestId(id),
            name: "Furat".into(),
            status: RequestStatus::InAuditing,
            province_id: tnr_core::ProvinceId(1),
            audit_claim_holder: Some(UserId(5)),
            ip_claim_holder: None,
            version: 2,
            updated_at: Timestamp::now(),
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl NotificationTransport for FailingTransport {
        async fn send(&self, _: &Notification) -> Result<(), DispatchError> {
            Err(DispatchError::Transport("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn memory_log_chains_and_verifies() {
        let log = MemoryAuditLog::new();
        assert_eq!(log.integrity(), ChainIntegrity::default());
        log.append(&entry(1, RequestStatus::InAuditing)).await.unwrap();
        log.append(&entry(2, RequestStatus::InAuditing)).await.unwrap();
        {
            let chain = log.chain.lock();
            assert_eq!(chain[0].previous_hash, GENESIS_HASH);
            assert_eq!(chain[1].previous_hash, chain[0].hash);
        }
        let report = log.verify().await.unwrap();
        assert_eq!(report.total_events, 2);
        assert!(report.is_valid());
    }

    #[tokio::test]
    async fn tampering_breaks_verification() {
        let log = MemoryAuditLog::new();
        log.append(&entry(1, RequestStatus::InAuditing)).await.unwrap();
        log.append(&entry(2, RequestStatus::InAuditing)).await.unwrap();
        log.chain.lock()[0].entry.actor = UserId(999);
        assert_eq!(log.integrity().altered_events, 1);

        log.chain.lock()[1].entry.summary = "nothing to see".into();
        assert_eq!(log.integrity().altered_events, 2);
    }

    #[tokio::test]
    async fn dispatcher_verifies_through_its_sink() {
        let log = Arc::new(MemoryAuditLog::new());
        let dispatcher = SideEffectDispatcher::new(log.clone(), Arc::new(LogTransport));
        dispatcher
            .dispatch(vec![SideEffect::Audit(entry(1, RequestStatus::InAuditing))])
            .await;
        let report = dispatcher.verify_audit_chain().await.unwrap();
        assert_eq!(report.total_events, 1);
        assert!(report.is_valid());
    }

    #[tokio::test]
    async fn transport_failure_is_counted_not_propagated() {
        let log = Arc::new(MemoryAuditLog::new());
        let dispatcher = SideEffectDispatcher::new(log.clone(), Arc::new(FailingTransport));
        let report = dispatcher
            .dispatch(vec![
                SideEffect::Audit(entry(1, RequestStatus::InAuditing)),
                SideEffect::Notify(notification(1)),
                SideEffect::Broadcast(summary(1)),
            ])
            .await;
        assert_eq!(report, DispatchReport { delivered: 2, failed: 1 });
        assert_eq!(log.integrity().total_events, 1);
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let dispatcher = SideEffectDispatcher::in_memory();
        let mut rx = dispatcher.subscribe();
        dispatcher.dispatch(vec![SideEffect::Broadcast(summary(7))]).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, RequestId(7));
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_fine() {
        let dispatcher = SideEffectDispatcher::in_memory();
        let report = dispatcher.dispatch(vec![SideEffect::Broadcast(summary(7))]).await;
        assert_eq!(report.failed, 0);
    }
}
