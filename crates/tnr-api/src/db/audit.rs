//! Audit event persistence: an immutable hash chain.
//!
//! Every committed request action appends one event whose SHA-256 hash
//! covers the previous event's hash and every field of the entry, making
//! the log tamper-evident. The in-memory audit log uses the same
//! [`chain_hash`] and [`verify_links`].

use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tnr_state::AuditEntry;
use uuid::Uuid;

use super::to_i64;

/// Previous-hash value of the first event in a chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// SHA-256 over the previous hash and all of the entry's fields.
///
/// Each field is length-prefixed so free-text fields (summary, origin)
/// cannot shift content across a field boundary.
pub fn chain_hash(previous: &str, entry: &AuditEntry) -> String {
    let request_id = entry.request_id.get().to_string();
    let actor = entry.actor.get().to_string();
    let at = entry.at.to_rfc3339();
    let fields: [&str; 10] = [
        previous,
        &request_id,
        &actor,
        entry.role.map_or("", |r| r.as_str()),
        entry.action.as_str(),
        entry.before.map_or("", |s| s.as_str()),
        entry.after.as_str(),
        &entry.summary,
        entry.origin.as_deref().unwrap_or(""),
        &at,
    ];

    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// Outcome of walking an audit chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainIntegrity {
    pub total_events: usize,
    /// Events whose previous hash is not the hash of the event before them.
    pub broken_links: usize,
    /// Events whose stored hash no longer matches their content.
    pub altered_events: usize,
}

impl ChainIntegrity {
    pub fn is_valid(&self) -> bool {
        self.broken_links == 0 && self.altered_events == 0
    }
}

/// One stored link: the entry (if it could be decoded), its recorded
/// previous hash and its recorded hash.
pub struct ChainLink<'a> {
    pub entry: Option<&'a AuditEntry>,
    pub previous_hash: &'a str,
    pub hash: &'a str,
}

/// Walk links oldest first, checking continuity and recomputing hashes.
/// An entry that could not be decoded counts as altered.
pub fn verify_links<'a>(links: impl IntoIterator<Item = ChainLink<'a>>) -> ChainIntegrity {
    let mut report = ChainIntegrity::default();
    let mut expected_previous: &str = GENESIS_HASH;
    for link in links {
        report.total_events += 1;
        if link.previous_hash != expected_previous {
            report.broken_links += 1;
        }
        let intact = link
            .entry
            .is_some_and(|entry| chain_hash(link.previous_hash, entry) == link.hash);
        if !intact {
            report.altered_events += 1;
        }
        expected_previous = link.hash;
    }
    report
}

/// Append an audit event, chaining it to the most recent one.
pub async fn append(pool: &PgPool, entry: &AuditEntry) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();

    let previous_hash: Option<String> =
        sqlx::query_scalar("SELECT event_hash FROM audit_events ORDER BY seq DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;
    let prev = previous_hash.as_deref().unwrap_or(GENESIS_HASH);
    let event_hash = chain_hash(prev, entry);
    let metadata = serde_json::to_value(entry).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    sqlx::query(
        "INSERT INTO audit_events (id, request_id, actor_id, role, action, status_before,
         status_after, summary, origin, metadata, previous_hash, event_hash, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(id)
    .bind(to_i64(entry.request_id.get())?)
    .bind(to_i64(entry.actor.get())?)
    .bind(entry.role.map(|r| r.as_str()))
    .bind(entry.action.as_str())
    .bind(entry.before.map(|s| s.as_str()))
    .bind(entry.after.as_str())
    .bind(&entry.summary)
    .bind(&entry.origin)
    .bind(&metadata)
    .bind(prev)
    .bind(&event_hash)
    .bind(*entry.at.as_datetime())
    .execute(pool)
    .await?;

    Ok(id)
}

/// Verify the first `limit` events: link continuity, and each hash
/// recomputed from the stored entry document.
pub async fn verify_chain_integrity(pool: &PgPool, limit: i64) -> Result<ChainIntegrity, sqlx::Error> {
    let rows = sqlx::query_as::<_, StoredEvent>(
        "SELECT metadata, previous_hash, event_hash FROM audit_events ORDER BY seq ASC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(verify_stored(&rows))
}

fn verify_stored(rows: &[StoredEvent]) -> ChainIntegrity {
    let decoded: Vec<Option<AuditEntry>> = rows
        .iter()
        .map(|row| serde_json::from_value(row.metadata.clone()).ok())
        .collect();
    verify_links(rows.iter().zip(&decoded).map(|(row, entry)| ChainLink {
        entry: entry.as_ref(),
        previous_hash: &row.previous_hash,
        hash: &row.event_hash,
    }))
}

/// The columns needed to re-verify one audit event.
#[derive(Debug, sqlx::FromRow)]
struct StoredEvent {
    metadata: serde_json::Value,
    previous_hash: String,
    event_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tnr_core::{RequestId, Role, Timestamp, UserId};
    use tnr_state::{ActionKind, RequestStatus};

    fn entry(action: ActionKind, after: RequestStatus) -> AuditEntry {
        AuditEntry {
            request_id: RequestId(3),
            actor: UserId(8),
            role: None,
            action,
            before: None,
            after,
            summary: "s".into(),
            origin: None,
            at: Timestamp::parse("2026-03-01T10:00:00Z").unwrap(),
        }
    }

    fn stored_chain(entries: &[AuditEntry]) -> Vec<StoredEvent> {
        let mut previous = GENESIS_HASH.to_string();
        entries
            .iter()
            .map(|e| {
                let hash = chain_hash(&previous, e);
                let row = StoredEvent {
                    metadata: serde_json::to_value(e).unwrap(),
                    previous_hash: previous.clone(),
                    event_hash: hash.clone(),
                };
                previous = hash;
                row
            })
            .collect()
    }

    #[test]
    fn hash_is_hex_sha256() {
        let h = chain_hash(GENESIS_HASH, &entry(ActionKind::SubmittedFeeExempt, RequestStatus::New));
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_depends_on_previous_and_fields() {
        let e = entry(ActionKind::SubmittedFeeExempt, RequestStatus::New);
        let a = chain_hash(GENESIS_HASH, &e);
        assert_eq!(a, chain_hash(GENESIS_HASH, &e));
        assert_ne!(a, chain_hash(&a, &e));
        assert_ne!(a, chain_hash(GENESIS_HASH, &entry(ActionKind::Accepted, RequestStatus::Accepted)));
    }

    #[test]
    fn hash_covers_role_summary_and_origin() {
        let base = entry(ActionKind::AuditClaimTaken, RequestStatus::InAuditing);
        let original = chain_hash(GENESIS_HASH, &base);

        let mut with_role = base.clone();
        with_role.role = Some(Role::Auditor);
        let mut reworded = base.clone();
        reworded.summary = "rewritten".into();
        let mut relocated = base.clone();
        relocated.origin = Some("10.9.9.9".into());

        for changed in [with_role, reworded, relocated] {
            assert_ne!(chain_hash(GENESIS_HASH, &changed), original);
        }
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let mut a = entry(ActionKind::AuditClaimTaken, RequestStatus::InAuditing);
        a.summary = "x".into();
        a.origin = Some("y|z".into());
        let mut b = a.clone();
        b.summary = "x|y".into();
        b.origin = Some("z".into());
        assert_ne!(chain_hash(GENESIS_HASH, &a), chain_hash(GENESIS_HASH, &b));
    }

    #[test]
    fn intact_stored_chain_verifies() {
        let rows = stored_chain(&[
            entry(ActionKind::SubmittedFeeExempt, RequestStatus::InAuditing),
            entry(ActionKind::AuditClaimTaken, RequestStatus::InAuditing),
        ]);
        let report = verify_stored(&rows);
        assert_eq!(report.total_events, 2);
        assert!(report.is_valid());
    }

    #[test]
    fn rewritten_summary_is_detected() {
        let mut rows = stored_chain(&[
            entry(ActionKind::SubmittedFeeExempt, RequestStatus::InAuditing),
            entry(ActionKind::AuditClaimTaken, RequestStatus::InAuditing),
        ]);
        rows[0].metadata["summary"] = serde_json::json!("nothing happened");
        let report = verify_stored(&rows);
        assert_eq!(report.altered_events, 1);
        assert_eq!(report.broken_links, 0);
        assert!(!report.is_valid());
    }

    #[test]
    fn removed_event_breaks_the_link() {
        let mut rows = stored_chain(&[
            entry(ActionKind::SubmittedFeeExempt, RequestStatus::InAuditing),
            entry(ActionKind::AuditClaimTaken, RequestStatus::InAuditing),
            entry(ActionKind::Accepted, RequestStatus::Accepted),
        ]);
        rows.remove(1);
        let report = verify_stored(&rows);
        assert_eq!(report.broken_links, 1);
        assert!(!report.is_valid());
    }

    #[test]
    fn undecodable_document_counts_as_altered() {
        let mut rows = stored_chain(&[entry(ActionKind::SubmittedFeeExempt, RequestStatus::InAuditing)]);
        rows[0].metadata = serde_json::json!({ "garbage": true });
        assert_eq!(verify_stored(&rows).altered_events, 1);
    }
}
