//! # Fee Ledger
//!
//! Quotes the payable fee for a province and owns the invoice sub-lifecycle:
//! issued unpaid at submission, marked paid once by the submitter's
//! confirmation, never re-issued or voided.
//!
//! Amounts are integers in the smallest currency unit. Invoice numbers are
//! `INV-{YYYYMMDDHHMMSS}-{6 hex}`: time-ordered and human-legible, with a
//! random disambiguator instead of a central sequence.

use std::collections::BTreeMap;

use rand_core::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tnr_core::{ArtifactRef, ProvinceId, Timestamp};

/// Attempts at finding an unused invoice number before giving up.
pub const MAX_ISSUE_ATTEMPTS: usize = 8;

/// Fee ledger errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeError {
    /// The province has no active fee, so fee-liable submissions cannot proceed.
    #[error("no active fee configured for {province_id}")]
    NotConfigured { province_id: ProvinceId },

    /// The active rules sum past `u64::MAX`.
    #[error("fee rules for {province_id} overflow")]
    Overflow { province_id: ProvinceId },

    /// An invoice cannot be issued for nothing.
    #[error("invoice amount must be positive")]
    ZeroAmount,

    /// Every candidate invoice number was already taken.
    #[error("could not allocate a unique invoice number after {attempts} attempts")]
    NumberSpaceExhausted { attempts: usize },

    /// The fee-rule table could not be read.
    #[error("fee rules unavailable: {0}")]
    SourceUnavailable(String),
}

// ─── Fee rules ───────────────────────────────────────────────────────

/// One line of a province's fee schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRule {
    pub province_id: ProvinceId,
    /// Label shown on the invoice.
    pub name: String,
    /// Amount in the smallest currency unit.
    pub amount: u64,
    /// Inactive rules are ignored by the quote.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Reader over the province fee-rule table.
pub trait FeeRuleSource: Send + Sync {
    /// All rules (active or not) for `province_id`.
    fn rules_for(&self, province_id: ProvinceId) -> Result<Vec<FeeRule>, FeeError>;
}

/// In-memory fee schedule, keyed by province.
#[derive(Debug, Clone, Default)]
pub struct FeeSchedule {
    rules: BTreeMap<ProvinceId, Vec<FeeRule>>,
}

impl FeeSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule.
    pub fn push(&mut self, rule: FeeRule) {
        self.rules.entry(rule.province_id).or_default().push(rule);
    }

    /// Builder form of [`FeeSchedule::push`].
    pub fn with_rule(mut self, rule: FeeRule) -> Self {
        self.push(rule);
        self
    }

    /// Provinces with at least one rule.
    pub fn provinces(&self) -> impl Iterator<Item = ProvinceId> + '_ {
        self.rules.keys().copied()
    }
}

impl FromIterator<FeeRule> for FeeSchedule {
    fn from_iter<I: IntoIterator<Item = FeeRule>>(iter: I) -> Self {
        let mut schedule = Self::new();
        for rule in iter {
            schedule.push(rule);
        }
        schedule
    }
}

impl FeeRuleSource for FeeSchedule {
    fn rules_for(&self, province_id: ProvinceId) -> Result<Vec<FeeRule>, FeeError> {
        Ok(self.rules.get(&province_id).cloned().unwrap_or_default())
    }
}

/// Sum of all currently-active rules for `province_id`. Zero when none apply.
pub fn quote_fee(source: &dyn FeeRuleSource, province_id: ProvinceId) -> Result<u64, FeeError> {
    source
        .rules_for(province_id)?
        .iter()
        .filter(|r| r.active)
        .try_fold(0u64, |acc, r| acc.checked_add(r.amount))
        .ok_or(FeeError::Overflow { province_id })
}

/// Quote that refuses a zero fee. Used on the fee-liable submission path.
pub fn require_fee(source: &dyn FeeRuleSource, province_id: ProvinceId) -> Result<u64, FeeError> {
    match quote_fee(source, province_id)? {
        0 => Err(FeeError::NotConfigured { province_id }),
        amount => Ok(amount),
    }
}

// ─── Invoices ────────────────────────────────────────────────────────

/// Human-legible, time-ordered invoice number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceNumber(String);

impl InvoiceNumber {
    /// Compose from an issue time and a 24-bit disambiguator.
    pub fn compose(issued_at: Timestamp, disambiguator: u32) -> Self {
        Self(format!(
            "INV-{}-{:06X}",
            issued_at.compact_stamp(),
            disambiguator & 0x00FF_FFFF
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Invoice attached to a fee-liable request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub number: InvoiceNumber,
    /// Quoted amount at creation time.
    pub amount: u64,
    pub issued_at: Timestamp,
    pub paid: bool,
    pub receipt_number: Option<String>,
    pub receipt_artifact: Option<ArtifactRef>,
    pub paid_at: Option<Timestamp>,
}

/// Issue an unpaid invoice, retrying the disambiguator while `is_taken`
/// reports a collision.
pub fn issue_invoice(
    amount: u64,
    issued_at: Timestamp,
    rng: &mut dyn RngCore,
    is_taken: impl Fn(&InvoiceNumber) -> bool,
) -> Result<Invoice, FeeError> {
    if amount == 0 {
        return Err(FeeError::ZeroAmount);
    }
    for _ in 0..MAX_ISSUE_ATTEMPTS {
        let number = InvoiceNumber::compose(issued_at, rng.next_u32());
        if !is_taken(&number) {
            return Ok(Invoice {
                number,
                amount,
                issued_at,
                paid: false,
                receipt_number: None,
                receipt_artifact: None,
                paid_at: None,
            });
        }
    }
    Err(FeeError::NumberSpaceExhausted {
        attempts: MAX_ISSUE_ATTEMPTS,
    })
}

/// Result of a payment confirmation against one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The invoice is now paid.
    Recorded,
    /// Already paid under the same receipt; nothing changed.
    AlreadyRecorded,
    /// Already paid under a different receipt.
    Conflicting,
}

impl Invoice {
    /// Mark paid exactly once. Re-confirming with the same receipt number is
    /// idempotent.
    pub fn confirm(
        &mut self,
        receipt_number: &str,
        receipt_artifact: Option<ArtifactRef>,
        at: Timestamp,
    ) -> PaymentOutcome {
        if self.paid {
            return if self.receipt_number.as_deref() == Some(receipt_number) {
                PaymentOutcome::AlreadyRecorded
            } else {
                PaymentOutcome::Conflicting
            };
        }
        self.paid = true;
        self.receipt_number = Some(receipt_number.to_string());
        self.receipt_artifact = receipt_artifact;
        self.paid_at = Some(at);
        PaymentOutcome::Recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Yields a fixed sequence of `u32`s.
    struct Script(Vec<u32>);

    impl RngCore for Script {
        fn next_u32(&mut self) -> u32 {
            if self.0.is_empty() {
                0
            } else {
                self.0.remove(0)
            }
        }
        fn next_u64(&mut self) -> u64 {
            u64::from(self.next_u32())
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    fn rule(province: u64, amount: u64, active: bool) -> FeeRule {
        FeeRule {
            province_id: ProvinceId(province),
            name: format!("fee-{amount}"),
            amount,
            active,
        }
    }

    fn at() -> Timestamp {
        Timestamp::parse("2026-10-14T09:30:00Z").unwrap()
    }

    #[test]
    fn quote_sums_active_rules_only() {
        let schedule: FeeSchedule = [rule(1, 3000, true), rule(1, 2000, true), rule(1, 900, false), rule(2, 50, true)]
            .into_iter()
            .collect();
        assert_eq!(quote_fee(&schedule, ProvinceId(1)).unwrap(), 5000);
        assert_eq!(quote_fee(&schedule, ProvinceId(2)).unwrap(), 50);
        assert_eq!(quote_fee(&schedule, ProvinceId(3)).unwrap(), 0);
    }

    #[test]
    fn require_fee_rejects_zero() {
        let schedule = FeeSchedule::new().with_rule(rule(1, 700, false));
        assert_eq!(
            require_fee(&schedule, ProvinceId(1)),
            Err(FeeError::NotConfigured { province_id: ProvinceId(1) })
        );
    }

    #[test]
    fn quote_detects_overflow() {
        let schedule = FeeSchedule::new().with_rule(rule(1, u64::MAX, true)).with_rule(rule(1, 1, true));
        assert!(matches!(quote_fee(&schedule, ProvinceId(1)), Err(FeeError::Overflow { .. })));
    }

    #[test]
    fn invoice_number_format() {
        let number = InvoiceNumber::compose(at(), 0xAB_12CD);
        assert_eq!(number.as_str(), "INV-20261014093000-AB12CD");
        // Only 24 bits are used.
        assert_eq!(InvoiceNumber::compose(at(), 0xFF00_0001).as_str(), "INV-20261014093000-000001");
    }

    #[test]
    fn issue_retries_on_collision() {
        let taken = InvoiceNumber::compose(at(), 1);
        let mut rng = Script(vec![1, 2]);
        let invoice = issue_invoice(5000, at(), &mut rng, |n| *n == taken).unwrap();
        assert_eq!(invoice.number, InvoiceNumber::compose(at(), 2));
        assert_eq!(invoice.amount, 5000);
        assert!(!invoice.paid);
    }

    #[test]
    fn issue_gives_up_after_bounded_attempts() {
        let mut rng = Script(Vec::new());
        let err = issue_invoice(10, at(), &mut rng, |_| true).unwrap_err();
        assert_eq!(err, FeeError::NumberSpaceExhausted { attempts: MAX_ISSUE_ATTEMPTS });
    }

    #[test]
    fn issue_rejects_zero_amount() {
        let mut rng = Script(vec![1]);
        assert_eq!(issue_invoice(0, at(), &mut rng, |_| false), Err(FeeError::ZeroAmount));
    }

    #[test]
    fn confirm_is_once_and_idempotent() {
        let mut rng = Script(vec![7]);
        let mut invoice = issue_invoice(5000, at(), &mut rng, |_| false).unwrap();
        assert_eq!(invoice.confirm("RCPT-1", None, at()), PaymentOutcome::Recorded);
        assert_eq!(invoice.confirm("RCPT-1", None, at()), PaymentOutcome::AlreadyRecorded);
        assert_eq!(invoice.confirm("RCPT-2", None, at()), PaymentOutcome::Conflicting);
        assert_eq!(invoice.receipt_number.as_deref(), Some("RCPT-1"));
    }
}
