//! # Name Collision Resolver
//!
//! Folds a proposed trade name to a canonical key and decides whether an
//! equivalent name is already reserved or under review.
//!
//! ## Canonical form
//!
//! 1. Lowercase; Arabic letter variants folded (alef forms → ا, ة → ه,
//!    ى/ی → ي, ک → ك); tatweel and diacritics dropped; Arabic-Indic digits
//!    mapped to ASCII; every other non-alphanumeric becomes a separator.
//! 2. Split on whitespace.
//! 3. Attached Arabic article/connector prefixes (وال, بال, لل, ال) are
//!    stripped repeatedly while at least two letters remain.
//! 4. Decoration tokens (entity-type words, honorifics, connectors) are
//!    removed. A name made only of decoration keeps its stripped tokens.
//! 5. Tokens rejoined with single spaces.
//!
//! Two names are equivalent iff their keys are identical.
//!
//! ## Lookup
//!
//! Candidates come from a [`CandidateSource`] that only has to apply a cheap
//! broad filter: the candidate's folded text contains the probe's leading
//! key token, or either raw name contains the other. Every exact match passes
//! that filter, so the in-process key comparison that follows is
//! authoritative.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tnr_core::{ProvinceId, RequestId, Timestamp, ValidationError};

use crate::request::{Request, RequestStatus};

/// Maximum accepted length of a proposed name, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Arabic article and connector prefixes, longest first.
const PREFIXES: [&str; 4] = ["وال", "بال", "لل", "ال"];

/// Entity-type, honorific, and connector tokens, already in folded form.
const DECORATION: &[&str] = &[
    // Arabic entity-type words and connectors.
    "شركه", "مؤسسه", "مساهمه", "محدوده", "مسؤوليه", "ذات", "تضامن", "توصيه", "بسيطه",
    "عامه", "خاصه", "و", "في", "من", "سيد", "حاج",
    // English / transliterated.
    "company", "co", "corp", "corporation", "inc", "incorporated", "ltd", "limited", "llc",
    "plc", "est", "establishment", "the", "and", "of", "for", "al", "el", "mr", "mrs",
];

/// Errors from the resolver. "No match" is never an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// The proposed name is empty or has no comparable content.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The candidate source could not be read.
    #[error("candidate source unavailable: {0}")]
    SourceUnavailable(String),
}

// ─── Folding ─────────────────────────────────────────────────────────

/// Character-level fold: case, Arabic letter variants, marks, digits,
/// separators. Does not tokenize.
pub fn fold(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        match c {
            'أ' | 'إ' | 'آ' | 'ٱ' => out.push('ا'),
            'ة' => out.push('ه'),
            'ى' | 'ی' => out.push('ي'),
            'ک' => out.push('ك'),
            '\u{0640}' => {}
            '\u{0300}'..='\u{036F}'
            | '\u{064B}'..='\u{065F}'
            | '\u{0670}'
            | '\u{06D6}'..='\u{06ED}' => {}
            '\u{0660}'..='\u{0669}' => out.push(shift_digit(c, '\u{0660}')),
            '\u{06F0}'..='\u{06F9}' => out.push(shift_digit(c, '\u{06F0}')),
            c if c.is_alphanumeric() => out.push(c),
            _ => out.push(' '),
        }
    }
    out
}

fn shift_digit(c: char, zero: char) -> char {
    let offset = (c as u32).saturating_sub(zero as u32);
    char::from_digit(offset, 10).unwrap_or('0')
}

fn strip_prefixes(token: &str) -> &str {
    let mut current = token;
    'outer: loop {
        for prefix in PREFIXES {
            if let Some(rest) = current.strip_prefix(prefix) {
                if rest.chars().count() >= 2 {
                    current = rest;
                    continue 'outer;
                }
            }
        }
        return current;
    }
}

// ─── Normalizer ──────────────────────────────────────────────────────

/// Canonicalizes names against a set of decoration tokens.
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    decoration: BTreeSet<String>,
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self {
            decoration: DECORATION.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl NameNormalizer {
    /// Add registry-specific decoration tokens. Each token goes through the
    /// same fold and prefix stripping as names do.
    pub fn with_extra_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for token in tokens {
            let folded = fold(token.as_ref());
            for part in folded.split_whitespace() {
                self.decoration.insert(strip_prefixes(part).to_string());
            }
        }
        self
    }

    /// Whether `token` (in folded, stripped form) is decoration.
    pub fn is_decoration(&self, token: &str) -> bool {
        self.decoration.contains(token)
    }

    /// Canonical key of `raw`. Empty only when `raw` has no alphanumeric content.
    pub fn normalize(&self, raw: &str) -> String {
        let folded = fold(raw);
        let stripped: Vec<&str> = folded.split_whitespace().map(strip_prefixes).collect();
        let kept: Vec<&str> = stripped
            .iter()
            .copied()
            .filter(|t| !self.is_decoration(t))
            .collect();
        if kept.is_empty() {
            stripped.join(" ")
        } else {
            kept.join(" ")
        }
    }

    /// Whether two names are equivalent.
    pub fn equivalent(&self, a: &str, b: &str) -> bool {
        let key = self.normalize(a);
        !key.is_empty() && key == self.normalize(b)
    }

    /// Validate and canonicalize a proposed name for lookup.
    pub fn probe(&self, raw: &str) -> Result<NameProbe, ResolverError> {
        let raw = tnr_core::error::require_text("name", raw, MAX_NAME_LEN)?;
        let key = self.normalize(&raw);
        if key.is_empty() {
            return Err(ValidationError::Empty { field: "name" }.into());
        }
        Ok(NameProbe { raw, key })
    }

    /// Check one proposed name.
    pub fn check<S>(
        &self,
        source: &S,
        name: &str,
        exclude: Option<RequestId>,
    ) -> Result<CollisionReport, ResolverError>
    where
        S: CandidateSource + ?Sized,
    {
        self.check_names(source, &[name], exclude)
    }

    /// Check every given name (local and foreign) against both names of each
    /// existing request. The report carries the first name and its key.
    pub fn check_names<S>(
        &self,
        source: &S,
        names: &[&str],
        exclude: Option<RequestId>,
    ) -> Result<CollisionReport, ResolverError>
    where
        S: CandidateSource + ?Sized,
    {
        let probes = names
            .iter()
            .map(|n| self.probe(n))
            .collect::<Result<Vec<_>, _>>()?;
        let Some(first) = probes.first() else {
            return Err(ValidationError::Empty { field: "name" }.into());
        };

        let mut found: HashMap<RequestId, NameMatch> = HashMap::new();
        for probe in &probes {
            for candidate in source.candidates(probe)? {
                if Some(candidate.request_id) == exclude || !candidate.status.blocks_name() {
                    continue;
                }
                let matched_field = if self.normalize(&candidate.name) == probe.key {
                    MatchedField::Name
                } else if candidate
                    .name_en
                    .as_deref()
                    .is_some_and(|en| self.normalize(en) == probe.key)
                {
                    MatchedField::NameEn
                } else {
                    continue;
                };
                found.entry(candidate.request_id).or_insert(NameMatch {
                    request_id: candidate.request_id,
                    status: candidate.status,
                    province_id: candidate.province_id,
                    created_at: candidate.created_at,
                    matched_field,
                });
            }
        }

        let mut matches: Vec<NameMatch> = found.into_values().collect();
        matches.sort_by_key(|m| m.request_id);
        Ok(CollisionReport {
            name: first.raw.clone(),
            key: first.key.clone(),
            available: matches.is_empty(),
            match_count: matches.len(),
            matches,
        })
    }
}

/// A validated, canonicalized lookup name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameProbe {
    /// The trimmed name as submitted.
    pub raw: String,
    /// Canonical key.
    pub key: String,
}

impl NameProbe {
    /// First token of the key, the broad-filter anchor.
    pub fn leading_token(&self) -> &str {
        self.key.split(' ').next().unwrap_or("")
    }

    /// Cheap superset filter over a candidate's raw name.
    pub fn may_match(&self, candidate_raw: &str) -> bool {
        let folded = fold(candidate_raw);
        if folded.contains(self.leading_token()) {
            return true;
        }
        let a = candidate_raw.to_lowercase();
        let b = self.raw.to_lowercase();
        a.contains(&b) || b.contains(&a)
    }
}

// ─── Candidates ──────────────────────────────────────────────────────

/// The slice of a request the resolver compares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCandidate {
    pub request_id: RequestId,
    pub name: String,
    pub name_en: Option<String>,
    pub status: RequestStatus,
    pub province_id: ProvinceId,
    pub created_at: Timestamp,
}

impl From<&Request> for NameCandidate {
    fn from(r: &Request) -> Self {
        Self {
            request_id: r.id,
            name: r.name.clone(),
            name_en: r.name_en.clone(),
            status: r.status,
            province_id: r.province_id,
            created_at: r.created_at,
        }
    }
}

/// Read query returning a superset of the requests whose name may be
/// equivalent to the probe.
pub trait CandidateSource {
    fn candidates(&self, probe: &NameProbe) -> Result<Vec<NameCandidate>, ResolverError>;
}

fn broad_filter<'a>(
    requests: impl Iterator<Item = &'a Request>,
    probe: &NameProbe,
) -> Vec<NameCandidate> {
    requests
        .filter(|r| {
            probe.may_match(&r.name) || r.name_en.as_deref().is_some_and(|en| probe.may_match(en))
        })
        .map(NameCandidate::from)
        .collect()
}

impl CandidateSource for HashMap<RequestId, Request> {
    fn candidates(&self, probe: &NameProbe) -> Result<Vec<NameCandidate>, ResolverError> {
        Ok(broad_filter(self.values(), probe))
    }
}

impl CandidateSource for [Request] {
    fn candidates(&self, probe: &NameProbe) -> Result<Vec<NameCandidate>, ResolverError> {
        Ok(broad_filter(self.iter(), probe))
    }
}

// ─── Report ──────────────────────────────────────────────────────────

/// Which name of the existing request matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedField {
    Name,
    NameEn,
}

/// One blocking equivalent request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameMatch {
    pub request_id: RequestId,
    pub status: RequestStatus,
    pub province_id: ProvinceId,
    pub created_at: Timestamp,
    pub matched_field: MatchedField,
}

/// Result of a name check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionReport {
    /// The name as submitted (trimmed).
    pub name: String,
    /// Its canonical key.
    pub key: String,
    /// No blocking equivalent exists.
    pub available: bool,
    /// Number of blocking equivalents.
    pub match_count: usize,
    /// The blocking equivalents, ordered by request id.
    pub matches: Vec<NameMatch>,
}
