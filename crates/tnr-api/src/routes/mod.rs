//! # API Route Modules
//!
//! - `requests`: the request lifecycle (create, read, payment, claims,
//!   transitions, IP report, registry finalization, striking).
//! - `names`: name availability checks.
//! - `fees`: fee quotes per province.

pub mod fees;
pub mod names;
pub mod requests;

/// Upper bound on one page, whatever the caller asks for.
pub(crate) const MAX_LIMIT: usize = 1000;
pub(crate) const DEFAULT_LIMIT: usize = 100;

/// Slice `items` by a limit/offset pair.
pub(crate) fn paginate<T>(items: Vec<T>, limit: Option<usize>, offset: Option<usize>) -> Vec<T> {
    let offset = offset.unwrap_or(0).min(items.len());
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    items.into_iter().skip(offset).take(limit).collect()
}
