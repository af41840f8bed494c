//! # Transitions Subcommand
//!
//! Prints the legal transition table, optionally only the rules leaving
//! one status.

use std::str::FromStr;

use clap::Args;
use tnr_state::{RequestStatus, TRANSITIONS};

#[derive(Args, Debug)]
pub struct TransitionsArgs {
    /// Only rules leaving this status, e.g. `IN_AUDITING`.
    #[arg(long)]
    pub from: Option<String>,
}

pub fn run_transitions(args: &TransitionsArgs) -> anyhow::Result<String> {
    let from = args
        .from
        .as_deref()
        .map(RequestStatus::from_str)
        .transpose()
        .map_err(anyhow::Error::msg)?;

    let mut lines = Vec::new();
    for rule in TRANSITIONS {
        if let Some(from) = from {
            if !rule.from.contains(&from) {
                continue;
            }
        }
        let sources = if rule.from.is_empty() {
            "(submission)".to_string()
        } else {
            rule.from.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" | ")
        };
        let via = if rule.via_transition { "" } else { "  [dedicated]" };
        lines.push(format!("{:<30} {} -> {}{via}", rule.action.as_str(), sources, rule.to));
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_table_has_one_line_per_rule() {
        let out = run_transitions(&TransitionsArgs { from: None }).unwrap();
        assert_eq!(out.lines().count(), TRANSITIONS.len());
    }

    #[test]
    fn filter_by_source_status() {
        let out = run_transitions(&TransitionsArgs { from: Some("awaiting_payment".into()) }).unwrap();
        assert!(out.contains("-> IN_AUDITING  [dedicated]"));
        assert!(out.contains("-> CANCELLED_FOR_NON_COMPLETION"));
        assert!(!out.contains("PENDING_DIRECTOR_REVIEW"));
    }

    #[test]
    fn terminal_status_has_no_rules() {
        let out = run_transitions(&TransitionsArgs { from: Some("REJECTED".into()) }).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn unknown_status_is_error() {
        assert!(run_transitions(&TransitionsArgs { from: Some("LIMBO".into()) }).is_err());
    }
}
