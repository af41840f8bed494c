//! # Name Subcommands
//!
//! `normalize` prints the canonical key of a name. `compare` reports
//! whether two names would collide.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use tnr_api::bootstrap::RegistryConfig;
use tnr_state::NameNormalizer;

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Name to normalize.
    pub name: String,

    /// Registry config whose extra decoration tokens apply.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print JSON instead of the bare key.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    pub first: String,
    pub second: String,

    /// Registry config whose extra decoration tokens apply.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Normalized<'a> {
    name: &'a str,
    key: String,
}

fn normalizer(config: Option<&PathBuf>) -> anyhow::Result<NameNormalizer> {
    match config {
        Some(path) => Ok(RegistryConfig::load(path)?.normalizer()),
        None => Ok(NameNormalizer::default()),
    }
}

pub fn run_normalize(args: &NormalizeArgs) -> anyhow::Result<String> {
    let key = normalizer(args.config.as_ref())?.normalize(&args.name);
    tracing::debug!(name = %args.name, key = %key, "normalized");
    if args.json {
        return Ok(serde_json::to_string_pretty(&Normalized { name: &args.name, key })?);
    }
    Ok(key)
}

/// Exit code 0 when the names collide, 1 when they are distinct.
pub fn run_compare(args: &CompareArgs) -> anyhow::Result<(String, bool)> {
    let n = normalizer(args.config.as_ref())?;
    let a = n.normalize(&args.first);
    let b = n.normalize(&args.second);
    let equivalent = a == b;
    let verdict = if equivalent { "EQUIVALENT" } else { "DISTINCT" };
    Ok((format!("{verdict}\n  {a}\n  {b}"), equivalent))
}
