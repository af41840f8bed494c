//! # Quote Subcommand
//!
//! Fee quotes read from a registry config file, for one province or for
//! every province that has fee rules.

use std::path::PathBuf;

use clap::Args;
use tnr_api::bootstrap::RegistryConfig;
use tnr_core::ProvinceId;
use tnr_state::FeeSchedule;

#[derive(Args, Debug)]
pub struct QuoteArgs {
    /// Registry config file (YAML).
    #[arg(long)]
    pub config: PathBuf,

    /// Province to quote. Omit to quote every province with fee rules.
    #[arg(long)]
    pub province: Option<u64>,
}

fn quote_line(schedule: &FeeSchedule, province: ProvinceId) -> anyhow::Result<String> {
    let amount = tnr_state::fee::quote_fee(schedule, province)?;
    tracing::debug!(province = province.get(), amount, "quoted");
    if amount == 0 {
        return Ok(format!("{province}: no active fee; fee-liable submissions are refused"));
    }
    Ok(format!("{province}: {amount}"))
}

pub fn run_quote(args: &QuoteArgs) -> anyhow::Result<String> {
    let config = RegistryConfig::load(&args.config)?;
    let schedule = config.fee_schedule();
    match args.province {
        Some(raw) => quote_line(&schedule, ProvinceId::new(raw)?),
        None => {
            let lines = schedule
                .provinces()
                .map(|province| quote_line(&schedule, province))
                .collect::<anyhow::Result<Vec<_>>>()?;
            if lines.is_empty() {
                return Ok("no fee rules configured".to_string());
            }
            Ok(lines.join("\n"))
        }
    }
}
