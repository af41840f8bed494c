//! # tnr CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Trade Name Registry operator tooling.
#[derive(Parser, Debug)]
#[command(name = "tnr", version, about)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the canonical key of a name.
    Normalize(tnr_cli::names::NormalizeArgs),
    /// Report whether two names collide.
    Compare(tnr_cli::names::CompareArgs),
    /// Quote the fee for one province, or for every province with rules.
    Quote(tnr_cli::fees::QuoteArgs),
    /// Print the legal status transitions.
    Transitions(tnr_cli::transitions::TransitionsArgs),
}

fn log_filter(verbose: u8) -> EnvFilter {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Normalize(args) => println!("{}", tnr_cli::names::run_normalize(&args)?),
        Commands::Compare(args) => {
            let (text, equivalent) = tnr_cli::names::run_compare(&args)?;
            println!("{text}");
            if !equivalent {
                std::process::exit(1);
            }
        }
        Commands::Quote(args) => println!("{}", tnr_cli::fees::run_quote(&args)?),
        Commands::Transitions(args) => println!("{}", tnr_cli::transitions::run_transitions(&args)?),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::parse_from(["tnr", "-vv", "transitions"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Transitions(_)));
    }

    #[test]
    fn quote_requires_config_and_takes_optional_province() {
        assert!(Cli::try_parse_from(["tnr", "quote", "--province", "1"]).is_err());
        let cli = Cli::try_parse_from(["tnr", "quote", "--config", "r.yaml", "--province", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::Quote(a) if a.province == Some(3)));
        let cli = Cli::try_parse_from(["tnr", "quote", "--config", "r.yaml"]).unwrap();
        assert!(matches!(cli.command, Commands::Quote(a) if a.province.is_none()));
    }
}
