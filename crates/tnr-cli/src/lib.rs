//! # tnr-cli: Trade Name Registry Command-Line Interface
//!
//! Offline operator tooling. Nothing here talks to the API or a database.
//!
//! ## Subcommands
//!
//! - `normalize`, `compare`: canonical name keys and equivalence
//! - `quote`: fee quote for a province from a registry config file
//! - `transitions`: the legal status transition table
//!
//! Argument parsing lives in each module's `Args` struct; handlers only
//! format what the domain crates compute.

pub mod fees;
pub mod names;
pub mod transitions;
