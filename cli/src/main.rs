//! allot: commitments, proofs and epoch simulations from the command line.

mod config;
mod simulate;

use std::path::PathBuf;

use allot_crypto::commitment_hash;
use allot_proof::{AllocationWitness, Proof, ProofVerifier, PublicInputs, TransparentProofSystem};
use allot_types::Timestamp;
use allot_utils::{format_duration, init_logging, LogFormat};
use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::config::{parse_key32, SimulationConfig};

#[derive(Parser)]
#[command(name = "allot", about = "Private reward allocation epochs")]
struct Cli {
    /// Log level: "trace", "debug", "info", "warn", "error".
    /// Overrides the config file when given.
    #[arg(long, global = true, env = "ALLOT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, global = true, env = "ALLOT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Print the commitment hash of an allocation vector.
    Commit {
        /// Hex salt (32 bytes). Random when omitted.
        #[arg(long)]
        salt: Option<String>,

        /// Comma-separated basis points, one per member index.
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        allocations: Vec<i64>,
    },

    /// Prove an allocation with the transparent proof system.
    Prove {
        /// Hex setup key (32 bytes).
        #[arg(long, env = "ALLOT_SETUP_KEY")]
        setup_key: String,

        /// Hex salt used for the commitment.
        #[arg(long)]
        salt: String,

        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        allocations: Vec<i64>,

        #[arg(long)]
        member_index: u32,

        #[arg(long)]
        member_count: u32,
    },

    /// Check a proof bundle written by `prove`.
    Verify {
        #[arg(long, env = "ALLOT_SETUP_KEY")]
        setup_key: String,

        /// Path to the JSON proof bundle.
        #[arg(long)]
        proof: PathBuf,
    },

    /// Run a full epoch from a TOML config on a simulated clock.
    Simulate {
        #[arg(long)]
        config: PathBuf,
    },
}

/// What `prove` prints and `verify` reads.
#[derive(Debug, Serialize, Deserialize)]
struct ProofBundle {
    proof: Proof,
    public_inputs: PublicInputs,
}

#[derive(Serialize)]
struct CommitOutput {
    salt: String,
    commitment: String,
}

#[derive(Serialize)]
struct VerifyOutput<'a> {
    verifier: &'a str,
    valid: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Commit { salt, allocations } => {
            start_logging(cli.log_format, cli.log_level.as_deref())?;
            let salt = match salt {
                Some(salt) => parse_key32("salt", &salt)?,
                None => simulate::random_bytes()?,
            };
            let witness = AllocationWitness::from_slice(salt, &allocations)?;
            print_json(&CommitOutput {
                salt: hex::encode(salt),
                commitment: commitment_hash(&witness.salt, &witness.allocations).to_string(),
            })
        }
        Command::Prove {
            setup_key,
            salt,
            allocations,
            member_index,
            member_count,
        } => {
            start_logging(cli.log_format, cli.log_level.as_deref())?;
            let system = TransparentProofSystem::new(parse_key32("setup_key", &setup_key)?);
            let witness = AllocationWitness::from_slice(parse_key32("salt", &salt)?, &allocations)?;
            let (proof, public_inputs) = system
                .prove(&witness, member_index, member_count)
                .context("allocation does not satisfy the constraint system")?;
            print_json(&ProofBundle {
                proof,
                public_inputs,
            })
        }
        Command::Verify { setup_key, proof } => {
            start_logging(cli.log_format, cli.log_level.as_deref())?;
            let system = TransparentProofSystem::new(parse_key32("setup_key", &setup_key)?);
            let text = std::fs::read_to_string(&proof)
                .with_context(|| format!("reading {}", proof.display()))?;
            let bundle: ProofBundle = serde_json::from_str(&text).context("parsing proof bundle")?;
            let valid = system.verify(&bundle.proof, &bundle.public_inputs)?;
            print_json(&VerifyOutput {
                verifier: system.name(),
                valid,
            })?;
            if !valid {
                bail!("proof rejected");
            }
            Ok(())
        }
        Command::Simulate { config } => {
            let config = SimulationConfig::from_toml_file(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            start_logging(
                Some(cli.log_format.unwrap_or(config.log_format)),
                Some(cli.log_level.as_deref().unwrap_or(&config.log_level)),
            )?;
            let setup_key = match config.setup_key_bytes()? {
                Some(key) => key,
                None => simulate::random_bytes()?,
            };
            tracing::info!(
                members = config.members.len(),
                window = %format_duration(config.epoch.duration_secs),
                "starting simulation"
            );
            let settlement = simulate::run(&config, setup_key, Timestamp::now())?;
            print_json(&settlement)
        }
    }
}

fn start_logging(format: Option<LogFormat>, level: Option<&str>) -> Result<()> {
    init_logging(format.unwrap_or_default(), level.unwrap_or("info"))?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
