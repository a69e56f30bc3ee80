//! # CLI Interface
//!
//! Defines the command-line argument structure for the `meridian` binary
//! using `clap` derive. Supports five subcommands: `keygen`, `network`,
//! `submit`, `receipt`, and `version`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Meridian ledger command-line client.
///
/// Submits transactions to a Meridian network, chases their receipts, and
/// inspects the network topology — all through the same routing and retry
/// machinery the SDK provides to applications.
#[derive(Parser, Debug)]
#[command(
    name = "meridian",
    about = "Meridian ledger command-line client",
    version,
    propagate_version = true
)]
pub struct MeridianCli {
    /// Log output format: "pretty" or "json".
    #[arg(long, global = true, env = "MERIDIAN_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the Meridian binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a fresh Ed25519 keypair.
    Keygen(KeygenArgs),
    /// Show the network's current node-to-account routing.
    Network(NetworkArgs),
    /// Build, sign, and submit a transfer, then wait for its receipt.
    Submit(SubmitArgs),
    /// Query the receipt of a previously submitted transaction.
    Receipt(ReceiptArgs),
    /// Print version information and exit.
    Version,
}

/// Network connection options shared by every networked subcommand.
#[derive(Args, Debug)]
pub struct NetworkOpts {
    /// A consensus node, as `host:port=shard.realm.account`. Repeatable.
    ///
    /// Example: `--node 35.237.200.180:50211=0.0.3`
    #[arg(long = "node", value_name = "ENDPOINT=ACCOUNT")]
    pub nodes: Vec<String>,

    /// A mirror endpoint (`host:port`) that serves the authoritative
    /// address book. Without one the client runs on the static node list
    /// alone.
    #[arg(long, env = "MERIDIAN_MIRROR")]
    pub mirror: Option<String>,
}

/// Arguments for the `keygen` subcommand.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// File to write the hex-encoded secret key to. When omitted, the
    /// secret is printed to stdout — fine for experiments, nothing else.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

/// Arguments for the `network` subcommand.
#[derive(Args, Debug)]
pub struct NetworkArgs {
    #[command(flatten)]
    pub network: NetworkOpts,

    /// Refresh from the mirror before printing. Requires `--mirror`.
    #[arg(long)]
    pub refresh: bool,
}

/// Arguments for the `submit` subcommand.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub network: NetworkOpts,

    /// The payer account, as `shard.realm.num`.
    #[arg(long)]
    pub payer: String,

    /// Path to the payer's hex-encoded Ed25519 secret key.
    #[arg(long, env = "MERIDIAN_KEY_FILE")]
    pub key_file: PathBuf,

    /// The receiving account, as `shard.realm.num`.
    #[arg(long)]
    pub to: String,

    /// Amount to transfer, in the smallest ledger denomination.
    #[arg(long)]
    pub amount: u64,

    /// Optional memo (at most 100 bytes).
    #[arg(long, default_value = "")]
    pub memo: String,

    /// Fee cap in the smallest ledger denomination.
    #[arg(long, default_value_t = 1_000_000)]
    pub max_fee: u64,

    /// Exit after node acknowledgement without waiting for the receipt.
    #[arg(long)]
    pub no_wait: bool,
}

/// Arguments for the `receipt` subcommand.
#[derive(Args, Debug)]
pub struct ReceiptArgs {
    #[command(flatten)]
    pub network: NetworkOpts,

    /// The transaction id, as printed by `submit`
    /// (`payer@seconds.nanos[?scheduled][/nonce]`).
    #[arg(value_name = "TRANSACTION_ID")]
    pub transaction_id: String,
}
