// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Meridian Command-Line Client
//!
//! Entry point for the `meridian` binary. Parses CLI arguments, initializes
//! logging, and drives the SDK's client against a real network over the
//! framed TCP transport.
//!
//! The binary supports five subcommands:
//!
//! - `keygen`  — generate an Ed25519 keypair
//! - `network` — print the current node-to-account routing
//! - `submit`  — build, sign, submit a transfer, and wait for the receipt
//! - `receipt` — query the receipt of a previously submitted transaction
//! - `version` — print build version information

mod cli;
mod logging;
mod transport;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use meridian_sdk::client::{Client, ClientBuilder};
use meridian_sdk::entity::{AccountId, TransactionId};
use meridian_sdk::network::topology::MirrorSource;
use meridian_sdk::transaction::builder::TransactionBuilder;
use meridian_sdk::transaction::signing::{sign_transaction, PrivateKey};
use meridian_sdk::transaction::types::{Operation, Receipt, Transfer};
use meridian_sdk::transport::Transport;

use cli::{Commands, MeridianCli, NetworkOpts};
use logging::LogFormat;
use transport::{TcpMirror, TcpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = MeridianCli::parse();
    logging::init_logging(
        "meridian=info,meridian_sdk=info",
        LogFormat::from_str_lossy(&cli.log_format),
    );

    match cli.command {
        Commands::Keygen(args) => keygen(args),
        Commands::Network(args) => show_network(args).await,
        Commands::Submit(args) => submit(args).await,
        Commands::Receipt(args) => query_receipt(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Builds a client from the shared network options and, when a mirror is
/// configured, performs the startup refresh.
async fn connect(opts: &NetworkOpts) -> Result<Client> {
    if opts.nodes.is_empty() && opts.mirror.is_none() {
        bail!("no network configured: pass at least one --node or a --mirror");
    }

    let mut map: HashMap<String, AccountId> = HashMap::new();
    for entry in &opts.nodes {
        let (endpoint, account) = entry
            .split_once('=')
            .with_context(|| format!("--node {entry:?} is not ENDPOINT=ACCOUNT"))?;
        let account: AccountId = account
            .parse()
            .with_context(|| format!("invalid account in --node {entry:?}"))?;
        map.insert(endpoint.to_string(), account);
    }

    let mut builder = ClientBuilder::new(Arc::new(TcpTransport::new()) as Arc<dyn Transport>)
        .network(&map)
        .context("invalid node endpoint")?
        // One-shot tool: refresh happens at connect and on routing
        // failures, never on a background schedule.
        .refresh_period(None);

    if let Some(mirror) = &opts.mirror {
        let endpoint = mirror
            .parse()
            .with_context(|| format!("invalid mirror endpoint {mirror:?}"))?;
        builder = builder.mirror(Arc::new(TcpMirror::new(endpoint)) as Arc<dyn MirrorSource>);
        return Ok(Client::connect(builder).await);
    }
    Ok(builder.build())
}

/// Generates a keypair and writes or prints the secret.
fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let key = PrivateKey::generate();
    let secret_hex = hex::encode(key.secret_bytes());
    let public_hex = key.public_key().to_hex();

    match &args.out {
        Some(path) => {
            std::fs::write(path, &secret_hex)
                .with_context(|| format!("failed to write key to {}", path.display()))?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
            }
            println!("Keypair generated.");
            println!("  Secret key : {}", path.display());
            println!("  Public key : {public_hex}");
        }
        None => {
            println!("Secret key : {secret_hex}");
            println!("Public key : {public_hex}");
        }
    }
    Ok(())
}

/// Prints the routing table as a sorted JSON object.
async fn show_network(args: cli::NetworkArgs) -> Result<()> {
    if args.refresh && args.network.mirror.is_none() {
        bail!("--refresh requires --mirror");
    }
    let client = connect(&args.network).await?;
    if args.refresh {
        let result = client.refresh_network().await;
        if !result.errors.is_empty() {
            tracing::warn!(errors = ?result.errors, "refresh reported errors");
        }
    }

    let book: BTreeMap<String, String> = client
        .get_network()
        .into_iter()
        .map(|(endpoint, account)| (endpoint, account.to_string()))
        .collect();
    println!("{}", serde_json::to_string_pretty(&book)?);
    Ok(())
}

/// Builds, signs, and submits a transfer; waits for the receipt unless told
/// not to.
async fn submit(args: cli::SubmitArgs) -> Result<()> {
    let payer: AccountId = args.payer.parse().context("invalid --payer")?;
    let to: AccountId = args.to.parse().context("invalid --to")?;
    let amount = i64::try_from(args.amount).context("--amount too large")?;

    let key_hex = std::fs::read_to_string(&args.key_file)
        .with_context(|| format!("failed to read key file {}", args.key_file.display()))?;
    let key = PrivateKey::from_hex(key_hex.trim()).context("invalid key file contents")?;

    let mut tx = TransactionBuilder::new(Operation::Transfer {
        transfers: vec![
            Transfer {
                account: payer.clone(),
                amount: -amount,
            },
            Transfer {
                account: to,
                amount,
            },
        ],
    })
    .payer(payer)
    .memo(args.memo.clone())
    .max_fee(args.max_fee)
    .build()?;
    sign_transaction(&mut tx, &key);
    let signed = tx.into_signed()?;

    let client = connect(&args.network).await?;
    let pending = client.submit(&signed).await?;
    tracing::info!(
        tx = %pending.transaction_id,
        node = %pending.node_id(),
        attempts = pending.attempts(),
        "transaction acknowledged"
    );

    if args.no_wait {
        println!(
            "{}",
            serde_json::json!({
                "transactionId": pending.transaction_id.to_string(),
                "node": pending.node_id().to_string(),
                "attempts": pending.attempts(),
            })
        );
        return Ok(());
    }

    let receipt = pending.get_receipt_any_status().await?;
    print_receipt(&receipt)?;
    if !receipt.status.is_success() {
        bail!("transaction failed at consensus with status {}", receipt.status);
    }
    Ok(())
}

/// Polls for the receipt of an arbitrary transaction id.
async fn query_receipt(args: cli::ReceiptArgs) -> Result<()> {
    let id: TransactionId = args
        .transaction_id
        .parse()
        .context("invalid transaction id")?;
    let client = connect(&args.network).await?;
    let receipt = client.query_receipt(&id).await?;
    print_receipt(&receipt)?;
    Ok(())
}

/// Prints a receipt as one JSON object on stdout.
fn print_receipt(receipt: &Receipt) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "transactionId": receipt.transaction_id.to_string(),
            "status": receipt.status.to_string(),
            "consensusAt": receipt.consensus_at.map(|t| t.to_rfc3339()),
        }))?
    );
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("meridian {}", env!("CARGO_PKG_VERSION"));
    println!("rustc    {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
