//! eventscope CLI: a human-readable feed of token transfers and contract events.
//!
//! # Commands
//! ```text
//! eventscope poll        [--rpc <url>] [--window N] [--address A]...
//! eventscope watch       [--ws <url>] [--rpc <url>]
//! eventscope listen      [--ws <url>] [--rpc <url>]
//! eventscope decode      --topics <h>... --data <hex> [--decimals d]
//! eventscope signatures  list|lookup|hash
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd_decode;
mod cmd_node;
mod setup;

#[derive(Parser)]
#[command(
    name = "eventscope",
    about = "Classify Ethereum log events: ERC-20 transfers, known events, unknown signatures",
    long_about = "
eventscope reads logs from an Ethereum JSON-RPC node and prints one line per
event: decoded ERC-20 transfers, events whose signature is in the registry, and
unknown signatures.

ENVIRONMENT VARIABLES:
  EVENTSCOPE_HTTP_URL   HTTP JSON-RPC endpoint (poll, token metadata)
  EVENTSCOPE_WS_URL     WebSocket JSON-RPC endpoint (watch, listen)
",
    version
)]
struct Cli {
    /// Debug-level diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Event declaration file (one `Name(type,...)` per line) instead of the bundled list
    #[arg(long, global = true)]
    signatures: Option<PathBuf>,

    /// Print results as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the logs of the last N blocks and exit
    Poll {
        /// HTTP JSON-RPC endpoint
        #[arg(long, env = "EVENTSCOPE_HTTP_URL")]
        rpc: Option<String>,
        /// Blocks behind the head to scan
        #[arg(long)]
        window: Option<u64>,
        /// Largest block span per eth_getLogs call
        #[arg(long)]
        max_block_range: Option<u64>,
        /// Only logs from this contract (repeatable)
        #[arg(long = "address")]
        addresses: Vec<String>,
        /// Do not print events with unregistered signatures
        #[arg(long)]
        suppress_unknown: bool,
    },

    /// Subscribe to all new logs until Ctrl-C
    Watch {
        /// WebSocket JSON-RPC endpoint
        #[arg(long, env = "EVENTSCOPE_WS_URL")]
        ws: Option<String>,
        /// HTTP endpoint for token metadata (defaults to the WebSocket connection)
        #[arg(long, env = "EVENTSCOPE_HTTP_URL")]
        rpc: Option<String>,
        #[arg(long)]
        suppress_unknown: bool,
    },

    /// Run the push listener on an in-process bus fed by a Transfer subscription
    Listen {
        #[arg(long, env = "EVENTSCOPE_WS_URL")]
        ws: Option<String>,
        #[arg(long, env = "EVENTSCOPE_HTTP_URL")]
        rpc: Option<String>,
    },

    /// Classify one log given on the command line
    Decode {
        /// topics[0] = event signature hash, topics[1..] = indexed params
        #[arg(long, num_args = 1..)]
        topics: Vec<String>,
        /// Non-indexed params (hex, 0x-prefixed)
        #[arg(long, default_value = "0x")]
        data: String,
        /// Token decimals used to scale a Transfer amount
        #[arg(long)]
        decimals: Option<u8>,
        /// Emitting contract
        #[arg(long, default_value = "0x0000000000000000000000000000000000000000")]
        address: String,
        #[arg(long, default_value_t = 0)]
        block: u64,
    },

    /// Signature registry diagnostics
    Signatures {
        #[command(subcommand)]
        action: SignaturesAction,
    },
}

#[derive(Subcommand)]
enum SignaturesAction {
    /// List every registered declaration with its hash
    List,
    /// Resolve a topic-0 hash
    Lookup { hash: String },
    /// Hash an event declaration, e.g. "Transfer(address,address,uint256)"
    Hash { declaration: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = setup::load_config(cli.config.as_deref())?;
    setup::apply_global_flags(&mut config, cli.verbose, cli.json, cli.signatures);
    eventscope_observability::init_tracing(&config.log).context("installing tracing subscriber")?;

    match cli.command {
        Commands::Poll {
            rpc,
            window,
            max_block_range,
            addresses,
            suppress_unknown,
        } => {
            setup::override_rpc(&mut config, rpc, None);
            if let Some(window) = window {
                config.poll.window = window;
            }
            if let Some(range) = max_block_range {
                config.poll.max_block_range = range;
            }
            for address in &addresses {
                config.poll.addresses.push(setup::parse_address(address)?);
            }
            setup::apply_suppress(&mut config, suppress_unknown);
            cmd_node::poll(&config).await
        }

        Commands::Watch {
            ws,
            rpc,
            suppress_unknown,
        } => {
            setup::override_rpc(&mut config, rpc, ws);
            setup::apply_suppress(&mut config, suppress_unknown);
            cmd_node::watch(&config).await
        }

        Commands::Listen { ws, rpc } => {
            setup::override_rpc(&mut config, rpc, ws);
            cmd_node::listen(&config).await
        }

        Commands::Decode {
            topics,
            data,
            decimals,
            address,
            block,
        } => cmd_decode::decode(&config, &topics, &data, decimals, &address, block),

        Commands::Signatures { action } => match action {
            SignaturesAction::List => cmd_decode::signatures_list(&config),
            SignaturesAction::Lookup { hash } => cmd_decode::signatures_lookup(&config, &hash),
            SignaturesAction::Hash { declaration } => cmd_decode::signatures_hash(&declaration),
        },
    }
}
