//! deploy-tools - send ether, call and deploy contracts from the command line
//!
//! Every command that sends a transaction waits until it is mined
//! successfully and exits with an error otherwise. Results go to stdout, logs
//! to stderr.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use deploy_tools::{DeployError, Settings, TransactionIntent, TransactionManager};
use ethers::types::{Address, Bytes, H256, U256};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// JSON-RPC URL of the Ethereum node, overrides the config file
    #[arg(long, global = true, env = "JSONRPC", value_name = "URL")]
    jsonrpc: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send VALUE wei to ADDRESS
    SendEth {
        #[arg(value_parser = parse_u256)]
        value: U256,
        #[arg(value_parser = parse_address)]
        address: Address,
        #[command(flatten)]
        options: TxOptions,
    },

    /// Send a transaction calling a contract with ABI encoded calldata
    Transact {
        /// Contract address
        #[arg(value_parser = parse_address)]
        address: Address,
        /// Hex encoded calldata
        #[arg(long, value_parser = parse_bytes)]
        data: Bytes,
        /// Wei sent along with the call
        #[arg(long, value_parser = parse_u256)]
        value: Option<U256>,
        #[command(flatten)]
        options: TxOptions,
    },

    /// Call a contract function without sending a transaction
    Call {
        /// Contract address
        #[arg(value_parser = parse_address)]
        address: Address,
        /// Hex encoded calldata
        #[arg(long, value_parser = parse_bytes)]
        data: Bytes,
    },

    /// Deploy a contract from a file holding hex encoded bytecode
    Deploy {
        bytecode: PathBuf,
        /// Hex encoded constructor arguments appended to the bytecode
        #[arg(long, value_parser = parse_bytes)]
        args: Option<Bytes>,
        /// Wei sent to a payable constructor
        #[arg(long, value_parser = parse_u256)]
        value: Option<U256>,
        #[command(flatten)]
        options: TxOptions,
    },

    /// Print the init code `deploy` would send, without deploying
    Initcode {
        bytecode: PathBuf,
        /// Hex encoded constructor arguments appended to the bytecode
        #[arg(long, value_parser = parse_bytes)]
        args: Option<Bytes>,
    },

    /// Wait for already sent transactions, in order
    Wait {
        #[arg(required = true, value_parser = parse_hash)]
        hashes: Vec<H256>,
    },
}

/// Overrides for the fields the builder would otherwise fill
#[derive(Args, Debug, Default)]
struct TxOptions {
    /// Gas limit; estimated by the node when omitted
    #[arg(long, value_parser = parse_u256)]
    gas: Option<U256>,
    /// Gas price in wei; the node's suggestion when omitted
    #[arg(long, value_parser = parse_u256)]
    gas_price: Option<U256>,
    /// Nonce; taken from the node's pending count when omitted
    #[arg(long, value_parser = parse_u256)]
    nonce: Option<U256>,
}

impl TxOptions {
    fn apply(&self, mut intent: TransactionIntent) -> TransactionIntent {
        intent.gas = self.gas;
        intent.gas_price = self.gas_price;
        intent.nonce = self.nonce;
        intent
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging();

    // no node needed
    if let Command::Initcode { bytecode, args } = &cli.command {
        return print_init_code(bytecode, args.as_ref());
    }

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(url) = cli.jsonrpc {
        settings.node.jsonrpc = url;
    }

    let manager = TransactionManager::from_settings(&settings).await?;

    if let Err(e) = run(&manager, cli.command).await {
        if e.downcast_ref::<DeployError>().is_some_and(DeployError::is_pending) {
            warn!("The transaction may still be mined later, check again with `wait`");
        }
        return Err(e);
    }

    info!("Done");
    Ok(())
}

async fn run(manager: &TransactionManager, command: Command) -> Result<()> {
    match command {
        Command::SendEth {
            value,
            address,
            options,
        } => {
            let intent = options.apply(TransactionIntent::transfer(address, value));
            let receipt = manager.send_and_confirm(intent).await?;
            println!("{:?}", receipt.transaction_hash);
        }
        Command::Transact {
            address,
            data,
            value,
            options,
        } => {
            let intent = options
                .apply(TransactionIntent::call(address, data))
                .value(value.unwrap_or_default());
            let receipt = manager.send_and_confirm(intent).await?;
            println!("{:?}", receipt.transaction_hash);
        }
        Command::Call { address, data } => {
            let output = manager.call(address, data).await?;
            println!("0x{}", hex::encode(&output));
        }
        Command::Deploy {
            bytecode,
            args,
            value,
            options,
        } => {
            let init_code = read_init_code(&bytecode, args.as_ref())?;
            let intent = options
                .apply(TransactionIntent::deploy(init_code))
                .value(value.unwrap_or_default());
            let (address, _) = manager.deploy(intent).await?;
            println!("{:?}", address);
        }
        Command::Initcode { bytecode, args } => print_init_code(&bytecode, args.as_ref())?,
        Command::Wait { hashes } => {
            let receipts = manager.confirm_batch(&hashes).await?;
            for receipt in receipts {
                println!(
                    "{:?} block {}",
                    receipt.transaction_hash,
                    receipt.block_number.unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,deploy_tools=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

fn print_init_code(path: &Path, args: Option<&Bytes>) -> Result<()> {
    let init_code = read_init_code(path, args)?;
    println!("0x{}", hex::encode(&init_code));
    Ok(())
}

/// Bytecode from `path` with constructor arguments appended
fn read_init_code(path: &Path, args: Option<&Bytes>) -> Result<Bytes> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read bytecode file: {:?}", path))?;
    let mut code = decode_hex(text.trim())
        .with_context(|| format!("Bytecode in {:?} is not valid hex", path))?;

    if let Some(args) = args {
        code.extend_from_slice(args);
    }
    anyhow::ensure!(!code.is_empty(), "Bytecode file {:?} is empty", path);

    Ok(code.into())
}

fn decode_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
}

fn parse_bytes(s: &str) -> Result<Bytes, String> {
    decode_hex(s)
        .map(Bytes::from)
        .map_err(|e| format!("invalid hex: {}", e))
}

fn parse_address(s: &str) -> Result<Address, String> {
    s.parse::<Address>()
        .map_err(|e| format!("invalid address {}: {}", s, e))
}

fn parse_hash(s: &str) -> Result<H256, String> {
    s.parse::<H256>()
        .map_err(|e| format!("invalid transaction hash {}: {}", s, e))
}

fn parse_u256(s: &str) -> Result<U256, String> {
    match s.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| e.to_string()),
        None => U256::from_dec_str(s).map_err(|e| e.to_string()),
    }
    .map_err(|e| format!("invalid number {}: {}", s, e))
}
