use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sai_deploy::{
    AccountConfig, DEFAULT_CHUNK_SIZE, DEFAULT_PROFILE, EnumArg, Felt,
    network::{BlockId, TxState, parse_block_id},
};
use tracing::level_filters::LevelFilter;

fn parse_felt(value: &str) -> Result<Felt, String> {
    let parsed = if value.starts_with("0x") || value.starts_with("0X") {
        Felt::from_hex(value)
    } else {
        Felt::from_dec_str(value)
    };
    parsed.map_err(|e| format!("invalid felt '{}': {}", value, e))
}

/// A JSON enum value, or a bare variant name.
fn parse_enum_arg(value: &str) -> Result<EnumArg, String> {
    let json = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    EnumArg::from_value(json).map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "sai")]
#[command(
    author,
    version,
    about = "Declare and deploy Starknet contracts from a Scarb project"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "SAI_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// The profile to use. Settings are read from `sai_<profile>.toml` and artifacts
    /// from `target/<profile>`.
    #[arg(long, env = "SAI_PROFILE", default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// The root of the Scarb project.
    #[arg(long, env = "SAI_ROOT", default_value = ".")]
    pub root: PathBuf,

    #[clap(flatten)]
    pub account: AccountOverrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Account settings taking precedence over the profile file.
#[derive(Debug, Clone, Parser)]
pub struct AccountOverrides {
    /// The URL of the Starknet JSON-RPC endpoint.
    #[arg(short = 'u', long, env = "SAI_RPC_URL")]
    pub rpc_url: Option<String>,

    /// The address of the signing account.
    #[arg(short = 'A', long, env = "SAI_ACCOUNT_ADDRESS", value_parser = parse_felt)]
    pub account_address: Option<Felt>,

    /// The private key of the signing account.
    #[arg(long, env = "SAI_PRIVATE_KEY", value_parser = parse_felt, hide_env_values = true)]
    pub private_key: Option<Felt>,

    /// Path to an encrypted keystore holding the signing key.
    #[arg(short = 'k', long, env = "SAI_KEYSTORE_PATH")]
    pub keystore_path: Option<PathBuf>,

    /// Password of the keystore.
    #[arg(short = 'p', long, env = "SAI_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl From<AccountOverrides> for AccountConfig {
    fn from(overrides: AccountOverrides) -> Self {
        Self {
            rpc_url: overrides.rpc_url,
            account_address: overrides.account_address,
            private_key: overrides.private_key,
            keystore_path: overrides.keystore_path,
            password: overrides.password,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Declare every class of the profile, then deploy every instance.
    Deploy(DeployArgs),

    /// Fetch all events matching a filter.
    Events(EventsArgs),

    /// Print the calldata of an enum argument.
    EncodeEnum(EncodeEnumArgs),
}

#[derive(Debug, Clone, Parser)]
pub struct DeployArgs {
    /// Give up waiting for a transaction after this many seconds.
    ///
    /// If not provided, the profile's waiter settings apply (no timeout by default).
    #[arg(long, env = "SAI_TX_TIMEOUT")]
    pub tx_timeout: Option<u64>,

    /// Transaction states that count as accepted. Can be repeated.
    #[arg(long = "accept", env = "SAI_ACCEPT", value_delimiter = ',')]
    pub acceptance: Vec<TxState>,

    /// Write the declared classes and deployed instances to this JSON file.
    #[arg(short, long, env = "SAI_OUTPUT")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Parser)]
pub struct EventsArgs {
    /// Only return events emitted by this contract.
    #[arg(long, value_parser = parse_felt)]
    pub address: Option<Felt>,

    /// Keys to match, one per position.
    #[arg(long = "key", value_parser = parse_felt, value_delimiter = ',')]
    pub keys: Vec<Felt>,

    /// First block to scan: a number, a hash, `latest` or `pending`.
    #[arg(long, value_parser = parse_block_id)]
    pub from_block: Option<BlockId>,

    /// Last block to scan: a number, a hash, `latest` or `pending`.
    #[arg(long, value_parser = parse_block_id)]
    pub to_block: Option<BlockId>,

    /// ABI documents used to label events. Can be repeated.
    #[arg(long)]
    pub abi: Vec<PathBuf>,

    /// Number of events requested per page.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u64,
}

#[derive(Debug, Clone, Parser)]
pub struct EncodeEnumArgs {
    /// ABI documents defining the enum. Can be repeated.
    #[arg(long, required = true)]
    pub abi: Vec<PathBuf>,

    /// Full path of the enum, e.g. `ownable::Role`.
    #[arg(long = "enum")]
    pub enum_name: String,

    /// The variant: a name, `{"Variant": payload}` or `{"kind": .., "payload": ..}`.
    #[arg(value_parser = parse_enum_arg)]
    pub value: EnumArg,
}
