//! sai declares and deploys the contracts of a Scarb project on Starknet.

mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};

use cli::{Cli, Command, DeployArgs, EncodeEnumArgs, EventsArgs};
use sai_deploy::{
    AbiTypeRegistry, AccountConfig, ConfigError, DeploymentReport, EventPager, KeySource,
    ProjectPaths, RpcClient, Sai, SaiProfile, StarknetAccount, load_artifacts,
    network::{EmittedEvent, EventFilter},
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let paths = ProjectPaths::new(&cli.root, &cli.profile);
    let overrides = AccountConfig::from(cli.account);

    match cli.command {
        Command::Deploy(args) => deploy(&paths, overrides, args).await,
        Command::Events(args) => events(&paths, overrides, args).await,
        Command::EncodeEnum(args) => encode_enum(&paths, args),
    }
}

async fn deploy(paths: &ProjectPaths, overrides: AccountConfig, args: DeployArgs) -> Result<()> {
    let profile = SaiProfile::load(paths)?;
    let account_config = profile.account.clone().merge(overrides);

    let mut waiter = profile.waiter.clone();
    if args.tx_timeout.is_some() {
        waiter.timeout_secs = args.tx_timeout;
    }
    if !args.acceptance.is_empty() {
        waiter.acceptance = args.acceptance;
    }

    // Everything local is validated before the first network call.
    let artifacts = load_artifacts(paths, &profile)?;
    let signing_key = KeySource::resolve(&account_config, paths)?.signing_key()?;
    let account = StarknetAccount::connect(
        account_config.rpc_url()?,
        account_config.account_address()?,
        signing_key,
    )
    .await?;

    tracing::info!(
        profile = %paths.profile,
        classes = artifacts.len(),
        deployments = profile.contracts.deploy.len(),
        "Starting deployment..."
    );

    let report = Sai::new(&account, waiter)
        .run(&artifacts, &profile.deployments())
        .await?;

    print_report(&report);

    if let Some(output) = &args.output {
        write_report(&report, output)?;
        tracing::info!(path = %output.display(), "Report written");
    }

    Ok(())
}

async fn events(paths: &ProjectPaths, overrides: AccountConfig, args: EventsArgs) -> Result<()> {
    let account_config = match SaiProfile::load(paths) {
        Ok(profile) => profile.account.merge(overrides),
        Err(ConfigError::ProfileNotFound(_)) => overrides,
        Err(e) => return Err(e.into()),
    };

    let registry = load_registry(paths, &args.abi)?;

    let reader = RpcClient::connect(account_config.rpc_url()?);
    let keys = (!args.keys.is_empty()).then(|| args.keys.iter().map(|key| vec![*key]).collect());
    let filter = EventFilter {
        from_block: args.from_block,
        to_block: args.to_block,
        address: args.address,
        keys,
    };

    let events = EventPager::new(&reader)
        .chunk_size(args.chunk_size)
        .fetch_all(&filter)
        .await?;

    print_events(&events, &registry);
    Ok(())
}

fn encode_enum(paths: &ProjectPaths, args: EncodeEnumArgs) -> Result<()> {
    let registry = load_registry(paths, &args.abi)?;
    let calldata = registry.encode_enum(&args.enum_name, &args.value)?;
    println!("{}", calldata.iter().map(hex).collect::<Vec<_>>().join(" "));
    Ok(())
}

fn load_registry(paths: &ProjectPaths, abi: &[PathBuf]) -> Result<AbiTypeRegistry> {
    let documents = abi
        .iter()
        .map(|path| read_abi(&paths.resolve(path)))
        .collect::<Result<Vec<_>>>()?;
    Ok(AbiTypeRegistry::build(&documents)?)
}

fn read_abi(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ABI {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse ABI {}", path.display()))
}

fn write_report(report: &DeploymentReport, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

fn hex(felt: &sai_deploy::Felt) -> String {
    format!("{:#x}", felt)
}

fn print_report(report: &DeploymentReport) {
    let mut classes = Table::new();
    classes
        .load_preset(UTF8_FULL)
        .set_header(vec!["Class", "Class hash", "Status", "Transaction"]);
    for (tag, class) in &report.classes {
        classes.add_row(vec![
            tag.clone(),
            hex(&class.class_hash),
            if class.declared { "declared" } else { "already declared" }.to_string(),
            class.declare_tx_hash.as_ref().map(hex).unwrap_or_default(),
        ]);
    }
    println!("{classes}");

    let mut instances = Table::new();
    instances
        .load_preset(UTF8_FULL)
        .set_header(vec!["Contract", "Address", "Class hash", "Transaction"]);
    for (tag, instance) in &report.instances {
        instances.add_row(vec![
            tag.clone(),
            hex(&instance.contract_address),
            hex(&instance.class_hash),
            instance
                .transaction_hash
                .as_ref()
                .map(hex)
                .unwrap_or_else(|| "recovered".to_string()),
        ]);
    }
    println!("{instances}");
}

fn print_events(events: &[EmittedEvent], registry: &AbiTypeRegistry) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Block", "Transaction", "Contract", "Event", "Data"]);
    for event in events {
        let label = registry
            .event_variant(event)
            .map(|variant| variant.name.clone())
            .or_else(|| event.keys.first().map(hex))
            .unwrap_or_default();
        let data = match registry.decode_event_data(event) {
            Ok(members) => members
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect::<Vec<_>>()
                .join(", "),
            Err(e) => {
                tracing::trace!(error = %e, "Showing raw event data");
                event.data.iter().map(hex).collect::<Vec<_>>().join(", ")
            }
        };

        table.add_row(vec![
            event
                .block_number
                .map(|n| n.to_string())
                .unwrap_or_else(|| "pending".to_string()),
            hex(&event.transaction_hash),
            hex(&event.from_address),
            label,
            data,
        ]);
    }
    println!("{table}");
    tracing::info!(events = events.len(), "Events fetched");
}
