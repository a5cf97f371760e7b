//! sai-deploy - Declare and deploy pipeline for Starknet contracts.
//!
//! This crate declares contract classes that a network does not know yet, deploys
//! instances of them through the Universal Deployer Contract and collects the results
//! per contract tag. It also retrieves contract events and labels them against the
//! merged event enum of one or more ABIs.

pub mod abi;
pub use abi::{AbiError, AbiTypeRegistry, EnumArg};

mod account;
pub use account::StarknetAccount;

pub mod address;
pub use address::{UDC_ADDRESS, compute_udc_address};

mod artifact;
pub use artifact::{ContractArtifact, artifact_paths, class_hash_of};

pub mod cairo;

mod config;
pub use config::{
    AccountConfig, ConfigError, ContractsConfig, DEFAULT_PROFILE, DeclareSpec, DeploymentSpec,
    ENV_PREFIX, ProjectPaths, SaiProfile, load_artifacts, scarb_package_name,
};

mod credentials;
pub use credentials::{CredentialError, KeySource};

mod declare;
pub use declare::{ClassDescriptor, DeclareError, Declarer};

mod deploy;
pub use deploy::{DeployOutcome, InstanceDeployer, InstanceDescriptor, deployed_address};

mod events;
pub use events::{DEFAULT_CHUNK_SIZE, EventPager, EventsError, is_exhausted};

pub mod network;
pub use network::{ChainReader, ChainWriter, NetworkError};

mod orchestrator;
pub use orchestrator::{DeploymentReport, OrchestratorError, Sai};

mod rpc;
pub use rpc::RpcClient;

mod waiter;
pub use waiter::{TransactionWaiter, WaiterConfig};

#[cfg(test)]
mod mock;

/// Re-exported so callers can name felts without depending on `starknet` directly.
pub use starknet::core::types::Felt;
