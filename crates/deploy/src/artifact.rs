//! Compiled contract class artifacts.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use starknet::core::types::{
    Felt, FlattenedSierraClass,
    contract::{CompiledClass, SierraClass},
};

use crate::ConfigError;

/// Suffix of the Sierra class file produced by Scarb.
pub const CONTRACT_CLASS_SUFFIX: &str = "contract_class.json";
/// Suffix of the CASM file produced by Scarb.
pub const COMPILED_CLASS_SUFFIX: &str = "compiled_contract_class.json";

/// A contract class definition and the hash of its compiled CASM.
///
/// Both hashes are computed when the artifact is built, so a malformed artifact is
/// rejected before any network call is made.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractArtifact {
    class_hash: Felt,
    compiled_class_hash: Felt,
    class_definition: Value,
}

impl ContractArtifact {
    /// Build an artifact from the two raw JSON documents.
    pub fn from_json(class_definition: Value, compiled_casm: Value) -> Result<Self, ConfigError> {
        let class_hash = class_hash_of(&class_definition)?;

        let casm: CompiledClass = serde_json::from_value(compiled_casm)
            .map_err(|e| ConfigError::Artifact(format!("invalid compiled class: {}", e)))?;
        let compiled_class_hash = casm
            .class_hash()
            .map_err(|e| ConfigError::Artifact(format!("failed to hash compiled class: {}", e)))?;

        Ok(Self {
            class_hash,
            compiled_class_hash,
            class_definition,
        })
    }

    /// Load an artifact from the Sierra class and CASM files.
    pub fn load(contract_path: &Path, casm_path: &Path) -> Result<Self, ConfigError> {
        let class_definition = read_json(contract_path)?;
        let compiled_casm = read_json(casm_path)?;
        tracing::debug!(
            contract = %contract_path.display(),
            casm = %casm_path.display(),
            "Loaded contract artifact"
        );
        Self::from_json(class_definition, compiled_casm)
    }

    #[cfg(test)]
    pub(crate) fn from_parts(class_hash: Felt, compiled_class_hash: Felt) -> Self {
        Self {
            class_hash,
            compiled_class_hash,
            class_definition: Value::Null,
        }
    }

    pub fn class_hash(&self) -> Felt {
        self.class_hash
    }

    pub fn compiled_class_hash(&self) -> Felt {
        self.compiled_class_hash
    }

    /// The class in the flattened form carried by a declare transaction.
    pub fn flattened_class(&self) -> Result<FlattenedSierraClass, ConfigError> {
        let class: SierraClass = serde_json::from_value(self.class_definition.clone())
            .map_err(|e| ConfigError::Artifact(format!("invalid contract class: {}", e)))?;
        class
            .flatten()
            .map_err(|e| ConfigError::Artifact(format!("failed to flatten contract class: {}", e)))
    }
}

/// Hash of a Sierra class definition, as assigned by the network.
pub fn class_hash_of(class_definition: &Value) -> Result<Felt, ConfigError> {
    let class: SierraClass = serde_json::from_value(class_definition.clone())
        .map_err(|e| ConfigError::Artifact(format!("invalid contract class: {}", e)))?;
    class
        .class_hash()
        .map_err(|e| ConfigError::Artifact(format!("failed to hash contract class: {}", e)))
}

/// Paths of the two files Scarb writes for `{package}_{contract}`.
pub fn artifact_paths(target_dir: &Path, package: &str, contract: &str) -> (PathBuf, PathBuf) {
    let stem = format!("{}_{}", package, contract);
    (
        target_dir.join(format!("{}.{}", stem, CONTRACT_CLASS_SUFFIX)),
        target_dir.join(format!("{}.{}", stem, COMPILED_CLASS_SUFFIX)),
    )
}

fn read_json(path: &Path) -> Result<Value, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}
