//! Profile configuration: account settings and the declare/deploy manifest.
//!
//! A project is described by a [`ProjectPaths`] value. Nothing here reads the current
//! working directory; every path is resolved against the explicit project root.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use starknet::core::types::Felt;
use url::Url;

use crate::{
    WaiterConfig,
    artifact::{self, ContractArtifact},
};

/// Prefix of environment variables overriding profile settings.
pub const ENV_PREFIX: &str = "SAI_";

/// The default profile name.
pub const DEFAULT_PROFILE: &str = "dev";

/// Errors raised while loading configuration or artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {} as JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse {} as TOML: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid profile configuration: {0}")]
    Profile(#[from] Box<figment::Error>),

    #[error("profile file not found: {}", .0.display())]
    ProfileNotFound(PathBuf),

    #[error("invalid contract artifact: {0}")]
    Artifact(String),

    #[error("deployment '{tag}' references class '{class}', which is not in the declare list")]
    UndeclaredClass { tag: String, class: String },

    #[error("missing account setting '{0}'")]
    MissingSetting(&'static str),

    #[error("invalid RPC URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Location of a project and the profile being run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub profile: String,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            profile: profile.into(),
        }
    }

    /// `sai_<profile>.toml` at the project root.
    pub fn profile_file(&self) -> PathBuf {
        self.root.join(format!("sai_{}.toml", self.profile))
    }

    pub fn scarb_manifest(&self) -> PathBuf {
        self.root.join("Scarb.toml")
    }

    /// Directory Scarb writes the profile's artifacts to.
    pub fn target_dir(&self) -> PathBuf {
        self.root.join("target").join(&self.profile)
    }

    /// Resolve a possibly relative path against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Account and endpoint settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_address: Option<Felt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<Felt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystore_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl AccountConfig {
    /// Overlay `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merge(self, overrides: AccountConfig) -> Self {
        Self {
            rpc_url: overrides.rpc_url.or(self.rpc_url),
            account_address: overrides.account_address.or(self.account_address),
            private_key: overrides.private_key.or(self.private_key),
            keystore_path: overrides.keystore_path.or(self.keystore_path),
            password: overrides.password.or(self.password),
        }
    }

    pub fn rpc_url(&self) -> Result<Url, ConfigError> {
        let url = self
            .rpc_url
            .as_deref()
            .ok_or(ConfigError::MissingSetting("rpc_url"))?;
        Url::parse(url).map_err(|source| ConfigError::InvalidUrl {
            url: url.to_string(),
            source,
        })
    }

    pub fn account_address(&self) -> Result<Felt, ConfigError> {
        self.account_address
            .ok_or(ConfigError::MissingSetting("account_address"))
    }
}

/// A class to declare. The artifact name defaults to the tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclareSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
}

/// An instance to deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    /// Key of the entry in the manifest.
    #[serde(skip)]
    pub tag: String,
    #[serde(alias = "calldata", default)]
    pub constructor_calldata: Vec<Felt>,
    #[serde(default = "default_salt")]
    pub salt: Felt,
    #[serde(default)]
    pub unique: bool,
    /// Tag of the declared class to instantiate; defaults to the deployment's own tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

fn default_salt() -> Felt {
    Felt::ZERO
}

impl DeploymentSpec {
    pub fn class_tag(&self) -> &str {
        self.class.as_deref().unwrap_or(&self.tag)
    }
}

/// The `[contracts]` section of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractsConfig {
    #[serde(default)]
    pub declare: BTreeMap<String, DeclareSpec>,
    #[serde(default)]
    pub deploy: BTreeMap<String, DeploymentSpec>,
}

/// A fully loaded `sai_<profile>.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaiProfile {
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub waiter: WaiterConfig,
}

impl SaiProfile {
    /// Load the profile file for `paths`, with `SAI_`-prefixed environment overrides
    /// (nested keys separated by `__`, e.g. `SAI_ACCOUNT__RPC_URL`).
    pub fn load(paths: &ProjectPaths) -> Result<Self, ConfigError> {
        let file = paths.profile_file();
        if !file.exists() {
            return Err(ConfigError::ProfileNotFound(file));
        }

        let figment = Figment::new()
            .merge(Toml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        let profile = Self::extract(figment)?;

        tracing::info!(
            path = %file.display(),
            declare = profile.contracts.declare.len(),
            deploy = profile.contracts.deploy.len(),
            "Profile loaded"
        );
        Ok(profile)
    }

    /// Parse a profile from TOML text, without environment overrides.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::extract(Figment::from(Toml::string(content)))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let mut profile: Self = figment.extract().map_err(Box::new)?;
        for (tag, spec) in profile.contracts.deploy.iter_mut() {
            spec.tag = tag.clone();
        }
        profile.validate()?;
        Ok(profile)
    }

    /// Every deployment must instantiate a class from the declare list.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for spec in self.contracts.deploy.values() {
            let class = spec.class_tag();
            if !self.contracts.declare.contains_key(class) {
                return Err(ConfigError::UndeclaredClass {
                    tag: spec.tag.clone(),
                    class: class.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Deployments in manifest order.
    pub fn deployments(&self) -> Vec<DeploymentSpec> {
        self.contracts.deploy.values().cloned().collect()
    }
}

#[derive(Debug, Deserialize)]
struct ScarbManifest {
    package: ScarbPackage,
}

#[derive(Debug, Deserialize)]
struct ScarbPackage {
    name: String,
}

/// Read the package name from the project's `Scarb.toml`.
pub fn scarb_package_name(paths: &ProjectPaths) -> Result<String, ConfigError> {
    let path = paths.scarb_manifest();
    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let manifest: ScarbManifest =
        toml::from_str(&content).map_err(|source| ConfigError::Toml { path, source })?;
    Ok(manifest.package.name)
}

/// Load the artifact of every class in the declare list, keyed by tag.
pub fn load_artifacts(
    paths: &ProjectPaths,
    profile: &SaiProfile,
) -> Result<BTreeMap<String, ContractArtifact>, ConfigError> {
    let package = scarb_package_name(paths)?;
    let target_dir = paths.target_dir();

    profile
        .contracts
        .declare
        .iter()
        .map(|(tag, spec)| {
            let contract = spec.contract.as_deref().unwrap_or(tag);
            let (class_path, casm_path) = artifact::artifact_paths(&target_dir, &package, contract);
            ContractArtifact::load(&class_path, &casm_path).map(|artifact| (tag.clone(), artifact))
        })
        .collect()
}
