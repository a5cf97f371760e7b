//! Signing credentials resolved from the profile and command line.

use std::path::PathBuf;

use starknet::{core::types::Felt, signers::SigningKey};

use crate::{AccountConfig, ProjectPaths};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("keystore {} needs a password", path.display())]
    MissingPassword { path: PathBuf },

    #[error("no signing key configured: set a private key or a keystore path")]
    NoKeySource,

    #[error("failed to decrypt keystore {}: {reason}", path.display())]
    Keystore { path: PathBuf, reason: String },
}

/// Where the signing key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    PrivateKey(Felt),
    Keystore { path: PathBuf, password: String },
}

impl KeySource {
    /// Pick the key source from `config`. A private key wins over a keystore, and a
    /// keystore is only usable together with its password.
    pub fn resolve(config: &AccountConfig, paths: &ProjectPaths) -> Result<Self, CredentialError> {
        if let Some(private_key) = config.private_key {
            return Ok(Self::PrivateKey(private_key));
        }

        let Some(keystore) = &config.keystore_path else {
            return Err(CredentialError::NoKeySource);
        };
        let path = paths.resolve(keystore);
        match &config.password {
            Some(password) => Ok(Self::Keystore {
                path,
                password: password.clone(),
            }),
            None => Err(CredentialError::MissingPassword { path }),
        }
    }

    pub fn signing_key(&self) -> Result<SigningKey, CredentialError> {
        match self {
            Self::PrivateKey(secret) => Ok(SigningKey::from_secret_scalar(*secret)),
            Self::Keystore { path, password } => {
                tracing::debug!(path = %path.display(), "Decrypting keystore");
                SigningKey::from_keystore(path, password).map_err(|e| CredentialError::Keystore {
                    path: path.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }
}
