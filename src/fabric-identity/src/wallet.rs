use crate::{IdentityError, X509Identity, X509_IDENTITY_TYPE};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

const IDENTITY_FILE_EXTENSION: &str = "id";
const IDENTITY_FILE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid identity label {0:?}")]
    InvalidLabel(String),
    #[error("unsupported identity type {0:?}")]
    UnsupportedIdentityType(String),
    #[error("wallet I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed identity file {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("stored identity {label:?} is not usable: {source}")]
    Identity {
        label: String,
        #[source]
        source: IdentityError,
    },
}

/// A collection of identities, each stored under a unique label.
pub trait Wallet: Send + Sync {
    /// Stores `identity` under `label`, replacing any identity already stored under it.
    fn put(&self, label: &str, identity: &X509Identity) -> Result<(), WalletError>;

    fn get(&self, label: &str) -> Result<Option<X509Identity>, WalletError>;

    fn exists(&self, label: &str) -> Result<bool, WalletError> {
        Ok(self.get(label)?.is_some())
    }

    fn remove(&self, label: &str) -> Result<(), WalletError>;

    /// Labels of all the stored identities, sorted.
    fn list(&self) -> Result<Vec<String>, WalletError>;
}

fn validate_label(label: &str) -> Result<(), WalletError> {
    if label.is_empty()
        || label == "."
        || label == ".."
        || label.contains(['/', '\\', '\0'])
    {
        return Err(WalletError::InvalidLabel(label.to_string()));
    }
    Ok(())
}

/// On-disk representation of an identity.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityData {
    credentials: CredentialsData,
    msp_id: String,
    #[serde(rename = "type")]
    identity_type: String,
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsData {
    certificate: String,
    private_key: String,
}

impl From<&X509Identity> for IdentityData {
    fn from(identity: &X509Identity) -> Self {
        Self {
            credentials: CredentialsData {
                certificate: identity.credentials.certificate.clone(),
                private_key: identity.credentials.private_key.clone(),
            },
            msp_id: identity.msp_id.clone(),
            identity_type: X509_IDENTITY_TYPE.to_string(),
            version: IDENTITY_FILE_VERSION,
        }
    }
}

impl IdentityData {
    fn into_identity(self, label: &str) -> Result<X509Identity, WalletError> {
        if self.identity_type != X509_IDENTITY_TYPE {
            return Err(WalletError::UnsupportedIdentityType(self.identity_type));
        }
        X509Identity::new(
            self.msp_id,
            self.credentials.certificate,
            self.credentials.private_key,
        )
        .map_err(|source| WalletError::Identity {
            label: label.to_string(),
            source,
        })
    }
}

/// Wallet keeping one `<label>.id` JSON file per identity inside a directory.
#[derive(Debug, Clone)]
pub struct FileSystemWallet {
    dir: PathBuf,
}

impl FileSystemWallet {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn identity_path(&self, label: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", label, IDENTITY_FILE_EXTENSION))
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> WalletError + '_ {
    move |source| WalletError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl Wallet for FileSystemWallet {
    fn put(&self, label: &str, identity: &X509Identity) -> Result<(), WalletError> {
        validate_label(label)?;
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;

        let path = self.identity_path(label);
        let data = serde_json::to_vec(&IdentityData::from(identity)).map_err(|source| {
            WalletError::Serialization {
                path: path.clone(),
                source,
            }
        })?;

        // write aside and rename, so that readers never see a partial identity
        let tmp_path = path.with_extension(format!("{}.tmp", IDENTITY_FILE_EXTENSION));
        fs::write(&tmp_path, data).map_err(io_error(&tmp_path))?;
        fs::rename(&tmp_path, &path).map_err(io_error(&path))?;

        debug!("Stored identity {} in {}", label, path.display());
        Ok(())
    }

    fn get(&self, label: &str) -> Result<Option<X509Identity>, WalletError> {
        validate_label(label)?;
        let path = self.identity_path(label);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path)(e)),
        };
        let data: IdentityData = serde_json::from_slice(&data)
            .map_err(|source| WalletError::Serialization { path, source })?;
        data.into_identity(label).map(Some)
    }

    fn exists(&self, label: &str) -> Result<bool, WalletError> {
        validate_label(label)?;
        Ok(self.identity_path(label).is_file())
    }

    fn remove(&self, label: &str) -> Result<(), WalletError> {
        validate_label(label)?;
        let path = self.identity_path(label);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    fn list(&self) -> Result<Vec<String>, WalletError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.dir)(e)),
        };

        let mut labels = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_error(&self.dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(IDENTITY_FILE_EXTENSION) {
                continue;
            }
            if let Some(label) = path.file_stem().and_then(|s| s.to_str()) {
                labels.push(label.to_string());
            }
        }
        labels.sort();
        Ok(labels)
    }
}

/// Wallet that only lives as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryWallet {
    identities: DashMap<String, X509Identity>,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Wallet for InMemoryWallet {
    fn put(&self, label: &str, identity: &X509Identity) -> Result<(), WalletError> {
        validate_label(label)?;
        self.identities.insert(label.to_string(), identity.clone());
        Ok(())
    }

    fn get(&self, label: &str) -> Result<Option<X509Identity>, WalletError> {
        validate_label(label)?;
        Ok(self
            .identities
            .get(label)
            .map(|identity| identity.value().clone()))
    }

    fn remove(&self, label: &str) -> Result<(), WalletError> {
        validate_label(label)?;
        self.identities.remove(label);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, WalletError> {
        let mut labels: Vec<String> = self
            .identities
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        labels.sort();
        Ok(labels)
    }
}
