use crate::{IdentityError, Wallet, WalletError, X509Identity};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// Where to read the credentials from and under which label to store them.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub certificate_path: PathBuf,
    pub private_key_path: PathBuf,
    pub msp_id: String,
    pub label: String,
}

fn read_pem(path: &Path) -> Result<String, ImportError> {
    fs::read_to_string(path).map_err(|source| ImportError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads the certificate and the private key and stores the resulting identity in `wallet`.
pub fn import_identity(wallet: &dyn Wallet, request: &ImportRequest) -> Result<(), ImportError> {
    let certificate = read_pem(&request.certificate_path)?;
    let private_key = read_pem(&request.private_key_path)?;

    let identity = X509Identity::new(request.msp_id.as_str(), certificate, private_key)?;
    wallet.put(&request.label, &identity)?;

    info!(
        "Imported identity {} of {} into the wallet",
        request.label, request.msp_id
    );
    Ok(())
}
