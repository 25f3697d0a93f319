use fabric_identity::{import_identity, FileSystemWallet, ImportRequest};
use std::{fmt, io, path::PathBuf};
use structopt::StructOpt;
use tracing::{error, info};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "add_identity",
    about = "Imports an X.509 identity into a wallet directory"
)]
pub struct ImportConfig {
    #[structopt(long, default_value = "./local_fabric/certificate")]
    /// PEM certificate of the identity
    pub certificate_path: PathBuf,

    #[structopt(long, default_value = "./local_fabric/privateKey")]
    /// PEM private key of the identity
    pub private_key_path: PathBuf,

    #[structopt(long, default_value = "Org1MSP")]
    pub msp_id: String,

    #[structopt(long, default_value = "User1@org1.example.com")]
    /// label the identity is stored under
    pub identity_label: String,

    #[structopt(long, default_value = "./_idwallet")]
    pub wallet_dir: PathBuf,

    #[structopt(long)]
    /// exit with code 1 when the import fails
    pub strict: bool,
}

impl ImportConfig {
    fn import_request(&self) -> ImportRequest {
        ImportRequest {
            certificate_path: self.certificate_path.clone(),
            private_key_path: self.private_key_path.clone(),
            msp_id: self.msp_id.clone(),
            label: self.identity_label.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// the import failed and the importer runs in strict mode
    Failed,
    Unexpected,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failed => 1,
            ExitStatus::Unexpected => -1,
        }
    }
}

/// Reports a failure that happened outside of the import itself.
pub fn report_unexpected(out: &mut impl io::Write, error: &dyn fmt::Display) -> ExitStatus {
    // logging may be unavailable at this point
    let _ = writeln!(out, "{}", error);
    ExitStatus::Unexpected
}

/// Imports the identity into the wallet. A failed import is logged and only
/// changes the exit status in strict mode.
pub fn run_import(config: &ImportConfig) -> ExitStatus {
    let wallet = FileSystemWallet::new(&config.wallet_dir);
    match import_identity(&wallet, &config.import_request()) {
        Ok(()) => {
            info!(
                "Added {} to wallet {}",
                config.identity_label,
                config.wallet_dir.display()
            );
            ExitStatus::Success
        },
        Err(e) => {
            error!("Error adding to wallet. {}", e);
            if config.strict {
                ExitStatus::Failed
            } else {
                ExitStatus::Success
            }
        },
    }
}
