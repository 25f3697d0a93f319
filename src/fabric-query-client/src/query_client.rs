use crate::{
    channel::ChannelError,
    connection_profile::{ConnectionProfile, ProfileError},
    gateway::{ConnectionOptions, Gateway, GatewayError},
    QueryClientConfig,
};
use chaincode_utils::EndorserConnector;
use fabric_identity::Wallet;
use serde_json::Value;
use std::{str::Utf8Error, sync::Arc};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum QueryClientError {
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("query result is not UTF-8: {0}")]
    ResultNotUtf8(#[from] Utf8Error),
    #[error("query result is not JSON: {0}")]
    ResultNotJson(#[from] serde_json::Error),
}

/// Outcome of a run, mapped onto the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// the query failed and the client runs in strict mode
    Failed,
    /// an error escaped the query flow
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

pub fn decode_query_result(bytes: &[u8]) -> Result<Value, QueryClientError> {
    let text = std::str::from_utf8(bytes)?;
    Ok(serde_json::from_str(text)?)
}

async fn query_ledger(
    gateway: &mut Gateway,
    config: &QueryClientConfig,
    wallet: Arc<dyn Wallet>,
) -> Result<Value, QueryClientError> {
    let profile = ConnectionProfile::from_file(&config.connection_profile)?;
    let options = ConnectionOptions {
        identity: config.identity_label.clone(),
        wallet,
    };

    gateway.connect(profile, options).await?;
    info!("Connected to Fabric gateway.");

    let network = gateway.get_network(&config.channel)?;
    let channel = network.channel();
    info!("Querying channel {}", channel.name());

    let request = config.query_request();
    let result = channel.query_by_chaincode(&request).await?;
    let result = decode_query_result(&result)?;
    println!("{:#}", result);

    Ok(result)
}

/// Runs the query and disconnects the gateway afterwards, whatever the outcome.
pub async fn evaluate(
    gateway: &mut Gateway,
    config: &QueryClientConfig,
    wallet: Arc<dyn Wallet>,
) -> Result<Value, QueryClientError> {
    let outcome = query_ledger(gateway, config, wallet).await;
    if let Err(e) = &outcome {
        error!("Error processing transaction. {}", e);
    }

    info!("Disconnect from Fabric gateway.");
    gateway.disconnect();

    outcome
}

/// Failures of the query are logged; they only change the exit status in strict mode.
pub async fn run(
    config: &QueryClientConfig,
    wallet: Arc<dyn Wallet>,
    connector: Arc<dyn EndorserConnector>,
) -> ExitStatus {
    let mut gateway = Gateway::new(connector);
    match evaluate(&mut gateway, config, wallet).await {
        Ok(_) => ExitStatus::Success,
        Err(_) if config.strict => ExitStatus::Failed,
        Err(_) => ExitStatus::Success,
    }
}
