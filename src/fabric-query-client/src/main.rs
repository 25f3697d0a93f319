use crate::query_client::ExitStatus;
use chaincode_utils::{GrpcEndorserConnector, QueryRequest};
use fabric_identity::FileSystemWallet;
use std::sync::Arc;
use structopt::StructOpt;
use tracing::info;

mod channel;
mod connection_profile;
mod gateway;
mod gateway_tracing;
mod query_client;

/// Argument passed to the chaincode function when none is given.
const DEFAULT_QUERY_ARG: &str = "GREETING";

#[derive(Debug, StructOpt)]
#[structopt(name = "query", about = "Evaluates a chaincode query on a Fabric channel")]
pub struct QueryClientConfig {
    #[structopt(long, default_value = "./network.yaml")]
    /// connection profile describing the network
    connection_profile: String,

    #[structopt(long, default_value = "./_idwallet")]
    /// directory of the wallet holding the identity
    wallet_dir: String,

    #[structopt(long, default_value = "User1@org1.example.com")]
    /// label of the identity used to connect to the network
    identity_label: String,

    #[structopt(long, default_value = "mychannel")]
    channel: String,

    #[structopt(long, default_value = "smartContractDec2018")]
    chaincode_id: String,

    #[structopt(long, default_value = "query")]
    /// chaincode function to evaluate
    function: String,

    #[structopt(long = "arg", number_of_values = 1)]
    /// argument of the chaincode function, can be repeated [default: GREETING]
    args: Vec<String>,

    #[structopt(long)]
    /// exit with code 1 when the query fails
    strict: bool,

    #[structopt(long)]
    /// directory where JSON traces are written
    trace_dir: Option<String>,
}

impl QueryClientConfig {
    fn query_args(&self) -> Vec<String> {
        if self.args.is_empty() {
            vec![DEFAULT_QUERY_ARG.to_string()]
        } else {
            self.args.clone()
        }
    }

    fn query_request(&self) -> QueryRequest {
        QueryRequest::new(
            self.chaincode_id.as_str(),
            self.function.as_str(),
            self.query_args(),
        )
    }
}

async fn start(config: &QueryClientConfig) -> Result<ExitStatus, String> {
    let _tracing = gateway_tracing::init_tracing(config.trace_dir.as_deref())?;
    info!("Query client config: {:?}", config);

    let wallet = Arc::new(FileSystemWallet::new(&config.wallet_dir));
    let status = query_client::run(config, wallet, Arc::new(GrpcEndorserConnector)).await;

    info!("done");
    Ok(status)
}

#[tokio::main]
async fn main() {
    let config = QueryClientConfig::from_args();

    let status = match start(&config).await {
        Ok(status) => status,
        Err(e) => {
            println!("Final error checking.......");
            println!("{}", e);
            ExitStatus::Unexpected
        },
    };

    std::process::exit(status.code());
}
