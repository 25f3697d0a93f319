use thiserror::Error;

pub mod endorser;
pub mod proposal;
pub mod protos;

pub use endorser::{Endorser, EndorserConnector, GrpcEndorserConnector, PeerEndpoint};
pub use proposal::{
    build_query_proposal, query_payload, sign_proposal, QueryRequest, TransactionContext,
};

#[derive(Debug, Error)]
pub enum EndorserError {
    #[error("invalid peer url {0:?}")]
    InvalidUrl(String),
    #[error("peer {0} uses TLS but no CA certificate is configured")]
    MissingTlsCaCertificate(String),
    #[error("could not connect to peer {peer}: {message}")]
    Connect { peer: String, message: String },
    #[error("request to peer {peer} failed: {status}")]
    Rpc {
        peer: String,
        #[source]
        status: tonic::Status,
    },
    #[error("proposal rejected with status {status}: {message}")]
    Rejected { status: i32, message: String },
    #[error("proposal response carries no chaincode response")]
    MissingResponse,
    #[error("could not generate a nonce")]
    Nonce,
}
