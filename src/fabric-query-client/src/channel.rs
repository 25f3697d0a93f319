use chaincode_utils::{
    build_query_proposal, query_payload, sign_proposal, Endorser, EndorserError, QueryRequest,
    TransactionContext,
};
use fabric_identity::{IdentitySigner, X509Identity};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Error returned by a single peer.
#[derive(Debug)]
pub struct PeerFailure {
    pub peer: String,
    pub error: EndorserError,
}

impl fmt::Display for PeerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.peer, self.error)
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("no connected peer can query chaincode on channel {0}")]
    NoQueryPeers(String),
    #[error(transparent)]
    Proposal(#[from] EndorserError),
    #[error("query failed on every peer: {}", format_failures(.0))]
    AllPeersFailed(Vec<PeerFailure>),
}

fn format_failures(failures: &[PeerFailure]) -> String {
    failures
        .iter()
        .map(PeerFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct Channel<'a> {
    name: String,
    identity: &'a X509Identity,
    signer: &'a IdentitySigner,
    /// peers answering queries, in the order they are tried
    peers: Vec<&'a dyn Endorser>,
}

impl<'a> Channel<'a> {
    pub fn new(
        name: &str,
        identity: &'a X509Identity,
        signer: &'a IdentitySigner,
        peers: Vec<&'a dyn Endorser>,
    ) -> Self {
        Self {
            name: name.to_string(),
            identity,
            signer,
            peers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluates `request` without writing to the ledger.
    ///
    /// The same signed proposal is sent to one peer at a time; the first successful
    /// response is returned.
    #[tracing::instrument(name = "query_by_chaincode", skip_all,
        fields(
            channel = %self.name,
            request = %request
        )
    )]
    pub async fn query_by_chaincode(&self, request: &QueryRequest) -> Result<Vec<u8>, ChannelError> {
        if self.peers.is_empty() {
            return Err(ChannelError::NoQueryPeers(self.name.clone()));
        }

        let ctx = TransactionContext::new(self.identity)?;
        let proposal = build_query_proposal(&self.name, request, &ctx);
        let signed_proposal = sign_proposal(&proposal, self.signer);
        debug!("Evaluating transaction {}", ctx.tx_id);

        let mut failures = Vec::new();
        for peer in &self.peers {
            let response = peer
                .process_proposal(signed_proposal.clone())
                .await
                .and_then(query_payload);
            match response {
                Ok(payload) => {
                    debug!("Peer {} answered with {} bytes", peer.name(), payload.len());
                    return Ok(payload);
                },
                Err(error) => {
                    warn!("Query failed on peer {}: {}", peer.name(), error);
                    failures.push(PeerFailure {
                        peer: peer.name().to_string(),
                        error,
                    });
                },
            }
        }
        Err(ChannelError::AllPeersFailed(failures))
    }
}
