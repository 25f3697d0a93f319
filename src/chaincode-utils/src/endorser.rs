use crate::{
    protos::{EndorserClient, ProposalResponse, SignedProposal},
    EndorserError,
};
use async_trait::async_trait;
use std::time::Duration;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tracing::debug;

/// Everything needed to reach the endorser service of a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEndpoint {
    pub name: String,
    /// `grpc://host:port` or `grpcs://host:port`
    pub url: String,
    /// CA certificate used to verify the peer when connecting over TLS
    pub tls_ca_pem: Option<String>,
    /// host name expected in the peer TLS certificate, if different from the url host
    pub ssl_target_name_override: Option<String>,
    /// how long to wait for the connection to be established
    pub connect_timeout: Duration,
    /// how long to wait for the answer to a proposal
    pub timeout: Duration,
}

/// Connection to the endorser service of a single peer.
#[async_trait]
pub trait Endorser: Send + Sync {
    fn name(&self) -> &str;

    async fn process_proposal(
        &self,
        proposal: SignedProposal,
    ) -> Result<ProposalResponse, EndorserError>;

    /// Releases the connection.
    fn close(self: Box<Self>);
}

/// Opens connections to peers.
#[async_trait]
pub trait EndorserConnector: Send + Sync {
    async fn connect(&self, peer: &PeerEndpoint) -> Result<Box<dyn Endorser>, EndorserError>;
}

/// Maps the Fabric url schemes onto the ones understood by the transport.
/// Returns the uri and whether TLS is required.
pub fn transport_uri(url: &str) -> Result<(String, bool), EndorserError> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| EndorserError::InvalidUrl(url.to_string()))?;
    if rest.is_empty() {
        return Err(EndorserError::InvalidUrl(url.to_string()));
    }
    match scheme {
        "grpc" | "http" => Ok((format!("http://{}", rest), false)),
        "grpcs" | "https" => Ok((format!("https://{}", rest), true)),
        _ => Err(EndorserError::InvalidUrl(url.to_string())),
    }
}

/// Connects to peers over gRPC.
#[derive(Debug, Default, Clone)]
pub struct GrpcEndorserConnector;

impl GrpcEndorserConnector {
    fn endpoint(peer: &PeerEndpoint) -> Result<Endpoint, EndorserError> {
        let (uri, use_tls) = transport_uri(&peer.url)?;
        let mut endpoint = Endpoint::from_shared(uri)
            .map_err(|_| EndorserError::InvalidUrl(peer.url.clone()))?
            .connect_timeout(peer.connect_timeout)
            .timeout(peer.timeout);

        if use_tls {
            let ca_pem = peer
                .tls_ca_pem
                .as_ref()
                .ok_or_else(|| EndorserError::MissingTlsCaCertificate(peer.name.clone()))?;
            let mut tls_config =
                ClientTlsConfig::new().ca_certificate(Certificate::from_pem(ca_pem));
            if let Some(domain_name) = &peer.ssl_target_name_override {
                tls_config = tls_config.domain_name(domain_name.clone());
            }
            endpoint = endpoint
                .tls_config(tls_config)
                .map_err(|e| EndorserError::Connect {
                    peer: peer.name.clone(),
                    message: e.to_string(),
                })?;
        }
        Ok(endpoint)
    }
}

#[async_trait]
impl EndorserConnector for GrpcEndorserConnector {
    async fn connect(&self, peer: &PeerEndpoint) -> Result<Box<dyn Endorser>, EndorserError> {
        let channel = Self::endpoint(peer)?
            .connect()
            .await
            .map_err(|e| EndorserError::Connect {
                peer: peer.name.clone(),
                message: e.to_string(),
            })?;

        Ok(Box::new(GrpcEndorser {
            name: peer.name.clone(),
            client: EndorserClient::new(channel),
        }))
    }
}

/// gRPC client of the `protos.Endorser` service.
pub struct GrpcEndorser {
    name: String,
    client: EndorserClient<Channel>,
}

#[async_trait]
impl Endorser for GrpcEndorser {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_proposal(
        &self,
        proposal: SignedProposal,
    ) -> Result<ProposalResponse, EndorserError> {
        let mut client = self.client.clone();
        let response = client
            .process_proposal(tonic::Request::new(proposal))
            .await
            .map_err(|status| EndorserError::Rpc {
                peer: self.name.clone(),
                status,
            })?;

        Ok(response.into_inner())
    }

    fn close(self: Box<Self>) {
        debug!("Closing connection to peer {}", self.name);
        // dropping the last handle of the channel shuts the connection down
    }
}
