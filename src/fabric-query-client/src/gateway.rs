use crate::{
    channel::Channel,
    connection_profile::{ConnectionProfile, ProfileError},
};
use chaincode_utils::{Endorser, EndorserConnector};
use fabric_identity::{IdentityError, IdentitySigner, Wallet, WalletError, X509Identity};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway is already connected")]
    AlreadyConnected,
    #[error("gateway is not connected")]
    NotConnected,
    #[error("Identity not found in wallet: {0}")]
    IdentityNotFound(String),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("none of the {0} peers in the connection profile could be reached")]
    NoReachablePeers(usize),
}

/// Identity used to connect and the wallet to load it from.
#[derive(Clone)]
pub struct ConnectionOptions {
    pub identity: String,
    pub wallet: Arc<dyn Wallet>,
}

/// State held while the gateway is connected
struct GatewayConnection {
    profile: ConnectionProfile,
    identity: X509Identity,
    signer: IdentitySigner,
    endorsers: BTreeMap<String, Box<dyn Endorser>>,
}

/// Connection to a Fabric network on behalf of a single identity.
///
/// Peer connections are released by [Gateway::disconnect], or when the gateway is dropped.
pub struct Gateway {
    connector: Arc<dyn EndorserConnector>,
    connection: Option<GatewayConnection>,
}

impl Gateway {
    pub fn new(connector: Arc<dyn EndorserConnector>) -> Self {
        Self {
            connector,
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Loads the identity from the wallet and connects to the peers of the profile.
    /// Peers that cannot be reached are skipped, as long as at least one is reachable.
    #[tracing::instrument(name = "gateway_connect", skip_all, fields(identity = %options.identity))]
    pub async fn connect(
        &mut self,
        profile: ConnectionProfile,
        options: ConnectionOptions,
    ) -> Result<(), GatewayError> {
        if self.is_connected() {
            return Err(GatewayError::AlreadyConnected);
        }

        let identity = options
            .wallet
            .get(&options.identity)?
            .ok_or_else(|| GatewayError::IdentityNotFound(options.identity.clone()))?;
        let signer = identity.signer()?;
        debug!("Loaded identity of {}", identity.msp_id);
        if let Some(msp_id) = profile.client_msp_id() {
            if msp_id != identity.msp_id {
                warn!(
                    "Identity {} belongs to {} but the client organization is {}",
                    options.identity, identity.msp_id, msp_id
                );
            }
        }

        let mut endorsers = BTreeMap::new();
        for name in profile.peers.keys() {
            let endpoint = match profile.peer_endpoint(name) {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    warn!("Skipping peer {}: {}", name, e);
                    continue;
                },
            };
            match self.connector.connect(&endpoint).await {
                Ok(endorser) => {
                    debug!("Connected to peer {} at {}", name, endpoint.url);
                    endorsers.insert(name.clone(), endorser);
                },
                Err(e) => warn!("Could not connect to peer {}: {}", name, e),
            }
        }
        if endorsers.is_empty() {
            return Err(GatewayError::NoReachablePeers(profile.peers.len()));
        }
        info!(
            "Connected to {} of {} peers of network {}",
            endorsers.len(),
            profile.peers.len(),
            profile.name.as_deref().unwrap_or("<unnamed>")
        );

        self.connection = Some(GatewayConnection {
            profile,
            identity,
            signer,
            endorsers,
        });
        Ok(())
    }

    /// Returns the network backed by the channel `name` of the connection profile.
    #[tracing::instrument(name = "gateway_get_network", skip(self))]
    pub fn get_network(&self, name: &str) -> Result<Network<'_>, GatewayError> {
        let connection = self.connection.as_ref().ok_or(GatewayError::NotConnected)?;

        let mut peers: Vec<&dyn Endorser> = Vec::new();
        for peer in connection.profile.channel_query_peers(name)? {
            match connection.endorsers.get(&peer) {
                Some(endorser) => peers.push(&**endorser),
                None => warn!("Query peer {} of channel {} is not connected", peer, name),
            }
        }
        debug!("Channel {} has {} query peers", name, peers.len());

        Ok(Network {
            channel: Channel::new(name, &connection.identity, &connection.signer, peers),
        })
    }

    /// Closes every peer connection. Calling it again has no effect.
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            for (name, endorser) in connection.endorsers {
                debug!("Disconnecting from peer {}", name);
                endorser.close();
            }
        }
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// A channel of the network, as seen through a connected gateway.
pub struct Network<'a> {
    channel: Channel<'a>,
}

impl<'a> Network<'a> {
    pub fn channel(&self) -> &Channel<'a> {
        &self.channel
    }
}
