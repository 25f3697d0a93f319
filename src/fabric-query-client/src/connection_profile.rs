use chaincode_utils::PeerEndpoint;
use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer,
};
use std::{
    collections::BTreeMap,
    fmt, fs, io,
    marker::PhantomData,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// Endorser timeout used when the profile does not set `client.connection.timeout.peer.endorser`.
pub const DEFAULT_ENDORSER_TIMEOUT_SECS: u64 = 300;
/// Connect timeout used when a peer does not set `grpc-wait-for-ready-timeout`.
pub const DEFAULT_CONNECT_TIMEOUT_MILLIS: u64 = 3000;

const WAIT_FOR_READY_TIMEOUT: &str = "grpc-wait-for-ready-timeout";

const SSL_TARGET_NAME_OVERRIDE: &str = "ssl-target-name-override";
const HOSTNAME_OVERRIDE: &str = "hostnameOverride";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("could not read connection profile {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed connection profile: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("channel {0} is not defined in the connection profile")]
    UnknownChannel(String),
    #[error("peer {0} is not defined in the connection profile")]
    UnknownPeer(String),
    #[error("invalid timeout {0:?}")]
    InvalidTimeout(String),
    #[error("could not read the TLS CA certificate of peer {peer} from {path}: {source}")]
    TlsCaCerts {
        peer: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Network topology: organizations, peers and channels.
/// Orderers and certificate authorities are not needed to evaluate queries and are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelSection>,
    #[serde(default)]
    pub organizations: BTreeMap<String, OrganizationSection>,
    #[serde(default)]
    pub peers: BTreeMap<String, NodeSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSection {
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub connection: ConnectionSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionSection {
    #[serde(default)]
    pub timeout: TimeoutSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeoutSection {
    #[serde(default)]
    pub peer: PeerTimeoutSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeerTimeoutSection {
    #[serde(default)]
    pub endorser: Option<Seconds>,
}

/// Profiles write timeouts both as numbers and as strings, e.g. `'300'`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Seconds {
    Number(u64),
    Text(String),
}

impl ClientSection {
    pub fn endorser_timeout(&self) -> Result<Duration, ProfileError> {
        let secs = match &self.connection.timeout.peer.endorser {
            None => DEFAULT_ENDORSER_TIMEOUT_SECS,
            Some(Seconds::Number(secs)) => *secs,
            Some(Seconds::Text(text)) => text
                .trim()
                .parse()
                .map_err(|_| ProfileError::InvalidTimeout(text.clone()))?,
        };
        Ok(Duration::from_secs(secs))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelSection {
    /// peers in the order they are listed
    #[serde(default, deserialize_with = "ordered_map")]
    pub peers: Vec<(String, Option<PeerRoles>)>,
}

/// Roles a peer plays in a channel, all enabled unless stated otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerRoles {
    #[serde(default = "enabled")]
    pub endorsing_peer: bool,
    #[serde(default = "enabled")]
    pub chaincode_query: bool,
    #[serde(default = "enabled")]
    pub ledger_query: bool,
    #[serde(default = "enabled")]
    pub event_source: bool,
}

fn enabled() -> bool {
    true
}

impl Default for PeerRoles {
    fn default() -> Self {
        Self {
            endorsing_peer: true,
            chaincode_query: true,
            ledger_query: true,
            event_source: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganizationSection {
    pub mspid: String,
    #[serde(default)]
    pub peers: Vec<String>,
}

/// A peer or an orderer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSection {
    pub url: String,
    #[serde(default)]
    pub grpc_options: BTreeMap<String, serde_yaml::Value>,
    #[serde(default, rename = "tlsCACerts")]
    pub tls_ca_certs: Option<TlsCaCerts>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsCaCerts {
    #[serde(default)]
    pub pem: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl NodeSection {
    fn ssl_target_name_override(&self) -> Option<String> {
        [SSL_TARGET_NAME_OVERRIDE, HOSTNAME_OVERRIDE]
            .iter()
            .find_map(|key| self.grpc_options.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string)
    }

    fn connect_timeout(&self) -> Result<Duration, ProfileError> {
        let millis = match self.grpc_options.get(WAIT_FOR_READY_TIMEOUT) {
            None => DEFAULT_CONNECT_TIMEOUT_MILLIS,
            Some(value) => value
                .as_u64()
                .or_else(|| value.as_str().and_then(|text| text.trim().parse().ok()))
                .ok_or_else(|| ProfileError::InvalidTimeout(format!("{:?}", value)))?,
        };
        Ok(Duration::from_millis(millis))
    }
}

fn ordered_map<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct OrderedMapVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map")
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
}

impl ConnectionProfile {
    /// Loads a YAML (or JSON) connection profile.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let profile = fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&profile)
    }

    pub fn from_yaml_str(profile: &str) -> Result<Self, ProfileError> {
        Ok(serde_yaml::from_str(profile)?)
    }

    pub fn client_organization(&self) -> Option<&OrganizationSection> {
        self.client
            .organization
            .as_ref()
            .and_then(|name| self.organizations.get(name))
    }

    /// MSP id of the organization the client belongs to.
    pub fn client_msp_id(&self) -> Option<&str> {
        self.client_organization().map(|org| org.mspid.as_str())
    }

    pub fn channel(&self, name: &str) -> Result<&ChannelSection, ProfileError> {
        self.channels
            .get(name)
            .ok_or_else(|| ProfileError::UnknownChannel(name.to_string()))
    }

    /// Peers able to answer chaincode queries on `channel`, in profile order.
    /// Falls back to the peers of the client organization when the channel lists none.
    pub fn channel_query_peers(&self, channel: &str) -> Result<Vec<String>, ProfileError> {
        let channel = self.channel(channel)?;
        if channel.peers.is_empty() {
            return Ok(self
                .client_organization()
                .map(|org| org.peers.clone())
                .unwrap_or_default());
        }
        Ok(channel
            .peers
            .iter()
            .filter(|(_, roles)| roles.as_ref().map_or(true, |r| r.chaincode_query))
            .map(|(name, _)| name.clone())
            .collect())
    }

    pub fn peer_endpoint(&self, name: &str) -> Result<PeerEndpoint, ProfileError> {
        let peer = self
            .peers
            .get(name)
            .ok_or_else(|| ProfileError::UnknownPeer(name.to_string()))?;

        let tls_ca_pem = match &peer.tls_ca_certs {
            Some(TlsCaCerts { pem: Some(pem), .. }) => Some(pem.clone()),
            Some(TlsCaCerts {
                pem: None,
                path: Some(path),
            }) => Some(
                fs::read_to_string(path).map_err(|source| ProfileError::TlsCaCerts {
                    peer: name.to_string(),
                    path: path.clone(),
                    source,
                })?,
            ),
            _ => None,
        };

        Ok(PeerEndpoint {
            name: name.to_string(),
            url: peer.url.clone(),
            tls_ca_pem,
            ssl_target_name_override: peer.ssl_target_name_override(),
            connect_timeout: peer.connect_timeout()?,
            timeout: self.client.endorser_timeout()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"
name: "basic-network"
x-type: "hlfv1"
description: "The basic network"
version: "1.0"
client:
  organization: Org1
  connection:
    timeout:
      peer:
        endorser: '120'
        eventHub: '300'
channels:
  mychannel:
    orderers:
      - orderer.example.com
    peers:
      peer1.org1.example.com:
        endorsingPeer: true
        chaincodeQuery: true
      peer0.org1.example.com: {}
      peer2.org1.example.com:
        chaincodeQuery: false
  emptychannel:
    orderers:
      - orderer.example.com
organizations:
  Org1:
    mspid: Org1MSP
    peers:
      - peer0.org1.example.com
    certificateAuthorities:
      - ca.example.com
orderers:
  orderer.example.com:
    url: grpc://localhost:7050
peers:
  peer0.org1.example.com:
    url: grpc://localhost:7051
  peer1.org1.example.com:
    url: grpcs://localhost:8051
    grpcOptions:
      ssl-target-name-override: peer1.org1.example.com
    tlsCACerts:
      pem: |
        -----BEGIN CERTIFICATE-----
        MIIB
        -----END CERTIFICATE-----
  peer2.org1.example.com:
    url: grpc://localhost:9051
certificateAuthorities:
  ca.example.com:
    url: http://localhost:7054
    caName: ca.example.com
"#;

    #[test]
    fn test_parse_profile() {
        let profile = ConnectionProfile::from_yaml_str(PROFILE).unwrap();
        assert_eq!(profile.name.as_deref(), Some("basic-network"));
        assert_eq!(profile.client_msp_id(), Some("Org1MSP"));
        assert_eq!(profile.peers.len(), 3);
        assert_eq!(
            profile.client.endorser_timeout().unwrap(),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_channel_query_peers_keep_profile_order() {
        let profile = ConnectionProfile::from_yaml_str(PROFILE).unwrap();
        assert_eq!(
            profile.channel_query_peers("mychannel").unwrap(),
            vec!["peer1.org1.example.com", "peer0.org1.example.com"]
        );
    }

    #[test]
    fn test_channel_without_peers_uses_client_organization() {
        let profile = ConnectionProfile::from_yaml_str(PROFILE).unwrap();
        assert_eq!(
            profile.channel_query_peers("emptychannel").unwrap(),
            vec!["peer0.org1.example.com"]
        );
    }

    #[test]
    fn test_unknown_channel() {
        let profile = ConnectionProfile::from_yaml_str(PROFILE).unwrap();
        assert!(matches!(
            profile.channel_query_peers("otherchannel"),
            Err(ProfileError::UnknownChannel(name)) if name == "otherchannel"
        ));
    }

    #[test]
    fn test_peer_endpoint() {
        let profile = ConnectionProfile::from_yaml_str(PROFILE).unwrap();

        let peer0 = profile.peer_endpoint("peer0.org1.example.com").unwrap();
        assert_eq!(peer0.url, "grpc://localhost:7051");
        assert_eq!(peer0.tls_ca_pem, None);
        assert_eq!(peer0.timeout, Duration::from_secs(120));
        assert_eq!(
            peer0.connect_timeout,
            Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MILLIS)
        );

        let peer1 = profile.peer_endpoint("peer1.org1.example.com").unwrap();
        assert!(peer1.tls_ca_pem.unwrap().contains("BEGIN CERTIFICATE"));
        assert_eq!(
            peer1.ssl_target_name_override.as_deref(),
            Some("peer1.org1.example.com")
        );

        assert!(matches!(
            profile.peer_endpoint("peer9.org1.example.com"),
            Err(ProfileError::UnknownPeer(_))
        ));
    }

    #[test]
    fn test_tls_ca_certs_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let ca_path = dir.path().join("ca.pem");
        fs::write(&ca_path, "-----BEGIN CERTIFICATE-----").unwrap();
        let profile = format!(
            "peers:\n  peer0:\n    url: grpcs://localhost:7051\n    tlsCACerts:\n      path: {}\n",
            ca_path.display()
        );

        let profile = ConnectionProfile::from_yaml_str(&profile).unwrap();

        assert_eq!(
            profile.peer_endpoint("peer0").unwrap().tls_ca_pem.as_deref(),
            Some("-----BEGIN CERTIFICATE-----")
        );
    }

    #[test]
    fn test_default_and_numeric_timeouts() {
        let profile = ConnectionProfile::from_yaml_str("name: minimal\n").unwrap();
        assert_eq!(
            profile.client.endorser_timeout().unwrap(),
            Duration::from_secs(DEFAULT_ENDORSER_TIMEOUT_SECS)
        );

        let profile = ConnectionProfile::from_yaml_str(
            "client:\n  connection:\n    timeout:\n      peer:\n        endorser: 30\n",
        )
        .unwrap();
        assert_eq!(
            profile.client.endorser_timeout().unwrap(),
            Duration::from_secs(30)
        );

        let profile = ConnectionProfile::from_yaml_str(
            "client:\n  connection:\n    timeout:\n      peer:\n        endorser: soon\n",
        )
        .unwrap();
        assert!(matches!(
            profile.client.endorser_timeout(),
            Err(ProfileError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_connect_timeout_is_independent_of_endorser_timeout() {
        let profile = ConnectionProfile::from_yaml_str(
            r#"
client:
  connection:
    timeout:
      peer:
        endorser: '300'
peers:
  peer0:
    url: grpc://localhost:7051
    grpcOptions:
      grpc-wait-for-ready-timeout: 5000
  peer1:
    url: grpc://localhost:8051
    grpcOptions:
      grpc-wait-for-ready-timeout: '1500'
  peer2:
    url: grpc://localhost:9051
    grpcOptions:
      grpc-wait-for-ready-timeout: later
"#,
        )
        .unwrap();

        let peer0 = profile.peer_endpoint("peer0").unwrap();
        assert_eq!(peer0.connect_timeout, Duration::from_secs(5));
        assert_eq!(peer0.timeout, Duration::from_secs(300));
        assert_eq!(
            profile.peer_endpoint("peer1").unwrap().connect_timeout,
            Duration::from_millis(1500)
        );
        assert!(matches!(
            profile.peer_endpoint("peer2"),
            Err(ProfileError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_client_msp_id() {
        let profile = ConnectionProfile::from_yaml_str("name: minimal
").unwrap();
        assert_eq!(profile.client_msp_id(), None);
    }

    #[test]
    fn test_json_profile() {
        let profile = ConnectionProfile::from_yaml_str(
            r#"{"channels": {"mychannel": {"peers": {"peer0": {}}}}, "peers": {"peer0": {"url": "grpc://localhost:7051"}}}"#,
        )
        .unwrap();
        assert_eq!(
            profile.channel_query_peers("mychannel").unwrap(),
            vec!["peer0"]
        );
    }

    #[test]
    fn test_missing_and_malformed_profile() {
        assert!(matches!(
            ConnectionProfile::from_file("./does/not/exist.yaml"),
            Err(ProfileError::Read { .. })
        ));
        assert!(matches!(
            ConnectionProfile::from_yaml_str("peers: [unterminated"),
            Err(ProfileError::Parse(_))
        ));
    }
}
