use async_trait::async_trait;
use chaincode_utils::{
    protos::{ProposalResponse, Response, SignedProposal},
    Endorser, EndorserConnector, EndorserError, PeerEndpoint,
};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

pub const DEFAULT_PAYLOAD: &[u8] = br#"{"greeting":"hello world"}"#;

/// How a mock peer answers proposals.
#[derive(Debug, Clone)]
pub enum MockReply {
    Payload(Vec<u8>),
    Status(i32, String),
    Unavailable,
}

#[derive(Default)]
struct MockNetworkState {
    unreachable: HashSet<String>,
    replies: HashMap<String, MockReply>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    proposals: Mutex<Vec<(String, SignedProposal)>>,
}

/// Connector handing out in-process peers, recording what happens to them.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<MockNetworkState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_mut(&mut self) -> &mut MockNetworkState {
        Arc::get_mut(&mut self.state).expect("configure the mock before sharing it")
    }

    pub fn unreachable(mut self, peer: &str) -> Self {
        self.state_mut().unreachable.insert(peer.to_string());
        self
    }

    pub fn reply(mut self, peer: &str, reply: MockReply) -> Self {
        self.state_mut().replies.insert(peer.to_string(), reply);
        self
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Proposals received so far, with the name of the receiving peer.
    pub fn proposals(&self) -> Vec<(String, SignedProposal)> {
        self.state.proposals.lock().unwrap().clone()
    }
}

#[async_trait]
impl EndorserConnector for MockConnector {
    async fn connect(&self, peer: &PeerEndpoint) -> Result<Box<dyn Endorser>, EndorserError> {
        if self.state.unreachable.contains(&peer.name) {
            return Err(EndorserError::Connect {
                peer: peer.name.clone(),
                message: String::from("connection refused"),
            });
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockEndorser {
            name: peer.name.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockEndorser {
    name: String,
    state: Arc<MockNetworkState>,
}

#[async_trait]
impl Endorser for MockEndorser {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_proposal(
        &self,
        proposal: SignedProposal,
    ) -> Result<ProposalResponse, EndorserError> {
        self.state
            .proposals
            .lock()
            .unwrap()
            .push((self.name.clone(), proposal));

        let reply = self
            .state
            .replies
            .get(&self.name)
            .cloned()
            .unwrap_or_else(|| MockReply::Payload(DEFAULT_PAYLOAD.to_vec()));
        let response = match reply {
            MockReply::Payload(payload) => Response {
                status: 200,
                message: String::new(),
                payload,
            },
            MockReply::Status(status, message) => Response {
                status,
                message,
                payload: Vec::new(),
            },
            MockReply::Unavailable => {
                return Err(EndorserError::Connect {
                    peer: self.name.clone(),
                    message: String::from("peer went away"),
                })
            },
        };
        Ok(ProposalResponse {
            response: Some(response),
            ..Default::default()
        })
    }

    fn close(self: Box<Self>) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}
