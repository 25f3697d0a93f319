use crate::protos::{
    ChaincodeHeaderExtension, ChaincodeId, ChaincodeInput, ChaincodeInvocationSpec,
    ChaincodeProposalPayload, ChaincodeSpec, ChannelHeader, Header, Proposal, ProposalResponse,
    SerializedIdentity, SignatureHeader, SignedProposal, Timestamp, CHAINCODE_TYPE_GOLANG,
    HEADER_TYPE_ENDORSER_TRANSACTION,
};
use crate::EndorserError;
use fabric_identity::{IdentitySigner, X509Identity};
use prost::Message;
use ring::{
    digest::{digest, SHA256},
    rand::{SecureRandom, SystemRandom},
};
use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

const NONCE_LENGTH: usize = 24;

/// Lowest status code returned by the chaincode for a failed invocation.
pub const STATUS_ERROR_THRESHOLD: i32 = 400;
pub const STATUS_OK: i32 = 200;

/// Read-only invocation of a chaincode function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub chaincode_id: String,
    pub function: String,
    pub args: Vec<String>,
}

impl QueryRequest {
    pub fn new(
        chaincode_id: impl Into<String>,
        function: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            chaincode_id: chaincode_id.into(),
            function: function.into(),
            args,
        }
    }

    /// Chaincode input: the function name followed by its arguments.
    pub fn input_args(&self) -> Vec<Vec<u8>> {
        std::iter::once(&self.function)
            .chain(self.args.iter())
            .map(|arg| arg.as_bytes().to_vec())
            .collect()
    }
}

impl fmt::Display for QueryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}({})",
            self.chaincode_id,
            self.function,
            self.args.join(", ")
        )
    }
}

/// Identifies a single proposal: the creator, a fresh nonce and the derived transaction id.
#[derive(Debug, Clone)]
pub struct TransactionContext {
    pub tx_id: String,
    pub nonce: Vec<u8>,
    pub creator: Vec<u8>,
}

impl TransactionContext {
    pub fn new(identity: &X509Identity) -> Result<Self, EndorserError> {
        let mut nonce = vec![0u8; NONCE_LENGTH];
        SystemRandom::new()
            .fill(&mut nonce)
            .map_err(|_| EndorserError::Nonce)?;
        Ok(Self::with_nonce(identity, nonce))
    }

    /// tx id = hex(SHA-256(nonce || creator))
    pub fn with_nonce(identity: &X509Identity, nonce: Vec<u8>) -> Self {
        let creator = SerializedIdentity {
            mspid: identity.msp_id.clone(),
            id_bytes: identity.certificate_bytes().to_vec(),
        }
        .encode_to_vec();

        let mut preimage = nonce.clone();
        preimage.extend_from_slice(&creator);
        let tx_id = hex::encode(digest(&SHA256, &preimage));

        Self {
            tx_id,
            nonce,
            creator,
        }
    }
}

fn now() -> Timestamp {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Timestamp {
        seconds: since_epoch.as_secs() as i64,
        nanos: since_epoch.subsec_nanos() as i32,
    }
}

/// Builds the unsigned proposal evaluating `request` on `channel`.
pub fn build_query_proposal(
    channel: &str,
    request: &QueryRequest,
    ctx: &TransactionContext,
) -> Proposal {
    let chaincode_id = ChaincodeId {
        name: request.chaincode_id.clone(),
        ..Default::default()
    };

    let channel_header = ChannelHeader {
        r#type: HEADER_TYPE_ENDORSER_TRANSACTION,
        version: 1,
        timestamp: Some(now()),
        channel_id: channel.to_string(),
        tx_id: ctx.tx_id.clone(),
        epoch: 0,
        extension: ChaincodeHeaderExtension {
            chaincode_id: Some(chaincode_id.clone()),
        }
        .encode_to_vec(),
        tls_cert_hash: Vec::new(),
    };
    let signature_header = SignatureHeader {
        creator: ctx.creator.clone(),
        nonce: ctx.nonce.clone(),
    };
    let header = Header {
        channel_header: channel_header.encode_to_vec(),
        signature_header: signature_header.encode_to_vec(),
    };

    let invocation_spec = ChaincodeInvocationSpec {
        chaincode_spec: Some(ChaincodeSpec {
            r#type: CHAINCODE_TYPE_GOLANG,
            chaincode_id: Some(chaincode_id),
            input: Some(ChaincodeInput {
                args: request.input_args(),
                ..Default::default()
            }),
            timeout: 0,
        }),
    };
    let payload = ChaincodeProposalPayload {
        input: invocation_spec.encode_to_vec(),
        ..Default::default()
    };

    Proposal {
        header: header.encode_to_vec(),
        payload: payload.encode_to_vec(),
        extension: Vec::new(),
    }
}

pub fn sign_proposal(proposal: &Proposal, signer: &IdentitySigner) -> SignedProposal {
    let proposal_bytes = proposal.encode_to_vec();
    let signature = signer.sign(&proposal_bytes);
    SignedProposal {
        proposal_bytes,
        signature,
    }
}

/// Extracts the chaincode result from an endorser response.
pub fn query_payload(response: ProposalResponse) -> Result<Vec<u8>, EndorserError> {
    let response = response.response.ok_or(EndorserError::MissingResponse)?;
    if response.status < STATUS_OK || response.status >= STATUS_ERROR_THRESHOLD {
        return Err(EndorserError::Rejected {
            status: response.status,
            message: response.message,
        });
    }
    Ok(response.payload)
}
