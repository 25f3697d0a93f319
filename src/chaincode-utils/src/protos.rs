//! Types generated from the subset of fabric-protos needed to evaluate a chaincode query.

pub mod common {
    tonic::include_proto!("common");
}

pub mod msp {
    tonic::include_proto!("msp");
}

pub mod peer {
    tonic::include_proto!("protos");
}

pub use common::{ChannelHeader, Header, HeaderType, SignatureHeader};
pub use msp::SerializedIdentity;
pub use peer::{
    chaincode_spec, endorser_client::EndorserClient, ChaincodeHeaderExtension, ChaincodeId,
    ChaincodeInput, ChaincodeInvocationSpec, ChaincodeProposalPayload, ChaincodeSpec,
    Endorsement, Proposal, ProposalResponse, Response, SignedProposal,
};
pub use prost_types::Timestamp;

pub const HEADER_TYPE_ENDORSER_TRANSACTION: i32 = HeaderType::EndorserTransaction as i32;
pub const CHAINCODE_TYPE_GOLANG: i32 = chaincode_spec::Type::Golang as i32;
