/*
 * Copyright 2019 Cargill Incorporated
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 * -----------------------------------------------------------------------------
 */

//! Signed proposals.
//!
//! A proposal asks an endorsing peer to simulate a chaincode invocation on a channel. It is
//! submitted as a `SignedProposal`: the serialized proposal plus the creator's signature over
//! those bytes. `ProposalBuilder` assembles and signs proposals on behalf of a client.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use cylinder::{Signer, SigningError};
use protobuf::{Message, RepeatedField};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::protos::{
    self, FromBytes, FromNative, FromProto, IntoBytes, IntoNative, IntoProto, ProtoConversionError,
};

use super::identity::SerializedIdentity;

const DEFAULT_NONCE_SIZE: usize = 24;

/// The type of a transaction, as recorded in its channel header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderType {
    Message,
    Config,
    ConfigUpdate,
    EndorserTransaction,
    OrdererTransaction,
    DeliverSeekInfo,
    ChaincodePackage,
    Unknown(i32),
}

impl From<i32> for HeaderType {
    fn from(value: i32) -> Self {
        match value {
            0 => HeaderType::Message,
            1 => HeaderType::Config,
            2 => HeaderType::ConfigUpdate,
            3 => HeaderType::EndorserTransaction,
            4 => HeaderType::OrdererTransaction,
            5 => HeaderType::DeliverSeekInfo,
            6 => HeaderType::ChaincodePackage,
            other => HeaderType::Unknown(other),
        }
    }
}

impl From<HeaderType> for i32 {
    fn from(header_type: HeaderType) -> Self {
        match header_type {
            HeaderType::Message => 0,
            HeaderType::Config => 1,
            HeaderType::ConfigUpdate => 2,
            HeaderType::EndorserTransaction => 3,
            HeaderType::OrdererTransaction => 4,
            HeaderType::DeliverSeekInfo => 5,
            HeaderType::ChaincodePackage => 6,
            HeaderType::Unknown(other) => other,
        }
    }
}

impl fmt::Display for HeaderType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HeaderType::Message => f.write_str("MESSAGE"),
            HeaderType::Config => f.write_str("CONFIG"),
            HeaderType::ConfigUpdate => f.write_str("CONFIG_UPDATE"),
            HeaderType::EndorserTransaction => f.write_str("ENDORSER_TRANSACTION"),
            HeaderType::OrdererTransaction => f.write_str("ORDERER_TRANSACTION"),
            HeaderType::DeliverSeekInfo => f.write_str("DELIVER_SEEK_INFO"),
            HeaderType::ChaincodePackage => f.write_str("CHAINCODE_PACKAGE"),
            HeaderType::Unknown(other) => write!(f, "{}", other),
        }
    }
}

/// Computes the transaction id bound to a nonce and creator: the hex encoded SHA-256 digest of
/// their concatenation.
pub fn compute_tx_id(nonce: &[u8], creator: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(creator);
    hex::encode(hasher.finalize())
}

/// A serialized proposal and the signature of its creator over those bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignedProposal {
    proposal_bytes: Vec<u8>,
    signature: Vec<u8>,
}

impl SignedProposal {
    pub fn new(proposal_bytes: Vec<u8>, signature: Vec<u8>) -> Self {
        SignedProposal {
            proposal_bytes,
            signature,
        }
    }

    pub fn proposal_bytes(&self) -> &[u8] {
        &self.proposal_bytes
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

impl FromProto<protos::proposal::SignedProposal> for SignedProposal {
    fn from_proto(
        mut proposal: protos::proposal::SignedProposal,
    ) -> Result<Self, ProtoConversionError> {
        Ok(SignedProposal {
            proposal_bytes: proposal.take_proposal_bytes(),
            signature: proposal.take_signature(),
        })
    }
}

impl FromNative<SignedProposal> for protos::proposal::SignedProposal {
    fn from_native(proposal: SignedProposal) -> Result<Self, ProtoConversionError> {
        let mut proto = protos::proposal::SignedProposal::new();
        proto.set_proposal_bytes(proposal.proposal_bytes);
        proto.set_signature(proposal.signature);
        Ok(proto)
    }
}

impl FromBytes<SignedProposal> for SignedProposal {
    fn from_bytes(bytes: &[u8]) -> Result<SignedProposal, ProtoConversionError> {
        let proto: protos::proposal::SignedProposal =
            Message::parse_from_bytes(bytes).map_err(|_| {
                ProtoConversionError::DeserializationError(
                    "Unable to get SignedProposal from bytes".to_string(),
                )
            })?;
        proto.into_native()
    }
}

impl IntoBytes for SignedProposal {
    fn into_bytes(self) -> Result<Vec<u8>, ProtoConversionError> {
        let proto = self.into_proto()?;
        let bytes = proto.write_to_bytes().map_err(|_| {
            ProtoConversionError::SerializationError(
                "Unable to get bytes from SignedProposal".to_string(),
            )
        })?;
        Ok(bytes)
    }
}

impl IntoProto<protos::proposal::SignedProposal> for SignedProposal {}
impl IntoNative<SignedProposal> for protos::proposal::SignedProposal {}

/// A signed proposal together with the transaction id it was built with.
pub struct ProposalPair {
    signed_proposal: SignedProposal,
    tx_id: String,
}

impl ProposalPair {
    pub fn signed_proposal(&self) -> &SignedProposal {
        &self.signed_proposal
    }

    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    pub fn take(self) -> (SignedProposal, String) {
        (self.signed_proposal, self.tx_id)
    }
}

#[derive(Debug)]
pub enum ProposalBuildError {
    MissingField(String),
    SerializationError(String),
    SigningError(String),
}

impl StdError for ProposalBuildError {}

impl fmt::Display for ProposalBuildError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ProposalBuildError::MissingField(ref s) => write!(f, "MissingField: {}", s),
            ProposalBuildError::SerializationError(ref s) => {
                write!(f, "SerializationError: {}", s)
            }
            ProposalBuildError::SigningError(ref s) => write!(f, "SigningError: {}", s),
        }
    }
}

impl From<ProtoConversionError> for ProposalBuildError {
    fn from(e: ProtoConversionError) -> Self {
        ProposalBuildError::SerializationError(format!("{}", e))
    }
}

impl From<protobuf::ProtobufError> for ProposalBuildError {
    fn from(e: protobuf::ProtobufError) -> Self {
        ProposalBuildError::SerializationError(format!("{}", e))
    }
}

impl From<SigningError> for ProposalBuildError {
    fn from(err: SigningError) -> Self {
        Self::SigningError(err.to_string())
    }
}

/// Builds a chaincode invocation proposal and signs it.
///
/// Unless overridden, the creator is a `SerializedIdentity` holding the signer's public key under
/// the configured MSP id, the nonce is random, and the transaction id is derived from both.
#[derive(Default, Clone)]
pub struct ProposalBuilder {
    channel_id: Option<String>,
    chaincode_name: Option<String>,
    chaincode_version: Option<String>,
    args: Option<Vec<Vec<u8>>>,
    transient_map: Option<HashMap<String, Vec<u8>>>,
    msp_id: Option<String>,
    creator: Option<Vec<u8>>,
    nonce: Option<Vec<u8>>,
    tx_id: Option<String>,
    header_type: Option<HeaderType>,
    epoch: Option<u64>,
}

impl ProposalBuilder {
    pub fn new() -> Self {
        ProposalBuilder::default()
    }

    /// Sets the channel; proposals built without one are channel-less.
    pub fn with_channel_id(mut self, channel_id: &str) -> ProposalBuilder {
        self.channel_id = Some(channel_id.to_string());
        self
    }

    pub fn with_chaincode_name(mut self, chaincode_name: &str) -> ProposalBuilder {
        self.chaincode_name = Some(chaincode_name.to_string());
        self
    }

    pub fn with_chaincode_version(mut self, chaincode_version: &str) -> ProposalBuilder {
        self.chaincode_version = Some(chaincode_version.to_string());
        self
    }

    pub fn with_args(mut self, args: Vec<Vec<u8>>) -> ProposalBuilder {
        self.args = Some(args);
        self
    }

    pub fn with_transient_map(
        mut self,
        transient_map: HashMap<String, Vec<u8>>,
    ) -> ProposalBuilder {
        self.transient_map = Some(transient_map);
        self
    }

    pub fn with_msp_id(mut self, msp_id: &str) -> ProposalBuilder {
        self.msp_id = Some(msp_id.to_string());
        self
    }

    /// Uses the given bytes as the creator instead of the signer's serialized identity.
    pub fn with_creator(mut self, creator: Vec<u8>) -> ProposalBuilder {
        self.creator = Some(creator);
        self
    }

    pub fn with_nonce(mut self, nonce: Vec<u8>) -> ProposalBuilder {
        self.nonce = Some(nonce);
        self
    }

    /// Overrides the derived transaction id.
    pub fn with_tx_id(mut self, tx_id: &str) -> ProposalBuilder {
        self.tx_id = Some(tx_id.to_string());
        self
    }

    pub fn with_header_type(mut self, header_type: HeaderType) -> ProposalBuilder {
        self.header_type = Some(header_type);
        self
    }

    pub fn with_epoch(mut self, epoch: u64) -> ProposalBuilder {
        self.epoch = Some(epoch);
        self
    }

    pub fn build_pair(self, signer: &dyn Signer) -> Result<ProposalPair, ProposalBuildError> {
        let chaincode_name = self.chaincode_name.ok_or_else(|| {
            ProposalBuildError::MissingField("'chaincode_name' field is required".to_string())
        })?;
        let creator = match self.creator {
            Some(creator) => creator,
            None => {
                let msp_id = self.msp_id.ok_or_else(|| {
                    ProposalBuildError::MissingField("'msp_id' field is required".to_string())
                })?;
                let public_key = signer.public_key()?.as_slice().to_vec();
                SerializedIdentity::new(msp_id, public_key).into_bytes()?
            }
        };
        let nonce = self.nonce.unwrap_or_else(|| {
            rand::thread_rng()
                .gen::<[u8; DEFAULT_NONCE_SIZE]>()
                .to_vec()
        });
        let tx_id = self
            .tx_id
            .unwrap_or_else(|| compute_tx_id(&nonce, &creator));
        let args = self.args.unwrap_or_else(Vec::new);

        let mut chaincode_id = protos::chaincode::ChaincodeID::new();
        chaincode_id.set_name(chaincode_name);
        chaincode_id.set_version(self.chaincode_version.unwrap_or_default());

        let mut extension = protos::proposal::ChaincodeHeaderExtension::new();
        extension.set_chaincode_id(chaincode_id.clone());

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let mut channel_header = protos::common::ChannelHeader::new();
        channel_header.set_header_type(
            self.header_type
                .unwrap_or(HeaderType::EndorserTransaction)
                .into(),
        );
        channel_header.set_timestamp(timestamp);
        channel_header.set_channel_id(self.channel_id.unwrap_or_default());
        channel_header.set_tx_id(tx_id.clone());
        channel_header.set_epoch(self.epoch.unwrap_or(0));
        channel_header.set_extension(extension.write_to_bytes()?);

        let mut signature_header = protos::common::SignatureHeader::new();
        signature_header.set_creator(creator);
        signature_header.set_nonce(nonce);

        let mut header = protos::common::Header::new();
        header.set_channel_header(channel_header.write_to_bytes()?);
        header.set_signature_header(signature_header.write_to_bytes()?);

        let mut input = protos::chaincode::ChaincodeInput::new();
        input.set_args(RepeatedField::from_vec(args));

        let mut spec = protos::chaincode::ChaincodeSpec::new();
        spec.set_chaincode_id(chaincode_id);
        spec.set_input(input);

        let mut invocation_spec = protos::chaincode::ChaincodeInvocationSpec::new();
        invocation_spec.set_chaincode_spec(spec);

        let mut payload = protos::proposal::ChaincodeProposalPayload::new();
        payload.set_input(invocation_spec.write_to_bytes()?);
        payload.set_transient_map(self.transient_map.unwrap_or_default());

        let mut proposal = protos::proposal::Proposal::new();
        proposal.set_header(header.write_to_bytes()?);
        proposal.set_payload(payload.write_to_bytes()?);

        let proposal_bytes = proposal.write_to_bytes()?;
        let signature = signer.sign(&proposal_bytes)?.as_slice().to_vec();

        Ok(ProposalPair {
            signed_proposal: SignedProposal::new(proposal_bytes, signature),
            tx_id,
        })
    }

    pub fn build(self, signer: &dyn Signer) -> Result<SignedProposal, ProposalBuildError> {
        Ok(self.build_pair(signer)?.signed_proposal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use cylinder::{secp256k1::Secp256k1Context, Context};

    fn new_signer() -> Box<dyn Signer> {
        let context = Secp256k1Context::new();
        let key = context.new_random_private_key();
        context.new_signer(key)
    }

    /// Tests that the transaction id is the hex SHA-256 of the nonce followed by the creator.
    #[test]
    fn tx_id_is_digest_of_nonce_and_creator() {
        let expected = hex::encode(Sha256::digest(b"noncecreator"));
        assert_eq!(expected, compute_tx_id(b"nonce", b"creator"));
        assert_ne!(
            compute_tx_id(b"nonce", b"creator"),
            compute_tx_id(b"creator", b"nonce")
        );
    }

    /// Tests that header types display by name and unknown values by number.
    #[test]
    fn header_type_display() {
        assert_eq!("ENDORSER_TRANSACTION", HeaderType::from(3).to_string());
        assert_eq!("MESSAGE", HeaderType::from(0).to_string());
        assert_eq!("42", HeaderType::from(42).to_string());
        assert_eq!(1, i32::from(HeaderType::Config));
    }

    /// Tests that a built proposal carries the signer's signature and a creator whose tx id
    /// matches the one reported by the builder.
    #[test]
    fn build_signed_proposal() {
        let signer = new_signer();
        let pair = ProposalBuilder::new()
            .with_channel_id("channel-id")
            .with_chaincode_name("chaincode-name")
            .with_msp_id("msp-id")
            .with_args(vec![b"arg1".to_vec()])
            .build_pair(&*signer)
            .expect("unable to build proposal");

        let proposal: protos::proposal::Proposal =
            Message::parse_from_bytes(pair.signed_proposal().proposal_bytes())
                .expect("unable to parse proposal");
        let header: protos::common::Header =
            Message::parse_from_bytes(proposal.get_header()).expect("unable to parse header");
        let shdr: protos::common::SignatureHeader =
            Message::parse_from_bytes(header.get_signature_header())
                .expect("unable to parse signature header");
        let chdr: protos::common::ChannelHeader =
            Message::parse_from_bytes(header.get_channel_header())
                .expect("unable to parse channel header");

        assert_eq!(DEFAULT_NONCE_SIZE, shdr.get_nonce().len());
        assert_eq!(
            compute_tx_id(shdr.get_nonce(), shdr.get_creator()),
            pair.tx_id()
        );
        assert_eq!(pair.tx_id(), chdr.get_tx_id());
        assert_eq!("channel-id", chdr.get_channel_id());

        let creator = SerializedIdentity::from_bytes(shdr.get_creator()).expect("bad creator");
        assert_eq!("msp-id", creator.msp_id());
        assert_eq!(
            signer.public_key().expect("no public key").as_slice(),
            creator.id_bytes()
        );
        assert!(!pair.signed_proposal().signature().is_empty());
    }

    /// Tests that a missing chaincode name is reported as a missing field.
    #[test]
    fn build_without_chaincode_name() {
        let signer = new_signer();
        match ProposalBuilder::new().with_msp_id("msp-id").build(&*signer) {
            Err(ProposalBuildError::MissingField(_)) => (),
            res => panic!("expected MissingField, got {:?}", res),
        }
    }
}
