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

//! Decoding and validation of signed proposals.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use protobuf::Message;
use sha2::{Digest, Sha256};

use crate::msp::IdentityDeserializer;
use crate::protocol::chaincode::ChaincodeInput;
use crate::protocol::identity::SerializedIdentity;
use crate::protocol::proposal::{compute_tx_id, HeaderType, SignedProposal};
use crate::protos::{self, FromBytes, IntoNative};

/// A signed proposal decoded into the parts the endorser works with.
#[derive(Debug, Clone)]
pub struct UnpackedProposal {
    chaincode_name: String,
    channel_header: protos::common::ChannelHeader,
    input: ChaincodeInput,
    signature_header: protos::common::SignatureHeader,
    transient_map: HashMap<String, Vec<u8>>,
    signed_proposal: SignedProposal,
    proposal_hash: Vec<u8>,
}

impl UnpackedProposal {
    /// Decodes a signed proposal and computes its proposal hash.
    ///
    /// The hash is `SHA256(channel header || signature header || SHA256(payload))`, where the
    /// payload is re-serialized without its transient map so that transient data never
    /// contributes to it.
    pub fn unpack(signed_proposal: &SignedProposal) -> Result<Self, UnpackError> {
        let proposal: protos::proposal::Proposal =
            parse("Proposal", signed_proposal.proposal_bytes())?;
        let header: protos::common::Header = parse("Header", proposal.get_header())?;
        let channel_header: protos::common::ChannelHeader =
            parse("ChannelHeader", header.get_channel_header())?;
        let signature_header: protos::common::SignatureHeader =
            parse("SignatureHeader", header.get_signature_header())?;
        let header_extension: protos::proposal::ChaincodeHeaderExtension =
            parse("ChaincodeHeaderExtension", channel_header.get_extension())?;

        if !header_extension.has_chaincode_id() {
            return Err(UnpackError::MissingField(
                "ChaincodeHeaderExtension.ChaincodeId is nil".to_string(),
            ));
        }
        let chaincode_name = header_extension.get_chaincode_id().get_name();
        if chaincode_name.is_empty() {
            return Err(UnpackError::MissingField(
                "ChaincodeHeaderExtension.ChaincodeId.Name is empty".to_string(),
            ));
        }

        let mut payload: protos::proposal::ChaincodeProposalPayload =
            parse("ChaincodeProposalPayload", proposal.get_payload())?;
        let mut invocation_spec: protos::chaincode::ChaincodeInvocationSpec =
            parse("ChaincodeInvocationSpec", payload.get_input())?;

        if !invocation_spec.has_chaincode_spec() {
            return Err(UnpackError::MissingField(
                "chaincode invocation spec did not contain chaincode spec".to_string(),
            ));
        }
        if !invocation_spec.get_chaincode_spec().has_input() {
            return Err(UnpackError::MissingField(
                "chaincode input did not contain any input".to_string(),
            ));
        }
        let input = invocation_spec
            .mut_chaincode_spec()
            .take_input()
            .into_native()
            .map_err(|err| UnpackError::Unmarshal {
                structure: "ChaincodeInput",
                cause: err.to_string(),
            })?;

        let transient_map = payload.take_transient_map();
        let payload_bytes = payload.write_to_bytes().map_err(|err| {
            UnpackError::Marshal(format!(
                "could not marshal non-transient portion of payload: {}",
                err
            ))
        })?;

        let mut hasher = Sha256::new();
        hasher.update(header.get_channel_header());
        hasher.update(header.get_signature_header());
        hasher.update(Sha256::digest(&payload_bytes));

        Ok(UnpackedProposal {
            chaincode_name: chaincode_name.to_string(),
            channel_header,
            input,
            signature_header,
            transient_map,
            signed_proposal: signed_proposal.clone(),
            proposal_hash: hasher.finalize().to_vec(),
        })
    }

    /// Checks the proposal's header fields and transaction id, then authenticates its creator
    /// with `deserializer` and verifies the signature.
    ///
    /// Every failure to authenticate the creator yields the same `AccessDenied` error; the
    /// specific cause is only logged.
    pub fn validate(&self, deserializer: &dyn IdentityDeserializer) -> Result<(), ValidationError> {
        let header_type = self.header_type();
        if header_type != HeaderType::EndorserTransaction && header_type != HeaderType::Config {
            return Err(ValidationError::InvalidHeaderType(header_type));
        }
        if self.channel_header.get_epoch() != 0 {
            return Err(ValidationError::EpochNonZero);
        }
        if self.nonce().is_empty() {
            return Err(ValidationError::NonceEmpty);
        }
        if self.creator().is_empty() {
            return Err(ValidationError::CreatorEmpty);
        }

        let expected = compute_tx_id(self.nonce(), self.creator());
        if expected != self.tx_id() {
            return Err(ValidationError::IncorrectTxId {
                got: self.tx_id().to_string(),
                expected,
            });
        }

        if self.signed_proposal.proposal_bytes().is_empty() {
            return Err(ValidationError::EmptyProposalBytes);
        }
        if self.signed_proposal.signature().is_empty() {
            return Err(ValidationError::EmptySignatureBytes);
        }

        let msp_id = SerializedIdentity::from_bytes(self.creator())
            .map_err(|err| {
                warn!(
                    "access denied: channel [{}]: creator is malformed: {}",
                    self.channel_id(),
                    err
                );
                ValidationError::MalformedCreator {
                    channel_id: self.channel_id().to_string(),
                }
            })?
            .msp_id()
            .to_string();

        let access_denied = |cause: String| {
            warn!(
                "access denied: channel [{}] creator org [{}]: {}",
                self.channel_id(),
                msp_id,
                cause
            );
            ValidationError::AccessDenied {
                channel_id: self.channel_id().to_string(),
                msp_id: msp_id.clone(),
            }
        };

        let identity = deserializer
            .deserialize_identity(self.creator())
            .map_err(|err| access_denied(format!("failed to deserialize creator: {}", err)))?;
        identity
            .validate()
            .map_err(|err| access_denied(format!("creator identity is not valid: {}", err)))?;
        identity
            .verify(
                self.signed_proposal.proposal_bytes(),
                self.signed_proposal.signature(),
            )
            .map_err(|err| access_denied(format!("creator signature is not valid: {}", err)))?;

        debug!(
            "creator of proposal {} on channel [{}] is valid",
            self.tx_id(),
            self.channel_id()
        );
        Ok(())
    }

    pub fn channel_id(&self) -> &str {
        self.channel_header.get_channel_id()
    }

    pub fn tx_id(&self) -> &str {
        self.channel_header.get_tx_id()
    }

    pub fn header_type(&self) -> HeaderType {
        HeaderType::from(self.channel_header.get_header_type())
    }

    pub fn chaincode_name(&self) -> &str {
        &self.chaincode_name
    }

    pub fn input(&self) -> &ChaincodeInput {
        &self.input
    }

    pub fn creator(&self) -> &[u8] {
        self.signature_header.get_creator()
    }

    pub fn nonce(&self) -> &[u8] {
        self.signature_header.get_nonce()
    }

    /// The transient data of the proposal, passed to the chaincode but never hashed.
    pub fn transient_map(&self) -> &HashMap<String, Vec<u8>> {
        &self.transient_map
    }

    pub fn signed_proposal(&self) -> &SignedProposal {
        &self.signed_proposal
    }

    pub fn proposal_hash(&self) -> &[u8] {
        &self.proposal_hash
    }
}

fn parse<M: Message>(structure: &'static str, bytes: &[u8]) -> Result<M, UnpackError> {
    M::parse_from_bytes(bytes).map_err(|err| UnpackError::Unmarshal {
        structure,
        cause: err.to_string(),
    })
}

/// Errors raised while decoding a signed proposal.
#[derive(Debug)]
pub enum UnpackError {
    /// A nested structure could not be decoded.
    Unmarshal {
        structure: &'static str,
        cause: String,
    },
    MissingField(String),
    Marshal(String),
}

impl Error for UnpackError {}

impl fmt::Display for UnpackError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnpackError::Unmarshal { structure, cause } => {
                write!(f, "error unmarshalling {}: {}", structure, cause)
            }
            UnpackError::MissingField(msg) => f.write_str(msg),
            UnpackError::Marshal(msg) => f.write_str(msg),
        }
    }
}

/// Errors raised while validating an unpacked proposal.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    InvalidHeaderType(HeaderType),
    EpochNonZero,
    NonceEmpty,
    CreatorEmpty,
    IncorrectTxId { got: String, expected: String },
    EmptyProposalBytes,
    EmptySignatureBytes,
    /// The creator could not even be read far enough to learn its MSP.
    MalformedCreator { channel_id: String },
    AccessDenied { channel_id: String, msp_id: String },
}

impl Error for ValidationError {}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValidationError::InvalidHeaderType(header_type) => {
                write!(f, "invalid header type {}", header_type)
            }
            ValidationError::EpochNonZero => f.write_str("epoch is non-zero"),
            ValidationError::NonceEmpty => f.write_str("nonce is empty"),
            ValidationError::CreatorEmpty => f.write_str("creator is empty"),
            ValidationError::IncorrectTxId { got, expected } => write!(
                f,
                "incorrectly computed txid '{}' -- expected '{}'",
                got, expected
            ),
            ValidationError::EmptyProposalBytes => f.write_str("empty proposal bytes"),
            ValidationError::EmptySignatureBytes => f.write_str("empty signature bytes"),
            ValidationError::MalformedCreator { channel_id } => write!(
                f,
                "access denied: channel [{}] creator org unknown, creator is malformed",
                channel_id
            ),
            ValidationError::AccessDenied { channel_id, msp_id } => write!(
                f,
                "access denied: channel [{}] creator org [{}]",
                channel_id, msp_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use cylinder::{secp256k1::Secp256k1Context, Context, Signer};
    use protobuf::RepeatedField;

    use crate::msp::{Identity, IdentityError, Secp256k1Msp};
    use crate::protocol::proposal::ProposalBuilder;

    fn new_signer() -> Box<dyn Signer> {
        let context = Secp256k1Context::new();
        let key = context.new_random_private_key();
        context.new_signer(key)
    }

    fn builder() -> ProposalBuilder {
        ProposalBuilder::new()
            .with_channel_id("channel-id")
            .with_chaincode_name("chaincode-name")
            .with_msp_id("msp-id")
            .with_args(vec![b"arg1".to_vec(), b"arg2".to_vec(), b"arg3".to_vec()])
    }

    fn proposal_bytes(header: &protos::common::Header, payload: &[u8]) -> Vec<u8> {
        let mut proposal = protos::proposal::Proposal::new();
        proposal.set_header(header.write_to_bytes().expect("header"));
        proposal.set_payload(payload.to_vec());
        proposal.write_to_bytes().expect("proposal")
    }

    fn valid_header() -> protos::common::Header {
        let signed = builder()
            .build(&*new_signer())
            .expect("unable to build proposal");
        let proposal: protos::proposal::Proposal =
            Message::parse_from_bytes(signed.proposal_bytes()).expect("proposal");
        Message::parse_from_bytes(proposal.get_header()).expect("header")
    }

    fn unpack_err(proposal_bytes: Vec<u8>) -> String {
        match UnpackedProposal::unpack(&SignedProposal::new(proposal_bytes, vec![1])) {
            Err(err) => err.to_string(),
            Ok(_) => panic!("proposal should not unpack"),
        }
    }

    /// Tests that a built proposal unpacks into its channel, chaincode, input and transaction id.
    #[test]
    fn unpack_valid_proposal() {
        let pair = builder()
            .build_pair(&*new_signer())
            .expect("unable to build proposal");
        let up = UnpackedProposal::unpack(pair.signed_proposal()).expect("unable to unpack");

        assert_eq!("channel-id", up.channel_id());
        assert_eq!("chaincode-name", up.chaincode_name());
        assert_eq!(pair.tx_id(), up.tx_id());
        assert_eq!(
            &[b"arg1".to_vec(), b"arg2".to_vec(), b"arg3".to_vec()][..],
            up.input().args()
        );
        assert_eq!(32, up.proposal_hash().len());
    }

    /// Tests that proposals differing only in their transient maps hash identically.
    #[test]
    fn proposal_hash_excludes_transient_data() {
        let signer = new_signer();
        let mut transient = HashMap::new();
        transient.insert("secret".to_string(), b"value".to_vec());

        let plain = builder()
            .with_nonce(b"nonce".to_vec())
            .build(&*signer)
            .expect("unable to build proposal");
        let with_transient = builder()
            .with_nonce(b"nonce".to_vec())
            .with_transient_map(transient)
            .build(&*signer)
            .expect("unable to build proposal");

        let up1 = UnpackedProposal::unpack(&plain).expect("unable to unpack");
        let up2 = UnpackedProposal::unpack(&with_transient).expect("unable to unpack");

        assert_ne!(plain.proposal_bytes(), with_transient.proposal_bytes());
        assert!(up1.transient_map().is_empty());
        assert_eq!(Some(&b"value".to_vec()), up2.transient_map().get("secret"));
        assert_eq!(up1.proposal_hash(), up2.proposal_hash());
    }

    /// Tests that each nested structure that fails to decode is named in the error.
    #[test]
    fn unpack_garbage() {
        let garbage = vec![0xff, 0xff, 0xff];

        assert!(unpack_err(garbage.clone()).starts_with("error unmarshalling Proposal: "));

        let mut proposal = protos::proposal::Proposal::new();
        proposal.set_header(garbage.clone());
        assert!(unpack_err(proposal.write_to_bytes().expect("proposal"))
            .starts_with("error unmarshalling Header: "));

        let mut header = valid_header();
        header.set_channel_header(garbage.clone());
        assert!(unpack_err(proposal_bytes(&header, &[]))
            .starts_with("error unmarshalling ChannelHeader: "));

        let mut header = valid_header();
        header.set_signature_header(garbage.clone());
        assert!(unpack_err(proposal_bytes(&header, &[]))
            .starts_with("error unmarshalling SignatureHeader: "));

        let mut header = valid_header();
        let mut chdr: protos::common::ChannelHeader =
            Message::parse_from_bytes(header.get_channel_header()).expect("channel header");
        chdr.set_extension(garbage.clone());
        header.set_channel_header(chdr.write_to_bytes().expect("channel header"));
        assert!(unpack_err(proposal_bytes(&header, &[]))
            .starts_with("error unmarshalling ChaincodeHeaderExtension: "));

        assert!(unpack_err(proposal_bytes(&valid_header(), &garbage))
            .starts_with("error unmarshalling ChaincodeProposalPayload: "));

        let mut payload = protos::proposal::ChaincodeProposalPayload::new();
        payload.set_input(garbage);
        assert!(unpack_err(proposal_bytes(
            &valid_header(),
            &payload.write_to_bytes().expect("payload")
        ))
        .starts_with("error unmarshalling ChaincodeInvocationSpec: "));
    }

    /// Tests the errors for a missing chaincode id, name, spec and input.
    #[test]
    fn unpack_missing_fields() {
        let mut header = valid_header();
        let mut chdr: protos::common::ChannelHeader =
            Message::parse_from_bytes(header.get_channel_header()).expect("channel header");
        chdr.set_extension(vec![]);
        header.set_channel_header(chdr.write_to_bytes().expect("channel header"));
        assert_eq!(
            "ChaincodeHeaderExtension.ChaincodeId is nil",
            unpack_err(proposal_bytes(&header, &[]))
        );

        let mut ext = protos::proposal::ChaincodeHeaderExtension::new();
        ext.set_chaincode_id(protos::chaincode::ChaincodeID::new());
        chdr.set_extension(ext.write_to_bytes().expect("extension"));
        header.set_channel_header(chdr.write_to_bytes().expect("channel header"));
        assert_eq!(
            "ChaincodeHeaderExtension.ChaincodeId.Name is empty",
            unpack_err(proposal_bytes(&header, &[]))
        );

        assert_eq!(
            "chaincode invocation spec did not contain chaincode spec",
            unpack_err(proposal_bytes(&valid_header(), &[]))
        );

        let mut cis = protos::chaincode::ChaincodeInvocationSpec::new();
        cis.set_chaincode_spec(protos::chaincode::ChaincodeSpec::new());
        let mut payload = protos::proposal::ChaincodeProposalPayload::new();
        payload.set_input(cis.write_to_bytes().expect("invocation spec"));
        assert_eq!(
            "chaincode input did not contain any input",
            unpack_err(proposal_bytes(
                &valid_header(),
                &payload.write_to_bytes().expect("payload")
            ))
        );

        let mut input = protos::chaincode::ChaincodeInput::new();
        input.set_args(RepeatedField::from_vec(vec![]));
        cis.mut_chaincode_spec().set_input(input);
        payload.set_input(cis.write_to_bytes().expect("invocation spec"));
        let up = UnpackedProposal::unpack(&SignedProposal::new(
            proposal_bytes(&valid_header(), &payload.write_to_bytes().expect("payload")),
            vec![1],
        ))
        .expect("empty input should unpack");
        assert!(up.input().args().is_empty());
    }

    fn validate_err(builder: ProposalBuilder, signer: &dyn Signer) -> String {
        let signed = builder.build(signer).expect("unable to build proposal");
        let up = UnpackedProposal::unpack(&signed).expect("unable to unpack");
        match up.validate(&Secp256k1Msp::new(vec!["msp-id"])) {
            Err(err) => err.to_string(),
            Ok(()) => panic!("proposal should not validate"),
        }
    }

    /// Tests that a well formed proposal from a trusted creator validates.
    #[test]
    fn validate_valid_proposal() {
        let signed = builder()
            .build(&*new_signer())
            .expect("unable to build proposal");
        let up = UnpackedProposal::unpack(&signed).expect("unable to unpack");
        assert!(up.validate(&Secp256k1Msp::new(vec!["msp-id"])).is_ok());

        let config = builder()
            .with_header_type(HeaderType::Config)
            .build(&*new_signer())
            .expect("unable to build proposal");
        let up = UnpackedProposal::unpack(&config).expect("unable to unpack");
        assert!(up.validate(&Secp256k1Msp::new(vec!["msp-id"])).is_ok());
    }

    /// Tests the header checks, in order.
    #[test]
    fn validate_header_fields() {
        let signer = new_signer();

        assert_eq!(
            "invalid header type MESSAGE",
            validate_err(builder().with_header_type(HeaderType::Message), &*signer)
        );
        assert_eq!(
            "epoch is non-zero",
            validate_err(builder().with_epoch(1), &*signer)
        );
        assert_eq!(
            "nonce is empty",
            validate_err(builder().with_nonce(vec![]), &*signer)
        );
        assert_eq!(
            "creator is empty",
            validate_err(builder().with_creator(vec![]), &*signer)
        );
    }

    /// Tests that a transaction id not derived from the nonce and creator is rejected.
    #[test]
    fn validate_incorrect_tx_id() {
        let signer = new_signer();
        let pair = builder()
            .with_nonce(b"nonce".to_vec())
            .build_pair(&*signer)
            .expect("unable to build proposal");
        let expected = pair.tx_id().to_string();

        assert_eq!(
            format!(
                "incorrectly computed txid 'bogus' -- expected '{}'",
                expected
            ),
            validate_err(
                builder().with_nonce(b"nonce".to_vec()).with_tx_id("bogus"),
                &*signer
            )
        );
    }

    /// Tests that a missing signature is rejected before the creator is looked at.
    #[test]
    fn validate_empty_signature() {
        let signed = builder()
            .build(&*new_signer())
            .expect("unable to build proposal");
        let unsigned = SignedProposal::new(signed.proposal_bytes().to_vec(), vec![]);
        let up = UnpackedProposal::unpack(&unsigned).expect("unable to unpack");
        assert_eq!(
            Err(ValidationError::EmptySignatureBytes),
            up.validate(&Secp256k1Msp::new(vec!["msp-id"]))
        );
    }

    /// Tests that a creator which is not a serialized identity is reported without an org.
    #[test]
    fn validate_malformed_creator() {
        let signer = new_signer();
        assert_eq!(
            "access denied: channel [channel-id] creator org unknown, creator is malformed",
            validate_err(builder().with_creator(vec![0xff, 0xff, 0xff]), &*signer)
        );
    }

    struct FailingDeserializer;

    impl IdentityDeserializer for FailingDeserializer {
        fn deserialize_identity(
            &self,
            _serialized: &[u8],
        ) -> Result<Box<dyn Identity>, IdentityError> {
            Err(IdentityError::DeserializationError("boom".to_string()))
        }
    }

    /// Tests that a bad signature, an invalid identity and a failed deserialization all produce
    /// the same error.
    #[test]
    fn validate_uniform_access_denied() {
        let expected = ValidationError::AccessDenied {
            channel_id: "channel-id".to_string(),
            msp_id: "msp-id".to_string(),
        };
        assert_eq!(
            "access denied: channel [channel-id] creator org [msp-id]",
            expected.to_string()
        );

        let signed = builder()
            .build(&*new_signer())
            .expect("unable to build proposal");

        // signature by another key
        let forged = SignedProposal::new(
            signed.proposal_bytes().to_vec(),
            new_signer()
                .sign(signed.proposal_bytes())
                .expect("unable to sign")
                .as_slice()
                .to_vec(),
        );
        let up = UnpackedProposal::unpack(&forged).expect("unable to unpack");
        assert_eq!(
            Err(expected.clone()),
            up.validate(&Secp256k1Msp::new(vec!["msp-id"]))
        );

        // untrusted msp
        let up = UnpackedProposal::unpack(&signed).expect("unable to unpack");
        assert_eq!(
            Err(expected.clone()),
            up.validate(&Secp256k1Msp::new(vec!["other-msp"]))
        );

        // deserialization failure
        assert_eq!(Err(expected), up.validate(&FailingDeserializer));
    }
}
