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

//! Proposal responses and the payload an endorsement signs.

use protobuf::Message;

use crate::protos::{
    self, FromBytes, FromNative, FromProto, IntoBytes, IntoNative, IntoProto, ProtoConversionError,
};

use super::chaincode::ChaincodeId;

/// Chaincode completed successfully.
pub const OK: i32 = 200;
/// The lower bound of client and chaincode application errors.
pub const ERROR_THRESHOLD: i32 = 400;
/// The lower bound of system errors, and the status of every response built by the endorser.
pub const INTERNAL_SERVER_ERROR: i32 = 500;

/// An HTTP style status, message and payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Response {
    status: i32,
    message: String,
    payload: Vec<u8>,
}

impl Response {
    pub fn new(status: i32, message: &str, payload: Vec<u8>) -> Self {
        Response {
            status,
            message: message.to_string(),
            payload,
        }
    }

    pub fn status(&self) -> i32 {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl FromProto<protos::proposal_response::Response> for Response {
    fn from_proto(
        mut response: protos::proposal_response::Response,
    ) -> Result<Self, ProtoConversionError> {
        Ok(Response {
            status: response.get_status(),
            message: response.take_message(),
            payload: response.take_payload(),
        })
    }
}

impl FromNative<Response> for protos::proposal_response::Response {
    fn from_native(response: Response) -> Result<Self, ProtoConversionError> {
        let mut proto = protos::proposal_response::Response::new();
        proto.set_status(response.status);
        proto.set_message(response.message);
        proto.set_payload(response.payload);
        Ok(proto)
    }
}

impl IntoProto<protos::proposal_response::Response> for Response {}
impl IntoNative<Response> for protos::proposal_response::Response {}

/// A signature by an endorsing peer, along with that peer's serialized identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Endorsement {
    endorser: Vec<u8>,
    signature: Vec<u8>,
}

impl Endorsement {
    pub fn new(endorser: Vec<u8>, signature: Vec<u8>) -> Self {
        Endorsement {
            endorser,
            signature,
        }
    }

    pub fn endorser(&self) -> &[u8] {
        &self.endorser
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

impl FromProto<protos::proposal_response::Endorsement> for Endorsement {
    fn from_proto(
        mut endorsement: protos::proposal_response::Endorsement,
    ) -> Result<Self, ProtoConversionError> {
        Ok(Endorsement {
            endorser: endorsement.take_endorser(),
            signature: endorsement.take_signature(),
        })
    }
}

impl FromNative<Endorsement> for protos::proposal_response::Endorsement {
    fn from_native(endorsement: Endorsement) -> Result<Self, ProtoConversionError> {
        let mut proto = protos::proposal_response::Endorsement::new();
        proto.set_endorser(endorsement.endorser);
        proto.set_signature(endorsement.signature);
        Ok(proto)
    }
}

impl IntoProto<protos::proposal_response::Endorsement> for Endorsement {}
impl IntoNative<Endorsement> for protos::proposal_response::Endorsement {}

/// The endorser's answer to a proposal.
///
/// `payload` holds a serialized `ProposalResponsePayload` and `endorsement` a signature over it.
/// A response with a status of 400 or above never carries an endorsement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProposalResponse {
    version: i32,
    response: Response,
    payload: Option<Vec<u8>>,
    endorsement: Option<Endorsement>,
}

impl ProposalResponse {
    pub fn new(
        version: i32,
        response: Response,
        payload: Option<Vec<u8>>,
        endorsement: Option<Endorsement>,
    ) -> Self {
        ProposalResponse {
            version,
            response,
            payload,
            endorsement,
        }
    }

    /// A response with only a status and message.
    pub fn error(status: i32, message: &str) -> Self {
        ProposalResponse {
            response: Response::new(status, message, vec![]),
            ..Default::default()
        }
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    pub fn endorsement(&self) -> Option<&Endorsement> {
        self.endorsement.as_ref()
    }
}

impl FromProto<protos::proposal_response::ProposalResponse> for ProposalResponse {
    fn from_proto(
        mut response: protos::proposal_response::ProposalResponse,
    ) -> Result<Self, ProtoConversionError> {
        let payload = response.take_payload();
        let endorsement = if response.has_endorsement() {
            Some(response.take_endorsement().into_native()?)
        } else {
            None
        };
        Ok(ProposalResponse {
            version: response.get_version(),
            response: response.take_response().into_native()?,
            payload: if payload.is_empty() {
                None
            } else {
                Some(payload)
            },
            endorsement,
        })
    }
}

impl FromNative<ProposalResponse> for protos::proposal_response::ProposalResponse {
    fn from_native(response: ProposalResponse) -> Result<Self, ProtoConversionError> {
        let mut proto = protos::proposal_response::ProposalResponse::new();
        proto.set_version(response.version);
        proto.set_response(response.response.into_proto()?);
        if let Some(payload) = response.payload {
            proto.set_payload(payload);
        }
        if let Some(endorsement) = response.endorsement {
            proto.set_endorsement(endorsement.into_proto()?);
        }
        Ok(proto)
    }
}

impl FromBytes<ProposalResponse> for ProposalResponse {
    fn from_bytes(bytes: &[u8]) -> Result<ProposalResponse, ProtoConversionError> {
        let proto: protos::proposal_response::ProposalResponse = Message::parse_from_bytes(bytes)
            .map_err(|_| {
                ProtoConversionError::DeserializationError(
                    "Unable to get ProposalResponse from bytes".to_string(),
                )
            })?;
        proto.into_native()
    }
}

impl IntoBytes for ProposalResponse {
    fn into_bytes(self) -> Result<Vec<u8>, ProtoConversionError> {
        let proto = self.into_proto()?;
        let bytes = proto.write_to_bytes().map_err(|_| {
            ProtoConversionError::SerializationError(
                "Unable to get bytes from ProposalResponse".to_string(),
            )
        })?;
        Ok(bytes)
    }
}

impl IntoProto<protos::proposal_response::ProposalResponse> for ProposalResponse {}
impl IntoNative<ProposalResponse> for protos::proposal_response::ProposalResponse {}

/// The result of simulating a chaincode invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChaincodeAction {
    results: Vec<u8>,
    events: Vec<u8>,
    response: Response,
    chaincode_id: ChaincodeId,
}

impl ChaincodeAction {
    /// `events` is a serialized `ChaincodeEvent`, or empty when no event is attached.
    pub fn new(
        results: Vec<u8>,
        events: Vec<u8>,
        response: Response,
        chaincode_id: ChaincodeId,
    ) -> Self {
        ChaincodeAction {
            results,
            events,
            response,
            chaincode_id,
        }
    }

    pub fn results(&self) -> &[u8] {
        &self.results
    }

    pub fn events(&self) -> &[u8] {
        &self.events
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn chaincode_id(&self) -> &ChaincodeId {
        &self.chaincode_id
    }
}

impl FromProto<protos::proposal::ChaincodeAction> for ChaincodeAction {
    fn from_proto(
        mut action: protos::proposal::ChaincodeAction,
    ) -> Result<Self, ProtoConversionError> {
        Ok(ChaincodeAction {
            results: action.take_results(),
            events: action.take_events(),
            response: action.take_response().into_native()?,
            chaincode_id: action.take_chaincode_id().into_native()?,
        })
    }
}

impl FromNative<ChaincodeAction> for protos::proposal::ChaincodeAction {
    fn from_native(action: ChaincodeAction) -> Result<Self, ProtoConversionError> {
        let mut proto = protos::proposal::ChaincodeAction::new();
        proto.set_results(action.results);
        proto.set_events(action.events);
        proto.set_response(action.response.into_proto()?);
        proto.set_chaincode_id(action.chaincode_id.into_proto()?);
        Ok(proto)
    }
}

impl IntoProto<protos::proposal::ChaincodeAction> for ChaincodeAction {}
impl IntoNative<ChaincodeAction> for protos::proposal::ChaincodeAction {}

/// The bytes an endorsement signs: the hash of the proposal and the simulated action.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProposalResponsePayload {
    proposal_hash: Vec<u8>,
    chaincode_action: ChaincodeAction,
}

impl ProposalResponsePayload {
    pub fn new(proposal_hash: Vec<u8>, chaincode_action: ChaincodeAction) -> Self {
        ProposalResponsePayload {
            proposal_hash,
            chaincode_action,
        }
    }

    pub fn proposal_hash(&self) -> &[u8] {
        &self.proposal_hash
    }

    pub fn chaincode_action(&self) -> &ChaincodeAction {
        &self.chaincode_action
    }
}

impl FromProto<protos::proposal_response::ProposalResponsePayload> for ProposalResponsePayload {
    fn from_proto(
        mut payload: protos::proposal_response::ProposalResponsePayload,
    ) -> Result<Self, ProtoConversionError> {
        let action: protos::proposal::ChaincodeAction =
            Message::parse_from_bytes(payload.get_extension()).map_err(|_| {
                ProtoConversionError::DeserializationError(
                    "Unable to get ChaincodeAction from extension".to_string(),
                )
            })?;
        Ok(ProposalResponsePayload {
            proposal_hash: payload.take_proposal_hash(),
            chaincode_action: action.into_native()?,
        })
    }
}

impl FromNative<ProposalResponsePayload> for protos::proposal_response::ProposalResponsePayload {
    fn from_native(payload: ProposalResponsePayload) -> Result<Self, ProtoConversionError> {
        let action: protos::proposal::ChaincodeAction = payload.chaincode_action.into_proto()?;
        let mut proto = protos::proposal_response::ProposalResponsePayload::new();
        proto.set_proposal_hash(payload.proposal_hash);
        proto.set_extension(action.write_to_bytes()?);
        Ok(proto)
    }
}

impl FromBytes<ProposalResponsePayload> for ProposalResponsePayload {
    fn from_bytes(bytes: &[u8]) -> Result<ProposalResponsePayload, ProtoConversionError> {
        let proto: protos::proposal_response::ProposalResponsePayload =
            Message::parse_from_bytes(bytes).map_err(|_| {
                ProtoConversionError::DeserializationError(
                    "Unable to get ProposalResponsePayload from bytes".to_string(),
                )
            })?;
        proto.into_native()
    }
}

impl IntoBytes for ProposalResponsePayload {
    fn into_bytes(self) -> Result<Vec<u8>, ProtoConversionError> {
        let proto = self.into_proto()?;
        let bytes = proto.write_to_bytes().map_err(|_| {
            ProtoConversionError::SerializationError(
                "Unable to get bytes from ProposalResponsePayload".to_string(),
            )
        })?;
        Ok(bytes)
    }
}

impl IntoProto<protos::proposal_response::ProposalResponsePayload> for ProposalResponsePayload {}
impl IntoNative<ProposalResponsePayload> for protos::proposal_response::ProposalResponsePayload {}
