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

//! Chaincode identifiers, invocation inputs and events.

use std::collections::HashMap;

use protobuf::{Message, RepeatedField};

use crate::protos::{
    self, FromBytes, FromNative, FromProto, IntoBytes, IntoNative, IntoProto, ProtoConversionError,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChaincodeId {
    name: String,
    version: String,
    path: String,
}

impl ChaincodeId {
    pub fn new(name: &str) -> Self {
        ChaincodeId {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl FromProto<protos::chaincode::ChaincodeID> for ChaincodeId {
    fn from_proto(mut id: protos::chaincode::ChaincodeID) -> Result<Self, ProtoConversionError> {
        Ok(ChaincodeId {
            name: id.take_name(),
            version: id.take_version(),
            path: id.take_path(),
        })
    }
}

impl FromNative<ChaincodeId> for protos::chaincode::ChaincodeID {
    fn from_native(id: ChaincodeId) -> Result<Self, ProtoConversionError> {
        let mut proto = protos::chaincode::ChaincodeID::new();
        proto.set_name(id.name);
        proto.set_version(id.version);
        proto.set_path(id.path);
        Ok(proto)
    }
}

impl IntoProto<protos::chaincode::ChaincodeID> for ChaincodeId {}
impl IntoNative<ChaincodeId> for protos::chaincode::ChaincodeID {}

/// The arguments of a chaincode invocation.
///
/// By convention the first argument names the function to invoke.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChaincodeInput {
    args: Vec<Vec<u8>>,
    decorations: HashMap<String, Vec<u8>>,
    is_init: bool,
}

impl ChaincodeInput {
    pub fn new(args: Vec<Vec<u8>>) -> Self {
        ChaincodeInput {
            args,
            ..Default::default()
        }
    }

    pub fn args(&self) -> &[Vec<u8>] {
        &self.args
    }

    pub fn decorations(&self) -> &HashMap<String, Vec<u8>> {
        &self.decorations
    }

    pub fn is_init(&self) -> bool {
        self.is_init
    }

    /// Marks the input as the initialization call of a chaincode.
    pub fn set_init(&mut self, is_init: bool) {
        self.is_init = is_init;
    }
}

impl FromProto<protos::chaincode::ChaincodeInput> for ChaincodeInput {
    fn from_proto(
        mut input: protos::chaincode::ChaincodeInput,
    ) -> Result<Self, ProtoConversionError> {
        Ok(ChaincodeInput {
            args: input.take_args().into_vec(),
            decorations: input.take_decorations(),
            is_init: input.get_is_init(),
        })
    }
}

impl FromNative<ChaincodeInput> for protos::chaincode::ChaincodeInput {
    fn from_native(input: ChaincodeInput) -> Result<Self, ProtoConversionError> {
        let mut proto = protos::chaincode::ChaincodeInput::new();
        proto.set_args(RepeatedField::from_vec(input.args));
        proto.set_decorations(input.decorations);
        proto.set_is_init(input.is_init);
        Ok(proto)
    }
}

impl IntoProto<protos::chaincode::ChaincodeInput> for ChaincodeInput {}
impl IntoNative<ChaincodeInput> for protos::chaincode::ChaincodeInput {}

/// An event set by a chaincode during simulation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChaincodeEvent {
    chaincode_id: String,
    tx_id: String,
    event_name: String,
    payload: Vec<u8>,
}

impl ChaincodeEvent {
    pub fn new(chaincode_id: &str, tx_id: &str, event_name: &str, payload: Vec<u8>) -> Self {
        ChaincodeEvent {
            chaincode_id: chaincode_id.to_string(),
            tx_id: tx_id.to_string(),
            event_name: event_name.to_string(),
            payload,
        }
    }

    pub fn chaincode_id(&self) -> &str {
        &self.chaincode_id
    }

    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl FromProto<protos::chaincode::ChaincodeEvent> for ChaincodeEvent {
    fn from_proto(
        mut event: protos::chaincode::ChaincodeEvent,
    ) -> Result<Self, ProtoConversionError> {
        Ok(ChaincodeEvent {
            chaincode_id: event.take_chaincode_id(),
            tx_id: event.take_tx_id(),
            event_name: event.take_event_name(),
            payload: event.take_payload(),
        })
    }
}

impl FromNative<ChaincodeEvent> for protos::chaincode::ChaincodeEvent {
    fn from_native(event: ChaincodeEvent) -> Result<Self, ProtoConversionError> {
        let mut proto = protos::chaincode::ChaincodeEvent::new();
        proto.set_chaincode_id(event.chaincode_id);
        proto.set_tx_id(event.tx_id);
        proto.set_event_name(event.event_name);
        proto.set_payload(event.payload);
        Ok(proto)
    }
}

impl FromBytes<ChaincodeEvent> for ChaincodeEvent {
    fn from_bytes(bytes: &[u8]) -> Result<ChaincodeEvent, ProtoConversionError> {
        let proto: protos::chaincode::ChaincodeEvent =
            Message::parse_from_bytes(bytes).map_err(|_| {
                ProtoConversionError::DeserializationError(
                    "Unable to get ChaincodeEvent from bytes".to_string(),
                )
            })?;
        proto.into_native()
    }
}

impl IntoBytes for ChaincodeEvent {
    fn into_bytes(self) -> Result<Vec<u8>, ProtoConversionError> {
        let proto = self.into_proto()?;
        let bytes = proto.write_to_bytes().map_err(|_| {
            ProtoConversionError::SerializationError(
                "Unable to get bytes from ChaincodeEvent".to_string(),
            )
        })?;
        Ok(bytes)
    }
}

impl IntoProto<protos::chaincode::ChaincodeEvent> for ChaincodeEvent {}
impl IntoNative<ChaincodeEvent> for protos::chaincode::ChaincodeEvent {}

/// The deployment spec carried by legacy lifecycle deploy and upgrade invocations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChaincodeDeploymentSpec {
    chaincode_id: ChaincodeId,
    input: ChaincodeInput,
    code_package: Vec<u8>,
}

impl ChaincodeDeploymentSpec {
    pub fn new(chaincode_id: ChaincodeId, input: ChaincodeInput, code_package: Vec<u8>) -> Self {
        ChaincodeDeploymentSpec {
            chaincode_id,
            input,
            code_package,
        }
    }

    pub fn chaincode_id(&self) -> &ChaincodeId {
        &self.chaincode_id
    }

    pub fn input(&self) -> &ChaincodeInput {
        &self.input
    }

    pub fn code_package(&self) -> &[u8] {
        &self.code_package
    }
}

impl FromProto<protos::chaincode::ChaincodeDeploymentSpec> for ChaincodeDeploymentSpec {
    fn from_proto(
        mut cds: protos::chaincode::ChaincodeDeploymentSpec,
    ) -> Result<Self, ProtoConversionError> {
        let mut spec = cds.take_chaincode_spec();
        Ok(ChaincodeDeploymentSpec {
            chaincode_id: spec.take_chaincode_id().into_native()?,
            input: spec.take_input().into_native()?,
            code_package: cds.take_code_package(),
        })
    }
}

impl FromNative<ChaincodeDeploymentSpec> for protos::chaincode::ChaincodeDeploymentSpec {
    fn from_native(cds: ChaincodeDeploymentSpec) -> Result<Self, ProtoConversionError> {
        let mut spec = protos::chaincode::ChaincodeSpec::new();
        spec.set_chaincode_id(cds.chaincode_id.into_proto()?);
        spec.set_input(cds.input.into_proto()?);

        let mut proto = protos::chaincode::ChaincodeDeploymentSpec::new();
        proto.set_chaincode_spec(spec);
        proto.set_code_package(cds.code_package);
        Ok(proto)
    }
}

impl FromBytes<ChaincodeDeploymentSpec> for ChaincodeDeploymentSpec {
    fn from_bytes(bytes: &[u8]) -> Result<ChaincodeDeploymentSpec, ProtoConversionError> {
        let proto: protos::chaincode::ChaincodeDeploymentSpec = Message::parse_from_bytes(bytes)
            .map_err(|_| {
                ProtoConversionError::DeserializationError(
                    "Unable to get ChaincodeDeploymentSpec from bytes".to_string(),
                )
            })?;
        proto.into_native()
    }
}

impl IntoBytes for ChaincodeDeploymentSpec {
    fn into_bytes(self) -> Result<Vec<u8>, ProtoConversionError> {
        let proto = self.into_proto()?;
        let bytes = proto.write_to_bytes().map_err(|_| {
            ProtoConversionError::SerializationError(
                "Unable to get bytes from ChaincodeDeploymentSpec".to_string(),
            )
        })?;
        Ok(bytes)
    }
}

impl IntoProto<protos::chaincode::ChaincodeDeploymentSpec> for ChaincodeDeploymentSpec {}
impl IntoNative<ChaincodeDeploymentSpec> for protos::chaincode::ChaincodeDeploymentSpec {}
