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

//! The identity of a proposal creator or endorser, as carried on the wire.

use protobuf::Message;

use crate::protos::{
    self, FromBytes, FromNative, FromProto, IntoBytes, IntoNative, IntoProto, ProtoConversionError,
};

/// An identity qualified by the MSP that issued it.
///
/// The `id_bytes` are interpreted by the MSP named by `msp_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedIdentity {
    msp_id: String,
    id_bytes: Vec<u8>,
}

impl SerializedIdentity {
    pub fn new(msp_id: String, id_bytes: Vec<u8>) -> Self {
        SerializedIdentity { msp_id, id_bytes }
    }

    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    pub fn id_bytes(&self) -> &[u8] {
        &self.id_bytes
    }
}

impl FromProto<protos::identities::SerializedIdentity> for SerializedIdentity {
    fn from_proto(
        mut identity: protos::identities::SerializedIdentity,
    ) -> Result<Self, ProtoConversionError> {
        Ok(SerializedIdentity {
            msp_id: identity.take_mspid(),
            id_bytes: identity.take_id_bytes(),
        })
    }
}

impl FromNative<SerializedIdentity> for protos::identities::SerializedIdentity {
    fn from_native(identity: SerializedIdentity) -> Result<Self, ProtoConversionError> {
        let mut proto = protos::identities::SerializedIdentity::new();
        proto.set_mspid(identity.msp_id);
        proto.set_id_bytes(identity.id_bytes);
        Ok(proto)
    }
}

impl FromBytes<SerializedIdentity> for SerializedIdentity {
    fn from_bytes(bytes: &[u8]) -> Result<SerializedIdentity, ProtoConversionError> {
        let proto: protos::identities::SerializedIdentity =
            Message::parse_from_bytes(bytes).map_err(|_| {
                ProtoConversionError::DeserializationError(
                    "Unable to get SerializedIdentity from bytes".to_string(),
                )
            })?;
        proto.into_native()
    }
}

impl IntoBytes for SerializedIdentity {
    fn into_bytes(self) -> Result<Vec<u8>, ProtoConversionError> {
        let proto = self.into_proto()?;
        let bytes = proto.write_to_bytes().map_err(|_| {
            ProtoConversionError::SerializationError(
                "Unable to get bytes from SerializedIdentity".to_string(),
            )
        })?;
        Ok(bytes)
    }
}

impl IntoProto<protos::identities::SerializedIdentity> for SerializedIdentity {}
impl IntoNative<SerializedIdentity> for protos::identities::SerializedIdentity {}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that an identity survives conversion to bytes and back.
    #[test]
    fn serialized_identity_bytes() {
        let identity = SerializedIdentity::new("msp-id".into(), vec![2, 3, 4]);
        let bytes = identity.clone().into_bytes().expect("unable to serialize");
        let parsed = SerializedIdentity::from_bytes(&bytes).expect("unable to parse");
        assert_eq!(identity, parsed);
        assert_eq!("msp-id", parsed.msp_id());
    }

    /// Tests that garbage does not parse as an identity.
    #[test]
    fn serialized_identity_from_garbage() {
        assert!(SerializedIdentity::from_bytes(&[0xff, 0xff, 0xff]).is_err());
    }
}
