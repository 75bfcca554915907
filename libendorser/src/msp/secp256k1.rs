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

//! An MSP whose identities are compressed secp256k1 public keys, verified with cylinder.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use cylinder::{secp256k1::Secp256k1Context, Context, PublicKey, Signature, Signer};

use crate::error::InternalError;
use crate::plugin::SigningIdentityFetcher;
use crate::protocol::identity::SerializedIdentity;
use crate::protocol::proposal::SignedProposal;
use crate::protos::{FromBytes, IntoBytes};

use super::{Identity, IdentityDeserializer, IdentityError, SigningIdentity};

const COMPRESSED_PUBLIC_KEY_SIZE: usize = 33;

/// Deserializes `SerializedIdentity` creators whose id bytes are compressed secp256k1 public
/// keys.
///
/// Any well formed key deserializes; an identity only validates when its MSP id is one of the
/// trusted ids this MSP was created with.
pub struct Secp256k1Msp {
    trusted_msp_ids: HashSet<String>,
}

impl Secp256k1Msp {
    pub fn new<I, S>(trusted_msp_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Secp256k1Msp {
            trusted_msp_ids: trusted_msp_ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl IdentityDeserializer for Secp256k1Msp {
    fn deserialize_identity(&self, serialized: &[u8]) -> Result<Box<dyn Identity>, IdentityError> {
        let identity = SerializedIdentity::from_bytes(serialized)
            .map_err(|err| IdentityError::DeserializationError(err.to_string()))?;

        let key = identity.id_bytes();
        if key.len() != COMPRESSED_PUBLIC_KEY_SIZE || (key[0] != 0x02 && key[0] != 0x03) {
            return Err(IdentityError::DeserializationError(format!(
                "id bytes of MSP {} are not a compressed secp256k1 public key",
                identity.msp_id()
            )));
        }

        Ok(Box::new(Secp256k1Identity {
            trusted: self.trusted_msp_ids.contains(identity.msp_id()),
            msp_id: identity.msp_id().to_string(),
            public_key: PublicKey::new(key.to_vec()),
        }))
    }
}

/// An identity produced by `Secp256k1Msp`.
pub struct Secp256k1Identity {
    msp_id: String,
    public_key: PublicKey,
    trusted: bool,
}

impl Identity for Secp256k1Identity {
    fn msp_id(&self) -> &str {
        &self.msp_id
    }

    fn validate(&self) -> Result<(), IdentityError> {
        if self.trusted {
            Ok(())
        } else {
            Err(IdentityError::InvalidIdentity(format!(
                "MSP {} is not trusted",
                self.msp_id
            )))
        }
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), IdentityError> {
        let verifier = Secp256k1Context::new().new_verifier();
        if verifier.verify(message, &Signature::new(signature.to_vec()), &self.public_key)? {
            Ok(())
        } else {
            Err(IdentityError::VerificationError(
                "the signature is invalid".to_string(),
            ))
        }
    }
}

/// The peer's own identity: a cylinder signer bound to an MSP id.
///
/// It serves as the `SigningIdentityFetcher` handed to endorsement plugins.
#[derive(Clone)]
pub struct LocalSigningIdentity {
    msp_id: String,
    signer: Arc<Mutex<Box<dyn Signer>>>,
}

impl LocalSigningIdentity {
    pub fn new(msp_id: &str, signer: Box<dyn Signer>) -> Self {
        LocalSigningIdentity {
            msp_id: msp_id.to_string(),
            signer: Arc::new(Mutex::new(signer)),
        }
    }

    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }
}

impl SigningIdentity for LocalSigningIdentity {
    fn serialize(&self) -> Result<Vec<u8>, IdentityError> {
        let public_key = self
            .signer
            .lock()
            .map_err(|_| IdentityError::SigningError("signer lock was poisoned".to_string()))?
            .public_key()?;
        SerializedIdentity::new(self.msp_id.clone(), public_key.as_slice().to_vec())
            .into_bytes()
            .map_err(|err| IdentityError::SigningError(err.to_string()))
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, IdentityError> {
        let signature = self
            .signer
            .lock()
            .map_err(|_| IdentityError::SigningError("signer lock was poisoned".to_string()))?
            .sign(message)?;
        Ok(signature.as_slice().to_vec())
    }
}

impl SigningIdentityFetcher for LocalSigningIdentity {
    fn signing_identity_for_request(
        &self,
        _signed_proposal: &SignedProposal,
    ) -> Result<Arc<dyn SigningIdentity>, InternalError> {
        Ok(Arc::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_identity(msp_id: &str) -> LocalSigningIdentity {
        let context = Secp256k1Context::new();
        let key = context.new_random_private_key();
        LocalSigningIdentity::new(msp_id, context.new_signer(key))
    }

    /// Tests that a signature made by the local identity verifies against its deserialized form,
    /// and that a trusted MSP id validates.
    #[test]
    fn sign_and_verify() {
        let local = new_identity("msp-id");
        let msp = Secp256k1Msp::new(vec!["msp-id"]);

        let serialized = local.serialize().expect("unable to serialize");
        let identity = msp
            .deserialize_identity(&serialized)
            .expect("unable to deserialize");
        let signature = local.sign(b"message").expect("unable to sign");

        assert_eq!("msp-id", identity.msp_id());
        assert!(identity.validate().is_ok());
        assert!(identity.verify(b"message", &signature).is_ok());
        assert!(identity.verify(b"other message", &signature).is_err());
    }

    /// Tests that an identity from an untrusted MSP deserializes but does not validate.
    #[test]
    fn untrusted_msp() {
        let local = new_identity("other-msp");
        let msp = Secp256k1Msp::new(vec!["msp-id"]);

        let identity = msp
            .deserialize_identity(&local.serialize().expect("unable to serialize"))
            .expect("unable to deserialize");
        assert!(identity.validate().is_err());
    }

    /// Tests that id bytes which are not a compressed public key are rejected.
    #[test]
    fn malformed_key() {
        let msp = Secp256k1Msp::new(vec!["msp-id"]);
        let serialized = SerializedIdentity::new("msp-id".into(), vec![0x04; 65])
            .into_bytes()
            .expect("unable to serialize");

        match msp.deserialize_identity(&serialized) {
            Err(IdentityError::DeserializationError(_)) => (),
            Err(err) => panic!("unexpected error {}", err),
            Ok(_) => panic!("malformed key was accepted"),
        }
    }

    /// Tests that a garbage signature fails verification instead of panicking.
    #[test]
    fn garbage_signature() {
        let local = new_identity("msp-id");
        let msp = Secp256k1Msp::new(vec!["msp-id"]);
        let identity = msp
            .deserialize_identity(&local.serialize().expect("unable to serialize"))
            .expect("unable to deserialize");

        assert!(identity.verify(b"message", b"not a signature").is_err());
    }
}
