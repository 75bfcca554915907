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

//! Membership service provider abstractions.
//!
//! An MSP turns the serialized creator of a proposal into an `Identity` that can be validated
//! and used to verify signatures. The endorser resolves a channel's MSP for channel proposals
//! and the peer's local MSP otherwise.

mod error;
mod secp256k1;

use std::sync::Arc;

pub use self::error::IdentityError;
pub use self::secp256k1::{LocalSigningIdentity, Secp256k1Identity, Secp256k1Msp};

/// A deserialized participant identity.
pub trait Identity: Send {
    /// The id of the MSP that issued this identity.
    fn msp_id(&self) -> &str;

    /// Checks that the identity is valid under its MSP.
    fn validate(&self) -> Result<(), IdentityError>;

    /// Verifies `signature` as this identity's signature over `message`.
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), IdentityError>;
}

/// Deserializes the wire form of an identity.
pub trait IdentityDeserializer: Send + Sync {
    fn deserialize_identity(&self, serialized: &[u8]) -> Result<Box<dyn Identity>, IdentityError>;
}

/// An identity able to produce signatures, such as the peer's own.
pub trait SigningIdentity: Send + Sync {
    /// The serialized form of the identity, as it appears in an endorsement.
    fn serialize(&self) -> Result<Vec<u8>, IdentityError>;

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, IdentityError>;
}

impl<T: IdentityDeserializer + ?Sized> IdentityDeserializer for Arc<T> {
    fn deserialize_identity(&self, serialized: &[u8]) -> Result<Box<dyn Identity>, IdentityError> {
        (**self).deserialize_identity(serialized)
    }
}
