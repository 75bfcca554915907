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

//! The default endorsement plugin.
//!
//! It signs the proposal response payload concatenated with the peer's serialized identity and
//! returns the payload unchanged.

use std::sync::Arc;

use crate::protocol::proposal::SignedProposal;
use crate::protocol::response::Endorsement;

use super::{Dependency, Plugin, PluginError, PluginFactory, SigningIdentityFetcher};

/// The name the default plugin is registered under.
pub const DEFAULT_ENDORSEMENT_PLUGIN: &str = "escc";

#[derive(Default)]
pub struct DefaultEndorsement {
    signing_identity_fetcher: Option<Arc<dyn SigningIdentityFetcher>>,
}

impl Plugin for DefaultEndorsement {
    fn init(&mut self, dependencies: &[Dependency]) -> Result<(), PluginError> {
        let fetcher = dependencies
            .iter()
            .find_map(|dep| match dep {
                Dependency::SigningIdentityFetcher(fetcher) => Some(fetcher.clone()),
                _ => None,
            })
            .ok_or_else(|| {
                PluginError::InitializationError(
                    "could not find SigningIdentityFetcher in dependencies".to_string(),
                )
            })?;
        self.signing_identity_fetcher = Some(fetcher);
        Ok(())
    }

    fn endorse(
        &self,
        payload: &[u8],
        signed_proposal: &SignedProposal,
    ) -> Result<(Endorsement, Vec<u8>), PluginError> {
        let fetcher = self.signing_identity_fetcher.as_ref().ok_or_else(|| {
            PluginError::EndorsementError("plugin has not been initialized".to_string())
        })?;

        let signer = fetcher
            .signing_identity_for_request(signed_proposal)
            .map_err(|err| {
                PluginError::EndorsementError(format!("failed fetching signing identity: {}", err))
            })?;

        let identity_bytes = signer.serialize().map_err(|err| {
            PluginError::EndorsementError(format!(
                "could not serialize the signing identity: {}",
                err
            ))
        })?;

        let mut message = payload.to_vec();
        message.extend_from_slice(&identity_bytes);
        let signature = signer.sign(&message).map_err(|err| {
            PluginError::EndorsementError(format!(
                "could not sign the proposal response payload: {}",
                err
            ))
        })?;

        Ok((Endorsement::new(identity_bytes, signature), payload.to_vec()))
    }
}

pub struct DefaultEndorsementFactory;

impl PluginFactory for DefaultEndorsementFactory {
    fn new_plugin(&self) -> Box<dyn Plugin> {
        Box::new(DefaultEndorsement::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use cylinder::{secp256k1::Secp256k1Context, Context};

    use crate::msp::{IdentityDeserializer, LocalSigningIdentity, Secp256k1Msp};

    fn local_identity() -> LocalSigningIdentity {
        let context = Secp256k1Context::new();
        let key = context.new_random_private_key();
        LocalSigningIdentity::new("msp-id", context.new_signer(key))
    }

    /// Tests that the endorsement signs the payload followed by the endorser identity and that
    /// the payload is returned unchanged.
    #[test]
    fn endorse_signs_payload_and_identity() {
        let identity = local_identity();
        let mut plugin = DefaultEndorsementFactory.new_plugin();
        plugin
            .init(&[Dependency::SigningIdentityFetcher(Arc::new(
                identity.clone(),
            ))])
            .expect("unable to init plugin");

        let (endorsement, payload) = plugin
            .endorse(b"payload", &SignedProposal::default())
            .expect("unable to endorse");

        assert_eq!(b"payload".to_vec(), payload);

        let msp = Secp256k1Msp::new(vec!["msp-id"]);
        let endorser = msp
            .deserialize_identity(endorsement.endorser())
            .expect("unable to deserialize endorser");
        let mut message = b"payload".to_vec();
        message.extend_from_slice(endorsement.endorser());
        assert!(endorser.verify(&message, endorsement.signature()).is_ok());
        assert!(endorser.verify(b"payload", endorsement.signature()).is_err());
    }

    /// Tests that init fails without a signing identity fetcher.
    #[test]
    fn init_without_signing_identity_fetcher() {
        let mut plugin = DefaultEndorsement::default();
        match plugin.init(&[]) {
            Err(err) => assert_eq!(
                "could not find SigningIdentityFetcher in dependencies",
                err.to_string()
            ),
            Ok(()) => panic!("init should have failed"),
        }
    }

    /// Tests that an uninitialized plugin refuses to endorse.
    #[test]
    fn endorse_before_init() {
        let plugin = DefaultEndorsement::default();
        assert!(plugin
            .endorse(b"payload", &SignedProposal::default())
            .is_err());
    }
}
