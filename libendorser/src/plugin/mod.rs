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

//! Endorsement plugins.
//!
//! A plugin decides how a simulated proposal is endorsed: it receives the serialized
//! `ProposalResponsePayload` and returns an `Endorsement` together with the payload the client
//! should see. Plugins are registered by name through a `PluginMapper` and instantiated once per
//! channel by the `PluginEndorser`.

#[cfg(feature = "builtin-plugins")]
pub mod builtin;
mod error;
mod registry;

use std::sync::Arc;

use crate::error::InternalError;
use crate::msp::SigningIdentity;
use crate::protocol::proposal::SignedProposal;
use crate::protocol::response::Endorsement;
use crate::protos::rwset::TxPvtReadWriteSet;

pub use self::error::PluginError;
pub use self::registry::{PluginRegistry, PluginRegistryBuildError, PluginRegistryBuilder};

/// A collaborator a plugin is given when it is initialized.
#[derive(Clone)]
pub enum Dependency {
    SigningIdentityFetcher(Arc<dyn SigningIdentityFetcher>),
    StateFetcher(Arc<dyn StateFetcher>),
}

pub trait Plugin: Send + Sync {
    /// Initializes the plugin with its dependencies. Called once, before any `endorse` call.
    fn init(&mut self, dependencies: &[Dependency]) -> Result<(), PluginError>;

    /// Endorses the given proposal response payload.
    ///
    /// Returns the endorsement and the (possibly modified) payload bytes. May be called
    /// concurrently.
    fn endorse(
        &self,
        payload: &[u8],
        signed_proposal: &SignedProposal,
    ) -> Result<(Endorsement, Vec<u8>), PluginError>;
}

pub trait PluginFactory: Send + Sync {
    fn new_plugin(&self) -> Box<dyn Plugin>;
}

/// Resolves plugin factories by plugin name.
pub trait PluginMapper: Send + Sync {
    fn plugin_factory_by_name(&self, name: &str) -> Option<Arc<dyn PluginFactory>>;
}

/// A view of channel state handed to plugins: ledger reads plus the channel's transient data.
///
/// `done` must be called once the state is no longer needed.
pub trait State: Send {
    fn get_state_multiple_keys(
        &self,
        namespace: &str,
        keys: &[&str],
    ) -> Result<Vec<Option<Vec<u8>>>, InternalError>;

    fn get_private_data_multiple_keys(
        &self,
        namespace: &str,
        collection: &str,
        keys: &[&str],
    ) -> Result<Vec<Option<Vec<u8>>>, InternalError>;

    /// Returns the private write sets the transient store holds for `tx_id`.
    fn get_transient_by_txid(&self, tx_id: &str) -> Result<Vec<TxPvtReadWriteSet>, InternalError>;

    fn done(&self);
}

pub trait StateFetcher: Send + Sync {
    fn fetch_state(&self) -> Result<Box<dyn State>, InternalError>;
}

/// Resolves the identity a plugin signs with for a given proposal.
pub trait SigningIdentityFetcher: Send + Sync {
    fn signing_identity_for_request(
        &self,
        signed_proposal: &SignedProposal,
    ) -> Result<Arc<dyn SigningIdentity>, InternalError>;
}
