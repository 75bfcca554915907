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

//! Dispatches endorsements to plugins, instantiating each plugin once per channel.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;

use crate::error::InternalError;
use crate::plugin::{Dependency, Plugin, PluginError, PluginMapper, SigningIdentityFetcher};
use crate::protocol::proposal::SignedProposal;
use crate::protocol::response::Endorsement;
use crate::transient::TransientStoreRetriever;

use super::state::ChannelState;
use super::support::{ChannelStateRetriever, PluginEndorsement};

/// Plugin instances are cached per plugin name and channel. The empty channel is the
/// channel-less context and has entries of its own.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct PluginKey {
    plugin_name: String,
    channel_id: String,
}

type PluginSlot = Arc<OnceCell<Arc<dyn Plugin>>>;

#[derive(Debug)]
pub enum PluginEndorserError {
    /// The plugin could not be found, created or initialized.
    PluginUnusable { plugin_name: String, cause: String },
    /// The plugin was available but failed to endorse.
    EndorsementFailed(PluginError),
}

impl Error for PluginEndorserError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PluginEndorserError::PluginUnusable { .. } => None,
            PluginEndorserError::EndorsementFailed(err) => Some(err),
        }
    }
}

impl fmt::Display for PluginEndorserError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PluginEndorserError::PluginUnusable { plugin_name, cause } => write!(
                f,
                "plugin with name {} could not be used: {}",
                plugin_name, cause
            ),
            PluginEndorserError::EndorsementFailed(err) => write!(f, "{}", err),
        }
    }
}

/// Endorses with named plugins, creating and initializing each (plugin, channel) instance on
/// first use.
///
/// Creation of an instance is serialized per key only: callers for other keys proceed, and
/// `endorse` runs with no lock held.
pub struct PluginEndorser {
    plugin_mapper: Arc<dyn PluginMapper>,
    channel_state_retriever: Arc<dyn ChannelStateRetriever>,
    signing_identity_fetcher: Arc<dyn SigningIdentityFetcher>,
    transient_store_retriever: Arc<dyn TransientStoreRetriever>,
    plugins: Mutex<HashMap<PluginKey, PluginSlot>>,
}

impl PluginEndorser {
    fn get_or_create_plugin(
        &self,
        plugin_name: &str,
        channel_id: &str,
    ) -> Result<Arc<dyn Plugin>, String> {
        let factory = self
            .plugin_mapper
            .plugin_factory_by_name(plugin_name)
            .ok_or_else(|| format!("plugin with name {} wasn't found", plugin_name))?;

        let key = PluginKey {
            plugin_name: plugin_name.to_string(),
            channel_id: channel_id.to_string(),
        };
        let slot = {
            let mut plugins = self
                .plugins
                .lock()
                .map_err(|_| "plugin cache lock was poisoned".to_string())?;
            plugins.entry(key).or_default().clone()
        };

        slot.get_or_try_init(|| {
            debug!(
                "creating plugin {} for channel [{}]",
                plugin_name, channel_id
            );
            let mut plugin = factory.new_plugin();
            let dependencies = self.dependencies(channel_id)?;
            plugin
                .init(&dependencies)
                .map_err(|err| err.to_string())?;
            Ok(Arc::from(plugin))
        })
        .map(Arc::clone)
    }

    fn dependencies(&self, channel_id: &str) -> Result<Vec<Dependency>, String> {
        let mut dependencies = Vec::with_capacity(2);

        if !channel_id.is_empty() {
            let query_creator = self
                .channel_state_retriever
                .new_query_creator(channel_id)
                .map_err(|err| format!("failed obtaining channel state: {}", err))?;
            let store = self
                .transient_store_retriever
                .store_for_channel(channel_id)
                .ok_or_else(|| {
                    format!(
                        "transient store for channel {} was not initialized",
                        channel_id
                    )
                })?;
            dependencies.push(Dependency::StateFetcher(Arc::new(ChannelState::new(
                query_creator,
                store,
            ))));
        }

        dependencies.push(Dependency::SigningIdentityFetcher(
            self.signing_identity_fetcher.clone(),
        ));
        Ok(dependencies)
    }
}

impl PluginEndorsement for PluginEndorser {
    fn endorse_with_plugin(
        &self,
        plugin_name: &str,
        channel_id: &str,
        prp_bytes: &[u8],
        signed_proposal: &SignedProposal,
    ) -> Result<(Endorsement, Vec<u8>), PluginEndorserError> {
        let plugin = self
            .get_or_create_plugin(plugin_name, channel_id)
            .map_err(|cause| {
                warn!(
                    "Endorsement with plugin {} for channel [{}] failed: {}",
                    plugin_name, channel_id, cause
                );
                PluginEndorserError::PluginUnusable {
                    plugin_name: plugin_name.to_string(),
                    cause,
                }
            })?;

        plugin
            .endorse(prp_bytes, signed_proposal)
            .map_err(PluginEndorserError::EndorsementFailed)
    }
}

#[derive(Debug)]
pub enum PluginEndorserBuildError {
    MissingField(String),
}

impl Error for PluginEndorserBuildError {}

impl fmt::Display for PluginEndorserBuildError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PluginEndorserBuildError::MissingField(s) => write!(f, "MissingField: {}", s),
        }
    }
}

impl From<PluginEndorserBuildError> for InternalError {
    fn from(err: PluginEndorserBuildError) -> Self {
        InternalError::from_source(Box::new(err))
    }
}

#[derive(Default)]
pub struct PluginEndorserBuilder {
    plugin_mapper: Option<Arc<dyn PluginMapper>>,
    channel_state_retriever: Option<Arc<dyn ChannelStateRetriever>>,
    signing_identity_fetcher: Option<Arc<dyn SigningIdentityFetcher>>,
    transient_store_retriever: Option<Arc<dyn TransientStoreRetriever>>,
}

impl PluginEndorserBuilder {
    pub fn new() -> Self {
        PluginEndorserBuilder::default()
    }

    pub fn with_plugin_mapper(mut self, plugin_mapper: Arc<dyn PluginMapper>) -> Self {
        self.plugin_mapper = Some(plugin_mapper);
        self
    }

    pub fn with_channel_state_retriever(
        mut self,
        channel_state_retriever: Arc<dyn ChannelStateRetriever>,
    ) -> Self {
        self.channel_state_retriever = Some(channel_state_retriever);
        self
    }

    pub fn with_signing_identity_fetcher(
        mut self,
        signing_identity_fetcher: Arc<dyn SigningIdentityFetcher>,
    ) -> Self {
        self.signing_identity_fetcher = Some(signing_identity_fetcher);
        self
    }

    pub fn with_transient_store_retriever(
        mut self,
        transient_store_retriever: Arc<dyn TransientStoreRetriever>,
    ) -> Self {
        self.transient_store_retriever = Some(transient_store_retriever);
        self
    }

    pub fn build(self) -> Result<PluginEndorser, PluginEndorserBuildError> {
        let plugin_mapper = self.plugin_mapper.ok_or_else(|| {
            PluginEndorserBuildError::MissingField("'plugin_mapper' field is required".to_string())
        })?;
        let channel_state_retriever = self.channel_state_retriever.ok_or_else(|| {
            PluginEndorserBuildError::MissingField(
                "'channel_state_retriever' field is required".to_string(),
            )
        })?;
        let signing_identity_fetcher = self.signing_identity_fetcher.ok_or_else(|| {
            PluginEndorserBuildError::MissingField(
                "'signing_identity_fetcher' field is required".to_string(),
            )
        })?;
        let transient_store_retriever = self.transient_store_retriever.ok_or_else(|| {
            PluginEndorserBuildError::MissingField(
                "'transient_store_retriever' field is required".to_string(),
            )
        })?;

        Ok(PluginEndorser {
            plugin_mapper,
            channel_state_retriever,
            signing_identity_fetcher,
            transient_store_retriever,
            plugins: Mutex::new(HashMap::new()),
        })
    }
}
