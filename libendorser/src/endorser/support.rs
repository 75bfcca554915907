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

//! The collaborators the endorser delegates to.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::error::InternalError;
use crate::ledger::{HistoryQueryExecutor, ProcessedTransaction, QueryCreator, TxSimulator};
use crate::msp::IdentityDeserializer;
use crate::protocol::chaincode::{ChaincodeEvent, ChaincodeInput};
use crate::protocol::proposal::SignedProposal;
use crate::protocol::response::{Endorsement, Response};
use crate::protos::collection::CollectionConfigPackage;
use crate::protos::rwset::TxPvtReadWriteSetWithConfigInfo;

use super::plugin_endorser::PluginEndorserError;
use super::request::RequestContext;

/// The chaincode definition facts the endorser needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChaincodeEndorsementInfo {
    pub version: String,
    /// The name of the endorsement plugin that signs this chaincode's results.
    pub endorsement_plugin: String,
}

/// Everything a chaincode execution is given about the transaction it runs in.
///
/// The simulator and history executor are only present for channel proposals to chaincodes that
/// read the ledger.
pub struct TransactionParams<'a> {
    pub channel_id: &'a str,
    pub tx_id: &'a str,
    pub signed_proposal: &'a SignedProposal,
    pub transient_map: &'a HashMap<String, Vec<u8>>,
    pub tx_simulator: Option<&'a dyn TxSimulator>,
    pub history_query_executor: Option<&'a dyn HistoryQueryExecutor>,
}

/// Ledger and chaincode access.
pub trait Support: Send + Sync {
    /// Returns true for the built-in system chaincodes, which bypass the proposal ACL.
    fn is_sys_cc(&self, name: &str) -> bool;

    /// Looks up a committed transaction; `Ok(None)` means the id is unused.
    fn get_transaction_by_id(
        &self,
        channel_id: &str,
        tx_id: &str,
    ) -> Result<Option<ProcessedTransaction>, InternalError>;

    fn get_tx_simulator(
        &self,
        ctx: &RequestContext,
        channel_id: &str,
        tx_id: &str,
    ) -> Result<Box<dyn TxSimulator>, InternalError>;

    fn get_history_query_executor(
        &self,
        channel_id: &str,
    ) -> Result<Box<dyn HistoryQueryExecutor>, InternalError>;

    fn get_ledger_height(&self, channel_id: &str) -> Result<u64, InternalError>;

    fn chaincode_endorsement_info(
        &self,
        channel_id: &str,
        chaincode_name: &str,
        tx_simulator: Option<&dyn TxSimulator>,
    ) -> Result<ChaincodeEndorsementInfo, InternalError>;

    /// Returns the collection configs of a deployed chaincode, or `None` if it defines none.
    fn all_collections_config_pkg(
        &self,
        channel_id: &str,
        chaincode_name: &str,
        tx_simulator: &dyn TxSimulator,
    ) -> Result<Option<CollectionConfigPackage>, InternalError>;

    /// Runs the chaincode, returning its response and the event it set, if any.
    fn execute(
        &self,
        ctx: &RequestContext,
        params: &TransactionParams,
        chaincode_name: &str,
        input: &ChaincodeInput,
    ) -> Result<(Response, Option<ChaincodeEvent>), InternalError>;

    /// Runs the init function of a chaincode deployed through the legacy lifecycle.
    fn execute_legacy_init(
        &self,
        ctx: &RequestContext,
        params: &TransactionParams,
        chaincode_name: &str,
        version: &str,
        input: &ChaincodeInput,
    ) -> Result<(Response, Option<ChaincodeEvent>), InternalError>;
}

/// Errors returned by an `AclProvider`.
#[derive(Debug)]
pub enum AclError {
    /// The creator does not satisfy the resource's policy.
    AccessDenied(String),
    InternalError(InternalError),
}

impl Error for AclError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AclError::AccessDenied(_) => None,
            AclError::InternalError(err) => Some(err),
        }
    }
}

impl fmt::Display for AclError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AclError::AccessDenied(msg) => f.write_str(msg),
            AclError::InternalError(err) => write!(f, "{}", err),
        }
    }
}

pub trait AclProvider: Send + Sync {
    fn check_acl(
        &self,
        resource: &str,
        channel_id: &str,
        signed_proposal: &SignedProposal,
    ) -> Result<(), AclError>;
}

/// Disseminates private simulation results to the peers entitled to them.
pub trait PrivateDataDistributor: Send + Sync {
    fn distribute_private_data(
        &self,
        channel_id: &str,
        tx_id: &str,
        private_data: &TxPvtReadWriteSetWithConfigInfo,
        block_height: u64,
    ) -> Result<(), InternalError>;
}

/// The per-channel resources of a peer.
#[derive(Clone)]
pub struct Channel {
    pub identity_deserializer: Arc<dyn IdentityDeserializer>,
}

pub trait ChannelFetcher: Send + Sync {
    /// Returns the channel, or `None` if this peer has not joined it.
    fn channel(&self, channel_id: &str) -> Option<Channel>;
}

/// Endorses proposal response payloads with a named plugin.
pub trait PluginEndorsement: Send + Sync {
    fn endorse_with_plugin(
        &self,
        plugin_name: &str,
        channel_id: &str,
        prp_bytes: &[u8],
        signed_proposal: &SignedProposal,
    ) -> Result<(Endorsement, Vec<u8>), PluginEndorserError>;
}

/// Opens ledger views on a channel, for the state handed to plugins.
pub trait ChannelStateRetriever: Send + Sync {
    fn new_query_creator(&self, channel_id: &str) -> Result<Arc<dyn QueryCreator>, InternalError>;
}

/// Calls `done` on the wrapped simulator when dropped.
pub(super) struct SimulatorGuard {
    inner: Box<dyn TxSimulator>,
}

impl SimulatorGuard {
    pub fn new(inner: Box<dyn TxSimulator>) -> Self {
        SimulatorGuard { inner }
    }

    pub fn simulator(&self) -> &dyn TxSimulator {
        &*self.inner
    }
}

impl Drop for SimulatorGuard {
    fn drop(&mut self) {
        self.inner.done();
    }
}
