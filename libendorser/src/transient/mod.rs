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

//! The transient store: node local storage for private simulation results awaiting
//! dissemination or purge.

pub mod memory;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::InternalError;
use crate::protos::rwset::TxPvtReadWriteSetWithConfigInfo;

/// Private simulation results as stored by an endorsing peer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EndorserPvtSimulationResults {
    pub received_at_block_height: u64,
    pub pvt_simulation_results_with_config: Option<TxPvtReadWriteSetWithConfigInfo>,
}

/// Restricts a scan to the listed collections of the listed namespaces.
pub type PvtNsCollFilter = HashMap<String, HashSet<String>>;

/// An iterator over private simulation results.
///
/// `close` releases the scan; callers must call it on every path, which `ScopedScanner` does.
pub trait RwsetScanner: Send {
    /// Returns the next result, or `None` once the scan is exhausted.
    fn next(&mut self) -> Result<Option<EndorserPvtSimulationResults>, InternalError>;

    fn close(&mut self);
}

pub trait TransientStore: Send + Sync {
    /// Opens a scan over the private results stored for `tx_id`.
    fn get_tx_pvt_rwset_by_txid(
        &self,
        tx_id: &str,
        filter: Option<&PvtNsCollFilter>,
    ) -> Result<Box<dyn RwsetScanner>, InternalError>;
}

/// Resolves the transient store of a channel.
pub trait TransientStoreRetriever: Send + Sync {
    fn store_for_channel(&self, channel_id: &str) -> Option<Arc<dyn TransientStore>>;
}

/// Closes the wrapped scanner when dropped.
pub struct ScopedScanner {
    inner: Box<dyn RwsetScanner>,
}

impl ScopedScanner {
    pub fn new(inner: Box<dyn RwsetScanner>) -> Self {
        ScopedScanner { inner }
    }

    pub fn next(&mut self) -> Result<Option<EndorserPvtSimulationResults>, InternalError> {
        self.inner.next()
    }
}

impl Drop for ScopedScanner {
    fn drop(&mut self) {
        self.inner.close();
    }
}
