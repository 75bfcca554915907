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

//! An in-memory transient store.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use protobuf::RepeatedField;

use crate::error::InternalError;
use crate::protos::rwset::{TxPvtReadWriteSet, TxPvtReadWriteSetWithConfigInfo};

use super::{
    EndorserPvtSimulationResults, PvtNsCollFilter, RwsetScanner, TransientStore,
    TransientStoreRetriever,
};

/// Entries are ordered by transaction id, then by the height they were received at, then by
/// insertion order.
type EntryKey = (String, u64, u64);

#[derive(Default)]
struct Entries {
    next_seq: u64,
    map: BTreeMap<EntryKey, TxPvtReadWriteSetWithConfigInfo>,
}

/// Keeps the private simulation results of a single channel in memory.
#[derive(Default, Clone)]
pub struct MemoryTransientStore {
    entries: Arc<Mutex<Entries>>,
}

impl MemoryTransientStore {
    pub fn new() -> Self {
        MemoryTransientStore::default()
    }

    /// Stores the private results of `tx_id`, received when the ledger was at `block_height`.
    pub fn persist(
        &self,
        tx_id: &str,
        block_height: u64,
        pvt_rwset: TxPvtReadWriteSetWithConfigInfo,
    ) -> Result<(), InternalError> {
        let mut entries = self.lock()?;
        let seq = entries.next_seq;
        entries.next_seq += 1;
        entries
            .map
            .insert((tx_id.to_string(), block_height, seq), pvt_rwset);
        Ok(())
    }

    /// Removes every entry of the given transactions.
    pub fn purge_by_txids(&self, tx_ids: &[&str]) -> Result<(), InternalError> {
        let mut entries = self.lock()?;
        entries
            .map
            .retain(|(tx_id, _, _), _| !tx_ids.contains(&tx_id.as_str()));
        Ok(())
    }

    /// Removes every entry received below `max_block_num_to_retain`.
    pub fn purge_below_height(&self, max_block_num_to_retain: u64) -> Result<(), InternalError> {
        let mut entries = self.lock()?;
        entries
            .map
            .retain(|(_, height, _), _| *height >= max_block_num_to_retain);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Entries>, InternalError> {
        self.entries.lock().map_err(|_| {
            InternalError::with_message("transient store lock was poisoned".to_string())
        })
    }
}

impl TransientStore for MemoryTransientStore {
    fn get_tx_pvt_rwset_by_txid(
        &self,
        tx_id: &str,
        filter: Option<&PvtNsCollFilter>,
    ) -> Result<Box<dyn RwsetScanner>, InternalError> {
        let entries = self.lock()?;
        let results = entries
            .map
            .range((tx_id.to_string(), 0, 0)..)
            .take_while(|((id, _, _), _)| id == tx_id)
            .map(|((_, height, _), pvt_rwset)| {
                let mut pvt_rwset = pvt_rwset.clone();
                if let Some(filter) = filter {
                    trim_pvt_rwset(&mut pvt_rwset, filter);
                }
                EndorserPvtSimulationResults {
                    received_at_block_height: *height,
                    pvt_simulation_results_with_config: Some(pvt_rwset),
                }
            })
            .collect();

        Ok(Box::new(MemoryRwsetScanner {
            results,
            closed: false,
        }))
    }
}

/// Drops the namespaces and collections, and their configs, not selected by `filter`.
fn trim_pvt_rwset(pvt_rwset: &mut TxPvtReadWriteSetWithConfigInfo, filter: &PvtNsCollFilter) {
    let data_model = pvt_rwset.get_pvt_rwset().get_data_model();
    let ns_pvt_rwsets = pvt_rwset
        .take_pvt_rwset()
        .take_ns_pvt_rwset()
        .into_iter()
        .filter_map(|mut ns| {
            let collections = filter.get(ns.get_namespace())?;
            let colls = ns
                .take_collection_pvt_rwset()
                .into_iter()
                .filter(|coll| collections.contains(coll.get_collection_name()))
                .collect::<Vec<_>>();
            if colls.is_empty() {
                return None;
            }
            ns.set_collection_pvt_rwset(RepeatedField::from_vec(colls));
            Some(ns)
        })
        .collect::<Vec<_>>();

    let mut trimmed = TxPvtReadWriteSet::new();
    trimmed.set_data_model(data_model);
    trimmed.set_ns_pvt_rwset(RepeatedField::from_vec(ns_pvt_rwsets));
    pvt_rwset.set_pvt_rwset(trimmed);
    pvt_rwset
        .mut_collection_configs()
        .retain(|ns, _| filter.contains_key(ns));
}

struct MemoryRwsetScanner {
    results: VecDeque<EndorserPvtSimulationResults>,
    closed: bool,
}

impl RwsetScanner for MemoryRwsetScanner {
    fn next(&mut self) -> Result<Option<EndorserPvtSimulationResults>, InternalError> {
        if self.closed {
            return Err(InternalError::with_message(
                "scanner has been closed".to_string(),
            ));
        }
        Ok(self.results.pop_front())
    }

    fn close(&mut self) {
        self.closed = true;
        self.results.clear();
    }
}

/// Opens and hands out the transient store of each channel.
#[derive(Default)]
pub struct MemoryTransientStoreProvider {
    stores: Mutex<HashMap<String, MemoryTransientStore>>,
}

impl MemoryTransientStoreProvider {
    pub fn new() -> Self {
        MemoryTransientStoreProvider::default()
    }

    /// Returns the store of `channel_id`, creating it on first use.
    pub fn open_store(&self, channel_id: &str) -> Result<MemoryTransientStore, InternalError> {
        let mut stores = self.stores.lock().map_err(|_| {
            InternalError::with_message("transient store provider lock was poisoned".to_string())
        })?;
        Ok(stores
            .entry(channel_id.to_string())
            .or_insert_with(MemoryTransientStore::new)
            .clone())
    }
}

impl TransientStoreRetriever for MemoryTransientStoreProvider {
    fn store_for_channel(&self, channel_id: &str) -> Option<Arc<dyn TransientStore>> {
        let stores = self.stores.lock().ok()?;
        stores
            .get(channel_id)
            .map(|store| Arc::new(store.clone()) as Arc<dyn TransientStore>)
    }
}
