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

//! Bridges a channel's ledger and transient store into the `State` handed to plugins.

use std::sync::Arc;

use crate::error::InternalError;
use crate::ledger::{QueryCreator, QueryExecutor};
use crate::plugin::{State, StateFetcher};
use crate::protos::rwset::TxPvtReadWriteSet;
use crate::transient::{ScopedScanner, TransientStore};

/// Fetches state views of one channel.
pub struct ChannelState {
    query_creator: Arc<dyn QueryCreator>,
    store: Arc<dyn TransientStore>,
}

impl ChannelState {
    pub fn new(query_creator: Arc<dyn QueryCreator>, store: Arc<dyn TransientStore>) -> Self {
        ChannelState {
            query_creator,
            store,
        }
    }
}

impl StateFetcher for ChannelState {
    fn fetch_state(&self) -> Result<Box<dyn State>, InternalError> {
        let query_executor = self.query_creator.new_query_executor()?;
        Ok(Box::new(StateContext {
            query_executor,
            store: self.store.clone(),
        }))
    }
}

/// A query executor paired with the channel's transient store.
pub struct StateContext {
    query_executor: Box<dyn QueryExecutor>,
    store: Arc<dyn TransientStore>,
}

impl State for StateContext {
    fn get_state_multiple_keys(
        &self,
        namespace: &str,
        keys: &[&str],
    ) -> Result<Vec<Option<Vec<u8>>>, InternalError> {
        self.query_executor.get_state_multiple_keys(namespace, keys)
    }

    fn get_private_data_multiple_keys(
        &self,
        namespace: &str,
        collection: &str,
        keys: &[&str],
    ) -> Result<Vec<Option<Vec<u8>>>, InternalError> {
        self.query_executor
            .get_private_data_multiple_keys(namespace, collection, keys)
    }

    fn get_transient_by_txid(&self, tx_id: &str) -> Result<Vec<TxPvtReadWriteSet>, InternalError> {
        let mut scanner = ScopedScanner::new(self.store.get_tx_pvt_rwset_by_txid(tx_id, None)?);
        let mut data = vec![];
        while let Some(result) = scanner.next()? {
            match result.pvt_simulation_results_with_config {
                Some(mut with_config) => data.push(with_config.take_pvt_rwset()),
                None => continue,
            }
        }
        Ok(data)
    }

    fn done(&self) {
        self.query_executor.done();
    }
}
