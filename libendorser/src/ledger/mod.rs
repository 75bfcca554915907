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

//! The views of the ledger the endorser simulates against.
//!
//! How state is persisted is the ledger's concern; the endorser only opens query executors and
//! transaction simulators and reads their results.

use crate::error::InternalError;
use crate::protos::rwset::TxPvtReadWriteSet;

/// A point in time, read only view of channel state.
///
/// `done` releases the underlying resources and must be called once the executor is no longer
/// needed.
pub trait QueryExecutor: Send {
    fn get_state(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, InternalError>;

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

    fn done(&self);
}

/// A query executor which also records the writes of a simulated transaction.
pub trait TxSimulator: QueryExecutor {
    fn get_tx_simulation_results(&self) -> Result<TxSimulationResults, InternalError>;
}

/// One historic value of a key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyModification {
    pub tx_id: String,
    pub value: Vec<u8>,
    pub timestamp: i64,
    pub is_delete: bool,
}

/// Queries the history of keys, as needed by chaincodes that inspect provenance.
pub trait HistoryQueryExecutor: Send {
    fn get_history_for_key(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Vec<KeyModification>, InternalError>;
}

/// Opens new query executors on a channel ledger.
pub trait QueryCreator: Send + Sync {
    fn new_query_executor(&self) -> Result<Box<dyn QueryExecutor>, InternalError>;
}

/// The read/write sets produced by simulating a transaction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TxSimulationResults {
    pub pub_simulation_results: Vec<u8>,
    pub pvt_simulation_results: Option<TxPvtReadWriteSet>,
}

/// A transaction already committed to the ledger.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessedTransaction {
    pub validation_code: i32,
    pub envelope: Vec<u8>,
}
