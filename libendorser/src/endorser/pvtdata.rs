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

use crate::error::InternalError;
use crate::ledger::TxSimulator;
use crate::protos::rwset::{TxPvtReadWriteSet, TxPvtReadWriteSetWithConfigInfo};

use super::support::Support;

/// Pairs private simulation results with the collection configs of every namespace they touch.
pub fn assemble_pvt_rwset(
    channel_id: &str,
    pvt_rwset: &TxPvtReadWriteSet,
    tx_simulator: &dyn TxSimulator,
    support: &dyn Support,
) -> Result<TxPvtReadWriteSetWithConfigInfo, InternalError> {
    let mut with_config = TxPvtReadWriteSetWithConfigInfo::new();

    for ns in pvt_rwset.get_ns_pvt_rwset() {
        let namespace = ns.get_namespace();
        if with_config.get_collection_configs().contains_key(namespace) {
            continue;
        }

        let package = support
            .all_collections_config_pkg(channel_id, namespace, tx_simulator)
            .map_err(|err| {
                InternalError::from_source_with_prefix(
                    Box::new(err),
                    format!(
                        "error while retrieving collection config for chaincode {:?}",
                        namespace
                    ),
                )
            })?
            .ok_or_else(|| {
                InternalError::with_message(format!(
                    "no collection config for chaincode {:?}",
                    namespace
                ))
            })?;

        with_config
            .mut_collection_configs()
            .insert(namespace.to_string(), package);
    }

    with_config.set_pvt_rwset(pvt_rwset.clone());
    Ok(with_config)
}
