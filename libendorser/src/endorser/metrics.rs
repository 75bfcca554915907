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

//! Endorser metrics, exported through `prometheus-client`.

use std::ops::Deref;
use std::sync::Arc;

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ChaincodeLabels {
    pub channel: String,
    pub chaincode: String,
}

impl ChaincodeLabels {
    pub fn new(channel: &str, chaincode: &str) -> Self {
        ChaincodeLabels {
            channel: channel.to_string(),
            chaincode: chaincode.to_string(),
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EndorsementFailureLabels {
    pub channel: String,
    pub chaincode: String,
    /// "true" when the chaincode itself returned an error status.
    pub chaincodeerror: String,
}

impl EndorsementFailureLabels {
    pub fn new(channel: &str, chaincode: &str, chaincode_error: bool) -> Self {
        EndorsementFailureLabels {
            channel: channel.to_string(),
            chaincode: chaincode.to_string(),
            chaincodeerror: chaincode_error.to_string(),
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DurationLabels {
    pub channel: String,
    pub chaincode: String,
    pub success: String,
}

impl DurationLabels {
    pub fn new(channel: &str, chaincode: &str, success: bool) -> Self {
        DurationLabels {
            channel: channel.to_string(),
            chaincode: chaincode.to_string(),
            success: success.to_string(),
        }
    }
}

type HistogramFamily<S> = Family<S, Histogram, fn() -> Histogram>;

#[derive(Clone)]
pub struct EndorserMetrics(Arc<Inner>);

impl Deref for EndorserMetrics {
    type Target = Inner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub struct Inner {
    pub proposals_received: Counter,
    pub successful_proposals: Counter,
    pub proposal_validation_failures: Counter,
    pub proposal_acl_failures: Family<ChaincodeLabels, Counter>,
    pub chaincode_instantiation_failures: Family<ChaincodeLabels, Counter>,
    pub duplicate_transaction_failures: Family<ChaincodeLabels, Counter>,
    pub proposal_simulation_failures: Family<ChaincodeLabels, Counter>,
    pub endorsement_failures: Family<EndorsementFailureLabels, Counter>,
    pub proposal_duration: HistogramFamily<DurationLabels>,
}

fn duration_histogram() -> Histogram {
    // 5ms up to ~40s
    Histogram::new(exponential_buckets(0.005, 2.0, 14))
}

impl Inner {
    pub fn new() -> Self {
        Self {
            proposals_received: Counter::default(),
            successful_proposals: Counter::default(),
            proposal_validation_failures: Counter::default(),
            proposal_acl_failures: Family::default(),
            chaincode_instantiation_failures: Family::default(),
            duplicate_transaction_failures: Family::default(),
            proposal_simulation_failures: Family::default(),
            endorsement_failures: Family::default(),
            proposal_duration: Family::new_with_constructor(duration_histogram),
        }
    }
}

impl Default for Inner {
    fn default() -> Self {
        Self::new()
    }
}

impl EndorserMetrics {
    /// Creates metrics that are recorded but not exported.
    pub fn new() -> Self {
        Self(Arc::new(Inner::new()))
    }

    /// Creates metrics and registers them under the `endorser` prefix.
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::new();
        let registry = registry.sub_registry_with_prefix("endorser");

        registry.register(
            "proposals_received",
            "The number of proposals received",
            metrics.proposals_received.clone(),
        );
        registry.register(
            "successful_proposals",
            "The number of successful proposals",
            metrics.successful_proposals.clone(),
        );
        registry.register(
            "proposal_validation_failures",
            "The number of proposals that have failed initial validation",
            metrics.proposal_validation_failures.clone(),
        );
        registry.register(
            "proposal_acl_failures",
            "The number of proposals that failed ACL checks",
            metrics.proposal_acl_failures.clone(),
        );
        registry.register(
            "chaincode_instantiation_failures",
            "The number of chaincode instantiations or upgrades that have failed",
            metrics.chaincode_instantiation_failures.clone(),
        );
        registry.register(
            "duplicate_transaction_failures",
            "The number of failed proposals due to duplicate transaction ID",
            metrics.duplicate_transaction_failures.clone(),
        );
        registry.register(
            "proposal_simulation_failures",
            "The number of failed proposal simulations",
            metrics.proposal_simulation_failures.clone(),
        );
        registry.register(
            "endorsement_failures",
            "The number of failed endorsements",
            metrics.endorsement_failures.clone(),
        );
        registry.register(
            "proposal_duration",
            "The time to complete a proposal, in seconds",
            metrics.proposal_duration.clone(),
        );

        metrics
    }
}

impl Default for EndorserMetrics {
    fn default() -> Self {
        Self::new()
    }
}
