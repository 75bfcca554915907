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

//! The proposal endorsement engine.
//!
//! [`Endorser::process_proposal`] takes a signed proposal through four phases: it is unpacked,
//! checked (validation, duplicate detection and access control), simulated against the ledger
//! by running its chaincode, and finally endorsed by the chaincode's endorsement plugin.
//! Proposals that fail the checks are rejected with an error; failures from simulation onwards
//! are reported to the client as a 500 response.

mod error;
mod metrics;
mod plugin_endorser;
mod pvtdata;
mod request;
mod state;
mod support;
mod unpack;

use std::sync::Arc;
use std::time::Instant;

use crate::msp::IdentityDeserializer;
use crate::protocol::chaincode::{
    ChaincodeDeploymentSpec, ChaincodeEvent, ChaincodeId, ChaincodeInput,
};
use crate::protocol::proposal::SignedProposal;
use crate::protocol::response::{
    ChaincodeAction, ProposalResponse, ProposalResponsePayload, Response, ERROR_THRESHOLD,
    INTERNAL_SERVER_ERROR, OK,
};
use crate::protos::{FromBytes, IntoBytes};

pub use self::error::{
    EndorsementFailure, EndorserBuildError, EndorserError, ProposalRejection, SimulationError,
};
pub use self::metrics::{ChaincodeLabels, DurationLabels, EndorsementFailureLabels, EndorserMetrics};
pub use self::plugin_endorser::{
    PluginEndorser, PluginEndorserBuildError, PluginEndorserBuilder, PluginEndorserError,
};
pub use self::pvtdata::assemble_pvt_rwset;
pub use self::request::RequestContext;
pub use self::state::{ChannelState, StateContext};
pub use self::support::{
    AclError, AclProvider, Channel, ChannelFetcher, ChannelStateRetriever,
    ChaincodeEndorsementInfo, PluginEndorsement, PrivateDataDistributor, Support,
    TransactionParams,
};
pub use self::unpack::{UnpackError, UnpackedProposal, ValidationError};

use self::support::SimulatorGuard;

/// The ACL resource a proposal's creator must satisfy.
pub const PROPOSE_RESOURCE: &str = "peer/Propose";

const LSCC: &str = "lscc";

/// Channel-less proposals and the query and configuration system chaincodes run without a
/// ledger simulator.
fn acquire_tx_simulator(channel_id: &str, chaincode_name: &str) -> bool {
    if channel_id.is_empty() {
        return false;
    }

    !matches!(chaincode_name, "qscc" | "cscc")
}

/// What simulating a proposal produced.
struct Simulation {
    info: ChaincodeEndorsementInfo,
    response: Response,
    pub_simulation_results: Vec<u8>,
    event: Option<ChaincodeEvent>,
}

/// Endorses proposals on behalf of a peer.
///
/// An `Endorser` holds no per-proposal state and may be shared between threads.
pub struct Endorser {
    channel_fetcher: Arc<dyn ChannelFetcher>,
    local_msp: Arc<dyn IdentityDeserializer>,
    private_data_distributor: Arc<dyn PrivateDataDistributor>,
    support: Arc<dyn Support>,
    acl_provider: Arc<dyn AclProvider>,
    plugin_endorsement: Arc<dyn PluginEndorsement>,
    metrics: EndorserMetrics,
}

impl Endorser {
    /// Processes a signed proposal.
    ///
    /// Returns `Err` when the proposal is malformed, its creator cannot be authenticated, its
    /// transaction id is already on the ledger or the creator is denied by the channel's ACL;
    /// the rejection carries the response to send to the client. Any other failure is reported
    /// as an `Ok` response with status 500.
    pub fn process_proposal(
        &self,
        ctx: &RequestContext,
        signed_proposal: &SignedProposal,
    ) -> Result<ProposalResponse, ProposalRejection> {
        let start = Instant::now();
        debug!(
            "request from {}",
            ctx.remote_addr().unwrap_or("unknown address")
        );

        let up = UnpackedProposal::unpack(signed_proposal).map_err(|err| {
            warn!("Failed to unpack proposal: {}", err);
            ProposalRejection::new(EndorserError::Unpack(err))
        })?;
        self.metrics.proposals_received.inc();

        let deserializer = if up.channel_id().is_empty() {
            self.local_msp.clone()
        } else {
            match self.channel_fetcher.channel(up.channel_id()) {
                Some(channel) => channel.identity_deserializer,
                None => {
                    warn!(
                        "[{}][{}] channel not found",
                        up.channel_id(),
                        short_tx_id(up.tx_id())
                    );
                    return Ok(ProposalResponse::error(
                        INTERNAL_SERVER_ERROR,
                        &format!("channel '{}' not found", up.channel_id()),
                    ));
                }
            }
        };

        self.pre_process(&up, &*deserializer).map_err(|err| {
            warn!(
                "[{}][{}] Failed to preprocess proposal for chaincode {}: {}",
                up.channel_id(),
                short_tx_id(up.tx_id()),
                up.chaincode_name(),
                err
            );
            ProposalRejection::new(err)
        })?;

        let (response, success) = match self.process_proposal_successfully_or_error(ctx, &up) {
            Ok(response) => {
                let success = response.endorsement().is_some() || up.channel_id().is_empty();
                (response, success)
            }
            Err(err) => {
                warn!(
                    "[{}][{}] Failed to endorse proposal for chaincode {}: {}",
                    up.channel_id(),
                    short_tx_id(up.tx_id()),
                    up.chaincode_name(),
                    err
                );
                (
                    ProposalResponse::error(INTERNAL_SERVER_ERROR, &err.to_string()),
                    false,
                )
            }
        };

        if success {
            self.metrics.successful_proposals.inc();
        }
        self.metrics
            .proposal_duration
            .get_or_create(&DurationLabels::new(
                up.channel_id(),
                up.chaincode_name(),
                success,
            ))
            .observe(start.elapsed().as_secs_f64());

        debug!(
            "[{}][{}] Exit: status {}",
            up.channel_id(),
            short_tx_id(up.tx_id()),
            response.response().status()
        );
        Ok(response)
    }

    /// Validates the proposal and, for channel proposals, checks the transaction id for
    /// uniqueness and the creator against the channel's ACL.
    fn pre_process(
        &self,
        up: &UnpackedProposal,
        deserializer: &dyn IdentityDeserializer,
    ) -> Result<(), EndorserError> {
        if let Err(err) = up.validate(deserializer) {
            self.metrics.proposal_validation_failures.inc();
            return Err(EndorserError::Validation(err));
        }

        if up.channel_id().is_empty() {
            return Ok(());
        }

        let labels = ChaincodeLabels::new(up.channel_id(), up.chaincode_name());

        match self
            .support
            .get_transaction_by_id(up.channel_id(), up.tx_id())
        {
            Ok(Some(_)) => {
                self.metrics
                    .duplicate_transaction_failures
                    .get_or_create(&labels)
                    .inc();
                return Err(EndorserError::DuplicateTransaction {
                    tx_id: up.tx_id().to_string(),
                    creator: hex::encode(up.creator()),
                });
            }
            Ok(None) => (),
            Err(err) => debug!(
                "[{}][{}] transaction lookup failed, treating it as unused: {}",
                up.channel_id(),
                short_tx_id(up.tx_id()),
                err
            ),
        }

        if !self.support.is_sys_cc(up.chaincode_name()) {
            if let Err(err) = self.acl_provider.check_acl(
                PROPOSE_RESOURCE,
                up.channel_id(),
                up.signed_proposal(),
            ) {
                self.metrics.proposal_acl_failures.get_or_create(&labels).inc();
                return Err(EndorserError::AccessControl(err));
            }
        }

        Ok(())
    }

    fn process_proposal_successfully_or_error(
        &self,
        ctx: &RequestContext,
        up: &UnpackedProposal,
    ) -> Result<ProposalResponse, EndorsementFailure> {
        let Simulation {
            info,
            response,
            pub_simulation_results,
            event,
        } = self.simulate(ctx, up)?;

        let events = match event {
            Some(event) if response.status() == OK => event
                .into_bytes()
                .map_err(EndorsementFailure::EventSerialization)?,
            _ => vec![],
        };

        let prp_bytes = ProposalResponsePayload::new(
            up.proposal_hash().to_vec(),
            ChaincodeAction::new(
                pub_simulation_results,
                events,
                response.clone(),
                ChaincodeId::new(up.chaincode_name()).with_version(&info.version),
            ),
        )
        .into_bytes()
        .map_err(EndorsementFailure::ResponsePayload)?;

        if response.status() >= INTERNAL_SERVER_ERROR {
            return Ok(ProposalResponse::new(0, response, Some(prp_bytes), None));
        }
        if up.channel_id().is_empty() {
            return Ok(ProposalResponse::new(0, response, None, None));
        }
        if response.status() >= ERROR_THRESHOLD {
            self.metrics
                .endorsement_failures
                .get_or_create(&EndorsementFailureLabels::new(
                    up.channel_id(),
                    up.chaincode_name(),
                    true,
                ))
                .inc();
            return Ok(ProposalResponse::new(0, response, None, None));
        }

        let (endorsement, prp_bytes) = self
            .plugin_endorsement
            .endorse_with_plugin(
                &info.endorsement_plugin,
                up.channel_id(),
                &prp_bytes,
                up.signed_proposal(),
            )
            .map_err(|err| {
                self.metrics
                    .endorsement_failures
                    .get_or_create(&EndorsementFailureLabels::new(
                        up.channel_id(),
                        up.chaincode_name(),
                        false,
                    ))
                    .inc();
                EndorsementFailure::Plugin(err)
            })?;

        Ok(ProposalResponse::new(
            1,
            response,
            Some(prp_bytes),
            Some(endorsement),
        ))
    }

    /// Runs the proposal's chaincode. The simulator, if one was acquired, is released when this
    /// returns.
    fn simulate(
        &self,
        ctx: &RequestContext,
        up: &UnpackedProposal,
    ) -> Result<Simulation, EndorsementFailure> {
        let (guard, history_query_executor) =
            if acquire_tx_simulator(up.channel_id(), up.chaincode_name()) {
                let guard = SimulatorGuard::new(
                    self.support
                        .get_tx_simulator(ctx, up.channel_id(), up.tx_id())
                        .map_err(EndorsementFailure::TxSimulator)?,
                );
                let history_query_executor = self
                    .support
                    .get_history_query_executor(up.channel_id())
                    .map_err(EndorsementFailure::HistoryQueryExecutor)?;
                (Some(guard), Some(history_query_executor))
            } else {
                (None, None)
            };

        let params = TransactionParams {
            channel_id: up.channel_id(),
            tx_id: up.tx_id(),
            signed_proposal: up.signed_proposal(),
            transient_map: up.transient_map(),
            tx_simulator: guard.as_ref().map(SimulatorGuard::simulator),
            history_query_executor: history_query_executor.as_deref(),
        };

        let info = self
            .support
            .chaincode_endorsement_info(up.channel_id(), up.chaincode_name(), params.tx_simulator)
            .map_err(|source| EndorsementFailure::ChaincodeNotDefined {
                chaincode: up.chaincode_name().to_string(),
                channel: up.channel_id().to_string(),
                source,
            })?;

        let (response, pub_simulation_results, event) =
            self.simulate_proposal(ctx, &params, up.chaincode_name(), up.input())?;

        Ok(Simulation {
            info,
            response,
            pub_simulation_results,
            event,
        })
    }

    /// Executes the chaincode and, when the proposal ran against a simulator, collects the
    /// public results and distributes any private ones.
    fn simulate_proposal(
        &self,
        ctx: &RequestContext,
        params: &TransactionParams,
        chaincode_name: &str,
        input: &ChaincodeInput,
    ) -> Result<(Response, Vec<u8>, Option<ChaincodeEvent>), SimulationError> {
        let (response, event) = self
            .call_chaincode(ctx, params, chaincode_name, input)
            .map_err(|err| {
                error!(
                    "[{}][{}] failed to invoke chaincode {}: {}",
                    params.channel_id,
                    short_tx_id(params.tx_id),
                    chaincode_name,
                    err
                );
                if !matches!(err, SimulationError::LegacyInit(_)) {
                    self.metrics
                        .proposal_simulation_failures
                        .get_or_create(&ChaincodeLabels::new(params.channel_id, chaincode_name))
                        .inc();
                }
                err
            })?;

        let tx_simulator = match params.tx_simulator {
            Some(tx_simulator) => tx_simulator,
            None => return Ok((response, vec![], event)),
        };

        let results = tx_simulator
            .get_tx_simulation_results()
            .map_err(SimulationError::SimulationResults)?;

        if let Some(pvt_rwset) = &results.pvt_simulation_results {
            if chaincode_name == LSCC {
                return Err(SimulationError::PrivateDataInInstantiate);
            }

            let mut pvt_data = assemble_pvt_rwset(
                params.channel_id,
                pvt_rwset,
                tx_simulator,
                &*self.support,
            )
            .map_err(SimulationError::CollectionConfig)?;

            let endorsed_at = self
                .support
                .get_ledger_height(params.channel_id)
                .map_err(|source| SimulationError::LedgerHeight {
                    channel: params.channel_id.to_string(),
                    source,
                })?;
            pvt_data.set_endorsed_at(endorsed_at);

            self.private_data_distributor
                .distribute_private_data(params.channel_id, params.tx_id, &pvt_data, endorsed_at)
                .map_err(SimulationError::Distribution)?;
        }

        Ok((response, results.pub_simulation_results, event))
    }

    /// Executes the chaincode. A successful legacy `lscc` deploy or upgrade also runs the
    /// deployed chaincode's init function.
    fn call_chaincode(
        &self,
        ctx: &RequestContext,
        params: &TransactionParams,
        chaincode_name: &str,
        input: &ChaincodeInput,
    ) -> Result<(Response, Option<ChaincodeEvent>), SimulationError> {
        let start = Instant::now();
        let result = self.support.execute(ctx, params, chaincode_name, input);
        info!(
            "[{}][{}] finished chaincode: {} duration: {}ms",
            params.channel_id,
            short_tx_id(params.tx_id),
            chaincode_name,
            start.elapsed().as_millis()
        );
        let (response, event) = result.map_err(SimulationError::Execution)?;

        if response.status() >= ERROR_THRESHOLD {
            return Ok((response, None));
        }

        let args = input.args();
        if chaincode_name != LSCC
            || args.len() < 3
            || (args[0].as_slice() != b"deploy" && args[0].as_slice() != b"upgrade")
        {
            return Ok((response, event));
        }

        let cds = ChaincodeDeploymentSpec::from_bytes(&args[2])
            .map_err(SimulationError::InvalidDeploymentSpec)?;
        let deployed = cds.chaincode_id();

        if self.support.is_sys_cc(deployed.name()) {
            return Err(SimulationError::SystemChaincodeDeploy {
                chaincode: deployed.name().to_string(),
                channel: params.channel_id.to_string(),
            });
        }
        if !cds.code_package().is_empty() {
            return Err(SimulationError::CodePackageIncluded);
        }

        self.support
            .execute_legacy_init(ctx, params, deployed.name(), deployed.version(), cds.input())
            .map_err(|err| {
                self.metrics
                    .chaincode_instantiation_failures
                    .get_or_create(&ChaincodeLabels::new(params.channel_id, deployed.name()))
                    .inc();
                SimulationError::LegacyInit(err)
            })?;

        Ok((response, event))
    }
}

fn short_tx_id(tx_id: &str) -> &str {
    tx_id.get(..8).unwrap_or(tx_id)
}

#[derive(Default)]
pub struct EndorserBuilder {
    channel_fetcher: Option<Arc<dyn ChannelFetcher>>,
    local_msp: Option<Arc<dyn IdentityDeserializer>>,
    private_data_distributor: Option<Arc<dyn PrivateDataDistributor>>,
    support: Option<Arc<dyn Support>>,
    acl_provider: Option<Arc<dyn AclProvider>>,
    plugin_endorsement: Option<Arc<dyn PluginEndorsement>>,
    metrics: Option<EndorserMetrics>,
}

impl EndorserBuilder {
    pub fn new() -> Self {
        EndorserBuilder::default()
    }

    pub fn with_channel_fetcher(mut self, channel_fetcher: Arc<dyn ChannelFetcher>) -> Self {
        self.channel_fetcher = Some(channel_fetcher);
        self
    }

    /// Sets the deserializer that authenticates channel-less proposals.
    pub fn with_local_msp(mut self, local_msp: Arc<dyn IdentityDeserializer>) -> Self {
        self.local_msp = Some(local_msp);
        self
    }

    pub fn with_private_data_distributor(
        mut self,
        private_data_distributor: Arc<dyn PrivateDataDistributor>,
    ) -> Self {
        self.private_data_distributor = Some(private_data_distributor);
        self
    }

    pub fn with_support(mut self, support: Arc<dyn Support>) -> Self {
        self.support = Some(support);
        self
    }

    pub fn with_acl_provider(mut self, acl_provider: Arc<dyn AclProvider>) -> Self {
        self.acl_provider = Some(acl_provider);
        self
    }

    pub fn with_plugin_endorsement(
        mut self,
        plugin_endorsement: Arc<dyn PluginEndorsement>,
    ) -> Self {
        self.plugin_endorsement = Some(plugin_endorsement);
        self
    }

    /// Sets the metrics to record to. Unregistered metrics are used if none are given.
    pub fn with_metrics(mut self, metrics: EndorserMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<Endorser, EndorserBuildError> {
        let channel_fetcher = self.channel_fetcher.ok_or_else(|| {
            EndorserBuildError::MissingField("'channel_fetcher' field is required".to_string())
        })?;
        let local_msp = self.local_msp.ok_or_else(|| {
            EndorserBuildError::MissingField("'local_msp' field is required".to_string())
        })?;
        let private_data_distributor = self.private_data_distributor.ok_or_else(|| {
            EndorserBuildError::MissingField(
                "'private_data_distributor' field is required".to_string(),
            )
        })?;
        let support = self.support.ok_or_else(|| {
            EndorserBuildError::MissingField("'support' field is required".to_string())
        })?;
        let acl_provider = self.acl_provider.ok_or_else(|| {
            EndorserBuildError::MissingField("'acl_provider' field is required".to_string())
        })?;
        let plugin_endorsement = self.plugin_endorsement.ok_or_else(|| {
            EndorserBuildError::MissingField("'plugin_endorsement' field is required".to_string())
        })?;

        Ok(Endorser {
            channel_fetcher,
            local_msp,
            private_data_distributor,
            support,
            acl_provider,
            plugin_endorsement,
            metrics: self.metrics.unwrap_or_default(),
        })
    }
}
