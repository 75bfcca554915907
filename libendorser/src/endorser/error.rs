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

use std::error::Error;
use std::fmt;

use crate::error::InternalError;
use crate::protocol::response::{ProposalResponse, INTERNAL_SERVER_ERROR};
use crate::protos::ProtoConversionError;

use super::plugin_endorser::PluginEndorserError;
use super::support::AclError;
use super::unpack::{UnpackError, ValidationError};

/// Reasons a proposal is refused before it is simulated.
#[derive(Debug)]
pub enum EndorserError {
    Unpack(UnpackError),
    Validation(ValidationError),
    /// A transaction with the proposal's id is already on the ledger. `creator` is hex encoded.
    DuplicateTransaction { tx_id: String, creator: String },
    AccessControl(AclError),
}

impl Error for EndorserError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EndorserError::Unpack(err) => Some(err),
            EndorserError::Validation(err) => Some(err),
            EndorserError::DuplicateTransaction { .. } => None,
            EndorserError::AccessControl(err) => Some(err),
        }
    }
}

impl fmt::Display for EndorserError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EndorserError::Unpack(err) => write!(f, "{}", err),
            EndorserError::Validation(err) => write!(f, "error validating proposal: {}", err),
            EndorserError::DuplicateTransaction { tx_id, creator } => write!(
                f,
                "duplicate transaction found [{}]. Creator [{}]",
                tx_id, creator
            ),
            EndorserError::AccessControl(err) => write!(f, "{}", err),
        }
    }
}

/// A refused proposal: the error, together with the response the client should receive.
#[derive(Debug)]
pub struct ProposalRejection {
    response: ProposalResponse,
    error: EndorserError,
}

impl ProposalRejection {
    pub fn new(error: EndorserError) -> Self {
        ProposalRejection {
            response: ProposalResponse::error(INTERNAL_SERVER_ERROR, &error.to_string()),
            error,
        }
    }

    pub fn response(&self) -> &ProposalResponse {
        &self.response
    }

    pub fn error(&self) -> &EndorserError {
        &self.error
    }

    pub fn into_response(self) -> ProposalResponse {
        self.response
    }
}

impl Error for ProposalRejection {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

impl fmt::Display for ProposalRejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

/// Failures after a proposal was accepted. These are reported to the client as a 500 response
/// rather than returned as errors.
#[derive(Debug)]
pub enum EndorsementFailure {
    TxSimulator(InternalError),
    HistoryQueryExecutor(InternalError),
    ChaincodeNotDefined {
        chaincode: String,
        channel: String,
        source: InternalError,
    },
    Simulation(SimulationError),
    ResponsePayload(ProtoConversionError),
    EventSerialization(ProtoConversionError),
    Plugin(PluginEndorserError),
}

impl Error for EndorsementFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EndorsementFailure::TxSimulator(err) => Some(err),
            EndorsementFailure::HistoryQueryExecutor(err) => Some(err),
            EndorsementFailure::ChaincodeNotDefined { source, .. } => Some(source),
            EndorsementFailure::Simulation(err) => Some(err),
            EndorsementFailure::ResponsePayload(err) => Some(err),
            EndorsementFailure::EventSerialization(err) => Some(err),
            EndorsementFailure::Plugin(err) => Some(err),
        }
    }
}

impl fmt::Display for EndorsementFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EndorsementFailure::TxSimulator(err) => write!(f, "{}", err),
            EndorsementFailure::HistoryQueryExecutor(err) => write!(f, "{}", err),
            EndorsementFailure::ChaincodeNotDefined {
                chaincode,
                channel,
                source,
            } => write!(
                f,
                "make sure the chaincode {} has been successfully defined on channel {} and try \
                 again: {}",
                chaincode, channel, source
            ),
            EndorsementFailure::Simulation(err) => write!(f, "error in simulation: {}", err),
            EndorsementFailure::ResponsePayload(err) => {
                write!(f, "failed to create the proposal response: {}", err)
            }
            EndorsementFailure::EventSerialization(err) => {
                write!(f, "failed to marshal chaincode event: {}", err)
            }
            EndorsementFailure::Plugin(err) => write!(f, "endorsing with plugin failed: {}", err),
        }
    }
}

impl From<SimulationError> for EndorsementFailure {
    fn from(err: SimulationError) -> Self {
        EndorsementFailure::Simulation(err)
    }
}

/// Errors raised while running the chaincode and collecting its results.
#[derive(Debug)]
pub enum SimulationError {
    Execution(InternalError),
    InvalidDeploymentSpec(ProtoConversionError),
    SystemChaincodeDeploy { chaincode: String, channel: String },
    CodePackageIncluded,
    /// The init call of a legacy deploy or upgrade failed.
    LegacyInit(InternalError),
    SimulationResults(InternalError),
    PrivateDataInInstantiate,
    CollectionConfig(InternalError),
    LedgerHeight {
        channel: String,
        source: InternalError,
    },
    Distribution(InternalError),
}

impl Error for SimulationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SimulationError::Execution(err) => Some(err),
            SimulationError::InvalidDeploymentSpec(err) => Some(err),
            SimulationError::SystemChaincodeDeploy { .. } => None,
            SimulationError::CodePackageIncluded => None,
            SimulationError::LegacyInit(err) => Some(err),
            SimulationError::SimulationResults(err) => Some(err),
            SimulationError::PrivateDataInInstantiate => None,
            SimulationError::CollectionConfig(err) => Some(err),
            SimulationError::LedgerHeight { source, .. } => Some(source),
            SimulationError::Distribution(err) => Some(err),
        }
    }
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimulationError::Execution(err) => write!(f, "{}", err),
            SimulationError::InvalidDeploymentSpec(err) => {
                write!(f, "error unmarshalling ChaincodeDeploymentSpec: {}", err)
            }
            SimulationError::SystemChaincodeDeploy { chaincode, channel } => write!(
                f,
                "attempting to deploy a system chaincode {}/{}",
                chaincode, channel
            ),
            SimulationError::CodePackageIncluded => {
                f.write_str("lscc upgrade/deploy should not include a code packages")
            }
            SimulationError::LegacyInit(err) => write!(f, "{}", err),
            SimulationError::SimulationResults(err) => {
                write!(f, "failed to obtain simulation results: {}", err)
            }
            SimulationError::PrivateDataInInstantiate => {
                f.write_str("Private data is forbidden to be used in instantiate")
            }
            SimulationError::CollectionConfig(err) => {
                write!(f, "failed to obtain collections config: {}", err)
            }
            SimulationError::LedgerHeight { channel, source } => write!(
                f,
                "failed to obtain ledger height for channel '{}': {}",
                channel, source
            ),
            SimulationError::Distribution(err) => write!(f, "{}", err),
        }
    }
}

#[derive(Debug)]
pub enum EndorserBuildError {
    MissingField(String),
}

impl Error for EndorserBuildError {}

impl fmt::Display for EndorserBuildError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EndorserBuildError::MissingField(s) => write!(f, "MissingField: {}", s),
        }
    }
}
