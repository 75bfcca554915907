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

//! Processes proposals end to end through the public API.

use std::sync::Arc;

use cylinder::{secp256k1::Secp256k1Context, Context, Signer};
use protobuf::Message;
use sha2::{Digest, Sha256};

use endorser::endorser::{
    AclError, AclProvider, Channel, ChannelFetcher, ChannelStateRetriever,
    ChaincodeEndorsementInfo, EndorserBuilder, PluginEndorsement, PluginEndorserBuilder,
    PluginEndorserError, PrivateDataDistributor, RequestContext, Support, TransactionParams,
};
use endorser::error::InternalError;
use endorser::ledger::{
    HistoryQueryExecutor, KeyModification, ProcessedTransaction, QueryCreator, QueryExecutor,
    TxSimulationResults, TxSimulator,
};
use endorser::msp::{Identity, IdentityDeserializer, LocalSigningIdentity, Secp256k1Msp};
use endorser::plugin::builtin::DEFAULT_ENDORSEMENT_PLUGIN;
use endorser::plugin::PluginRegistryBuilder;
use endorser::protocol::chaincode::{ChaincodeEvent, ChaincodeInput};
use endorser::protocol::proposal::{ProposalBuilder, SignedProposal};
use endorser::protocol::response::{Endorsement, ProposalResponsePayload, Response};
use endorser::protos::{self, collection::CollectionConfigPackage, FromBytes};
use endorser::protos::rwset::TxPvtReadWriteSetWithConfigInfo;
use endorser::transient::memory::MemoryTransientStoreProvider;

const CHANNEL: &str = "channel-id";
const CHAINCODE: &str = "chaincode-name";
const CLIENT_MSP: &str = "ClientMSP";
const PEER_MSP: &str = "PeerMSP";

struct NoopQueryExecutor;

impl QueryExecutor for NoopQueryExecutor {
    fn get_state(&self, _: &str, _: &str) -> Result<Option<Vec<u8>>, InternalError> {
        Ok(None)
    }

    fn get_state_multiple_keys(
        &self,
        _: &str,
        keys: &[&str],
    ) -> Result<Vec<Option<Vec<u8>>>, InternalError> {
        Ok(vec![None; keys.len()])
    }

    fn get_private_data_multiple_keys(
        &self,
        _: &str,
        _: &str,
        keys: &[&str],
    ) -> Result<Vec<Option<Vec<u8>>>, InternalError> {
        Ok(vec![None; keys.len()])
    }

    fn done(&self) {}
}

impl TxSimulator for NoopQueryExecutor {
    fn get_tx_simulation_results(&self) -> Result<TxSimulationResults, InternalError> {
        Ok(TxSimulationResults::default())
    }
}

struct NoopHistory;

impl HistoryQueryExecutor for NoopHistory {
    fn get_history_for_key(&self, _: &str, _: &str) -> Result<Vec<KeyModification>, InternalError> {
        Ok(vec![])
    }
}

/// Runs every chaincode with a fixed response, checking it was called with the proposal's
/// arguments.
struct TestSupport {
    endorsement_plugin: String,
}

impl Support for TestSupport {
    fn is_sys_cc(&self, name: &str) -> bool {
        matches!(name, "cscc" | "qscc" | "lscc")
    }

    fn get_transaction_by_id(
        &self,
        _: &str,
        _: &str,
    ) -> Result<Option<ProcessedTransaction>, InternalError> {
        Ok(None)
    }

    fn get_tx_simulator(
        &self,
        _: &RequestContext,
        _: &str,
        _: &str,
    ) -> Result<Box<dyn TxSimulator>, InternalError> {
        Ok(Box::new(NoopQueryExecutor))
    }

    fn get_history_query_executor(
        &self,
        _: &str,
    ) -> Result<Box<dyn HistoryQueryExecutor>, InternalError> {
        Ok(Box::new(NoopHistory))
    }

    fn get_ledger_height(&self, _: &str) -> Result<u64, InternalError> {
        Ok(1)
    }

    fn chaincode_endorsement_info(
        &self,
        _: &str,
        _: &str,
        _: Option<&dyn TxSimulator>,
    ) -> Result<ChaincodeEndorsementInfo, InternalError> {
        Ok(ChaincodeEndorsementInfo {
            version: "1.0".to_string(),
            endorsement_plugin: self.endorsement_plugin.clone(),
        })
    }

    fn all_collections_config_pkg(
        &self,
        _: &str,
        _: &str,
        _: &dyn TxSimulator,
    ) -> Result<Option<CollectionConfigPackage>, InternalError> {
        Ok(None)
    }

    fn execute(
        &self,
        _: &RequestContext,
        params: &TransactionParams,
        chaincode_name: &str,
        input: &ChaincodeInput,
    ) -> Result<(Response, Option<ChaincodeEvent>), InternalError> {
        if chaincode_name != CHAINCODE || params.channel_id != CHANNEL {
            return Err(InternalError::with_message(format!(
                "unexpected chaincode {}/{}",
                params.channel_id, chaincode_name
            )));
        }
        if input.args().to_vec() != vec![b"arg1".to_vec(), b"arg2".to_vec(), b"arg3".to_vec()] {
            return Err(InternalError::with_message("unexpected args".to_string()));
        }
        Ok((
            Response::new(200, "OK", b"response-payload".to_vec()),
            None,
        ))
    }

    fn execute_legacy_init(
        &self,
        _: &RequestContext,
        _: &TransactionParams,
        _: &str,
        _: &str,
        _: &ChaincodeInput,
    ) -> Result<(Response, Option<ChaincodeEvent>), InternalError> {
        Err(InternalError::with_message("not supported".to_string()))
    }
}

struct AllowAll;

impl AclProvider for AllowAll {
    fn check_acl(&self, _: &str, _: &str, _: &SignedProposal) -> Result<(), AclError> {
        Ok(())
    }
}

struct NoDistribution;

impl PrivateDataDistributor for NoDistribution {
    fn distribute_private_data(
        &self,
        _: &str,
        _: &str,
        _: &TxPvtReadWriteSetWithConfigInfo,
        _: u64,
    ) -> Result<(), InternalError> {
        Err(InternalError::with_message(
            "no private data expected".to_string(),
        ))
    }
}

struct SingleChannel {
    msp: Arc<Secp256k1Msp>,
}

impl ChannelFetcher for SingleChannel {
    fn channel(&self, channel_id: &str) -> Option<Channel> {
        if channel_id == CHANNEL {
            Some(Channel {
                identity_deserializer: self.msp.clone(),
            })
        } else {
            None
        }
    }
}

struct NoopQueryCreator;

impl QueryCreator for NoopQueryCreator {
    fn new_query_executor(&self) -> Result<Box<dyn QueryExecutor>, InternalError> {
        Ok(Box::new(NoopQueryExecutor))
    }
}

struct NoopChannelStateRetriever;

impl ChannelStateRetriever for NoopChannelStateRetriever {
    fn new_query_creator(&self, _: &str) -> Result<Arc<dyn QueryCreator>, InternalError> {
        Ok(Arc::new(NoopQueryCreator))
    }
}

struct FixedSignaturePlugin;

impl PluginEndorsement for FixedSignaturePlugin {
    fn endorse_with_plugin(
        &self,
        plugin_name: &str,
        _: &str,
        prp_bytes: &[u8],
        _: &SignedProposal,
    ) -> Result<(Endorsement, Vec<u8>), PluginEndorserError> {
        if plugin_name != "plugin-name" {
            return Err(PluginEndorserError::PluginUnusable {
                plugin_name: plugin_name.to_string(),
                cause: format!("plugin with name {} wasn't found", plugin_name),
            });
        }
        Ok((
            Endorsement::new(vec![], b"endorser-signature".to_vec()),
            prp_bytes.to_vec(),
        ))
    }
}

fn new_signer() -> Box<dyn Signer> {
    let context = Secp256k1Context::new();
    let key = context.new_random_private_key();
    context.new_signer(key)
}

fn client_proposal() -> SignedProposal {
    ProposalBuilder::new()
        .with_channel_id(CHANNEL)
        .with_chaincode_name(CHAINCODE)
        .with_args(vec![b"arg1".to_vec(), b"arg2".to_vec(), b"arg3".to_vec()])
        .with_msp_id(CLIENT_MSP)
        .build(&*new_signer())
        .expect("unable to build proposal")
}

/// Computes the proposal hash from the raw proposal bytes.
fn proposal_hash(signed_proposal: &SignedProposal) -> Vec<u8> {
    let proposal = protos::proposal::Proposal::parse_from_bytes(signed_proposal.proposal_bytes())
        .expect("unable to parse proposal");
    let header = protos::common::Header::parse_from_bytes(proposal.get_header())
        .expect("unable to parse header");
    let mut payload =
        protos::proposal::ChaincodeProposalPayload::parse_from_bytes(proposal.get_payload())
            .expect("unable to parse payload");
    payload.clear_transient_map();

    let mut hasher = Sha256::new();
    hasher.update(header.get_channel_header());
    hasher.update(header.get_signature_header());
    hasher.update(Sha256::digest(
        &payload
            .write_to_bytes()
            .expect("unable to serialize payload"),
    ));
    hasher.finalize().to_vec()
}

/// Tests a proposal endorsed by a plugin that returns a fixed signature.
#[test]
fn process_proposal_with_fixed_plugin() {
    let msp = Arc::new(Secp256k1Msp::new(vec![CLIENT_MSP]));
    let endorser = EndorserBuilder::new()
        .with_channel_fetcher(Arc::new(SingleChannel { msp: msp.clone() }))
        .with_local_msp(msp)
        .with_private_data_distributor(Arc::new(NoDistribution))
        .with_support(Arc::new(TestSupport {
            endorsement_plugin: "plugin-name".to_string(),
        }))
        .with_acl_provider(Arc::new(AllowAll))
        .with_plugin_endorsement(Arc::new(FixedSignaturePlugin))
        .build()
        .expect("unable to build endorser");

    let sp = client_proposal();
    let response = endorser
        .process_proposal(&RequestContext::new().with_remote_addr("127.0.0.1:7051"), &sp)
        .expect("proposal was rejected");

    assert_eq!(200, response.response().status());
    assert_eq!(b"response-payload", response.response().payload());
    assert_eq!(
        b"endorser-signature",
        response
            .endorsement()
            .expect("endorsement missing")
            .signature()
    );

    let prp = ProposalResponsePayload::from_bytes(response.payload().expect("payload missing"))
        .expect("unable to decode payload");
    assert_eq!(proposal_hash(&sp), prp.proposal_hash());
    assert_eq!(b"response-payload", prp.chaincode_action().response().payload());
}

/// Tests a proposal endorsed by the default plugin through the plugin endorser, and checks
/// the endorsement verifies against the peer's identity.
#[test]
fn process_proposal_with_default_plugin() {
    let client_msp = Arc::new(Secp256k1Msp::new(vec![CLIENT_MSP]));
    let peer_identity = LocalSigningIdentity::new(PEER_MSP, new_signer());

    let transient_stores = MemoryTransientStoreProvider::new();
    transient_stores
        .open_store(CHANNEL)
        .expect("unable to open transient store");

    let plugin_endorser = PluginEndorserBuilder::new()
        .with_plugin_mapper(Arc::new(
            PluginRegistryBuilder::new()
                .with_builtins()
                .build()
                .expect("unable to build plugin registry"),
        ))
        .with_channel_state_retriever(Arc::new(NoopChannelStateRetriever))
        .with_signing_identity_fetcher(Arc::new(peer_identity))
        .with_transient_store_retriever(Arc::new(transient_stores))
        .build()
        .expect("unable to build plugin endorser");

    let endorser = EndorserBuilder::new()
        .with_channel_fetcher(Arc::new(SingleChannel {
            msp: client_msp.clone(),
        }))
        .with_local_msp(client_msp)
        .with_private_data_distributor(Arc::new(NoDistribution))
        .with_support(Arc::new(TestSupport {
            endorsement_plugin: DEFAULT_ENDORSEMENT_PLUGIN.to_string(),
        }))
        .with_acl_provider(Arc::new(AllowAll))
        .with_plugin_endorsement(Arc::new(plugin_endorser))
        .build()
        .expect("unable to build endorser");

    for _ in 0..2 {
        let sp = client_proposal();
        let response = endorser
            .process_proposal(&RequestContext::new(), &sp)
            .expect("proposal was rejected");

        let payload = response.payload().expect("payload missing");
        let prp = ProposalResponsePayload::from_bytes(payload).expect("unable to decode payload");
        assert_eq!(proposal_hash(&sp), prp.proposal_hash());

        let endorsement = response.endorsement().expect("endorsement missing");
        let peer = Secp256k1Msp::new(vec![PEER_MSP])
            .deserialize_identity(endorsement.endorser())
            .expect("unable to deserialize endorser");
        assert_eq!(PEER_MSP, peer.msp_id());

        let mut message = payload.to_vec();
        message.extend_from_slice(endorsement.endorser());
        assert!(peer.verify(&message, endorsement.signature()).is_ok());
    }
}
