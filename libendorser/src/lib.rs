/*
 * Copyright 2018 Bitwise IO, Inc.
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

//! Endorser: the proposal endorsement engine of a permissioned blockchain peer.
//!
//! A client submits a signed proposal; the [`endorser::Endorser`] unpacks and validates it,
//! checks it against the channel's access control, simulates it through the ledger and
//! chaincode collaborators, and finally has an endorsement plugin sign the result.

pub mod endorser;
pub mod error;
pub mod ledger;
pub mod msp;
pub mod plugin;
pub mod protocol;
#[allow(renamed_and_removed_lints)]
pub mod protos;
pub mod transient;

#[macro_use]
extern crate log;
