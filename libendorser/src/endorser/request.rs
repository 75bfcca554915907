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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-call context of a proposal: where it came from and whether the caller gave up on it.
///
/// The context is handed to the collaborators that may block. Cancelling it does not interrupt
/// the endorser; a collaborator observing the flag fails its call, and that failure is handled
/// like any other.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    remote_addr: Option<String>,
    cancelled: Arc<AtomicBool>,
}

impl RequestContext {
    pub fn new() -> Self {
        RequestContext::default()
    }

    pub fn with_remote_addr(mut self, remote_addr: &str) -> Self {
        self.remote_addr = Some(remote_addr.to_string());
        self
    }

    pub fn remote_addr(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    /// Marks the request as cancelled, for this context and all its clones.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
