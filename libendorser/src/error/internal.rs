/*
 * Copyright 2020 Cargill Incorporated
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

use std::error;
use std::fmt;

type BoxedSource = Box<dyn error::Error + Send + Sync>;

/// An error which is returned for reasons internal to the function, or by a collaborator the
/// endorser has no insight into.
///
/// This error is produced when a failure occurred within the function but the failure is due to
/// an internal implementation detail of the function, or of the ledger, chaincode runtime,
/// transient store or ACL implementation behind one of the endorser's traits. The caller cannot
/// correct the failure; its message is surfaced verbatim to the client.
///
/// The message, when present, takes precedence over the source when the error is displayed.
/// Because the `Display` output is copied into proposal responses, collaborators should prefer
/// `with_message` for anything a client is expected to read.
pub struct InternalError {
    message: Option<String>,
    source: Option<BoxedSource>,
    prefix: Option<String>,
}

impl InternalError {
    /// Constructs a new `InternalError` from a specified source error.
    ///
    /// The source error's `Display` output is used as this error's message.
    pub fn from_source(source: BoxedSource) -> Self {
        Self {
            message: None,
            source: Some(source),
            prefix: None,
        }
    }

    /// Constructs a new `InternalError` from a specified source error and message string.
    pub fn from_source_with_message(source: BoxedSource, message: String) -> Self {
        Self {
            message: Some(message),
            source: Some(source),
            prefix: None,
        }
    }

    /// Constructs a new `InternalError` from a specified source error and prefix string.
    ///
    /// The displayed form is `"{prefix}: {source}"`.
    pub fn from_source_with_prefix(source: BoxedSource, prefix: String) -> Self {
        Self {
            message: None,
            source: Some(source),
            prefix: Some(prefix),
        }
    }

    /// Constructs a new `InternalError` with a specified message string.
    pub fn with_message(message: String) -> Self {
        Self {
            message: Some(message),
            source: None,
            prefix: None,
        }
    }

    /// Reduces the `InternalError` to the display string, dropping the source.
    pub fn reduce_to_string(self) -> Self {
        Self {
            message: Some(self.to_string()),
            source: None,
            prefix: None,
        }
    }
}

impl error::Error for InternalError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.source {
            Some(s) => Some(s.as_ref()),
            None => None,
        }
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.message {
            Some(m) => write!(f, "{}", m),
            None => match (&self.source, &self.prefix) {
                (Some(s), Some(p)) => write!(f, "{}: {}", p, s),
                (Some(s), None) => write!(f, "{}", s),
                (None, _) => write!(f, "{}", std::any::type_name::<InternalError>()),
            },
        }
    }
}

impl fmt::Debug for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const TYPE_NAME: &str = "InternalError";

        match (&self.message, &self.source) {
            (Some(message), None) => f
                .debug_struct(TYPE_NAME)
                .field("message", message)
                .finish(),
            (None, Some(source)) => f
                .debug_struct(TYPE_NAME)
                .field("prefix", &self.prefix)
                .field("source", source)
                .finish(),
            (Some(message), Some(source)) => f
                .debug_struct(TYPE_NAME)
                .field("message", message)
                .field("source", source)
                .finish(),
            (None, None) => f.debug_struct(TYPE_NAME).finish(),
        }
    }
}
