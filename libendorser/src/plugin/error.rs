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

#[derive(Debug)]
pub enum PluginError {
    /// The plugin could not be initialized with the dependencies it was given.
    InitializationError(String),
    EndorsementError(String),
    InternalError(InternalError),
}

impl Error for PluginError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PluginError::InternalError(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PluginError::InitializationError(msg) => f.write_str(msg),
            PluginError::EndorsementError(msg) => f.write_str(msg),
            PluginError::InternalError(err) => write!(f, "{}", err),
        }
    }
}

impl From<InternalError> for PluginError {
    fn from(err: InternalError) -> Self {
        PluginError::InternalError(err)
    }
}
