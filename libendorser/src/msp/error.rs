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

/// Errors raised while deserializing, validating or using an identity.
#[derive(Debug)]
pub enum IdentityError {
    DeserializationError(String),
    InvalidIdentity(String),
    VerificationError(String),
    SigningError(String),
}

impl Error for IdentityError {}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IdentityError::DeserializationError(msg) => {
                write!(f, "could not deserialize identity: {}", msg)
            }
            IdentityError::InvalidIdentity(msg) => write!(f, "identity is not valid: {}", msg),
            IdentityError::VerificationError(msg) => {
                write!(f, "signature verification failed: {}", msg)
            }
            IdentityError::SigningError(msg) => write!(f, "signing failed: {}", msg),
        }
    }
}

impl From<cylinder::SigningError> for IdentityError {
    fn from(err: cylinder::SigningError) -> Self {
        IdentityError::SigningError(err.to_string())
    }
}

impl From<cylinder::VerificationError> for IdentityError {
    fn from(err: cylinder::VerificationError) -> Self {
        IdentityError::VerificationError(err.to_string())
    }
}
