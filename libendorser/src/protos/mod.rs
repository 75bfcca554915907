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

//! Generated protobuf messages and the traits used to convert between them and the native
//! structs in `protocol`.

use std::error::Error as StdError;
use std::fmt;

include!(concat!(env!("OUT_DIR"), "/protos/mod.rs"));

/// A trait for converting a protobuf message into a native struct.
pub trait FromProto<P>: Sized {
    fn from_proto(other: P) -> Result<Self, ProtoConversionError>;
}

/// A trait for converting a native struct into its protobuf message.
pub trait FromNative<N>: Sized {
    fn from_native(other: N) -> Result<Self, ProtoConversionError>;
}

/// A trait for deserializing a native struct from protobuf bytes.
pub trait FromBytes<N>: Sized {
    fn from_bytes(bytes: &[u8]) -> Result<N, ProtoConversionError>;
}

/// The inverse of `FromNative`, with a default implementation.
pub trait IntoProto<P>: Sized
where
    P: FromNative<Self>,
{
    fn into_proto(self) -> Result<P, ProtoConversionError> {
        P::from_native(self)
    }
}

/// The inverse of `FromProto`, with a default implementation.
pub trait IntoNative<N>: Sized
where
    N: FromProto<Self>,
{
    fn into_native(self) -> Result<N, ProtoConversionError> {
        N::from_proto(self)
    }
}

/// A trait for serializing a native struct into protobuf bytes.
pub trait IntoBytes: Sized {
    fn into_bytes(self) -> Result<Vec<u8>, ProtoConversionError>;
}

#[derive(Debug)]
pub enum ProtoConversionError {
    SerializationError(String),
    DeserializationError(String),
    InvalidTypeError(String),
}

impl StdError for ProtoConversionError {}

impl fmt::Display for ProtoConversionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ProtoConversionError::SerializationError(ref s) => {
                write!(f, "SerializationError: {}", s)
            }
            ProtoConversionError::DeserializationError(ref s) => {
                write!(f, "DeserializationError: {}", s)
            }
            ProtoConversionError::InvalidTypeError(ref s) => write!(f, "InvalidTypeError: {}", s),
        }
    }
}

impl From<protobuf::ProtobufError> for ProtoConversionError {
    fn from(e: protobuf::ProtobufError) -> Self {
        ProtoConversionError::SerializationError(format!("{}", e))
    }
}
