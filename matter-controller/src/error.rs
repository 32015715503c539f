/*
 *
 *    Copyright (c) 2020-2022 Project CHIP Authors
 *
 *    Licensed under the Apache License, Version 2.0 (the "License");
 *    you may not use this file except in compliance with the License.
 *    You may obtain a copy of the License at
 *
 *        http://www.apache.org/licenses/LICENSE-2.0
 *
 *    Unless required by applicable law or agreed to in writing, software
 *    distributed under the License is distributed on an "AS IS" BASIS,
 *    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *    See the License for the specific language governing permissions and
 *    limitations under the License.
 */

//! Error types shared across the crate.

use core::fmt;

use crate::im::Status;
use crate::sc::GeneralCode;

/// The error kinds surfaced by this crate.
///
/// Variants that terminate a protocol interaction carry the peer-supplied
/// status code so callers can react to the concrete failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The exchange reported closed or the transport refused the message
    TxFailure,
    /// No reply arrived within the exchange layer's reply window
    RxTimeout,
    /// Unexpected message kind on an exchange
    InvalidOpcode,
    /// A protocol invariant was violated: missing required field,
    /// malformed chunked read, report without a subscription id
    Invalid,
    /// Malformed TLV or a value outside its domain
    InvalidData,
    /// A buffer was too small for the data to be written
    NoSpace,
    /// A cryptographic primitive failed (bad key/point/signature encoding)
    Crypto,
    /// The peer terminated a secure-channel exchange with a status report
    ScStatus(GeneralCode, u16),
    /// The peer answered an Interaction Model request with a
    /// non-success status response
    ImStatus(Status),
    /// PASE Pake2 key-confirmation verifier mismatch
    KeyConfirmation,
    /// CASE sigma decryption, signature or credential verification failed
    HandshakeFailure,
    /// No fabric matches the handshake's destination id
    NoCommonTrustRoot,
    /// A command invocation returned a non-success result
    InvokeFailure(Status),
    /// A data report referenced an unknown or missing subscription id
    InvalidSubscription,
}

/// The crate-wide error type: an [`ErrorCode`] with conversion plumbing.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Error {
    code: ErrorCode,
}

impl Error {
    pub const fn new(code: ErrorCode) -> Self {
        Self { code }
    }

    pub const fn code(&self) -> ErrorCode {
        self.code
    }
}

impl From<ErrorCode> for Error {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.code)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.code)
    }
}

impl std::error::Error for Error {}
