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

//! Secure Channel protocol: opcodes, status reporting and the session
//! establishment protocols (PASE and CASE).

use crate::error::{Error, ErrorCode};
use crate::utils::storage::{ReadBuf, WriteBuf};

pub mod case;
pub mod messenger;
pub mod pase;

pub use messenger::ScMessenger;

/// Secure Channel protocol opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    MRPStandaloneAck = 0x10,
    PBKDFParamRequest = 0x20,
    PBKDFParamResponse = 0x21,
    PASEPake1 = 0x22,
    PASEPake2 = 0x23,
    PASEPake3 = 0x24,
    CASESigma1 = 0x30,
    CASESigma2 = 0x31,
    CASESigma3 = 0x32,
    CASESigma2Resume = 0x33,
    StatusReport = 0x40,
}

/// General codes of a secure channel status report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum GeneralCode {
    Success = 0,
    Failure = 1,
    BadPrecondition = 2,
    OutOfRange = 3,
    BadRequest = 4,
    Unsupported = 5,
    Unexpected = 6,
    ResourceExhausted = 7,
    Busy = 8,
    Timeout = 9,
    Continue = 10,
    Aborted = 11,
    InvalidArgument = 12,
    NotFound = 13,
    AlreadyExists = 14,
    PermissionDenied = 15,
    DataLoss = 16,
}

impl GeneralCode {
    fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Self::Success,
            2 => Self::BadPrecondition,
            3 => Self::OutOfRange,
            4 => Self::BadRequest,
            5 => Self::Unsupported,
            6 => Self::Unexpected,
            7 => Self::ResourceExhausted,
            8 => Self::Busy,
            9 => Self::Timeout,
            10 => Self::Continue,
            11 => Self::Aborted,
            12 => Self::InvalidArgument,
            13 => Self::NotFound,
            14 => Self::AlreadyExists,
            15 => Self::PermissionDenied,
            16 => Self::DataLoss,
            _ => Self::Failure,
        }
    }
}

/// Secure-channel protocol status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SCStatusCodes {
    SessionEstablishmentSuccess = 0,
    NoSharedTrustRoots = 1,
    InvalidParameter = 2,
    CloseSession = 3,
    Busy = 4,
    SessionNotFound = 5,
}

impl SCStatusCodes {
    pub fn general_code(&self) -> GeneralCode {
        match self {
            Self::SessionEstablishmentSuccess => GeneralCode::Success,
            Self::CloseSession => GeneralCode::Success,
            Self::Busy => GeneralCode::Busy,
            Self::NoSharedTrustRoots
            | Self::InvalidParameter
            | Self::SessionNotFound => GeneralCode::Failure,
        }
    }
}

/// The (non-TLV) secure channel status report frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub general_code: GeneralCode,
    pub proto_id: u32,
    pub proto_code: u16,
}

impl StatusReport {
    pub fn new(general_code: GeneralCode, proto_code: u16) -> Self {
        Self {
            general_code,
            proto_id: crate::transport::exchange::SECURE_CHANNEL_PROTOCOL_ID as u32,
            proto_code,
        }
    }

    pub fn read(rb: &mut ReadBuf) -> Result<Self, Error> {
        Ok(Self {
            general_code: GeneralCode::from_raw(rb.le_u16()?),
            proto_id: rb.le_u32()?,
            proto_code: rb.le_u16()?,
        })
    }

    pub fn write(&self, wb: &mut WriteBuf) -> Result<(), Error> {
        wb.le_u16(self.general_code as u16)?;
        wb.le_u32(self.proto_id)?;
        wb.le_u16(self.proto_code)
    }

    pub fn is_session_establishment_success(&self) -> bool {
        self.general_code == GeneralCode::Success
            && self.proto_code == SCStatusCodes::SessionEstablishmentSuccess as u16
    }
}

/// Map a status-report payload to an error, preserving the peer's codes.
pub(crate) fn status_report_error(payload: &[u8]) -> Error {
    match StatusReport::read(&mut ReadBuf::new(payload)) {
        Ok(status) => ErrorCode::ScStatus(status.general_code, status.proto_code).into(),
        Err(e) => e,
    }
}
