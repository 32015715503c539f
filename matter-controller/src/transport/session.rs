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

//! Secure session descriptors produced by PASE and CASE.

use crate::error::{Error, ErrorCode};

/// Default MRP idle retransmission interval, per the Matter Core spec
pub const MRP_DEFAULT_IDLE_INTERVAL_MS: u32 = 500;
/// Default MRP active retransmission interval, per the Matter Core spec
pub const MRP_DEFAULT_ACTIVE_INTERVAL_MS: u32 = 300;

pub const SHARED_SECRET_MAX_LEN: usize = 32;
pub const SESSION_SALT_MAX_LEN: usize = 80;

/// The outcome of a successful session establishment.
///
/// Key derivation and payload encryption happen in the session layer above;
/// this descriptor carries everything that layer needs: the raw shared
/// secret, the key-derivation salt and the negotiated MRP intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureSession {
    pub local_session_id: u16,
    pub peer_session_id: u16,
    /// The fabric the session belongs to; `None` for PASE
    pub fabric_index: Option<u8>,
    /// The authenticated peer node; `None` until operational (PASE)
    pub peer_node_id: Option<u64>,
    /// PASE `Ke` (16 bytes) or the CASE ECDH shared secret (32 bytes)
    pub shared_secret: heapless::Vec<u8, SHARED_SECRET_MAX_LEN>,
    /// Session-key derivation salt; empty for PASE
    pub salt: heapless::Vec<u8, SESSION_SALT_MAX_LEN>,
    pub initiator: bool,
    pub resumption: bool,
    pub idle_interval_ms: u32,
    pub active_interval_ms: u32,
}

impl SecureSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        local_session_id: u16,
        peer_session_id: u16,
        fabric_index: Option<u8>,
        peer_node_id: Option<u64>,
        shared_secret: &[u8],
        salt: &[u8],
        initiator: bool,
        resumption: bool,
        mrp: SessionParameters,
    ) -> Result<Self, Error> {
        Ok(Self {
            local_session_id,
            peer_session_id,
            fabric_index,
            peer_node_id,
            shared_secret: heapless::Vec::from_slice(shared_secret)
                .map_err(|_| ErrorCode::NoSpace)?,
            salt: heapless::Vec::from_slice(salt).map_err(|_| ErrorCode::NoSpace)?,
            initiator,
            resumption,
            idle_interval_ms: mrp.idle_interval_ms,
            active_interval_ms: mrp.active_interval_ms,
        })
    }
}

/// MRP parameters exchanged during session establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParameters {
    pub idle_interval_ms: u32,
    pub active_interval_ms: u32,
}

impl Default for SessionParameters {
    fn default() -> Self {
        Self {
            idle_interval_ms: MRP_DEFAULT_IDLE_INTERVAL_MS,
            active_interval_ms: MRP_DEFAULT_ACTIVE_INTERVAL_MS,
        }
    }
}

/// A CASE resumption record, one per previously established peer.
///
/// Looked up by `resumption_id`; the id is rotated on every successful
/// resumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumptionRecord {
    pub resumption_id: [u8; 16],
    pub peer_node_id: u64,
    pub fabric_index: u8,
    pub shared_secret: [u8; 32],
}
