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

//! The exchange seam towards the transport layer.
//!
//! An exchange is a bounded conversation of related messages between two
//! nodes. Framing, encryption, fragmentation and MRP retransmission all
//! live below this seam; this crate only relies on per-exchange message
//! ordering and the reply-window timeout the transport enforces.
//!
//! Inbound routing is the embedder's responsibility: exchanges opened by the
//! peer on the secure channel protocol go to
//! [`CaseResponder::handle`](crate::sc::case::CaseResponder::handle), those
//! on the interaction protocol go to
//! [`SubscriptionReceiver::handle`](crate::im::subscription::SubscriptionReceiver::handle).

use crate::error::Error;

/// Secure Channel protocol id
pub const SECURE_CHANNEL_PROTOCOL_ID: u16 = 0x0000;
/// Interaction Model protocol id
pub const INTERACTION_PROTOCOL_ID: u16 = 0x0001;

/// An inbound message taken off an exchange.
#[derive(Debug, Clone)]
pub struct RxMessage {
    pub proto_opcode: u8,
    pub payload: Vec<u8>,
}

/// One bounded message conversation with a peer.
///
/// Implementations must deliver messages in order and fail `recv` with
/// [`ErrorCode::RxTimeout`](crate::error::ErrorCode::RxTimeout) when the
/// negotiated reply window elapses, and `send` with
/// [`ErrorCode::TxFailure`](crate::error::ErrorCode::TxFailure) once closed.
pub trait Exchange {
    async fn send(&mut self, proto_opcode: u8, payload: &[u8]) -> Result<(), Error>;

    async fn recv(&mut self) -> Result<RxMessage, Error>;

    /// The local id of the session this exchange runs on
    fn session_id(&self) -> u16;

    /// Release the exchange. Must be idempotent.
    fn close(&mut self);
}

/// Allocates fresh outbound exchanges, one per client operation.
pub trait ExchangeProvider {
    type Exchange: Exchange;

    async fn initiate(&self) -> Result<Self::Exchange, Error>;
}
