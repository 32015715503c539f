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

//! Typed framing of Interaction Model messages over one exchange.

use log::error;

use crate::error::{Error, ErrorCode};
use crate::tlv::{get_root_node_struct, FromTLV, TLVWriter, TagType, ToTLV};
use crate::transport::exchange::Exchange;
use crate::utils::storage::WriteBuf;

use super::{IMStatusCode, OpCode, Status, StatusRespMsg};

const TX_BUF_LEN: usize = 4096;

/// An Interaction Model messenger owning one exchange for the duration of a
/// client operation or inbound report.
///
/// `close` is idempotent and also runs on drop.
pub struct ImMessenger<E: Exchange> {
    exchange: E,
    closed: bool,
}

impl<E: Exchange> ImMessenger<E> {
    pub fn new(exchange: E) -> Self {
        Self {
            exchange,
            closed: false,
        }
    }

    /// Serialise an IM message and send it under the given opcode.
    pub async fn send(&mut self, opcode: OpCode, msg: &impl ToTLV) -> Result<(), Error> {
        let mut buf = [0u8; TX_BUF_LEN];
        let mut wb = WriteBuf::new(&mut buf);
        {
            let mut tw = TLVWriter::new(&mut wb);
            msg.to_tlv(&TagType::Anonymous, &mut tw)?;
        }

        self.exchange.send(opcode as u8, wb.as_slice()).await
    }

    /// Await the next message, asserting its opcode.
    ///
    /// An unexpected StatusResponse is surfaced as the peer's status code;
    /// any other opcode mismatch is a protocol error.
    pub async fn read(&mut self, expected: OpCode) -> Result<Vec<u8>, Error> {
        let rx = self.exchange.recv().await?;

        if rx.proto_opcode == OpCode::StatusResponse as u8 && expected != OpCode::StatusResponse {
            let status = StatusRespMsg::from_tlv(&get_root_node_struct(&rx.payload)?)?;
            error!("Peer answered with status {:?}", status.status);
            return Err(ErrorCode::ImStatus(Status::new(status.status)).into());
        }

        if rx.proto_opcode != expected as u8 {
            error!(
                "Unexpected IM opcode: expected {:?}, got {}",
                expected, rx.proto_opcode
            );
            return Err(ErrorCode::InvalidOpcode.into());
        }

        Ok(rx.payload)
    }

    /// Send a StatusResponse.
    pub async fn send_status(&mut self, status: IMStatusCode) -> Result<(), Error> {
        self.send(OpCode::StatusResponse, &StatusRespMsg { status })
            .await
    }

    /// The local id of the session the exchange runs on.
    pub fn session_id(&self) -> u16 {
        self.exchange.session_id()
    }

    /// Release the exchange. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            self.exchange.close();
            self.closed = true;
        }
    }
}

impl<E: Exchange> Drop for ImMessenger<E> {
    fn drop(&mut self) {
        self.close();
    }
}
