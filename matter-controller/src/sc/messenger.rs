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

//! Typed framing of secure channel messages over one exchange.

use log::error;

use crate::error::{Error, ErrorCode};
use crate::tlv::TLVWriter;
use crate::transport::exchange::Exchange;
use crate::utils::storage::{ReadBuf, WriteBuf};

use super::{status_report_error, OpCode, StatusReport};

/// Secure channel messages fit well below the Matter UDP MTU
const TX_BUF_LEN: usize = 1280;

/// A secure channel messenger owning one exchange for the duration of a
/// handshake.
///
/// Send operations return the serialised payload bytes, and reads return the
/// raw inbound payload, because PASE and CASE hash the message transcript.
///
/// `close` is idempotent and also runs on drop, so the exchange is released
/// on every exit path.
pub struct ScMessenger<E: Exchange> {
    exchange: E,
    closed: bool,
}

impl<E: Exchange> ScMessenger<E> {
    pub fn new(exchange: E) -> Self {
        Self {
            exchange,
            closed: false,
        }
    }

    /// Serialise a TLV payload and send it under the given opcode.
    pub async fn send_with(
        &mut self,
        opcode: OpCode,
        f: impl FnOnce(&mut TLVWriter) -> Result<(), Error>,
    ) -> Result<Vec<u8>, Error> {
        let mut buf = [0u8; TX_BUF_LEN];
        let mut wb = WriteBuf::new(&mut buf);
        {
            let mut tw = TLVWriter::new(&mut wb);
            f(&mut tw)?;
        }

        self.exchange.send(opcode as u8, wb.as_slice()).await?;

        Ok(wb.as_slice().to_vec())
    }

    /// Await the next message, asserting its opcode.
    ///
    /// An unexpected status report terminates the handshake with the peer's
    /// codes; any other opcode mismatch is a protocol error.
    pub async fn read(&mut self, expected: OpCode) -> Result<Vec<u8>, Error> {
        let rx = self.exchange.recv().await?;

        if rx.proto_opcode == OpCode::StatusReport as u8 && expected != OpCode::StatusReport {
            let err = status_report_error(&rx.payload);
            error!("Handshake terminated by peer: {:?}", err);
            return Err(err);
        }

        if rx.proto_opcode != expected as u8 {
            error!(
                "Unexpected opcode: expected {:?}, got {}",
                expected, rx.proto_opcode
            );
            return Err(ErrorCode::InvalidOpcode.into());
        }

        Ok(rx.payload)
    }

    /// Send a secure channel status report.
    pub async fn send_status(&mut self, code: super::SCStatusCodes) -> Result<(), Error> {
        let report = StatusReport::new(code.general_code(), code as u16);

        let mut buf = [0u8; 8];
        let mut wb = WriteBuf::new(&mut buf);
        report.write(&mut wb)?;

        self.exchange
            .send(OpCode::StatusReport as u8, wb.as_slice())
            .await
    }

    /// Await the session-establishment-success status report.
    pub async fn wait_for_success(&mut self) -> Result<(), Error> {
        let payload = self.read(OpCode::StatusReport).await?;
        let status = StatusReport::read(&mut ReadBuf::new(&payload))?;

        if status.is_session_establishment_success() {
            Ok(())
        } else {
            error!(
                "Session establishment failed: general={:?}, proto_code={}",
                status.general_code, status.proto_code
            );
            Err(ErrorCode::ScStatus(status.general_code, status.proto_code).into())
        }
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

impl<E: Exchange> Drop for ScMessenger<E> {
    fn drop(&mut self) {
        self.close();
    }
}
