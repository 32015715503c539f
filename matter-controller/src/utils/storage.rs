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

//! Byte-cursor helpers for serialising and parsing wire frames.

use crate::error::{Error, ErrorCode};

/// An append-only cursor over a borrowed byte buffer.
pub struct WriteBuf<'a> {
    buf: &'a mut [u8],
    wr: usize,
}

impl<'a> WriteBuf<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, wr: 0 }
    }

    pub fn append(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.wr + data.len() > self.buf.len() {
            return Err(ErrorCode::NoSpace.into());
        }
        self.buf[self.wr..self.wr + data.len()].copy_from_slice(data);
        self.wr += data.len();
        Ok(())
    }

    pub fn le_u8(&mut self, v: u8) -> Result<(), Error> {
        self.append(&[v])
    }

    pub fn le_u16(&mut self, v: u16) -> Result<(), Error> {
        self.append(&v.to_le_bytes())
    }

    pub fn le_u32(&mut self, v: u32) -> Result<(), Error> {
        self.append(&v.to_le_bytes())
    }

    pub fn le_u64(&mut self, v: u64) -> Result<(), Error> {
        self.append(&v.to_le_bytes())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.wr]
    }

    pub fn len(&self) -> usize {
        self.wr
    }

    pub fn is_empty(&self) -> bool {
        self.wr == 0
    }
}

/// A consuming cursor over a borrowed byte buffer.
pub struct ReadBuf<'a> {
    buf: &'a [u8],
    rd: usize,
}

impl<'a> ReadBuf<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, rd: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.rd + n > self.buf.len() {
            return Err(ErrorCode::InvalidData.into());
        }
        let slice = &self.buf[self.rd..self.rd + n];
        self.rd += n;
        Ok(slice)
    }

    pub fn le_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    pub fn le_u16(&mut self) -> Result<u16, Error> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn le_u32(&mut self) -> Result<u32, Error> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn le_u64(&mut self) -> Result<u64, Error> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.rd..]
    }
}
