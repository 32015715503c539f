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

//! A minimal Matter TLV codec.
//!
//! Covers the subset of the TLV grammar the secure channel and the
//! Interaction Model messages use: anonymous and context-specific tags,
//! struct/array/list containers, unsigned and signed integers, booleans,
//! null, and octet/UTF-8 strings with 1- or 2-byte length fields.
//!
//! The handshake and IM code depends only on [`TLVElement`], [`TLVWriter`]
//! and the [`ToTLV`]/[`FromTLV`] traits, so the codec itself stays
//! replaceable.

use crate::error::{Error, ErrorCode};
use crate::utils::storage::WriteBuf;

// Element types (low 5 bits of the control byte)
const T_INT8: u8 = 0x00;
const T_INT16: u8 = 0x01;
const T_INT32: u8 = 0x02;
const T_INT64: u8 = 0x03;
const T_UINT8: u8 = 0x04;
const T_UINT16: u8 = 0x05;
const T_UINT32: u8 = 0x06;
const T_UINT64: u8 = 0x07;
const T_FALSE: u8 = 0x08;
const T_TRUE: u8 = 0x09;
const T_UTF8_1: u8 = 0x0c;
const T_UTF8_2: u8 = 0x0d;
const T_OCTETS_1: u8 = 0x10;
const T_OCTETS_2: u8 = 0x11;
const T_NULL: u8 = 0x14;
const T_STRUCT: u8 = 0x15;
const T_ARRAY: u8 = 0x16;
const T_LIST: u8 = 0x17;
const T_END: u8 = 0x18;

// Tag controls (high 3 bits of the control byte)
const TC_ANONYMOUS: u8 = 0;
const TC_CONTEXT: u8 = 1;

/// The tag of a TLV element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    Anonymous,
    Context(u8),
}

/// Serialise a value as a tagged TLV element.
pub trait ToTLV {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error>;
}

/// Parse a value out of a TLV element.
pub trait FromTLV<'a>: Sized {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error>;
}

/// A TLV element borrowed out of an encoded buffer.
///
/// The element is positioned at its control byte; accessors validate the
/// element type on use.
#[derive(Debug, Clone)]
pub struct TLVElement<'a> {
    buf: &'a [u8],
    off: usize,
}

impl<'a> TLVElement<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, off: 0 }
    }

    fn byte(&self, at: usize) -> Result<u8, Error> {
        self.buf.get(at).copied().ok_or_else(|| ErrorCode::InvalidData.into())
    }

    fn control(&self) -> Result<u8, Error> {
        self.byte(self.off)
    }

    fn element_type(&self) -> Result<u8, Error> {
        Ok(self.control()? & 0x1f)
    }

    fn tag_len(&self) -> Result<usize, Error> {
        match self.control()? >> 5 {
            TC_ANONYMOUS => Ok(0),
            TC_CONTEXT => Ok(1),
            _ => Err(ErrorCode::InvalidData.into()),
        }
    }

    /// The tag of this element
    pub fn tag(&self) -> Result<TagType, Error> {
        match self.control()? >> 5 {
            TC_ANONYMOUS => Ok(TagType::Anonymous),
            TC_CONTEXT => Ok(TagType::Context(self.byte(self.off + 1)?)),
            _ => Err(ErrorCode::InvalidData.into()),
        }
    }

    fn value_off(&self) -> Result<usize, Error> {
        Ok(self.off + 1 + self.tag_len()?)
    }

    /// Unsigned integer value, accepting any encoded width up to 64 bits
    pub fn u64(&self) -> Result<u64, Error> {
        let p = self.value_off()?;
        match self.element_type()? {
            T_UINT8 => Ok(self.byte(p)? as u64),
            T_UINT16 => Ok(u16::from_le_bytes([self.byte(p)?, self.byte(p + 1)?]) as u64),
            T_UINT32 => {
                let mut b = [0; 4];
                for (i, out) in b.iter_mut().enumerate() {
                    *out = self.byte(p + i)?;
                }
                Ok(u32::from_le_bytes(b) as u64)
            }
            T_UINT64 => {
                let mut b = [0; 8];
                for (i, out) in b.iter_mut().enumerate() {
                    *out = self.byte(p + i)?;
                }
                Ok(u64::from_le_bytes(b))
            }
            _ => Err(ErrorCode::InvalidData.into()),
        }
    }

    pub fn u32(&self) -> Result<u32, Error> {
        u32::try_from(self.u64()?).map_err(|_| ErrorCode::InvalidData.into())
    }

    pub fn u16(&self) -> Result<u16, Error> {
        u16::try_from(self.u64()?).map_err(|_| ErrorCode::InvalidData.into())
    }

    pub fn u8(&self) -> Result<u8, Error> {
        u8::try_from(self.u64()?).map_err(|_| ErrorCode::InvalidData.into())
    }

    /// Signed integer value, accepting any encoded width up to 64 bits
    pub fn i64(&self) -> Result<i64, Error> {
        let p = self.value_off()?;
        match self.element_type()? {
            T_INT8 => Ok(self.byte(p)? as i8 as i64),
            T_INT16 => Ok(i16::from_le_bytes([self.byte(p)?, self.byte(p + 1)?]) as i64),
            T_INT32 => {
                let mut b = [0; 4];
                for (i, out) in b.iter_mut().enumerate() {
                    *out = self.byte(p + i)?;
                }
                Ok(i32::from_le_bytes(b) as i64)
            }
            T_INT64 => {
                let mut b = [0; 8];
                for (i, out) in b.iter_mut().enumerate() {
                    *out = self.byte(p + i)?;
                }
                Ok(i64::from_le_bytes(b))
            }
            _ => Err(ErrorCode::InvalidData.into()),
        }
    }

    pub fn bool(&self) -> Result<bool, Error> {
        match self.element_type()? {
            T_FALSE => Ok(false),
            T_TRUE => Ok(true),
            _ => Err(ErrorCode::InvalidData.into()),
        }
    }

    pub fn is_null(&self) -> Result<bool, Error> {
        Ok(self.element_type()? == T_NULL)
    }

    fn str_value(&self, et1: u8, et2: u8) -> Result<&'a [u8], Error> {
        let p = self.value_off()?;
        let et = self.element_type()?;
        let (len, data_off) = if et == et1 {
            (self.byte(p)? as usize, p + 1)
        } else if et == et2 {
            (
                u16::from_le_bytes([self.byte(p)?, self.byte(p + 1)?]) as usize,
                p + 2,
            )
        } else {
            return Err(ErrorCode::InvalidData.into());
        };
        if data_off + len > self.buf.len() {
            return Err(ErrorCode::InvalidData.into());
        }
        Ok(&self.buf[data_off..data_off + len])
    }

    pub fn octet_str(&self) -> Result<&'a [u8], Error> {
        self.str_value(T_OCTETS_1, T_OCTETS_2)
    }

    pub fn utf8_str(&self) -> Result<&'a str, Error> {
        core::str::from_utf8(self.str_value(T_UTF8_1, T_UTF8_2)?)
            .map_err(|_| ErrorCode::InvalidData.into())
    }

    fn is_container(&self) -> Result<bool, Error> {
        Ok(matches!(self.element_type()?, T_STRUCT | T_ARRAY | T_LIST))
    }

    /// Iterate the children of a struct/array/list element
    pub fn enter(&self) -> Result<TLVSequence<'a>, Error> {
        if !self.is_container()? {
            return Err(ErrorCode::InvalidData.into());
        }
        Ok(TLVSequence {
            buf: self.buf,
            off: self.value_off()?,
        })
    }

    /// Find the child of a container carrying the given context tag
    pub fn find_ctx(&self, tag: u8) -> Result<Option<TLVElement<'a>>, Error> {
        let mut seq = self.enter()?;
        while let Some(child) = seq.next_element()? {
            if child.tag()? == TagType::Context(tag) {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    /// Like [`find_ctx`](Self::find_ctx), erroring if the field is absent
    pub fn ctx(&self, tag: u8) -> Result<TLVElement<'a>, Error> {
        self.find_ctx(tag)?.ok_or_else(|| ErrorCode::Invalid.into())
    }

    /// Total encoded length of this element, end-of-container included
    fn total_len(&self) -> Result<usize, Error> {
        let value_off = self.value_off()?;
        let value_len = match self.element_type()? {
            T_INT8 | T_UINT8 => 1,
            T_INT16 | T_UINT16 => 2,
            T_INT32 | T_UINT32 => 4,
            T_INT64 | T_UINT64 => 8,
            T_FALSE | T_TRUE | T_NULL => 0,
            T_UTF8_1 | T_OCTETS_1 => 1 + self.byte(value_off)? as usize,
            T_UTF8_2 | T_OCTETS_2 => {
                2 + u16::from_le_bytes([self.byte(value_off)?, self.byte(value_off + 1)?]) as usize
            }
            T_STRUCT | T_ARRAY | T_LIST => {
                let mut p = value_off;
                loop {
                    if self.byte(p)? == T_END {
                        p += 1;
                        break;
                    }
                    let child = TLVElement { buf: self.buf, off: p };
                    p += child.total_len()?;
                }
                return Ok(p - self.off);
            }
            _ => return Err(ErrorCode::InvalidData.into()),
        };
        Ok(value_off - self.off + value_len)
    }

    /// The complete encoded bytes of this element (header, value and, for
    /// containers, the end-of-container marker)
    pub fn encoded(&self) -> Result<&'a [u8], Error> {
        let len = self.total_len()?;
        if self.off + len > self.buf.len() {
            return Err(ErrorCode::InvalidData.into());
        }
        Ok(&self.buf[self.off..self.off + len])
    }

    /// The encoded bytes of this element with its tag rewritten to anonymous,
    /// suitable for storing a value detached from its surrounding structure
    pub fn to_anonymous_vec(&self) -> Result<Vec<u8>, Error> {
        let encoded = self.encoded()?;
        let skip = 1 + self.tag_len()?;
        let mut out = Vec::with_capacity(encoded.len());
        out.push(self.element_type()?);
        out.extend_from_slice(&encoded[skip..]);
        Ok(out)
    }
}

/// A cursor over the children of a container element.
pub struct TLVSequence<'a> {
    buf: &'a [u8],
    off: usize,
}

impl<'a> TLVSequence<'a> {
    /// The next child, or `None` at the end of the container
    pub fn next_element(&mut self) -> Result<Option<TLVElement<'a>>, Error> {
        if self.off >= self.buf.len() {
            // A root-level sequence ends with the buffer itself
            return Ok(None);
        }
        if self.buf[self.off] == T_END {
            self.off += 1;
            return Ok(None);
        }
        let element = TLVElement {
            buf: self.buf,
            off: self.off,
        };
        self.off += element.total_len()?;
        Ok(Some(element))
    }
}

/// Parse the anonymous root struct out of a message payload.
pub fn get_root_node_struct(data: &[u8]) -> Result<TLVElement<'_>, Error> {
    let root = TLVElement::new(data);
    if root.element_type()? != T_STRUCT {
        return Err(ErrorCode::InvalidData.into());
    }
    Ok(root)
}

/// A TLV serialiser over a [`WriteBuf`].
pub struct TLVWriter<'a, 'b> {
    wb: &'b mut WriteBuf<'a>,
}

impl<'a, 'b> TLVWriter<'a, 'b> {
    pub fn new(wb: &'b mut WriteBuf<'a>) -> Self {
        Self { wb }
    }

    fn control(&mut self, tag: &TagType, element_type: u8) -> Result<(), Error> {
        match tag {
            TagType::Anonymous => self.wb.le_u8(element_type),
            TagType::Context(t) => {
                self.wb.le_u8((TC_CONTEXT << 5) | element_type)?;
                self.wb.le_u8(*t)
            }
        }
    }

    pub fn start_struct(&mut self, tag: &TagType) -> Result<(), Error> {
        self.control(tag, T_STRUCT)
    }

    pub fn start_array(&mut self, tag: &TagType) -> Result<(), Error> {
        self.control(tag, T_ARRAY)
    }

    pub fn start_list(&mut self, tag: &TagType) -> Result<(), Error> {
        self.control(tag, T_LIST)
    }

    pub fn end_container(&mut self) -> Result<(), Error> {
        self.wb.le_u8(T_END)
    }

    /// Unsigned integer, minimal-width encoding
    pub fn u64(&mut self, tag: &TagType, v: u64) -> Result<(), Error> {
        if v <= u8::MAX as u64 {
            self.control(tag, T_UINT8)?;
            self.wb.le_u8(v as u8)
        } else if v <= u16::MAX as u64 {
            self.control(tag, T_UINT16)?;
            self.wb.le_u16(v as u16)
        } else if v <= u32::MAX as u64 {
            self.control(tag, T_UINT32)?;
            self.wb.le_u32(v as u32)
        } else {
            self.control(tag, T_UINT64)?;
            self.wb.le_u64(v)
        }
    }

    pub fn u8(&mut self, tag: &TagType, v: u8) -> Result<(), Error> {
        self.u64(tag, v as u64)
    }

    pub fn u16(&mut self, tag: &TagType, v: u16) -> Result<(), Error> {
        self.u64(tag, v as u64)
    }

    pub fn u32(&mut self, tag: &TagType, v: u32) -> Result<(), Error> {
        self.u64(tag, v as u64)
    }

    /// Signed integer, minimal-width encoding
    pub fn i64(&mut self, tag: &TagType, v: i64) -> Result<(), Error> {
        if let Ok(v) = i8::try_from(v) {
            self.control(tag, T_INT8)?;
            self.wb.le_u8(v as u8)
        } else if let Ok(v) = i16::try_from(v) {
            self.control(tag, T_INT16)?;
            self.wb.append(&v.to_le_bytes())
        } else if let Ok(v) = i32::try_from(v) {
            self.control(tag, T_INT32)?;
            self.wb.append(&v.to_le_bytes())
        } else {
            self.control(tag, T_INT64)?;
            self.wb.append(&v.to_le_bytes())
        }
    }

    pub fn bool(&mut self, tag: &TagType, v: bool) -> Result<(), Error> {
        self.control(tag, if v { T_TRUE } else { T_FALSE })
    }

    pub fn null(&mut self, tag: &TagType) -> Result<(), Error> {
        self.control(tag, T_NULL)
    }

    pub fn octets(&mut self, tag: &TagType, data: &[u8]) -> Result<(), Error> {
        if data.len() <= u8::MAX as usize {
            self.control(tag, T_OCTETS_1)?;
            self.wb.le_u8(data.len() as u8)?;
        } else if data.len() <= u16::MAX as usize {
            self.control(tag, T_OCTETS_2)?;
            self.wb.le_u16(data.len() as u16)?;
        } else {
            return Err(ErrorCode::NoSpace.into());
        }
        self.wb.append(data)
    }

    pub fn utf8(&mut self, tag: &TagType, s: &str) -> Result<(), Error> {
        let data = s.as_bytes();
        if data.len() <= u8::MAX as usize {
            self.control(tag, T_UTF8_1)?;
            self.wb.le_u8(data.len() as u8)?;
        } else if data.len() <= u16::MAX as usize {
            self.control(tag, T_UTF8_2)?;
            self.wb.le_u16(data.len() as u16)?;
        } else {
            return Err(ErrorCode::NoSpace.into());
        }
        self.wb.append(data)
    }

    /// Copy a previously parsed element under a new tag. The element's own
    /// structure (children tags included) is preserved verbatim.
    pub fn raw_element(&mut self, tag: &TagType, element: &TLVElement) -> Result<(), Error> {
        let encoded = element.encoded()?;
        let skip = 1 + element.tag_len()?;
        self.control(tag, element.element_type()?)?;
        self.wb.append(&encoded[skip..])
    }

    pub fn as_slice(&self) -> &[u8] {
        self.wb.as_slice()
    }
}
