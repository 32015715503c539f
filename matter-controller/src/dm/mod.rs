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

//! Typed cluster binding.
//!
//! Cluster facades are built from compile-time descriptor values —
//! [`Attribute`] and [`Command`] — that the client accessor methods take by
//! reference. No runtime reflection: a cluster module is a set of `const`
//! descriptors plus a thin wrapper struct (see [`on_off`]).

use core::marker::PhantomData;

use crate::error::{Error, ErrorCode};
use crate::tlv::{TLVElement, TLVWriter, TagType};

pub mod on_off;

/// Encode/decode a value as its cluster-defined TLV shape.
pub trait TlvCodec: Sized {
    fn encode(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error>;
    fn decode(element: &TLVElement) -> Result<Self, Error>;
}

impl TlvCodec for bool {
    fn encode(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.bool(tag, *self)
    }

    fn decode(element: &TLVElement) -> Result<Self, Error> {
        element.bool()
    }
}

impl TlvCodec for u8 {
    fn encode(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.u8(tag, *self)
    }

    fn decode(element: &TLVElement) -> Result<Self, Error> {
        element.u8()
    }
}

impl TlvCodec for u16 {
    fn encode(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.u16(tag, *self)
    }

    fn decode(element: &TLVElement) -> Result<Self, Error> {
        element.u16()
    }
}

impl TlvCodec for u32 {
    fn encode(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.u32(tag, *self)
    }

    fn decode(element: &TLVElement) -> Result<Self, Error> {
        element.u32()
    }
}

impl TlvCodec for u64 {
    fn encode(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.u64(tag, *self)
    }

    fn decode(element: &TLVElement) -> Result<Self, Error> {
        element.u64()
    }
}

impl TlvCodec for Vec<u8> {
    fn encode(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.octets(tag, self)
    }

    fn decode(element: &TLVElement) -> Result<Self, Error> {
        Ok(element.octet_str()?.to_vec())
    }
}

impl TlvCodec for String {
    fn encode(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.utf8(tag, self)
    }

    fn decode(element: &TLVElement) -> Result<Self, Error> {
        Ok(element.utf8_str()?.to_owned())
    }
}

/// The empty request/response structure
impl TlvCodec for () {
    fn encode(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.end_container()
    }

    fn decode(_element: &TLVElement) -> Result<Self, Error> {
        Ok(())
    }
}

/// How an invoke response decodes, given what the peer actually returned.
pub trait ResponseCodec: Sized {
    /// Decode from a command-data entry's fields
    fn decode_fields(element: &TLVElement) -> Result<Self, Error>;

    /// Produce the response when the peer answered with a bare success
    /// status (or, for optional commands, with nothing at all).
    ///
    /// [`NoResponse`] always succeeds here. Data-carrying responses succeed
    /// only for `optional` commands, where the absent value renders as the
    /// type's `Default`; a non-optional command without data is a protocol
    /// error.
    fn from_status_success(optional: bool) -> Result<Self, Error>;
}

/// Marker for commands whose success is a status, not data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoResponse;

impl ResponseCodec for NoResponse {
    fn decode_fields(_element: &TLVElement) -> Result<Self, Error> {
        Ok(NoResponse)
    }

    fn from_status_success(_optional: bool) -> Result<Self, Error> {
        Ok(NoResponse)
    }
}

/// Data-carrying responses decode through their [`TlvCodec`]. A bare status
/// stands in for the data only on optional commands, as the type's default.
macro_rules! data_response {
    ($($t:ty),* $(,)?) => {$(
        impl ResponseCodec for $t {
            fn decode_fields(element: &TLVElement) -> Result<Self, Error> {
                <$t as TlvCodec>::decode(element)
            }

            fn from_status_success(optional: bool) -> Result<Self, Error> {
                if optional {
                    Ok(Default::default())
                } else {
                    Err(ErrorCode::Invalid.into())
                }
            }
        }
    )*};
}

data_response!(bool, u8, u16, u32, u64, Vec<u8>, String);

/// A typed attribute descriptor
pub struct Attribute<T> {
    pub id: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Attribute<T> {
    pub const fn new(id: u32) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }
}

/// A typed command descriptor
pub struct Command<Req, Resp> {
    pub id: u32,
    pub response_id: u32,
    /// Whether the peer may legitimately answer without a response entry.
    /// For such commands an answer of bare success decodes per
    /// [`ResponseCodec::from_status_success`] (the default value for
    /// data-carrying `Resp` types).
    pub optional: bool,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> Command<Req, Resp> {
    pub const fn new(id: u32, response_id: u32, optional: bool) -> Self {
        Self {
            id,
            response_id,
            optional,
            _marker: PhantomData,
        }
    }
}
