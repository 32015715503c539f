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

//! Interaction Model protocol: opcodes, status codes, paths and the
//! request/report message structures.

use crate::error::{Error, ErrorCode};
use crate::tlv::{FromTLV, TLVElement, TLVWriter, TagType, ToTLV};

pub mod client;
pub mod messenger;
pub mod subscription;

pub use client::InteractionClient;
pub use messenger::ImMessenger;
pub use subscription::{SubscriptionManager, SubscriptionReceiver};

/// The Interaction Model revision this client speaks
pub const IM_REVISION: u8 = 1;

/// Context tag of the `interactionModelRevision` field
const TAG_IM_REVISION: u8 = 0xff;

/// Interaction Model protocol opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    StatusResponse = 0x01,
    ReadRequest = 0x02,
    SubscribeRequest = 0x03,
    SubscribeResponse = 0x04,
    ReportData = 0x05,
    WriteRequest = 0x06,
    WriteResponse = 0x07,
    InvokeRequest = 0x08,
    InvokeResponse = 0x09,
    TimedRequest = 0x0a,
}

/// Interaction Model status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IMStatusCode {
    Success = 0x00,
    Failure = 0x01,
    InvalidSubscription = 0x7d,
    UnsupportedAccess = 0x7e,
    UnsupportedEndpoint = 0x7f,
    InvalidAction = 0x80,
    UnsupportedCommand = 0x81,
    InvalidCommand = 0x85,
    UnsupportedAttribute = 0x86,
    ConstraintError = 0x87,
    UnsupportedWrite = 0x88,
    ResourceExhausted = 0x89,
    NotFound = 0x8b,
    UnreportableAttribute = 0x8c,
    InvalidDataType = 0x8d,
    UnsupportedRead = 0x8f,
    DataVersionMismatch = 0x92,
    Timeout = 0x94,
    Busy = 0x9c,
    UnsupportedCluster = 0xc3,
    NoUpstreamSubscription = 0xc5,
    NeedsTimedInteraction = 0xc6,
    UnsupportedEvent = 0xc7,
}

impl IMStatusCode {
    /// Decode a raw status, collapsing unknown codes to `Failure`
    pub fn from_raw(raw: u64) -> Self {
        match raw {
            0x00 => Self::Success,
            0x7d => Self::InvalidSubscription,
            0x7e => Self::UnsupportedAccess,
            0x7f => Self::UnsupportedEndpoint,
            0x80 => Self::InvalidAction,
            0x81 => Self::UnsupportedCommand,
            0x85 => Self::InvalidCommand,
            0x86 => Self::UnsupportedAttribute,
            0x87 => Self::ConstraintError,
            0x88 => Self::UnsupportedWrite,
            0x89 => Self::ResourceExhausted,
            0x8b => Self::NotFound,
            0x8c => Self::UnreportableAttribute,
            0x8d => Self::InvalidDataType,
            0x8f => Self::UnsupportedRead,
            0x92 => Self::DataVersionMismatch,
            0x94 => Self::Timeout,
            0x9c => Self::Busy,
            0xc3 => Self::UnsupportedCluster,
            0xc5 => Self::NoUpstreamSubscription,
            0xc6 => Self::NeedsTimedInteraction,
            0xc7 => Self::UnsupportedEvent,
            _ => Self::Failure,
        }
    }
}

/// The StatusIB structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
    pub status: Option<IMStatusCode>,
    /// Cluster-specific status code, if the cluster defines one
    pub cluster_status: Option<u8>,
}

impl Status {
    pub fn new(status: IMStatusCode) -> Self {
        Self {
            status: Some(status),
            cluster_status: None,
        }
    }

    /// The effective code: `status`, else `Failure` (a bare cluster-specific
    /// code still reports as a failure; the raw value stays accessible)
    pub fn effective(&self) -> IMStatusCode {
        self.status.unwrap_or(IMStatusCode::Failure)
    }
}

impl ToTLV for Status {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        if let Some(status) = self.status {
            tw.u8(&TagType::Context(0), status as u8)?;
        }
        if let Some(cluster_status) = self.cluster_status {
            tw.u8(&TagType::Context(1), cluster_status)?;
        }
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for Status {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            status: match element.find_ctx(0)? {
                Some(v) => Some(IMStatusCode::from_raw(v.u64()?)),
                None => None,
            },
            cluster_status: match element.find_ctx(1)? {
                Some(v) => Some(v.u8()?),
                None => None,
            },
        })
    }
}

/// An attribute path; absent fields are wildcards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AttrPath {
    pub node: Option<u64>,
    pub endpoint: Option<u16>,
    pub cluster: Option<u32>,
    pub attr: Option<u32>,
}

/// The canonical map key of an attribute path
pub type AttrPathKey = (Option<u64>, Option<u16>, Option<u32>, Option<u32>);

impl AttrPath {
    /// The all-attributes wildcard `(*, *, *)`
    pub const WILDCARD: Self = Self {
        node: None,
        endpoint: None,
        cluster: None,
        attr: None,
    };

    pub const fn new(endpoint: u16, cluster: u32, attr: u32) -> Self {
        Self {
            node: None,
            endpoint: Some(endpoint),
            cluster: Some(cluster),
            attr: Some(attr),
        }
    }

    pub fn key(&self) -> AttrPathKey {
        (self.node, self.endpoint, self.cluster, self.attr)
    }

    /// Whether endpoint, cluster and attribute are all concrete
    pub fn is_concrete(&self) -> bool {
        self.endpoint.is_some() && self.cluster.is_some() && self.attr.is_some()
    }
}

impl ToTLV for AttrPath {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_list(tag)?;
        if let Some(node) = self.node {
            tw.u64(&TagType::Context(1), node)?;
        }
        if let Some(endpoint) = self.endpoint {
            tw.u16(&TagType::Context(2), endpoint)?;
        }
        if let Some(cluster) = self.cluster {
            tw.u32(&TagType::Context(3), cluster)?;
        }
        if let Some(attr) = self.attr {
            tw.u32(&TagType::Context(4), attr)?;
        }
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for AttrPath {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            node: match element.find_ctx(1)? {
                Some(v) => Some(v.u64()?),
                None => None,
            },
            endpoint: match element.find_ctx(2)? {
                Some(v) => Some(v.u16()?),
                None => None,
            },
            cluster: match element.find_ctx(3)? {
                Some(v) => Some(v.u32()?),
                None => None,
            },
            attr: match element.find_ctx(4)? {
                Some(v) => Some(v.u32()?),
                None => None,
            },
        })
    }
}

/// A command path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CmdPath {
    pub endpoint: Option<u16>,
    pub cluster: Option<u32>,
    pub command: Option<u32>,
}

impl CmdPath {
    pub const fn new(endpoint: u16, cluster: u32, command: u32) -> Self {
        Self {
            endpoint: Some(endpoint),
            cluster: Some(cluster),
            command: Some(command),
        }
    }
}

impl ToTLV for CmdPath {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_list(tag)?;
        if let Some(endpoint) = self.endpoint {
            tw.u16(&TagType::Context(0), endpoint)?;
        }
        if let Some(cluster) = self.cluster {
            tw.u32(&TagType::Context(1), cluster)?;
        }
        if let Some(command) = self.command {
            tw.u32(&TagType::Context(2), command)?;
        }
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for CmdPath {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            endpoint: match element.find_ctx(0)? {
                Some(v) => Some(v.u16()?),
                None => None,
            },
            cluster: match element.find_ctx(1)? {
                Some(v) => Some(v.u32()?),
                None => None,
            },
            command: match element.find_ctx(2)? {
                Some(v) => Some(v.u32()?),
                None => None,
            },
        })
    }
}

/// One decoded entry of a data report: either a value or a status for a path.
///
/// `value` holds the attribute data as anonymous-tagged TLV bytes; a TLV
/// null is a present value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrReport {
    pub path: AttrPath,
    pub data_version: Option<u32>,
    pub value: Option<Vec<u8>>,
    pub status: Option<Status>,
}

impl AttrReport {
    pub fn data(path: AttrPath, value: Vec<u8>, data_version: u32) -> Self {
        Self {
            path,
            data_version: Some(data_version),
            value: Some(value),
            status: None,
        }
    }

    pub fn status(path: AttrPath, status: Status) -> Self {
        Self {
            path,
            data_version: None,
            value: None,
            status: Some(status),
        }
    }
}

impl ToTLV for AttrReport {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        if let Some(status) = &self.status {
            tw.start_struct(&TagType::Context(0))?;
            self.path.to_tlv(&TagType::Context(0), tw)?;
            status.to_tlv(&TagType::Context(1), tw)?;
            tw.end_container()?;
        } else {
            tw.start_struct(&TagType::Context(1))?;
            if let Some(data_version) = self.data_version {
                tw.u32(&TagType::Context(0), data_version)?;
            }
            self.path.to_tlv(&TagType::Context(1), tw)?;
            if let Some(value) = &self.value {
                tw.raw_element(&TagType::Context(2), &TLVElement::new(value))?;
            }
            tw.end_container()?;
        }
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for AttrReport {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        if let Some(status_ib) = element.find_ctx(0)? {
            return Ok(Self {
                path: AttrPath::from_tlv(&status_ib.ctx(0)?)?,
                data_version: None,
                value: None,
                status: Some(Status::from_tlv(&status_ib.ctx(1)?)?),
            });
        }

        let data_ib = element.ctx(1)?;
        Ok(Self {
            path: AttrPath::from_tlv(&data_ib.ctx(1)?)?,
            data_version: match data_ib.find_ctx(0)? {
                Some(v) => Some(v.u32()?),
                None => None,
            },
            value: match data_ib.find_ctx(2)? {
                Some(v) => Some(v.to_anonymous_vec()?),
                None => None,
            },
            status: None,
        })
    }
}

/// A ReadRequest message
#[derive(Debug, Clone)]
pub struct ReadReqMsg {
    pub attr_requests: Vec<AttrPath>,
    pub fabric_filtered: bool,
}

impl ToTLV for ReadReqMsg {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.start_array(&TagType::Context(0))?;
        for path in &self.attr_requests {
            path.to_tlv(&TagType::Anonymous, tw)?;
        }
        tw.end_container()?;
        tw.bool(&TagType::Context(3), self.fabric_filtered)?;
        tw.u8(&TagType::Context(TAG_IM_REVISION), IM_REVISION)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for ReadReqMsg {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        let mut attr_requests = Vec::new();
        if let Some(array) = element.find_ctx(0)? {
            let mut seq = array.enter()?;
            while let Some(entry) = seq.next_element()? {
                attr_requests.push(AttrPath::from_tlv(&entry)?);
            }
        }
        Ok(Self {
            attr_requests,
            fabric_filtered: match element.find_ctx(3)? {
                Some(v) => v.bool()?,
                None => false,
            },
        })
    }
}

/// A ReportData message
#[derive(Debug, Clone, Default)]
pub struct ReportDataMsg {
    pub subscription_id: Option<u32>,
    pub attr_reports: Vec<AttrReport>,
    pub more_chunks: bool,
    pub suppress_response: bool,
}

impl ToTLV for ReportDataMsg {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        if let Some(subscription_id) = self.subscription_id {
            tw.u32(&TagType::Context(0), subscription_id)?;
        }
        tw.start_array(&TagType::Context(1))?;
        for report in &self.attr_reports {
            report.to_tlv(&TagType::Anonymous, tw)?;
        }
        tw.end_container()?;
        if self.more_chunks {
            tw.bool(&TagType::Context(3), true)?;
        }
        if self.suppress_response {
            tw.bool(&TagType::Context(4), true)?;
        }
        tw.u8(&TagType::Context(TAG_IM_REVISION), IM_REVISION)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for ReportDataMsg {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        let mut attr_reports = Vec::new();
        if let Some(array) = element.find_ctx(1)? {
            let mut seq = array.enter()?;
            while let Some(entry) = seq.next_element()? {
                attr_reports.push(AttrReport::from_tlv(&entry)?);
            }
        }
        Ok(Self {
            subscription_id: match element.find_ctx(0)? {
                Some(v) => Some(v.u32()?),
                None => None,
            },
            attr_reports,
            more_chunks: match element.find_ctx(3)? {
                Some(v) => v.bool()?,
                None => false,
            },
            suppress_response: match element.find_ctx(4)? {
                Some(v) => v.bool()?,
                None => false,
            },
        })
    }
}

/// One attribute write: a concrete path, the TLV-encoded value and an
/// optional expected data version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteItem {
    pub path: AttrPath,
    /// Anonymous-tagged TLV value bytes
    pub data: Vec<u8>,
    pub data_version: Option<u32>,
}

impl ToTLV for WriteItem {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        if let Some(data_version) = self.data_version {
            tw.u32(&TagType::Context(0), data_version)?;
        }
        self.path.to_tlv(&TagType::Context(1), tw)?;
        tw.raw_element(&TagType::Context(2), &TLVElement::new(&self.data))?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for WriteItem {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            path: AttrPath::from_tlv(&element.ctx(1)?)?,
            data: element.ctx(2)?.to_anonymous_vec()?,
            data_version: match element.find_ctx(0)? {
                Some(v) => Some(v.u32()?),
                None => None,
            },
        })
    }
}

/// A WriteRequest message
#[derive(Debug, Clone)]
pub struct WriteReqMsg {
    pub suppress_response: bool,
    pub timed_request: bool,
    pub write_requests: Vec<WriteItem>,
    pub more_chunks: bool,
}

impl ToTLV for WriteReqMsg {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.bool(&TagType::Context(0), self.suppress_response)?;
        tw.bool(&TagType::Context(1), self.timed_request)?;
        tw.start_array(&TagType::Context(2))?;
        for item in &self.write_requests {
            item.to_tlv(&TagType::Anonymous, tw)?;
        }
        tw.end_container()?;
        tw.bool(&TagType::Context(3), self.more_chunks)?;
        tw.u8(&TagType::Context(TAG_IM_REVISION), IM_REVISION)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for WriteReqMsg {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        let mut write_requests = Vec::new();
        if let Some(array) = element.find_ctx(2)? {
            let mut seq = array.enter()?;
            while let Some(entry) = seq.next_element()? {
                write_requests.push(WriteItem::from_tlv(&entry)?);
            }
        }
        Ok(Self {
            suppress_response: match element.find_ctx(0)? {
                Some(v) => v.bool()?,
                None => false,
            },
            timed_request: match element.find_ctx(1)? {
                Some(v) => v.bool()?,
                None => false,
            },
            write_requests,
            more_chunks: match element.find_ctx(3)? {
                Some(v) => v.bool()?,
                None => false,
            },
        })
    }
}

/// One entry of a WriteResponse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrStatus {
    pub path: AttrPath,
    pub status: Status,
}

impl ToTLV for AttrStatus {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        self.path.to_tlv(&TagType::Context(0), tw)?;
        self.status.to_tlv(&TagType::Context(1), tw)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for AttrStatus {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            path: AttrPath::from_tlv(&element.ctx(0)?)?,
            status: Status::from_tlv(&element.ctx(1)?)?,
        })
    }
}

/// A WriteResponse message
#[derive(Debug, Clone, Default)]
pub struct WriteRespMsg {
    pub write_responses: Vec<AttrStatus>,
}

impl ToTLV for WriteRespMsg {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.start_array(&TagType::Context(0))?;
        for status in &self.write_responses {
            status.to_tlv(&TagType::Anonymous, tw)?;
        }
        tw.end_container()?;
        tw.u8(&TagType::Context(TAG_IM_REVISION), IM_REVISION)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for WriteRespMsg {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        let mut write_responses = Vec::new();
        if let Some(array) = element.find_ctx(0)? {
            let mut seq = array.enter()?;
            while let Some(entry) = seq.next_element()? {
                write_responses.push(AttrStatus::from_tlv(&entry)?);
            }
        }
        Ok(Self { write_responses })
    }
}

/// A SubscribeRequest message
#[derive(Debug, Clone)]
pub struct SubscribeReqMsg {
    pub keep_subscriptions: bool,
    pub min_interval_floor: u16,
    pub max_interval_ceiling: u16,
    pub attr_requests: Vec<AttrPath>,
    pub fabric_filtered: bool,
}

impl ToTLV for SubscribeReqMsg {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.bool(&TagType::Context(0), self.keep_subscriptions)?;
        tw.u16(&TagType::Context(1), self.min_interval_floor)?;
        tw.u16(&TagType::Context(2), self.max_interval_ceiling)?;
        tw.start_array(&TagType::Context(3))?;
        for path in &self.attr_requests {
            path.to_tlv(&TagType::Anonymous, tw)?;
        }
        tw.end_container()?;
        tw.bool(&TagType::Context(7), self.fabric_filtered)?;
        tw.u8(&TagType::Context(TAG_IM_REVISION), IM_REVISION)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for SubscribeReqMsg {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        let mut attr_requests = Vec::new();
        if let Some(array) = element.find_ctx(3)? {
            let mut seq = array.enter()?;
            while let Some(entry) = seq.next_element()? {
                attr_requests.push(AttrPath::from_tlv(&entry)?);
            }
        }
        Ok(Self {
            keep_subscriptions: match element.find_ctx(0)? {
                Some(v) => v.bool()?,
                None => false,
            },
            min_interval_floor: element.ctx(1)?.u16()?,
            max_interval_ceiling: element.ctx(2)?.u16()?,
            attr_requests,
            fabric_filtered: match element.find_ctx(7)? {
                Some(v) => v.bool()?,
                None => false,
            },
        })
    }
}

/// A SubscribeResponse message
#[derive(Debug, Clone, Copy)]
pub struct SubscribeRespMsg {
    pub subscription_id: u32,
    pub max_interval: u16,
}

impl ToTLV for SubscribeRespMsg {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.u32(&TagType::Context(0), self.subscription_id)?;
        tw.u16(&TagType::Context(2), self.max_interval)?;
        tw.u8(&TagType::Context(TAG_IM_REVISION), IM_REVISION)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for SubscribeRespMsg {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            subscription_id: element.ctx(0)?.u32()?,
            max_interval: match element.find_ctx(2)? {
                Some(v) => v.u16()?,
                None => 0,
            },
        })
    }
}

/// One command invocation: a path plus optional TLV-encoded fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdData {
    pub path: CmdPath,
    /// Anonymous-tagged TLV command fields
    pub fields: Option<Vec<u8>>,
}

impl ToTLV for CmdData {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        self.path.to_tlv(&TagType::Context(0), tw)?;
        if let Some(fields) = &self.fields {
            tw.raw_element(&TagType::Context(1), &TLVElement::new(fields))?;
        }
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for CmdData {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            path: CmdPath::from_tlv(&element.ctx(0)?)?,
            fields: match element.find_ctx(1)? {
                Some(v) => Some(v.to_anonymous_vec()?),
                None => None,
            },
        })
    }
}

/// A command status entry of an InvokeResponse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdStatus {
    pub path: CmdPath,
    pub status: Status,
}

impl ToTLV for CmdStatus {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        self.path.to_tlv(&TagType::Context(0), tw)?;
        self.status.to_tlv(&TagType::Context(1), tw)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for CmdStatus {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            path: CmdPath::from_tlv(&element.ctx(0)?)?,
            status: Status::from_tlv(&element.ctx(1)?)?,
        })
    }
}

/// One entry of an InvokeResponse: command data or a status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeResult {
    Command(CmdData),
    Status(CmdStatus),
}

impl ToTLV for InvokeResult {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        match self {
            Self::Command(data) => data.to_tlv(&TagType::Context(0), tw)?,
            Self::Status(status) => status.to_tlv(&TagType::Context(1), tw)?,
        }
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for InvokeResult {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        if let Some(data) = element.find_ctx(0)? {
            Ok(Self::Command(CmdData::from_tlv(&data)?))
        } else {
            Ok(Self::Status(CmdStatus::from_tlv(&element.ctx(1)?)?))
        }
    }
}

/// An InvokeRequest message
#[derive(Debug, Clone)]
pub struct InvokeReqMsg {
    pub suppress_response: bool,
    pub timed_request: bool,
    pub invoke_requests: Vec<CmdData>,
}

impl ToTLV for InvokeReqMsg {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.bool(&TagType::Context(0), self.suppress_response)?;
        tw.bool(&TagType::Context(1), self.timed_request)?;
        tw.start_array(&TagType::Context(2))?;
        for invoke in &self.invoke_requests {
            invoke.to_tlv(&TagType::Anonymous, tw)?;
        }
        tw.end_container()?;
        tw.u8(&TagType::Context(TAG_IM_REVISION), IM_REVISION)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for InvokeReqMsg {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        let mut invoke_requests = Vec::new();
        if let Some(array) = element.find_ctx(2)? {
            let mut seq = array.enter()?;
            while let Some(entry) = seq.next_element()? {
                invoke_requests.push(CmdData::from_tlv(&entry)?);
            }
        }
        Ok(Self {
            suppress_response: match element.find_ctx(0)? {
                Some(v) => v.bool()?,
                None => false,
            },
            timed_request: match element.find_ctx(1)? {
                Some(v) => v.bool()?,
                None => false,
            },
            invoke_requests,
        })
    }
}

/// An InvokeResponse message
#[derive(Debug, Clone, Default)]
pub struct InvokeRespMsg {
    pub suppress_response: bool,
    pub invoke_responses: Vec<InvokeResult>,
}

impl ToTLV for InvokeRespMsg {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.bool(&TagType::Context(0), self.suppress_response)?;
        tw.start_array(&TagType::Context(1))?;
        for response in &self.invoke_responses {
            response.to_tlv(&TagType::Anonymous, tw)?;
        }
        tw.end_container()?;
        tw.u8(&TagType::Context(TAG_IM_REVISION), IM_REVISION)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for InvokeRespMsg {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        let mut invoke_responses = Vec::new();
        if let Some(array) = element.find_ctx(1)? {
            let mut seq = array.enter()?;
            while let Some(entry) = seq.next_element()? {
                invoke_responses.push(InvokeResult::from_tlv(&entry)?);
            }
        }
        Ok(Self {
            suppress_response: match element.find_ctx(0)? {
                Some(v) => v.bool()?,
                None => false,
            },
            invoke_responses,
        })
    }
}

/// A StatusResponse message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRespMsg {
    pub status: IMStatusCode,
}

impl ToTLV for StatusRespMsg {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.u8(&TagType::Context(0), self.status as u8)?;
        tw.u8(&TagType::Context(TAG_IM_REVISION), IM_REVISION)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for StatusRespMsg {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            status: IMStatusCode::from_raw(element.ctx(0)?.u64()?),
        })
    }
}

/// A TimedRequest message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedReqMsg {
    pub timeout_ms: u16,
}

impl ToTLV for TimedReqMsg {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.u16(&TagType::Context(0), self.timeout_ms)?;
        tw.u8(&TagType::Context(TAG_IM_REVISION), IM_REVISION)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for TimedReqMsg {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            timeout_ms: element.ctx(0)?.u16()?,
        })
    }
}

pub(crate) fn decode_attr_path_key(
    path: &AttrPath,
) -> Result<(u16, u32, u32), Error> {
    match (path.endpoint, path.cluster, path.attr) {
        (Some(endpoint), Some(cluster), Some(attr)) => Ok((endpoint, cluster, attr)),
        _ => Err(ErrorCode::Invalid.into()),
    }
}
