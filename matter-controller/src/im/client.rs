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

//! The Interaction Model client.
//!
//! Sends Read, Write, Subscribe and Invoke requests over fresh exchanges and
//! maintains a local cache of values observed through subscriptions. Each
//! operation acquires its own exchange from the [`ExchangeProvider`] and
//! releases it on every exit path.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::error;

use crate::dm::{Attribute, Command, ResponseCodec, TlvCodec};
use crate::error::{Error, ErrorCode};
use crate::tlv::{get_root_node_struct, FromTLV, TLVElement, TLVWriter, TagType};
use crate::transport::exchange::{Exchange, ExchangeProvider};
use crate::utils::storage::WriteBuf;

use super::subscription::{ReportListener, SubscriptionManager};
use super::{
    decode_attr_path_key, AttrPath, AttrPathKey, AttrReport, AttrStatus, CmdData, CmdPath,
    IMStatusCode, ImMessenger, InvokeReqMsg, InvokeRespMsg, InvokeResult, OpCode, ReadReqMsg,
    ReportDataMsg, StatusRespMsg, SubscribeReqMsg, SubscribeRespMsg, TimedReqMsg, WriteItem,
    WriteReqMsg, WriteRespMsg,
};

/// A cached attribute value: anonymous-tagged TLV bytes plus the cluster
/// data version that reported it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValue {
    pub data: Vec<u8>,
    pub version: u32,
}

/// The Interaction Model client for one established session.
///
/// Reads prefer the local cache, which only subscriptions populate; writes
/// never touch it.
pub struct InteractionClient<'a, P: ExchangeProvider> {
    provider: P,
    subscriptions: &'a SubscriptionManager,
    cache: Rc<RefCell<HashMap<AttrPathKey, CachedValue>>>,
}

impl<'a, P: ExchangeProvider> InteractionClient<'a, P> {
    pub fn new(provider: P, subscriptions: &'a SubscriptionManager) -> Self {
        Self {
            provider,
            subscriptions,
            cache: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Read every attribute of the peer (wildcard read).
    pub async fn get_all_attributes(&self) -> Result<Vec<AttrReport>, Error> {
        self.get_multiple_attributes(&[AttrPath::WILDCARD]).await
    }

    /// Read a set of attribute paths, reassembling chunked reports.
    pub async fn get_multiple_attributes(
        &self,
        paths: &[AttrPath],
    ) -> Result<Vec<AttrReport>, Error> {
        let exchange = self.provider.initiate().await?;
        let mut messenger = ImMessenger::new(exchange);
        let result = self.read_with(&mut messenger, paths).await;
        messenger.close();
        result
    }

    /// Read one attribute, preferring the local subscription cache.
    ///
    /// A cache hit answers without any network traffic. A network read
    /// returning more than one report is a protocol violation.
    pub async fn get<T: TlvCodec>(
        &self,
        endpoint: u16,
        cluster: u32,
        attr: &Attribute<T>,
    ) -> Result<T, Error> {
        let key = AttrPath::new(endpoint, cluster, attr.id).key();
        if let Some(cached) = self.cache.borrow().get(&key) {
            return T::decode(&TLVElement::new(&cached.data));
        }

        let reports = self
            .get_multiple_attributes(&[AttrPath::new(endpoint, cluster, attr.id)])
            .await?;

        if reports.len() > 1 {
            error!("Single-path read returned {} reports", reports.len());
            return Err(ErrorCode::Invalid.into());
        }
        let report = reports.into_iter().next().ok_or(ErrorCode::Invalid)?;
        if let Some(status) = report.status {
            return Err(ErrorCode::ImStatus(status).into());
        }
        let value = report.value.ok_or(ErrorCode::Invalid)?;
        T::decode(&TLVElement::new(&value))
    }

    /// Write one attribute. The cache is not updated; only a subsequent
    /// subscription report can re-populate it.
    pub async fn set<T: TlvCodec>(
        &self,
        endpoint: u16,
        cluster: u32,
        attr: &Attribute<T>,
        value: &T,
        data_version: Option<u32>,
    ) -> Result<(), Error> {
        let item = WriteItem {
            path: AttrPath::new(endpoint, cluster, attr.id),
            data: encode_value(value)?,
            data_version,
        };

        let failed = self.set_multiple_attributes(vec![item]).await?;
        if let Some(failure) = failed.into_iter().next() {
            return Err(ErrorCode::ImStatus(failure.status).into());
        }
        Ok(())
    }

    /// Write a set of attributes; returns only the entries the peer did not
    /// accept (an all-success response yields an empty list).
    pub async fn set_multiple_attributes(
        &self,
        items: Vec<WriteItem>,
    ) -> Result<Vec<AttrStatus>, Error> {
        self.write_internal(items, None).await
    }

    /// Like [`set_multiple_attributes`](Self::set_multiple_attributes), as a
    /// timed interaction.
    pub async fn set_multiple_attributes_timed(
        &self,
        items: Vec<WriteItem>,
        timeout_ms: u16,
    ) -> Result<Vec<AttrStatus>, Error> {
        self.write_internal(items, Some(timeout_ms)).await
    }

    /// Subscribe to one attribute. The listener receives the decoded value
    /// and its data version for the initial (primed) report and every
    /// subsequent one; each delivery also updates the local cache.
    pub async fn subscribe<T: TlvCodec + 'static>(
        &self,
        endpoint: u16,
        cluster: u32,
        attr: &Attribute<T>,
        min_interval_floor: u16,
        max_interval_ceiling: u16,
        mut listener: impl FnMut(T, u32) + 'static,
    ) -> Result<u32, Error> {
        let path = AttrPath::new(endpoint, cluster, attr.id);
        let cache = Rc::clone(&self.cache);

        let internal: ReportListener = Box::new(move |reports: &[AttrReport]| {
            if reports.len() != 1 {
                error!(
                    "Single-attribute subscription delivered {} entries",
                    reports.len()
                );
                return Err(ErrorCode::Invalid.into());
            }
            let report = &reports[0];
            let value = report.value.as_ref().ok_or(ErrorCode::Invalid)?;
            let (endpoint, cluster, attr) = decode_attr_path_key(&report.path)?;

            let decoded = T::decode(&TLVElement::new(value))?;
            let version = report.data_version.unwrap_or(0);

            cache.borrow_mut().insert(
                (None, Some(endpoint), Some(cluster), Some(attr)),
                CachedValue {
                    data: value.clone(),
                    version,
                },
            );
            listener(decoded, version);
            Ok(())
        });

        self.subscribe_internal(
            &[path],
            min_interval_floor,
            max_interval_ceiling,
            internal,
        )
        .await
    }

    /// Subscribe to a set of paths. The listener receives every report's
    /// decoded entry list (which may be empty); valued entries update the
    /// cache individually.
    pub async fn subscribe_multiple_attributes(
        &self,
        paths: &[AttrPath],
        min_interval_floor: u16,
        max_interval_ceiling: u16,
        mut listener: impl FnMut(&[AttrReport]) + 'static,
    ) -> Result<u32, Error> {
        let cache = Rc::clone(&self.cache);

        let internal: ReportListener = Box::new(move |reports: &[AttrReport]| {
            for report in reports {
                if let (Some(value), Ok((endpoint, cluster, attr))) =
                    (&report.value, decode_attr_path_key(&report.path))
                {
                    cache.borrow_mut().insert(
                        (None, Some(endpoint), Some(cluster), Some(attr)),
                        CachedValue {
                            data: value.clone(),
                            version: report.data_version.unwrap_or(0),
                        },
                    );
                }
            }
            listener(reports);
            Ok(())
        });

        self.subscribe_internal(paths, min_interval_floor, max_interval_ceiling, internal)
            .await
    }

    /// Invoke a command and decode its response per the command descriptor.
    pub async fn invoke<Req: TlvCodec, Resp: ResponseCodec>(
        &self,
        endpoint: u16,
        cluster: u32,
        command: &Command<Req, Resp>,
        request: &Req,
    ) -> Result<Resp, Error> {
        self.invoke_internal(endpoint, cluster, command, request, None)
            .await
    }

    /// Like [`invoke`](Self::invoke), as a timed interaction.
    pub async fn invoke_timed<Req: TlvCodec, Resp: ResponseCodec>(
        &self,
        endpoint: u16,
        cluster: u32,
        command: &Command<Req, Resp>,
        request: &Req,
        timeout_ms: u16,
    ) -> Result<Resp, Error> {
        self.invoke_internal(endpoint, cluster, command, request, Some(timeout_ms))
            .await
    }

    async fn read_with<E: Exchange>(
        &self,
        messenger: &mut ImMessenger<E>,
        paths: &[AttrPath],
    ) -> Result<Vec<AttrReport>, Error> {
        messenger
            .send(
                OpCode::ReadRequest,
                &ReadReqMsg {
                    attr_requests: paths.to_vec(),
                    fabric_filtered: true,
                },
            )
            .await?;

        Self::read_reports(messenger).await
    }

    /// Reassemble a possibly chunked report stream, preserving entry order.
    ///
    /// Every non-suppressed chunk is acknowledged with a Success status; a
    /// final chunk with `suppress_response` ends the exchange silently.
    async fn read_reports<E: Exchange>(
        messenger: &mut ImMessenger<E>,
    ) -> Result<Vec<AttrReport>, Error> {
        let mut out = Vec::new();

        loop {
            let payload = messenger.read(OpCode::ReportData).await?;
            let report = ReportDataMsg::from_tlv(&get_root_node_struct(&payload)?)?;

            out.extend(report.attr_reports);

            if !report.suppress_response {
                messenger.send_status(IMStatusCode::Success).await?;
            }
            if !report.more_chunks {
                break;
            }
        }

        Ok(out)
    }

    async fn write_internal(
        &self,
        items: Vec<WriteItem>,
        timed_timeout_ms: Option<u16>,
    ) -> Result<Vec<AttrStatus>, Error> {
        let exchange = self.provider.initiate().await?;
        let mut messenger = ImMessenger::new(exchange);
        let result = self
            .write_with(&mut messenger, items, timed_timeout_ms)
            .await;
        messenger.close();
        result
    }

    async fn write_with<E: Exchange>(
        &self,
        messenger: &mut ImMessenger<E>,
        items: Vec<WriteItem>,
        timed_timeout_ms: Option<u16>,
    ) -> Result<Vec<AttrStatus>, Error> {
        if let Some(timeout_ms) = timed_timeout_ms {
            Self::send_timed_request(messenger, timeout_ms).await?;
        }

        messenger
            .send(
                OpCode::WriteRequest,
                &WriteReqMsg {
                    suppress_response: false,
                    timed_request: timed_timeout_ms.is_some(),
                    write_requests: items,
                    more_chunks: false,
                },
            )
            .await?;

        let payload = messenger.read(OpCode::WriteResponse).await?;
        let resp = WriteRespMsg::from_tlv(&get_root_node_struct(&payload)?)?;

        Ok(resp
            .write_responses
            .into_iter()
            .filter(|entry| entry.status.effective() != IMStatusCode::Success)
            .collect())
    }

    async fn subscribe_internal(
        &self,
        paths: &[AttrPath],
        min_interval_floor: u16,
        max_interval_ceiling: u16,
        listener: ReportListener,
    ) -> Result<u32, Error> {
        let exchange = self.provider.initiate().await?;
        let mut messenger = ImMessenger::new(exchange);
        let result = self
            .subscribe_with(
                &mut messenger,
                paths,
                min_interval_floor,
                max_interval_ceiling,
                listener,
            )
            .await;
        messenger.close();
        result
    }

    async fn subscribe_with<E: Exchange>(
        &self,
        messenger: &mut ImMessenger<E>,
        paths: &[AttrPath],
        min_interval_floor: u16,
        max_interval_ceiling: u16,
        listener: ReportListener,
    ) -> Result<u32, Error> {
        messenger
            .send(
                OpCode::SubscribeRequest,
                &SubscribeReqMsg {
                    keep_subscriptions: true,
                    min_interval_floor,
                    max_interval_ceiling,
                    attr_requests: paths.to_vec(),
                    fabric_filtered: true,
                },
            )
            .await?;

        // The primed report precedes the SubscribeResponse
        let initial = Self::read_reports(messenger).await?;

        let payload = messenger.read(OpCode::SubscribeResponse).await?;
        let resp = SubscribeRespMsg::from_tlv(&get_root_node_struct(&payload)?)?;

        let session_id = messenger.session_id();
        self.subscriptions.register(
            session_id,
            resp.subscription_id,
            resp.max_interval,
            listener,
        );

        // Feed the primed report through the listener synchronously; a bad
        // primed report fails the subscribe itself
        self.subscriptions
            .notify(session_id, resp.subscription_id, &initial)?;

        Ok(resp.subscription_id)
    }

    async fn invoke_internal<Req: TlvCodec, Resp: ResponseCodec>(
        &self,
        endpoint: u16,
        cluster: u32,
        command: &Command<Req, Resp>,
        request: &Req,
        timed_timeout_ms: Option<u16>,
    ) -> Result<Resp, Error> {
        let exchange = self.provider.initiate().await?;
        let mut messenger = ImMessenger::new(exchange);
        let result = self
            .invoke_with(
                &mut messenger,
                endpoint,
                cluster,
                command,
                request,
                timed_timeout_ms,
            )
            .await;
        messenger.close();
        result
    }

    async fn invoke_with<E: Exchange, Req: TlvCodec, Resp: ResponseCodec>(
        &self,
        messenger: &mut ImMessenger<E>,
        endpoint: u16,
        cluster: u32,
        command: &Command<Req, Resp>,
        request: &Req,
        timed_timeout_ms: Option<u16>,
    ) -> Result<Resp, Error> {
        if let Some(timeout_ms) = timed_timeout_ms {
            Self::send_timed_request(messenger, timeout_ms).await?;
        }

        messenger
            .send(
                OpCode::InvokeRequest,
                &InvokeReqMsg {
                    suppress_response: false,
                    timed_request: timed_timeout_ms.is_some(),
                    invoke_requests: vec![CmdData {
                        path: CmdPath::new(endpoint, cluster, command.id),
                        fields: Some(encode_value(request)?),
                    }],
                },
            )
            .await?;

        let payload = messenger.read(OpCode::InvokeResponse).await?;
        let resp = InvokeRespMsg::from_tlv(&get_root_node_struct(&payload)?)?;

        match resp.invoke_responses.into_iter().next() {
            Some(InvokeResult::Command(data)) => {
                if data.path.command != Some(command.response_id) {
                    error!(
                        "Invoke response for unexpected command {:?}",
                        data.path.command
                    );
                    return Err(ErrorCode::Invalid.into());
                }
                match data.fields {
                    Some(fields) => Resp::decode_fields(&TLVElement::new(&fields)),
                    None => Resp::from_status_success(command.optional),
                }
            }
            Some(InvokeResult::Status(status)) => {
                if status.status.effective() != IMStatusCode::Success {
                    return Err(ErrorCode::InvokeFailure(status.status).into());
                }
                Resp::from_status_success(command.optional)
            }
            None => {
                if command.optional {
                    Resp::from_status_success(true)
                } else {
                    error!("Invoke response carries no response nor result");
                    Err(ErrorCode::Invalid.into())
                }
            }
        }
    }

    async fn send_timed_request<E: Exchange>(
        messenger: &mut ImMessenger<E>,
        timeout_ms: u16,
    ) -> Result<(), Error> {
        messenger
            .send(OpCode::TimedRequest, &TimedReqMsg { timeout_ms })
            .await?;

        let payload = messenger.read(OpCode::StatusResponse).await?;
        let status = StatusRespMsg::from_tlv(&get_root_node_struct(&payload)?)?;
        if status.status != IMStatusCode::Success {
            error!("TimedRequest failed with status {:?}", status.status);
            return Err(ErrorCode::ImStatus(super::Status::new(status.status)).into());
        }
        Ok(())
    }

    /// Look into the subscription cache without touching the network.
    pub fn cached(&self, endpoint: u16, cluster: u32, attr: u32) -> Option<CachedValue> {
        self.cache
            .borrow()
            .get(&AttrPath::new(endpoint, cluster, attr).key())
            .cloned()
    }
}

fn encode_value<T: TlvCodec>(value: &T) -> Result<Vec<u8>, Error> {
    let mut buf = [0u8; 1024];
    let mut wb = WriteBuf::new(&mut buf);
    {
        let mut tw = TLVWriter::new(&mut wb);
        value.encode(&TagType::Anonymous, &mut tw)?;
    }
    Ok(wb.as_slice().to_vec())
}
