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

//! Dispatch of server-initiated data reports to subscription listeners.
//!
//! A single [`SubscriptionManager`] is shared by all interaction clients and
//! the one [`SubscriptionReceiver`] the embedder registers for the
//! interaction protocol; listeners are keyed by `(session id,
//! subscription id)` so reports can never leak across sessions.

use std::cell::RefCell;
use std::collections::HashMap;

use log::error;

use crate::error::{Error, ErrorCode};
use crate::im::{AttrReport, IMStatusCode, ImMessenger, OpCode, ReportDataMsg};
use crate::tlv::{get_root_node_struct, FromTLV};
use crate::transport::exchange::Exchange;

/// A subscription listener; errors are the Rust shape of listener failure
/// and never tear down the receiver.
pub type ReportListener = Box<dyn FnMut(&[AttrReport]) -> Result<(), Error>>;

struct SubscriptionEntry {
    #[allow(dead_code)]
    max_interval: u16,
    listener: ReportListener,
}

/// The listener registry for all active subscriptions.
///
/// Listeners must not re-enter `subscribe`/`notify` from within a callback;
/// dispatch holds the registry borrow while a listener runs.
#[derive(Default)]
pub struct SubscriptionManager {
    listeners: RefCell<HashMap<(u16, u32), SubscriptionEntry>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. A duplicate subscription id from the peer
    /// overwrites the previous listener.
    pub(crate) fn register(
        &self,
        session_id: u16,
        subscription_id: u32,
        max_interval: u16,
        listener: ReportListener,
    ) {
        self.listeners.borrow_mut().insert(
            (session_id, subscription_id),
            SubscriptionEntry {
                max_interval,
                listener,
            },
        );
    }

    pub fn contains(&self, session_id: u16, subscription_id: u32) -> bool {
        self.listeners
            .borrow()
            .contains_key(&(session_id, subscription_id))
    }

    /// Invoke the listener for a subscription, propagating its error.
    pub(crate) fn notify(
        &self,
        session_id: u16,
        subscription_id: u32,
        reports: &[AttrReport],
    ) -> Result<(), Error> {
        let mut listeners = self.listeners.borrow_mut();
        let entry = listeners
            .get_mut(&(session_id, subscription_id))
            .ok_or(ErrorCode::InvalidSubscription)?;
        (entry.listener)(reports)
    }

    /// Drop every subscription of a session. Subscriptions live exactly as
    /// long as their session; the embedder calls this on session teardown.
    pub fn remove_session(&self, session_id: u16) {
        self.listeners
            .borrow_mut()
            .retain(|(sid, _), _| *sid != session_id);
    }
}

/// The inbound handler for the interaction protocol.
pub struct SubscriptionReceiver<'a> {
    subscriptions: &'a SubscriptionManager,
}

impl<'a> SubscriptionReceiver<'a> {
    pub fn new(subscriptions: &'a SubscriptionManager) -> Self {
        Self { subscriptions }
    }

    /// Handle one inbound interaction exchange carrying a data report.
    ///
    /// Reports without a known subscription id are answered with an
    /// `InvalidSubscription` status; valid reports are acknowledged before
    /// the listener runs, and a failing listener is logged without
    /// affecting other subscriptions.
    pub async fn handle<E: Exchange>(&self, exchange: E) -> Result<(), Error> {
        let mut messenger = ImMessenger::new(exchange);
        let result = self.dispatch(&mut messenger).await;
        messenger.close();
        result
    }

    async fn dispatch<E: Exchange>(&self, messenger: &mut ImMessenger<E>) -> Result<(), Error> {
        let payload = messenger.read(OpCode::ReportData).await?;
        let report = ReportDataMsg::from_tlv(&get_root_node_struct(&payload)?)?;

        let Some(subscription_id) = report.subscription_id else {
            error!("Data report without a subscription id");
            messenger
                .send_status(IMStatusCode::InvalidSubscription)
                .await?;
            return Err(ErrorCode::InvalidSubscription.into());
        };

        let session_id = messenger.session_id();

        if !self.subscriptions.contains(session_id, subscription_id) {
            error!(
                "Data report for unknown subscription {} on session {}",
                subscription_id, session_id
            );
            messenger
                .send_status(IMStatusCode::InvalidSubscription)
                .await?;
            return Err(ErrorCode::InvalidSubscription.into());
        }

        if !report.suppress_response {
            messenger.send_status(IMStatusCode::Success).await?;
        }

        if let Err(e) =
            self.subscriptions
                .notify(session_id, subscription_id, &report.attr_reports)
        {
            // A single bad report must not kill the other subscriptions
            error!(
                "Listener for subscription {} failed: {:?}",
                subscription_id, e
            );
        }

        Ok(())
    }
}
