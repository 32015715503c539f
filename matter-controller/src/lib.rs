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

//! Controller-side Matter: secure session establishment and the Interaction
//! Model client.
//!
//! Two tightly coupled pieces form the core:
//!
//! - **Secure session establishment** — the PASE client
//!   ([`sc::pase::PaseClient`]) used during commissioning, and the CASE
//!   responder ([`sc::case::CaseResponder`]) that re-establishes
//!   operational sessions, with resumption.
//! - **Interaction Model client** — [`im::InteractionClient`] for reads,
//!   writes, command invocations and long-lived subscriptions, with a local
//!   cache of subscribed values, plus the shared
//!   [`im::SubscriptionReceiver`] dispatching server-initiated reports.
//!
//! Transport, MRP, certificate validation, the fabric store and the
//! session-key encryption layer are collaborators behind the seams in
//! [`transport`], [`fabric`] and [`crypto`].

#![allow(async_fn_in_trait)]
#![warn(clippy::large_futures)]

pub mod crypto;
pub mod dm;
pub mod error;
pub mod fabric;
pub mod im;
pub mod sc;
pub mod tlv;
pub mod transport;
pub mod utils;
