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

//! Client facade for the OnOff cluster (0x0006).
//!
//! The pattern for generated cluster modules: `const` attribute/command
//! descriptors plus a stateless wrapper binding them to an
//! [`InteractionClient`] and an endpoint.

use crate::dm::{Attribute, Command, NoResponse};
use crate::error::Error;
use crate::im::InteractionClient;
use crate::transport::exchange::ExchangeProvider;

pub const CLUSTER_ID: u32 = 0x0006;

pub const ON_OFF: Attribute<bool> = Attribute::new(0x0000);
pub const GLOBAL_SCENE_CONTROL: Attribute<bool> = Attribute::new(0x4000);
pub const ON_TIME: Attribute<u16> = Attribute::new(0x4001);
pub const OFF_WAIT_TIME: Attribute<u16> = Attribute::new(0x4002);
pub const START_UP_ON_OFF: Attribute<u8> = Attribute::new(0x4003);

pub const CMD_OFF: Command<(), NoResponse> = Command::new(0x00, 0x00, false);
pub const CMD_ON: Command<(), NoResponse> = Command::new(0x01, 0x01, false);
pub const CMD_TOGGLE: Command<(), NoResponse> = Command::new(0x02, 0x02, false);

/// A typed OnOff cluster client bound to one endpoint.
pub struct OnOffClient<'a, 'b, P: ExchangeProvider> {
    client: &'b InteractionClient<'a, P>,
    endpoint: u16,
}

impl<'a, 'b, P: ExchangeProvider> OnOffClient<'a, 'b, P> {
    pub fn new(client: &'b InteractionClient<'a, P>, endpoint: u16) -> Self {
        Self { client, endpoint }
    }

    pub async fn on_off(&self) -> Result<bool, Error> {
        self.client.get(self.endpoint, CLUSTER_ID, &ON_OFF).await
    }

    pub async fn set_on_off(&self, on: bool) -> Result<(), Error> {
        self.client
            .set(self.endpoint, CLUSTER_ID, &ON_OFF, &on, None)
            .await
    }

    pub async fn subscribe_on_off(
        &self,
        min_interval_floor: u16,
        max_interval_ceiling: u16,
        listener: impl FnMut(bool, u32) + 'static,
    ) -> Result<u32, Error> {
        self.client
            .subscribe(
                self.endpoint,
                CLUSTER_ID,
                &ON_OFF,
                min_interval_floor,
                max_interval_ceiling,
                listener,
            )
            .await
    }

    pub async fn start_up_on_off(&self) -> Result<u8, Error> {
        self.client
            .get(self.endpoint, CLUSTER_ID, &START_UP_ON_OFF)
            .await
    }

    pub async fn on(&self) -> Result<(), Error> {
        self.client
            .invoke(self.endpoint, CLUSTER_ID, &CMD_ON, &())
            .await
            .map(|_| ())
    }

    pub async fn off(&self) -> Result<(), Error> {
        self.client
            .invoke(self.endpoint, CLUSTER_ID, &CMD_OFF, &())
            .await
            .map(|_| ())
    }

    pub async fn toggle(&self) -> Result<(), Error> {
        self.client
            .invoke(self.endpoint, CLUSTER_ID, &CMD_TOGGLE, &())
            .await
            .map(|_| ())
    }
}
