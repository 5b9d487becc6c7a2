/*******************************************************************************
*   (c) 2020 ZondaX GmbH
*
*  Licensed under the Apache License, Version 2.0 (the "License");
*  you may not use this file except in compliance with the License.
*  You may obtain a copy of the License at
*
*      http://www.apache.org/licenses/LICENSE-2.0
*
*  Unless required by applicable law or agreed to in writing, software
*  distributed under the License is distributed on an "AS IS" BASIS,
*  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
*  See the License for the specific language governing permissions and
*  limitations under the License.
********************************************************************************/
//! Device settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::params::DEFAULT_TIMEOUT_SECS;
use crate::path::DerivationPath;
use crate::Error;

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Settings captured when an [`EthereumApp`](crate::EthereumApp) is created
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    /// Origin the U2F requests are made for
    #[serde(default)]
    pub app_id: String,

    /// Base path, the account index is added to its last segment
    #[serde(default)]
    pub path: DerivationPath,

    /// Account used for signing
    #[serde(default)]
    pub account_index: u32,

    /// Seconds each U2F request may wait for the device
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl DeviceConfig {
    /// Default settings for `app_id`
    pub fn new(app_id: impl Into<String>) -> Self {
        DeviceConfig {
            app_id: app_id.into(),
            path: DerivationPath::default(),
            account_index: 0,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Checks that the required settings are present
    pub fn validate(&self) -> Result<(), Error> {
        if self.app_id.is_empty() {
            return Err(Error::ArgumentError("appId".to_owned()));
        }
        Ok(())
    }

    /// Per request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
