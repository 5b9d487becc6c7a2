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
//! APDU exchange tunnelled through U2F authentication requests
//!
//! The Ethereum app answers U2F `sign` requests whose key handle is an APDU
//! scrambled with [`APDU_KEY`]. The response APDU, status word included, comes
//! back as the U2F signature data.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use ledger_transport::{APDUAnswer, APDUCommand, Exchange};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::params::{APDU_KEY, CHALLENGE, DEFAULT_TIMEOUT_SECS, U2F_VERSION};
use crate::Error;

/// URL-safe base64, unpadded on output, padding optional on input
pub const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Error codes of the U2F `sign` API
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum U2fErrorCode {
    /// 0
    #[error("OK: The operation completed successfully.")]
    Ok,
    /// 1
    #[error("Unknown Error: An unknown error occurred.")]
    OtherError,
    /// 2
    #[error("Bad Request: The request could not be processed.")]
    BadRequest,
    /// 3
    #[error("Unsupported Configuration: The client configuration is not supported.")]
    ConfigurationUnsupported,
    /// 4
    #[error("Ineligible Device: The presented device is not eligible for this request.")]
    DeviceIneligible,
    /// 5
    #[error("Timeout: The timeout was reached before the request could be satisfied.")]
    Timeout,
}

impl From<u16> for U2fErrorCode {
    fn from(code: u16) -> Self {
        match code {
            0 => U2fErrorCode::Ok,
            2 => U2fErrorCode::BadRequest,
            3 => U2fErrorCode::ConfigurationUnsupported,
            4 => U2fErrorCode::DeviceIneligible,
            5 => U2fErrorCode::Timeout,
            _ => U2fErrorCode::OtherError,
        }
    }
}

/// Key handle entry of a U2F sign request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredKey {
    /// Base64url key handle
    pub key_handle: String,
    /// Protocol version tag
    pub version: String,
}

/// The U2F `sign` capability, e.g. a browser's `u2f` object or a test double.
///
/// Resolves to the base64url signature data, or to the U2F error code.
#[async_trait]
pub trait U2fSigner: Send + Sync {
    /// Performs one U2F authentication
    async fn sign(
        &self,
        app_id: &str,
        challenge: &str,
        registered_keys: &[RegisteredKey],
        timeout: Duration,
    ) -> Result<String, U2fErrorCode>;
}

#[async_trait]
impl<S> U2fSigner for Arc<S>
where
    S: U2fSigner + ?Sized,
{
    async fn sign(
        &self,
        app_id: &str,
        challenge: &str,
        registered_keys: &[RegisteredKey],
        timeout: Duration,
    ) -> Result<String, U2fErrorCode> {
        (**self)
            .sign(app_id, challenge, registered_keys, timeout)
            .await
    }
}

/// XORs `apdu` with the repeating [`APDU_KEY`]. Applying it twice is a no-op.
pub fn scramble(apdu: &[u8]) -> Vec<u8> {
    apdu.iter()
        .zip(APDU_KEY.iter().cycle())
        .map(|(byte, key)| byte ^ key)
        .collect()
}

/// Ledger exchange over a [`U2fSigner`]
pub struct TransportU2F<S> {
    signer: S,
    app_id: String,
    timeout: Duration,
}

impl<S> TransportU2F<S>
where
    S: U2fSigner,
{
    /// Creates a transport for `app_id`, the origin the U2F layer signs for
    pub fn new(signer: S, app_id: impl Into<String>) -> Result<Self, Error> {
        let app_id = app_id.into();
        if app_id.is_empty() {
            return Err(Error::ArgumentError("appId".to_owned()));
        }

        Ok(TransportU2F {
            signer,
            app_id,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Sets how long each U2F request may wait for the device
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Application identifier
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Per request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<S> Exchange for TransportU2F<S>
where
    S: U2fSigner,
{
    type Error = Error;
    type AnswerType = Vec<u8>;

    async fn exchange<I>(
        &self,
        command: &APDUCommand<I>,
    ) -> Result<APDUAnswer<Self::AnswerType>, Self::Error>
    where
        I: Deref<Target = [u8]> + Send + Sync,
    {
        let key_handle = URL_SAFE_LENIENT.encode(scramble(&command.serialize()));
        trace!(%key_handle, "u2f key handle");

        let registered_keys = [RegisteredKey {
            key_handle,
            version: U2F_VERSION.to_owned(),
        }];
        let signature_data = self
            .signer
            .sign(&self.app_id, CHALLENGE, &registered_keys, self.timeout)
            .await?;

        let answer = URL_SAFE_LENIENT.decode(signature_data.as_bytes())?;
        debug!(len = answer.len(), "u2f signature data received");

        APDUAnswer::from_answer(answer).map_err(|_| Error::MalformedResponse)
    }
}
