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
//! Support library for the Ledger Ethereum app reached through U2F
//!
//! APDUs are scrambled into U2F key handles and sent with the host's U2F
//! `sign` capability ([`U2fSigner`]). [`EthereumApp`] retrieves addresses and
//! signs transactions, [`EthereumRpc`] exposes both as web3 style methods.

#![deny(warnings, trivial_casts, trivial_numeric_casts)]
#![deny(unused_import_braces, unused_qualifications)]
#![deny(missing_docs)]
#![doc(html_root_url = "https://docs.rs/ledger-ethereum-u2f/0.1.0")]

use futures::future::try_join_all;
use tracing::debug;

pub mod address;
pub mod apdu;
pub mod config;
pub mod hexstr;
pub mod params;
pub mod path;
pub mod rpc;
pub mod sign;
pub mod transaction;
pub mod u2f;

pub use address::Address;
pub use config::DeviceConfig;
pub use ledger_transport::{APDUAnswer, APDUCommand, Exchange};
pub use params::DeviceStatus;
pub use path::DerivationPath;
pub use rpc::EthereumRpc;
pub use sign::Signature;
pub use transaction::Transaction;
pub use u2f::{RegisteredKey, TransportU2F, U2fErrorCode, U2fSigner};

/// Ledger App Error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required setting is missing
    #[error("ArgumentError: Missing required parameter(s): {0}")]
    ArgumentError(String),

    /// The derivation is invalid
    #[error("invalid derivation path")]
    InvalidDerivationPath,

    /// The response is shorter than its layout requires
    #[error("malformed device response")]
    MalformedResponse,

    /// The device is locked
    #[error("DeviceLocked: Unlock your Ledger device and try again.")]
    DeviceLocked,

    /// The user rejected the request on the device
    #[error("Cancelled: The operation was cancelled via the Ledger device.")]
    UserCancelled,

    /// Any other status word
    #[error("UnknownError: Status Code 0x{0:04x}")]
    UnknownStatus(u16),

    /// The U2F layer reported an error
    #[error("{0}")]
    U2f(#[from] U2fErrorCode),

    /// Nothing was sent, so there is no answer
    #[error("no APDU was sent")]
    NoResponse,

    /// A transaction field or encoding is invalid
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// JSON RPC version other than 2.0
    #[error("UnsupportedVersion: Expected JSON RPC version 2.0, got {0} instead.")]
    UnsupportedVersion(String),

    /// JSON RPC method not provided
    #[error("unsupported method: {0}")]
    UnknownMethod(String),

    /// JSON RPC params do not fit the method
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Hex decoding error
    #[error("Hex error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Base64 decoding error
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// RLP decoding error
    #[error("RLP error: {0}")]
    Rlp(#[from] rlp::DecoderError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Public key parsing error
    #[error("Secp256k1 error: {0}")]
    Secp256k1(#[from] k256::elliptic_curve::Error),

    /// Signature parsing error
    #[error("Ecdsa error: {0}")]
    Ecdsa(#[from] k256::ecdsa::Error),
}

/// Ethereum App
pub struct EthereumApp<E> {
    transport: E,
    path: DerivationPath,
    account_index: u32,
}

impl<E> EthereumApp<E> {
    /// Wraps `transport`, using the default path and account 0
    pub fn new(transport: E) -> Self {
        EthereumApp {
            transport,
            path: DerivationPath::default(),
            account_index: 0,
        }
    }

    /// Sets the base derivation path
    pub fn with_path(mut self, path: DerivationPath) -> Self {
        self.path = path;
        self
    }

    /// Sets the account used by [`sign`](Self::sign)
    pub fn with_account_index(mut self, account_index: u32) -> Self {
        self.account_index = account_index;
        self
    }

    /// Underlying transport
    pub fn transport(&self) -> &E {
        &self.transport
    }

    /// Base derivation path
    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    /// Signing account
    pub fn account_index(&self) -> u32 {
        self.account_index
    }
}

impl<S> EthereumApp<TransportU2F<S>>
where
    S: U2fSigner,
{
    /// Connects through `signer` with the given settings
    pub fn connect(signer: S, config: &DeviceConfig) -> Result<Self, Error> {
        config.validate()?;
        let transport = TransportU2F::new(signer, config.app_id.clone())?
            .with_timeout(config.timeout());

        Ok(EthereumApp::new(transport)
            .with_path(config.path.clone())
            .with_account_index(config.account_index))
    }
}

impl<E> EthereumApp<E>
where
    E: Exchange + Send + Sync,
    Error: From<E::Error>,
{
    /// Retrieves the public key and address of account `index`
    pub async fn address(&self, index: u32) -> Result<Address, Error> {
        let path = self.path.derive_account(index)?;
        debug!(%path, "get address");

        let command = address::request(&path);
        let response = apdu::transmit(&self.transport, &[command]).await?;
        address::parse_response(response.data())
    }

    /// Address of account `index`, hex digits without `0x`
    pub async fn get_address(&self, index: u32) -> Result<String, Error> {
        Ok(self.address(index).await?.address)
    }

    /// Addresses of accounts `offset..offset + count`, in index order
    pub async fn list_addresses(&self, offset: u32, count: u32) -> Result<Vec<String>, Error> {
        let requests = (0..count).map(move |i| async move {
            let index = offset.checked_add(i).ok_or(Error::InvalidDerivationPath)?;
            self.get_address(index).await
        });
        try_join_all(requests).await
    }

    /// Sign a transaction
    pub async fn sign(&self, message: &[u8]) -> Result<Signature, Error> {
        let path = self.path.derive_account(self.account_index)?;
        let commands = sign::requests(&path, message);
        debug!(%path, chunks = commands.len(), "sign transaction");

        let response = apdu::transmit(&self.transport, &commands).await?;
        sign::parse_response(response.data())
    }
}
