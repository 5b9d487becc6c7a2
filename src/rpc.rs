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
//! web3 style `eth_accounts` / `eth_sendTransaction` on top of [`EthereumApp`]

use ledger_transport::Exchange;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::params::DEFAULT_ADDRESS_COUNT;
use crate::transaction::{self, Transaction};
use crate::{Error, EthereumApp};

/// Supported JSON RPC version
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON RPC request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Request id, echoed back
    #[serde(default)]
    pub id: Value,
    /// Protocol version
    #[serde(default)]
    pub jsonrpc: String,
    /// Method name, `eth_` prefix optional
    #[serde(default)]
    pub method: String,
    /// Positional parameters
    #[serde(default)]
    pub params: Vec<Value>,
}

/// JSON RPC response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Id of the request
    pub id: Value,
    /// Protocol version
    pub jsonrpc: String,
    /// Method result
    pub result: Value,
}

/// Ethereum RPC methods backed by a Ledger device
pub struct EthereumRpc<E> {
    app: EthereumApp<E>,
}

impl<E> EthereumRpc<E> {
    /// Serves requests with `app`
    pub fn new(app: EthereumApp<E>) -> Self {
        EthereumRpc { app }
    }

    /// Underlying app
    pub fn app(&self) -> &EthereumApp<E> {
        &self.app
    }
}

impl<E> EthereumRpc<E>
where
    E: Exchange + Send + Sync,
    Error: From<E::Error>,
{
    /// First addresses of the wallet, `0x` prefixed
    pub async fn accounts(&self) -> Result<Vec<String>, Error> {
        let addresses = self.app.list_addresses(0, DEFAULT_ADDRESS_COUNT).await?;
        Ok(addresses
            .into_iter()
            .map(|address| format!("0x{}", address))
            .collect())
    }

    /// Signs `tx` and returns the signed transaction as hex
    pub async fn send_transaction(&self, tx: &Transaction) -> Result<String, Error> {
        let unsigned = transaction::encode(tx)?;
        let signature = self.app.sign(&unsigned).await?;
        transaction::encode_hex(&tx.with_signature(&signature))
    }

    /// Dispatches a JSON RPC request
    pub async fn handle(&self, request: &RpcRequest) -> Result<RpcResponse, Error> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Err(Error::UnsupportedVersion(request.jsonrpc.clone()));
        }

        let method = request
            .method
            .strip_prefix("eth_")
            .unwrap_or(&request.method);
        debug!(method, "rpc request");

        let result = match method {
            "accounts" => serde_json::to_value(self.accounts().await?)?,
            "sendTransaction" => {
                let tx = request.params.first().ok_or_else(|| {
                    Error::InvalidParams("expected a transaction object".to_owned())
                })?;
                let tx: Transaction = serde_json::from_value(tx.clone())?;
                Value::String(self.send_transaction(&tx).await?)
            }
            _ => return Err(Error::UnknownMethod(request.method.clone())),
        };

        Ok(RpcResponse {
            id: request.id.clone(),
            jsonrpc: JSONRPC_VERSION.to_owned(),
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Deref;

    use async_trait::async_trait;
    use ledger_transport::{APDUAnswer, APDUCommand};
    use serde_json::json;

    use super::*;

    // answers every command with the same bytes
    struct Canned(Vec<u8>);

    #[async_trait]
    impl Exchange for Canned {
        type Error = Error;
        type AnswerType = Vec<u8>;

        async fn exchange<I>(
            &self,
            _command: &APDUCommand<I>,
        ) -> Result<APDUAnswer<Self::AnswerType>, Self::Error>
        where
            I: Deref<Target = [u8]> + Send + Sync,
        {
            APDUAnswer::from_answer(self.0.clone()).map_err(|_| Error::MalformedResponse)
        }
    }

    fn address_rpc() -> EthereumRpc<Canned> {
        let mut answer = vec![0x1a; 5];
        answer.push(4);
        answer.extend_from_slice(&[0x12, 0x34, 0x56, 0x78]);
        answer.push(9);
        answer.extend_from_slice(b"{Address}");
        answer.extend_from_slice(&[0x90, 0x00]);
        EthereumRpc::new(EthereumApp::new(Canned(answer)))
    }

    fn request(value: Value) -> RpcRequest {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn rejects_other_versions() {
        let rpc = address_rpc();
        let err = rpc.handle(&request(json!({"jsonrpc": "1.0"}))).await;
        assert!(matches!(err, Err(Error::UnsupportedVersion(v)) if v == "1.0"));
    }

    #[tokio::test]
    async fn rejects_unknown_methods() {
        let rpc = address_rpc();
        let err = rpc
            .handle(&request(
                json!({"id": "abc123", "jsonrpc": "2.0", "method": "eth_hello", "params": []}),
            ))
            .await;
        assert!(matches!(err, Err(Error::UnknownMethod(m)) if m == "eth_hello"));
    }

    #[tokio::test]
    async fn accounts() {
        let rpc = address_rpc();
        let response = rpc
            .handle(&request(
                json!({"id": "abc123", "jsonrpc": "2.0", "method": "eth_accounts", "params": []}),
            ))
            .await
            .unwrap();

        assert_eq!(response.id, json!("abc123"));
        assert_eq!(response.jsonrpc, "2.0");
        assert_eq!(response.result, json!(vec!["0x{Address}"; 5]));
    }

    #[tokio::test]
    async fn send_transaction_needs_params() {
        let rpc = address_rpc();
        let err = rpc
            .handle(&request(
                json!({"id": 1, "jsonrpc": "2.0", "method": "sendTransaction"}),
            ))
            .await;
        assert!(matches!(err, Err(Error::InvalidParams(_))));
    }
}
