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
//! Legacy Ethereum transaction encoding
//!
//! The same encoder produces the payload handed to the device and, once the
//! signature is merged back in, the signed wire transaction. Values are taken
//! verbatim from their hex strings, so both encodings share the byte layout
//! of every field except `v`, `r` and `s`.

use rlp::{Rlp, RlpStream};
use serde::{Deserialize, Serialize};

use crate::hexstr;
use crate::sign::Signature;
use crate::Error;

/// Transaction as handed over by a web3 caller, every value a hex string
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Sender nonce
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Gas price in wei
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    /// Gas limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<String>,
    /// Gas limit as named by web3, used when `gas_limit` is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    /// Recipient, absent for contract creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Amount in wei
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Call data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Call data as named by web3, used when `data` is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Recovery id, or the chain id before signing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<String>,
    /// Signature r
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<String>,
    /// Signature s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<String>,
}

impl Transaction {
    /// Value of the field called `name`. Empty strings count as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "nonce" => &self.nonce,
            "gasPrice" => &self.gas_price,
            "gasLimit" => &self.gas_limit,
            "gas" => &self.gas,
            "to" => &self.to,
            "value" => &self.value,
            "data" => &self.data,
            "input" => &self.input,
            "v" => &self.v,
            "r" => &self.r,
            "s" => &self.s,
            _ => return None,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }

    fn slot(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "nonce" => Some(&mut self.nonce),
            "gasPrice" => Some(&mut self.gas_price),
            "gasLimit" => Some(&mut self.gas_limit),
            "to" => Some(&mut self.to),
            "value" => Some(&mut self.value),
            "data" => Some(&mut self.data),
            "v" => Some(&mut self.v),
            "r" => Some(&mut self.r),
            "s" => Some(&mut self.s),
            _ => None,
        }
    }

    /// Copy of this transaction carrying `signature`
    pub fn with_signature(&self, signature: &Signature) -> Transaction {
        Transaction {
            v: Some(signature.v_hex()),
            r: Some(signature.r_hex()),
            s: Some(signature.s_hex()),
            ..self.clone()
        }
    }
}

/// Static description of one transaction field
#[derive(Clone, Copy, Debug)]
pub struct TransactionField {
    /// Canonical name
    pub name: &'static str,
    /// Alternative name used by some callers
    pub alias: Option<&'static str>,
    /// Upper bound, and exact length unless relaxed below
    pub fixed_length: Option<usize>,
    /// An empty value is accepted
    pub allow_zero_length: bool,
    /// Leading zero bytes may be omitted
    pub allow_shorter: bool,
    /// Encoded when the field is absent
    pub default: &'static [u8],
}

impl TransactionField {
    fn check(&self, bytes: &[u8]) -> Result<(), Error> {
        let len = match self.fixed_length {
            Some(len) => len,
            None => return Ok(()),
        };

        if bytes.len() > len {
            return Err(Error::InvalidTransaction(format!(
                "{} is longer than {} bytes",
                self.name, len
            )));
        }
        let empty_ok = self.allow_zero_length && bytes.is_empty();
        if bytes.len() < len && !self.allow_shorter && !empty_ok {
            return Err(Error::InvalidTransaction(format!(
                "{} must be {} bytes",
                self.name, len
            )));
        }
        Ok(())
    }

    fn resolve(&self, transaction: &Transaction) -> Result<Vec<u8>, Error> {
        let value = transaction
            .get(self.name)
            .or_else(|| self.alias.and_then(|alias| transaction.get(alias)));
        match value {
            Some(value) => {
                let bytes = hexstr::to_bytes(value)?;
                self.check(&bytes)?;
                Ok(bytes)
            }
            None => Ok(self.default.to_vec()),
        }
    }
}

/// Fields in wire order
pub const FIELDS: [TransactionField; 9] = [
    TransactionField {
        name: "nonce",
        alias: None,
        fixed_length: Some(32),
        allow_zero_length: false,
        allow_shorter: true,
        default: &[],
    },
    TransactionField {
        name: "gasPrice",
        alias: None,
        fixed_length: Some(32),
        allow_zero_length: false,
        allow_shorter: true,
        default: &[],
    },
    TransactionField {
        name: "gasLimit",
        alias: Some("gas"),
        fixed_length: Some(32),
        allow_zero_length: false,
        allow_shorter: true,
        default: &[],
    },
    TransactionField {
        name: "to",
        alias: None,
        fixed_length: Some(20),
        allow_zero_length: true,
        allow_shorter: false,
        default: &[],
    },
    TransactionField {
        name: "value",
        alias: None,
        fixed_length: Some(32),
        allow_zero_length: false,
        allow_shorter: true,
        default: &[],
    },
    TransactionField {
        name: "data",
        alias: Some("input"),
        fixed_length: None,
        allow_zero_length: true,
        allow_shorter: false,
        default: &[],
    },
    TransactionField {
        name: "v",
        alias: None,
        fixed_length: None,
        allow_zero_length: true,
        allow_shorter: false,
        default: &[0x01],
    },
    TransactionField {
        name: "r",
        alias: None,
        fixed_length: Some(32),
        allow_zero_length: true,
        allow_shorter: true,
        default: &[],
    },
    TransactionField {
        name: "s",
        alias: None,
        fixed_length: Some(32),
        allow_zero_length: true,
        allow_shorter: true,
        default: &[],
    },
];

/// RLP encodes the nine fields of `transaction`, defaulting absent ones
pub fn encode(transaction: &Transaction) -> Result<Vec<u8>, Error> {
    let mut stream = RlpStream::new_list(FIELDS.len());
    for field in FIELDS.iter() {
        let bytes = field.resolve(transaction)?;
        stream.append(&bytes);
    }
    Ok(stream.out().to_vec())
}

/// [`encode`] rendered as lowercase hex, no prefix
pub fn encode_hex(transaction: &Transaction) -> Result<String, Error> {
    Ok(hex::encode(encode(transaction)?))
}

/// Parses a nine item RLP list back into a [`Transaction`]
pub fn decode(bytes: &[u8]) -> Result<Transaction, Error> {
    let rlp = Rlp::new(bytes);
    if !rlp.is_list() {
        return Err(Error::InvalidTransaction("not an RLP list".to_owned()));
    }
    let count = rlp.item_count()?;
    if count != FIELDS.len() {
        return Err(Error::InvalidTransaction(format!(
            "expected {} fields, got {}",
            FIELDS.len(),
            count
        )));
    }

    let mut transaction = Transaction::default();
    for (index, field) in FIELDS.iter().enumerate() {
        let value: Vec<u8> = rlp.val_at(index)?;
        field.check(&value)?;
        // an empty item only stands for an absent field when that encodes the same
        if value.is_empty() && field.default.is_empty() {
            continue;
        }
        if let Some(slot) = transaction.slot(field.name) {
            *slot = Some(hexstr::prefixed(&value));
        }
    }
    Ok(transaction)
}
