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
//! BIP32/BIP44 derivation paths as understood by the Ethereum app

use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use crate::params::{
    BIP44_HARDENED, BIP44_PURPOSE, CLASSIC_ACCOUNT, ETHEREUM_COIN_TYPE, MAX_PATH_SEGMENTS,
    TESTNET_COIN_TYPE,
};
use crate::Error;

/// Ordered list of 32 bit derivation segments
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DerivationPath {
    segments: Vec<u32>,
}

const fn hardened(value: u32) -> u32 {
    BIP44_HARDENED | value
}

impl DerivationPath {
    /// Builds a path from its segments
    pub fn new(segments: Vec<u32>) -> Result<Self, Error> {
        if segments.is_empty() || segments.len() > MAX_PATH_SEGMENTS {
            return Err(Error::InvalidDerivationPath);
        }
        Ok(DerivationPath { segments })
    }

    /// Parses the raw encoding (big endian 4 byte segments)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() % 4 != 0 {
            return Err(Error::InvalidDerivationPath);
        }
        Self::new(bytes.chunks(4).map(BigEndian::read_u32).collect())
    }

    /// `m/44'/60'/0'/0`, the Ledger Nano S Ethereum wallet
    pub fn ethereum() -> Self {
        DerivationPath {
            segments: vec![
                hardened(BIP44_PURPOSE),
                hardened(ETHEREUM_COIN_TYPE),
                hardened(0),
                0,
            ],
        }
    }

    /// `m/44'/60'/160720'/0'`, the wallet of the legacy Ledger Chrome app
    pub fn classic() -> Self {
        DerivationPath {
            segments: vec![
                hardened(BIP44_PURPOSE),
                hardened(ETHEREUM_COIN_TYPE),
                hardened(CLASSIC_ACCOUNT),
                hardened(0),
            ],
        }
    }

    /// `m/44'/1'/0'/0`, the testnet wallet
    pub fn testnet() -> Self {
        DerivationPath {
            segments: vec![
                hardened(BIP44_PURPOSE),
                hardened(TESTNET_COIN_TYPE),
                hardened(0),
                0,
            ],
        }
    }

    /// Path segments
    pub fn segments(&self) -> &[u32] {
        &self.segments
    }

    /// Number of 4 byte words
    pub fn word_count(&self) -> u8 {
        // bounded by MAX_PATH_SEGMENTS
        self.segments.len() as u8
    }

    /// Length of the raw encoding
    pub fn byte_len(&self) -> usize {
        self.segments.len() * 4
    }

    /// Raw encoding, big endian
    pub fn serialize(&self) -> Vec<u8> {
        let mut m = vec![0u8; self.byte_len()];
        for (chunk, segment) in m.chunks_mut(4).zip(self.segments.iter()) {
            BigEndian::write_u32(chunk, *segment);
        }
        m
    }

    /// Path of account `index`: the last segment is offset by `index`.
    pub fn derive_account(&self, index: u32) -> Result<Self, Error> {
        let (last, head) = self
            .segments
            .split_last()
            .ok_or(Error::InvalidDerivationPath)?;
        let last = last
            .checked_add(index)
            .ok_or(Error::InvalidDerivationPath)?;

        let mut segments = head.to_vec();
        segments.push(last);
        Ok(DerivationPath { segments })
    }
}

impl Default for DerivationPath {
    fn default() -> Self {
        Self::ethereum()
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for segment in &self.segments {
            if segment & BIP44_HARDENED != 0 {
                write!(f, "/{}'", segment & !BIP44_HARDENED)?;
            } else {
                write!(f, "/{}", segment)?;
            }
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        if parts.next() != Some("m") {
            return Err(Error::InvalidDerivationPath);
        }

        let segments = parts
            .map(|part| {
                let hardened_digits = part
                    .strip_suffix('\'')
                    .or_else(|| part.strip_suffix('h'));
                let (digits, flag) = match hardened_digits {
                    Some(digits) => (digits, BIP44_HARDENED),
                    None => (part, 0),
                };
                let value: u32 = digits.parse().map_err(|_| Error::InvalidDerivationPath)?;
                if value & BIP44_HARDENED != 0 {
                    return Err(Error::InvalidDerivationPath);
                }
                Ok(value | flag)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(segments)
    }
}

impl TryFrom<String> for DerivationPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DerivationPath> for String {
    fn from(path: DerivationPath) -> Self {
        path.to_string()
    }
}
