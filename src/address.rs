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
//! Get address command

use ledger_transport::APDUCommand;

use crate::hexstr;
use crate::params::{CLA, INS_GET_ADDRESS, P1_NO_CONFIRM, P2_NO_CHAIN_CODE, RESPONSE_HEADER_LEN};
use crate::path::DerivationPath;
use crate::Error;

/// Address returned by the device, with the public key it derives from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    /// Opaque response header
    pub header: Vec<u8>,

    /// Public key (SEC1)
    pub public_key: Vec<u8>,

    /// Address as printed by the device, hex digits without `0x`
    pub address: String,
}

impl Address {
    /// Header as `0x` hex
    pub fn header_hex(&self) -> String {
        hexstr::prefixed(&self.header)
    }

    /// Public key as `0x` hex
    pub fn public_key_hex(&self) -> String {
        hexstr::prefixed(&self.public_key)
    }

    /// Parses the public key
    pub fn to_public_key(&self) -> Result<k256::PublicKey, Error> {
        Ok(k256::PublicKey::from_sec1_bytes(&self.public_key)?)
    }
}

/// Builds the single APDU asking for the address at `path`
pub fn request(path: &DerivationPath) -> APDUCommand<Vec<u8>> {
    let mut data = Vec::with_capacity(1 + path.byte_len());
    data.push(path.word_count());
    data.extend_from_slice(&path.serialize());

    APDUCommand {
        cla: CLA,
        ins: INS_GET_ADDRESS,
        p1: P1_NO_CONFIRM,
        p2: P2_NO_CHAIN_CODE,
        data,
    }
}

/// Parses `header | len | public key | len | address`. Trailing bytes are ignored.
pub fn parse_response(response: &[u8]) -> Result<Address, Error> {
    let header = response
        .get(..RESPONSE_HEADER_LEN)
        .ok_or(Error::MalformedResponse)?;
    let (public_key, rest) = length_prefixed(&response[RESPONSE_HEADER_LEN..])?;
    let (address, _) = length_prefixed(rest)?;
    if !address.is_ascii() {
        return Err(Error::MalformedResponse);
    }

    Ok(Address {
        header: header.to_vec(),
        public_key: public_key.to_vec(),
        address: address.iter().copied().map(char::from).collect(),
    })
}

fn length_prefixed(bytes: &[u8]) -> Result<(&[u8], &[u8]), Error> {
    let (len, rest) = bytes.split_first().ok_or(Error::MalformedResponse)?;
    let len = usize::from(*len);
    if rest.len() < len {
        return Err(Error::MalformedResponse);
    }
    Ok(rest.split_at(len))
}
