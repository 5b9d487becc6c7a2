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
//! Sign transaction command

use std::convert::TryInto;

use ledger_transport::APDUCommand;

use crate::hexstr;
use crate::params::{
    PayloadType, APDU_HEADER_LEN, CLA, CONTINUATION_CHUNK_SIZE, ECDSA_COMPONENT_LEN,
    INS_SIGN_TRANSACTION, MAX_APDU_LEN, P2_RESERVED, RESPONSE_HEADER_LEN,
};
use crate::path::DerivationPath;
use crate::Error;

/// Signature (includes V, R, S)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    /// v value
    pub v: u8,

    /// r value
    pub r: [u8; 32],

    /// s value
    pub s: [u8; 32],
}

impl Signature {
    /// `v` as `0x` hex
    pub fn v_hex(&self) -> String {
        hexstr::prefixed(&[self.v])
    }

    /// `r` as `0x` hex
    pub fn r_hex(&self) -> String {
        hexstr::prefixed(&self.r)
    }

    /// `s` as `0x` hex
    pub fn s_hex(&self) -> String {
        hexstr::prefixed(&self.s)
    }

    /// ECDSA signature made of `r` and `s`
    pub fn to_ecdsa(&self) -> Result<k256::ecdsa::Signature, Error> {
        let mut rs = [0u8; 2 * ECDSA_COMPONENT_LEN];
        rs[..ECDSA_COMPONENT_LEN].copy_from_slice(&self.r);
        rs[ECDSA_COMPONENT_LEN..].copy_from_slice(&self.s);
        Ok(k256::ecdsa::Signature::from_slice(&rs)?)
    }
}

fn command(p1: PayloadType, data: Vec<u8>) -> APDUCommand<Vec<u8>> {
    APDUCommand {
        cla: CLA,
        ins: INS_SIGN_TRANSACTION,
        p1: p1 as u8,
        p2: P2_RESERVED,
        data,
    }
}

/// Splits `message` into the ordered APDUs the device expects.
///
/// The first APDU carries the path followed by as much of the message as fits,
/// the others carry only message bytes. An empty message still produces the
/// first APDU.
pub fn requests(path: &DerivationPath, message: &[u8]) -> Vec<APDUCommand<Vec<u8>>> {
    let path_len = 1 + path.byte_len();
    let first_capacity = MAX_APDU_LEN - APDU_HEADER_LEN - path_len;
    let (head, tail) = message.split_at(message.len().min(first_capacity));

    let mut first = Vec::with_capacity(path_len + head.len());
    first.push(path.word_count());
    first.extend_from_slice(&path.serialize());
    first.extend_from_slice(head);

    let mut commands = vec![command(PayloadType::First, first)];
    commands.extend(
        tail.chunks(CONTINUATION_CHUNK_SIZE)
            .map(|chunk| command(PayloadType::Continuation, chunk.to_vec())),
    );
    commands
}

/// Parses `header | v | r | s`. Trailing bytes are ignored.
pub fn parse_response(response: &[u8]) -> Result<Signature, Error> {
    let body = response
        .get(RESPONSE_HEADER_LEN..RESPONSE_HEADER_LEN + 1 + 2 * ECDSA_COMPONENT_LEN)
        .ok_or(Error::MalformedResponse)?;
    let (v, rs) = body.split_first().ok_or(Error::MalformedResponse)?;
    let (r, s) = rs.split_at(ECDSA_COMPONENT_LEN);

    Ok(Signature {
        v: *v,
        r: r.try_into().map_err(|_| Error::MalformedResponse)?,
        s: s.try_into().map_err(|_| Error::MalformedResponse)?,
    })
}
