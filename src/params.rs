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
//! Protocol constants of the Ledger Ethereum app and of the U2F tunnel.

/// APDU Class byte
pub const CLA: u8 = 0xE0;

/// Get address instruction
pub const INS_GET_ADDRESS: u8 = 0x02;

/// Sign transaction instruction
pub const INS_SIGN_TRANSACTION: u8 = 0x04;

/// Get address P1: do not ask for confirmation on the device
pub const P1_NO_CONFIRM: u8 = 0x00;

/// Get address P2: do not return the chain code
pub const P2_NO_CHAIN_CODE: u8 = 0x00;

/// Reserved P2 byte of sign transaction APDUs
pub const P2_RESERVED: u8 = 0x00;

/// Length of the `CLA INS P1 P2 LC` header
pub const APDU_HEADER_LEN: usize = 5;

/// Largest APDU (header included) the U2F key handle can carry
pub const MAX_APDU_LEN: usize = 150;

/// Message bytes carried by a continuation chunk
pub const CONTINUATION_CHUNK_SIZE: usize = MAX_APDU_LEN - APDU_HEADER_LEN;

/// Opaque prefix of every response (U2F user presence + counter)
pub const RESPONSE_HEADER_LEN: usize = 5;

/// ECDSA signature component length (r and s)
pub const ECDSA_COMPONENT_LEN: usize = 32;

/// Status trailer length
pub const STATUS_LEN: usize = 2;

/// Maximum number of derivation path segments accepted by the app
pub const MAX_PATH_SEGMENTS: usize = 10;

/// BIP44 hardened derivation flag
pub const BIP44_HARDENED: u32 = 0x8000_0000;

/// BIP44 purpose value
pub const BIP44_PURPOSE: u32 = 44;

/// Ethereum coin type
pub const ETHEREUM_COIN_TYPE: u32 = 60;

/// Testnet coin type
pub const TESTNET_COIN_TYPE: u32 = 1;

/// Account used by the legacy Ledger Chrome app
pub const CLASSIC_ACCOUNT: u32 = 0x0002_73D0;

/// XOR key applied to APDUs before they are wrapped as key handles
pub const APDU_KEY: [u8; 3] = [0x77, 0x30, 0x77];

/// Challenge sent along with every U2F sign request
pub const CHALLENGE: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// U2F protocol version tag
pub const U2F_VERSION: &str = "U2F_V2";

/// Seconds to wait for the device before the U2F layer gives up
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Number of addresses returned by `accounts`
pub const DEFAULT_ADDRESS_COUNT: u32 = 5;

/// Position of a sign transaction chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PayloadType {
    /// First chunk, carries the derivation path
    First = 0x00,
    /// Any following chunk
    Continuation = 0x80,
}

/// Raw status words returned by the app
#[repr(u16)]
pub enum APDUErrors {
    /// Command executed
    NoError = 0x9000,
    /// Device is locked
    Locked = 0x6801,
    /// User rejected the request on the device
    Cancelled = 0x6985,
}

/// Outcome encoded in the status trailer of a response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceStatus {
    /// 0x9000
    Ok,
    /// 0x6801
    Locked,
    /// 0x6985
    UserCancelled,
    /// Anything else
    Unknown(u16),
}

impl From<u16> for DeviceStatus {
    fn from(code: u16) -> Self {
        match code {
            c if c == APDUErrors::NoError as u16 => DeviceStatus::Ok,
            c if c == APDUErrors::Locked as u16 => DeviceStatus::Locked,
            c if c == APDUErrors::Cancelled as u16 => DeviceStatus::UserCancelled,
            c => DeviceStatus::Unknown(c),
        }
    }
}
