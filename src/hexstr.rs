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
//! Hex string helpers

use crate::Error;

const PREFIX: &str = "0x";

/// Pads a hex string with a leading zero nibble when it has an odd number of digits.
///
/// An optional `0x` prefix is kept and the zero goes right after it.
pub fn normalize(hex_string: &str) -> String {
    let digits = strip_prefix(hex_string);
    if digits.len() % 2 == 0 {
        return hex_string.to_owned();
    }

    let prefix = &hex_string[..hex_string.len() - digits.len()];
    format!("{}0{}", prefix, digits)
}

/// Normalizes `hex_string` and decodes it to bytes
pub fn to_bytes(hex_string: &str) -> Result<Vec<u8>, Error> {
    let normalized = normalize(hex_string);
    Ok(hex::decode(strip_prefix(&normalized))?)
}

/// Renders bytes as `0x`-prefixed lowercase hex
pub fn prefixed(bytes: &[u8]) -> String {
    format!("{}{}", PREFIX, hex::encode(bytes))
}

fn strip_prefix(hex_string: &str) -> &str {
    hex_string.strip_prefix(PREFIX).unwrap_or(hex_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_odd_prefixed() {
        assert_eq!(normalize("0x1"), "0x01");
        assert_eq!(normalize("0xabc"), "0x0abc");
    }

    #[test]
    fn pads_odd_bare() {
        assert_eq!(normalize("abc"), "0abc");
    }

    #[test]
    fn even_is_untouched() {
        for s in ["0x", "0x01", "0xdeadbeef", "", "beef"].iter() {
            assert_eq!(normalize(s), *s);
            assert_eq!(normalize(&normalize(s)), *s);
        }
    }

    #[test]
    fn same_value_after_padding() {
        let padded = normalize("0x4a817c800");
        assert_eq!(
            u64::from_str_radix(&padded[2..], 16).unwrap(),
            0x4a817c800
        );
        assert_eq!(padded.len() % 2, 0);
    }

    #[test]
    fn decodes() {
        assert_eq!(to_bytes("0x5208").unwrap(), vec![0x52, 0x08]);
        assert_eq!(to_bytes("0x9").unwrap(), vec![0x09]);
        assert!(to_bytes("0x").unwrap().is_empty());
        assert!(matches!(to_bytes("0xzz"), Err(Error::Hex(_))));
    }

    #[test]
    fn renders() {
        assert_eq!(prefixed(&[0xfa, 0x1a]), "0xfa1a");
        assert_eq!(prefixed(&[]), "0x");
    }
}
