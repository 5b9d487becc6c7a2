/*******************************************************************************
*   (c) 2018, 2019 ZondaX GmbH
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
// Integration tests against a simulated device

#![deny(trivial_casts, trivial_numeric_casts)]
#![deny(unused_import_braces, unused_qualifications)]

extern crate ledger_ethereum_u2f;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use k256::elliptic_curve::sec1::ToEncodedPoint;

use ledger_ethereum_u2f::params::CHALLENGE;
use ledger_ethereum_u2f::u2f::{scramble, URL_SAFE_LENIENT};
use ledger_ethereum_u2f::{
    DerivationPath, DeviceConfig, Error, EthereumApp, EthereumRpc, RegisteredKey, Transaction,
    TransportU2F, U2fErrorCode, U2fSigner,
};

use once_cell::sync::Lazy;

const APP_ID: &str = "https://example.com";

static PUBLIC_KEY: Lazy<Vec<u8>> = Lazy::new(|| {
    let secret = k256::SecretKey::from_slice(&[0x11; 32]).expect("valid secret key");
    secret.public_key().to_encoded_point(false).as_bytes().to_vec()
});

const R: &str = "28ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276";
const S: &str = "67cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83";

const UNSIGNED: &str =
    "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080";

const SIGNED: &str = "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83";

/// Ethereum app behind a U2F tunnel, recording every APDU it receives
#[derive(Default)]
struct SimulatedDevice {
    apdus: Mutex<Vec<Vec<u8>>>,
    calls: AtomicUsize,
    status_at: Option<(usize, u16)>,
    u2f_error_at: Option<(usize, U2fErrorCode)>,
    slow_low_indices: bool,
}

impl SimulatedDevice {
    fn failing_status(call: usize, status: u16) -> Self {
        SimulatedDevice {
            status_at: Some((call, status)),
            ..Default::default()
        }
    }

    fn failing_u2f(call: usize, code: U2fErrorCode) -> Self {
        SimulatedDevice {
            u2f_error_at: Some((call, code)),
            ..Default::default()
        }
    }

    fn apdus(&self) -> Vec<Vec<u8>> {
        self.apdus.lock().unwrap().clone()
    }

    fn address_response(last_segment: u32) -> Vec<u8> {
        let address = format!("{:040x}", last_segment);
        let mut response = vec![0x01, 0x00, 0x00, 0x00, 0x07];
        response.push(PUBLIC_KEY.len() as u8);
        response.extend_from_slice(&PUBLIC_KEY);
        response.push(address.len() as u8);
        response.extend_from_slice(address.as_bytes());
        response
    }

    fn signature_response() -> Vec<u8> {
        let mut response = vec![0x01, 0x00, 0x00, 0x00, 0x08, 0x25];
        response.extend_from_slice(&hex::decode(R).unwrap());
        response.extend_from_slice(&hex::decode(S).unwrap());
        response
    }
}

#[async_trait]
impl U2fSigner for SimulatedDevice {
    async fn sign(
        &self,
        app_id: &str,
        challenge: &str,
        registered_keys: &[RegisteredKey],
        timeout: Duration,
    ) -> Result<String, U2fErrorCode> {
        assert_eq!(app_id, APP_ID);
        assert_eq!(challenge, CHALLENGE);
        assert_eq!(timeout, Duration::from_secs(30));
        assert_eq!(registered_keys.len(), 1);
        assert_eq!(registered_keys[0].version, "U2F_V2");

        let key_handle = URL_SAFE_LENIENT
            .decode(registered_keys[0].key_handle.as_bytes())
            .unwrap();
        let apdu = scramble(&key_handle);
        self.apdus.lock().unwrap().push(apdu.clone());

        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((at, code)) = self.u2f_error_at {
            if at == call {
                return Err(code);
            }
        }

        let mut response = match apdu[1] {
            0x02 => {
                let last = u32::from_be_bytes([
                    apdu[apdu.len() - 4],
                    apdu[apdu.len() - 3],
                    apdu[apdu.len() - 2],
                    apdu[apdu.len() - 1],
                ]);
                if self.slow_low_indices {
                    let delay = 5 * u64::from(20 - last.min(20));
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Self::address_response(last)
            }
            0x04 => Self::signature_response(),
            _ => Vec::new(),
        };

        let status = match self.status_at {
            Some((at, status)) if at == call => status,
            _ => 0x9000,
        };
        response.extend_from_slice(&status.to_be_bytes());

        Ok(URL_SAFE_NO_PAD.encode(response))
    }
}

fn app(device: &Arc<SimulatedDevice>) -> EthereumApp<TransportU2F<Arc<SimulatedDevice>>> {
    EthereumApp::connect(Arc::clone(device), &DeviceConfig::new(APP_ID))
        .expect("unable to create app")
}

fn eip155_transaction() -> Transaction {
    serde_json::from_value(serde_json::json!({
        "nonce": "0x9",
        "gasPrice": "0x4a817c800",
        "gas": "0x5208",
        "to": "0x3535353535353535353535353535353535353535",
        "value": "0xde0b6b3a7640000"
    }))
    .unwrap()
}

#[tokio::test]
async fn address() {
    let device = Arc::new(SimulatedDevice::default());
    let app = app(&device);

    let addr = app.address(0).await.unwrap();

    assert_eq!(addr.address, format!("{:040x}", 0));
    assert_eq!(addr.header_hex(), "0x0100000007");
    assert_eq!(addr.public_key, *PUBLIC_KEY);
    assert_eq!(
        addr.to_public_key()
            .unwrap()
            .to_encoded_point(false)
            .as_bytes(),
        &PUBLIC_KEY[..]
    );

    assert_eq!(
        device.apdus(),
        vec![hex::decode("e002000011048000002c8000003c8000000000000000").unwrap()]
    );
}

#[tokio::test]
async fn address_of_other_account() {
    let device = Arc::new(SimulatedDevice::default());
    let app = app(&device);

    assert_eq!(app.get_address(7).await.unwrap(), format!("{:040x}", 7));
    assert_eq!(app.path(), &DerivationPath::ethereum());
}

#[tokio::test]
async fn list_addresses_keeps_index_order() {
    let device = Arc::new(SimulatedDevice {
        slow_low_indices: true,
        ..Default::default()
    });
    let app = app(&device);

    let addresses = app.list_addresses(3, 4).await.unwrap();

    assert_eq!(
        addresses,
        (3..7u32)
            .map(|i| format!("{:040x}", i))
            .collect::<Vec<_>>()
    );
    assert_eq!(device.apdus().len(), 4);
}

#[tokio::test]
async fn list_addresses_empty() {
    let device = Arc::new(SimulatedDevice::default());
    let app = app(&device);

    assert!(app.list_addresses(0, 0).await.unwrap().is_empty());
    assert!(device.apdus().is_empty());
}

#[tokio::test]
async fn sign_single_chunk() {
    let device = Arc::new(SimulatedDevice::default());
    let app = app(&device);

    let blob = hex::decode(UNSIGNED).unwrap();
    let signature = app.sign(&blob).await.unwrap();

    assert_eq!(signature.v_hex(), "0x25");
    assert_eq!(signature.r_hex(), format!("0x{}", R));
    assert_eq!(signature.s_hex(), format!("0x{}", S));
    assert!(signature.to_ecdsa().is_ok());

    let apdus = device.apdus();
    assert_eq!(apdus.len(), 1);
    assert_eq!(
        hex::encode(&apdus[0]),
        format!("e00400003e048000002c8000003c8000000000000000{}", UNSIGNED)
    );
}

#[tokio::test]
async fn sign_uses_account_index() {
    let device = Arc::new(SimulatedDevice::default());
    let app = app(&device).with_account_index(2);

    app.sign(&[0xde, 0xad, 0xba, 0xad]).await.unwrap();

    assert_eq!(
        hex::encode(&device.apdus()[0]),
        "e004000015048000002c8000003c8000000000000002deadbaad"
    );
}

#[tokio::test]
async fn sign_chunks_in_order() {
    let device = Arc::new(SimulatedDevice::default());
    let app = app(&device);

    let message: Vec<u8> = (0..400u32).map(|i| (i % 251) as u8).collect();
    app.sign(&message).await.unwrap();

    let apdus = device.apdus();
    assert_eq!(apdus.len(), 3);
    assert_eq!(apdus[0][2], 0x00);
    assert_eq!(apdus[1][2], 0x80);
    assert_eq!(apdus[2][2], 0x80);
    assert!(apdus.iter().all(|apdu| apdu[..2] == [0xe0, 0x04] && apdu[3] == 0x00));
    assert!(apdus.iter().all(|apdu| apdu.len() <= 150));
    assert!(apdus
        .iter()
        .all(|apdu| usize::from(apdu[4]) == apdu.len() - 5));

    let mut rebuilt = apdus[0][5 + 17..].to_vec();
    for apdu in &apdus[1..] {
        rebuilt.extend_from_slice(&apdu[5..]);
    }
    assert_eq!(rebuilt, message);
}

#[tokio::test]
async fn cancelled_chunk_aborts_sign() {
    let device = Arc::new(SimulatedDevice::failing_status(1, 0x6985));
    let app = app(&device);

    let err = app.sign(&[0u8; 400]).await.unwrap_err();

    assert!(matches!(err, Error::UserCancelled));
    assert_eq!(device.apdus().len(), 2);
}

#[tokio::test]
async fn locked_device() {
    let device = Arc::new(SimulatedDevice::failing_status(0, 0x6801));
    let app = app(&device);

    assert!(matches!(
        app.get_address(0).await.unwrap_err(),
        Error::DeviceLocked
    ));
}

#[tokio::test]
async fn unknown_status() {
    let device = Arc::new(SimulatedDevice::failing_status(2, 0x6a80));
    let app = app(&device);

    assert!(matches!(
        app.sign(&[0u8; 400]).await.unwrap_err(),
        Error::UnknownStatus(0x6a80)
    ));
    assert_eq!(device.apdus().len(), 3);
}

#[tokio::test]
async fn u2f_timeout_aborts_sign() {
    let device = Arc::new(SimulatedDevice::failing_u2f(0, U2fErrorCode::Timeout));
    let app = app(&device);

    let err = app.sign(&[0u8; 400]).await.unwrap_err();

    assert!(matches!(err, Error::U2f(U2fErrorCode::Timeout)));
    assert_eq!(device.apdus().len(), 1);
}

#[tokio::test]
async fn u2f_ok_code_is_still_an_error() {
    let device = Arc::new(SimulatedDevice::failing_u2f(0, U2fErrorCode::Ok));
    let app = app(&device);

    assert!(matches!(
        app.get_address(0).await.unwrap_err(),
        Error::U2f(U2fErrorCode::Ok)
    ));
}

#[tokio::test]
async fn failing_address_fails_whole_list() {
    let device = Arc::new(SimulatedDevice::failing_u2f(2, U2fErrorCode::DeviceIneligible));
    let app = app(&device);

    assert!(matches!(
        app.list_addresses(0, 5).await.unwrap_err(),
        Error::U2f(U2fErrorCode::DeviceIneligible)
    ));
}

#[tokio::test]
async fn send_transaction() {
    let device = Arc::new(SimulatedDevice::default());
    let rpc = EthereumRpc::new(app(&device));

    let signed = rpc.send_transaction(&eip155_transaction()).await.unwrap();

    assert_eq!(signed, SIGNED);
    let apdus = device.apdus();
    assert_eq!(apdus.len(), 1);
    assert_eq!(hex::encode(&apdus[0][5 + 17..]), UNSIGNED);
}

#[tokio::test]
async fn rpc_accounts() {
    let device = Arc::new(SimulatedDevice::default());
    let rpc = EthereumRpc::new(app(&device));

    let accounts = rpc.accounts().await.unwrap();

    assert_eq!(accounts.len(), 5);
    assert_eq!(accounts[4], format!("0x{:040x}", 4));
}

#[test]
fn missing_app_id() {
    let device = Arc::new(SimulatedDevice::default());
    let config: DeviceConfig = serde_json::from_str(r#"{"accountIndex":1}"#).unwrap();

    assert!(matches!(
        EthereumApp::connect(device, &config),
        Err(Error::ArgumentError(_))
    ));
}
