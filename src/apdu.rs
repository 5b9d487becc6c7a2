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
//! Status checking and ordered delivery of multi APDU commands

use std::ops::Deref;

use ledger_transport::{APDUAnswer, APDUCommand, Exchange};
use tracing::{debug, warn};

use crate::params::DeviceStatus;
use crate::Error;

/// Maps the status trailer of `answer` to a result
pub fn check_status<B>(answer: &APDUAnswer<B>) -> Result<(), Error>
where
    B: Deref<Target = [u8]>,
{
    match DeviceStatus::from(answer.retcode()) {
        DeviceStatus::Ok => Ok(()),
        DeviceStatus::Locked => Err(Error::DeviceLocked),
        DeviceStatus::UserCancelled => Err(Error::UserCancelled),
        DeviceStatus::Unknown(code) => Err(Error::UnknownStatus(code)),
    }
}

/// Sends `commands` one after the other and returns the answer to the last one.
///
/// A command is only sent once the previous answer arrived with an OK status.
/// The first failure aborts the sequence.
pub async fn transmit<E>(
    transport: &E,
    commands: &[APDUCommand<Vec<u8>>],
) -> Result<APDUAnswer<E::AnswerType>, Error>
where
    E: Exchange + Send + Sync,
    Error: From<E::Error>,
{
    let mut last = None;

    for (idx, command) in commands.iter().enumerate() {
        debug!(
            chunk = idx,
            of = commands.len(),
            cla = command.cla,
            ins = command.ins,
            p1 = command.p1,
            p2 = command.p2,
            len = command.data.len(),
            "sending apdu"
        );

        let answer = transport.exchange(command).await?;
        if let Err(err) = check_status(&answer) {
            warn!(chunk = idx, retcode = answer.retcode(), "device refused apdu");
            return Err(err);
        }
        last = Some(answer);
    }

    last.ok_or(Error::NoResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(bytes: &[u8]) -> APDUAnswer<Vec<u8>> {
        APDUAnswer::from_answer(bytes.to_vec()).unwrap()
    }

    #[test]
    fn status_mapping() {
        assert!(check_status(&answer(&[0x01, 0x90, 0x00])).is_ok());
        assert!(matches!(
            check_status(&answer(&[0x68, 0x01])),
            Err(Error::DeviceLocked)
        ));
        assert!(matches!(
            check_status(&answer(&[0x69, 0x85])),
            Err(Error::UserCancelled)
        ));
        assert!(matches!(
            check_status(&answer(&[0xff, 0x6a, 0x80])),
            Err(Error::UnknownStatus(0x6a80))
        ));
    }
}
