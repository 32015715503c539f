/*
 *
 *    Copyright (c) 2020-2022 Project CHIP Authors
 *
 *    Licensed under the Apache License, Version 2.0 (the "License");
 *    you may not use this file except in compliance with the License.
 *    You may obtain a copy of the License at
 *
 *        http://www.apache.org/licenses/LICENSE-2.0
 *
 *    Unless required by applicable law or agreed to in writing, software
 *    distributed under the License is distributed on an "AS IS" BASIS,
 *    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *    See the License for the specific language governing permissions and
 *    limitations under the License.
 */

//! PASE (Passcode-Authenticated Session Establishment), client side.
//!
//! The client implements the commissioner role of the PASE protocol: it
//! derives the shared key `Ke` from a device setup passcode via SPAKE2+ and
//! yields a [`SecureSession`] on success.

use log::{error, info};

use crate::crypto::Crypto;
use crate::error::{Error, ErrorCode};
use crate::sc::{OpCode, SCStatusCodes, ScMessenger};
use crate::tlv::{get_root_node_struct, FromTLV, TLVElement, TLVWriter, TagType, ToTLV};
use crate::transport::exchange::Exchange;
use crate::transport::session::{SecureSession, SessionParameters};

pub mod spake2p;

use spake2p::{compute_w0_w1, Spake2pProver, SPAKE2P_CONTEXT_PREFIX};

/// The info string for SPAKE2 session key derivation
pub(crate) const SPAKE2_SESSION_KEYS_INFO: &[u8] = b"SessionKeys";

pub const PASE_RANDOM_LEN: usize = 32;

/// The PBKDFParamRequest structure
#[derive(Debug)]
pub struct PBKDFParamReq<'a> {
    pub initiator_random: &'a [u8],
    pub initiator_ssid: u16,
    pub passcode_id: u16,
    pub has_params: bool,
}

impl ToTLV for PBKDFParamReq<'_> {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.octets(&TagType::Context(1), self.initiator_random)?;
        tw.u16(&TagType::Context(2), self.initiator_ssid)?;
        tw.u16(&TagType::Context(3), self.passcode_id)?;
        tw.bool(&TagType::Context(4), self.has_params)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for PBKDFParamReq<'a> {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            initiator_random: element.ctx(1)?.octet_str()?,
            initiator_ssid: element.ctx(2)?.u16()?,
            passcode_id: element.ctx(3)?.u16()?,
            has_params: element.ctx(4)?.bool()?,
        })
    }
}

/// The PBKDF2 parameters carried in a PBKDFParamResponse
#[derive(Debug, Clone)]
pub struct PBKDFParams<'a> {
    pub iterations: u32,
    pub salt: &'a [u8],
}

/// The PBKDFParamResponse structure
#[derive(Debug)]
pub struct PBKDFParamResp<'a> {
    pub initiator_random: &'a [u8],
    pub responder_random: &'a [u8],
    pub responder_ssid: u16,
    pub params: Option<PBKDFParams<'a>>,
}

impl ToTLV for PBKDFParamResp<'_> {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.octets(&TagType::Context(1), self.initiator_random)?;
        tw.octets(&TagType::Context(2), self.responder_random)?;
        tw.u16(&TagType::Context(3), self.responder_ssid)?;
        if let Some(params) = &self.params {
            tw.start_struct(&TagType::Context(4))?;
            tw.u32(&TagType::Context(1), params.iterations)?;
            tw.octets(&TagType::Context(2), params.salt)?;
            tw.end_container()?;
        }
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for PBKDFParamResp<'a> {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        let params = match element.find_ctx(4)? {
            Some(params) => Some(PBKDFParams {
                iterations: params.ctx(1)?.u32()?,
                salt: params.ctx(2)?.octet_str()?,
            }),
            None => None,
        };

        Ok(Self {
            initiator_random: element.ctx(1)?.octet_str()?,
            responder_random: element.ctx(2)?.octet_str()?,
            responder_ssid: element.ctx(3)?.u16()?,
            params,
        })
    }
}

/// TLV structure for Pake1 (sent by the initiator)
#[derive(Debug)]
pub struct Pake1<'a> {
    /// The pA point (65 bytes, uncompressed P-256)
    pub pa: &'a [u8],
}

impl ToTLV for Pake1<'_> {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.octets(&TagType::Context(1), self.pa)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for Pake1<'a> {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            pa: element.ctx(1)?.octet_str()?,
        })
    }
}

/// TLV structure for Pake2 (sent by the responder)
#[derive(Debug)]
pub struct Pake2<'a> {
    pub pb: &'a [u8],
    pub cb: &'a [u8],
}

impl ToTLV for Pake2<'_> {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.octets(&TagType::Context(1), self.pb)?;
        tw.octets(&TagType::Context(2), self.cb)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for Pake2<'a> {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            pb: element.ctx(1)?.octet_str()?,
            cb: element.ctx(2)?.octet_str()?,
        })
    }
}

/// TLV structure for Pake3 (sent by the initiator)
#[derive(Debug)]
pub struct Pake3<'a> {
    /// The cA confirmation (32 bytes HMAC)
    pub ca: &'a [u8],
}

impl ToTLV for Pake3<'_> {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.octets(&TagType::Context(1), self.ca)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for Pake3<'a> {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            ca: element.ctx(1)?.octet_str()?,
        })
    }
}

/// The PASE client (commissioner/controller side).
///
/// The typical flow is:
///
/// 1. Obtain an unsecured exchange to the target device
/// 2. Call [`PaseClient::pair`] with the setup passcode
/// 3. Hand the returned [`SecureSession`] to the session layer
pub struct PaseClient<C: Crypto> {
    crypto: C,
}

impl<C: Crypto> PaseClient<C> {
    pub fn new(crypto: C) -> Self {
        Self { crypto }
    }

    /// Run the complete PASE handshake:
    ///
    /// 1. Send PBKDFParamRequest, receive PBKDFParamResponse
    /// 2. Send Pake1 (with pA), receive Pake2 (with pB, cB)
    /// 3. Verify cB, send Pake3 (with cA)
    /// 4. Await the success status report
    ///
    /// Any failure closes the messenger without exposing a session; local
    /// verification failures additionally notify the responder with an
    /// InvalidParameter status.
    ///
    /// # Arguments
    /// - `exchange` - An unsecured exchange to the target device
    /// - `passcode` - The setup passcode (typically 8 digits, e.g. 20202021)
    /// - `local_session_id` - A locally unused session id for the new session
    pub async fn pair<E: Exchange>(
        &self,
        exchange: E,
        passcode: u32,
        local_session_id: u16,
    ) -> Result<SecureSession, Error> {
        let mut messenger = ScMessenger::new(exchange);

        let result = self
            .handshake(&mut messenger, passcode, local_session_id)
            .await;

        if let Err(e) = &result {
            if matches!(
                e.code(),
                ErrorCode::Invalid
                    | ErrorCode::InvalidData
                    | ErrorCode::InvalidOpcode
                    | ErrorCode::KeyConfirmation
                    | ErrorCode::Crypto
            ) {
                // Notify the responder of the failure; its outcome cannot
                // change ours
                let _ = messenger.send_status(SCStatusCodes::InvalidParameter).await;
            }
        }

        messenger.close();
        result
    }

    async fn handshake<E: Exchange>(
        &self,
        messenger: &mut ScMessenger<E>,
        passcode: u32,
        local_session_id: u16,
    ) -> Result<SecureSession, Error> {
        let mut initiator_random = [0u8; PASE_RANDOM_LEN];
        self.crypto.fill_random(&mut initiator_random);

        // Step 1: PBKDFParamRequest / PBKDFParamResponse
        let req = PBKDFParamReq {
            initiator_random: &initiator_random,
            initiator_ssid: local_session_id,
            passcode_id: 0,
            has_params: false,
        };
        let req_bytes = messenger
            .send_with(OpCode::PBKDFParamRequest, |tw| {
                req.to_tlv(&TagType::Anonymous, tw)
            })
            .await?;

        let resp_bytes = messenger.read(OpCode::PBKDFParamResponse).await?;
        let resp = PBKDFParamResp::from_tlv(&get_root_node_struct(&resp_bytes)?)?;

        if resp.initiator_random != initiator_random {
            error!("PBKDFParamResponse: initiator_random mismatch");
            return Err(ErrorCode::Invalid.into());
        }

        let peer_session_id = resp.responder_ssid;

        let params = resp.params.ok_or_else(|| {
            error!("PBKDFParamResponse: missing PBKDF params");
            ErrorCode::Invalid
        })?;

        if params.salt.is_empty() || params.salt.len() > 32 {
            error!("PBKDFParamResponse: invalid salt length {}", params.salt.len());
            return Err(ErrorCode::Invalid.into());
        }

        // Step 2: Pake1 / Pake2
        let (w0, w1) = compute_w0_w1(&self.crypto, params.iterations, params.salt, passcode)?;
        let context = self.crypto.sha256(&[SPAKE2P_CONTEXT_PREFIX, &req_bytes, &resp_bytes]);
        let prover = Spake2pProver::new(&self.crypto, context, w0, w1)?;

        messenger
            .send_with(OpCode::PASEPake1, |tw| {
                Pake1 { pa: prover.pa() }.to_tlv(&TagType::Anonymous, tw)
            })
            .await?;

        let pake2_bytes = messenger.read(OpCode::PASEPake2).await?;
        let pake2 = Pake2::from_tlv(&get_root_node_struct(&pake2_bytes)?)?;

        let secrets = prover.complete(&self.crypto, pake2.pb)?;

        if pake2.cb != secrets.c_b {
            error!("PASE: cB verification failed (wrong passcode?)");
            return Err(ErrorCode::KeyConfirmation.into());
        }

        // Step 3: Pake3 / StatusReport
        messenger
            .send_with(OpCode::PASEPake3, |tw| {
                Pake3 { ca: &secrets.c_a }.to_tlv(&TagType::Anonymous, tw)
            })
            .await?;

        messenger.wait_for_success().await?;

        info!(
            "PASE session established: local_sessid={}, peer_sessid={}",
            local_session_id, peer_session_id
        );

        // The session layer derives the encryption keys from Ke; the PASE
        // salt is empty
        SecureSession::new(
            local_session_id,
            peer_session_id,
            None,
            None,
            &secrets.ke,
            &[],
            true,
            false,
            SessionParameters::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::storage::WriteBuf;

    #[test]
    fn pbkdf_param_req_round_trip() {
        let random = [0xabu8; 32];
        let req = PBKDFParamReq {
            initiator_random: &random,
            initiator_ssid: 1234,
            passcode_id: 0,
            has_params: false,
        };

        let mut buf = [0u8; 128];
        let mut wb = WriteBuf::new(&mut buf);
        let mut tw = TLVWriter::new(&mut wb);
        req.to_tlv(&TagType::Anonymous, &mut tw).unwrap();

        let parsed =
            PBKDFParamReq::from_tlv(&get_root_node_struct(wb.as_slice()).unwrap()).unwrap();
        assert_eq!(parsed.initiator_random, &random);
        assert_eq!(parsed.initiator_ssid, 1234);
        assert!(!parsed.has_params);
    }

    #[test]
    fn pbkdf_param_resp_optional_params() {
        let random = [1u8; 32];
        let responder_random = [2u8; 32];

        for params in [
            None,
            Some(PBKDFParams {
                iterations: 1000,
                salt: &[0, 1, 2, 3, 4, 5, 6, 7],
            }),
        ] {
            let resp = PBKDFParamResp {
                initiator_random: &random,
                responder_random: &responder_random,
                responder_ssid: 77,
                params,
            };

            let mut buf = [0u8; 256];
            let mut wb = WriteBuf::new(&mut buf);
            let mut tw = TLVWriter::new(&mut wb);
            resp.to_tlv(&TagType::Anonymous, &mut tw).unwrap();

            let parsed =
                PBKDFParamResp::from_tlv(&get_root_node_struct(wb.as_slice()).unwrap()).unwrap();
            assert_eq!(parsed.responder_ssid, 77);
            match (&resp.params, &parsed.params) {
                (None, None) => {}
                (Some(a), Some(b)) => {
                    assert_eq!(a.iterations, b.iterations);
                    assert_eq!(a.salt, b.salt);
                }
                _ => panic!("params mismatch"),
            }
        }
    }

    #[test]
    fn pake_messages_round_trip() {
        let pa = [3u8; 65];
        let cb = [4u8; 32];

        let mut buf = [0u8; 256];
        let mut wb = WriteBuf::new(&mut buf);
        let mut tw = TLVWriter::new(&mut wb);
        Pake2 { pb: &pa, cb: &cb }
            .to_tlv(&TagType::Anonymous, &mut tw)
            .unwrap();

        let parsed = Pake2::from_tlv(&get_root_node_struct(wb.as_slice()).unwrap()).unwrap();
        assert_eq!(parsed.pb, &pa);
        assert_eq!(parsed.cb, &cb);
    }
}
