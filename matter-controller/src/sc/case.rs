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

//! CASE (Certificate-Authenticated Session Establishment), responder side.
//!
//! Accepts inbound sigma1 exchanges and drives either the resumption
//! shortcut (`sigma1 → sigma2-resume → success`) or the full handshake
//! (`sigma1 → sigma2 → sigma3 → success`). Each accepted session persists a
//! rotated resumption record for the next handshake with the same peer.

use log::{error, info};

use crate::crypto::{Crypto, AEAD_KEY_LEN, EC_POINT_LEN, SHA256_HASH_LEN};
use crate::error::{Error, ErrorCode};
use crate::fabric::{CaseContext, Fabric, IPK_LEN};
use crate::sc::{OpCode, SCStatusCodes, ScMessenger};
use crate::tlv::{get_root_node_struct, FromTLV, TLVElement, TLVWriter, TagType, ToTLV};
use crate::transport::exchange::Exchange;
use crate::transport::session::{ResumptionRecord, SecureSession, SessionParameters};
use crate::utils::storage::WriteBuf;

// Key-derivation infos and CCM nonces, as an initiator implementation needs
// them as well
pub const S1RK_INFO: &[u8] = b"Sigma1_Resume";
pub const S2RK_INFO: &[u8] = b"Sigma2_Resume";
pub const S2K_INFO: &[u8] = b"Sigma2";
pub const S3K_INFO: &[u8] = b"Sigma3";

pub const RESUME1_MIC_NONCE: &[u8; 13] = b"NCASE_SigmaS1";
pub const RESUME2_MIC_NONCE: &[u8; 13] = b"NCASE_SigmaS2";
pub const TBE_DATA2_NONCE: &[u8; 13] = b"NCASE_Sigma2N";
pub const TBE_DATA3_NONCE: &[u8; 13] = b"NCASE_Sigma3N";

pub const CASE_RANDOM_LEN: usize = 32;
pub const RESUMPTION_ID_LEN: usize = 16;

/// Certificates plus signature make the sigma TBE/TBS payloads the largest
/// frames of the handshake
const CERT_BUF_LEN: usize = 2048;

/// MRP session parameters as carried in sigma messages
fn session_params_to_tlv(
    params: &SessionParameters,
    tag: &TagType,
    tw: &mut TLVWriter,
) -> Result<(), Error> {
    tw.start_struct(tag)?;
    tw.u32(&TagType::Context(1), params.idle_interval_ms)?;
    tw.u32(&TagType::Context(2), params.active_interval_ms)?;
    tw.end_container()
}

fn session_params_from_tlv(element: &TLVElement) -> Result<SessionParameters, Error> {
    let defaults = SessionParameters::default();
    Ok(SessionParameters {
        idle_interval_ms: match element.find_ctx(1)? {
            Some(v) => v.u32()?,
            None => defaults.idle_interval_ms,
        },
        active_interval_ms: match element.find_ctx(2)? {
            Some(v) => v.u32()?,
            None => defaults.active_interval_ms,
        },
    })
}

/// The Sigma1 structure
#[derive(Debug)]
pub struct Sigma1<'a> {
    pub initiator_random: &'a [u8],
    pub initiator_session_id: u16,
    pub destination_id: &'a [u8],
    pub initiator_eph_public_key: &'a [u8],
    pub session_params: Option<SessionParameters>,
    pub resumption_id: Option<&'a [u8]>,
    pub initiator_resume_mic: Option<&'a [u8]>,
}

impl ToTLV for Sigma1<'_> {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.octets(&TagType::Context(1), self.initiator_random)?;
        tw.u16(&TagType::Context(2), self.initiator_session_id)?;
        tw.octets(&TagType::Context(3), self.destination_id)?;
        tw.octets(&TagType::Context(4), self.initiator_eph_public_key)?;
        if let Some(params) = &self.session_params {
            session_params_to_tlv(params, &TagType::Context(5), tw)?;
        }
        if let Some(resumption_id) = self.resumption_id {
            tw.octets(&TagType::Context(6), resumption_id)?;
        }
        if let Some(mic) = self.initiator_resume_mic {
            tw.octets(&TagType::Context(7), mic)?;
        }
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for Sigma1<'a> {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            initiator_random: element.ctx(1)?.octet_str()?,
            initiator_session_id: element.ctx(2)?.u16()?,
            destination_id: element.ctx(3)?.octet_str()?,
            initiator_eph_public_key: element.ctx(4)?.octet_str()?,
            session_params: match element.find_ctx(5)? {
                Some(params) => Some(session_params_from_tlv(&params)?),
                None => None,
            },
            resumption_id: element
                .find_ctx(6)?
                .map(|e| e.octet_str())
                .transpose()?,
            initiator_resume_mic: element
                .find_ctx(7)?
                .map(|e| e.octet_str())
                .transpose()?,
        })
    }
}

/// The Sigma2 structure
#[derive(Debug)]
pub struct Sigma2<'a> {
    pub responder_random: &'a [u8],
    pub responder_session_id: u16,
    pub responder_eph_public_key: &'a [u8],
    pub encrypted2: &'a [u8],
    pub session_params: Option<SessionParameters>,
}

impl ToTLV for Sigma2<'_> {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.octets(&TagType::Context(1), self.responder_random)?;
        tw.u16(&TagType::Context(2), self.responder_session_id)?;
        tw.octets(&TagType::Context(3), self.responder_eph_public_key)?;
        tw.octets(&TagType::Context(4), self.encrypted2)?;
        if let Some(params) = &self.session_params {
            session_params_to_tlv(params, &TagType::Context(5), tw)?;
        }
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for Sigma2<'a> {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            responder_random: element.ctx(1)?.octet_str()?,
            responder_session_id: element.ctx(2)?.u16()?,
            responder_eph_public_key: element.ctx(3)?.octet_str()?,
            encrypted2: element.ctx(4)?.octet_str()?,
            session_params: match element.find_ctx(5)? {
                Some(params) => Some(session_params_from_tlv(&params)?),
                None => None,
            },
        })
    }
}

/// The Sigma2Resume structure
#[derive(Debug)]
pub struct Sigma2Resume<'a> {
    pub resumption_id: &'a [u8],
    pub sigma2_resume_mic: &'a [u8],
    pub responder_session_id: u16,
}

impl ToTLV for Sigma2Resume<'_> {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.octets(&TagType::Context(1), self.resumption_id)?;
        tw.octets(&TagType::Context(2), self.sigma2_resume_mic)?;
        tw.u16(&TagType::Context(3), self.responder_session_id)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for Sigma2Resume<'a> {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            resumption_id: element.ctx(1)?.octet_str()?,
            sigma2_resume_mic: element.ctx(2)?.octet_str()?,
            responder_session_id: element.ctx(3)?.u16()?,
        })
    }
}

/// The Sigma3 structure
#[derive(Debug)]
pub struct Sigma3<'a> {
    pub encrypted3: &'a [u8],
}

impl ToTLV for Sigma3<'_> {
    fn to_tlv(&self, tag: &TagType, tw: &mut TLVWriter) -> Result<(), Error> {
        tw.start_struct(tag)?;
        tw.octets(&TagType::Context(1), self.encrypted3)?;
        tw.end_container()
    }
}

impl<'a> FromTLV<'a> for Sigma3<'a> {
    fn from_tlv(element: &TLVElement<'a>) -> Result<Self, Error> {
        Ok(Self {
            encrypted3: element.ctx(1)?.octet_str()?,
        })
    }
}

/// Encode the sigma signed-data (TBS) structure:
/// `{1: senderNOC, 2: senderICAC?, 3: senderEphPubKey, 4: receiverEphPubKey}`.
///
/// Sigma2 signs it with the responder in the sender role; sigma3
/// verification rebuilds it with the roles swapped.
pub fn encode_sigma_tbs(
    noc: &[u8],
    icac: Option<&[u8]>,
    sender_eph_public_key: &[u8],
    receiver_eph_public_key: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut buf = [0u8; CERT_BUF_LEN];
    let mut wb = WriteBuf::new(&mut buf);
    let mut tw = TLVWriter::new(&mut wb);

    tw.start_struct(&TagType::Anonymous)?;
    tw.octets(&TagType::Context(1), noc)?;
    if let Some(icac) = icac {
        tw.octets(&TagType::Context(2), icac)?;
    }
    tw.octets(&TagType::Context(3), sender_eph_public_key)?;
    tw.octets(&TagType::Context(4), receiver_eph_public_key)?;
    tw.end_container()?;

    Ok(wb.as_slice().to_vec())
}

/// Encode the sigma2 TBE plaintext:
/// `{1: NOC, 2: ICAC?, 3: signature, 4: resumptionId}`.
pub fn encode_tbe2(
    noc: &[u8],
    icac: Option<&[u8]>,
    signature: &[u8],
    resumption_id: &[u8; RESUMPTION_ID_LEN],
) -> Result<Vec<u8>, Error> {
    let mut buf = [0u8; CERT_BUF_LEN];
    let mut wb = WriteBuf::new(&mut buf);
    let mut tw = TLVWriter::new(&mut wb);

    tw.start_struct(&TagType::Anonymous)?;
    tw.octets(&TagType::Context(1), noc)?;
    if let Some(icac) = icac {
        tw.octets(&TagType::Context(2), icac)?;
    }
    tw.octets(&TagType::Context(3), signature)?;
    tw.octets(&TagType::Context(4), resumption_id)?;
    tw.end_container()?;

    Ok(wb.as_slice().to_vec())
}

/// Encode the sigma3 TBE plaintext: `{1: NOC, 2: ICAC?, 3: signature}`.
pub fn encode_tbe3(noc: &[u8], icac: Option<&[u8]>, signature: &[u8]) -> Result<Vec<u8>, Error> {
    let mut buf = [0u8; CERT_BUF_LEN];
    let mut wb = WriteBuf::new(&mut buf);
    let mut tw = TLVWriter::new(&mut wb);

    tw.start_struct(&TagType::Anonymous)?;
    tw.octets(&TagType::Context(1), noc)?;
    if let Some(icac) = icac {
        tw.octets(&TagType::Context(2), icac)?;
    }
    tw.octets(&TagType::Context(3), signature)?;
    tw.end_container()?;

    Ok(wb.as_slice().to_vec())
}

/// The CASE responder.
///
/// One instance handles any number of inbound secure-channel exchanges; each
/// `handle` call consumes one exchange for the duration of its handshake.
pub struct CaseResponder<'a, C: Crypto, X: CaseContext> {
    crypto: &'a C,
    context: &'a X,
}

impl<'a, C: Crypto, X: CaseContext> CaseResponder<'a, C, X> {
    pub fn new(crypto: &'a C, context: &'a X) -> Self {
        Self { crypto, context }
    }

    /// Handle one inbound CASE exchange, where the peer is the initiator.
    ///
    /// On any local crypto or verification failure, a status report is sent
    /// on the exchange and the handshake is abandoned without a session.
    pub async fn handle<E: Exchange>(&self, exchange: E) -> Result<(), Error> {
        let mut messenger = ScMessenger::new(exchange);

        let result = self.handshake(&mut messenger).await;

        if let Err(e) = &result {
            let status = match e.code() {
                ErrorCode::NoCommonTrustRoot => Some(SCStatusCodes::NoSharedTrustRoots),
                ErrorCode::Invalid
                | ErrorCode::InvalidData
                | ErrorCode::InvalidOpcode
                | ErrorCode::HandshakeFailure
                | ErrorCode::Crypto
                | ErrorCode::NoSpace => Some(SCStatusCodes::InvalidParameter),
                // Transport failures and peer-sent statuses get no reply
                _ => None,
            };
            if let Some(status) = status {
                let _ = messenger.send_status(status).await;
            }
        }

        messenger.close();
        result
    }

    async fn handshake<E: Exchange>(&self, messenger: &mut ScMessenger<E>) -> Result<(), Error> {
        let sigma1_bytes = messenger.read(OpCode::CASESigma1).await?;
        let sigma1 = Sigma1::from_tlv(&get_root_node_struct(&sigma1_bytes)?)?;

        if sigma1.initiator_random.len() != CASE_RANDOM_LEN
            || sigma1.initiator_eph_public_key.len() != EC_POINT_LEN
        {
            return Err(ErrorCode::InvalidData.into());
        }

        match (sigma1.resumption_id, sigma1.initiator_resume_mic) {
            (Some(resumption_id), Some(mic)) => {
                let resumption_id: [u8; RESUMPTION_ID_LEN] = resumption_id
                    .try_into()
                    .map_err(|_| ErrorCode::InvalidData)?;

                if let Some(record) = self.context.find_resumption_record(&resumption_id) {
                    self.resume(messenger, &sigma1, &resumption_id, mic, record)
                        .await
                } else {
                    // Unknown resumption id: fall through to a full handshake
                    self.full_handshake(messenger, &sigma1, &sigma1_bytes).await
                }
            }
            (None, None) => self.full_handshake(messenger, &sigma1, &sigma1_bytes).await,
            _ => {
                error!("Sigma1 carries only one of resumptionId/resumeMIC");
                Err(ErrorCode::Invalid.into())
            }
        }
    }

    async fn resume<E: Exchange>(
        &self,
        messenger: &mut ScMessenger<E>,
        sigma1: &Sigma1<'_>,
        peer_resumption_id: &[u8; RESUMPTION_ID_LEN],
        peer_resume_mic: &[u8],
        mut record: ResumptionRecord,
    ) -> Result<(), Error> {
        // S1RK = HKDF(sharedSecret, initiatorRandom ‖ peerResumptionId)
        let mut salt = [0u8; CASE_RANDOM_LEN + RESUMPTION_ID_LEN];
        salt[..CASE_RANDOM_LEN].copy_from_slice(sigma1.initiator_random);
        salt[CASE_RANDOM_LEN..].copy_from_slice(peer_resumption_id);

        let mut peer_resume_key = [0u8; AEAD_KEY_LEN];
        self.crypto
            .hkdf_sha256(&record.shared_secret, &salt, S1RK_INFO, &mut peer_resume_key)?;

        // A failed MIC is fatal; there is no silent fallback to the full path
        self.crypto
            .aead_decrypt(&peer_resume_key, RESUME1_MIC_NONCE, &[], peer_resume_mic)
            .map_err(|_| {
                error!("CASE resume: initiator resume MIC verification failed");
                Error::from(ErrorCode::HandshakeFailure)
            })?;

        let local_session_id = self.context.next_session_id();

        let mut resumption_id = [0u8; RESUMPTION_ID_LEN];
        self.crypto.fill_random(&mut resumption_id);

        // S2RK is derived over the newly issued resumption id
        let mut resume_salt = [0u8; CASE_RANDOM_LEN + RESUMPTION_ID_LEN];
        resume_salt[..CASE_RANDOM_LEN].copy_from_slice(sigma1.initiator_random);
        resume_salt[CASE_RANDOM_LEN..].copy_from_slice(&resumption_id);

        let mut resume_key = [0u8; AEAD_KEY_LEN];
        self.crypto
            .hkdf_sha256(&record.shared_secret, &resume_salt, S2RK_INFO, &mut resume_key)?;

        let resume_mic = self
            .crypto
            .aead_encrypt(&resume_key, RESUME2_MIC_NONCE, &[], &[])?;

        let session = SecureSession::new(
            local_session_id,
            sigma1.initiator_session_id,
            Some(record.fabric_index),
            Some(record.peer_node_id),
            &record.shared_secret,
            &salt,
            false,
            true,
            sigma1.session_params.unwrap_or_default(),
        )?;
        self.context.create_session(session);

        let sigma2_resume = Sigma2Resume {
            resumption_id: &resumption_id,
            sigma2_resume_mic: &resume_mic,
            responder_session_id: local_session_id,
        };
        if let Err(e) = messenger
            .send_with(OpCode::CASESigma2Resume, |tw| {
                sigma2_resume.to_tlv(&TagType::Anonymous, tw)
            })
            .await
        {
            self.context.remove_session(local_session_id);
            return Err(e);
        }

        if let Err(e) = messenger.wait_for_success().await {
            self.context.remove_session(local_session_id);
            return Err(e);
        }

        // Rotate the stored record to the newly issued id
        record.resumption_id = resumption_id;
        self.context.save_resumption_record(record);

        info!(
            "CASE session resumed: local_sessid={}, peer_sessid={}",
            local_session_id, sigma1.initiator_session_id
        );

        Ok(())
    }

    async fn full_handshake<E: Exchange>(
        &self,
        messenger: &mut ScMessenger<E>,
        sigma1: &Sigma1<'_>,
        sigma1_bytes: &[u8],
    ) -> Result<(), Error> {
        let fabric = self
            .context
            .find_fabric_from_destination_id(sigma1.destination_id, sigma1.initiator_random)
            .ok_or_else(|| {
                error!("Sigma1 destination id matches no local fabric");
                Error::from(ErrorCode::NoCommonTrustRoot)
            })?;

        let local_session_id = self.context.next_session_id();

        let mut responder_random = [0u8; CASE_RANDOM_LEN];
        self.crypto.fill_random(&mut responder_random);

        let mut resumption_id = [0u8; RESUMPTION_ID_LEN];
        self.crypto.fill_random(&mut resumption_id);

        let (eph_public_key, shared_secret) =
            self.crypto.ecdh(sigma1.initiator_eph_public_key)?;

        let sigma1_hash = self.crypto.sha256(&[sigma1_bytes]);
        let ipk = fabric.ipk();

        // sigma2Key = HKDF(Z, IPK ‖ responderRandom ‖ responderEphPub ‖ H(sigma1))
        let mut sigma2_salt = [0u8; IPK_LEN + CASE_RANDOM_LEN + EC_POINT_LEN + SHA256_HASH_LEN];
        {
            let mut wb = WriteBuf::new(&mut sigma2_salt);
            wb.append(ipk)?;
            wb.append(&responder_random)?;
            wb.append(&eph_public_key)?;
            wb.append(&sigma1_hash)?;
        }
        let mut sigma2_key = [0u8; AEAD_KEY_LEN];
        self.crypto
            .hkdf_sha256(&shared_secret, &sigma2_salt, S2K_INFO, &mut sigma2_key)?;

        let tbs = encode_sigma_tbs(
            fabric.noc(),
            fabric.icac(),
            &eph_public_key,
            sigma1.initiator_eph_public_key,
        )?;
        let signature = fabric.sign(&tbs)?;

        let tbe2 = encode_tbe2(fabric.noc(), fabric.icac(), &signature, &resumption_id)?;
        let encrypted2 = self
            .crypto
            .aead_encrypt(&sigma2_key, TBE_DATA2_NONCE, &[], &tbe2)?;

        let sigma2 = Sigma2 {
            responder_random: &responder_random,
            responder_session_id: local_session_id,
            responder_eph_public_key: &eph_public_key,
            encrypted2: &encrypted2,
            session_params: Some(SessionParameters::default()),
        };
        let sigma2_bytes = messenger
            .send_with(OpCode::CASESigma2, |tw| {
                sigma2.to_tlv(&TagType::Anonymous, tw)
            })
            .await?;

        let sigma3_bytes = messenger.read(OpCode::CASESigma3).await?;
        let sigma3 = Sigma3::from_tlv(&get_root_node_struct(&sigma3_bytes)?)?;

        // sigma3Key = HKDF(Z, IPK ‖ H(sigma1 ‖ sigma2))
        let transcript12 = self.crypto.sha256(&[sigma1_bytes, &sigma2_bytes]);
        let mut sigma3_salt = [0u8; IPK_LEN + SHA256_HASH_LEN];
        sigma3_salt[..IPK_LEN].copy_from_slice(ipk);
        sigma3_salt[IPK_LEN..].copy_from_slice(&transcript12);

        let mut sigma3_key = [0u8; AEAD_KEY_LEN];
        self.crypto
            .hkdf_sha256(&shared_secret, &sigma3_salt, S3K_INFO, &mut sigma3_key)?;

        let tbe3 = self
            .crypto
            .aead_decrypt(&sigma3_key, TBE_DATA3_NONCE, &[], sigma3.encrypted3)
            .map_err(|_| {
                error!("CASE: sigma3 decryption failed");
                Error::from(ErrorCode::HandshakeFailure)
            })?;

        let tbe3_root = get_root_node_struct(&tbe3)?;
        let peer_noc = tbe3_root.ctx(1)?.octet_str()?;
        let peer_icac = tbe3_root
            .find_ctx(2)?
            .map(|e| e.octet_str())
            .transpose()?;
        let peer_signature = tbe3_root.ctx(3)?.octet_str()?;

        fabric.verify_credentials(peer_noc, peer_icac).map_err(|_| {
            error!("CASE: peer credential verification failed");
            Error::from(ErrorCode::HandshakeFailure)
        })?;

        // Rebuild the signed data with the roles swapped
        let peer_tbs = encode_sigma_tbs(
            peer_noc,
            peer_icac,
            sigma1.initiator_eph_public_key,
            &eph_public_key,
        )?;
        let peer_public_key = fabric.public_key_from_noc(peer_noc)?;
        self.crypto
            .verify_signature(&peer_public_key, &peer_tbs, peer_signature)
            .map_err(|_| {
                error!("CASE: sigma3 signature verification failed");
                Error::from(ErrorCode::HandshakeFailure)
            })?;

        let peer_node_id = fabric.node_id_from_noc(peer_noc)?;

        // sessionSalt = IPK ‖ H(sigma1 ‖ sigma2 ‖ sigma3)
        let transcript123 = self
            .crypto
            .sha256(&[sigma1_bytes, &sigma2_bytes, &sigma3_bytes]);
        let mut session_salt = [0u8; IPK_LEN + SHA256_HASH_LEN];
        session_salt[..IPK_LEN].copy_from_slice(ipk);
        session_salt[IPK_LEN..].copy_from_slice(&transcript123);

        let session = SecureSession::new(
            local_session_id,
            sigma1.initiator_session_id,
            Some(fabric.index()),
            Some(peer_node_id),
            &shared_secret,
            &session_salt,
            false,
            false,
            sigma1.session_params.unwrap_or_default(),
        )?;
        self.context.create_session(session);

        if let Err(e) = messenger
            .send_status(SCStatusCodes::SessionEstablishmentSuccess)
            .await
        {
            self.context.remove_session(local_session_id);
            return Err(e);
        }

        self.context.save_resumption_record(ResumptionRecord {
            resumption_id,
            peer_node_id,
            fabric_index: fabric.index(),
            shared_secret,
        });

        info!(
            "CASE session established: local_sessid={}, peer_sessid={}, peer_node_id={:#x}",
            local_session_id, sigma1.initiator_session_id, peer_node_id
        );

        Ok(())
    }
}
