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

//! Collaborator seams towards the fabric and identity store.
//!
//! Certificate parsing and chain validation are deliberately behind the
//! [`Fabric`] trait: the secure channel hands opaque certificate bytes
//! through it and consumes only the verdicts and extracted fields.

use crate::crypto::{Crypto, SIGNATURE_LEN};
use crate::error::Error;
use crate::transport::session::{ResumptionRecord, SecureSession};

/// Identity Protection Key length
pub const IPK_LEN: usize = 16;
pub const DESTINATION_ID_LEN: usize = 32;

/// One fabric's operational identity, as the secure channel consumes it.
pub trait Fabric {
    /// The store-assigned index of this fabric
    fn index(&self) -> u8;

    /// This node's operational node id on the fabric
    fn node_id(&self) -> u64;

    /// The node operational certificate, Matter TLV encoded
    fn noc(&self) -> &[u8];

    /// The intermediate CA certificate, if the chain has one
    fn icac(&self) -> Option<&[u8]>;

    /// The fabric's Identity Protection Key
    fn ipk(&self) -> &[u8; IPK_LEN];

    /// Sign with the operational private key (raw r ‖ s)
    fn sign(&self, message: &[u8]) -> Result<[u8; SIGNATURE_LEN], Error>;

    /// Validate a peer's certificate chain against the fabric root
    fn verify_credentials(&self, noc: &[u8], icac: Option<&[u8]>) -> Result<(), Error>;

    /// Extract the subject public key (SEC1) from an operational certificate
    fn public_key_from_noc(&self, noc: &[u8]) -> Result<Vec<u8>, Error>;

    /// Extract the subject node id from an operational certificate
    fn node_id_from_noc(&self, noc: &[u8]) -> Result<u64, Error>;
}

/// What the CASE responder needs from the device/controller core.
///
/// Implementations typically wrap the session manager and the fabric table
/// with interior mutability; all methods take `&self`.
pub trait CaseContext {
    type Fabric: Fabric;

    /// Allocate a locally unused session id
    fn next_session_id(&self) -> u16;

    /// The fabric whose destination-id derivation matches, if any
    fn find_fabric_from_destination_id(
        &self,
        destination_id: &[u8],
        initiator_random: &[u8],
    ) -> Option<&Self::Fabric>;

    fn find_resumption_record(&self, resumption_id: &[u8; 16]) -> Option<ResumptionRecord>;

    fn save_resumption_record(&self, record: ResumptionRecord);

    fn create_session(&self, session: SecureSession);

    /// Drop a session created earlier during this handshake
    fn remove_session(&self, local_session_id: u16);
}

/// Compute a CASE destination id the way an initiator derives it:
/// HMAC(IPK, initiatorRandom ‖ rootPublicKey ‖ fabricId ‖ nodeId).
///
/// Fabric stores use this to match incoming sigma1 destination ids.
pub fn compute_destination_id<C: Crypto>(
    crypto: &C,
    ipk: &[u8; IPK_LEN],
    initiator_random: &[u8],
    root_public_key: &[u8],
    fabric_id: u64,
    node_id: u64,
) -> Result<[u8; DESTINATION_ID_LEN], Error> {
    crypto.hmac_sha256(
        ipk,
        &[
            initiator_random,
            root_public_key,
            &fabric_id.to_le_bytes(),
            &node_id.to_le_bytes(),
        ],
    )
}
