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

//! SPAKE2+ over P-256, as profiled by Matter for PASE.
//!
//! The prover side is what the PASE client runs; the verifier side is the
//! same algebra from the device's perspective and is used to exercise real
//! handshakes in tests.

use elliptic_curve::sec1::ToEncodedPoint;
use elliptic_curve::Field;
use p256::{ProjectivePoint, Scalar};

use crate::crypto::{
    p256_point_from_sec1, p256_scalar_mod_order, Crypto, EC_POINT_LEN, SHA256_HASH_LEN,
};
use crate::error::{Error, ErrorCode};

/// Context string hashed into the SPAKE2+ transcript
pub const SPAKE2P_CONTEXT_PREFIX: &[u8] = b"CHIP PAKE V1 Commissioning";

/// Size of each of the `w0s`/`w1s` PBKDF2 halves
pub const CRYPTO_W_SIZE_BYTES: usize = 40;

const CONFIRMATION_KEYS_INFO: &[u8] = b"ConfirmationKeys";

/// SPAKE2+ M point for P-256 (SEC1 uncompressed)
const SPAKE2P_M: [u8; 65] = [
    0x04, 0x88, 0x6e, 0x2f, 0x97, 0xac, 0xe4, 0x6e, 0x55, 0xba, 0x9d, 0xd7, 0x24, 0x25, 0x79,
    0xf2, 0x99, 0x3b, 0x64, 0xe1, 0x6e, 0xf3, 0xdc, 0xab, 0x95, 0xaf, 0xd4, 0x97, 0x33, 0x3d,
    0x8f, 0xa1, 0x2f, 0x5f, 0xf3, 0x55, 0x16, 0x3e, 0x43, 0xce, 0x22, 0x4e, 0x0b, 0x0e, 0x65,
    0xff, 0x02, 0xac, 0x8e, 0x5c, 0x7b, 0xe0, 0x94, 0x19, 0xc7, 0x85, 0xe0, 0xca, 0x54, 0x7d,
    0x55, 0xa1, 0x2e, 0x2d, 0x20,
];

/// SPAKE2+ N point for P-256 (SEC1 uncompressed)
const SPAKE2P_N: [u8; 65] = [
    0x04, 0xd8, 0xbb, 0xd6, 0xc6, 0x39, 0xc6, 0x29, 0x37, 0xb0, 0x4d, 0x99, 0x7f, 0x38, 0xc3,
    0x77, 0x07, 0x19, 0xc6, 0x29, 0xd7, 0x01, 0x4d, 0x49, 0xa2, 0x4b, 0x4f, 0x98, 0xba, 0xa1,
    0x29, 0x2b, 0x49, 0x07, 0xd6, 0x0a, 0xa6, 0xbf, 0xad, 0xe4, 0x50, 0x08, 0xa6, 0x36, 0x33,
    0x7f, 0x51, 0x68, 0xc6, 0x4d, 0x9b, 0xd3, 0x60, 0x34, 0x80, 0x8c, 0xd5, 0x64, 0x49, 0x0b,
    0x1e, 0x65, 0x6e, 0xdb, 0xe7,
];

/// The session key and the two key-confirmation MACs.
pub struct Spake2pSecrets {
    /// Shared symmetric key `Ke`
    pub ke: [u8; 16],
    /// The prover's confirmation (`hAY`): sent in Pake3, checked by the peer
    pub c_a: [u8; SHA256_HASH_LEN],
    /// The verifier's confirmation (`hBX`): sent in Pake2, checked locally
    pub c_b: [u8; SHA256_HASH_LEN],
}

/// Derive `(w0, w1)` from the PBKDF2 parameters and the setup passcode.
pub fn compute_w0_w1<C: Crypto>(
    crypto: &C,
    iterations: u32,
    salt: &[u8],
    passcode: u32,
) -> Result<(Scalar, Scalar), Error> {
    let mut w0s_w1s = [0u8; 2 * CRYPTO_W_SIZE_BYTES];
    crypto.pbkdf2_sha256(&passcode.to_le_bytes(), salt, iterations, &mut w0s_w1s)?;

    // w0 = w0s mod p, w1 = w1s mod p, where p is the group order
    let w0 = p256_scalar_mod_order(&w0s_w1s[..CRYPTO_W_SIZE_BYTES])?;
    let w1 = p256_scalar_mod_order(&w0s_w1s[CRYPTO_W_SIZE_BYTES..])?;
    Ok((w0, w1))
}

fn random_scalar<C: Crypto>(crypto: &C) -> Result<Scalar, Error> {
    loop {
        let mut wide = [0u8; 48];
        crypto.fill_random(&mut wide);
        let scalar = p256_scalar_mod_order(&wide)?;
        if scalar != Scalar::ZERO {
            return Ok(scalar);
        }
    }
}

fn point_bytes(point: ProjectivePoint) -> Result<[u8; EC_POINT_LEN], Error> {
    let encoded = point.to_affine().to_encoded_point(false);
    let mut out = [0u8; EC_POINT_LEN];
    let bytes = encoded.as_bytes();
    if bytes.len() != EC_POINT_LEN {
        // The identity encodes as a single byte
        return Err(ErrorCode::Crypto.into());
    }
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Hash the SPAKE2+ transcript and derive `Ke` and the confirmation MACs.
fn transcript_secrets<C: Crypto>(
    crypto: &C,
    context: &[u8; SHA256_HASH_LEN],
    pa: &[u8],
    pb: &[u8],
    z: &[u8],
    v: &[u8],
    w0: &Scalar,
) -> Result<Spake2pSecrets, Error> {
    fn lp(buf: &[u8]) -> [u8; 8] {
        (buf.len() as u64).to_le_bytes()
    }

    let w0_bytes = w0.to_bytes();
    let tt = crypto.sha256(&[
        &lp(context),
        context,
        &lp(&[]),
        &lp(&[]),
        &lp(&SPAKE2P_M),
        &SPAKE2P_M,
        &lp(&SPAKE2P_N),
        &SPAKE2P_N,
        &lp(pa),
        pa,
        &lp(pb),
        pb,
        &lp(z),
        z,
        &lp(v),
        v,
        &lp(&w0_bytes),
        &w0_bytes,
    ]);

    // Ka ‖ Ke = Hash(TT)
    let (ka, ke) = tt.split_at(16);

    // KcA ‖ KcB = KDF(nil, Ka, "ConfirmationKeys")
    let mut kca_kcb = [0u8; 32];
    crypto.hkdf_sha256(ka, &[], CONFIRMATION_KEYS_INFO, &mut kca_kcb)?;
    let (kca, kcb) = kca_kcb.split_at(16);

    // cA = HMAC(KcA, pB), cB = HMAC(KcB, pA)
    let c_a = crypto.hmac_sha256(kca, &[pb])?;
    let c_b = crypto.hmac_sha256(kcb, &[pa])?;

    let mut secrets = Spake2pSecrets {
        ke: [0; 16],
        c_a,
        c_b,
    };
    secrets.ke.copy_from_slice(ke);
    Ok(secrets)
}

/// The prover (commissioner) side of SPAKE2+.
pub struct Spake2pProver {
    context: [u8; SHA256_HASH_LEN],
    w0: Scalar,
    w1: Scalar,
    x: Scalar,
    pa: [u8; EC_POINT_LEN],
}

impl Spake2pProver {
    /// Construct the prover and compute its share `pA = x·P + w0·M`.
    pub fn new<C: Crypto>(
        crypto: &C,
        context: [u8; SHA256_HASH_LEN],
        w0: Scalar,
        w1: Scalar,
    ) -> Result<Self, Error> {
        let x = random_scalar(crypto)?;
        let m = ProjectivePoint::from(p256_point_from_sec1(&SPAKE2P_M)?);
        let pa = point_bytes(ProjectivePoint::GENERATOR * x + m * w0)?;

        Ok(Self {
            context,
            w0,
            w1,
            x,
            pa,
        })
    }

    pub fn pa(&self) -> &[u8; EC_POINT_LEN] {
        &self.pa
    }

    /// Complete the exchange against the verifier's share `pB`.
    ///
    /// `Z = x·(Y − w0·N)`, `V = w1·(Y − w0·N)`.
    pub fn complete<C: Crypto>(&self, crypto: &C, pb: &[u8]) -> Result<Spake2pSecrets, Error> {
        let y = ProjectivePoint::from(p256_point_from_sec1(pb)?);
        let n = ProjectivePoint::from(p256_point_from_sec1(&SPAKE2P_N)?);

        let base = y - n * self.w0;
        let z = point_bytes(base * self.x)?;
        let v = point_bytes(base * self.w1)?;

        transcript_secrets(crypto, &self.context, &self.pa, pb, &z, &v, &self.w0)
    }
}

/// The verifier (device) side of SPAKE2+.
pub struct Spake2pVerifier {
    context: [u8; SHA256_HASH_LEN],
    w0: Scalar,
    l: ProjectivePoint,
    y: Scalar,
    pb: [u8; EC_POINT_LEN],
}

impl Spake2pVerifier {
    /// Construct the verifier from `(w0, L = w1·P)` and compute its share
    /// `pB = y·P + w0·N`.
    pub fn new<C: Crypto>(
        crypto: &C,
        context: [u8; SHA256_HASH_LEN],
        w0: Scalar,
        w1: Scalar,
    ) -> Result<Self, Error> {
        let y = random_scalar(crypto)?;
        let n = ProjectivePoint::from(p256_point_from_sec1(&SPAKE2P_N)?);
        let pb = point_bytes(ProjectivePoint::GENERATOR * y + n * w0)?;

        Ok(Self {
            context,
            w0,
            l: ProjectivePoint::GENERATOR * w1,
            y,
            pb,
        })
    }

    pub fn pb(&self) -> &[u8; EC_POINT_LEN] {
        &self.pb
    }

    /// Complete the exchange against the prover's share `pA`.
    ///
    /// `Z = y·(X − w0·M)`, `V = y·L`.
    pub fn complete<C: Crypto>(&self, crypto: &C, pa: &[u8]) -> Result<Spake2pSecrets, Error> {
        let x = ProjectivePoint::from(p256_point_from_sec1(pa)?);
        let m = ProjectivePoint::from(p256_point_from_sec1(&SPAKE2P_M)?);

        let base = x - m * self.w0;
        let z = point_bytes(base * self.y)?;
        let v = point_bytes(self.l * self.y)?;

        transcript_secrets(crypto, &self.context, pa, &self.pb, &z, &v, &self.w0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::default_crypto;

    #[test]
    fn prover_and_verifier_agree() {
        let crypto = default_crypto(rand::thread_rng());

        let (w0, w1) =
            compute_w0_w1(&crypto, 1000, &[0, 1, 2, 3, 4, 5, 6, 7], 20202021).unwrap();
        let context = crypto.sha256(&[SPAKE2P_CONTEXT_PREFIX, b"req", b"resp"]);

        let prover = Spake2pProver::new(&crypto, context, w0, w1).unwrap();
        let verifier = Spake2pVerifier::new(&crypto, context, w0, w1).unwrap();

        let verifier_secrets = verifier.complete(&crypto, prover.pa()).unwrap();
        let prover_secrets = prover.complete(&crypto, verifier.pb()).unwrap();

        assert_eq!(prover_secrets.ke, verifier_secrets.ke);
        assert_eq!(prover_secrets.c_a, verifier_secrets.c_a);
        assert_eq!(prover_secrets.c_b, verifier_secrets.c_b);
    }

    #[test]
    fn wrong_passcode_diverges() {
        let crypto = default_crypto(rand::thread_rng());
        let salt = [9u8; 16];

        let (w0, w1) = compute_w0_w1(&crypto, 1000, &salt, 20202021).unwrap();
        let (w0_bad, w1_bad) = compute_w0_w1(&crypto, 1000, &salt, 20202020).unwrap();
        let context = crypto.sha256(&[SPAKE2P_CONTEXT_PREFIX]);

        let prover = Spake2pProver::new(&crypto, context, w0_bad, w1_bad).unwrap();
        let verifier = Spake2pVerifier::new(&crypto, context, w0, w1).unwrap();

        let verifier_secrets = verifier.complete(&crypto, prover.pa()).unwrap();
        let prover_secrets = prover.complete(&crypto, verifier.pb()).unwrap();

        assert_ne!(prover_secrets.ke, verifier_secrets.ke);
        assert_ne!(prover_secrets.c_b, verifier_secrets.c_b);
    }
}
