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

//! The cryptographic primitives consumed by the secure channel.
//!
//! Session establishment is generic over the [`Crypto`] trait so alternative
//! backends (hardware crypto, mbedTLS bindings) can be plugged in.
//! [`DefaultCrypto`] implements it on the RustCrypto stack.

use core::cell::RefCell;

use ccm::aead::{Aead, KeyInit, Payload};
use ccm::consts::{U13, U16};
use ccm::Ccm;
use crypto_bigint::{Encoding, NonZero, U384};
use elliptic_curve::generic_array::GenericArray;
use elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use elliptic_curve::{Field, PrimeField};
use hmac::{Hmac, Mac};
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::{AffinePoint, EncodedPoint, ProjectivePoint, Scalar};
use rand_core::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{Error, ErrorCode};

pub const SHA256_HASH_LEN: usize = 32;
pub const AEAD_KEY_LEN: usize = 16;
pub const AEAD_MIC_LEN: usize = 16;
pub const AEAD_NONCE_LEN: usize = 13;
/// Uncompressed SEC1 P-256 point
pub const EC_POINT_LEN: usize = 65;
pub const ECDH_SHARED_SECRET_LEN: usize = 32;
/// Raw (r ‖ s) P-256 ECDSA signature
pub const SIGNATURE_LEN: usize = 64;

type Aes128Ccm = Ccm<aes::Aes128, U16, U13>;

/// The primitives session establishment needs from a crypto backend.
pub trait Crypto {
    fn fill_random(&self, out: &mut [u8]);

    /// SHA-256 over the concatenation of `parts`
    fn sha256(&self, parts: &[&[u8]]) -> [u8; SHA256_HASH_LEN];

    /// HMAC-SHA256 over the concatenation of `parts`
    fn hmac_sha256(&self, key: &[u8], parts: &[&[u8]]) -> Result<[u8; SHA256_HASH_LEN], Error>;

    fn hkdf_sha256(&self, ikm: &[u8], salt: &[u8], info: &[u8], okm: &mut [u8])
        -> Result<(), Error>;

    fn pbkdf2_sha256(
        &self,
        input: &[u8],
        salt: &[u8],
        iterations: u32,
        okm: &mut [u8],
    ) -> Result<(), Error>;

    /// AES-128-CCM seal; returns ciphertext with the 16-byte tag appended
    fn aead_encrypt(
        &self,
        key: &[u8; AEAD_KEY_LEN],
        nonce: &[u8; AEAD_NONCE_LEN],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, Error>;

    /// AES-128-CCM open; `ciphertext` carries the 16-byte tag at its end
    fn aead_decrypt(
        &self,
        key: &[u8; AEAD_KEY_LEN],
        nonce: &[u8; AEAD_NONCE_LEN],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, Error>;

    /// Generate an ephemeral P-256 key pair and complete ECDH against the
    /// peer's SEC1-encoded public key. Returns the local public key
    /// (uncompressed SEC1) and the shared secret (x-coordinate).
    fn ecdh(
        &self,
        peer_public_key: &[u8],
    ) -> Result<([u8; EC_POINT_LEN], [u8; ECDH_SHARED_SECRET_LEN]), Error>;

    /// Verify a raw P-256 ECDSA signature against a SEC1 public key
    fn verify_signature(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), Error>;
}

impl<T: Crypto> Crypto for &T {
    fn fill_random(&self, out: &mut [u8]) {
        (*self).fill_random(out)
    }

    fn sha256(&self, parts: &[&[u8]]) -> [u8; SHA256_HASH_LEN] {
        (*self).sha256(parts)
    }

    fn hmac_sha256(&self, key: &[u8], parts: &[&[u8]]) -> Result<[u8; SHA256_HASH_LEN], Error> {
        (*self).hmac_sha256(key, parts)
    }

    fn hkdf_sha256(
        &self,
        ikm: &[u8],
        salt: &[u8],
        info: &[u8],
        okm: &mut [u8],
    ) -> Result<(), Error> {
        (*self).hkdf_sha256(ikm, salt, info, okm)
    }

    fn pbkdf2_sha256(
        &self,
        input: &[u8],
        salt: &[u8],
        iterations: u32,
        okm: &mut [u8],
    ) -> Result<(), Error> {
        (*self).pbkdf2_sha256(input, salt, iterations, okm)
    }

    fn aead_encrypt(
        &self,
        key: &[u8; AEAD_KEY_LEN],
        nonce: &[u8; AEAD_NONCE_LEN],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, Error> {
        (*self).aead_encrypt(key, nonce, aad, plaintext)
    }

    fn aead_decrypt(
        &self,
        key: &[u8; AEAD_KEY_LEN],
        nonce: &[u8; AEAD_NONCE_LEN],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, Error> {
        (*self).aead_decrypt(key, nonce, aad, ciphertext)
    }

    fn ecdh(
        &self,
        peer_public_key: &[u8],
    ) -> Result<([u8; EC_POINT_LEN], [u8; ECDH_SHARED_SECRET_LEN]), Error> {
        (*self).ecdh(peer_public_key)
    }

    fn verify_signature(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), Error> {
        (*self).verify_signature(public_key, message, signature)
    }
}

/// The P-256 group order, big-endian
const P256_ORDER_BE: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xbc, 0xe6, 0xfa, 0xad, 0xa7, 0x17, 0x9e, 0x84, 0xf3, 0xb9, 0xca, 0xc2, 0xfc, 0x63,
    0x25, 0x51,
];

/// Reduce up to 48 big-endian bytes modulo the P-256 group order.
///
/// The SPAKE2+ `w0s`/`w1s` expansion and ephemeral-scalar generation both
/// need an unbiased wide reduction.
pub(crate) fn p256_scalar_mod_order(wide: &[u8]) -> Result<Scalar, Error> {
    if wide.len() > 48 {
        return Err(ErrorCode::Crypto.into());
    }

    let mut expanded = [0u8; 48];
    expanded[48 - wide.len()..].copy_from_slice(wide);
    let value = U384::from_be_slice(&expanded);

    let mut order = [0u8; 48];
    order[16..].copy_from_slice(&P256_ORDER_BE);
    let order = Option::<NonZero<U384>>::from(NonZero::new(U384::from_be_slice(&order)))
        .ok_or(ErrorCode::Crypto)?;

    let reduced = value.rem(&order);
    let mut out = [0u8; 32];
    out.copy_from_slice(&reduced.to_be_bytes()[16..]);

    Option::<Scalar>::from(Scalar::from_repr(*GenericArray::from_slice(&out)))
        .ok_or_else(|| ErrorCode::Crypto.into())
}

pub(crate) fn p256_point_from_sec1(sec1: &[u8]) -> Result<AffinePoint, Error> {
    let encoded = EncodedPoint::from_bytes(sec1).map_err(|_| ErrorCode::Crypto)?;
    Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or_else(|| ErrorCode::Crypto.into())
}

/// The default software crypto backend.
pub struct DefaultCrypto<R: RngCore> {
    rng: RefCell<R>,
}

/// Create the default crypto backend around a random number generator.
pub fn default_crypto<R: RngCore>(rng: R) -> DefaultCrypto<R> {
    DefaultCrypto {
        rng: RefCell::new(rng),
    }
}

impl<R: RngCore> DefaultCrypto<R> {
    fn random_nonzero_scalar(&self) -> Result<Scalar, Error> {
        // A 48-byte draw reduced mod the order is statistically unbiased
        loop {
            let mut wide = [0u8; 48];
            self.fill_random(&mut wide);
            let scalar = p256_scalar_mod_order(&wide)?;
            if scalar != Scalar::ZERO {
                return Ok(scalar);
            }
        }
    }
}

impl<R: RngCore> Crypto for DefaultCrypto<R> {
    fn fill_random(&self, out: &mut [u8]) {
        self.rng.borrow_mut().fill_bytes(out)
    }

    fn sha256(&self, parts: &[&[u8]]) -> [u8; SHA256_HASH_LEN] {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize().into()
    }

    fn hmac_sha256(&self, key: &[u8], parts: &[&[u8]]) -> Result<[u8; SHA256_HASH_LEN], Error> {
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).map_err(|_| ErrorCode::Crypto)?;
        for part in parts {
            mac.update(part);
        }
        Ok(mac.finalize().into_bytes().into())
    }

    fn hkdf_sha256(
        &self,
        ikm: &[u8],
        salt: &[u8],
        info: &[u8],
        okm: &mut [u8],
    ) -> Result<(), Error> {
        hkdf::Hkdf::<Sha256>::new(Some(salt), ikm)
            .expand(info, okm)
            .map_err(|_| ErrorCode::Crypto.into())
    }

    fn pbkdf2_sha256(
        &self,
        input: &[u8],
        salt: &[u8],
        iterations: u32,
        okm: &mut [u8],
    ) -> Result<(), Error> {
        pbkdf2::pbkdf2::<Hmac<Sha256>>(input, salt, iterations, okm)
            .map_err(|_| ErrorCode::Crypto.into())
    }

    fn aead_encrypt(
        &self,
        key: &[u8; AEAD_KEY_LEN],
        nonce: &[u8; AEAD_NONCE_LEN],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let cipher = Aes128Ccm::new(GenericArray::from_slice(key));
        cipher
            .encrypt(
                GenericArray::from_slice(nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| ErrorCode::Crypto.into())
    }

    fn aead_decrypt(
        &self,
        key: &[u8; AEAD_KEY_LEN],
        nonce: &[u8; AEAD_NONCE_LEN],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let cipher = Aes128Ccm::new(GenericArray::from_slice(key));
        cipher
            .decrypt(
                GenericArray::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| ErrorCode::Crypto.into())
    }

    fn ecdh(
        &self,
        peer_public_key: &[u8],
    ) -> Result<([u8; EC_POINT_LEN], [u8; ECDH_SHARED_SECRET_LEN]), Error> {
        let peer = p256_point_from_sec1(peer_public_key)?;
        let secret = self.random_nonzero_scalar()?;

        let local = (ProjectivePoint::GENERATOR * secret)
            .to_affine()
            .to_encoded_point(false);
        let mut public_key = [0u8; EC_POINT_LEN];
        public_key.copy_from_slice(local.as_bytes());

        let shared_point = (ProjectivePoint::from(peer) * secret)
            .to_affine()
            .to_encoded_point(false);
        let mut shared_secret = [0u8; ECDH_SHARED_SECRET_LEN];
        shared_secret.copy_from_slice(shared_point.x().ok_or(ErrorCode::Crypto)?);

        Ok((public_key, shared_secret))
    }

    fn verify_signature(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), Error> {
        let key = VerifyingKey::from_sec1_bytes(public_key).map_err(|_| ErrorCode::Crypto)?;
        let signature = Signature::from_slice(signature).map_err(|_| ErrorCode::Crypto)?;
        key.verify(message, &signature)
            .map_err(|_| ErrorCode::Crypto.into())
    }
}
