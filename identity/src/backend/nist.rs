//! P-256 (secp256r1) backend.
//!
//! Signing is ECDSA over the provided digest using `p256`, with nonces generated as specified in
//! [RFC 6979](https://datatracker.ietf.org/doc/html/rfc6979). `p256` does not normalize `s`, so
//! roughly half of the raw signatures returned by [NistCurveBackend::sign] are high-S and are
//! canonicalized by the caller.

use super::{pad_digest, to_field_bytes, Backend};
use crate::{Curve, Error, Options, Signature};
use num_bigint::BigUint;
use p256::{
    ecdsa::{
        signature::hazmat::{PrehashSigner, PrehashVerifier},
        SigningKey, VerifyingKey,
    },
    elliptic_curve::sec1::ToEncodedPoint,
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey},
    PublicKey, SecretKey,
};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

/// P-256 implementation of [Backend].
#[derive(Clone, Copy, Debug)]
pub struct NistCurveBackend;

impl Backend for NistCurveBackend {
    const CURVE: Curve = Curve::NistP256;

    type PrivateKey = SecretKey;
    type PublicKey = PublicKey;

    fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> SecretKey {
        SecretKey::random(rng)
    }

    fn public_key(key: &SecretKey) -> PublicKey {
        key.public_key()
    }

    fn sign(key: &SecretKey, digest: &[u8], _: &Options) -> Result<Signature, Error> {
        if digest.is_empty() {
            return Err(Error::InvalidParameter("empty digest"));
        }
        let signer = SigningKey::from(key);
        let signature: p256::ecdsa::Signature = signer
            .sign_prehash(&pad_digest(digest))
            .map_err(|_| Error::InvalidParameter("digest cannot be signed"))?;
        let (r, s) = signature.split_bytes();
        Ok(Signature::new(
            BigUint::from_bytes_be(&r),
            BigUint::from_bytes_be(&s),
        ))
    }

    fn verify(key: &PublicKey, signature: &Signature, digest: &[u8], _: &Options) -> bool {
        if digest.is_empty() {
            return false;
        }
        let (Some(r), Some(s)) = (to_field_bytes(signature.r()), to_field_bytes(signature.s()))
        else {
            return false;
        };
        // Rejects r or s outside of [1, N - 1]
        let signature = match p256::ecdsa::Signature::from_scalars(r, s) {
            Ok(signature) => signature,
            Err(_) => return false,
        };
        let verifier = VerifyingKey::from(key);
        verifier
            .verify_prehash(&pad_digest(digest), &signature)
            .is_ok()
    }

    fn encode_point(key: &PublicKey) -> Vec<u8> {
        key.to_encoded_point(false).as_bytes().to_vec()
    }

    fn decode_point(bytes: &[u8]) -> Result<PublicKey, Error> {
        if bytes.len() != crate::curve::POINT_SIZE || bytes[0] != 0x04 {
            return Err(Error::KeyParse("point is not uncompressed".into()));
        }
        PublicKey::from_sec1_bytes(bytes).map_err(|e| Error::KeyParse(e.to_string()))
    }

    fn encode_private_pkcs8(key: &SecretKey) -> Result<Zeroizing<Vec<u8>>, Error> {
        let document = key
            .to_pkcs8_der()
            .map_err(|e| Error::KeyParse(e.to_string()))?;
        Ok(Zeroizing::new(document.as_bytes().to_vec()))
    }

    fn decode_private_pkcs8(der: &[u8]) -> Result<SecretKey, Error> {
        SecretKey::from_pkcs8_der(der).map_err(|e| Error::KeyParse(e.to_string()))
    }

    fn encode_public_spki(key: &PublicKey) -> Result<Vec<u8>, Error> {
        let document = key
            .to_public_key_der()
            .map_err(|e| Error::KeyParse(e.to_string()))?;
        Ok(document.as_bytes().to_vec())
    }

    fn decode_public_spki(der: &[u8]) -> Result<PublicKey, Error> {
        PublicKey::from_public_key_der(der).map_err(|e| Error::KeyParse(e.to_string()))
    }
}
