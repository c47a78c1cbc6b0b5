//! Curve backends.
//!
//! Each [Curve] is served by exactly one [Backend]. Backends produce and check raw `(r, s)`
//! pairs; canonicalization and encoding happen in [crate::PrivateKey] and [crate::PublicKey] so
//! that every backend shares one pipeline.
//!
//! - [NistCurveBackend]: P-256 using generic elliptic-curve arithmetic from `p256`.
//! - [NationalCurveBackend]: SM2 delegated to an opaque-handle engine that writes its results into
//!   caller-supplied buffers.

use crate::{curve::FIELD_SIZE, Curve, Error, Options, Signature};
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use std::borrow::Cow;
use zeroize::Zeroizing;

pub mod national;
pub use national::NationalCurveBackend;
pub mod nist;
pub use nist::NistCurveBackend;

/// Raw signing, verification, and encoding over a single curve.
pub trait Backend {
    /// The curve served by this backend.
    const CURVE: Curve;

    /// Private key material owned by this backend.
    type PrivateKey: Clone + Send + Sync + 'static;

    /// Public key material owned by this backend.
    type PublicKey: Clone + PartialEq + Send + Sync + 'static;

    /// Create a fresh private key using the supplied RNG.
    fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self::PrivateKey;

    /// Derive the public key of `key` (scalar multiplication by the generator).
    fn public_key(key: &Self::PrivateKey) -> Self::PublicKey;

    /// Sign `digest`, returning the raw (not yet canonicalized) signature.
    ///
    /// Fails with [Error::InvalidParameter] if `digest` is empty.
    fn sign(key: &Self::PrivateKey, digest: &[u8], opts: &Options) -> Result<Signature, Error>;

    /// Verify `signature` over `digest`.
    ///
    /// Returns `false` for any signature that does not satisfy the verification equation,
    /// including signatures whose components are out of range.
    fn verify(
        key: &Self::PublicKey,
        signature: &Signature,
        digest: &[u8],
        opts: &Options,
    ) -> bool;

    /// Encode `key` as an uncompressed point (`0x04 || X || Y`).
    fn encode_point(key: &Self::PublicKey) -> Vec<u8>;

    /// Decode an uncompressed point.
    fn decode_point(bytes: &[u8]) -> Result<Self::PublicKey, Error>;

    /// Encode `key` as a PKCS8 `PrivateKeyInfo`.
    fn encode_private_pkcs8(key: &Self::PrivateKey) -> Result<Zeroizing<Vec<u8>>, Error>;

    /// Decode a PKCS8 `PrivateKeyInfo` whose curve has already been checked.
    fn decode_private_pkcs8(der: &[u8]) -> Result<Self::PrivateKey, Error>;

    /// Encode `key` as a `SubjectPublicKeyInfo`.
    fn encode_public_spki(key: &Self::PublicKey) -> Result<Vec<u8>, Error>;

    /// Decode a `SubjectPublicKeyInfo` whose curve has already been checked.
    fn decode_public_spki(der: &[u8]) -> Result<Self::PublicKey, Error>;
}

/// Left-pad (or pass through) a digest so it can be interpreted as a big-endian field element.
///
/// Digests longer than the field are truncated to their leftmost bits by the signing primitive.
pub(crate) fn pad_digest(digest: &[u8]) -> Cow<'_, [u8]> {
    if digest.len() >= FIELD_SIZE {
        return Cow::Borrowed(digest);
    }
    let mut padded = vec![0u8; FIELD_SIZE];
    padded[FIELD_SIZE - digest.len()..].copy_from_slice(digest);
    Cow::Owned(padded)
}

/// Convert `value` into a big-endian, zero-padded field element.
///
/// Returns `None` if `value` does not fit.
pub(crate) fn to_field_bytes(value: &BigUint) -> Option<[u8; FIELD_SIZE]> {
    let bytes = value.to_bytes_be();
    if bytes.len() > FIELD_SIZE {
        return None;
    }
    let mut out = [0u8; FIELD_SIZE];
    out[FIELD_SIZE - bytes.len()..].copy_from_slice(&bytes);
    Some(out)
}
