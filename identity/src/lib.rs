//! Load, generate, and sign with P-256 and SM2 keys, producing only canonical (low-S) signatures.
//!
//! Keys are closed enums over a [Curve]. Signing dispatches to the backend for the key's curve,
//! normalizes the resulting `(r, s)` pair to its low-S representative, and DER-encodes it. Because
//! both `(r, s)` and `(r, N - s)` verify for ECDSA, only emitting the low-S form gives every
//! signature produced by this crate exactly one byte encoding.
//!
//! # Example
//! ```rust
//! use commonware_identity::{Curve, Options, PrivateKey, Signer, Verifier};
//! use rand::rngs::OsRng;
//!
//! // Generate a new private key
//! let signer = PrivateKey::from_rng(Curve::NationalSm2, &mut OsRng);
//!
//! // Sign a digest
//! let opts = Options::default();
//! let signature = signer.sign(b"hello world", &opts).unwrap();
//!
//! // Verify the signature with the public key
//! let public_key = signer.public_key();
//! assert!(public_key.verify(&signature, b"hello world", &opts).unwrap());
//! ```
//!
//! # Status
//!
//! `commonware-identity` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.

use bytes::Bytes;
use thiserror::Error;

pub mod backend;
pub mod canonical;
pub mod curve;
pub use curve::Curve;
mod key;
pub use key::{PrivateKey, PublicKey};
pub mod keystore;
pub use keystore::KeyStore;
pub mod sha256;
pub use sha256::{hash, Digest};
pub mod signature;
pub use signature::Signature;

/// Errors that can occur when working with keys and signatures.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),
    #[error("PEM decode error: {0}")]
    PemDecode(String),
    #[error("key parse error: {0}")]
    KeyParse(String),
    #[error("buffer overflow: required {required} bytes, capacity {capacity}")]
    BufferOverflow { required: usize, capacity: usize },
}

/// Whether [Verifier::verify] accepts signatures whose `s` lies in the upper half of the order.
///
/// Signing never emits such signatures. For ECDSA both `(r, s)` and `(r, N - s)` satisfy the
/// verification equation, so accepting them only matters to systems that key state off the
/// signature bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LowS {
    /// Verify any `s` in `[1, N - 1]`.
    #[default]
    Accept,
    /// Return `false` for any signature with `s > floor(N / 2)`.
    Require,
}

/// Options provided to [Signer::sign] and [Verifier::verify].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// The distinguishing identifier mixed into SM2's `Z_A` pre-hash.
    ///
    /// Ignored for P-256.
    pub distinguishing_id: Vec<u8>,

    /// Verification policy for non-canonical signatures.
    pub low_s: LowS,
}

impl Options {
    /// Default SM2 distinguishing identifier (GB/T 32918.2).
    pub const DEFAULT_DISTINGUISHING_ID: &'static [u8] = b"1234567812345678";
}

impl Default for Options {
    fn default() -> Self {
        Self {
            distinguishing_id: Self::DEFAULT_DISTINGUISHING_ID.to_vec(),
            low_s: LowS::Accept,
        }
    }
}

/// Produces canonical, DER-encoded signatures over digests.
pub trait Signer: Send + Sync + Clone + 'static {
    /// Returns the [PublicKey] corresponding to this [Signer].
    fn public_key(&self) -> PublicKey;

    /// Sign a digest.
    ///
    /// The digest is signed as provided (P-256 treats it as the pre-hashed message, SM2 mixes it
    /// with `Z_A` before hashing with SM3). The returned `s` is always at most half the curve order.
    fn sign(&self, digest: &[u8], opts: &Options) -> Result<Bytes, Error>;
}

/// Verifies DER-encoded signatures over digests.
pub trait Verifier {
    /// Verify that `signature` is valid over `digest`.
    ///
    /// Returns [Error::MalformedSignature] only if `signature` cannot be decoded into `(r, s)`.
    /// A decodable signature that does not match returns `Ok(false)`.
    fn verify(&self, signature: &[u8], digest: &[u8], opts: &Options) -> Result<bool, Error>;
}
