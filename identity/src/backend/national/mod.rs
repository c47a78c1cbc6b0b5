//! SM2 backend.
//!
//! Private keys are opaque handles owned by the signing engine. Results of variable size
//! (signatures, PKCS8 documents) are written into buffers allocated here: when the engine reports
//! that a buffer is too small, the call is retried with the size it asked for, up to
//! [MAX_BUFFER_SIZE].
//!
//! SM2 signatures have no `(r, N - s)` symmetry, so a high-S signature cannot be normalized
//! after the fact. Instead, [NationalCurveBackend::sign] discards high-S signatures and signs
//! again with a fresh nonce, which makes every returned signature canonical.

use super::{to_field_bytes, Backend};
use crate::{canonical, Curve, Error, Options, Signature};
use rand::{rngs::OsRng, CryptoRng, RngCore};
use sm2::{
    elliptic_curve::{
        pkcs8::{DecodePublicKey, EncodePublicKey},
        sec1::ToEncodedPoint,
    },
    PublicKey,
};
use std::sync::Arc;
use tracing::{trace, warn};
use zeroize::Zeroizing;

mod engine;
use engine::{KeyHandle, Status};

/// Initial buffer size for DER signatures.
const SIGNATURE_BUFFER_SIZE: usize = 128;

/// Initial buffer size for PKCS8 documents.
const PKCS8_BUFFER_SIZE: usize = 1024;

/// Largest buffer the engine may ask for.
pub const MAX_BUFFER_SIZE: usize = 4096;

/// Number of nonces tried before giving up on finding a low-S signature.
const MAX_SIGN_ATTEMPTS: usize = 64;

/// Converts an engine `status` into an [Error], reporting `capacity` as the size of the buffer
/// the engine was given.
fn to_error(status: Status, capacity: usize) -> Error {
    match status {
        Status::BufferTooSmall { required } => Error::BufferOverflow { required, capacity },
        Status::InvalidKey => Error::InvalidParameter("invalid key"),
        Status::InvalidInput => Error::InvalidParameter("invalid input"),
    }
}

/// Call `f` with a buffer of `initial` bytes, growing it to the size the engine requests until
/// the call succeeds.
///
/// Fails with [Error::BufferOverflow] if the engine requests more than `max` bytes or asks for a
/// size that would not grow the buffer.
pub(crate) fn with_buffer<F>(
    initial: usize,
    max: usize,
    mut f: F,
) -> Result<Zeroizing<Vec<u8>>, Error>
where
    F: FnMut(&mut [u8]) -> Result<usize, Status>,
{
    let mut capacity = initial;
    loop {
        let mut buffer = Zeroizing::new(vec![0u8; capacity]);
        match f(&mut buffer) {
            Ok(written) if written <= capacity => {
                buffer.truncate(written);
                return Ok(buffer);
            }
            Ok(written) => {
                return Err(Error::BufferOverflow {
                    required: written,
                    capacity,
                });
            }
            Err(Status::BufferTooSmall { required }) if required > capacity && required <= max => {
                trace!(capacity, required, "growing engine buffer");
                capacity = required;
            }
            Err(status @ Status::BufferTooSmall { required }) => {
                warn!(capacity, required, max, "engine buffer request rejected");
                return Err(to_error(status, max.max(capacity)));
            }
            Err(status) => return Err(to_error(status, capacity)),
        }
    }
}

/// SM2 private key backed by an engine handle.
///
/// Clones share the handle, which is released when the last clone is dropped.
#[derive(Clone)]
pub struct PrivateKey {
    handle: Arc<KeyHandle>,
    public: PublicKey,
}

impl PrivateKey {
    fn new(handle: KeyHandle) -> Self {
        let public = handle.public_key().clone();
        Self {
            handle: Arc::new(handle),
            public,
        }
    }
}

/// SM2 implementation of [Backend].
#[derive(Clone, Copy, Debug)]
pub struct NationalCurveBackend;

impl Backend for NationalCurveBackend {
    const CURVE: Curve = Curve::NationalSm2;

    type PrivateKey = PrivateKey;
    type PublicKey = PublicKey;

    fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> PrivateKey {
        PrivateKey::new(KeyHandle::generate(rng))
    }

    fn public_key(key: &PrivateKey) -> PublicKey {
        key.public.clone()
    }

    fn sign(key: &PrivateKey, digest: &[u8], opts: &Options) -> Result<Signature, Error> {
        if digest.is_empty() {
            return Err(Error::InvalidParameter("empty digest"));
        }
        let order = Self::CURVE.order();
        for attempt in 0..MAX_SIGN_ATTEMPTS {
            let encoded = with_buffer(SIGNATURE_BUFFER_SIZE, MAX_BUFFER_SIZE, |out| {
                key.handle
                    .sign(&opts.distinguishing_id, digest, &mut OsRng, out)
            })?;
            let signature = Signature::decode(&encoded)?;
            if canonical::is_low_s(&order, signature.s()) {
                return Ok(signature);
            }
            trace!(attempt, "discarding high-S signature");
        }
        Err(Error::InvalidParameter("no low-S signature found"))
    }

    fn verify(key: &PublicKey, signature: &Signature, digest: &[u8], opts: &Options) -> bool {
        if digest.is_empty() {
            return false;
        }
        // Components that do not fit in a field element can never verify
        if to_field_bytes(signature.r()).is_none() || to_field_bytes(signature.s()).is_none() {
            return false;
        }
        let Ok(encoded) = signature.encode() else {
            return false;
        };
        engine::verify(key, &opts.distinguishing_id, &encoded, digest).unwrap_or(false)
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

    fn encode_private_pkcs8(key: &PrivateKey) -> Result<Zeroizing<Vec<u8>>, Error> {
        with_buffer(PKCS8_BUFFER_SIZE, MAX_BUFFER_SIZE, |out| {
            key.handle.export_pkcs8(out)
        })
    }

    fn decode_private_pkcs8(der: &[u8]) -> Result<PrivateKey, Error> {
        let handle = KeyHandle::import_pkcs8(der)
            .map_err(|_| Error::KeyParse("invalid SM2 private key".into()))?;
        Ok(PrivateKey::new(handle))
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
