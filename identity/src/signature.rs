//! Curve-agnostic `(r, s)` signatures and their DER encoding.
//!
//! Signatures are encoded as `SEQUENCE { r INTEGER, s INTEGER }` (SEC 1, Version 2.0,
//! Appendix C.8). DER admits exactly one encoding per `(r, s)` pair, so once `s` is canonical
//! (see [crate::canonical]) a signature has exactly one byte representation.

use crate::Error;
use bytes::Bytes;
use der::{asn1::UintRef, Decode, Encode, Sequence};
use num_bigint::BigUint;
use num_traits::Zero;

#[derive(Sequence)]
struct SignatureValue<'a> {
    r: UintRef<'a>,
    s: UintRef<'a>,
}

/// An `(r, s)` signature pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    r: BigUint,
    s: BigUint,
}

impl Signature {
    /// Create a signature from its components.
    pub fn new(r: BigUint, s: BigUint) -> Self {
        Self { r, s }
    }

    /// Returns `r`.
    pub fn r(&self) -> &BigUint {
        &self.r
    }

    /// Returns `s`.
    pub fn s(&self) -> &BigUint {
        &self.s
    }

    /// Consume the signature, returning `(r, s)`.
    pub fn into_parts(self) -> (BigUint, BigUint) {
        (self.r, self.s)
    }

    /// DER-encode the signature.
    pub fn encode(&self) -> Result<Bytes, Error> {
        let r = self.r.to_bytes_be();
        let s = self.s.to_bytes_be();
        let value = SignatureValue {
            r: UintRef::new(&r).map_err(|_| Error::InvalidParameter("r is not encodable"))?,
            s: UintRef::new(&s).map_err(|_| Error::InvalidParameter("s is not encodable"))?,
        };
        let encoded = value
            .to_der()
            .map_err(|_| Error::InvalidParameter("signature is not encodable"))?;
        Ok(Bytes::from(encoded))
    }

    /// Decode a DER-encoded signature.
    ///
    /// Fails with [Error::MalformedSignature] if `bytes` is not exactly one DER sequence of two
    /// positive integers.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let value =
            SignatureValue::from_der(bytes).map_err(|e| Error::MalformedSignature(e.to_string()))?;
        let r = BigUint::from_bytes_be(value.r.as_bytes());
        let s = BigUint::from_bytes_be(value.s.as_bytes());
        if r.is_zero() {
            return Err(Error::MalformedSignature("r must be larger than zero".into()));
        }
        if s.is_zero() {
            return Err(Error::MalformedSignature("s must be larger than zero".into()));
        }
        Ok(Self { r, s })
    }
}
