//! Supported curve families.
//!
//! The set of curves is closed: adding a curve means adding a variant here and a
//! [crate::backend::Backend] for it.

use crate::Error;
use der::oid::ObjectIdentifier;
use num_bigint::BigUint;
use std::{fmt::Display, str::FromStr};

/// Size (in bytes) of a field element and of a scalar on every supported curve.
pub const FIELD_SIZE: usize = 32;

/// Size (in bytes) of an uncompressed point (`0x04 || X || Y`).
pub const POINT_SIZE: usize = 1 + 2 * FIELD_SIZE;

/// `id-ecPublicKey` (RFC 5480), the algorithm of every key container produced by this crate.
pub const EC_PUBLIC_KEY_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

const P256_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SM2_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.156.10197.1.301");

const P256_ORDER: [u8; FIELD_SIZE] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xbc, 0xe6, 0xfa, 0xad, 0xa7, 0x17, 0x9e, 0x84, 0xf3, 0xb9, 0xca, 0xc2, 0xfc, 0x63, 0x25, 0x51,
];

const SM2_ORDER: [u8; FIELD_SIZE] = [
    0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x72, 0x03, 0xdf, 0x6b, 0x21, 0xc6, 0x05, 0x2b, 0x53, 0xbb, 0xf4, 0x09, 0x39, 0xd5, 0x41, 0x23,
];

/// A named elliptic curve and the signature conventions used for keys on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Curve {
    /// NIST P-256 (secp256r1) with ECDSA.
    NistP256,
    /// SM2 (GB/T 32918) with the SM2 signature algorithm over SM3.
    NationalSm2,
}

impl Curve {
    /// Selector accepted by [FromStr] for [Curve::NistP256].
    pub const ECDSA: &'static str = "ecdsa";

    /// Selector accepted by [FromStr] for [Curve::NationalSm2].
    pub const SM2: &'static str = "sm2";

    /// Returns the algorithm selector of the curve.
    pub fn name(&self) -> &'static str {
        match self {
            Curve::NistP256 => Self::ECDSA,
            Curve::NationalSm2 => Self::SM2,
        }
    }

    /// Returns the order `N` of the curve's generator.
    pub fn order(&self) -> BigUint {
        match self {
            Curve::NistP256 => BigUint::from_bytes_be(&P256_ORDER),
            Curve::NationalSm2 => BigUint::from_bytes_be(&SM2_ORDER),
        }
    }

    /// Returns the registered object identifier of the curve (the `namedCurve` parameter of
    /// `id-ecPublicKey`).
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            Curve::NistP256 => P256_OID,
            Curve::NationalSm2 => SM2_OID,
        }
    }

    /// Returns the curve registered under `oid`, if it is supported.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        if *oid == P256_OID {
            Some(Curve::NistP256)
        } else if *oid == SM2_OID {
            Some(Curve::NationalSm2)
        } else {
            None
        }
    }
}

impl FromStr for Curve {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::ECDSA => Ok(Curve::NistP256),
            Self::SM2 => Ok(Curve::NationalSm2),
            _ => Err(Error::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl Display for Curve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::elliptic_curve::{scalar::IsHigh, Field, PrimeField};

    #[test]
    fn test_from_str() {
        assert_eq!("ecdsa".parse::<Curve>().unwrap(), Curve::NistP256);
        assert_eq!("sm2".parse::<Curve>().unwrap(), Curve::NationalSm2);
        assert!(matches!(
            "rsa".parse::<Curve>(),
            Err(Error::UnsupportedAlgorithm(alg)) if alg == "rsa"
        ));
        assert!("ECDSA".parse::<Curve>().is_err());
        assert!("".parse::<Curve>().is_err());
    }

    #[test]
    fn test_name_round_trip() {
        for curve in [Curve::NistP256, Curve::NationalSm2] {
            assert_eq!(curve.name().parse::<Curve>().unwrap(), curve);
            assert_eq!(curve.to_string(), curve.name());
        }
    }

    #[test]
    fn test_oid_round_trip() {
        for curve in [Curve::NistP256, Curve::NationalSm2] {
            assert_eq!(Curve::from_oid(&curve.oid()), Some(curve));
        }
        assert_eq!(Curve::from_oid(&EC_PUBLIC_KEY_OID), None);
    }

    #[test]
    fn test_p256_half_order_matches_scalar() {
        // The largest scalar that is not "high" is exactly floor(N / 2).
        let half = Curve::NistP256.order() >> 1u32;
        let mut repr = [0u8; FIELD_SIZE];
        let bytes = half.to_bytes_be();
        repr[FIELD_SIZE - bytes.len()..].copy_from_slice(&bytes);
        let scalar = p256::Scalar::from_repr(repr.into()).unwrap();
        assert!(!bool::from(scalar.is_high()));
        let next = scalar + p256::Scalar::ONE;
        assert!(bool::from(next.is_high()));
    }

    #[test]
    fn test_orders_are_odd() {
        for curve in [Curve::NistP256, Curve::NationalSm2] {
            assert!(curve.order().bit(0));
            assert_eq!(curve.order().bits(), 256);
        }
    }
}
