//! Low-S normalization of `(r, s)` signatures.
//!
//! For any valid ECDSA signature `(r, s)`, `(r, N - s)` is also valid. To give every signature a
//! single canonical representative, signers replace `s` with `N - s` whenever `s` exceeds
//! `floor(N / 2)` (see [BIP 62](https://github.com/bitcoin/bips/blob/master/bip-0062.mediawiki#low-s-values-in-signatures)).
//! Verifiers can use [is_low_s] to reject signatures that are not in this form.

use crate::{Error, Signature};
use num_bigint::BigUint;
use num_traits::Zero;

/// Returns `floor(order / 2)`.
pub fn half_order(order: &BigUint) -> BigUint {
    order >> 1u32
}

/// Returns whether `s` is at most `floor(order / 2)`.
pub fn is_low_s(order: &BigUint, s: &BigUint) -> bool {
    *s <= half_order(order)
}

/// Normalize `signature` to its low-S form relative to `order`.
///
/// Signatures that are already canonical are returned unchanged, so applying this function
/// repeatedly yields the same result as applying it once. A zero `order` or an `s` outside of
/// `[1, order - 1]` cannot come from a valid signature and is rejected.
pub fn to_low_s(order: &BigUint, signature: Signature) -> Result<Signature, Error> {
    if order.is_zero() {
        return Err(Error::InvalidParameter("zero parameter"));
    }
    if signature.s().is_zero() || signature.s() >= order {
        return Err(Error::InvalidParameter("s is not in [1, N - 1]"));
    }
    if is_low_s(order, signature.s()) {
        return Ok(signature);
    }
    let (r, s) = signature.into_parts();
    Ok(Signature::new(r, order - s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Curve;

    fn signature(s: BigUint) -> Signature {
        Signature::new(BigUint::from(7u32), s)
    }

    #[test]
    fn test_small_order() {
        let order = BigUint::from(11u32);
        assert_eq!(half_order(&order), BigUint::from(5u32));
        for s in 1..11u32 {
            let normalized = to_low_s(&order, signature(BigUint::from(s))).unwrap();
            let expected = if s <= 5 { s } else { 11 - s };
            assert_eq!(normalized.s(), &BigUint::from(expected));
            assert_eq!(normalized.r(), &BigUint::from(7u32));
        }
    }

    #[test]
    fn test_boundaries() {
        for curve in [Curve::NistP256, Curve::NationalSm2] {
            let order = curve.order();
            let half = half_order(&order);

            // floor(N / 2) is already canonical
            let normalized = to_low_s(&order, signature(half.clone())).unwrap();
            assert_eq!(normalized.s(), &half);

            // floor(N / 2) + 1 maps to N - (floor(N / 2) + 1) = floor(N / 2) (N is odd)
            let high = &half + 1u32;
            let normalized = to_low_s(&order, signature(high)).unwrap();
            assert_eq!(normalized.s(), &half);

            // N - 1 maps to 1
            let normalized = to_low_s(&order, signature(&order - 1u32)).unwrap();
            assert_eq!(normalized.s(), &BigUint::from(1u32));
        }
    }

    #[test]
    fn test_idempotent() {
        let order = Curve::NistP256.order();
        for s in [
            BigUint::from(1u32),
            half_order(&order),
            half_order(&order) + 12345u32,
            &order - 2u32,
        ] {
            let once = to_low_s(&order, signature(s)).unwrap();
            let twice = to_low_s(&order, once.clone()).unwrap();
            assert_eq!(once, twice);
            assert!(is_low_s(&order, once.s()));
        }
    }

    #[test]
    fn test_zero_order() {
        let result = to_low_s(&BigUint::zero(), signature(BigUint::from(1u32)));
        assert!(matches!(result, Err(Error::InvalidParameter(msg)) if msg.contains("zero parameter")));
    }

    #[test]
    fn test_out_of_range() {
        let order = Curve::NationalSm2.order();
        assert!(to_low_s(&order, signature(BigUint::zero())).is_err());
        assert!(to_low_s(&order, signature(order.clone())).is_err());
        assert!(to_low_s(&order, signature(&order + 1u32)).is_err());
    }
}
