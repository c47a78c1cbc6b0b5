//! SM2 signing engine (GB/T 32918.2).
//!
//! Keys live behind opaque [KeyHandle]s that never expose their scalar. Operations that produce
//! variable-length output write into a caller-supplied buffer and report
//! [Status::BufferTooSmall] (with the required size) when it cannot hold the result.

use crate::{backend::to_field_bytes, Signature};
use num_bigint::BigUint;
use num_traits::Zero;
use rand::{CryptoRng, RngCore};
use sm2::{
    elliptic_curve::{
        bigint::U256,
        group::{Curve as _, Group},
        ops::Reduce,
        pkcs8::{DecodePrivateKey, EncodePrivateKey},
        point::AffineCoordinates,
        sec1::ToEncodedPoint,
        Field, PrimeField,
    },
    FieldBytes, NonZeroScalar, ProjectivePoint, PublicKey, Scalar, SecretKey,
};
use sm3::{Digest, Sm3};
use tracing::trace;

/// Coefficient `a` of the SM2 curve equation.
const CURVE_A: [u8; 32] = [
    0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfc,
];

/// Coefficient `b` of the SM2 curve equation.
const CURVE_B: [u8; 32] = [
    0x28, 0xe9, 0xfa, 0x9e, 0x9d, 0x9f, 0x5e, 0x34, 0x4d, 0x5a, 0x9e, 0x4b, 0xcf, 0x65, 0x09, 0xa7,
    0xf3, 0x97, 0x89, 0xf5, 0x15, 0xab, 0x8f, 0x92, 0xdd, 0xbc, 0xbd, 0x41, 0x4d, 0x94, 0x0e, 0x93,
];

/// Outcome of a failed engine call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// The output buffer must hold at least `required` bytes.
    BufferTooSmall { required: usize },
    /// The key could not be imported, exported, or used.
    InvalidKey,
    /// An input (distinguishing ID or signature) is malformed.
    InvalidInput,
}

/// Opaque reference to an SM2 key pair held by the engine.
///
/// The secret scalar is zeroized when the handle is dropped.
pub struct KeyHandle {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyHandle {
    /// Generate a new key pair.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_secret(SecretKey::random(rng))
    }

    /// Import a key pair from a PKCS8 `PrivateKeyInfo`.
    pub fn import_pkcs8(der: &[u8]) -> Result<Self, Status> {
        let secret = SecretKey::from_pkcs8_der(der).map_err(|_| Status::InvalidKey)?;
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        trace!("allocated SM2 key handle");
        Self { secret, public }
    }

    /// Returns the public point of the key pair.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Export the key pair as a PKCS8 `PrivateKeyInfo` into `out`.
    pub fn export_pkcs8(&self, out: &mut [u8]) -> Result<usize, Status> {
        let document = self.secret.to_pkcs8_der().map_err(|_| Status::InvalidKey)?;
        write(document.as_bytes(), out)
    }

    /// Sign `message` on behalf of `id`, writing a DER signature into `out`.
    pub fn sign<R: RngCore + CryptoRng>(
        &self,
        id: &[u8],
        message: &[u8],
        rng: &mut R,
        out: &mut [u8],
    ) -> Result<usize, Status> {
        let e = message_scalar(id, &self.public, message)?;
        let d = self.secret.to_nonzero_scalar();

        // (1 + d) is zero only for d = N - 1, which cannot sign
        let inverse: Option<Scalar> = (Scalar::ONE + *d).invert().into();
        let inverse = inverse.ok_or(Status::InvalidKey)?;
        loop {
            let k = NonZeroScalar::random(&mut *rng);
            let point = (ProjectivePoint::GENERATOR * *k).to_affine();
            let r = e + <Scalar as Reduce<U256>>::reduce_bytes(&point.x());
            if bool::from(r.is_zero()) || bool::from((r + *k).is_zero()) {
                continue;
            }
            let s = inverse * (*k - r * *d);
            if bool::from(s.is_zero()) {
                continue;
            }
            let signature = Signature::new(to_biguint(&r), to_biguint(&s));
            let encoded = signature.encode().map_err(|_| Status::InvalidInput)?;
            return write(&encoded, out);
        }
    }
}

impl Drop for KeyHandle {
    fn drop(&mut self) {
        trace!("released SM2 key handle");
    }
}

/// Verify a DER `signature` over `message` on behalf of `id`.
///
/// Returns `Ok(false)` for a well-formed signature that does not verify.
pub fn verify(
    public: &PublicKey,
    id: &[u8],
    signature: &[u8],
    message: &[u8],
) -> Result<bool, Status> {
    let signature = Signature::decode(signature).map_err(|_| Status::InvalidInput)?;
    let e = message_scalar(id, public, message)?;
    let (Some(r), Some(s)) = (to_scalar(signature.r()), to_scalar(signature.s())) else {
        return Ok(false);
    };
    let t = r + s;
    if bool::from(t.is_zero()) {
        return Ok(false);
    }
    let point = ProjectivePoint::GENERATOR * s + public.to_projective() * t;
    if bool::from(point.is_identity()) {
        return Ok(false);
    }
    let x = <Scalar as Reduce<U256>>::reduce_bytes(&point.to_affine().x());
    Ok(e + x == r)
}

/// Computes `Z_A = SM3(ENTL || ID || a || b || xG || yG || xA || yA)`.
fn identity_hash(id: &[u8], public: &PublicKey) -> Result<FieldBytes, Status> {
    let bits = id.len().checked_mul(8).ok_or(Status::InvalidInput)?;
    let entl = u16::try_from(bits).map_err(|_| Status::InvalidInput)?;

    let generator = ProjectivePoint::GENERATOR.to_affine().to_encoded_point(false);
    let point = public.to_encoded_point(false);
    let mut hasher = Sm3::new();
    hasher.update(entl.to_be_bytes());
    hasher.update(id);
    hasher.update(CURVE_A);
    hasher.update(CURVE_B);
    hasher.update(&generator.as_bytes()[1..]);
    hasher.update(&point.as_bytes()[1..]);
    Ok(hasher.finalize())
}

/// Computes `e = SM3(Z_A || M) mod N`.
fn message_scalar(id: &[u8], public: &PublicKey, message: &[u8]) -> Result<Scalar, Status> {
    let z = identity_hash(id, public)?;
    let mut hasher = Sm3::new();
    hasher.update(z);
    hasher.update(message);
    Ok(<Scalar as Reduce<U256>>::reduce_bytes(&hasher.finalize()))
}

fn to_biguint(scalar: &Scalar) -> BigUint {
    BigUint::from_bytes_be(&scalar.to_repr())
}

/// Returns `value` as a scalar if it lies in `[1, N - 1]`.
fn to_scalar(value: &BigUint) -> Option<Scalar> {
    if value.is_zero() {
        return None;
    }
    let bytes = to_field_bytes(value)?;
    Option::from(Scalar::from_repr(bytes.into()))
}

fn write(value: &[u8], out: &mut [u8]) -> Result<usize, Status> {
    let Some(dst) = out.get_mut(..value.len()) else {
        return Err(Status::BufferTooSmall {
            required: value.len(),
        });
    };
    dst.copy_from_slice(value);
    Ok(value.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::{Signer as _, Verifier as _};
    use rand::{rngs::StdRng, SeedableRng};
    use sm2::dsa;

    const ID: &[u8] = b"1234567812345678";
    const DIST_ID: &str = "1234567812345678";

    /// Prime `p` of the SM2 base field.
    const FIELD_MODULUS: [u8; 32] = [
        0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff,
    ];

    fn handle(seed: u64) -> KeyHandle {
        KeyHandle::generate(&mut StdRng::seed_from_u64(seed))
    }

    fn sign(handle: &KeyHandle, message: &[u8]) -> Vec<u8> {
        let mut out = [0u8; 128];
        let mut rng = StdRng::seed_from_u64(99);
        let len = handle.sign(ID, message, &mut rng, &mut out).unwrap();
        out[..len].to_vec()
    }

    #[test]
    fn test_sign_verify() {
        let handle = handle(1);
        let signature = sign(&handle, b"message");
        assert!(verify(handle.public_key(), ID, &signature, b"message").unwrap());
        assert!(!verify(handle.public_key(), ID, &signature, b"massage").unwrap());
        assert!(!verify(handle.public_key(), b"other", &signature, b"message").unwrap());
    }

    #[test]
    fn test_wrong_key() {
        let signer = handle(1);
        let other = handle(2);
        let signature = sign(&signer, b"message");
        assert!(!verify(other.public_key(), ID, &signature, b"message").unwrap());
    }

    #[test]
    fn test_buffer_too_small() {
        let handle = handle(3);
        let mut rng = StdRng::seed_from_u64(0);
        let mut out = [0u8; 8];
        let status = handle.sign(ID, b"message", &mut rng, &mut out).unwrap_err();
        let Status::BufferTooSmall { required } = status else {
            panic!("unexpected status: {status:?}");
        };
        assert!(required > 8 && required <= 72);

        let mut out = [0u8; 16];
        assert!(matches!(
            handle.export_pkcs8(&mut out),
            Err(Status::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_export_import() {
        let original = handle(4);
        let mut out = vec![0u8; 1024];
        let len = original.export_pkcs8(&mut out).unwrap();
        let imported = KeyHandle::import_pkcs8(&out[..len]).unwrap();
        assert_eq!(imported.public_key(), original.public_key());

        let signature = sign(&imported, b"message");
        assert!(verify(original.public_key(), ID, &signature, b"message").unwrap());
    }

    #[test]
    fn test_import_invalid() {
        assert_eq!(
            KeyHandle::import_pkcs8(&[0x30, 0x00]).err(),
            Some(Status::InvalidKey)
        );
    }

    #[test]
    fn test_verify_malformed() {
        let handle = handle(5);
        assert_eq!(
            verify(handle.public_key(), ID, &[0x30], b"message"),
            Err(Status::InvalidInput)
        );
    }

    #[test]
    fn test_verify_out_of_range() {
        let handle = handle(6);
        let signature = Signature::decode(&sign(&handle, b"message")).unwrap();
        let order = crate::Curve::NationalSm2.order();
        let forged = Signature::new(signature.r() + &order, signature.s().clone())
            .encode()
            .unwrap();
        assert!(!verify(handle.public_key(), ID, &forged, b"message").unwrap());
    }

    #[test]
    fn test_negated_s_rejected() {
        // Unlike ECDSA, (r, N - s) does not verify under SM2
        let handle = handle(7);
        let signature = Signature::decode(&sign(&handle, b"message")).unwrap();
        let order = crate::Curve::NationalSm2.order();
        let negated = Signature::new(signature.r().clone(), &order - signature.s())
            .encode()
            .unwrap();
        assert!(!verify(handle.public_key(), ID, &negated, b"message").unwrap());
    }

    #[test]
    fn test_curve_coefficients() {
        let p = BigUint::from_bytes_be(&FIELD_MODULUS);
        let a = BigUint::from_bytes_be(&CURVE_A);
        let b = BigUint::from_bytes_be(&CURVE_B);
        assert_eq!(&a + 3u32, p);

        // The generator must satisfy y^2 = x^3 + ax + b (mod p)
        let generator = ProjectivePoint::GENERATOR.to_affine().to_encoded_point(false);
        let x = BigUint::from_bytes_be(generator.x().unwrap());
        let y = BigUint::from_bytes_be(generator.y().unwrap());
        let lhs = (&y * &y) % &p;
        let rhs = (&x * &x * &x + &a * &x + &b) % &p;
        assert_eq!(lhs, rhs);
    }

    /// Returns the fixed-width `r || s` encoding of a DER signature.
    fn to_fixed(der: &[u8]) -> [u8; 64] {
        let signature = Signature::decode(der).unwrap();
        let mut fixed = [0u8; 64];
        fixed[..32].copy_from_slice(&to_field_bytes(signature.r()).unwrap());
        fixed[32..].copy_from_slice(&to_field_bytes(signature.s()).unwrap());
        fixed
    }

    #[test]
    fn test_signatures_verify_with_sm2_dsa() {
        for seed in 0..8u64 {
            let handle = handle(100 + seed);
            let message = format!("hello world {seed}");
            let signature = sign(&handle, message.as_bytes());

            let verifier = dsa::VerifyingKey::new(DIST_ID, handle.public_key().clone()).unwrap();
            let fixed = dsa::Signature::from_slice(&to_fixed(&signature)).unwrap();
            assert!(verifier.verify(message.as_bytes(), &fixed).is_ok());
            assert!(verifier.verify(b"hello moon", &fixed).is_err());
        }
    }

    #[test]
    fn test_verify_sm2_dsa_signatures() {
        for seed in 0..8u64 {
            let handle = handle(200 + seed);
            let message = format!("hello world {seed}");
            let signer = dsa::SigningKey::new(DIST_ID, &handle.secret).unwrap();
            let fixed: dsa::Signature = signer.sign(message.as_bytes());

            let bytes = fixed.to_bytes();
            let signature = Signature::new(
                BigUint::from_bytes_be(&bytes[..32]),
                BigUint::from_bytes_be(&bytes[32..]),
            )
            .encode()
            .unwrap();
            assert!(verify(handle.public_key(), ID, &signature, message.as_bytes()).unwrap());
            assert!(!verify(handle.public_key(), ID, &signature, b"hello moon").unwrap());
        }
    }

    #[test]
    fn test_identity_too_long() {
        let handle = handle(8);
        let id = vec![0u8; 8192];
        let mut out = [0u8; 128];
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            handle.sign(&id, b"message", &mut rng, &mut out),
            Err(Status::InvalidInput)
        );
    }
}
