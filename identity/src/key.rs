use crate::{
    backend::{national, Backend, NationalCurveBackend, NistCurveBackend},
    canonical,
    curve::EC_PUBLIC_KEY_OID,
    hash, Curve, Digest, Error, LowS, Options, Signature, Signer, Verifier,
};
use bytes::Bytes;
use der::Decode;
use p256::pkcs8::{spki::SubjectPublicKeyInfoRef, PrivateKeyInfo};
use pem_rfc7468::LineEnding;
use rand::{rngs::StdRng, CryptoRng, RngCore, SeedableRng};
use std::fmt::{Debug, Formatter};
use tracing::debug;
use zeroize::Zeroizing;

/// PEM label of a PKCS8 `PrivateKeyInfo`.
const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

/// PEM label of a `SubjectPublicKeyInfo`.
const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";

/// Returns the curve named by an `id-ecPublicKey` algorithm identifier.
fn curve_of(
    algorithm: &p256::pkcs8::spki::AlgorithmIdentifierRef<'_>,
) -> Result<Curve, Error> {
    if algorithm.oid != EC_PUBLIC_KEY_OID {
        return Err(Error::UnsupportedKeyType(algorithm.oid.to_string()));
    }
    let parameters = algorithm
        .parameters_oid()
        .map_err(|e| Error::KeyParse(e.to_string()))?;
    Curve::from_oid(&parameters).ok_or_else(|| Error::UnsupportedKeyType(parameters.to_string()))
}

/// Private key material on a supported [Curve].
#[derive(Clone)]
pub enum PrivateKey {
    NistP256(p256::SecretKey),
    NationalSm2(national::PrivateKey),
}

impl PrivateKey {
    /// Generate a private key on `curve` using the provided RNG.
    pub fn from_rng<R: RngCore + CryptoRng>(curve: Curve, rng: &mut R) -> Self {
        match curve {
            Curve::NistP256 => Self::NistP256(NistCurveBackend::generate(rng)),
            Curve::NationalSm2 => Self::NationalSm2(NationalCurveBackend::generate(rng)),
        }
    }

    /// Deterministically generate a private key on `curve` from `seed`.
    ///
    /// # Warning
    ///
    /// This function is insecure and should only be used for examples
    /// and testing.
    pub fn from_seed(curve: Curve, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::from_rng(curve, &mut rng)
    }

    /// Returns the curve of the key.
    pub fn curve(&self) -> Curve {
        match self {
            Self::NistP256(_) => Curve::NistP256,
            Self::NationalSm2(_) => Curve::NationalSm2,
        }
    }

    /// Returns the public key of the key pair.
    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::NistP256(key) => PublicKey::NistP256(NistCurveBackend::public_key(key)),
            Self::NationalSm2(key) => PublicKey::NationalSm2(NationalCurveBackend::public_key(key)),
        }
    }

    /// Returns the subject key identifier of the key pair.
    ///
    /// This is always equal to the [PublicKey::ski] of [Self::public_key].
    pub fn ski(&self) -> Digest {
        self.public_key().ski()
    }

    /// Encode the key as a PKCS8 `PrivateKeyInfo`.
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>, Error> {
        match self {
            Self::NistP256(key) => NistCurveBackend::encode_private_pkcs8(key),
            Self::NationalSm2(key) => NationalCurveBackend::encode_private_pkcs8(key),
        }
    }

    /// Encode the key as a PEM `PRIVATE KEY` block.
    pub fn to_pkcs8_pem(&self) -> Result<Zeroizing<String>, Error> {
        let der = self.to_pkcs8_der()?;
        pem_rfc7468::encode_string(PRIVATE_KEY_LABEL, LineEnding::LF, &der)
            .map(Zeroizing::new)
            .map_err(|e| Error::PemDecode(e.to_string()))
    }

    /// Decode a PKCS8 `PrivateKeyInfo`.
    ///
    /// Fails with [Error::UnsupportedKeyType] if the key is not an elliptic-curve key on a
    /// supported [Curve], and with [Error::KeyParse] if it is malformed.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, Error> {
        let info = PrivateKeyInfo::from_der(der).map_err(|e| Error::KeyParse(e.to_string()))?;
        let curve = curve_of(&info.algorithm)?;
        debug!(%curve, "decoding private key");
        match curve {
            Curve::NistP256 => NistCurveBackend::decode_private_pkcs8(der).map(Self::NistP256),
            Curve::NationalSm2 => {
                NationalCurveBackend::decode_private_pkcs8(der).map(Self::NationalSm2)
            }
        }
    }

    /// Decode a PEM `PRIVATE KEY` block.
    ///
    /// Fails with [Error::PemDecode] if `pem` is not a PEM document.
    pub fn from_pkcs8_pem(pem: &[u8]) -> Result<Self, Error> {
        let (label, der) =
            pem_rfc7468::decode_vec(pem).map_err(|e| Error::PemDecode(e.to_string()))?;
        let der = Zeroizing::new(der);
        if label != PRIVATE_KEY_LABEL {
            return Err(Error::KeyParse(format!(
                "expected {PRIVATE_KEY_LABEL}, found {label}"
            )));
        }
        Self::from_pkcs8_der(&der)
    }
}

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("curve", &self.curve())
            .field("ski", &self.ski())
            .finish_non_exhaustive()
    }
}

impl Signer for PrivateKey {
    fn public_key(&self) -> PublicKey {
        PrivateKey::public_key(self)
    }

    fn sign(&self, digest: &[u8], opts: &Options) -> Result<Bytes, Error> {
        let signature = match self {
            Self::NistP256(key) => NistCurveBackend::sign(key, digest, opts)?,
            Self::NationalSm2(key) => NationalCurveBackend::sign(key, digest, opts)?,
        };
        canonical::to_low_s(&self.curve().order(), signature)?.encode()
    }
}

impl Verifier for PrivateKey {
    fn verify(&self, signature: &[u8], digest: &[u8], opts: &Options) -> Result<bool, Error> {
        self.public_key().verify(signature, digest, opts)
    }
}

/// Public key on a supported [Curve].
#[derive(Clone, PartialEq, Eq)]
pub enum PublicKey {
    NistP256(p256::PublicKey),
    NationalSm2(sm2::PublicKey),
}

impl PublicKey {
    /// Returns the curve of the key.
    pub fn curve(&self) -> Curve {
        match self {
            Self::NistP256(_) => Curve::NistP256,
            Self::NationalSm2(_) => Curve::NationalSm2,
        }
    }

    /// Returns the uncompressed encoding of the public point (`0x04 || X || Y`).
    pub fn to_uncompressed(&self) -> Vec<u8> {
        match self {
            Self::NistP256(key) => NistCurveBackend::encode_point(key),
            Self::NationalSm2(key) => NationalCurveBackend::encode_point(key),
        }
    }

    /// Decode an uncompressed point on `curve`.
    pub fn from_uncompressed(curve: Curve, bytes: &[u8]) -> Result<Self, Error> {
        match curve {
            Curve::NistP256 => NistCurveBackend::decode_point(bytes).map(Self::NistP256),
            Curve::NationalSm2 => NationalCurveBackend::decode_point(bytes).map(Self::NationalSm2),
        }
    }

    /// Returns the subject key identifier: SHA-256 over the uncompressed point.
    pub fn ski(&self) -> Digest {
        hash(&self.to_uncompressed())
    }

    /// Encode the key as a `SubjectPublicKeyInfo`.
    pub fn to_spki_der(&self) -> Result<Vec<u8>, Error> {
        match self {
            Self::NistP256(key) => NistCurveBackend::encode_public_spki(key),
            Self::NationalSm2(key) => NationalCurveBackend::encode_public_spki(key),
        }
    }

    /// Encode the key as a PEM `PUBLIC KEY` block.
    pub fn to_spki_pem(&self) -> Result<String, Error> {
        let der = self.to_spki_der()?;
        pem_rfc7468::encode_string(PUBLIC_KEY_LABEL, LineEnding::LF, &der)
            .map_err(|e| Error::PemDecode(e.to_string()))
    }

    /// Decode a `SubjectPublicKeyInfo`.
    pub fn from_spki_der(der: &[u8]) -> Result<Self, Error> {
        let info =
            SubjectPublicKeyInfoRef::from_der(der).map_err(|e| Error::KeyParse(e.to_string()))?;
        match curve_of(&info.algorithm)? {
            Curve::NistP256 => NistCurveBackend::decode_public_spki(der).map(Self::NistP256),
            Curve::NationalSm2 => {
                NationalCurveBackend::decode_public_spki(der).map(Self::NationalSm2)
            }
        }
    }

    /// Decode a PEM `PUBLIC KEY` block.
    pub fn from_spki_pem(pem: &[u8]) -> Result<Self, Error> {
        let (label, der) =
            pem_rfc7468::decode_vec(pem).map_err(|e| Error::PemDecode(e.to_string()))?;
        if label != PUBLIC_KEY_LABEL {
            return Err(Error::KeyParse(format!(
                "expected {PUBLIC_KEY_LABEL}, found {label}"
            )));
        }
        Self::from_spki_der(&der)
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("curve", &self.curve())
            .field("ski", &self.ski())
            .finish()
    }
}

impl Verifier for PublicKey {
    fn verify(&self, signature: &[u8], digest: &[u8], opts: &Options) -> Result<bool, Error> {
        let signature = Signature::decode(signature)?;
        let curve = self.curve();
        if opts.low_s == LowS::Require && !canonical::is_low_s(&curve.order(), signature.s()) {
            debug!(%curve, "rejecting high-S signature");
            return Ok(false);
        }
        Ok(match self {
            Self::NistP256(key) => NistCurveBackend::verify(key, &signature, digest, opts),
            Self::NationalSm2(key) => NationalCurveBackend::verify(key, &signature, digest, opts),
        })
    }
}
