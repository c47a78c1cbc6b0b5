#![no_main]

use arbitrary::Arbitrary;
use commonware_identity::{Curve, PrivateKey, PublicKey};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum FuzzInput {
    PrivatePem(Vec<u8>),
    PrivateDer(Vec<u8>),
    PublicDer(Vec<u8>),
    Point { national: bool, bytes: Vec<u8> },
}

fn fuzz(input: FuzzInput) {
    match input {
        FuzzInput::PrivatePem(pem) => {
            if let Ok(key) = PrivateKey::from_pkcs8_pem(&pem) {
                let reencoded = key.to_pkcs8_pem().unwrap();
                let decoded = PrivateKey::from_pkcs8_pem(reencoded.as_bytes()).unwrap();
                assert_eq!(decoded.ski(), key.ski());
            }
        }
        FuzzInput::PrivateDer(der) => {
            if let Ok(key) = PrivateKey::from_pkcs8_der(&der) {
                assert_eq!(key.ski(), key.public_key().ski());
            }
        }
        FuzzInput::PublicDer(der) => {
            if let Ok(key) = PublicKey::from_spki_der(&der) {
                let encoded = key.to_spki_der().unwrap();
                assert_eq!(PublicKey::from_spki_der(&encoded).unwrap(), key);
            }
        }
        FuzzInput::Point { national, bytes } => {
            let curve = if national {
                Curve::NationalSm2
            } else {
                Curve::NistP256
            };
            if let Ok(key) = PublicKey::from_uncompressed(curve, &bytes) {
                assert_eq!(key.to_uncompressed(), bytes);
            }
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
