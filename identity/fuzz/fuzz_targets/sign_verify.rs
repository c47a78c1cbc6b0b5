#![no_main]

use arbitrary::Arbitrary;
use commonware_identity::{
    canonical, Curve, LowS, Options, PrivateKey, Signature, Signer, Verifier,
};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    national: bool,
    seed: u64,
    digest: Vec<u8>,
    distinguishing_id: Vec<u8>,
    tamper: Option<(u16, u8)>,
}

fn fuzz(input: FuzzInput) {
    let curve = if input.national {
        Curve::NationalSm2
    } else {
        Curve::NistP256
    };
    let key = PrivateKey::from_seed(curve, input.seed);
    let opts = Options {
        distinguishing_id: input.distinguishing_id.into_iter().take(64).collect(),
        low_s: LowS::Require,
    };

    let Ok(signature) = key.sign(&input.digest, &opts) else {
        assert!(input.digest.is_empty());
        return;
    };
    let decoded = Signature::decode(&signature).unwrap();
    assert!(canonical::is_low_s(&curve.order(), decoded.s()));
    assert!(key.public_key().verify(&signature, &input.digest, &opts).unwrap());

    if let Some((index, mask)) = input.tamper {
        if mask == 0 {
            return;
        }
        let mut tampered = signature.to_vec();
        let index = index as usize % tampered.len();
        tampered[index] ^= mask;
        if let Ok(valid) = key.public_key().verify(&tampered, &input.digest, &opts) {
            assert!(!valid);
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
