#![no_main]

use commonware_identity::{canonical, Curve, Signature};
use libfuzzer_sys::fuzz_target;

fn fuzz(data: &[u8]) {
    let Ok(signature) = Signature::decode(data) else {
        return;
    };

    // DER admits a single encoding per signature
    let encoded = signature.encode().expect("decoded signature must encode");
    assert_eq!(encoded.as_ref(), data);

    for curve in [Curve::NistP256, Curve::NationalSm2] {
        let order = curve.order();
        let Ok(normalized) = canonical::to_low_s(&order, signature.clone()) else {
            assert!(signature.s() >= &order);
            continue;
        };
        assert_eq!(normalized.r(), signature.r());
        assert!(canonical::is_low_s(&order, normalized.s()));
        let again = canonical::to_low_s(&order, normalized.clone()).unwrap();
        assert_eq!(again, normalized);
    }
}

fuzz_target!(|data: &[u8]| {
    fuzz(data);
});
