// Property-based tests for callback signature validation

use common::webhook::{compute_signature, generate_callback_secret, validate_callback_signature};
use proptest::prelude::*;

// Property: a signature computed over a payload always validates against
// the same payload and secret.
#[test]
fn property_signature_round_trip() {
    proptest!(|(payload in prop::collection::vec(any::<u8>(), 0..512))| {
        let secret = generate_callback_secret();
        let signature = compute_signature(&payload, &secret).unwrap();

        prop_assert!(validate_callback_signature(&payload, &signature, &secret).unwrap());
    });
}

// Property: changing any byte of the payload invalidates the signature.
#[test]
fn property_signature_detects_payload_tampering() {
    proptest!(|(
        payload in prop::collection::vec(any::<u8>(), 1..256),
        flip_index in 0usize..256,
        flip_bit in 0u8..8,
    )| {
        let secret = generate_callback_secret();
        let signature = compute_signature(&payload, &secret).unwrap();

        let mut tampered = payload.clone();
        let index = flip_index % tampered.len();
        tampered[index] ^= 1 << flip_bit;

        prop_assert!(!validate_callback_signature(&tampered, &signature, &secret).unwrap());
    });
}

// Property: a signature never validates under a different secret.
#[test]
fn property_signature_bound_to_secret() {
    proptest!(|(payload in prop::collection::vec(any::<u8>(), 0..256))| {
        let secret_a = generate_callback_secret();
        let secret_b = generate_callback_secret();
        prop_assume!(secret_a != secret_b);

        let signature = compute_signature(&payload, &secret_a).unwrap();
        prop_assert!(!validate_callback_signature(&payload, &signature, &secret_b).unwrap());
    });
}
