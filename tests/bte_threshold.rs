use beast_core::bls::{g1_to_bytes, Fr, G1};
use beast_core::bte::{self, DecryptShare};
use beast_core::dkg::eval_poly;
use beast_core::types::Error;
use ff::Field;
use group::Group;
use rand_core::SeedableRng;

fn rng(seed: u64) -> rand_chacha::ChaCha20Rng {
    rand_chacha::ChaCha20Rng::seed_from_u64(seed)
}

/// Shamir shares of a fresh secret over a degree t-1 polynomial, plus the
/// matching group public key.
fn shamir(n: u32, t: usize, seed: u64) -> (G1, Vec<Fr>) {
    let mut r = rng(seed);
    let coeffs: Vec<Fr> = (0..t).map(|_| Fr::random(&mut r)).collect();
    let shares = (1..=n)
        .map(|i| eval_poly(&coeffs, &Fr::from(u64::from(i))))
        .collect();
    (G1::generator() * coeffs[0], shares)
}

fn partials(ct: &bte::KeyCiphertext, shares: &[Fr], indices: &[u32]) -> Vec<DecryptShare> {
    indices
        .iter()
        .map(|&i| bte::partial_decrypt(ct, &shares[(i - 1) as usize], i).expect("partial"))
        .collect()
}

#[test]
fn shamir_two_of_three_recovers_same_point() {
    let (pk, shares) = shamir(3, 2, 1);
    let k = Fr::from(7u64);
    let ct = bte::encrypt_key(&pk, &k, &mut rng(2));
    let expected = G1::generator() * k;

    for quorum in [[1u32, 2], [1, 3], [2, 3]] {
        let got = bte::combine(&ct, &partials(&ct, &shares, &quorum), 2).expect("combine");
        assert_eq!(g1_to_bytes(&got), g1_to_bytes(&expected));
    }

    // Duplicate indices in the quorum are rejected.
    let dup = partials(&ct, &shares, &[1, 1]);
    assert!(matches!(bte::combine(&ct, &dup, 2), Err(Error::Invalid)));
}

#[test]
fn combine_round_trips_across_thresholds() {
    for (n, t) in [(1u32, 1usize), (3, 2), (5, 3), (5, 5)] {
        let (pk, shares) = shamir(n, t, 10 + u64::from(n));
        let k = Fr::random(&mut rng(20 + u64::from(n)));
        let ct = bte::encrypt_key(&pk, &k, &mut rng(30 + u64::from(n)));
        let all: Vec<u32> = (1..=n).collect();
        let got = bte::combine(&ct, &partials(&ct, &shares, &all), t).expect("combine");
        assert_eq!(g1_to_bytes(&got), g1_to_bytes(&(G1::generator() * k)));
    }
}

#[test]
fn ciphertext_addition_aggregates_keys() {
    let (pk, shares) = shamir(3, 2, 3);
    let mut r = rng(4);
    let k1 = Fr::random(&mut r);
    let k2 = Fr::random(&mut r);
    let ct1 = bte::encrypt_key(&pk, &k1, &mut r);
    let ct2 = bte::encrypt_key(&pk, &k2, &mut r);
    let sum = bte::add_ciphertexts(&[ct1, ct2]).expect("add");

    let got = bte::combine(&sum, &partials(&sum, &shares, &[1, 2]), 2).expect("combine");
    assert_eq!(
        g1_to_bytes(&got),
        g1_to_bytes(&(G1::generator() * (k1 + k2)))
    );
}

#[test]
fn combine_uses_smallest_indices_deterministically() {
    let (pk, shares) = shamir(5, 2, 5);
    let k = Fr::random(&mut rng(6));
    let ct = bte::encrypt_key(&pk, &k, &mut rng(7));
    // All five shares offered; the quorum must be {1, 2} regardless of order.
    let mut offered = partials(&ct, &shares, &[5, 3, 1, 4, 2]);
    offered.reverse();
    let got = bte::combine(&ct, &offered, 2).expect("combine");
    let expected = bte::combine(&ct, &partials(&ct, &shares, &[1, 2]), 2).expect("combine");
    assert_eq!(g1_to_bytes(&got), g1_to_bytes(&expected));
}

#[test]
fn combine_rejects_underfull_or_degenerate_input() {
    let (pk, shares) = shamir(3, 2, 8);
    let k = Fr::from(11u64);
    let ct = bte::encrypt_key(&pk, &k, &mut rng(9));
    let one = partials(&ct, &shares, &[1]);
    assert!(matches!(bte::combine(&ct, &one, 2), Err(Error::Invalid)));
    assert!(matches!(bte::combine(&ct, &one, 0), Err(Error::Invalid)));
    assert!(matches!(
        bte::partial_decrypt(&ct, &shares[0], 0),
        Err(Error::Invalid)
    ));
    assert!(matches!(bte::add_ciphertexts(&[]), Err(Error::Invalid)));
}

#[test]
fn xor_mask_is_an_involution() {
    let prf = b"some-prf-bytes";
    let data = b"the quick brown fox jumps over the lazy dog".to_vec();
    let masked = bte::xor_mask(&data, prf);
    assert_ne!(masked, data);
    assert_eq!(bte::xor_mask(&masked, prf), data);
    assert!(bte::xor_mask(&[], prf).is_empty());
}
