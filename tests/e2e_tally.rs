//! End-to-end tally tests
//!
//! Context → keys → encrypt → accumulate → decrypt = plaintext sum

use std::sync::{Arc, OnceLock};

use ckks_tally::wire;
use ckks_tally::{
    Accumulator, CryptoContext, Decryptor, Encryptor, Evaluator, KeyGenerator, PublicKeyBundle,
    SchemeParameters, TallyError,
};
use proptest::prelude::*;

struct Party {
    ctx: Arc<CryptoContext>,
    encryptor: Encryptor,
    decryptor: Decryptor,
}

fn party(params: SchemeParameters, seed: u64) -> Party {
    let ctx = CryptoContext::new(params).unwrap();
    let mut keys = KeyGenerator::with_seed(Arc::clone(&ctx), seed).generate();
    let sk = keys.secret_key.take().unwrap();
    let decryptor = Decryptor::new(Arc::clone(&ctx), sk, &keys.public_key).unwrap();
    let encryptor = Encryptor::new(Arc::clone(&ctx), keys.public_key).unwrap();
    Party {
        ctx,
        encryptor,
        decryptor,
    }
}

fn compact() -> &'static Party {
    static PARTY: OnceLock<Party> = OnceLock::new();
    PARTY.get_or_init(|| party(SchemeParameters::compact_4096(), 7))
}

fn tally(acc: &Accumulator, dec: &Decryptor) -> (f64, u64) {
    let snap = acc.snapshot();
    (dec.decrypt(&snap.ciphertext).unwrap(), snap.count)
}

#[test]
fn test_round_trip_pi() {
    let p = party(SchemeParameters::default_8192(), 1);
    let ct = p.encryptor.encrypt_number(3.14).unwrap();
    assert_eq!(p.decryptor.decrypt(&ct).unwrap(), 3.14);
}

#[test]
fn test_scenario_default_preset() {
    let p = party(SchemeParameters::default_8192(), 2);
    let acc = Accumulator::new(p.encryptor.clone());

    for v in [2.0, 3.0, 5.0] {
        acc.add(&p.encryptor.encrypt_number(v).unwrap()).unwrap();
    }
    assert_eq!(tally(&acc, &p.decryptor), (10.0, 3));

    acc.reset();
    assert_eq!(tally(&acc, &p.decryptor), (0.0, 0));

    acc.add(&p.encryptor.encrypt_number(7.0).unwrap()).unwrap();
    assert_eq!(tally(&acc, &p.decryptor), (7.0, 1));
}

#[test]
fn test_reset_from_any_state() {
    let p = compact();
    let acc = Accumulator::new(p.encryptor.clone());

    // empty
    assert_eq!(acc.reset(), 1);
    assert_eq!(tally(&acc, &p.decryptor), (0.0, 0));

    // accumulating
    for v in [1.5, -20.25, 9999.0] {
        acc.add(&p.encryptor.encrypt_number(v).unwrap()).unwrap();
    }
    assert_eq!(acc.reset(), 2);
    assert_eq!(tally(&acc, &p.decryptor), (0.0, 0));
    assert_eq!(acc.snapshot().epoch, 2);
}

#[test]
fn test_out_of_range_leaves_accumulator_untouched() {
    let p = party(SchemeParameters::default_8192(), 3);
    let acc = Accumulator::new(p.encryptor.clone());
    acc.add(&p.encryptor.encrypt_number(1.0).unwrap()).unwrap();
    let before = acc.snapshot();

    let err = p.encryptor.encrypt_number(1e20).unwrap_err();
    assert!(matches!(err, TallyError::EncodingRange { .. }));
    assert_eq!(err.kind(), "encoding_range");

    assert_eq!(acc.snapshot(), before);
}

#[test]
fn test_foreign_context_rejected() {
    let home = compact();
    let acc = Accumulator::new(home.encryptor.clone());
    acc.add(&home.encryptor.encrypt_number(12.5).unwrap()).unwrap();

    // different parameters
    let other_params = party(SchemeParameters::default_8192(), 4);
    let err = acc
        .add(&other_params.encryptor.encrypt_number(1.0).unwrap())
        .unwrap_err();
    assert!(matches!(err, TallyError::IncompatibleCiphertext(_)));

    // same parameters, different keys
    let other_keys = party(SchemeParameters::compact_4096(), 5);
    let err = acc
        .add(&other_keys.encryptor.encrypt_number(1.0).unwrap())
        .unwrap_err();
    assert!(matches!(err, TallyError::IncompatibleCiphertext(_)));

    assert_eq!(tally(&acc, &home.decryptor), (12.5, 1));
}

#[test]
fn test_lower_level_rejected_by_accumulator() {
    let p = party(SchemeParameters::default_8192(), 6);
    let eval = Evaluator::new(Arc::clone(&p.ctx));
    let acc = Accumulator::new(p.encryptor.clone());

    let ct = p.encryptor.encrypt_number(5.0).unwrap();
    let lower = eval.mod_switch_to_next(&ct).unwrap();
    assert!(matches!(
        acc.add(&lower),
        Err(TallyError::IncompatibleCiphertext(_))
    ));
    assert_eq!(acc.count(), 0);
}

#[test]
fn test_client_from_wire_bundle() {
    let server = compact();
    let acc = Accumulator::new(server.encryptor.clone());

    let bundle = PublicKeyBundle {
        params: server.ctx.params().clone(),
        parms_id: server.ctx.parms_id(server.ctx.top_level()),
        public_key: server.encryptor.public_key().clone(),
    };
    let text = wire::to_base64(&bundle).unwrap();

    let client = Encryptor::from_bundle(wire::from_base64(&text).unwrap()).unwrap();
    for v in [0.5, 0.25] {
        let submitted = wire::to_base64(&client.encrypt_number(v).unwrap()).unwrap();
        acc.add(&wire::from_base64(&submitted).unwrap()).unwrap();
    }
    assert_eq!(tally(&acc, &server.decryptor), (0.75, 2));
}

#[test]
fn test_invalid_parameters_rejected() {
    let base = SchemeParameters::compact_4096();
    let mut cases = Vec::new();

    let mut p = base.clone();
    p.poly_degree = 3000;
    cases.push(p);

    let mut p = base.clone();
    p.poly_degree = 2048;
    cases.push(p);

    let mut p = base.clone();
    p.coeff_modulus_bits = vec![60];
    cases.push(p);

    let mut p = base.clone();
    p.coeff_modulus_bits = vec![60, 61];
    cases.push(p);

    let mut p = base.clone();
    p.coeff_modulus_bits = vec![60, 60];
    cases.push(p);

    let mut p = base.clone();
    p.scale = 1.0;
    cases.push(p);

    let mut p = base.clone();
    p.max_value = f64::INFINITY;
    cases.push(p);

    let mut p = base.clone();
    p.max_submissions = 0;
    cases.push(p);

    let mut p = base.clone();
    p.sigma = 0.0;
    cases.push(p);

    // wrap-around: the sum could exceed the data modulus
    let mut p = base.clone();
    p.max_value = 1e5;
    cases.push(p);

    // noise would disturb the reported digits
    let mut p = base.clone();
    p.precision_digits = 6;
    cases.push(p);

    for params in cases {
        let described = format!("{:?}", params);
        match CryptoContext::new(params) {
            Err(TallyError::Parameter(_)) => {}
            other => panic!("expected a parameter error for {}, got {:?}", described, other.map(|_| ())),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Property: decrypt(Σ Enc(vᵢ)) ≈ Σ vᵢ at the reported precision
    #[test]
    fn prop_sum_matches_plaintext(values in prop::collection::vec(-1e4f64..1e4f64, 1..24)) {
        let p = compact();
        let acc = Accumulator::new(p.encryptor.clone());
        for &v in &values {
            acc.add(&p.encryptor.encrypt_number(v).unwrap()).unwrap();
        }

        let (sum, count) = tally(&acc, &p.decryptor);
        let expected: f64 = values.iter().sum();
        prop_assert_eq!(count, values.len() as u64);
        prop_assert!(
            (sum - expected).abs() <= p.ctx.params().resolution(),
            "decrypted {} expected {}", sum, expected
        );
    }
}
