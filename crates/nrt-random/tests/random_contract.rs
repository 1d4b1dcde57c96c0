use std::collections::HashSet;

use nrt_dtype::Scalar;
use nrt_ndarray::ArrayValue;
use nrt_random::{RandomState, install_thread_state, with_thread_state};
use nrt_runtime::ErrorKind;
use proptest::prelude::*;

fn ten_normals(state: &mut RandomState) -> Vec<f64> {
    (0..10)
        .map(|_| state.normal(0.0, 1.0).expect("normal"))
        .collect()
}

#[test]
fn reseeding_replays_the_normal_stream() {
    let mut state = RandomState::new();
    state.seed(&Scalar::I64(42)).expect("seed");
    let first = ten_normals(&mut state);
    state.seed(&Scalar::I64(42)).expect("reseed");
    let second = ten_normals(&mut state);
    assert_eq!(first, second);
}

#[test]
fn non_integer_seed_is_rejected() {
    let err = RandomState::new()
        .seed(&Scalar::F64(4.2))
        .expect_err("float seed");
    assert_eq!(err.kind(), ErrorKind::InvalidSeed);
}

#[test]
fn every_permutation_of_three_is_reachable() {
    let mut seen = HashSet::new();
    for seed in 0..200u64 {
        let mut state = RandomState::from_seed(seed);
        let mut array = ArrayValue::from_i64(&[3], &[0, 1, 2]).expect("array");
        state.shuffle(&mut array).expect("shuffle");
        let order: Vec<i128> = array
            .to_scalars()
            .iter()
            .map(|value| value.as_i128().expect("int"))
            .collect();
        seen.insert(order);
    }
    assert_eq!(seen.len(), 6);
}

#[test]
fn scalar_only_draws() {
    let err = RandomState::from_seed(0)
        .draw("uniform", &[0.0, 1.0], Some(&[2, 2]))
        .expect_err("array draw");
    assert_eq!(err.kind(), ErrorKind::UnsupportedArgument);
}

#[test]
fn binomial_domain_is_enforced() {
    let mut state = RandomState::from_seed(0);
    for (n, p) in [(10.0, -0.1), (10.0, 1.1), (-1.0, 0.5)] {
        let err = state.draw("binomial", &[n, p], None).expect_err("domain");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }
}

#[test]
fn duplication_requires_an_explicit_reseed() {
    let mut parent = RandomState::from_seed(5);
    let mut children: Vec<RandomState> = (0..3).map(|_| parent.spawn()).collect();
    let streams: Vec<Vec<f64>> = children
        .iter_mut()
        .map(|child| (0..4).map(|_| child.random()).collect())
        .collect();
    let distinct: HashSet<Vec<u64>> = streams
        .iter()
        .map(|draws| draws.iter().map(|d| d.to_bits()).collect())
        .collect();
    assert_eq!(distinct.len(), 3);

    let parent_next = parent.random();
    let mut unspawned = RandomState::from_seed(5);
    assert_ne!(unspawned.random(), parent_next);
}

#[test]
fn thread_domains_are_isolated() {
    install_thread_state(RandomState::from_seed(1)).expect("install");
    let here = with_thread_state(|state| state.random()).expect("draw");
    let there = std::thread::spawn(|| {
        install_thread_state(RandomState::from_seed(1)).expect("install");
        with_thread_state(|state| state.random()).expect("draw")
    })
    .join()
    .expect("thread");
    assert_eq!(here, there);
    assert_eq!(with_thread_state(|state| state.random()).expect("draw"), {
        let mut replay = RandomState::from_seed(1);
        let _ = replay.random();
        replay.random()
    });
}

proptest! {
    #[test]
    fn blob_restore_replays_the_stream(seed in any::<u64>(), skip in 0usize..1500, gaussians in 0usize..3) {
        let mut state = RandomState::from_seed(seed);
        for _ in 0..skip {
            let _ = state.random();
        }
        for _ in 0..gaussians {
            let _ = state.standard_normal();
        }
        let mut restored = RandomState::from_blob(&state.to_blob()).expect("blob");
        for _ in 0..8 {
            prop_assert_eq!(restored.standard_normal().to_bits(), state.standard_normal().to_bits());
            prop_assert_eq!(restored.randint(-50, 50).expect("randint"), state.randint(-50, 50).expect("randint"));
        }
    }
}
