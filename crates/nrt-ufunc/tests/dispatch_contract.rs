use nrt_dtype::{DType, Scalar};
use nrt_ndarray::ArrayValue;
use nrt_runtime::{ErrorKind, ExecutionMode, RuntimeConfig};
use nrt_ufunc::{Dispatcher, Operand, ReduceOptions, UfuncResult, reduce};
use proptest::prelude::*;

fn f64_array(shape: &[usize], values: &[f64]) -> Operand {
    Operand::Array(ArrayValue::from_f64(shape, values).expect("array"))
}

fn column_and_row() -> (Operand, Operand) {
    (
        f64_array(&[3, 1], &[1.0, 2.0, 3.0]),
        f64_array(&[1, 4], &[10.0, 20.0, 30.0, 40.0]),
    )
}

#[test]
fn add_broadcasts_column_against_row() {
    let (a, b) = column_and_row();
    let out = Dispatcher::default()
        .dispatch("add", &[a, b], None)
        .expect("broadcast add");
    let array = out.into_array().expect("array");
    assert_eq!(array.shape(), &[3, 4]);
    for i in 0..3 {
        for j in 0..4 {
            let expected = (i + 1) as f64 + 10.0 * (j + 1) as f64;
            assert_eq!(
                array.index(&[i as isize, j as isize]).expect("element"),
                Scalar::F64(expected)
            );
        }
    }
}

#[test]
fn mismatched_extents_fail_with_broadcast_error() {
    let err = Dispatcher::default()
        .dispatch(
            "add",
            &[f64_array(&[3], &[1.0; 3]), f64_array(&[4], &[1.0; 4])],
            None,
        )
        .expect_err("3 vs 4");
    assert_eq!(err.kind(), ErrorKind::Broadcast);
    assert_eq!(err.reason_code(), ErrorKind::Broadcast.reason_code());
}

#[test]
fn sqrt_of_negative_real_is_a_dtype_error() {
    let mut dispatcher = Dispatcher::default();
    let err = dispatcher
        .dispatch("sqrt", &[Operand::from(-1.0)], None)
        .expect_err("negative sqrt");
    assert_eq!(err.kind(), ErrorKind::DType);
    let out = dispatcher
        .dispatch("sqrt", &[Operand::from(4.0)], None)
        .expect("positive sqrt");
    assert_eq!(out.into_scalar(), Some(Scalar::F64(2.0)));
}

#[test]
fn multiply_on_arrays_requires_an_explicit_output() {
    let mut dispatcher = Dispatcher::default();
    let (a, b) = column_and_row();
    let err = dispatcher
        .dispatch("multiply", &[a.clone(), b.clone()], None)
        .expect_err("array form without output");
    assert_eq!(err.kind(), ErrorKind::OutputRequired);

    let scalar = dispatcher
        .dispatch("multiply", &[Operand::from(3.0), Operand::from(2.0)], None)
        .expect("scalar form");
    assert_eq!(scalar.into_scalar(), Some(Scalar::F64(6.0)));

    let mut outs = [ArrayValue::zeros(&[3, 4], DType::F64).expect("out")];
    dispatcher
        .dispatch("multiply", &[a, b], Some(&mut outs))
        .expect("array form with output");
    assert_eq!(outs[0].index(&[2, 3]).expect("corner"), Scalar::F64(120.0));
}

#[test]
fn two_output_kernel_is_rejected_in_compiled_mode_only() {
    let mut compiled = Dispatcher::new(RuntimeConfig::with_mode(ExecutionMode::Compiled));
    let err = compiled
        .dispatch("modf", &[Operand::from(1.5)], None)
        .expect_err("compiled");
    assert_eq!(err.kind(), ErrorKind::UnsupportedMode);

    let mut fallback = Dispatcher::new(RuntimeConfig::with_mode(ExecutionMode::Fallback));
    let out = fallback
        .dispatch("divmod", &[Operand::from(7i64), Operand::from(-2i64)], None)
        .expect("fallback divmod");
    let UfuncResult::Pair(q, r) = out else {
        panic!("expected a scalar pair");
    };
    assert_eq!((q, r), (Scalar::I64(-4), Scalar::I64(-1)));
}

#[test]
fn sum_of_empty_is_zero_and_max_of_empty_fails() {
    let empty = ArrayValue::zeros(&[0], DType::F64).expect("empty");
    let sum = reduce("sum", &empty, None).expect("sum of empty");
    assert_eq!(sum.into_scalar(), Some(Scalar::F64(0.0)));
    let ints = ArrayValue::zeros(&[0], DType::I32).expect("empty int32");
    let sum = reduce("sum", &ints, None).expect("sum of empty int32");
    assert_eq!(sum.into_scalar(), Some(Scalar::I32(0)));
    let err = reduce("max", &empty, None).expect_err("max of empty");
    assert_eq!(err.kind(), ErrorKind::EmptyReduction);
}

#[test]
fn dispatcher_reductions_are_recorded() {
    let mut dispatcher = Dispatcher::new(RuntimeConfig {
        record_decisions: true,
        ..RuntimeConfig::default()
    });
    let grid = ArrayValue::from_f64(&[2, 2], &[1.0, 2.0, 3.0, 4.0]).expect("grid");
    let out = dispatcher
        .reduce("maximum", &grid, &ReduceOptions::along(0))
        .expect("column max");
    assert_eq!(
        out.into_array().expect("array").to_scalars(),
        vec![Scalar::F64(3.0), Scalar::F64(4.0)]
    );
    let err = dispatcher
        .reduce("sum", &grid, &ReduceOptions::along(5))
        .expect_err("axis");
    assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
    assert_eq!(dispatcher.ledger().events().len(), 2);
    assert_eq!(dispatcher.ledger().rejections(), 1);
}

fn shape_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(prop_oneof![Just(1usize), 2usize..4], 0..4)
}

proptest! {
    #[test]
    fn add_is_commutative_under_broadcast(lhs in shape_strategy(), rhs in shape_strategy()) {
        let make = |shape: &[usize], scale: f64| {
            let count: usize = shape.iter().product();
            let values: Vec<f64> = (0..count).map(|i| i as f64 * scale).collect();
            f64_array(shape, &values)
        };
        let a = make(&lhs, 1.0);
        let b = make(&rhs, 0.5);
        let mut dispatcher = Dispatcher::default();
        let ab = dispatcher.dispatch("add", &[a.clone(), b.clone()], None);
        let ba = dispatcher.dispatch("add", &[b, a], None);
        match (ab, ba) {
            (Ok(ab), Ok(ba)) => {
                let (ab, ba) = (ab.into_array().expect("ab"), ba.into_array().expect("ba"));
                prop_assert_eq!(ab.shape(), ba.shape());
                prop_assert_eq!(ab.to_scalars(), ba.to_scalars());
            }
            (Err(e1), Err(e2)) => {
                prop_assert_eq!(e1.kind(), ErrorKind::Broadcast);
                prop_assert_eq!(e2.kind(), ErrorKind::Broadcast);
            }
            _ => prop_assert!(false, "broadcast success must not depend on operand order"),
        }
    }

    #[test]
    fn axis_sums_total_the_full_sum(values in prop::collection::vec(-1000i64..1000, 12)) {
        let grid = ArrayValue::from_i64(&[3, 4], &values).expect("grid");
        let total = reduce("sum", &grid, None).expect("sum").into_scalar().expect("scalar");
        for axis in [0isize, 1, -1] {
            let partial = reduce("sum", &grid, Some(axis)).expect("axis sum").into_array().expect("array");
            let again = reduce("sum", &partial, None).expect("sum").into_scalar().expect("scalar");
            prop_assert_eq!(&again, &total);
        }
    }
}
