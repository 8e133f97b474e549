//! Integration tests for value_and_jacfwd and jvp.

use jax_jacfwd::{
    jvp, value_and_jacfwd, Argnums, Array, DType, Error, FunctionHandle, JacfwdConfig, PyTree,
    Shape,
};
use std::sync::Arc;

fn arr(data: &[f64]) -> Array {
    Array::from_vec_f64(data.to_vec(), Shape::new(vec![data.len()]))
}

fn leaf_vec(tree: Option<&PyTree>) -> Vec<f64> {
    tree.and_then(PyTree::as_leaf).map(Array::to_vec).unwrap_or_default()
}

fn leaf_shape(tree: Option<&PyTree>) -> Vec<usize> {
    tree.and_then(PyTree::as_leaf).map(|a| a.shape().as_slice().to_vec()).unwrap_or_default()
}

fn arg(args: &[PyTree], i: usize) -> Array {
    args[i].as_leaf().cloned().unwrap_or_else(|| Array::scalar(f64::NAN, DType::Float64))
}

// =============================================================================
// VALUE AND JACOBIAN
// =============================================================================

#[test]
fn test_sum_of_squares() {
    let f = |args: &[PyTree]| args[0].map(|x| x.square().sum_all());
    let df = value_and_jacfwd(f, JacfwdConfig::default()).unwrap();
    let x = Array::from_vec(vec![0.0, 1.0, 2.0], Shape::new(vec![3]));
    let (value, jac) = df.call(&[x.into()]).unwrap().into_parts();

    assert_eq!(value.as_leaf().map(Array::dtype), Some(DType::Float32));
    assert_eq!(value.as_leaf().and_then(Array::item), Some(5.0));
    assert_eq!(leaf_shape(Some(&jac)), vec![3]);
    assert_eq!(leaf_vec(Some(&jac)), vec![0.0, 2.0, 4.0]);
}

#[test]
fn test_aux_is_returned_alongside_value() {
    let f = |args: &[PyTree]| {
        let x = arg(args, 0);
        PyTree::tuple(vec![x.square().sum_all().into(), x.sum_all().into()])
    };
    let df = value_and_jacfwd(f, JacfwdConfig::new().has_aux(true)).unwrap();
    let out = df.call(&[arr(&[0.0, 1.0, 2.0]).into()]).unwrap();
    assert_eq!(leaf_vec(out.aux.as_ref()), vec![3.0]);
    assert_eq!(leaf_vec(Some(&out.jacobian)), vec![0.0, 2.0, 4.0]);

    let (value_and_aux, _) = out.into_parts();
    assert_eq!(leaf_vec(value_and_aux.get(0)), vec![5.0]);
    assert_eq!(leaf_vec(value_and_aux.get(1)), vec![3.0]);
}

#[test]
fn test_identity_jacobian() {
    let f = |args: &[PyTree]| args[0].clone();
    let df = value_and_jacfwd(f, JacfwdConfig::default()).unwrap();
    let out = df.call(&[arr(&[1.0, 2.0]).into()]).unwrap();
    assert_eq!(leaf_shape(Some(&out.jacobian)), vec![2, 2]);
    assert_eq!(leaf_vec(Some(&out.jacobian)), vec![1.0, 0.0, 0.0, 1.0]);
}

#[test]
fn test_dict_input_structure() {
    // params = {'b': (), 'w': (2,)}; f(params, x) = sum(w * x) + b
    let f = |args: &[PyTree]| {
        let w = args[0].get_key("w").and_then(PyTree::as_leaf).cloned();
        let b = args[0].get_key("b").and_then(PyTree::as_leaf).cloned();
        match (w, b) {
            (Some(w), Some(b)) => PyTree::Leaf(w.mul(&arg(args, 1)).sum_all().add(&b)),
            _ => PyTree::None,
        }
    };
    let params = PyTree::dict([
        ("w", PyTree::Leaf(arr(&[0.5, -1.0]))),
        ("b", PyTree::Leaf(Array::scalar(0.25, DType::Float64))),
    ]);
    let x = arr(&[3.0, 4.0]);

    let df = value_and_jacfwd(f, JacfwdConfig::default()).unwrap();
    let out = df.call(&[params, x.into()]).unwrap();
    assert_eq!(leaf_vec(Some(&out.value)), vec![1.5 - 4.0 + 0.25]);

    assert_eq!(leaf_shape(out.jacobian.get_key("w")), vec![2]);
    assert_eq!(leaf_vec(out.jacobian.get_key("w")), vec![3.0, 4.0]);
    assert_eq!(leaf_shape(out.jacobian.get_key("b")), Vec::<usize>::new());
    assert_eq!(leaf_vec(out.jacobian.get_key("b")), vec![1.0]);
}

#[test]
fn test_tuple_output_structure() {
    let f = |args: &[PyTree]| {
        let x = arg(args, 0);
        PyTree::tuple(vec![x.sin().into(), x.sum_all().into()])
    };
    let df = value_and_jacfwd(f, JacfwdConfig::default()).unwrap();
    let out = df.call(&[arr(&[0.0, 0.0, 0.0]).into()]).unwrap();

    assert_eq!(out.jacobian.tree_def(), out.value.tree_def());
    assert_eq!(leaf_shape(out.jacobian.get(0)), vec![3, 3]);
    assert_eq!(leaf_vec(out.jacobian.get(0)), vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    assert_eq!(leaf_vec(out.jacobian.get(1)), vec![1.0, 1.0, 1.0]);
}

#[test]
fn test_multiple_argnums_nest_inside_each_output() {
    let f = |args: &[PyTree]| {
        let (x, y) = (arg(args, 0), arg(args, 1));
        PyTree::list(vec![x.mul(&y).into(), x.add(&y).sum_all().into()])
    };
    let df = value_and_jacfwd(f, JacfwdConfig::new().argnums(Argnums::Many(vec![0, 1]))).unwrap();
    let out = df.call(&[arr(&[1.0, 2.0]).into(), arr(&[3.0, 5.0]).into()]).unwrap();

    // list of outputs, each a tuple over the two arguments
    let d_prod = out.jacobian.get(0).unwrap();
    assert_eq!(leaf_vec(d_prod.get(0)), vec![3.0, 0.0, 0.0, 5.0]);
    assert_eq!(leaf_vec(d_prod.get(1)), vec![1.0, 0.0, 0.0, 2.0]);
    let d_sum = out.jacobian.get(1).unwrap();
    assert_eq!(leaf_vec(d_sum.get(0)), vec![1.0, 1.0]);
    assert_eq!(leaf_vec(d_sum.get(1)), vec![1.0, 1.0]);
}

#[test]
fn test_zero_size_input() {
    let f = |args: &[PyTree]| {
        let x = arg(args, 0);
        PyTree::tuple(vec![x.scale(2.0).into(), x.sum_all().into()])
    };
    let df = value_and_jacfwd(f, JacfwdConfig::default()).unwrap();
    let empty = Array::zeros(Shape::new(vec![0]), DType::Float32);
    let out = df.call(&[empty.into()]).unwrap();

    assert_eq!(leaf_shape(out.jacobian.get(0)), vec![0, 0]);
    assert_eq!(leaf_shape(out.jacobian.get(1)), vec![0]);
    assert_eq!(leaf_vec(out.value.get(1)), vec![0.0]);
}

#[test]
fn test_jacobian_takes_input_dtype() {
    let f = |args: &[PyTree]| args[0].map(|x| x.astype(DType::Float64).exp());
    let df = value_and_jacfwd(f, JacfwdConfig::default()).unwrap();
    let x = Array::from_vec(vec![0.0], Shape::new(vec![1]));
    let out = df.call(&[x.into()]).unwrap();
    let jac = out.jacobian.as_leaf().unwrap();
    assert_eq!(jac.dtype(), DType::Float32);
    assert_eq!(jac.to_vec(), vec![1.0]);
}

#[test]
fn test_pow_jacobian_at_zero_base() {
    let f = |args: &[PyTree]| PyTree::Leaf(arg(args, 0).pow(&arg(args, 1)).sum_all());
    let df = value_and_jacfwd(f, JacfwdConfig::new().argnums(Argnums::Many(vec![0, 1]))).unwrap();
    let out = df.call(&[arr(&[0.0, 1.0]).into(), arr(&[2.0, 2.0]).into()]).unwrap();
    assert_eq!(leaf_vec(out.jacobian.get(0)), vec![0.0, 2.0]);
    assert_eq!(leaf_vec(out.jacobian.get(1)), vec![0.0, 0.0]);
}

#[test]
fn test_zero_power_has_zero_jacobian() {
    let f = |args: &[PyTree]| args[0].map(|x| x.powf(0.0));
    let df = value_and_jacfwd(f, JacfwdConfig::default()).unwrap();
    let out = df.call(&[arr(&[0.0, 1.0]).into()]).unwrap();
    assert_eq!(leaf_vec(Some(&out.value)), vec![1.0, 1.0]);
    assert_eq!(leaf_vec(Some(&out.jacobian)), vec![0.0, 0.0, 0.0, 0.0]);
}

// =============================================================================
// ERRORS
// =============================================================================

#[test]
fn test_integer_input_rejected() {
    let f = |args: &[PyTree]| args[0].clone();
    let df = value_and_jacfwd(f, JacfwdConfig::default()).unwrap();
    let ints = Array::from_vec_i32(vec![1, 2, 3], Shape::new(vec![3]));
    let err = df.call(&[ints.into()]).unwrap_err();
    assert_eq!(err, Error::InputDtype { dtype: DType::Int32 });
    assert!(err.to_string().contains("holomorphic=true"));
}

#[test]
fn test_complex_output_rejected() {
    let f = |args: &[PyTree]| args[0].map(|x| x.astype(DType::Complex128));
    let df = value_and_jacfwd(f, JacfwdConfig::default()).unwrap();
    let err = df.call(&[arr(&[1.0]).into()]).unwrap_err();
    assert_eq!(err, Error::OutputDtype { dtype: DType::Complex128 });
}

#[test]
fn test_complex_input_accepted_with_real_output() {
    let f = |args: &[PyTree]| args[0].map(|z| z.real().sum_all());
    let df = value_and_jacfwd(f, JacfwdConfig::default()).unwrap();
    let z = Array::from_complex(vec![num_complex::Complex::new(1.0, 2.0)], Shape::new(vec![1]));
    let out = df.call(&[z.into()]).unwrap();
    let jac = out.jacobian.as_leaf().unwrap();
    assert_eq!(jac.dtype(), DType::Complex128);
    assert_eq!(jac.to_complex_vec(), vec![num_complex::Complex::new(1.0, 0.0)]);
}

#[test]
fn test_argnums_out_of_range() {
    let f = |args: &[PyTree]| args[0].clone();
    let df = value_and_jacfwd(f, JacfwdConfig::new().argnums(Argnums::Single(3))).unwrap();
    let err = df.call(&[arr(&[1.0]).into()]).unwrap_err();
    assert_eq!(err, Error::InvalidArgnums { argnums: vec![3], nargs: 1 });
}

#[test]
fn test_dropped_function_is_not_callable() {
    let shared = Arc::new(|args: &[PyTree]| args[0].clone());
    let handle = FunctionHandle::downgrade(&shared);
    let df = value_and_jacfwd(handle.clone(), JacfwdConfig::default()).unwrap();
    assert!(df.call(&[arr(&[1.0]).into()]).is_ok());

    drop(shared);
    assert!(matches!(df.call(&[arr(&[1.0]).into()]), Err(Error::NotCallable(_))));
    assert!(matches!(
        value_and_jacfwd(handle, JacfwdConfig::default()),
        Err(Error::NotCallable(_))
    ));
}

#[test]
fn test_jvp_structure_errors() {
    let f = |args: &[PyTree]| args[0].clone();
    let x = arr(&[1.0, 2.0]);

    let err = jvp(&f, &PyTree::dict([("x", PyTree::Leaf(x.clone()))]), &PyTree::None, false)
        .unwrap_err();
    assert!(err.to_string().contains("found dict and None"));

    let primals = PyTree::tuple(vec![x.clone().into()]);
    let tangents = PyTree::tuple(vec![x.clone().into(), x.clone().into()]);
    let err = jvp(&f, &primals, &tangents, false).unwrap_err();
    assert!(err.to_string().contains("same tree structure"));
}

#[test]
fn test_jvp_integer_primal_needs_float0_tangent() {
    let f = |args: &[PyTree]| args[1].map(|x| x.sin());
    let n = Array::from_vec_i32(vec![4], Shape::new(vec![1]));
    let x = arr(&[0.0]);
    let primals = PyTree::tuple(vec![n.clone().into(), x.clone().into()]);

    let bad = PyTree::tuple(vec![n.astype(DType::Float32).into(), x.clone().into()]);
    let err = jvp(&f, &primals, &bad, false).unwrap_err();
    assert_eq!(
        err,
        Error::DtypeMismatch { primal: DType::Int32, expected: DType::Float0, got: DType::Float32 }
    );

    let good = PyTree::tuple(vec![n.astype(DType::Float0).into(), arr(&[3.0]).into()]);
    let out = jvp(&f, &primals, &good, false).unwrap();
    assert_eq!(leaf_vec(Some(&out.tangent_out)), vec![3.0]);
}

#[test]
fn test_jvp_shape_mismatch() {
    let f = |args: &[PyTree]| args[0].clone();
    let primals = PyTree::list(vec![arr(&[1.0, 2.0]).into()]);
    let tangents = PyTree::list(vec![Array::zeros(Shape::new(vec![2, 1]), DType::Float64).into()]);
    let err = jvp(&f, &primals, &tangents, false).unwrap_err();
    assert!(err.to_string().contains("primal shape (2,) and tangent shape (2, 1)"));
}
