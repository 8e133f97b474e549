//! Value and forward-mode Jacobian in one pass.
//!
//! [`value_and_jacfwd`] wraps a [`Function`] so that calling it returns
//! both the function's value and its full Jacobian with respect to the
//! selected arguments. The Jacobian is built by pushing every standard basis
//! direction of the input space through [`jvp`] at once.
//!
//! # Examples
//!
//! ```
//! # use jax_jacfwd::{value_and_jacfwd, Array, JacfwdConfig, PyTree, Shape};
//! let g = |args: &[PyTree]| match args[0].as_leaf() {
//!     Some(x) => PyTree::Leaf(x.square().sum_all()),
//!     None => PyTree::None,
//! };
//! let dg = value_and_jacfwd(g, JacfwdConfig::default()).unwrap();
//! let x = Array::from_vec(vec![0.0, 1.0, 2.0], Shape::new(vec![3]));
//! let out = dg.call(&[x.into()]).unwrap();
//! assert_eq!(out.value.as_leaf().and_then(Array::item), Some(5.0));
//! assert_eq!(out.jacobian.as_leaf().map(Array::to_vec), Some(vec![0.0, 2.0, 4.0]));
//! ```

use crate::error::{Error, Result};
use crate::function::Function;
use crate::pytree::{PyTree, TreeDef};
use crate::runtime::{FlatOutput, Runtime, TracingRuntime};
use crate::{Array, DType, Shape};
use std::ops::Range;

/// Which positional arguments to differentiate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argnums {
    /// One argument; its Jacobian entries are plain arrays.
    Single(usize),
    /// Several arguments; each Jacobian entry is a tuple with one array
    /// (or subtree) per selected argument.
    Many(Vec<usize>),
}

impl Argnums {
    /// Selected indices in order.
    pub fn indices(&self) -> Vec<usize> {
        match self {
            Argnums::Single(i) => vec![*i],
            Argnums::Many(indices) => indices.clone(),
        }
    }

    /// Check the selection against a call with `nargs` arguments.
    pub fn validate(&self, nargs: usize) -> Result<Vec<usize>> {
        let indices = self.indices();
        let mut seen = vec![false; nargs];
        let valid = !indices.is_empty()
            && indices.iter().all(|&i| {
                let fresh = i < nargs && !seen[i];
                if fresh {
                    seen[i] = true;
                }
                fresh
            });
        if valid {
            Ok(indices)
        } else {
            Err(Error::InvalidArgnums { argnums: indices, nargs })
        }
    }
}

impl Default for Argnums {
    fn default() -> Self {
        Argnums::Single(0)
    }
}

impl From<usize> for Argnums {
    fn from(index: usize) -> Self {
        Argnums::Single(index)
    }
}

impl From<Vec<usize>> for Argnums {
    fn from(indices: Vec<usize>) -> Self {
        Argnums::Many(indices)
    }
}

impl<const N: usize> From<[usize; N]> for Argnums {
    fn from(indices: [usize; N]) -> Self {
        Argnums::Many(indices.to_vec())
    }
}

/// Configuration for [`value_and_jacfwd`].
///
/// # Examples
///
/// ```
/// # use jax_jacfwd::{Argnums, JacfwdConfig};
/// let config = JacfwdConfig::new().argnums([0usize, 2]).has_aux(true);
/// assert_eq!(config.argnums, Argnums::Many(vec![0, 2]));
/// assert!(!config.holomorphic);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JacfwdConfig {
    /// Arguments to differentiate (default: the first)
    pub argnums: Argnums,
    /// Accept integer inputs and complex outputs
    pub holomorphic: bool,
    /// The function returns `(value, aux)` and only `value` is differentiated
    pub has_aux: bool,
}

impl JacfwdConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the differentiated arguments.
    pub fn argnums(mut self, argnums: impl Into<Argnums>) -> Self {
        self.argnums = argnums.into();
        self
    }

    /// Set holomorphic mode.
    pub fn holomorphic(mut self, holomorphic: bool) -> Self {
        self.holomorphic = holomorphic;
        self
    }

    /// Set whether the function returns auxiliary data.
    pub fn has_aux(mut self, has_aux: bool) -> Self {
        self.has_aux = has_aux;
        self
    }
}

/// Output of [`jvp`].
#[derive(Debug, Clone, PartialEq)]
pub struct JvpOutput {
    /// Value of the function
    pub primal_out: PyTree,
    /// Directional derivative, shaped like `primal_out`
    pub tangent_out: PyTree,
    /// Auxiliary output when `has_aux` was set
    pub aux: Option<PyTree>,
}

/// Split positional arguments out of a tuple or list.
fn positional(tree: PyTree) -> Result<Vec<PyTree>> {
    match tree {
        PyTree::Tuple(items) | PyTree::List(items) => Ok(items),
        other => Err(Error::ArgumentStructure(format!(
            "arguments must be a tuple or list, found {}",
            other.kind()
        ))),
    }
}

fn split_aux(result: PyTree) -> Result<(PyTree, Option<PyTree>)> {
    match result {
        PyTree::Tuple(items) | PyTree::List(items) if items.len() == 2 => {
            let mut items = items.into_iter();
            match (items.next(), items.next()) {
                (Some(value), Some(aux)) => Ok((value, Some(aux))),
                _ => Err(Error::AuxOutput("a malformed pair".to_string())),
            }
        }
        other => Err(Error::AuxOutput(other.tree_def().to_string())),
    }
}

/// Wrap `fun` as a function over the leaves of `in_tree`.
fn flatten_fun<'a, F>(
    fun: &'a F,
    in_tree: &'a TreeDef,
    has_aux: bool,
) -> impl Fn(&[Array]) -> Result<FlatOutput> + Sync + 'a
where
    F: Function + ?Sized,
{
    move |leaves: &[Array]| -> Result<FlatOutput> {
        let args = positional(in_tree.unflatten(leaves.to_vec())?)?;
        let result = fun.call(&args)?;
        let (primary, aux) = if has_aux { split_aux(result)? } else { (result, None) };
        let (outputs, out_tree) = primary.flatten();
        Ok(FlatOutput { outputs, out_tree, aux })
    }
}

/// Evaluate `fun` at `primals` and its derivative along `tangents`.
///
/// `primals` and `tangents` are the positional arguments, given as tuples
/// or lists with equal structure. Every tangent leaf must have the shape of
/// its primal and dtype `primal.dtype().tangent_dtype()`. The first
/// mismatching pair is reported.
///
/// # Examples
///
/// ```
/// # use jax_jacfwd::{jvp, Array, PyTree, Shape};
/// let f = |args: &[PyTree]| args[0].map(|x| x.sin());
/// let x = Array::from_vec_f64(vec![0.0], Shape::new(vec![1]));
/// let t = Array::from_vec_f64(vec![2.0], Shape::new(vec![1]));
/// let out = jvp(&f, &PyTree::tuple(vec![x.into()]), &PyTree::tuple(vec![t.into()]), false).unwrap();
/// assert_eq!(out.tangent_out.as_leaf().map(Array::to_vec), Some(vec![2.0]));
/// ```
pub fn jvp<F>(fun: &F, primals: &PyTree, tangents: &PyTree, has_aux: bool) -> Result<JvpOutput>
where
    F: Function + ?Sized,
{
    jvp_with(&TracingRuntime, fun, primals, tangents, has_aux)
}

/// [`jvp`] with an explicit runtime.
pub fn jvp_with<R, F>(
    runtime: &R,
    fun: &F,
    primals: &PyTree,
    tangents: &PyTree,
    has_aux: bool,
) -> Result<JvpOutput>
where
    R: Runtime + ?Sized,
    F: Function + ?Sized,
{
    if !primals.is_sequence() || !tangents.is_sequence() {
        return Err(Error::ArgumentStructure(format!(
            "must be tuples or lists; found {} and {}",
            primals.kind(),
            tangents.kind()
        )));
    }

    let (primal_leaves, tree_def) = primals.flatten();
    let (tangent_leaves, tree_def_2) = tangents.flatten();
    if tree_def != tree_def_2 {
        return Err(Error::ArgumentStructure(format!(
            "must have the same tree structure; primals have tree structure {} whereas \
             tangents have tree structure {}",
            tree_def, tree_def_2
        )));
    }

    for (p, t) in primal_leaves.iter().zip(&tangent_leaves) {
        let expected = p.dtype().tangent_dtype();
        if t.dtype() != expected {
            return Err(Error::DtypeMismatch { primal: p.dtype(), expected, got: t.dtype() });
        }
        if p.shape() != t.shape() {
            return Err(Error::ShapeMismatch { primal: p.shape().clone(), tangent: t.shape().clone() });
        }
    }

    let flat_fun = flatten_fun(fun, &tree_def, has_aux);
    let (output, tangent_out) = runtime.jvp(&flat_fun, &primal_leaves, &tangent_leaves)?;
    let primal_out = output.out_tree.unflatten(output.outputs)?;
    let tangent_out = output.out_tree.unflatten(tangent_out)?;
    Ok(JvpOutput { primal_out, tangent_out, aux: output.aux })
}

/// One standard basis direction: a single one at flat offset `index`.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisDirection {
    /// Flat scalar offset of the one
    pub index: usize,
    /// One tangent per leaf
    pub tangents: Vec<Array>,
}

/// The standard basis of the tangent space of a list of leaves.
///
/// Leaves are laid out one after another in the given order, each in
/// row-major order. Leaves whose tangent dtype is `float0` take no room.
#[derive(Debug, Clone)]
pub struct StandardBasis {
    shapes: Vec<Shape>,
    dtypes: Vec<DType>,
    offsets: Vec<usize>,
    dimension: usize,
}

impl StandardBasis {
    /// Basis for the tangent space of `leaves`.
    pub fn new(leaves: &[Array]) -> Self {
        let mut offsets = Vec::with_capacity(leaves.len());
        let mut dimension = 0;
        for leaf in leaves {
            offsets.push(dimension);
            if leaf.dtype().tangent_dtype() != DType::Float0 {
                dimension += leaf.size();
            }
        }
        Self {
            shapes: leaves.iter().map(|leaf| leaf.shape().clone()).collect(),
            dtypes: leaves.iter().map(|leaf| leaf.dtype().tangent_dtype()).collect(),
            offsets,
            dimension,
        }
    }

    /// Number of scalar degrees of freedom.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Range of basis indices belonging to leaf `leaf`.
    pub fn leaf_range(&self, leaf: usize) -> Range<usize> {
        let start = self.offsets[leaf];
        if self.dtypes[leaf] == DType::Float0 {
            start..start
        } else {
            start..start + self.shapes[leaf].size()
        }
    }

    /// Direction `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.dimension()`.
    pub fn direction(&self, index: usize) -> BasisDirection {
        assert!(index < self.dimension, "basis index {} out of range {}", index, self.dimension);
        let tangents = (0..self.shapes.len())
            .map(|leaf| {
                let shape = self.shapes[leaf].clone();
                let range = self.leaf_range(leaf);
                if !range.contains(&index) {
                    return Array::zeros(shape, self.dtypes[leaf]);
                }
                let mut data = vec![0.0; shape.size()];
                data[index - range.start] = 1.0;
                Array::from_real_data(data, shape, self.dtypes[leaf])
            })
            .collect();
        BasisDirection { index, tangents }
    }

    /// All directions in canonical order.
    pub fn directions(&self) -> impl Iterator<Item = BasisDirection> + '_ {
        (0..self.dimension).map(move |index| self.direction(index))
    }

    /// Every direction at once: per leaf, an array `leaf_shape + (D,)`
    /// whose `i`-th trailing slice is direction `i`.
    pub fn stacked(&self) -> Vec<Array> {
        let d = self.dimension;
        (0..self.shapes.len())
            .map(|leaf| {
                let shape = self.shapes[leaf].with_trailing(d);
                let range = self.leaf_range(leaf);
                if self.dtypes[leaf] == DType::Float0 {
                    return Array::zeros(shape, DType::Float0);
                }
                let mut data = vec![0.0; shape.size()];
                for (p, lane) in range.enumerate() {
                    data[p * d + lane] = 1.0;
                }
                Array::from_real_data(data, shape, self.dtypes[leaf])
            })
            .collect()
    }
}

/// Output of [`batched_jacobian`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchedJacobian {
    /// Value of the function
    pub value: PyTree,
    /// Structure of `value`
    pub out_tree: TreeDef,
    /// Auxiliary output when `has_aux` was set
    pub aux: Option<PyTree>,
    /// Per output leaf, the derivatives along every direction:
    /// `output_shape + (dimension,)`
    pub stacked: Vec<Array>,
    /// Number of basis directions
    pub dimension: usize,
}

/// Push the standard basis of `primals` through `fun` in one batched call.
///
/// The value and aux are computed once and shared by every direction.
pub fn batched_jacobian<R, F>(
    runtime: &R,
    fun: &F,
    primals: &[PyTree],
    has_aux: bool,
) -> Result<BatchedJacobian>
where
    R: Runtime + ?Sized,
    F: Function + ?Sized,
{
    let (leaves, in_tree) = PyTree::Tuple(primals.to_vec()).flatten();
    let basis = StandardBasis::new(&leaves);

    let flat_fun = flatten_fun(fun, &in_tree, has_aux);
    let (output, stacked) =
        runtime.jvp_batched(&flat_fun, &leaves, &basis.stacked(), basis.dimension())?;

    let FlatOutput { outputs, out_tree, aux } = output;
    let value = out_tree.unflatten(outputs)?;
    Ok(BatchedJacobian { value, out_tree, aux, stacked, dimension: basis.dimension() })
}

/// Split the trailing axis of `stacked` into one array per leaf of
/// `example`, each shaped `output_shape + leaf_shape`.
///
/// Leaves without a tangent space come back as `float0` zeros; the others
/// take the example leaf's dtype, dropping imaginary parts for real leaves.
pub fn unravel_array_into_pytree(example: &PyTree, stacked: &Array) -> Result<PyTree> {
    let (leaves, def) = example.flatten();
    let basis = StandardBasis::new(&leaves);
    let (out_shape, d) = stacked
        .shape()
        .split_last()
        .ok_or_else(|| Error::Reshape(format!("{} has no trailing axis to split", stacked)))?;
    if d != basis.dimension() {
        return Err(Error::Reshape(format!(
            "trailing axis of {} does not match {} degrees of freedom of {}",
            stacked,
            basis.dimension(),
            def
        )));
    }

    let parts = leaves
        .iter()
        .enumerate()
        .map(|(i, leaf)| {
            let shape = out_shape.concat(leaf.shape());
            if leaf.dtype().tangent_dtype() == DType::Float0 {
                return Array::zeros(shape, DType::Float0);
            }
            let part = stacked.slice_last(basis.leaf_range(i)).reshape(shape);
            if part.dtype() == DType::Float0 || part.dtype() == leaf.dtype() {
                part
            } else {
                part.astype(leaf.dtype())
            }
        })
        .collect();
    def.unflatten(parts)
}

/// Reject inputs without a tangent space unless `holomorphic`.
pub fn check_input_dtype(holomorphic: bool, dtype: DType) -> Result<()> {
    if holomorphic || dtype.is_inexact() {
        Ok(())
    } else {
        Err(Error::InputDtype { dtype })
    }
}

/// Reject non-real-float outputs unless `holomorphic`.
pub fn check_output_dtype(holomorphic: bool, dtype: DType) -> Result<()> {
    if holomorphic || dtype.is_float() {
        Ok(())
    } else {
        Err(Error::OutputDtype { dtype })
    }
}

/// `fun` with the non-differentiated arguments fixed.
struct Partial<'a, F: ?Sized> {
    fun: &'a F,
    args: &'a [PyTree],
    argnums: &'a [usize],
}

impl<F: Function + ?Sized> Function for Partial<'_, F> {
    fn call(&self, dyn_args: &[PyTree]) -> Result<PyTree> {
        let mut args = self.args.to_vec();
        for (&i, arg) in self.argnums.iter().zip(dyn_args) {
            args[i] = arg.clone();
        }
        self.fun.call(&args)
    }
}

/// Value, optional aux and Jacobian of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueAndJacobian {
    /// Value of the function
    pub value: PyTree,
    /// Auxiliary output when `has_aux` was set
    pub aux: Option<PyTree>,
    /// Per output leaf, the derivatives with respect to the selected
    /// arguments, shaped `output_shape + input_shape`
    pub jacobian: PyTree,
}

impl ValueAndJacobian {
    /// `(value, jacobian)`, or `((value, aux), jacobian)` with aux.
    pub fn into_parts(self) -> (PyTree, PyTree) {
        match self.aux {
            Some(aux) => (PyTree::Tuple(vec![self.value, aux]), self.jacobian),
            None => (self.value, self.jacobian),
        }
    }
}

/// A function transformed by [`value_and_jacfwd`].
#[derive(Debug, Clone)]
pub struct ValueAndJacfwd<F, R = TracingRuntime> {
    fun: F,
    config: JacfwdConfig,
    runtime: R,
}

/// Wrap `fun` so that calls return its value together with its Jacobian.
///
/// Fails with [`Error::NotCallable`] if `fun` cannot be invoked.
pub fn value_and_jacfwd<F: Function>(fun: F, config: JacfwdConfig) -> Result<ValueAndJacfwd<F>> {
    fun.check_callable()?;
    Ok(ValueAndJacfwd { fun, config, runtime: TracingRuntime })
}

impl<F: Function, R: Runtime> ValueAndJacfwd<F, R> {
    /// Use `runtime` to evaluate tangents.
    pub fn with_runtime<R2: Runtime>(self, runtime: R2) -> ValueAndJacfwd<F, R2> {
        ValueAndJacfwd { fun: self.fun, config: self.config, runtime }
    }

    /// The configuration in use.
    pub fn config(&self) -> &JacfwdConfig {
        &self.config
    }

    /// Evaluate the function and its Jacobian at `args`.
    pub fn call(&self, args: &[PyTree]) -> Result<ValueAndJacobian> {
        let JacfwdConfig { argnums, holomorphic, has_aux } = &self.config;

        self.fun.check_callable()?;
        let indices = argnums.validate(args.len())?;
        let dyn_args: Vec<PyTree> = indices.iter().map(|&i| args[i].clone()).collect();

        for leaf in dyn_args.iter().flat_map(PyTree::leaves) {
            check_input_dtype(*holomorphic, leaf.dtype())?;
        }

        let partial = Partial { fun: &self.fun, args, argnums: &indices };
        let batched = batched_jacobian(&self.runtime, &partial, &dyn_args, *has_aux)?;

        for leaf in batched.value.leaves() {
            check_output_dtype(*holomorphic, leaf.dtype())?;
        }

        let example = match argnums {
            Argnums::Single(_) => dyn_args[0].clone(),
            Argnums::Many(_) => PyTree::Tuple(dyn_args),
        };
        let per_output = batched
            .stacked
            .iter()
            .map(|stacked| unravel_array_into_pytree(&example, stacked))
            .collect::<Result<Vec<_>>>()?;
        let jacobian = batched.out_tree.unflatten_subtrees(per_output)?;

        Ok(ValueAndJacobian { value: batched.value, aux: batched.aux, jacobian })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Looped;
    use approx::assert_abs_diff_eq;

    fn leaf(args: &[PyTree], i: usize) -> Array {
        args[i].as_leaf().cloned().unwrap_or_else(|| Array::scalar(f64::NAN, DType::Float32))
    }

    fn arange(n: usize) -> Array {
        Array::from_vec((0..n).map(|i| i as f32).collect(), Shape::new(vec![n]))
    }

    #[test]
    fn test_value_and_jacobian_of_square_sum() {
        let g = |args: &[PyTree]| PyTree::Leaf(leaf(args, 0).square().sum_all());
        let dg = value_and_jacfwd(g, JacfwdConfig::default()).unwrap();
        let (value, jac) = dg.call(&[arange(3).into()]).unwrap().into_parts();
        assert_eq!(value.as_leaf().and_then(Array::item), Some(5.0));
        assert_eq!(jac.as_leaf().map(Array::to_vec), Some(vec![0.0, 2.0, 4.0]));
    }

    #[test]
    fn test_aux_passthrough() {
        let f = |args: &[PyTree]| {
            let x = leaf(args, 0);
            PyTree::tuple(vec![x.square().sum_all().into(), x.sum_all().into()])
        };
        let df = value_and_jacfwd(f, JacfwdConfig::new().has_aux(true)).unwrap();
        let out = df.call(&[arange(3).into()]).unwrap();
        assert_eq!(out.aux.as_ref().and_then(PyTree::as_leaf).and_then(Array::item), Some(3.0));
        let (value_aux, _) = out.into_parts();
        assert_eq!(value_aux.get(0).and_then(PyTree::as_leaf).and_then(Array::item), Some(5.0));
    }

    #[test]
    fn test_missing_aux_pair() {
        let f = |args: &[PyTree]| PyTree::Leaf(leaf(args, 0).sum_all());
        let df = value_and_jacfwd(f, JacfwdConfig::new().has_aux(true)).unwrap();
        let err = df.call(&[arange(2).into()]).unwrap_err();
        assert!(matches!(err, Error::AuxOutput(_)));
    }

    #[test]
    fn test_many_argnums_nest_per_argument() {
        let f = |args: &[PyTree]| PyTree::Leaf(leaf(args, 0).mul(&leaf(args, 2)).sum_all());
        let config = JacfwdConfig::new().argnums(vec![2usize, 0]);
        let df = value_and_jacfwd(f, config).unwrap();
        let x = Array::from_vec(vec![1.0, 2.0], Shape::new(vec![2]));
        let y = Array::from_vec(vec![3.0, 4.0], Shape::new(vec![2]));
        let unused = Array::from_vec_i32(vec![7], Shape::new(vec![1]));
        let out = df.call(&[x.into(), unused.into(), y.into()]).unwrap();

        let d_y = out.jacobian.get(0).and_then(PyTree::as_leaf).map(Array::to_vec);
        let d_x = out.jacobian.get(1).and_then(PyTree::as_leaf).map(Array::to_vec);
        assert_eq!(d_y, Some(vec![1.0, 2.0]));
        assert_eq!(d_x, Some(vec![3.0, 4.0]));
    }

    #[test]
    fn test_invalid_argnums() {
        let f = |args: &[PyTree]| args[0].clone();
        let x: PyTree = arange(1).into();
        for argnums in [Argnums::Single(1), Argnums::Many(vec![]), Argnums::Many(vec![0, 0])] {
            let df = value_and_jacfwd(f, JacfwdConfig::new().argnums(argnums)).unwrap();
            let err = df.call(std::slice::from_ref(&x)).unwrap_err();
            assert!(matches!(err, Error::InvalidArgnums { nargs: 1, .. }));
        }
    }

    #[test]
    fn test_dtype_policies() {
        let f = |args: &[PyTree]| args[0].clone();
        let ints = Array::from_vec_i32(vec![1, 2], Shape::new(vec![2]));
        let df = value_and_jacfwd(f, JacfwdConfig::default()).unwrap();
        assert_eq!(df.call(&[ints.clone().into()]).unwrap_err(), Error::InputDtype { dtype: DType::Int32 });

        // holomorphic lets integers through; they have no directions
        let df = value_and_jacfwd(f, JacfwdConfig::new().holomorphic(true)).unwrap();
        let out = df.call(&[ints.into()]).unwrap();
        let jac = out.jacobian.as_leaf().cloned().unwrap();
        assert_eq!(jac.dtype(), DType::Float0);
        assert_eq!(jac.shape().as_slice(), &[2, 2]);

        let to_complex = |args: &[PyTree]| args[0].map(|x| x.astype(DType::Complex64));
        let df = value_and_jacfwd(to_complex, JacfwdConfig::default()).unwrap();
        let err = df.call(&[arange(2).into()]).unwrap_err();
        assert_eq!(err, Error::OutputDtype { dtype: DType::Complex64 });
    }

    #[test]
    fn test_holomorphic_complex_square() {
        let f = |args: &[PyTree]| args[0].map(|z| z.square());
        let z = Array::from_complex(vec![num_complex::Complex::new(1.0, 2.0)], Shape::new(vec![1]));
        let df = value_and_jacfwd(f, JacfwdConfig::new().holomorphic(true)).unwrap();
        let out = df.call(&[z.into()]).unwrap();
        let d = out.jacobian.as_leaf().map(Array::to_complex_vec);
        assert_eq!(d, Some(vec![num_complex::Complex::new(2.0, 4.0)]));
    }

    #[test]
    fn test_fixed_arguments_are_constants() {
        let f = |args: &[PyTree]| PyTree::Leaf(leaf(args, 0).mul(&leaf(args, 1)));
        let df = value_and_jacfwd(f, JacfwdConfig::default()).unwrap();
        let x = Array::from_vec_f64(vec![2.0], Shape::new(vec![1]));
        let out = df.call(&[x.clone().into(), x.into()]).unwrap();
        assert_eq!(out.jacobian.as_leaf().map(Array::to_vec), Some(vec![2.0]));
    }

    #[test]
    fn test_looped_runtime_agrees() {
        let f = |args: &[PyTree]| {
            let x = leaf(args, 0);
            PyTree::list(vec![x.tanh().into(), x.mul(&x).sum_all().into()])
        };
        let x = Array::from_vec_f64(vec![0.3, -0.7, 1.1], Shape::new(vec![3]));
        let batched = value_and_jacfwd(f, JacfwdConfig::default()).unwrap();
        let looped = batched.clone().with_runtime(Looped(TracingRuntime));
        let a = batched.call(&[x.clone().into()]).unwrap();
        let b = looped.call(&[x.into()]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_jvp_checks() {
        let f = |args: &[PyTree]| args[0].clone();
        let x = Array::from_vec(vec![1.0, 2.0], Shape::new(vec![2]));
        let p = PyTree::tuple(vec![x.clone().into()]);

        let err = jvp(&f, &PyTree::Leaf(x.clone()), &p, false).unwrap_err();
        assert!(matches!(err, Error::ArgumentStructure(_)));

        let err = jvp(&f, &p, &PyTree::list(vec![x.clone().into()]), false).unwrap_err();
        assert!(matches!(err, Error::ArgumentStructure(_)));

        let wrong_dtype = PyTree::tuple(vec![x.astype(DType::Float64).into()]);
        let err = jvp(&f, &p, &wrong_dtype, false).unwrap_err();
        assert_eq!(
            err,
            Error::DtypeMismatch { primal: DType::Float32, expected: DType::Float32, got: DType::Float64 }
        );

        let wrong_shape = PyTree::tuple(vec![Array::zeros(Shape::new(vec![3]), DType::Float32).into()]);
        let err = jvp(&f, &p, &wrong_shape, false).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_jvp_with_aux() {
        let f = |args: &[PyTree]| {
            let x = leaf(args, 0);
            PyTree::tuple(vec![x.exp().into(), x.sum_all().into()])
        };
        let x = Array::from_vec_f64(vec![0.0, 1.0], Shape::new(vec![2]));
        let t = Array::from_vec_f64(vec![1.0, 1.0], Shape::new(vec![2]));
        let out = jvp(&f, &PyTree::tuple(vec![x.into()]), &PyTree::tuple(vec![t.into()]), true)
            .unwrap();
        let tangent = out.tangent_out.as_leaf().map(Array::to_vec).unwrap_or_default();
        assert_abs_diff_eq!(tangent[1], std::f64::consts::E, epsilon = 1e-12);
        assert_eq!(out.aux.as_ref().and_then(PyTree::as_leaf).and_then(Array::item), Some(1.0));
    }

    #[test]
    fn test_standard_basis() {
        let leaves = vec![
            Array::zeros(Shape::new(vec![2]), DType::Float32),
            Array::zeros(Shape::new(vec![3]), DType::Int32),
            Array::zeros(Shape::scalar(), DType::Float64),
        ];
        let basis = StandardBasis::new(&leaves);
        assert_eq!(basis.dimension(), 3);
        assert_eq!(basis.leaf_range(1), 2..2);
        assert_eq!(basis.leaf_range(2), 2..3);

        let directions: Vec<_> = basis.directions().collect();
        assert_eq!(directions.len(), 3);
        assert_eq!(directions[1].tangents[0].to_vec(), vec![0.0, 1.0]);
        assert_eq!(directions[1].tangents[1].dtype(), DType::Float0);
        assert_eq!(directions[2].tangents[2].item(), Some(1.0));

        let stacked = basis.stacked();
        assert_eq!(stacked[0].shape().as_slice(), &[2, 3]);
        assert_eq!(stacked[0].to_vec(), vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(stacked[1].shape().as_slice(), &[3, 3]);
        assert_eq!(stacked[2].to_vec(), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unravel_array_into_pytree() {
        let example = PyTree::dict([
            ("a", PyTree::Leaf(Array::zeros(Shape::new(vec![2, 2]), DType::Float64))),
            ("b", PyTree::Leaf(Array::zeros(Shape::new(vec![1]), DType::Float64))),
        ]);
        let data: Vec<f64> = (0..10).map(f64::from).collect();
        let stacked = Array::from_vec_f64(data, Shape::new(vec![2, 5]));
        let tree = unravel_array_into_pytree(&example, &stacked).unwrap();

        let a = tree.get_key("a").and_then(PyTree::as_leaf).cloned().unwrap();
        assert_eq!(a.shape().as_slice(), &[2, 2, 2]);
        assert_eq!(a.to_vec(), vec![0.0, 1.0, 2.0, 3.0, 5.0, 6.0, 7.0, 8.0]);
        let b = tree.get_key("b").and_then(PyTree::as_leaf).cloned().unwrap();
        assert_eq!(b.to_vec(), vec![4.0, 9.0]);

        let bad = Array::zeros(Shape::new(vec![2, 4]), DType::Float64);
        assert!(matches!(unravel_array_into_pytree(&example, &bad), Err(Error::Reshape(_))));
    }
}
