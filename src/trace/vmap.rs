//! Vectorization over a trailing batch axis.
//!
//! `vmap_last` maps a function over the last axis of its inputs and stacks
//! the varying outputs along a new last axis, while one unbatched result is
//! shared across lanes. This is the `in_axes=-1, out_axes=(None, -1)` form
//! used to push a whole tangent basis through a single-direction JVP.

use crate::error::{Error, Result};
use crate::{Array, Shape};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Map `f` over the trailing axis of every array in `stacked`.
///
/// Each array must have `lanes` as its last dimension. `f` receives the
/// `i`-th slice of every input (with the lane axis removed) and returns a
/// shared value plus a list of per-lane arrays. The shared value of lane 0
/// is returned; per-lane arrays are stacked into `shape + (lanes,)`.
///
/// With zero lanes `f` is still evaluated once, on zeros, to learn the
/// output shapes.
///
/// # Examples
///
/// ```
/// # use jax_jacfwd::{Array, Shape};
/// # use jax_jacfwd::trace::vmap_last;
/// let xs = Array::from_vec_f64(vec![1.0, 2.0, 3.0, 4.0], Shape::new(vec![2, 2]));
/// let (total, doubled) = vmap_last(
///     |x: &[Array]| Ok((x[0].size(), vec![x[0].scale(2.0)])),
///     &[xs],
///     2,
/// )
/// .unwrap();
/// assert_eq!(total, 2);
/// assert_eq!(doubled[0].to_vec(), vec![2.0, 4.0, 6.0, 8.0]);
/// ```
pub fn vmap_last<S, F>(f: F, stacked: &[Array], lanes: usize) -> Result<(S, Vec<Array>)>
where
    S: Send,
    F: Fn(&[Array]) -> Result<(S, Vec<Array>)> + Sync,
{
    let mut bases = Vec::with_capacity(stacked.len());
    for array in stacked {
        match array.shape().split_last() {
            Some((base, len)) if len == lanes => bases.push(base),
            _ => {
                return Err(Error::Batching(format!(
                    "expected a trailing axis of length {}, got shape {}",
                    lanes,
                    array.shape()
                )))
            }
        }
    }

    if lanes == 0 {
        let probe: Vec<Array> = stacked
            .iter()
            .zip(&bases)
            .map(|(array, base)| Array::zeros(base.clone(), array.dtype()))
            .collect();
        let (shared, outputs) = f(&probe)?;
        let empty = outputs
            .iter()
            .map(|out| Array::stack_last(&[], out.shape(), out.dtype()))
            .collect();
        return Ok((shared, empty));
    }

    let lane_inputs = |i: usize| -> Vec<Array> {
        stacked
            .iter()
            .zip(&bases)
            .map(|(array, base)| array.slice_last(i..i + 1).reshape(base.clone()))
            .collect()
    };

    #[cfg(feature = "parallel")]
    let results: Vec<(S, Vec<Array>)> =
        (0..lanes).into_par_iter().map(|i| f(&lane_inputs(i))).collect::<Result<_>>()?;
    #[cfg(not(feature = "parallel"))]
    let results: Vec<(S, Vec<Array>)> =
        (0..lanes).map(|i| f(&lane_inputs(i))).collect::<Result<_>>()?;

    stack_results(results)
}

/// Keep the first shared value and stack per-lane outputs column-wise.
fn stack_results<S>(results: Vec<(S, Vec<Array>)>) -> Result<(S, Vec<Array>)> {
    let mut results = results.into_iter();
    let Some((shared, first)) = results.next() else {
        return Err(Error::Batching("no lanes to stack".to_string()));
    };

    let mut columns: Vec<Vec<Array>> = first.into_iter().map(|out| vec![out]).collect();
    for (lane, (_, outputs)) in results.enumerate() {
        if outputs.len() != columns.len() {
            return Err(Error::Batching(format!(
                "lane {} produced {} outputs, lane 0 produced {}",
                lane + 1,
                outputs.len(),
                columns.len()
            )));
        }
        for (column, out) in columns.iter_mut().zip(outputs) {
            let reference = &column[0];
            if out.shape() != reference.shape() || out.dtype() != reference.dtype() {
                return Err(Error::Batching(format!(
                    "lane {} produced {}, lane 0 produced {}",
                    lane + 1,
                    out,
                    reference
                )));
            }
            column.push(out);
        }
    }

    let stacked = columns
        .iter()
        .map(|column| {
            let shape: &Shape = column[0].shape();
            Array::stack_last(column, shape, column[0].dtype())
        })
        .collect();
    Ok((shared, stacked))
}
