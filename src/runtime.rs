//! Differentiable runtimes: evaluate a flat function with tangents.
//!
//! A [`Runtime`] knows how to run a function on flat leaf arrays while
//! pushing tangents through it. [`TracingRuntime`] records the function once
//! and propagates every tangent lane in a single sweep; [`Looped`] wraps any
//! runtime and evaluates one direction at a time.

use crate::error::Result;
use crate::pytree::{PyTree, TreeDef};
use crate::trace::{vmap_last, with_trace, JVPEngine, TraceContext};
use crate::Array;

/// Result of evaluating a flattened function.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatOutput {
    /// Leaves of the primary output
    pub outputs: Vec<Array>,
    /// Structure of the primary output
    pub out_tree: TreeDef,
    /// Auxiliary output, passed through without tangents
    pub aux: Option<PyTree>,
}

/// A function over flat leaf arrays.
pub type FlatFn<'a> = dyn Fn(&[Array]) -> Result<FlatOutput> + Sync + 'a;

/// Evaluates functions together with their forward-mode derivatives.
pub trait Runtime: Sync {
    /// Evaluate `fun` at `primals` and push one tangent per primal through it.
    ///
    /// `tangents[i]` has the shape of `primals[i]`. Returns the output and
    /// one tangent per output leaf.
    fn jvp(
        &self,
        fun: &FlatFn<'_>,
        primals: &[Array],
        tangents: &[Array],
    ) -> Result<(FlatOutput, Vec<Array>)>;

    /// Push `lanes` tangent directions through `fun` at once.
    ///
    /// `tangents[i]` has shape `primals[i].shape + (lanes,)`; each returned
    /// tangent has shape `output.shape + (lanes,)`. The output itself is
    /// shared across lanes.
    ///
    /// The default maps [`Runtime::jvp`] over the lane axis.
    fn jvp_batched(
        &self,
        fun: &FlatFn<'_>,
        primals: &[Array],
        tangents: &[Array],
        lanes: usize,
    ) -> Result<(FlatOutput, Vec<Array>)> {
        vmap_last(|direction: &[Array]| self.jvp(fun, primals, direction), tangents, lanes)
    }
}

/// Runtime that traces the function once and replays tangent rules.
///
/// Every intermediate primal is kept in the traced graph, so the
/// non-derivative work is done once no matter how many lanes are pushed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRuntime;

impl Runtime for TracingRuntime {
    fn jvp(
        &self,
        fun: &FlatFn<'_>,
        primals: &[Array],
        tangents: &[Array],
    ) -> Result<(FlatOutput, Vec<Array>)> {
        let lifted: Vec<Array> =
            tangents.iter().map(|t| t.reshape(t.shape().with_trailing(1))).collect();
        let (output, stacked) = self.jvp_batched(fun, primals, &lifted, 1)?;
        let tangents_out = stacked
            .into_iter()
            .zip(&output.outputs)
            .map(|(t, out)| t.reshape(out.shape().clone()))
            .collect();
        Ok((output, tangents_out))
    }

    fn jvp_batched(
        &self,
        fun: &FlatFn<'_>,
        primals: &[Array],
        tangents: &[Array],
        lanes: usize,
    ) -> Result<(FlatOutput, Vec<Array>)> {
        // Fresh ids keep repeated arguments apart from each other and from
        // closed-over constants.
        let inputs: Vec<Array> = primals.iter().map(Array::retag).collect();

        let mut ctx = TraceContext::new("jacfwd");
        for input in &inputs {
            ctx.register_input(input);
        }
        let (output, ctx) = with_trace(ctx, || fun(&inputs));
        let output = output?;

        let graph = ctx.finalize(&output.outputs);
        let tangents_out = JVPEngine::new(lanes).jvp(&graph, tangents)?;
        Ok((output, tangents_out))
    }
}

/// Evaluates batched JVPs one direction at a time through the wrapped
/// runtime's single-direction [`Runtime::jvp`].
///
/// With the `parallel` feature the directions run on rayon's thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct Looped<R>(pub R);

impl<R: Runtime> Runtime for Looped<R> {
    fn jvp(
        &self,
        fun: &FlatFn<'_>,
        primals: &[Array],
        tangents: &[Array],
    ) -> Result<(FlatOutput, Vec<Array>)> {
        self.0.jvp(fun, primals, tangents)
    }
}
