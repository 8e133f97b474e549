//! Forward-mode tangent propagation over a traced graph.
//!
//! Tangents carry a trailing lane axis: a node with primal shape `s` has a
//! tangent of shape `s + (lanes,)`, one column per probing direction. A
//! single-direction JVP is the `lanes == 1` case.

use crate::error::{Error, Result};
use crate::trace::{suspend_trace, IRGraph, IRNode, Primitive};
use crate::{Array, DType, Shape};
use num_complex::Complex;
use std::collections::HashMap;
use std::sync::Arc;

/// Jacobian-vector product computation engine.
///
/// Implements forward-mode automatic differentiation by propagating
/// batched tangents through the graph in recording order. Missing tangents
/// (`None`) are symbolic zeros and are only materialized at the outputs.
pub struct JVPEngine {
    /// Width of the trailing lane axis
    lanes: usize,
    /// Tangent for each visited node, keyed by node address
    tangents: HashMap<usize, Option<Array>>,
}

impl JVPEngine {
    /// Create an engine propagating `lanes` directions at once.
    pub fn new(lanes: usize) -> Self {
        Self { lanes, tangents: HashMap::new() }
    }

    /// Number of directions propagated together.
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Push input tangents through `graph` and return the output tangents.
    ///
    /// `tangents[i]` must have shape `inputs[i].shape + (lanes,)`. Inputs
    /// whose primal has no tangent space (integers, booleans) and `float0`
    /// tangents contribute nothing.
    pub fn jvp(&mut self, graph: &IRGraph, tangents: &[Array]) -> Result<Vec<Array>> {
        if graph.inputs.len() != tangents.len() {
            return Err(Error::ArgumentStructure(format!(
                "graph '{}' has {} inputs but {} tangents were given",
                graph.name,
                graph.inputs.len(),
                tangents.len()
            )));
        }

        let _untraced = suspend_trace();
        self.tangents.clear();

        for (input, tangent) in graph.inputs.iter().zip(tangents) {
            let seeded = self.seed(input, tangent)?;
            self.tangents.insert(IRNode::key(input), seeded);
        }

        for node in &graph.nodes {
            let key = IRNode::key(node);
            if self.tangents.contains_key(&key) {
                continue;
            }
            let tangent = match node.as_ref() {
                IRNode::Input { .. } | IRNode::Constant { .. } => None,
                IRNode::Unary { op, input, .. } => match self.tangent(input) {
                    Some(t) => self.jvp_unary(op, input.value(), node.value(), &t),
                    None => None,
                },
                IRNode::Binary { op, lhs, rhs, .. } => {
                    let tl = self.tangent(lhs);
                    let tr = self.tangent(rhs);
                    if tl.is_none() && tr.is_none() {
                        None
                    } else {
                        self.jvp_binary(op, lhs.value(), rhs.value(), node.value(), tl, tr)
                    }
                }
            };
            let fitted = tangent.and_then(|t| self.fit(t, node.value()));
            self.tangents.insert(key, fitted);
        }

        Ok(graph
            .outputs
            .iter()
            .map(|output| {
                self.tangent(output).unwrap_or_else(|| {
                    Array::zeros(self.with_lanes(output.shape()), output.dtype().tangent_dtype())
                })
            })
            .collect())
    }

    fn seed(&self, input: &Arc<IRNode>, tangent: &Array) -> Result<Option<Array>> {
        let primal = input.value();
        let expected = self.with_lanes(primal.shape());
        if tangent.shape() != &expected {
            return Err(Error::ShapeMismatch { primal: expected, tangent: tangent.shape().clone() });
        }
        if tangent.dtype() == DType::Float0 {
            return Ok(None);
        }
        Ok(self.fit(tangent.clone(), primal))
    }

    fn tangent(&self, node: &Arc<IRNode>) -> Option<Array> {
        self.tangents.get(&IRNode::key(node)).cloned().flatten()
    }

    fn with_lanes(&self, shape: &Shape) -> Shape {
        shape.with_trailing(self.lanes)
    }

    /// Coerce a rule's result to the node's tangent shape and dtype.
    fn fit(&self, tangent: Array, value: &Array) -> Option<Array> {
        let dtype = value.dtype().tangent_dtype();
        if dtype == DType::Float0 {
            return None;
        }
        let tangent = if tangent.dtype() != dtype { tangent.astype(dtype) } else { tangent };
        let shape = self.with_lanes(value.shape());
        if tangent.shape() != &shape {
            Some(tangent.broadcast_to(&shape))
        } else {
            Some(tangent)
        }
    }

    /// JVP rule for single-operand primitives.
    fn jvp_unary(&self, op: &Primitive, x: &Array, y: &Array, t: &Array) -> Option<Array> {
        let tangent = match op {
            Primitive::Neg => t.neg(),
            Primitive::Abs => {
                if x.dtype().is_complex() {
                    // d|z| = Re(conj(z) / |z| * dz)
                    t.mul(&lane(&x.sign().conj())).real()
                } else {
                    t.mul(&lane(&x.sign()))
                }
            }
            Primitive::Sign => return None,
            Primitive::Sin => t.mul(&lane(&x.cos())),
            Primitive::Cos => t.mul(&lane(&x.sin())).neg(),
            Primitive::Tanh => {
                let one = Array::scalar(1.0, y.dtype());
                t.mul(&lane(&one.sub(&y.square())))
            }
            Primitive::Exp => t.mul(&lane(y)),
            Primitive::Log => t.div(&lane(x)),
            Primitive::Sqrt => t.div(&lane(&y.scale(2.0))),
            Primitive::Square => t.mul(&lane(&x.scale(2.0))),
            Primitive::Reciprocal => t.mul(&lane(&y.square().neg())),
            Primitive::Real => t.real(),
            Primitive::Imag => t.imag(),
            Primitive::Conj => t.conj(),
            Primitive::Convert { dtype } => {
                if !dtype.is_inexact() {
                    return None;
                }
                t.astype(*dtype)
            }
            Primitive::SumAll => self.sum_all_lanes(t, x.size()),
            Primitive::Sum { axis } => t.sum(*axis),
            Primitive::MeanAll => self.sum_all_lanes(t, x.size()).scale(1.0 / x.size() as f64),
            Primitive::Mean { axis } => {
                let len = x.shape().get(*axis).unwrap_or(1);
                t.sum(*axis).scale(1.0 / len as f64)
            }
            Primitive::Reshape { new_shape } => {
                t.reshape(self.with_lanes(&Shape::new(new_shape.clone())))
            }
            Primitive::BroadcastTo { shape } => {
                t.broadcast_to(&self.with_lanes(&Shape::new(shape.clone())))
            }
            Primitive::Permute { axes } => {
                let mut axes = axes.clone();
                axes.push(axes.len());
                t.permute(&axes)
            }
            Primitive::Add
            | Primitive::Sub
            | Primitive::Mul
            | Primitive::Div
            | Primitive::Pow
            | Primitive::Matmul => unreachable!("binary primitive {} recorded as unary", op),
        };
        Some(tangent)
    }

    /// JVP rule for two-operand primitives. At least one tangent is present.
    fn jvp_binary(
        &self,
        op: &Primitive,
        l: &Array,
        r: &Array,
        y: &Array,
        tl: Option<Array>,
        tr: Option<Array>,
    ) -> Option<Array> {
        let lhs_term = |t: &Array| -> Array {
            match op {
                Primitive::Add | Primitive::Sub => t.clone(),
                Primitive::Mul => t.mul(&lane(r)),
                Primitive::Div => t.div(&lane(r)),
                Primitive::Pow => {
                    // d(l^r)/dl = r * l^(r - 1), and 0 wherever r == 0
                    let one = Array::scalar(1.0, r.dtype());
                    let slope = r.mul(&l.pow(&r.sub(&one)));
                    t.mul(&lane(&zero_where_zero(r, &slope)))
                }
                Primitive::Matmul => self.matmul_lhs(t, r),
                _ => unreachable!("unary primitive {} recorded as binary", op),
            }
        };
        let rhs_term = |t: &Array| -> Array {
            match op {
                Primitive::Add => t.clone(),
                Primitive::Sub => t.neg(),
                Primitive::Mul => lane(l).mul(t),
                Primitive::Div => t.mul(&lane(&y.div(r))).neg(),
                Primitive::Pow => t.mul(&lane(&one_where_zero(l).log().mul(y))),
                Primitive::Matmul => self.matmul_rhs(l, t),
                _ => unreachable!("unary primitive {} recorded as binary", op),
            }
        };

        match (tl, tr) {
            (Some(tl), Some(tr)) => Some(lhs_term(&tl).add(&rhs_term(&tr))),
            (Some(tl), None) => Some(lhs_term(&tl)),
            (None, Some(tr)) => Some(rhs_term(&tr)),
            (None, None) => None,
        }
    }

    /// Total of each lane: `(s..., L) -> (L,)`.
    fn sum_all_lanes(&self, t: &Array, primal_size: usize) -> Array {
        t.reshape(Shape::new(vec![primal_size, self.lanes])).sum(0)
    }

    /// `ta @ b` for a lhs tangent of shape `(m, k, L)`.
    fn matmul_lhs(&self, ta: &Array, b: &Array) -> Array {
        let dims = ta.shape().as_slice();
        let (m, k) = (dims[0], dims[1]);
        let n = b.shape().as_slice()[1];
        ta.permute(&[0, 2, 1])
            .reshape(Shape::new(vec![m * self.lanes, k]))
            .matmul(b)
            .reshape(Shape::new(vec![m, self.lanes, n]))
            .permute(&[0, 2, 1])
    }

    /// `a @ tb` for a rhs tangent of shape `(k, n, L)`.
    fn matmul_rhs(&self, a: &Array, tb: &Array) -> Array {
        let dims = tb.shape().as_slice();
        let (k, n) = (dims[0], dims[1]);
        let m = a.shape().as_slice()[0];
        a.matmul(&tb.reshape(Shape::new(vec![k, n * self.lanes])))
            .reshape(Shape::new(vec![m, n, self.lanes]))
    }
}

/// `value` with zeros wherever `mask` (broadcast to its shape) is zero.
fn zero_where_zero(mask: &Array, value: &Array) -> Array {
    let mask: Vec<bool> =
        mask.broadcast_to(value.shape()).to_complex_vec().iter().map(|m| m.norm_sqr() == 0.0).collect();
    if value.dtype().is_complex() {
        let data = value
            .to_complex_vec()
            .into_iter()
            .zip(&mask)
            .map(|(v, &zero)| if zero { Complex::new(0.0, 0.0) } else { v })
            .collect();
        Array::from_complex_data(data, value.shape().clone(), value.dtype())
    } else {
        let data =
            value.to_vec().into_iter().zip(&mask).map(|(v, &zero)| if zero { 0.0 } else { v }).collect();
        Array::from_real_data(data, value.shape().clone(), value.dtype())
    }
}

/// `a` with every zero replaced by one, so that its log stays finite.
fn one_where_zero(a: &Array) -> Array {
    if a.dtype().is_complex() {
        let data = a
            .to_complex_vec()
            .into_iter()
            .map(|z| if z.norm_sqr() == 0.0 { Complex::new(1.0, 0.0) } else { z })
            .collect();
        Array::from_complex_data(data, a.shape().clone(), a.dtype())
    } else {
        let data = a.to_vec().into_iter().map(|x| if x == 0.0 { 1.0 } else { x }).collect();
        Array::from_real_data(data, a.shape().clone(), a.dtype())
    }
}

/// Append a unit lane axis so a primal broadcasts against lane-batched tangents.
fn lane(a: &Array) -> Array {
    a.reshape(a.shape().with_trailing(1))
}
