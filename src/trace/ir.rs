//! Intermediate representation for traced operations.
//!
//! Every node keeps the primal value computed while tracing, so tangent
//! rules can be evaluated without running the function again.

use crate::{Array, DType, Shape};
use std::fmt;
use std::sync::Arc;

/// Primitive operations that can be traced and differentiated.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    // Unary operations
    Neg,
    Abs,
    Sign,
    Sin,
    Cos,
    Tanh,
    Exp,
    Log,
    Sqrt,
    Square,
    Reciprocal,
    Real,
    Imag,
    Conj,
    Convert { dtype: DType },

    // Binary operations
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Matmul,

    // Reductions
    SumAll,
    Sum { axis: usize },
    MeanAll,
    Mean { axis: usize },

    // Shape operations
    Reshape { new_shape: Vec<usize> },
    BroadcastTo { shape: Vec<usize> },
    Permute { axes: Vec<usize> },
}

impl Primitive {
    /// Short lowercase name, as used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Neg => "neg",
            Primitive::Abs => "abs",
            Primitive::Sign => "sign",
            Primitive::Sin => "sin",
            Primitive::Cos => "cos",
            Primitive::Tanh => "tanh",
            Primitive::Exp => "exp",
            Primitive::Log => "log",
            Primitive::Sqrt => "sqrt",
            Primitive::Square => "square",
            Primitive::Reciprocal => "reciprocal",
            Primitive::Real => "real",
            Primitive::Imag => "imag",
            Primitive::Conj => "conj",
            Primitive::Convert { .. } => "convert",
            Primitive::Add => "add",
            Primitive::Sub => "sub",
            Primitive::Mul => "mul",
            Primitive::Div => "div",
            Primitive::Pow => "pow",
            Primitive::Matmul => "matmul",
            Primitive::SumAll => "sum_all",
            Primitive::Sum { .. } => "sum",
            Primitive::MeanAll => "mean_all",
            Primitive::Mean { .. } => "mean",
            Primitive::Reshape { .. } => "reshape",
            Primitive::BroadcastTo { .. } => "broadcast_to",
            Primitive::Permute { .. } => "permute",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A node in the traced computation graph.
#[derive(Debug)]
pub enum IRNode {
    /// Positional input of the traced function.
    Input { index: usize, value: Array },
    /// Array that entered the trace without being produced by a traced op.
    Constant { value: Array },
    /// Single-operand operation (elementwise, reduction or reshape).
    Unary { op: Primitive, input: Arc<IRNode>, value: Array },
    /// Two-operand operation.
    Binary { op: Primitive, lhs: Arc<IRNode>, rhs: Arc<IRNode>, value: Array },
}

impl IRNode {
    /// Create an input node.
    pub fn input(index: usize, value: Array) -> Arc<Self> {
        Arc::new(IRNode::Input { index, value })
    }

    /// Create a constant node.
    pub fn constant(value: Array) -> Arc<Self> {
        Arc::new(IRNode::Constant { value })
    }

    /// Create a unary operation node.
    pub fn unary(op: Primitive, input: Arc<IRNode>, value: Array) -> Arc<Self> {
        Arc::new(IRNode::Unary { op, input, value })
    }

    /// Create a binary operation node.
    pub fn binary(op: Primitive, lhs: Arc<IRNode>, rhs: Arc<IRNode>, value: Array) -> Arc<Self> {
        Arc::new(IRNode::Binary { op, lhs, rhs, value })
    }

    /// The primal value computed for this node.
    pub fn value(&self) -> &Array {
        match self {
            IRNode::Input { value, .. }
            | IRNode::Constant { value }
            | IRNode::Unary { value, .. }
            | IRNode::Binary { value, .. } => value,
        }
    }

    /// Shape of the node's value.
    pub fn shape(&self) -> &Shape {
        self.value().shape()
    }

    /// Dtype of the node's value.
    pub fn dtype(&self) -> DType {
        self.value().dtype()
    }

    /// Stable key for per-node side tables.
    pub(crate) fn key(node: &Arc<IRNode>) -> usize {
        Arc::as_ptr(node) as usize
    }
}

/// A traced computation graph.
#[derive(Debug, Clone)]
pub struct IRGraph {
    /// Name of the traced function
    pub name: String,
    /// Input nodes, in argument order
    pub inputs: Vec<Arc<IRNode>>,
    /// Every node in recording order, which is a topological order
    pub nodes: Vec<Arc<IRNode>>,
    /// Output nodes
    pub outputs: Vec<Arc<IRNode>>,
}

impl IRGraph {
    /// Create a new IR graph.
    pub fn new(
        name: String,
        inputs: Vec<Arc<IRNode>>,
        nodes: Vec<Arc<IRNode>>,
        outputs: Vec<Arc<IRNode>>,
    ) -> Self {
        Self { name, inputs, nodes, outputs }
    }

    /// Number of recorded operations (inputs and constants excluded).
    pub fn num_ops(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node.as_ref(), IRNode::Unary { .. } | IRNode::Binary { .. }))
            .count()
    }
}

impl fmt::Display for IRGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IRGraph '{}':", self.name)?;
        writeln!(f, "  inputs: {}", self.inputs.len())?;
        for node in &self.nodes {
            match node.as_ref() {
                IRNode::Unary { op, value, .. } | IRNode::Binary { op, value, .. } => {
                    writeln!(f, "  {} -> {}", op, value)?;
                }
                _ => {}
            }
        }
        write!(f, "  outputs: {}", self.outputs.len())
    }
}
