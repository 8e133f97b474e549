//! Tracing infrastructure for capturing operations.
//!
//! This module provides the `TraceContext` that records operations
//! during execution to build an intermediate representation.

use crate::trace::{IRGraph, IRNode, Primitive};
use crate::Array;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

thread_local! {
    /// Active tracing context of this thread.
    static TRACE_CONTEXT: RefCell<Option<Rc<RefCell<TraceContext>>>> = const { RefCell::new(None) };
}

/// Context for tracing operations.
///
/// Captures operations as they execute and builds an IR graph.
#[derive(Debug, Clone)]
pub struct TraceContext {
    /// Mapping from Array IDs to their IR nodes
    nodes: HashMap<usize, Arc<IRNode>>,
    /// Every node in recording order
    order: Vec<Arc<IRNode>>,
    /// Input nodes for this trace
    inputs: Vec<Arc<IRNode>>,
    /// Name of the function being traced
    name: String,
}

impl TraceContext {
    /// Create a new trace context.
    pub fn new(name: impl Into<String>) -> Self {
        Self { nodes: HashMap::new(), order: Vec::new(), inputs: Vec::new(), name: name.into() }
    }

    /// Name of the function being traced.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of registered inputs.
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Register an input array.
    pub fn register_input(&mut self, array: &Array) -> Arc<IRNode> {
        let node = IRNode::input(self.inputs.len(), array.clone());
        self.insert(array.id(), node.clone());
        self.inputs.push(node.clone());
        node
    }

    /// Node for `array`, registering it as a constant if it was not
    /// produced inside the trace.
    fn node_for(&mut self, array: &Array) -> Arc<IRNode> {
        if let Some(node) = self.nodes.get(&array.id()) {
            return node.clone();
        }
        let node = IRNode::constant(array.clone());
        self.insert(array.id(), node.clone());
        node
    }

    fn insert(&mut self, array_id: usize, node: Arc<IRNode>) {
        self.nodes.insert(array_id, node.clone());
        self.order.push(node);
    }

    /// Register a unary operation.
    pub fn register_unary(&mut self, op: Primitive, input: &Array, result: &Array) -> Arc<IRNode> {
        let input_node = self.node_for(input);
        let node = IRNode::unary(op, input_node, result.clone());
        self.insert(result.id(), node.clone());
        node
    }

    /// Register a binary operation.
    pub fn register_binary(
        &mut self,
        op: Primitive,
        lhs: &Array,
        rhs: &Array,
        result: &Array,
    ) -> Arc<IRNode> {
        let lhs_node = self.node_for(lhs);
        let rhs_node = self.node_for(rhs);
        let node = IRNode::binary(op, lhs_node, rhs_node, result.clone());
        self.insert(result.id(), node.clone());
        node
    }

    /// Get the IR node for an array.
    pub fn get_node(&self, array_id: usize) -> Option<Arc<IRNode>> {
        self.nodes.get(&array_id).cloned()
    }

    /// Finalize the trace and return the IR graph.
    ///
    /// Outputs that never went through a traced operation become constants.
    pub fn finalize(mut self, outputs: &[Array]) -> IRGraph {
        let output_nodes: Vec<Arc<IRNode>> = outputs.iter().map(|arr| self.node_for(arr)).collect();
        IRGraph::new(self.name, self.inputs, self.order, output_nodes)
    }
}

/// Restores the previously active trace context when dropped.
///
/// Dropping happens on unwinding too, so a panicking traced function does
/// not leave its context installed.
#[must_use = "the previous trace context is restored when the guard drops"]
pub struct TraceGuard {
    previous: Option<Rc<RefCell<TraceContext>>>,
}

impl TraceGuard {
    fn install(ctx: Option<Rc<RefCell<TraceContext>>>) -> Self {
        let previous = TRACE_CONTEXT.with(|slot| slot.replace(ctx));
        Self { previous }
    }
}

impl Drop for TraceGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        TRACE_CONTEXT.with(|slot| {
            *slot.borrow_mut() = previous;
        });
    }
}

/// Enter tracing mode with the given context until the guard drops.
pub fn enter_trace(ctx: Rc<RefCell<TraceContext>>) -> TraceGuard {
    TraceGuard::install(Some(ctx))
}

/// Turn tracing off until the guard drops.
///
/// Tangent propagation runs under this guard so that its own array
/// operations are not recorded into an enclosing trace.
pub fn suspend_trace() -> TraceGuard {
    TraceGuard::install(None)
}

/// Check if we're currently tracing.
pub fn is_tracing() -> bool {
    TRACE_CONTEXT.with(|slot| slot.borrow().is_some())
}

/// Execute `f` with `ctx` as the active trace and hand the context back.
pub fn with_trace<F, R>(ctx: TraceContext, f: F) -> (R, TraceContext)
where
    F: FnOnce() -> R,
{
    let ctx = Rc::new(RefCell::new(ctx));
    let result = {
        let _guard = enter_trace(ctx.clone());
        f()
    };

    let ctx = Rc::try_unwrap(ctx)
        .map(RefCell::into_inner)
        .unwrap_or_else(|shared| shared.borrow().clone());
    (result, ctx)
}

/// Register a unary operation if tracing is active.
pub fn trace_unary(op: Primitive, input: &Array, result: &Array) {
    TRACE_CONTEXT.with(|slot| {
        if let Some(ctx) = slot.borrow().as_ref() {
            ctx.borrow_mut().register_unary(op, input, result);
        }
    });
}

/// Register a binary operation if tracing is active.
pub fn trace_binary(op: Primitive, lhs: &Array, rhs: &Array, result: &Array) {
    TRACE_CONTEXT.with(|slot| {
        if let Some(ctx) = slot.borrow().as_ref() {
            ctx.borrow_mut().register_binary(op, lhs, rhs, result);
        }
    });
}
