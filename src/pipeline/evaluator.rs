//! Node evaluator abstraction.
//!
//! Two-layer design:
//! - **`NodeEvaluator` trait**: for nodes supplied by the embedding pipeline.
//! - **`BuiltinEvaluator` enum**: the stock nodes, dispatched by `match`.
//!
//! `AnyEvaluator` wraps either so the resolver handles both uniformly.

use crate::error::Result;
use crate::pipeline::id::NodeId;
use crate::pipeline::inference::InferenceData;
use crate::pipeline::nodes::{FdEvaluator, MdpEvaluator, P2aEvaluator, YuvEvaluator};

/// Declares what a node can consume and produce for a request.
///
/// Implementations inspect the inference state (`has_type`, `get_size`,
/// `has_feature`) and register zero or more I/O sets through
/// [`InferenceData::add_node_io`]. They must not depend on anything else.
pub trait NodeEvaluator: Send + Sync {
    fn node_id(&self) -> NodeId;

    fn name(&self) -> &str;

    fn evaluate(&self, data: &mut InferenceData) -> Result<()>;
}

/// Enum dispatch for the built-in evaluators.
pub enum BuiltinEvaluator {
    P2a(P2aEvaluator),
    Fd(FdEvaluator),
    Yuv(YuvEvaluator),
    Mdp(MdpEvaluator),
}

impl BuiltinEvaluator {
    pub fn node_id(&self) -> NodeId {
        match self {
            BuiltinEvaluator::P2a(n) => n.node_id(),
            BuiltinEvaluator::Fd(n) => n.node_id(),
            BuiltinEvaluator::Yuv(n) => n.node_id(),
            BuiltinEvaluator::Mdp(n) => n.node_id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            BuiltinEvaluator::P2a(n) => n.name(),
            BuiltinEvaluator::Fd(n) => n.name(),
            BuiltinEvaluator::Yuv(n) => n.name(),
            BuiltinEvaluator::Mdp(n) => n.name(),
        }
    }

    pub fn evaluate(&self, data: &mut InferenceData) -> Result<()> {
        match self {
            BuiltinEvaluator::P2a(n) => n.evaluate(data),
            BuiltinEvaluator::Fd(n) => n.evaluate(data),
            BuiltinEvaluator::Yuv(n) => n.evaluate(data),
            BuiltinEvaluator::Mdp(n) => n.evaluate(data),
        }
    }
}

/// Unified wrapper: either a built-in (enum dispatch) or a plugin (dyn dispatch).
pub enum AnyEvaluator {
    Builtin(BuiltinEvaluator),
    Plugin(Box<dyn NodeEvaluator>),
}

impl AnyEvaluator {
    pub fn node_id(&self) -> NodeId {
        match self {
            AnyEvaluator::Builtin(n) => n.node_id(),
            AnyEvaluator::Plugin(n) => n.node_id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AnyEvaluator::Builtin(n) => n.name(),
            AnyEvaluator::Plugin(n) => n.name(),
        }
    }

    pub fn evaluate(&self, data: &mut InferenceData) -> Result<()> {
        match self {
            AnyEvaluator::Builtin(n) => n.evaluate(data),
            AnyEvaluator::Plugin(n) => n.evaluate(data),
        }
    }
}

impl From<BuiltinEvaluator> for AnyEvaluator {
    fn from(evaluator: BuiltinEvaluator) -> Self {
        AnyEvaluator::Builtin(evaluator)
    }
}

impl From<Box<dyn NodeEvaluator>> for AnyEvaluator {
    fn from(evaluator: Box<dyn NodeEvaluator>) -> Self {
        AnyEvaluator::Plugin(evaluator)
    }
}
