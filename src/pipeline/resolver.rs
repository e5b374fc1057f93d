//! Feature inference front door.
//!
//! Owns the path table and the evaluator registry, and runs the full
//! seed → propose → bind → determine sequence for one request.

use crate::config::ResolverConfig;
use crate::error::{Result, ResultExt};
use crate::pipeline::evaluator::{AnyEvaluator, BuiltinEvaluator};
use crate::pipeline::handle::{BufferAllocator, HeapAllocator};
use crate::pipeline::id::NodeId;
use crate::pipeline::inference::InferenceData;
use crate::pipeline::nodes::{FdEvaluator, MdpEvaluator, P2aEvaluator, YuvEvaluator};
use crate::pipeline::path_table::PathTable;
use crate::pipeline::plan::ResolvedPlan;
use crate::pipeline::request::CaptureRequest;
use crate::types::Direction;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct FeatureInference {
    path_table: Arc<PathTable>,
    allocator: Arc<dyn BufferAllocator>,
    arena_capacity: usize,
    /// Keyed by node so evaluation runs in ascending node order.
    evaluators: BTreeMap<NodeId, AnyEvaluator>,
}

impl FeatureInference {
    pub fn new(path_table: Arc<PathTable>, arena_capacity: usize) -> Self {
        Self {
            path_table,
            allocator: Arc::new(HeapAllocator::new()),
            arena_capacity,
            evaluators: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        let table = config
            .path_table()
            .context("Failed to build path table")?;
        Ok(Self::new(Arc::new(table), config.arena_capacity))
    }

    /// Register the stock P2A, FD, YUV and MDP evaluators.
    pub fn with_builtin_nodes(mut self) -> Self {
        self.register(BuiltinEvaluator::P2a(P2aEvaluator::new()));
        self.register(BuiltinEvaluator::Fd(FdEvaluator));
        self.register(BuiltinEvaluator::Yuv(YuvEvaluator::stock()));
        self.register(BuiltinEvaluator::Mdp(MdpEvaluator));
        self
    }

    pub fn with_allocator(mut self, allocator: Arc<dyn BufferAllocator>) -> Self {
        self.allocator = allocator;
        self
    }

    /// Add an evaluator, replacing any previous one for the same node.
    pub fn register(&mut self, evaluator: impl Into<AnyEvaluator>) {
        let evaluator = evaluator.into();
        let node = evaluator.node_id();
        if node.is_root() {
            tracing::warn!("Ignoring evaluator {} registered on root", evaluator.name());
            return;
        }
        if !node.is_valid() {
            tracing::warn!("Ignoring evaluator {} on out-of-range {}", evaluator.name(), node);
            return;
        }
        if let Some(old) = self.evaluators.insert(node, evaluator) {
            tracing::debug!("Evaluator for {} replaced ({})", node, old.name());
        }
    }

    pub fn path_table(&self) -> &Arc<PathTable> {
        &self.path_table
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.evaluators.keys().copied()
    }

    /// Empty request sharing this resolver's path table and allocator.
    pub fn new_request(&self) -> CaptureRequest {
        CaptureRequest::new(self.path_table.clone()).with_allocator(self.allocator.clone())
    }

    /// Resolve `request`: client inputs seed the arena, evaluators run in
    /// node order, client outputs become targets, and the plan is written
    /// back into the request.
    pub fn evaluate(&self, request: &mut CaptureRequest) -> Result<ResolvedPlan> {
        let mut data = InferenceData::for_request(request, self.arena_capacity);
        let client = request.client_buffers();

        for buffer in client.iter().filter(|b| b.role.direction == Direction::Input) {
            data.add_source(buffer.role.type_id, buffer.id, buffer.format, buffer.size)
                .with_context(|| format!("Failed to seed {}", buffer.id))?;
        }

        for (node, evaluator) in &self.evaluators {
            evaluator
                .evaluate(&mut data)
                .with_context(|| format!("Failed to evaluate {} ({})", evaluator.name(), node))?;
        }

        for buffer in client.iter().filter(|b| b.role.direction == Direction::Output) {
            data.add_target(buffer.role.type_id, buffer.id);
        }

        data.dump();
        let plan = data.determine(request);
        request.dump();

        tracing::info!(
            "Request {} resolved: {} nodes, {} paths, {} pipe buffers in {}us",
            request.request_no(),
            plan.stats.used_nodes,
            plan.stats.used_paths,
            plan.pipe_buffers.len(),
            plan.stats.resolve_time_us
        );
        Ok(plan)
    }
}

impl std::fmt::Debug for FeatureInference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureInference")
            .field("paths", &self.path_table.len())
            .field("arena_capacity", &self.arena_capacity)
            .field("nodes", &self.evaluators.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolverError;
    use crate::pipeline::evaluator::NodeEvaluator;
    use crate::pipeline::handle::HeapBuffer;
    use crate::pipeline::id::{BufferId, FeatureId, TypeId};
    use crate::types::{ImageFormat, Size};

    struct Failing;

    impl NodeEvaluator for Failing {
        fn node_id(&self) -> NodeId {
            NodeId::BOKEH
        }

        fn name(&self) -> &str {
            "failing"
        }

        fn evaluate(&self, _data: &mut InferenceData) -> Result<()> {
            Err(ResolverError::evaluator(NodeId::BOKEH, "unsupported"))
        }
    }

    fn resolver() -> FeatureInference {
        FeatureInference::new(Arc::new(PathTable::stock()), 32).with_builtin_nodes()
    }

    #[test]
    fn test_builtin_registration_order() {
        let nodes: Vec<NodeId> = resolver().nodes().collect();
        assert_eq!(nodes, vec![NodeId::P2A, NodeId::FD, NodeId::YUV, NodeId::MDP]);
    }

    #[test]
    fn test_jpeg_from_raw() {
        let inference = resolver();
        let mut request = inference.new_request();
        let size = Size::new(400, 300);
        request.add_buffer(BufferId::MAIN_IN_FULL_RAW, Arc::new(HeapBuffer::new(size, ImageFormat::Bayer10)));
        request.add_buffer(BufferId::MAIN_OUT_JPEG, Arc::new(HeapBuffer::new(size, ImageFormat::Jpeg)));

        let plan = inference.evaluate(&mut request).unwrap();
        let used: Vec<NodeId> = plan.used_nodes.iter().collect();
        assert_eq!(used, vec![NodeId::ROOT, NodeId::P2A, NodeId::MDP]);

        let full = plan.node_io[&NodeId::MDP].inputs[&TypeId::MAIN_FULL_YUV];
        assert!(full.is_pipe());
        assert_eq!(plan.node_io[&NodeId::MDP].outputs[&TypeId::JPEG], BufferId::MAIN_OUT_JPEG);
        // FD has no consumer without a feature asking for it, so P2A only
        // exposes the full yuv
        assert_eq!(plan.node_io[&NodeId::P2A].outputs.len(), 1);
        assert!(!plan.is_path_used(
            inference.path_table().find_path(NodeId::P2A, NodeId::FD).unwrap()
        ));
    }

    #[test]
    fn test_nr_pulls_in_yuv_and_fd() {
        let inference = resolver();
        let mut request = inference.new_request();
        let size = Size::new(400, 300);
        request.add_feature(FeatureId::NR);
        request.add_buffer(BufferId::MAIN_IN_FULL_RAW, Arc::new(HeapBuffer::new(size, ImageFormat::Bayer10)));
        request.add_buffer(BufferId::MAIN_OUT_JPEG, Arc::new(HeapBuffer::new(size, ImageFormat::Jpeg)));

        let plan = inference.evaluate(&mut request).unwrap();
        for node in [NodeId::P2A, NodeId::FD, NodeId::YUV, NodeId::MDP] {
            assert!(plan.is_node_used(node), "{} unused", node);
        }
        // YUV writes in place: its output aliases P2A's full yuv
        let yuv = &plan.node_io[&NodeId::YUV];
        assert_eq!(
            yuv.inputs[&TypeId::MAIN_FULL_YUV],
            yuv.outputs[&TypeId::MAIN_FULL_YUV]
        );
        assert_eq!(
            plan.node_io[&NodeId::MDP].inputs[&TypeId::MAIN_FULL_YUV],
            yuv.outputs[&TypeId::MAIN_FULL_YUV]
        );
    }

    #[test]
    fn test_evaluator_error_carries_context() {
        let mut inference = resolver();
        inference.register(Box::new(Failing) as Box<dyn NodeEvaluator>);
        let mut request = inference.new_request();
        let err = inference.evaluate(&mut request).unwrap_err();
        assert!(err.to_string().contains("failing"));
        assert!(err.to_string().contains("unsupported"));
    }

    #[test]
    fn test_root_registration_ignored() {
        struct OnRoot;
        impl NodeEvaluator for OnRoot {
            fn node_id(&self) -> NodeId {
                NodeId::ROOT
            }
            fn name(&self) -> &str {
                "root"
            }
            fn evaluate(&self, _data: &mut InferenceData) -> Result<()> {
                Ok(())
            }
        }

        let mut inference = resolver();
        inference.register(Box::new(OnRoot) as Box<dyn NodeEvaluator>);
        assert_eq!(inference.nodes().count(), 4);
    }

    #[test]
    fn test_out_of_range_registration_ignored() {
        struct Detached;
        impl NodeEvaluator for Detached {
            fn node_id(&self) -> NodeId {
                NodeId(64)
            }
            fn name(&self) -> &str {
                "detached"
            }
            fn evaluate(&self, data: &mut InferenceData) -> Result<()> {
                data.add_node_io(NodeId(64), &[], &[], &[], &[], true)
            }
        }

        let mut inference = resolver();
        inference.register(Box::new(Detached) as Box<dyn NodeEvaluator>);
        assert_eq!(inference.nodes().count(), 4);
        assert!(inference.evaluate(&mut inference.new_request()).is_ok());
    }

    #[test]
    fn test_from_config() {
        let inference = FeatureInference::from_config(&ResolverConfig::default()).unwrap();
        assert_eq!(inference.path_table().len(), PathTable::stock().len());
    }
}
