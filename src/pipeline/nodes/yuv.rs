//! YuvEvaluator: in-place full yuv pass for optional features.
//!
//! The same evaluator backs `yuv` and `yuv2` (and their repeating variants),
//! each with its own set of supported features.

use crate::error::Result;
use crate::pipeline::evaluator::NodeEvaluator;
use crate::pipeline::id::{FeatureId, NodeId, TypeId};
use crate::pipeline::id_set::FeatureSet;
use crate::pipeline::inference::{DstData, InferenceData, SrcData};
use crate::pipeline::nodes::MAIN_METADATA;

pub struct YuvEvaluator {
    node: NodeId,
    name: String,
    supported: FeatureSet,
}

impl YuvEvaluator {
    pub fn new(node: NodeId, supported: &[FeatureId]) -> Self {
        Self {
            node,
            name: node.to_string().to_uppercase(),
            supported: supported.iter().copied().collect(),
        }
    }

    /// The stock `yuv` node: noise reduction and HDR.
    pub fn stock() -> Self {
        Self::new(NodeId::YUV, &[FeatureId::NR, FeatureId::HDR])
    }

    pub fn supported(&self) -> FeatureSet {
        self.supported
    }
}

impl NodeEvaluator for YuvEvaluator {
    fn node_id(&self) -> NodeId {
        self.node
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, data: &mut InferenceData) -> Result<()> {
        let requested = data.features();
        let active: Vec<FeatureId> = self
            .supported
            .iter()
            .filter(|f| requested.contains(*f))
            .collect();
        if active.is_empty() || !data.has_type(TypeId::MAIN_FULL_YUV) {
            return Ok(());
        }

        let size = data.get_size(TypeId::MAIN_FULL_YUV);
        let format = data.get_format(TypeId::MAIN_FULL_YUV).unwrap_or_default();
        let mut srcs = vec![SrcData::new(TypeId::MAIN_FULL_YUV)];
        if data.has_type(TypeId::MAIN_FD) {
            srcs.push(SrcData::new(TypeId::MAIN_FD));
        }
        let dst = DstData::new(TypeId::MAIN_FULL_YUV, size, format).in_place_of(TypeId::MAIN_FULL_YUV);

        data.add_node_io(self.node, &srcs, &[dst], MAIN_METADATA, &active, false)
    }
}
