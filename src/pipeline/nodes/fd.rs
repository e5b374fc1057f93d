//! FdEvaluator: face detection on the resized main yuv.

use crate::error::Result;
use crate::pipeline::evaluator::NodeEvaluator;
use crate::pipeline::id::{MetadataId, NodeId, SizeId, TypeId};
use crate::pipeline::inference::{DstData, InferenceData, SrcData};
use crate::types::{ImageFormat, Size};

/// Face result block: up to 15 faces of 16 bytes each.
const FD_RESULT_SIZE: Size = Size::new(15 * 16, 1);

pub struct FdEvaluator;

impl NodeEvaluator for FdEvaluator {
    fn node_id(&self) -> NodeId {
        NodeId::FD
    }

    fn name(&self) -> &str {
        "FD"
    }

    fn evaluate(&self, data: &mut InferenceData) -> Result<()> {
        if !data.has_type(TypeId::MAIN_RSZ_YUV) {
            return Ok(());
        }
        data.add_node_io(
            NodeId::FD,
            &[SrcData::new(TypeId::MAIN_RSZ_YUV).sized(SizeId::Resized)],
            &[DstData::new(TypeId::MAIN_FD, FD_RESULT_SIZE, ImageFormat::Y8).sized(SizeId::Arbitrary)],
            &[MetadataId::MAIN_IN_APP],
            &[],
            false,
        )
    }
}
