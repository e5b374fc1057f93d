//! MdpEvaluator: crops, thumbnail and jpeg from the final full yuv.

use crate::error::Result;
use crate::pipeline::evaluator::NodeEvaluator;
use crate::pipeline::id::{MetadataId, NodeId, SizeId, TypeId};
use crate::pipeline::inference::{DstData, InferenceData, SrcData};
use crate::types::{ImageFormat, Size};

static MDP_METADATA: &[MetadataId] = &[
    MetadataId::MAIN_IN_P1_DYNAMIC,
    MetadataId::MAIN_IN_APP,
    MetadataId::MAIN_IN_HAL,
];

const THUMBNAIL_SIZE: Size = Size::new(320, 240);

pub struct MdpEvaluator;

impl NodeEvaluator for MdpEvaluator {
    fn node_id(&self) -> NodeId {
        NodeId::MDP
    }

    fn name(&self) -> &str {
        "MDP"
    }

    fn evaluate(&self, data: &mut InferenceData) -> Result<()> {
        if !data.has_type(TypeId::MAIN_FULL_YUV) {
            return Ok(());
        }
        let full = data.get_size(TypeId::MAIN_FULL_YUV);
        let dsts = [
            DstData::new(TypeId::MAIN_CROP1_YUV, full, ImageFormat::Yv12).sized(SizeId::Specific),
            DstData::new(TypeId::MAIN_CROP2_YUV, full, ImageFormat::Yv12).sized(SizeId::Specific),
            DstData::new(TypeId::THUMBNAIL, THUMBNAIL_SIZE, ImageFormat::Yv12).sized(SizeId::Specific),
            DstData::new(TypeId::JPEG, full, ImageFormat::Jpeg),
        ];
        data.add_node_io(
            NodeId::MDP,
            &[SrcData::new(TypeId::MAIN_FULL_YUV)],
            &dsts,
            MDP_METADATA,
            &[],
            false,
        )
    }
}
