//! P2aEvaluator: raw to yuv conversion for the main and sub sensors.
//!
//! With a client yuv source the node reprocesses it instead of converting
//! raw. Resized yuv comes from the resized raw when the client supplies one,
//! otherwise it is scaled down from the full-size source.

use crate::error::Result;
use crate::pipeline::evaluator::NodeEvaluator;
use crate::pipeline::id::{MetadataId, NodeId, SizeId, TypeId};
use crate::pipeline::inference::{DstData, InferenceData, SrcData};
use crate::pipeline::nodes::MAIN_METADATA;
use crate::types::{ImageFormat, Size};

static SUB_METADATA: &[MetadataId] = &[MetadataId::SUB_IN_P1_DYNAMIC, MetadataId::SUB_IN_HAL];

/// Downscale factor for resized yuv derived from a full-size source.
const RESIZE_DIVISOR: u32 = 4;

pub struct P2aEvaluator {
    /// Emit packed 4:2:2 instead of planar 4:2:0 for the full yuv.
    yuv422: bool,
}

impl P2aEvaluator {
    pub fn new() -> Self {
        Self { yuv422: false }
    }

    pub fn with_yuv422(mut self, enabled: bool) -> Self {
        self.yuv422 = enabled;
        self
    }

    fn full_format(&self) -> ImageFormat {
        if self.yuv422 {
            ImageFormat::Yuy2
        } else {
            ImageFormat::Yv12
        }
    }

    fn evaluate_main(&self, data: &mut InferenceData) -> Result<()> {
        let mut srcs = Vec::with_capacity(3);
        let mut dsts = Vec::with_capacity(2);

        let full_src = if data.has_type(TypeId::MAIN_FULL_YUV) {
            Some(TypeId::MAIN_FULL_YUV)
        } else if data.has_type(TypeId::MAIN_FULL_RAW) {
            Some(TypeId::MAIN_FULL_RAW)
        } else {
            None
        };

        if let Some(src) = full_src {
            let size = data.get_size(src);
            srcs.push(SrcData::new(src));
            if src == TypeId::MAIN_FULL_RAW && data.has_type(TypeId::MAIN_LCS) {
                srcs.push(SrcData::new(TypeId::MAIN_LCS));
            }
            dsts.push(DstData::new(TypeId::MAIN_FULL_YUV, size, self.full_format()));
        }

        if data.has_type(TypeId::MAIN_RSZ_RAW) {
            let size = data.get_size(TypeId::MAIN_RSZ_RAW);
            srcs.push(SrcData::new(TypeId::MAIN_RSZ_RAW).sized(SizeId::Resized));
            dsts.push(DstData::new(TypeId::MAIN_RSZ_YUV, size, ImageFormat::Yuy2).sized(SizeId::Resized));
        } else if let Some(src) = full_src {
            let full = data.get_size(src);
            let size = Size::new(full.width / RESIZE_DIVISOR, full.height / RESIZE_DIVISOR);
            dsts.push(DstData::new(TypeId::MAIN_RSZ_YUV, size, ImageFormat::Yuy2).sized(SizeId::Resized));
        }

        if dsts.is_empty() {
            return Ok(());
        }
        data.add_node_io(NodeId::P2A, &srcs, &dsts, MAIN_METADATA, &[], false)
    }

    fn evaluate_sub(&self, data: &mut InferenceData) -> Result<()> {
        if !data.has_type(TypeId::SUB_FULL_RAW) {
            return Ok(());
        }
        let size = data.get_size(TypeId::SUB_FULL_RAW);
        let mut srcs = vec![SrcData::new(TypeId::SUB_FULL_RAW)];
        let mut dsts = vec![DstData::new(TypeId::SUB_FULL_YUV, size, self.full_format())];
        if data.has_type(TypeId::SUB_LCS) {
            srcs.push(SrcData::new(TypeId::SUB_LCS));
        }
        if data.has_type(TypeId::SUB_RSZ_RAW) {
            let rsz = data.get_size(TypeId::SUB_RSZ_RAW);
            srcs.push(SrcData::new(TypeId::SUB_RSZ_RAW).sized(SizeId::Resized));
            dsts.push(DstData::new(TypeId::SUB_RSZ_YUV, rsz, ImageFormat::Yuy2).sized(SizeId::Resized));
        }
        data.add_node_io(NodeId::P2A, &srcs, &dsts, SUB_METADATA, &[], false)
    }
}

impl Default for P2aEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeEvaluator for P2aEvaluator {
    fn node_id(&self) -> NodeId {
        NodeId::P2A
    }

    fn name(&self) -> &str {
        "P2A"
    }

    fn evaluate(&self, data: &mut InferenceData) -> Result<()> {
        self.evaluate_main(data)?;
        self.evaluate_sub(data)
    }
}
