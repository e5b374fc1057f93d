//! Test data builders for requests and evaluators

use capture_resolver::pipeline::{
    BufferId, CaptureRequest, DstData, FeatureId, FeatureInference, HeapBuffer, InferenceData,
    MetadataBlock, MetadataId, NodeEvaluator, NodeId, SrcData,
};
use capture_resolver::types::{ImageFormat, Size};
use capture_resolver::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A request plus the heap buffers and metadata it was built with
pub struct BuiltRequest {
    pub request: CaptureRequest,
    pub buffers: BTreeMap<BufferId, Arc<HeapBuffer>>,
    pub metadata: BTreeMap<MetadataId, Arc<MetadataBlock>>,
}

/// Builder for capture requests backed by heap buffers
pub struct RequestBuilder {
    buffers: Vec<(BufferId, Size, ImageFormat)>,
    metadata: Vec<MetadataId>,
    features: Vec<FeatureId>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            buffers: Vec::new(),
            metadata: Vec::new(),
            features: Vec::new(),
        }
    }

    /// Main raw capture: full raw, lcs and every main metadata block
    pub fn raw_capture(size: Size) -> Self {
        Self::new()
            .buffer(BufferId::MAIN_IN_FULL_RAW, size, ImageFormat::Bayer10)
            .buffer(BufferId::MAIN_IN_LCS, Size::new(64, 48), ImageFormat::Stat)
            .metadata(MetadataId::MAIN_IN_P1_DYNAMIC)
            .metadata(MetadataId::MAIN_IN_APP)
            .metadata(MetadataId::MAIN_IN_HAL)
            .metadata(MetadataId::MAIN_OUT_APP)
            .metadata(MetadataId::MAIN_OUT_HAL)
    }

    pub fn buffer(mut self, id: BufferId, size: Size, format: ImageFormat) -> Self {
        self.buffers.push((id, size, format));
        self
    }

    pub fn metadata(mut self, id: MetadataId) -> Self {
        self.metadata.push(id);
        self
    }

    pub fn feature(mut self, feature: FeatureId) -> Self {
        self.features.push(feature);
        self
    }

    pub fn build(self, inference: &FeatureInference) -> BuiltRequest {
        let mut request = inference.new_request();
        let mut buffers = BTreeMap::new();
        let mut metadata = BTreeMap::new();

        for (id, size, format) in self.buffers {
            let handle = Arc::new(HeapBuffer::new(size, format));
            request.add_buffer(id, handle.clone());
            buffers.insert(id, handle);
        }
        for id in self.metadata {
            let handle = Arc::new(MetadataBlock::new());
            request.add_metadata(id, handle.clone());
            metadata.insert(id, handle);
        }
        for feature in self.features {
            request.add_feature(feature);
        }

        BuiltRequest {
            request,
            buffers,
            metadata,
        }
    }
}

/// Evaluator that always declares the same I/O
pub struct DeclaredNode {
    node: NodeId,
    srcs: Vec<SrcData>,
    dsts: Vec<DstData>,
    features: Vec<FeatureId>,
    forced: bool,
}

impl DeclaredNode {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            srcs: Vec::new(),
            dsts: Vec::new(),
            features: Vec::new(),
            forced: false,
        }
    }

    pub fn src(mut self, src: SrcData) -> Self {
        self.srcs.push(src);
        self
    }

    pub fn dst(mut self, dst: DstData) -> Self {
        self.dsts.push(dst);
        self
    }

    pub fn feature(mut self, feature: FeatureId) -> Self {
        self.features.push(feature);
        self
    }

    pub fn forced(mut self) -> Self {
        self.forced = true;
        self
    }

    pub fn boxed(self) -> Box<dyn NodeEvaluator> {
        Box::new(self)
    }
}

impl NodeEvaluator for DeclaredNode {
    fn node_id(&self) -> NodeId {
        self.node
    }

    fn name(&self) -> &str {
        "declared"
    }

    fn evaluate(&self, data: &mut InferenceData) -> Result<()> {
        data.add_node_io(self.node, &self.srcs, &self.dsts, &[], &self.features, self.forced)
    }
}
