//! A node's view of a capture request.
//!
//! Only the buffers and metadata bound to the node during resolution are
//! reachable; anything else answers `None`/`false`.

use crate::error::{ResolverError, Result};
use crate::pipeline::handle::{BufferHandle, MetadataHandle};
use crate::pipeline::id::{BufferId, MetadataId, NodeId, TypeId};
use crate::pipeline::plan::NodeIo;
use crate::pipeline::request::CaptureRequest;
use crate::types::{Direction, ImageFormat, ImageTransform, Size};
use std::sync::Arc;

/// Borrowed per-node view of a [`CaptureRequest`].
#[derive(Clone, Copy)]
pub struct NodeRequest<'a> {
    request: &'a CaptureRequest,
    node: NodeId,
    io: &'a NodeIo,
}

impl<'a> NodeRequest<'a> {
    pub(crate) fn new(request: &'a CaptureRequest, node: NodeId, io: &'a NodeIo) -> Self {
        Self { request, node, io }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn request(&self) -> &'a CaptureRequest {
        self.request
    }

    pub fn io(&self) -> &'a NodeIo {
        self.io
    }

    /// Buffer bound to this node for `type_id` in `direction`.
    pub fn map_buffer_id(&self, type_id: TypeId, direction: Direction) -> Option<BufferId> {
        self.io.buffer(type_id, direction)
    }

    /// Handle for a bound buffer, acquired on first access.
    pub fn acquire_buffer(&self, id: BufferId) -> Option<Arc<dyn BufferHandle>> {
        if !self.io.binds_buffer(id) {
            tracing::warn!("{} asked for unbound buffer {}", self.node, id);
            return None;
        }
        self.request.get_buffer(id)
    }

    /// Drop this node's reference on `id`.
    pub fn release_buffer(&self, id: BufferId) -> Result<u32> {
        if !self.io.binds_buffer(id) {
            return Err(ResolverError::NotBound {
                node: self.node,
                what: id.to_string(),
            });
        }
        self.request.dec_buffer_ref(self.node, id)
    }

    pub fn has_metadata(&self, id: MetadataId) -> bool {
        self.io.binds_metadata(id) && self.request.has_metadata(id)
    }

    pub fn acquire_metadata(&self, id: MetadataId) -> Option<Arc<dyn MetadataHandle>> {
        if !self.io.binds_metadata(id) {
            tracing::warn!("{} asked for unbound metadata {}", self.node, id);
            return None;
        }
        self.request.get_metadata(id)
    }

    pub fn release_metadata(&self, id: MetadataId) -> Result<u32> {
        if !self.io.binds_metadata(id) {
            return Err(ResolverError::NotBound {
                node: self.node,
                what: id.to_string(),
            });
        }
        self.request.dec_metadata_ref(self.node, id)
    }

    pub fn image_size(&self, id: BufferId) -> Option<Size> {
        self.io
            .binds_buffer(id)
            .then(|| self.request.image_size(id))
            .flatten()
    }

    pub fn image_format(&self, id: BufferId) -> Option<ImageFormat> {
        self.io
            .binds_buffer(id)
            .then(|| self.request.image_format(id))
            .flatten()
    }

    pub fn image_transform(&self, id: BufferId) -> ImageTransform {
        if self.io.binds_buffer(id) {
            self.request.image_transform(id)
        } else {
            ImageTransform::NONE
        }
    }

    /// True once all producers feeding this node are done.
    pub fn is_satisfied(&self) -> bool {
        self.request.is_satisfied(self.node)
    }

    /// Drop everything this node still holds. Call once the node is done.
    pub fn release_all(&self) -> u32 {
        self.request.dec_node_reference(self.node)
    }
}

impl std::fmt::Debug for NodeRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRequest")
            .field("node", &self.node)
            .field("io", self.io)
            .finish()
    }
}
