//! Per-capture request state: buffer/metadata handles with their reference
//! counts, the resolved node adjacency and the traversal bookkeeping.
//!
//! # Lifecycle
//!
//! 1. The client registers its buffers and metadata (`add_buffer`,
//!    `add_metadata`) plus parameters and features.
//! 2. Resolution registers pipe buffers, per-node I/O and used paths. This is
//!    the only phase that needs `&mut self`.
//! 3. The request is shared (`Arc`) with the node threads. Each node works
//!    through its [`NodeRequest`] view; every binding it holds is one
//!    reference, and a handle is released exactly when its last reference
//!    goes away.
//!
//! Buffer counts, metadata counts and the traversal set each sit behind their
//! own mutex. First acquisition of a handle additionally takes a per-entry
//! gate and calls out to the handle, allocator or cross request with the map
//! unlocked. Dropping the request releases every handle still acquired.

use crate::error::{ResolverError, Result};
use crate::pipeline::handle::{lock, BufferAllocator, BufferHandle, MetadataHandle};
use crate::pipeline::id::{BufferId, ClientRole, FeatureId, MetadataId, NodeId, PathId, TypeId};
use crate::pipeline::id_set::{FeatureSet, NodeSet, PathSet};
use crate::pipeline::node_request::NodeRequest;
use crate::pipeline::path_table::PathTable;
use crate::pipeline::plan::NodeIo;
use crate::types::{ImageFormat, ImageTransform, Size};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

/// Per-request integer parameters set by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestParam {
    RequestNum,
    FrameNum,
    FrameCount,
    FrameIndex,
    EnableNextCapture,
}

/// Where a buffer entry comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOrigin {
    /// Supplied by the client; released back to it.
    Client,
    /// Allocated for an intermediate result.
    Pipe,
    /// Owned by the cross request; never released from here.
    Borrowed,
}

struct BufferEntry {
    origin: BufferOrigin,
    type_id: Option<TypeId>,
    size: Size,
    format: ImageFormat,
    handle: Option<Arc<dyn BufferHandle>>,
    acquired: bool,
    /// References per holding node. A node bound twice holds two.
    holders: BTreeMap<NodeId, u32>,
    /// Held while the handle is being acquired.
    gate: Arc<Mutex<()>>,
}

impl BufferEntry {
    fn ref_count(&self) -> u32 {
        self.holders.values().sum()
    }
}

struct MetadataEntry {
    borrowed: bool,
    handle: Option<Arc<dyn MetadataHandle>>,
    acquired: bool,
    holders: BTreeMap<NodeId, u32>,
    gate: Arc<Mutex<()>>,
}

impl MetadataEntry {
    fn ref_count(&self) -> u32 {
        self.holders.values().sum()
    }
}

/// Drop one reference held by `node`. Returns the remaining total, or `None`
/// when `node` holds nothing.
fn drop_reference(holders: &mut BTreeMap<NodeId, u32>, node: NodeId) -> Option<u32> {
    let count = holders.get_mut(&node)?;
    *count -= 1;
    if *count == 0 {
        holders.remove(&node);
    }
    Some(holders.values().sum())
}

/// Client buffer registered as an input source for resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientBuffer {
    pub id: BufferId,
    pub role: ClientRole,
    pub size: Size,
    pub format: ImageFormat,
}

/// All state of one capture request.
pub struct CaptureRequest {
    path_table: Arc<PathTable>,
    allocator: Option<Arc<dyn BufferAllocator>>,
    buffers: Mutex<BTreeMap<BufferId, BufferEntry>>,
    metadata: Mutex<BTreeMap<MetadataId, MetadataEntry>>,
    node_io: BTreeMap<NodeId, NodeIo>,
    /// Endpoints of every added path.
    paths: BTreeMap<PathId, (NodeId, NodeId)>,
    /// Paths not traversed yet.
    pending: Mutex<PathSet>,
    params: BTreeMap<RequestParam, i64>,
    features: FeatureSet,
    cross_request: Option<Weak<CaptureRequest>>,
}

impl CaptureRequest {
    pub fn new(path_table: Arc<PathTable>) -> Self {
        Self {
            path_table,
            allocator: None,
            buffers: Mutex::new(BTreeMap::new()),
            metadata: Mutex::new(BTreeMap::new()),
            node_io: BTreeMap::new(),
            paths: BTreeMap::new(),
            pending: Mutex::new(PathSet::new()),
            params: BTreeMap::new(),
            features: FeatureSet::new(),
            cross_request: None,
        }
    }

    /// Allocator used for pipe buffers on first access.
    pub fn with_allocator(mut self, allocator: Arc<dyn BufferAllocator>) -> Self {
        self.allocator = Some(allocator);
        self
    }

    pub fn path_table(&self) -> &Arc<PathTable> {
        &self.path_table
    }

    // ── Client setup ──

    pub fn add_parameter(&mut self, param: RequestParam, value: i64) {
        self.params.insert(param, value);
    }

    pub fn get_parameter(&self, param: RequestParam) -> Option<i64> {
        self.params.get(&param).copied()
    }

    /// Request number, `-1` when the client did not set one.
    pub fn request_no(&self) -> i64 {
        self.get_parameter(RequestParam::RequestNum).unwrap_or(-1)
    }

    /// Frame number, `-1` when the client did not set one.
    pub fn frame_no(&self) -> i64 {
        self.get_parameter(RequestParam::FrameNum).unwrap_or(-1)
    }

    pub fn add_feature(&mut self, feature: FeatureId) {
        if !feature.is_valid() {
            tracing::warn!("Request {}: ignoring out-of-range {}", self.request_no(), feature);
            return;
        }
        self.features.insert(feature);
    }

    pub fn has_feature(&self, feature: FeatureId) -> bool {
        self.features.contains(feature)
    }

    pub fn features(&self) -> FeatureSet {
        self.features
    }

    /// Register a client-supplied buffer.
    pub fn add_buffer(&mut self, id: BufferId, handle: Arc<dyn BufferHandle>) {
        let entry = BufferEntry {
            origin: BufferOrigin::Client,
            type_id: id.client_role().map(|role| role.type_id),
            size: handle.size(),
            format: handle.format(),
            handle: Some(handle),
            acquired: false,
            holders: BTreeMap::new(),
            gate: Arc::default(),
        };
        tracing::trace!("Request {} add buffer {}", self.request_no(), id);
        if let Some(old) = lock(&self.buffers).insert(id, entry) {
            tracing::warn!(
                "Request {}: buffer {} registered twice ({:?} replaced)",
                self.request_no(),
                id,
                old.origin
            );
        }
    }

    /// Register an internally allocated buffer. The handle is created lazily.
    pub fn add_pipe_buffer(&mut self, id: BufferId, type_id: TypeId, size: Size, format: ImageFormat) {
        debug_assert!(id.is_pipe());
        tracing::trace!(
            "Request {} add pipe buffer {} ({}, {}, {:?})",
            self.request_no(),
            id,
            type_id,
            size,
            format
        );
        lock(&self.buffers).insert(
            id,
            BufferEntry {
                origin: BufferOrigin::Pipe,
                type_id: Some(type_id),
                size,
                format,
                handle: None,
                acquired: false,
                holders: BTreeMap::new(),
                gate: Arc::default(),
            },
        );
    }

    pub fn add_metadata(&mut self, id: MetadataId, handle: Arc<dyn MetadataHandle>) {
        lock(&self.metadata).insert(
            id,
            MetadataEntry {
                borrowed: false,
                handle: Some(handle),
                acquired: false,
                holders: BTreeMap::new(),
                gate: Arc::default(),
            },
        );
    }

    /// Link an earlier request whose buffers and metadata may be borrowed.
    pub fn set_cross_request(&mut self, other: &Arc<CaptureRequest>) {
        self.cross_request = Some(Arc::downgrade(other));
    }

    pub fn cross_request(&self) -> Option<Arc<CaptureRequest>> {
        self.cross_request.as_ref().and_then(Weak::upgrade)
    }

    /// Client buffers with a known role, in id order.
    pub fn client_buffers(&self) -> Vec<ClientBuffer> {
        lock(&self.buffers)
            .iter()
            .filter(|(_, entry)| entry.origin == BufferOrigin::Client)
            .filter_map(|(&id, entry)| {
                let role = id.client_role();
                if role.is_none() {
                    tracing::warn!("Buffer {} has no client role; not used for resolution", id);
                }
                role.map(|role| ClientBuffer {
                    id,
                    role,
                    size: entry.size,
                    format: entry.format,
                })
            })
            .collect()
    }

    // ── Resolution output ──

    /// Bind a node's I/O. Every bound buffer and metadata id gains one
    /// reference held by `node`.
    pub fn add_node_io(&mut self, node: NodeId, io: NodeIo) {
        let request_no = self.request_no();
        if !node.is_valid() {
            tracing::warn!("Request {}: ignoring I/O of out-of-range {}", request_no, node);
            return;
        }
        let cross = self.cross_request();

        {
            let buffers = self.buffers.get_mut().unwrap_or_else(|e| e.into_inner());
            for id in io.buffers() {
                if !buffers.contains_key(&id) {
                    match cross.as_ref().filter(|c| c.has_buffer(id)) {
                        Some(origin) => {
                            buffers.insert(
                                id,
                                BufferEntry {
                                    origin: BufferOrigin::Borrowed,
                                    type_id: None,
                                    size: origin.image_size(id).unwrap_or_default(),
                                    format: origin.image_format(id).unwrap_or_default(),
                                    handle: None,
                                    acquired: false,
                                    holders: BTreeMap::new(),
                                    gate: Arc::default(),
                                },
                            );
                        }
                        None => {
                            tracing::warn!(
                                "Request {}: {} bound to unknown buffer {}",
                                request_no,
                                node,
                                id
                            );
                            continue;
                        }
                    }
                }
                if let Some(entry) = buffers.get_mut(&id) {
                    *entry.holders.entry(node).or_insert(0) += 1;
                }
            }
        }

        {
            let metadata = self.metadata.get_mut().unwrap_or_else(|e| e.into_inner());
            for id in io.metadata.iter() {
                if !metadata.contains_key(&id) {
                    if cross.as_ref().map_or(false, |c| c.has_metadata(id)) {
                        metadata.insert(
                            id,
                            MetadataEntry {
                                borrowed: true,
                                handle: None,
                                acquired: false,
                                holders: BTreeMap::new(),
                                gate: Arc::default(),
                            },
                        );
                    } else {
                        // Optional metadata (e.g. sub sensor) may simply be absent
                        tracing::trace!("Request {}: {} skips missing {}", request_no, node, id);
                        continue;
                    }
                }
                if let Some(entry) = metadata.get_mut(&id) {
                    *entry.holders.entry(node).or_insert(0) += 1;
                }
            }
        }

        self.node_io.insert(node, io);
    }

    /// Mark a path pending.
    pub fn add_path(&mut self, path: PathId) {
        match self.path_table.get_path(path) {
            Some(ends) => {
                self.paths.insert(path, ends);
                self.pending
                    .get_mut()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(path);
            }
            None => tracing::warn!("Request {}: unknown {}", self.request_no(), path),
        }
    }

    // ── Execution ──

    /// View over the request restricted to one node's bindings.
    pub fn node_request(&self, node: NodeId) -> Option<NodeRequest<'_>> {
        self.node_io
            .get(&node)
            .map(|io| NodeRequest::new(self, node, io))
    }

    pub fn node_io(&self, node: NodeId) -> Option<&NodeIo> {
        self.node_io.get(&node)
    }

    /// Nodes with bound I/O, ascending.
    pub fn nodes(&self) -> NodeSet {
        self.node_io.keys().copied().collect()
    }

    /// Handle for `id`, acquired on first access. Falls back to the cross
    /// request for ids this request does not know.
    ///
    /// Allocation, acquisition and cross lookups run outside the map lock,
    /// serialized per entry, so releases of other ids never wait on them.
    pub fn get_buffer(&self, id: BufferId) -> Option<Arc<dyn BufferHandle>> {
        let state = lock(&self.buffers)
            .get(&id)
            .map(|entry| (entry.acquired, entry.handle.clone(), entry.gate.clone()));
        let Some((acquired, handle, gate)) = state else {
            return match self.cross_request() {
                Some(cross) if cross.has_buffer(id) => cross.get_buffer(id),
                _ => {
                    tracing::debug!("Request {}: no buffer {}", self.request_no(), id);
                    None
                }
            };
        };
        if acquired {
            return handle;
        }

        let _acquiring = lock(&gate);
        let (origin, type_id, size, format, handle) = {
            let buffers = lock(&self.buffers);
            let entry = buffers.get(&id)?;
            if entry.acquired {
                return entry.handle.clone();
            }
            (entry.origin, entry.type_id, entry.size, entry.format, entry.handle.clone())
        };

        let handle = match (origin, handle) {
            (BufferOrigin::Borrowed, _) => {
                match self.cross_request().and_then(|c| c.get_buffer(id)) {
                    Some(handle) => handle,
                    None => {
                        tracing::warn!("Request {}: cross request lost {}", self.request_no(), id);
                        return None;
                    }
                }
            }
            (BufferOrigin::Pipe, None) => {
                let type_id = type_id?;
                let Some(allocator) = self.allocator.as_ref() else {
                    tracing::error!("Request {}: no allocator for {}", self.request_no(), id);
                    return None;
                };
                match allocator.allocate(id, type_id, size, format) {
                    Ok(handle) => handle,
                    Err(e) => {
                        tracing::error!("Request {}: allocating {} failed: {}", self.request_no(), id, e);
                        return None;
                    }
                }
            }
            (_, handle) => handle?,
        };

        // Borrowed handles were already acquired by their origin request
        if origin != BufferOrigin::Borrowed {
            if let Err(e) = handle.acquire() {
                tracing::error!("Request {}: acquiring {} failed: {}", self.request_no(), id, e);
                // Keep an allocated pipe handle for the next attempt
                if let Some(entry) = lock(&self.buffers).get_mut(&id) {
                    entry.handle = Some(handle);
                }
                return None;
            }
        }

        let installed = match lock(&self.buffers).get_mut(&id) {
            Some(entry) => {
                entry.handle = Some(handle.clone());
                entry.acquired = true;
                true
            }
            None => false,
        };
        if !installed {
            // The last reference went away while acquiring
            tracing::debug!("Request {}: {} released during acquire", self.request_no(), id);
            if origin != BufferOrigin::Borrowed {
                handle.release();
            }
            return None;
        }
        Some(handle)
    }

    /// Metadata handle for `id`, acquired on first access.
    pub fn get_metadata(&self, id: MetadataId) -> Option<Arc<dyn MetadataHandle>> {
        let state = lock(&self.metadata)
            .get(&id)
            .map(|entry| (entry.acquired, entry.handle.clone(), entry.gate.clone()));
        let Some((acquired, handle, gate)) = state else {
            return match self.cross_request() {
                Some(cross) if cross.has_metadata(id) => cross.get_metadata(id),
                _ => None,
            };
        };
        if acquired {
            return handle;
        }

        let _acquiring = lock(&gate);
        let (borrowed, handle) = {
            let metadata = lock(&self.metadata);
            let entry = metadata.get(&id)?;
            if entry.acquired {
                return entry.handle.clone();
            }
            (entry.borrowed, entry.handle.clone())
        };

        let handle = if borrowed {
            self.cross_request().and_then(|c| c.get_metadata(id))?
        } else {
            let handle = handle?;
            if let Err(e) = handle.acquire() {
                tracing::error!("Request {}: acquiring {} failed: {}", self.request_no(), id, e);
                return None;
            }
            handle
        };

        let installed = match lock(&self.metadata).get_mut(&id) {
            Some(entry) => {
                entry.handle = Some(handle.clone());
                entry.acquired = true;
                true
            }
            None => false,
        };
        if !installed {
            if !borrowed {
                handle.release();
            }
            return None;
        }
        Some(handle)
    }

    /// Drop one buffer reference held by `node`. The handle is released when
    /// the last reference goes away. Returns the remaining count.
    pub fn dec_buffer_ref(&self, node: NodeId, id: BufferId) -> Result<u32> {
        let released = {
            let mut buffers = lock(&self.buffers);
            let entry = buffers
                .get_mut(&id)
                .ok_or(ResolverError::UnknownBuffer(id))?;
            let Some(remaining) = drop_reference(&mut entry.holders, node) else {
                tracing::error!(
                    "Request {}: {} released {} without a reference",
                    self.request_no(),
                    node,
                    id
                );
                return Err(ResolverError::ReleaseWithoutReference {
                    node,
                    what: id.to_string(),
                });
            };
            if remaining > 0 {
                return Ok(remaining);
            }
            buffers.remove(&id)
        };

        if let Some(entry) = released {
            self.release_buffer_entry(id, entry);
        }
        Ok(0)
    }

    /// Drop one metadata reference held by `node`.
    pub fn dec_metadata_ref(&self, node: NodeId, id: MetadataId) -> Result<u32> {
        let released = {
            let mut metadata = lock(&self.metadata);
            let entry = metadata
                .get_mut(&id)
                .ok_or(ResolverError::UnknownMetadata(id))?;
            let Some(remaining) = drop_reference(&mut entry.holders, node) else {
                tracing::error!(
                    "Request {}: {} released {} without a reference",
                    self.request_no(),
                    node,
                    id
                );
                return Err(ResolverError::ReleaseWithoutReference {
                    node,
                    what: id.to_string(),
                });
            };
            if remaining > 0 {
                return Ok(remaining);
            }
            metadata.remove(&id)
        };

        if let Some(entry) = released {
            self.release_metadata_entry(id, entry);
        }
        Ok(0)
    }

    /// Drop every reference `node` still holds. Returns how many were dropped.
    pub fn dec_node_reference(&self, node: NodeId) -> u32 {
        let mut dropped = 0;

        let released: Vec<(BufferId, BufferEntry)> = {
            let mut buffers = lock(&self.buffers);
            let mut done = Vec::new();
            for (id, entry) in buffers.iter_mut() {
                if let Some(count) = entry.holders.remove(&node) {
                    dropped += count;
                    if entry.holders.is_empty() {
                        done.push(*id);
                    }
                }
            }
            done.into_iter()
                .filter_map(|id| buffers.remove(&id).map(|entry| (id, entry)))
                .collect()
        };
        for (id, entry) in released {
            self.release_buffer_entry(id, entry);
        }

        let released: Vec<(MetadataId, MetadataEntry)> = {
            let mut metadata = lock(&self.metadata);
            let mut done = Vec::new();
            for (id, entry) in metadata.iter_mut() {
                if let Some(count) = entry.holders.remove(&node) {
                    dropped += count;
                    if entry.holders.is_empty() {
                        done.push(*id);
                    }
                }
            }
            done.into_iter()
                .filter_map(|id| metadata.remove(&id).map(|entry| (id, entry)))
                .collect()
        };
        for (id, entry) in released {
            self.release_metadata_entry(id, entry);
        }

        tracing::trace!("Request {}: {} dropped {} references", self.request_no(), node, dropped);
        dropped
    }

    fn release_buffer_entry(&self, id: BufferId, entry: BufferEntry) {
        if entry.origin == BufferOrigin::Borrowed {
            tracing::trace!("Request {}: unlink borrowed {}", self.request_no(), id);
            return;
        }
        if let (true, Some(handle)) = (entry.acquired, entry.handle) {
            tracing::trace!("Request {}: release {}", self.request_no(), id);
            handle.release();
        }
    }

    fn release_metadata_entry(&self, id: MetadataId, entry: MetadataEntry) {
        if entry.borrowed {
            return;
        }
        if let (true, Some(handle)) = (entry.acquired, entry.handle) {
            tracing::trace!("Request {}: release {}", self.request_no(), id);
            handle.release();
        }
    }

    /// Mark a path complete. Returns false if it was not pending.
    pub fn traverse(&self, path: PathId) -> bool {
        let was_pending = lock(&self.pending).remove(path);
        if !was_pending {
            tracing::debug!(
                "Request {}: {} traversed but not pending",
                self.request_no(),
                self.path_table.name(path)
            );
        }
        was_pending
    }

    /// True once every producer of `node` has traversed its path.
    pub fn is_satisfied(&self, node: NodeId) -> bool {
        let node = self.path_table.base_node(node);
        let pending = lock(&self.pending);
        pending
            .iter()
            .all(|path| self.paths.get(&path).map_or(true, |&(_, dst)| dst != node))
    }

    /// True once every added path has been traversed.
    pub fn is_finished(&self) -> bool {
        lock(&self.pending).is_empty()
    }

    /// Every path added during resolution.
    pub fn paths(&self) -> PathSet {
        self.paths.keys().copied().collect()
    }

    /// Producers feeding `node` along an added path.
    pub fn get_previous_nodes(&self, node: NodeId) -> NodeSet {
        let node = self.path_table.base_node(node);
        self.paths
            .values()
            .filter(|(_, dst)| *dst == node)
            .map(|(src, _)| *src)
            .collect()
    }

    /// Consumers fed by `node` along an added path.
    pub fn get_next_nodes(&self, node: NodeId) -> NodeSet {
        let node = self.path_table.base_node(node);
        self.paths
            .values()
            .filter(|(src, _)| *src == node)
            .map(|(_, dst)| *dst)
            .collect()
    }

    /// Added path from `src` to `dst`, if any.
    pub fn path_between(&self, src: NodeId, dst: NodeId) -> Option<PathId> {
        let path = self.path_table.find_canonical_path(src, dst)?;
        self.paths.contains_key(&path).then_some(path)
    }

    // ── Queries ──

    pub fn has_buffer(&self, id: BufferId) -> bool {
        lock(&self.buffers).contains_key(&id)
    }

    pub fn has_metadata(&self, id: MetadataId) -> bool {
        lock(&self.metadata).contains_key(&id)
    }

    /// Current references on `id` (0 when unknown or released).
    pub fn buffer_ref_count(&self, id: BufferId) -> u32 {
        lock(&self.buffers).get(&id).map_or(0, BufferEntry::ref_count)
    }

    pub fn metadata_ref_count(&self, id: MetadataId) -> u32 {
        lock(&self.metadata).get(&id).map_or(0, MetadataEntry::ref_count)
    }

    pub fn image_size(&self, id: BufferId) -> Option<Size> {
        let size = lock(&self.buffers).get(&id).map(|entry| entry.size);
        size.or_else(|| self.cross_request().and_then(|c| c.image_size(id)))
    }

    pub fn image_format(&self, id: BufferId) -> Option<ImageFormat> {
        let format = lock(&self.buffers).get(&id).map(|entry| entry.format);
        format.or_else(|| self.cross_request().and_then(|c| c.image_format(id)))
    }

    /// Transform the client attached to `id`; identity for pipe buffers.
    pub fn image_transform(&self, id: BufferId) -> ImageTransform {
        let (origin, transform) = {
            let buffers = lock(&self.buffers);
            match buffers.get(&id) {
                Some(entry) => (
                    Some(entry.origin),
                    entry.handle.as_ref().map(|h| h.transform()),
                ),
                None => (None, None),
            }
        };
        match origin {
            Some(BufferOrigin::Client) => transform.unwrap_or(ImageTransform::NONE),
            Some(BufferOrigin::Borrowed) | None => self
                .cross_request()
                .map_or(ImageTransform::NONE, |c| c.image_transform(id)),
            Some(BufferOrigin::Pipe) => ImageTransform::NONE,
        }
    }

    pub fn buffer_origin(&self, id: BufferId) -> Option<BufferOrigin> {
        lock(&self.buffers).get(&id).map(|entry| entry.origin)
    }

    /// Log the full request state at debug level.
    pub fn dump(&self) {
        tracing::debug!(
            "Request {} frame {} features {:?}",
            self.request_no(),
            self.frame_no(),
            self.features
        );
        for (id, entry) in lock(&self.buffers).iter() {
            tracing::debug!(
                "  buffer {} {:?} refs={} acquired={} {} {:?}",
                id,
                entry.origin,
                entry.ref_count(),
                entry.acquired,
                entry.size,
                entry.format
            );
        }
        for (id, entry) in lock(&self.metadata).iter() {
            tracing::debug!(
                "  metadata {} refs={} acquired={} borrowed={}",
                id,
                entry.ref_count(),
                entry.acquired,
                entry.borrowed
            );
        }
        for (node, io) in &self.node_io {
            tracing::debug!(
                "  node {} in={:?} out={:?} meta={:?}",
                node,
                io.inputs,
                io.outputs,
                io.metadata
            );
        }
        let pending = *lock(&self.pending);
        for path in self.paths.keys() {
            tracing::debug!(
                "  path {} {}",
                self.path_table.name(*path),
                if pending.contains(*path) { "pending" } else { "done" }
            );
        }
    }
}

impl Drop for CaptureRequest {
    /// Handles acquired through the request but never bound to a node (or
    /// still bound when the request goes away) are released here.
    fn drop(&mut self) {
        let buffers = std::mem::take(self.buffers.get_mut().unwrap_or_else(|e| e.into_inner()));
        let metadata = std::mem::take(self.metadata.get_mut().unwrap_or_else(|e| e.into_inner()));
        if buffers.is_empty() && metadata.is_empty() {
            return;
        }
        tracing::trace!(
            "Request {} dropped with {} buffers and {} metadata live",
            self.request_no(),
            buffers.len(),
            metadata.len()
        );
        for (id, entry) in buffers {
            self.release_buffer_entry(id, entry);
        }
        for (id, entry) in metadata {
            self.release_metadata_entry(id, entry);
        }
    }
}

impl fmt::Debug for CaptureRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureRequest")
            .field("request_no", &self.request_no())
            .field("frame_no", &self.frame_no())
            .field("nodes", &self.nodes())
            .field("paths", &self.paths())
            .finish()
    }
}
