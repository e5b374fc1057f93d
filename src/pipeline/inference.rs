//! Per-request inference state and the `determine` pass.
//!
//! Resolution runs in four phases, all on one thread:
//!
//! 1. **Seed**: client input buffers become root-owned items (`add_source`).
//! 2. **Propose**: each evaluator, in ascending node order, declares what it
//!    can consume and produce (`add_node_io`). A node only sees types that
//!    sources or lower-numbered nodes have produced so far.
//! 3. **Bind targets**: client output buffers claim the best unconsumed
//!    producer of their type (`add_target`).
//! 4. **Determine**: consumed items get buffers, paths are marked and pruned,
//!    and every used node's I/O is registered on the [`CaptureRequest`].

use crate::error::Result;
use crate::pipeline::arena::{DataArena, DataItem, ItemIndex};
use crate::pipeline::id::{BufferId, FeatureId, MetadataId, NodeId, SizeId, TypeId};
use crate::pipeline::id_set::{FeatureSet, MetadataSet, NodeSet, PathSet};
use crate::pipeline::path_table::PathTable;
use crate::pipeline::plan::{NodeIo, PipeBufferDesc, PlanStats, ResolvedPlan};
use crate::pipeline::request::CaptureRequest;
use crate::types::{ImageFormat, Size};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// A source a node wants to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrcData {
    pub type_id: TypeId,
    pub size_id: SizeId,
}

impl SrcData {
    pub fn new(type_id: TypeId) -> Self {
        Self {
            type_id,
            size_id: SizeId::Full,
        }
    }

    pub fn sized(mut self, size_id: SizeId) -> Self {
        self.size_id = size_id;
        self
    }
}

/// An output a node declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstData {
    pub type_id: TypeId,
    pub size_id: SizeId,
    pub size: Size,
    pub format: ImageFormat,
    /// Source type whose buffer this output reuses.
    pub in_place: Option<TypeId>,
}

impl DstData {
    pub fn new(type_id: TypeId, size: Size, format: ImageFormat) -> Self {
        Self {
            type_id,
            size_id: SizeId::Full,
            size,
            format,
            in_place: None,
        }
    }

    pub fn sized(mut self, size_id: SizeId) -> Self {
        self.size_id = size_id;
        self
    }

    /// Write into the buffer of the consumed `src` item.
    pub fn in_place_of(mut self, src: TypeId) -> Self {
        self.in_place = Some(src);
        self
    }
}

/// Inference state for one request.
pub struct InferenceData {
    arena: DataArena,
    table: Arc<PathTable>,
    node_metadata: BTreeMap<NodeId, MetadataSet>,
    /// `(consumer, type)` → consumed item, filled by `determine`.
    inputs: BTreeMap<(NodeId, TypeId), ItemIndex>,
    used_nodes: NodeSet,
    forced_nodes: NodeSet,
    used_paths: PathSet,
    features: FeatureSet,
    request_no: i64,
    frame_no: i64,
    pipe_seq: u32,
    dropped_targets: Vec<(TypeId, BufferId)>,
}

impl InferenceData {
    pub fn new(table: Arc<PathTable>, capacity: usize) -> Self {
        Self {
            arena: DataArena::with_capacity(capacity),
            table,
            node_metadata: BTreeMap::new(),
            inputs: BTreeMap::new(),
            used_nodes: NodeSet::new(),
            forced_nodes: NodeSet::new(),
            used_paths: PathSet::new(),
            features: FeatureSet::new(),
            request_no: -1,
            frame_no: -1,
            pipe_seq: 0,
            dropped_targets: Vec::new(),
        }
    }

    /// Start inference for `request`, inheriting its features and counters.
    pub fn for_request(request: &CaptureRequest, capacity: usize) -> Self {
        let mut data = Self::new(request.path_table().clone(), capacity);
        data.features = request.features();
        data.request_no = request.request_no();
        data.frame_no = request.frame_no();
        data
    }

    pub fn add_feature(&mut self, feature: FeatureId) {
        if !feature.is_valid() {
            tracing::warn!("Ignoring out-of-range {}", feature);
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

    pub fn request_no(&self) -> i64 {
        self.request_no
    }

    pub fn frame_no(&self) -> i64 {
        self.frame_no
    }

    pub fn has_type(&self, type_id: TypeId) -> bool {
        self.arena.has_type(type_id)
    }

    /// Size of the latest item of `type_id`.
    pub fn get_size(&self, type_id: TypeId) -> Size {
        self.arena.get_size(type_id)
    }

    pub fn get_format(&self, type_id: TypeId) -> Option<ImageFormat> {
        self.arena
            .latest(type_id)
            .and_then(|idx| self.arena.get(idx))
            .map(|item| item.format)
    }

    pub fn arena(&self) -> &DataArena {
        &self.arena
    }

    /// Seed an externally supplied buffer.
    pub fn add_source(
        &mut self,
        type_id: TypeId,
        buffer: BufferId,
        format: ImageFormat,
        size: Size,
    ) -> Result<ItemIndex> {
        let item = DataItem {
            buffer: Some(buffer),
            format,
            size,
            ..DataItem::new(NodeId::ROOT, type_id)
        };
        let index = self.arena.add_data_item(item)?;
        tracing::trace!("Source {} on {} -> item {}", type_id, buffer, index);
        Ok(index)
    }

    /// Register what `node` consumes and produces.
    ///
    /// Sources with no producer yet are skipped. Every new item is tagged
    /// with the features of its consumed sources plus `features`.
    pub fn add_node_io(
        &mut self,
        node: NodeId,
        srcs: &[SrcData],
        dsts: &[DstData],
        metadata: &[MetadataId],
        features: &[FeatureId],
        forced: bool,
    ) -> Result<()> {
        node.check()?;
        for feature in features {
            feature.check()?;
        }
        for id in metadata {
            id.check()?;
        }
        for dst in dsts {
            dst.type_id.check()?;
        }

        let mut combined = FeatureSet::new();
        let mut consumed: Vec<(TypeId, ItemIndex)> = Vec::with_capacity(srcs.len());

        for src in srcs {
            let Some(index) = self.arena.latest(src.type_id) else {
                tracing::trace!("{} skips missing source {}", node, src.type_id);
                continue;
            };
            if let Some(item) = self.arena.get_mut(index) {
                item.consumers.insert(node);
                combined.union_with(&item.features);
            }
            consumed.push((src.type_id, index));
        }

        combined.extend(features.iter().copied());
        self.node_metadata
            .entry(node)
            .or_default()
            .extend(metadata.iter().copied());
        if forced {
            self.forced_nodes.insert(node);
        }

        for dst in dsts {
            let redirect = match dst.in_place {
                Some(src_type) => {
                    let source = consumed
                        .iter()
                        .find(|(type_id, _)| *type_id == src_type)
                        .map(|&(_, index)| self.arena.resolve_redirect(index));
                    if source.is_none() {
                        tracing::warn!(
                            "{}: in-place {} has no consumed {}; allocating fresh",
                            node,
                            dst.type_id,
                            src_type
                        );
                    }
                    source
                }
                None => None,
            };
            let item = DataItem {
                format: dst.format,
                size: dst.size,
                size_id: dst.size_id,
                features: combined,
                redirect,
                ..DataItem::new(node, dst.type_id)
            };
            self.arena.add_data_item(item)?;
        }

        tracing::trace!(
            "{} io: {} srcs, {} dsts, features {:?}",
            node,
            consumed.len(),
            dsts.len(),
            combined
        );
        Ok(())
    }

    /// Bind a client output buffer to the best unconsumed item of `type_id`.
    ///
    /// The item with the most feature bits wins; on a tie the earliest one.
    pub fn add_target(&mut self, type_id: TypeId, buffer: BufferId) -> Option<ItemIndex> {
        let mut best: Option<(ItemIndex, usize)> = None;
        for (index, item) in self.arena.iter() {
            if item.type_id != type_id || item.is_consumed() {
                continue;
            }
            let score = item.features.len();
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((index, score));
            }
        }

        let Some((index, _)) = best else {
            tracing::warn!(
                "Request {}: no producer for target {} ({}); dropped",
                self.request_no,
                type_id,
                buffer
            );
            self.dropped_targets.push((type_id, buffer));
            return None;
        };

        if let Some(item) = self.arena.get_mut(index) {
            item.buffer = Some(buffer);
            item.consumers.insert(NodeId::ROOT);
        }
        tracing::trace!("Target {} on {} -> item {}", type_id, buffer, index);
        Some(index)
    }

    /// Resolve buffers and paths, then register every used node's I/O and
    /// every kept path on `request`.
    pub fn determine(&mut self, request: &mut CaptureRequest) -> ResolvedPlan {
        let start = Instant::now();
        let mut pipe_buffers = Vec::new();

        self.used_nodes.insert(NodeId::ROOT);
        let forced = self.forced_nodes;
        self.used_nodes.union_with(&forced);

        for index in 0..self.arena.len() {
            let Some(item) = self.arena.get(index).cloned() else {
                continue;
            };
            if !item.is_consumed() {
                continue;
            }
            self.used_nodes.insert(item.owner);

            let buffer = match item.buffer {
                Some(buffer) => buffer,
                None => {
                    let inherited = item
                        .redirect
                        .and_then(|target| self.arena.get(target))
                        .and_then(|target| target.buffer);
                    match inherited {
                        Some(buffer) => buffer,
                        None => {
                            let id = BufferId::pipe(self.pipe_seq);
                            self.pipe_seq += 1;
                            request.add_pipe_buffer(id, item.type_id, item.size, item.format);
                            pipe_buffers.push(PipeBufferDesc {
                                id,
                                type_id: item.type_id,
                                size: item.size,
                                format: item.format,
                            });
                            id
                        }
                    }
                }
            };
            if let Some(slot) = self.arena.get_mut(index) {
                slot.buffer = Some(buffer);
            }

            for consumer in item.consumers.iter() {
                self.inputs.insert((consumer, item.type_id), index);
                if let Some(path) = self.table.find_canonical_path(item.owner, consumer) {
                    self.used_paths.insert(path);
                }
            }
        }

        let mut kept = PathSet::new();
        let mut pruned = 0;
        for path in self.used_paths.iter() {
            let both_used = self
                .table
                .get_path(path)
                .map_or(false, |(src, dst)| {
                    self.used_nodes.contains(src) && self.used_nodes.contains(dst)
                });
            if both_used {
                kept.insert(path);
            } else {
                tracing::trace!("Pruning {}", self.table.name(path));
                pruned += 1;
            }
        }
        self.used_paths = kept;

        let mut node_io = BTreeMap::new();
        for node in self.used_nodes.iter().filter(|n| !n.is_root()) {
            let io = self.collect_node_io(node);
            request.add_node_io(node, io.clone());
            node_io.insert(node, io);
        }
        for path in self.used_paths.iter() {
            request.add_path(path);
        }

        let stats = PlanStats {
            items: self.arena.len(),
            consumed_items: self.arena.iter().filter(|(_, i)| i.is_consumed()).count(),
            used_nodes: self.used_nodes.len(),
            used_paths: self.used_paths.len(),
            pruned_paths: pruned,
            resolve_time_us: start.elapsed().as_micros() as u64,
        };
        tracing::debug!(
            "Request {} resolved: nodes {:?}, {} paths ({} pruned), {} pipe buffers",
            self.request_no,
            self.used_nodes,
            stats.used_paths,
            pruned,
            pipe_buffers.len()
        );

        ResolvedPlan {
            used_nodes: self.used_nodes,
            used_paths: self.used_paths,
            node_io,
            pipe_buffers,
            dropped_targets: self.dropped_targets.clone(),
            stats,
        }
    }

    fn collect_node_io(&self, node: NodeId) -> NodeIo {
        let mut io = NodeIo {
            metadata: self.node_metadata.get(&node).copied().unwrap_or_default(),
            ..NodeIo::default()
        };

        for (&(consumer, type_id), &index) in &self.inputs {
            if consumer != node {
                continue;
            }
            if let Some(buffer) = self.arena.get(index).and_then(|item| item.buffer) {
                io.inputs.insert(type_id, buffer);
            }
        }

        for (_, item) in self.arena.iter() {
            if item.owner != node || !item.consumers.intersects(&self.used_nodes) {
                continue;
            }
            if let Some(buffer) = item.buffer {
                io.outputs.insert(item.type_id, buffer);
            }
        }
        io
    }

    /// Log every item at debug level.
    pub fn dump(&self) {
        tracing::debug!(
            "Inference request {} frame {}: {} items, features {:?}",
            self.request_no,
            self.frame_no,
            self.arena.len(),
            self.features
        );
        for (index, item) in self.arena.iter() {
            tracing::debug!(
                "  [{}] {} by {} buf={} {} {:?} features={:?} consumers={:?} redirect={:?}",
                index,
                item.type_id,
                item.owner,
                item.buffer.map_or_else(|| "-".to_string(), |b| b.to_string()),
                item.size,
                item.format,
                item.features,
                item.consumers,
                item.redirect
            );
        }
    }
}
