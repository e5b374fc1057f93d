//! Resolved execution plan for one capture request.
//! Produced by `InferenceData::determine`; immutable afterwards.

use crate::pipeline::id::{BufferId, MetadataId, NodeId, PathId, TypeId};
use crate::pipeline::id_set::{MetadataSet, NodeSet, PathSet};
use crate::pipeline::path_table::PathTable;
use crate::types::{Direction, ImageFormat, Size};
use serde::Serialize;
use std::collections::BTreeMap;

/// Buffers and metadata one node reads and writes for a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeIo {
    pub inputs: BTreeMap<TypeId, BufferId>,
    pub outputs: BTreeMap<TypeId, BufferId>,
    pub metadata: MetadataSet,
}

impl NodeIo {
    /// Buffer bound for `type_id` in the given direction.
    pub fn buffer(&self, type_id: TypeId, direction: Direction) -> Option<BufferId> {
        match direction {
            Direction::Input => self.inputs.get(&type_id).copied(),
            Direction::Output => self.outputs.get(&type_id).copied(),
        }
    }

    /// Every buffer binding, inputs first. A buffer bound twice appears twice.
    pub fn buffers(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.inputs.values().chain(self.outputs.values()).copied()
    }

    pub fn binds_buffer(&self, id: BufferId) -> bool {
        self.buffers().any(|b| b == id)
    }

    pub fn binds_metadata(&self, id: MetadataId) -> bool {
        self.metadata.contains(id)
    }
}

/// Description of a pipe buffer created during determine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeBufferDesc {
    pub id: BufferId,
    pub type_id: TypeId,
    pub size: Size,
    pub format: ImageFormat,
}

/// Statistics about the resolution
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlanStats {
    /// Data items inferred (sources included)
    pub items: usize,

    /// Items with at least one consumer
    pub consumed_items: usize,

    /// Nodes taking part, root included
    pub used_nodes: usize,

    /// Paths kept after pruning
    pub used_paths: usize,

    /// Paths discarded because an endpoint was unused
    pub pruned_paths: usize,

    /// Resolution time in microseconds
    pub resolve_time_us: u64,
}

/// Final per-request plan.
#[derive(Debug, Clone, Default)]
pub struct ResolvedPlan {
    pub used_nodes: NodeSet,
    pub used_paths: PathSet,
    pub node_io: BTreeMap<NodeId, NodeIo>,
    pub pipe_buffers: Vec<PipeBufferDesc>,
    /// Targets that found no unconsumed producer.
    pub dropped_targets: Vec<(TypeId, BufferId)>,
    pub stats: PlanStats,
}

impl ResolvedPlan {
    pub fn is_node_used(&self, node: NodeId) -> bool {
        self.used_nodes.contains(node)
    }

    pub fn is_path_used(&self, path: PathId) -> bool {
        self.used_paths.contains(path)
    }

    /// Name-based, serializable view of the plan.
    pub fn snapshot(&self, table: &PathTable) -> PlanSnapshot {
        PlanSnapshot {
            used_nodes: self.used_nodes.iter().map(|n| n.to_string()).collect(),
            used_paths: self.used_paths.iter().map(|p| table.name(p)).collect(),
            nodes: self
                .node_io
                .iter()
                .map(|(node, io)| NodeIoSnapshot {
                    node: node.to_string(),
                    inputs: named_buffers(&io.inputs),
                    outputs: named_buffers(&io.outputs),
                    metadata: io.metadata.iter().map(|m| m.to_string()).collect(),
                })
                .collect(),
            pipe_buffers: self
                .pipe_buffers
                .iter()
                .map(|desc| PipeBufferSnapshot {
                    id: desc.id.to_string(),
                    type_name: desc.type_id.to_string(),
                    size: desc.size.to_string(),
                    format: format!("{:?}", desc.format),
                })
                .collect(),
            dropped_targets: self
                .dropped_targets
                .iter()
                .map(|(type_id, buffer)| format!("{} -> {}", type_id, buffer))
                .collect(),
            stats: self.stats.clone(),
        }
    }
}

fn named_buffers(map: &BTreeMap<TypeId, BufferId>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(type_id, buffer)| (type_id.to_string(), buffer.to_string()))
        .collect()
}

/// Serializable snapshot of a [`ResolvedPlan`] (for dumps and the demo binary).
#[derive(Debug, Clone, Serialize)]
pub struct PlanSnapshot {
    pub used_nodes: Vec<String>,
    pub used_paths: Vec<String>,
    pub nodes: Vec<NodeIoSnapshot>,
    pub pipe_buffers: Vec<PipeBufferSnapshot>,
    pub dropped_targets: Vec<String>,
    pub stats: PlanStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeIoSnapshot {
    pub node: String,
    pub inputs: BTreeMap<String, String>,
    pub outputs: BTreeMap<String, String>,
    pub metadata: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipeBufferSnapshot {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub size: String,
    pub format: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_io_lookup() {
        let mut io = NodeIo::default();
        io.inputs.insert(TypeId::MAIN_FULL_YUV, BufferId::pipe(0));
        io.outputs.insert(TypeId::JPEG, BufferId::MAIN_OUT_JPEG);

        assert_eq!(
            io.buffer(TypeId::MAIN_FULL_YUV, Direction::Input),
            Some(BufferId::pipe(0))
        );
        assert_eq!(io.buffer(TypeId::MAIN_FULL_YUV, Direction::Output), None);
        assert!(io.binds_buffer(BufferId::MAIN_OUT_JPEG));
        assert!(!io.binds_buffer(BufferId::MAIN_OUT_THUMBNAIL));
    }

    #[test]
    fn test_snapshot_uses_names() {
        let mut plan = ResolvedPlan::default();
        plan.used_nodes.insert(NodeId::ROOT);
        plan.used_nodes.insert(NodeId::P2A);
        let table = PathTable::stock();
        let pid = table.find_path(NodeId::ROOT, NodeId::P2A).unwrap();
        plan.used_paths.insert(pid);

        let snapshot = plan.snapshot(&table);
        assert_eq!(snapshot.used_nodes, vec!["root", "p2a"]);
        assert_eq!(snapshot.used_paths, vec!["root_to_p2a"]);

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("root_to_p2a"));
    }
}
