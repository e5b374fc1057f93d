//! Static node adjacency table.
//!
//! Each entry is a directed edge `(producer, consumer)`; its position is its
//! [`PathId`]. Slot 0 is the reserved root-to-root enqueue path and is never
//! returned by [`PathTable::find_path`].
//!
//! Repeating node variants (`yuv_r1`, `yuv2_r2`, ...) have no edges of their
//! own; lookups canonicalize them to their base node first.

use crate::config::{PathEntry, PathTableConfig, RepeatEntry};
use crate::error::{ResolverError, Result};
use crate::pipeline::id::{NodeId, PathId, MAX_IDS};
use std::collections::BTreeMap;

/// The stock capture pipe edges, in path-id order (starting at 1).
const STOCK_PATHS: &[(NodeId, NodeId)] = &[
    (NodeId::ROOT, NodeId::RAW),
    (NodeId::ROOT, NodeId::P2A),
    (NodeId::ROOT, NodeId::MULTIFRAME),
    (NodeId::RAW, NodeId::P2A),
    (NodeId::P2A, NodeId::DEPTH),
    (NodeId::P2A, NodeId::FUSION),
    (NodeId::P2A, NodeId::MULTIFRAME),
    (NodeId::P2A, NodeId::YUV),
    (NodeId::P2A, NodeId::YUV2),
    (NodeId::P2A, NodeId::MDP),
    (NodeId::P2A, NodeId::FD),
    (NodeId::FD, NodeId::DEPTH),
    (NodeId::FD, NodeId::FUSION),
    (NodeId::FD, NodeId::MULTIFRAME),
    (NodeId::FD, NodeId::YUV),
    (NodeId::FD, NodeId::YUV2),
    (NodeId::MULTIFRAME, NodeId::YUV),
    (NodeId::MULTIFRAME, NodeId::YUV2),
    (NodeId::MULTIFRAME, NodeId::BOKEH),
    (NodeId::MULTIFRAME, NodeId::MDP),
    (NodeId::FUSION, NodeId::YUV),
    (NodeId::FUSION, NodeId::MDP),
    (NodeId::DEPTH, NodeId::BOKEH),
    (NodeId::YUV, NodeId::BOKEH),
    (NodeId::YUV, NodeId::YUV2),
    (NodeId::YUV, NodeId::MDP),
    (NodeId::BOKEH, NodeId::YUV2),
    (NodeId::BOKEH, NodeId::MDP),
    (NodeId::YUV2, NodeId::MDP),
];

const STOCK_REPEATING: &[(NodeId, NodeId)] = &[
    (NodeId::YUV_R1, NodeId::YUV),
    (NodeId::YUV_R2, NodeId::YUV),
    (NodeId::YUV2_R1, NodeId::YUV2),
    (NodeId::YUV2_R2, NodeId::YUV2),
];

/// Directed-edge lookup between node pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTable {
    /// Index = path id; slot 0 is the enqueue path.
    paths: Vec<(NodeId, NodeId)>,
    /// Repeating variant → base node.
    repeating: BTreeMap<NodeId, NodeId>,
}

impl PathTable {
    /// The stock capture pipe table.
    pub fn stock() -> Self {
        let mut paths = Vec::with_capacity(STOCK_PATHS.len() + 1);
        paths.push((NodeId::ROOT, NodeId::ROOT));
        paths.extend_from_slice(STOCK_PATHS);
        Self {
            paths,
            repeating: STOCK_REPEATING.iter().copied().collect(),
        }
    }

    /// Build a table from explicit edges (path ids start at 1).
    pub fn from_edges(
        edges: impl IntoIterator<Item = (NodeId, NodeId)>,
        repeating: impl IntoIterator<Item = (NodeId, NodeId)>,
    ) -> Result<Self> {
        let mut paths = vec![(NodeId::ROOT, NodeId::ROOT)];
        for (src, dst) in edges {
            paths.push((src.check()?, dst.check()?));
        }
        if paths.len() > MAX_IDS as usize {
            return Err(ResolverError::Config(format!(
                "path table has {} entries, at most {} are supported",
                paths.len() - 1,
                MAX_IDS - 1
            )));
        }

        let mut map = BTreeMap::new();
        for (variant, base) in repeating {
            let (variant, base) = (variant.check()?, base.check()?);
            if variant == base {
                return Err(ResolverError::Config(format!(
                    "repeating node {} maps to itself",
                    variant
                )));
            }
            map.insert(variant, base);
        }

        Ok(Self {
            paths,
            repeating: map,
        })
    }

    /// Build a table from its name-based configuration.
    pub fn from_config(config: &PathTableConfig) -> Result<Self> {
        let edges = config
            .paths
            .iter()
            .map(|entry| Ok((entry.src.parse::<NodeId>()?, entry.dst.parse::<NodeId>()?)))
            .collect::<Result<Vec<_>>>()?;
        let repeating = config
            .repeating
            .iter()
            .map(|entry| {
                Ok((
                    entry.variant.parse::<NodeId>()?,
                    entry.base.parse::<NodeId>()?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_edges(edges, repeating)
    }

    /// Name-based configuration describing this table.
    pub fn to_config(&self) -> PathTableConfig {
        PathTableConfig {
            paths: self.paths[1..]
                .iter()
                .map(|(src, dst)| PathEntry {
                    src: src.to_string(),
                    dst: dst.to_string(),
                })
                .collect(),
            repeating: self
                .repeating
                .iter()
                .map(|(variant, base)| RepeatEntry {
                    variant: variant.to_string(),
                    base: base.to_string(),
                })
                .collect(),
        }
    }

    /// Path from `src` to `dst`, if the table has one. Never the enqueue path.
    pub fn find_path(&self, src: NodeId, dst: NodeId) -> Option<PathId> {
        self.paths
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, pair)| pair.0 == src && pair.1 == dst)
            .map(|(idx, _)| PathId(idx as u8))
    }

    /// Endpoints of a path.
    pub fn get_path(&self, path: PathId) -> Option<(NodeId, NodeId)> {
        self.paths.get(path.index()).copied()
    }

    /// Canonical node used for path lookups.
    pub fn base_node(&self, node: NodeId) -> NodeId {
        self.repeating.get(&node).copied().unwrap_or(node)
    }

    /// Path between two nodes after canonicalizing repeating variants.
    pub fn find_canonical_path(&self, src: NodeId, dst: NodeId) -> Option<PathId> {
        self.find_path(self.base_node(src), self.base_node(dst))
    }

    /// Human-readable path name, e.g. `p2a_to_mdp`.
    pub fn name(&self, path: PathId) -> String {
        match self.get_path(path) {
            _ if path == PathId::ENQUE => "enque".to_string(),
            Some((src, dst)) => format!("{}_to_{}", src, dst),
            None => "unknown".to_string(),
        }
    }

    /// Number of real paths (excluding the enqueue slot).
    pub fn len(&self) -> usize {
        self.paths.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All real paths with their endpoints.
    pub fn iter(&self) -> impl Iterator<Item = (PathId, NodeId, NodeId)> + '_ {
        self.paths
            .iter()
            .enumerate()
            .skip(1)
            .map(|(idx, &(src, dst))| (PathId(idx as u8), src, dst))
    }
}

impl Default for PathTable {
    fn default() -> Self {
        Self::stock()
    }
}
