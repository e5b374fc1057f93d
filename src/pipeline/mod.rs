//! Capture request resolution.
//!
//! For each capture, the resolver works out which processing nodes and
//! intermediate buffers turn the client's inputs into the outputs it asked
//! for, then tracks the lifetime of every handle while the nodes run.
//!
//! # Architecture
//!
//! ```text
//! client buffers ──► InferenceData ──► NodeEvaluators (ascending NodeId)
//!                                            │
//!                    targets ──► determine() ▼
//!                                     CaptureRequest ──► NodeRequest (per node)
//! ```
//!
//! # Design
//!
//! - **Bit sets for ids**: every id space fits in a `u64`, iterated ascending.
//! - **Append-only arena**: data items are addressed by index; in-place
//!   outputs point back at earlier items.
//! - **Enum dispatch for built-in evaluators**: `BuiltinEvaluator`, with a
//!   trait object escape hatch for external nodes.
//! - **Per-category locks**: after resolution the request is shared; buffer
//!   counts, metadata counts and traversal each have their own mutex.

pub mod arena;
pub mod evaluator;
pub mod handle;
pub mod id;
pub mod id_set;
pub mod inference;
pub mod node_request;
pub mod nodes;
pub mod path_table;
pub mod plan;
pub mod request;
pub mod resolver;

pub use arena::{DataArena, DataItem, ItemIndex};
pub use evaluator::{AnyEvaluator, BuiltinEvaluator, NodeEvaluator};
pub use handle::{
    BufferAllocator, BufferHandle, HeapAllocator, HeapBuffer, MetadataBlock, MetadataHandle,
};
pub use id::{BufferId, ClientRole, FeatureId, MetadataId, NodeId, PathId, SizeId, TypeId};
pub use id_set::{FeatureSet, IdSet, MetadataSet, NodeSet, PathSet};
pub use inference::{DstData, InferenceData, SrcData};
pub use node_request::NodeRequest;
pub use path_table::PathTable;
pub use plan::{NodeIo, PipeBufferDesc, PlanSnapshot, PlanStats, ResolvedPlan};
pub use request::{BufferOrigin, CaptureRequest, ClientBuffer, RequestParam};
pub use resolver::FeatureInference;
