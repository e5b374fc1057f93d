//! # capture-resolver: per-capture pipeline request resolution
//!
//! Given the buffers a client supplies for one capture and the outputs it
//! wants back, the resolver infers which processing nodes must run, which
//! intermediate buffers they need and how they are connected. It then keeps
//! the reference-counted lifetime of every buffer and metadata handle while
//! the nodes execute, and tells each node when all of its producers are done.
//!
//! ## Architecture
//!
//! - **Inference**: an append-only arena of data items, extended by node
//!   evaluators in ascending node order, then bound to client outputs.
//! - **Determine**: assigns buffers (client, pipe or in-place aliases), marks
//!   and prunes paths, and emits each used node's I/O.
//! - **Capture request**: handle maps with reference counts, traversal state
//!   and the per-node [`pipeline::NodeRequest`] view.
//!
//! ## Configuration
//!
//! The path table and arena capacity come from a TOML (or JSON) file; see
//! [`config::ResolverConfig`]. Without one the stock table is used.
//!
//! ## Example
//!
//! ```ignore
//! use capture_resolver::pipeline::{BufferId, FeatureInference, HeapBuffer};
//! use capture_resolver::types::{ImageFormat, Size};
//! use std::sync::Arc;
//!
//! let inference = FeatureInference::from_config(&Default::default())?.with_builtin_nodes();
//! let mut request = inference.new_request();
//! let size = Size::new(4000, 3000);
//! request.add_buffer(BufferId::MAIN_IN_FULL_RAW, Arc::new(HeapBuffer::new(size, ImageFormat::Bayer10)));
//! request.add_buffer(BufferId::MAIN_OUT_JPEG, Arc::new(HeapBuffer::new(size, ImageFormat::Jpeg)));
//!
//! let plan = inference.evaluate(&mut request)?;
//! for node in plan.used_nodes.iter() {
//!     println!("{}", node);
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use config::ResolverConfig;
pub use error::{ResolverError, Result};
pub use pipeline::{CaptureRequest, FeatureInference, NodeRequest, ResolvedPlan};
