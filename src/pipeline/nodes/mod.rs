//! Built-in node evaluators.
//!
//! These only declare the stock I/O of each node; the image processing
//! itself lives in the execution harness.

pub mod fd;
pub mod mdp;
pub mod p2a;
pub mod yuv;

pub use fd::FdEvaluator;
pub use mdp::MdpEvaluator;
pub use p2a::P2aEvaluator;
pub use yuv::YuvEvaluator;

use crate::pipeline::id::MetadataId;

/// Main-sensor metadata a processing node reads and writes.
pub(crate) static MAIN_METADATA: &[MetadataId] = &[
    MetadataId::MAIN_IN_P1_DYNAMIC,
    MetadataId::MAIN_IN_APP,
    MetadataId::MAIN_IN_HAL,
    MetadataId::MAIN_OUT_APP,
    MetadataId::MAIN_OUT_HAL,
];
