//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use capture_resolver::pipeline::{NodeId, PathTable};
use std::time::Duration;

/// Upper bound for threads waiting on request readiness
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Path id between two nodes in the stock table; panics if there is none
pub fn stock_path(src: NodeId, dst: NodeId) -> capture_resolver::pipeline::PathId {
    PathTable::stock()
        .find_path(src, dst)
        .unwrap_or_else(|| panic!("stock table has no {} -> {}", src, dst))
}
