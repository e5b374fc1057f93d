//! Integration tests for the capture request lifecycle
//!
//! Covers reference counting across nodes, exactly-once release of handles
//! and the readiness protocol when nodes run on their own threads.

mod common;

use capture_resolver::pipeline::{
    BufferId, CaptureRequest, FeatureId, FeatureInference, MetadataId, NodeId, NodeIo,
    PathTable, TypeId,
};
use capture_resolver::types::{ImageFormat, Size};
use capture_resolver::ResolverError;
use common::builders::RequestBuilder;
use capture_resolver::pipeline::HeapBuffer;
use common::mock_helpers::{
    strict_buffer, GatedAllocator, MockBuffer, MockMetadata, TrackingAllocator,
};
use common::stock_path;
use crossbeam_channel::unbounded;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Instant;

const FULL: Size = Size::new(800, 600);

fn tracking_inference() -> (FeatureInference, Arc<TrackingAllocator>) {
    let allocator = Arc::new(TrackingAllocator::new());
    let inference = FeatureInference::new(Arc::new(PathTable::stock()), 32)
        .with_builtin_nodes()
        .with_allocator(allocator.clone());
    (inference, allocator)
}

/// Every `(node, buffer)` binding of the request, one entry per reference.
fn bindings(request: &CaptureRequest) -> Vec<(NodeId, BufferId)> {
    let mut out = Vec::new();
    for node in request.nodes().iter() {
        if let Some(io) = request.node_io(node) {
            out.extend(io.buffers().map(|id| (node, id)));
        }
    }
    out
}

fn io(inputs: &[(TypeId, BufferId)]) -> NodeIo {
    NodeIo {
        inputs: inputs.iter().copied().collect(),
        ..NodeIo::default()
    }
}

#[test]
fn test_handle_released_once_after_last_holder() {
    let mut request = CaptureRequest::new(Arc::new(PathTable::stock()));
    request.add_buffer(
        BufferId::MAIN_IN_FULL_RAW,
        Arc::new(strict_buffer(FULL, ImageFormat::Bayer10)),
    );
    let binding = [(TypeId::MAIN_FULL_RAW, BufferId::MAIN_IN_FULL_RAW)];
    request.add_node_io(NodeId::P2A, io(&binding));
    request.add_node_io(NodeId::FD, io(&binding));

    let p2a = request.node_request(NodeId::P2A).unwrap();
    let fd = request.node_request(NodeId::FD).unwrap();
    assert!(p2a.acquire_buffer(BufferId::MAIN_IN_FULL_RAW).is_some());
    assert!(fd.acquire_buffer(BufferId::MAIN_IN_FULL_RAW).is_some());

    assert_eq!(p2a.release_buffer(BufferId::MAIN_IN_FULL_RAW).unwrap(), 1);
    assert_eq!(fd.release_buffer(BufferId::MAIN_IN_FULL_RAW).unwrap(), 0);
    assert!(matches!(
        fd.release_buffer(BufferId::MAIN_IN_FULL_RAW),
        Err(ResolverError::UnknownBuffer(_))
    ));
    // The mock verifies acquire and release ran exactly once when dropped
}

#[test]
fn test_never_acquired_handle_is_not_released() {
    let mut mock = MockBuffer::new();
    mock.expect_size().return_const(FULL);
    mock.expect_format().return_const(ImageFormat::Jpeg);
    mock.expect_acquire().never();
    mock.expect_release().never();

    let mut request = CaptureRequest::new(Arc::new(PathTable::stock()));
    request.add_buffer(BufferId::MAIN_OUT_JPEG, Arc::new(mock));
    let mut jpeg = NodeIo::default();
    jpeg.outputs.insert(TypeId::JPEG, BufferId::MAIN_OUT_JPEG);
    request.add_node_io(NodeId::MDP, jpeg);

    assert_eq!(request.dec_node_reference(NodeId::MDP), 1);
    assert!(!request.has_buffer(BufferId::MAIN_OUT_JPEG));
}

#[test]
fn test_metadata_released_once() {
    let mut mock = MockMetadata::new();
    mock.expect_acquire().times(1).returning(|| Ok(()));
    mock.expect_release().times(1).return_const(());

    let mut request = CaptureRequest::new(Arc::new(PathTable::stock()));
    request.add_metadata(MetadataId::MAIN_IN_APP, Arc::new(mock));
    for node in [NodeId::P2A, NodeId::FD, NodeId::MDP] {
        let mut bound = NodeIo::default();
        bound.metadata.insert(MetadataId::MAIN_IN_APP);
        request.add_node_io(node, bound);
    }
    assert_eq!(request.metadata_ref_count(MetadataId::MAIN_IN_APP), 3);

    for node in [NodeId::MDP, NodeId::P2A, NodeId::FD] {
        let view = request.node_request(node).unwrap();
        assert!(view.acquire_metadata(MetadataId::MAIN_IN_APP).is_some());
        view.release_metadata(MetadataId::MAIN_IN_APP).unwrap();
    }
    assert_eq!(request.metadata_ref_count(MetadataId::MAIN_IN_APP), 0);
}

#[test]
fn test_failed_acquire_returns_none() {
    let mut mock = MockBuffer::new();
    mock.expect_size().return_const(FULL);
    mock.expect_format().return_const(ImageFormat::Bayer10);
    mock.expect_acquire()
        .returning(|| Err(ResolverError::Config("no memory".to_string())));
    mock.expect_release().never();

    let mut request = CaptureRequest::new(Arc::new(PathTable::stock()));
    request.add_buffer(BufferId::MAIN_IN_FULL_RAW, Arc::new(mock));
    request.add_node_io(
        NodeId::P2A,
        io(&[(TypeId::MAIN_FULL_RAW, BufferId::MAIN_IN_FULL_RAW)]),
    );

    let view = request.node_request(NodeId::P2A).unwrap();
    assert!(view.acquire_buffer(BufferId::MAIN_IN_FULL_RAW).is_none());
    assert_eq!(view.release_all(), 1);
}

#[test]
fn test_nodes_run_on_threads_in_dependency_order() {
    let (inference, allocator) = tracking_inference();
    let mut built = RequestBuilder::raw_capture(FULL)
        .buffer(BufferId::MAIN_OUT_JPEG, FULL, ImageFormat::Jpeg)
        .buffer(BufferId::MAIN_OUT_THUMBNAIL, Size::new(320, 240), ImageFormat::Yv12)
        .feature(FeatureId::NR)
        .build(&inference);
    let plan = inference.evaluate(&mut built.request).unwrap();
    let request = &built.request;

    for next in request.get_next_nodes(NodeId::ROOT).iter() {
        let path = request.path_between(NodeId::ROOT, next).unwrap();
        assert!(request.traverse(path));
    }

    let (done_tx, done_rx) = unbounded();
    std::thread::scope(|scope| {
        for node in plan.used_nodes.iter().filter(|n| !n.is_root()) {
            let done_tx = done_tx.clone();
            scope.spawn(move || {
                let view = request.node_request(node).unwrap();
                let deadline = Instant::now() + common::test_timeout();
                while !view.is_satisfied() {
                    assert!(Instant::now() < deadline, "{} never satisfied", node);
                    std::thread::yield_now();
                }

                for id in view.io().buffers() {
                    assert!(view.acquire_buffer(id).is_some(), "{} missing {}", node, id);
                }
                for id in view.io().metadata.iter() {
                    assert!(view.acquire_metadata(id).is_some(), "{} missing {}", node, id);
                }
                done_tx.send(node).unwrap();

                view.release_all();
                for next in request.get_next_nodes(node).iter() {
                    if let Some(path) = request.path_between(node, next) {
                        request.traverse(path);
                    }
                }
            });
        }
    });
    drop(done_tx);

    let order: Vec<NodeId> = done_rx.iter().collect();
    let position = |node: NodeId| order.iter().position(|n| *n == node).unwrap();
    assert_eq!(order.len(), plan.used_nodes.len() - 1);
    assert!(position(NodeId::P2A) < position(NodeId::FD));
    assert!(position(NodeId::FD) < position(NodeId::YUV));
    assert!(position(NodeId::YUV) < position(NodeId::MDP));
    assert!(request.is_finished());

    for (id, buffer) in &built.buffers {
        assert_eq!(buffer.acquire_count(), buffer.release_count(), "{}", id);
        assert!(buffer.release_count() <= 1, "{} released twice", id);
    }
    for (id, buffer) in allocator.buffers() {
        assert_eq!(buffer.release_count(), 1, "{}", id);
    }
    for (id, meta) in &built.metadata {
        assert_eq!(meta.acquire_count(), meta.release_count(), "{}", id);
    }
}

#[test]
fn test_slow_allocation_does_not_block_releases() {
    let (entered_tx, entered_rx) = unbounded();
    let (proceed_tx, proceed_rx) = unbounded();
    let allocator = Arc::new(GatedAllocator::new(entered_tx, proceed_rx));
    let raw = Arc::new(HeapBuffer::new(FULL, ImageFormat::Bayer10));
    let pipe = BufferId::pipe(0);

    let mut request =
        CaptureRequest::new(Arc::new(PathTable::stock())).with_allocator(allocator.clone());
    request.add_buffer(BufferId::MAIN_IN_FULL_RAW, raw.clone());
    request.add_pipe_buffer(pipe, TypeId::MAIN_FULL_YUV, FULL, ImageFormat::Yv12);
    let mut p2a = io(&[(TypeId::MAIN_FULL_RAW, BufferId::MAIN_IN_FULL_RAW)]);
    p2a.outputs.insert(TypeId::MAIN_FULL_YUV, pipe);
    request.add_node_io(NodeId::P2A, p2a);
    request.add_node_io(NodeId::MDP, io(&[(TypeId::MAIN_FULL_YUV, pipe)]));
    assert!(request.get_buffer(BufferId::MAIN_IN_FULL_RAW).is_some());

    let request = &request;
    std::thread::scope(|scope| {
        let first = scope.spawn(move || request.get_buffer(pipe).is_some());
        assert_eq!(entered_rx.recv_timeout(common::test_timeout()).unwrap(), pipe);
        let second = scope.spawn(move || request.get_buffer(pipe).is_some());

        // The allocator is parked; other buffers still release
        assert_eq!(
            request
                .dec_buffer_ref(NodeId::P2A, BufferId::MAIN_IN_FULL_RAW)
                .unwrap(),
            0
        );
        assert_eq!(raw.release_count(), 1);
        assert_eq!(request.buffer_ref_count(pipe), 2);

        proceed_tx.send(()).unwrap();
        assert!(first.join().unwrap());
        assert!(second.join().unwrap());
    });

    // The waiting caller got the first allocation
    let allocated = allocator.buffers();
    assert_eq!(allocated.len(), 1);
    assert_eq!(allocated[0].1.acquire_count(), 1);

    assert_eq!(request.dec_node_reference(NodeId::P2A), 1);
    assert_eq!(request.dec_node_reference(NodeId::MDP), 1);
    assert_eq!(allocated[0].1.release_count(), 1);
}

#[test]
fn test_repeating_variant_waits_on_base_node_paths() {
    let p2a_yuv = stock_path(NodeId::P2A, NodeId::YUV);
    let fd_yuv = stock_path(NodeId::FD, NodeId::YUV);
    let yuv_mdp = stock_path(NodeId::YUV, NodeId::MDP);

    let mut request = CaptureRequest::new(Arc::new(PathTable::stock()));
    for path in [p2a_yuv, fd_yuv, yuv_mdp] {
        request.add_path(path);
    }

    assert!(!request.is_satisfied(NodeId::YUV_R1));
    assert!(!request.is_satisfied(NodeId::YUV_R2));
    let producers: Vec<NodeId> = request.get_previous_nodes(NodeId::YUV_R1).iter().collect();
    assert_eq!(producers, vec![NodeId::P2A, NodeId::FD]);

    let path = request.path_between(NodeId::P2A, NodeId::YUV_R1).unwrap();
    assert_eq!(path, p2a_yuv);
    assert!(request.traverse(path));
    assert!(!request.is_satisfied(NodeId::YUV_R1));
    assert!(request.traverse(fd_yuv));
    assert!(request.is_satisfied(NodeId::YUV_R1));
    assert!(request.is_satisfied(NodeId::YUV_R2));
    assert!(request.is_satisfied(NodeId::YUV));

    // A variant producing for MDP completes the base node's edge
    assert_eq!(request.path_between(NodeId::YUV_R2, NodeId::MDP), Some(yuv_mdp));
    assert!(!request.is_satisfied(NodeId::MDP));
    assert!(request.traverse(yuv_mdp));
    assert!(request.is_satisfied(NodeId::MDP));
    assert!(request.is_finished());
}

proptest! {
    #[test]
    fn prop_reference_counts_are_exact(
        features in proptest::sample::subsequence(vec![FeatureId::NR, FeatureId::HDR], 0..=2),
        keys in proptest::collection::vec(any::<u32>(), 64),
        with_thumbnail in any::<bool>(),
    ) {
        let (inference, allocator) = tracking_inference();
        let mut builder = RequestBuilder::raw_capture(FULL)
            .buffer(BufferId::MAIN_OUT_JPEG, FULL, ImageFormat::Jpeg);
        if with_thumbnail {
            builder = builder.buffer(BufferId::MAIN_OUT_THUMBNAIL, Size::new(320, 240), ImageFormat::Yv12);
        }
        for feature in features {
            builder = builder.feature(feature);
        }
        let mut built = builder.build(&inference);
        inference.evaluate(&mut built.request).unwrap();
        let request = &built.request;

        let mut refs = bindings(request);
        for &(node, id) in &refs {
            prop_assert!(request.node_request(node).unwrap().acquire_buffer(id).is_some());
        }
        let total: u32 = {
            let mut ids: Vec<BufferId> = refs.iter().map(|(_, id)| *id).collect();
            ids.sort();
            ids.dedup();
            ids.iter().map(|id| request.buffer_ref_count(*id)).sum()
        };
        prop_assert_eq!(total as usize, refs.len());

        // Release in an arbitrary interleaving
        let mut order: Vec<usize> = (0..refs.len()).collect();
        order.sort_by_key(|&i| (keys[i % keys.len()], i));
        refs = order.into_iter().map(|i| refs[i]).collect();

        for (step, &(node, id)) in refs.iter().enumerate() {
            let remaining = request.node_request(node).unwrap().release_buffer(id).unwrap();
            let still_held = refs[step + 1..].iter().filter(|(_, other)| *other == id).count();
            prop_assert_eq!(remaining as usize, still_held);
        }

        for (id, buffer) in &built.buffers {
            prop_assert!(buffer.release_count() <= 1, "{} released twice", id);
            prop_assert_eq!(buffer.acquire_count(), buffer.release_count());
        }
        for (_, buffer) in allocator.buffers() {
            prop_assert_eq!(buffer.release_count(), 1);
        }
        for &(node, id) in &refs {
            prop_assert!(request.node_request(node).unwrap().release_buffer(id).is_err());
        }
    }
}
