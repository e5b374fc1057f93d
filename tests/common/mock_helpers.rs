//! Mock construction helpers

use capture_resolver::pipeline::{
    BufferAllocator, BufferHandle, BufferId, HeapBuffer, MetadataHandle, TypeId,
};
use capture_resolver::types::{ImageFormat, ImageTransform, Size};
use capture_resolver::Result;
use crossbeam_channel::{Receiver, Sender};
use mockall::mock;
use std::sync::{Arc, Mutex};

mock! {
    pub Buffer {}

    impl BufferHandle for Buffer {
        fn acquire(&self) -> Result<()>;
        fn release(&self);
        fn size(&self) -> Size;
        fn format(&self) -> ImageFormat;
        fn transform(&self) -> ImageTransform;
    }
}

mock! {
    pub Metadata {}

    impl MetadataHandle for Metadata {
        fn acquire(&self) -> Result<()>;
        fn release(&self);
    }
}

/// Buffer mock that must be acquired once and released once
pub fn strict_buffer(size: Size, format: ImageFormat) -> MockBuffer {
    let mut mock = MockBuffer::new();
    mock.expect_size().return_const(size);
    mock.expect_format().return_const(format);
    mock.expect_transform().return_const(ImageTransform::NONE);
    mock.expect_acquire().times(1).returning(|| Ok(()));
    mock.expect_release().times(1).return_const(());
    mock
}

/// Allocator that keeps every pipe buffer it hands out
#[derive(Default)]
pub struct TrackingAllocator {
    buffers: Mutex<Vec<(BufferId, Arc<HeapBuffer>)>>,
}

impl TrackingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffers(&self) -> Vec<(BufferId, Arc<HeapBuffer>)> {
        self.buffers.lock().unwrap().clone()
    }
}

impl BufferAllocator for TrackingAllocator {
    fn allocate(
        &self,
        id: BufferId,
        _type_id: TypeId,
        size: Size,
        format: ImageFormat,
    ) -> Result<Arc<dyn BufferHandle>> {
        let buffer = Arc::new(HeapBuffer::new(size, format));
        self.buffers.lock().unwrap().push((id, buffer.clone()));
        Ok(buffer)
    }
}

/// Allocator that announces each allocation and parks until released
pub struct GatedAllocator {
    inner: TrackingAllocator,
    entered: Sender<BufferId>,
    proceed: Receiver<()>,
}

impl GatedAllocator {
    pub fn new(entered: Sender<BufferId>, proceed: Receiver<()>) -> Self {
        Self {
            inner: TrackingAllocator::new(),
            entered,
            proceed,
        }
    }

    pub fn buffers(&self) -> Vec<(BufferId, Arc<HeapBuffer>)> {
        self.inner.buffers()
    }
}

impl BufferAllocator for GatedAllocator {
    fn allocate(
        &self,
        id: BufferId,
        type_id: TypeId,
        size: Size,
        format: ImageFormat,
    ) -> Result<Arc<dyn BufferHandle>> {
        let _ = self.entered.send(id);
        // A timeout lets a wrongly repeated allocation show up in the counts
        let _ = self.proceed.recv_timeout(super::test_timeout());
        self.inner.allocate(id, type_id, size, format)
    }
}
