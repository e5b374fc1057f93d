//! Handle traits for the buffers and metadata a request hands to nodes.
//!
//! The request never touches pixel or metadata contents. It only decides when
//! a handle is acquired (first use) and when it is released (last reference
//! dropped). Concrete handles come from the client or from a
//! [`BufferAllocator`] for pipe buffers.

use crate::error::{ResolverError, Result};
use crate::pipeline::id::{BufferId, TypeId};
use crate::types::{ImageFormat, ImageTransform, Size};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An image buffer supplied by the client or allocated for a pipe.
pub trait BufferHandle: Send + Sync {
    /// Make the buffer usable. Called at most once per request entry.
    fn acquire(&self) -> Result<()>;

    /// Give the buffer back. Called exactly once, after the last reference.
    fn release(&self);

    fn size(&self) -> Size;

    fn format(&self) -> ImageFormat;

    /// Rotation/flip requested for this output.
    fn transform(&self) -> ImageTransform {
        ImageTransform::NONE
    }
}

/// A metadata block supplied by the client.
pub trait MetadataHandle: Send + Sync {
    fn acquire(&self) -> Result<()>;

    fn release(&self);
}

/// Creates handles for pipe buffers on first use.
pub trait BufferAllocator: Send + Sync {
    fn allocate(
        &self,
        id: BufferId,
        type_id: TypeId,
        size: Size,
        format: ImageFormat,
    ) -> Result<Arc<dyn BufferHandle>>;
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Heap-backed image buffer. Memory exists between acquire and release.
pub struct HeapBuffer {
    size: Size,
    format: ImageFormat,
    transform: ImageTransform,
    data: Mutex<Option<Vec<u8>>>,
    acquire_count: AtomicU32,
    release_count: AtomicU32,
}

impl HeapBuffer {
    pub fn new(size: Size, format: ImageFormat) -> Self {
        Self {
            size,
            format,
            transform: ImageTransform::NONE,
            data: Mutex::new(None),
            acquire_count: AtomicU32::new(0),
            release_count: AtomicU32::new(0),
        }
    }

    pub fn with_transform(mut self, transform: ImageTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Run `f` over the pixel bytes; `None` when the buffer is not acquired.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        lock(&self.data).as_mut().map(|bytes| f(bytes))
    }

    pub fn is_mapped(&self) -> bool {
        lock(&self.data).is_some()
    }

    pub fn acquire_count(&self) -> u32 {
        self.acquire_count.load(Ordering::Acquire)
    }

    pub fn release_count(&self) -> u32 {
        self.release_count.load(Ordering::Acquire)
    }
}

impl BufferHandle for HeapBuffer {
    fn acquire(&self) -> Result<()> {
        let len = self.format.byte_len(self.size);
        let mut data = lock(&self.data);
        if data.is_none() {
            *data = Some(vec![0; len]);
        }
        self.acquire_count.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn release(&self) {
        lock(&self.data).take();
        self.release_count.fetch_add(1, Ordering::AcqRel);
    }

    fn size(&self) -> Size {
        self.size
    }

    fn format(&self) -> ImageFormat {
        self.format
    }

    fn transform(&self) -> ImageTransform {
        self.transform
    }
}

/// Allocates [`HeapBuffer`]s for pipe buffers.
#[derive(Debug, Default)]
pub struct HeapAllocator {
    allocated: AtomicU32,
}

impl HeapAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pipe buffers allocated so far.
    pub fn allocated(&self) -> u32 {
        self.allocated.load(Ordering::Acquire)
    }
}

impl BufferAllocator for HeapAllocator {
    fn allocate(
        &self,
        id: BufferId,
        type_id: TypeId,
        size: Size,
        format: ImageFormat,
    ) -> Result<Arc<dyn BufferHandle>> {
        if size.is_empty() {
            return Err(ResolverError::Config(format!(
                "cannot allocate {} ({}) with empty size",
                id, type_id
            )));
        }
        self.allocated.fetch_add(1, Ordering::AcqRel);
        tracing::trace!("Allocating {} for {} ({}, {:?})", id, type_id, size, format);
        Ok(Arc::new(HeapBuffer::new(size, format)))
    }
}

/// Simple key/value metadata block.
#[derive(Default)]
pub struct MetadataBlock {
    entries: Mutex<BTreeMap<String, i64>>,
    acquire_count: AtomicU32,
    release_count: AtomicU32,
}

impl MetadataBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, key: impl Into<String>, value: i64) -> Self {
        lock(&self.entries).insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        lock(&self.entries).get(key).copied()
    }

    pub fn set(&self, key: impl Into<String>, value: i64) {
        lock(&self.entries).insert(key.into(), value);
    }

    pub fn acquire_count(&self) -> u32 {
        self.acquire_count.load(Ordering::Acquire)
    }

    pub fn release_count(&self) -> u32 {
        self.release_count.load(Ordering::Acquire)
    }
}

impl MetadataHandle for MetadataBlock {
    fn acquire(&self) -> Result<()> {
        self.acquire_count.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn release(&self) {
        self.release_count.fetch_add(1, Ordering::AcqRel);
    }
}
