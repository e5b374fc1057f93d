//! Core image description types shared by the resolver and the request.
//!
//! # Main Types
//!
//! - [`Size`] - Image dimensions in pixels
//! - [`ImageFormat`] - Pixel layout of a buffer
//! - [`ImageTransform`] - Rotation/flip bits a client attaches to an output
//! - [`Direction`] - Whether a buffer is read or written by a node

use serde::{Deserialize, Serialize};
use std::fmt;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel layout of an image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageFormat {
    /// Not decided yet (resolved later by the producing node)
    #[default]
    Unknown,
    /// 10-bit packed bayer raw
    Bayer10,
    /// Local contrast statistics
    Stat,
    /// Planar 4:2:0
    Yv12,
    /// Semi-planar 4:2:0
    Nv21,
    /// Packed 4:2:2
    Yuy2,
    /// Y8 single plane (face detection input)
    Y8,
    /// Compressed JPEG blob
    Jpeg,
}

impl ImageFormat {
    /// Bits per pixel, used to size heap-allocated pipe buffers.
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            ImageFormat::Unknown => 0,
            ImageFormat::Bayer10 => 10,
            ImageFormat::Stat => 16,
            ImageFormat::Yv12 | ImageFormat::Nv21 => 12,
            ImageFormat::Yuy2 => 16,
            ImageFormat::Y8 => 8,
            ImageFormat::Jpeg => 8,
        }
    }

    /// Bytes needed to hold an image of `size` in this format.
    pub fn byte_len(self, size: Size) -> usize {
        ((size.area() * self.bits_per_pixel() as u64).div_ceil(8)) as usize
    }
}

/// Rotation/flip bits attached to a client output buffer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ImageTransform(pub u32);

impl ImageTransform {
    pub const NONE: ImageTransform = ImageTransform(0);
    pub const FLIP_H: ImageTransform = ImageTransform(0x01);
    pub const FLIP_V: ImageTransform = ImageTransform(0x02);
    pub const ROT_90: ImageTransform = ImageTransform(0x04);
    pub const ROT_180: ImageTransform = ImageTransform(0x03);
    pub const ROT_270: ImageTransform = ImageTransform(0x07);

    #[inline]
    pub fn contains(self, other: ImageTransform) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn is_identity(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for ImageTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageTransform(0x{:02X})", self.0)
    }
}

/// Whether a buffer is an input or an output of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Input,
    Output,
}
