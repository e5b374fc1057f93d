//! Identity types for the resolver.
//!
//! Node, type, feature, metadata and path ids are newtypes over `u8` that
//! double as bit positions in [`IdSet`](crate::pipeline::id_set::IdSet), so
//! every id space is capped at 64 entries. Iterating a set therefore always
//! visits ids in ascending order, which is also the node evaluation order.
//!
//! Buffer ids are `u32`: client buffers use a small fixed range, pipe buffers
//! set [`BufferId::PIPE_TAG`] and carry a per-request counter.

use crate::error::ResolverError;
use crate::types::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound (exclusive) for every `u8` id space.
pub const MAX_IDS: u8 = 64;

/// Declares the stock constants of an id newtype together with their names,
/// and derives `Display`, `Debug` and `FromStr` from that table.
macro_rules! named_ids {
    ($ty:ident, $kind:literal, { $($konst:ident = $val:literal => $label:literal),* $(,)? }) => {
        impl $ty {
            $(pub const $konst: $ty = $ty($val);)*

            const NAMES: &'static [($ty, &'static str)] = &[$(($ty($val), $label)),*];

            /// Stock name, if this id is one of the predefined constants.
            pub fn name(self) -> Option<&'static str> {
                Self::NAMES
                    .iter()
                    .find(|(id, _)| *id == self)
                    .map(|(_, name)| *name)
            }

            /// All predefined ids in ascending order.
            pub fn all() -> impl Iterator<Item = $ty> {
                Self::NAMES.iter().map(|(id, _)| *id)
            }

            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            /// True when the id fits a bit of an `IdSet`.
            #[inline]
            pub const fn is_valid(self) -> bool {
                self.0 < MAX_IDS
            }

            /// The id itself, or `IdOutOfRange` past the id space.
            pub fn check(self) -> Result<Self, ResolverError> {
                if self.is_valid() {
                    Ok(self)
                } else {
                    Err(ResolverError::IdOutOfRange {
                        kind: $kind,
                        id: self.0,
                    })
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.name() {
                    Some(name) => f.write_str(name),
                    None => write!(f, concat!($kind, "#{}"), self.0),
                }
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($ty), "({})"), self)
            }
        }

        impl FromStr for $ty {
            type Err = ResolverError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if let Some((id, _)) = Self::NAMES.iter().find(|(_, name)| *name == s) {
                    return Ok(*id);
                }
                // Unnamed ids round-trip through their `kind#N` display form
                s.strip_prefix(concat!($kind, "#"))
                    .and_then(|n| n.parse::<u8>().ok())
                    .filter(|n| *n < MAX_IDS)
                    .map($ty)
                    .ok_or_else(|| ResolverError::UnknownName {
                        kind: $kind,
                        name: s.to_string(),
                    })
            }
        }
    };
}

/// Pipeline stage. [`NodeId::ROOT`] stands for the outside world: it owns
/// client inputs and consumes client outputs.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct NodeId(pub u8);

named_ids!(NodeId, "node", {
    ROOT = 0 => "root",
    RAW = 1 => "raw",
    P2A = 2 => "p2a",
    FD = 3 => "fd",
    MULTIFRAME = 4 => "multiframe",
    FUSION = 5 => "fusion",
    DEPTH = 6 => "depth",
    YUV = 7 => "yuv",
    YUV_R1 = 8 => "yuv_r1",
    YUV_R2 = 9 => "yuv_r2",
    YUV2 = 10 => "yuv2",
    YUV2_R1 = 11 => "yuv2_r1",
    YUV2_R2 = 12 => "yuv2_r2",
    BOKEH = 13 => "bokeh",
    MDP = 14 => "mdp",
});

impl NodeId {
    #[inline]
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

/// Semantic kind of data flowing between nodes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u8);

named_ids!(TypeId, "type", {
    MAIN_FULL_RAW = 0 => "man_full_raw",
    MAIN_FULL_YUV = 1 => "man_full_yuv",
    MAIN_RSZ_RAW = 2 => "man_rsz_raw",
    MAIN_RSZ_YUV = 3 => "man_rsz_yuv",
    MAIN_CROP1_YUV = 4 => "man_crop1_yuv",
    MAIN_CROP2_YUV = 5 => "man_crop2_yuv",
    MAIN_SPEC_YUV = 6 => "man_spec_yuv",
    MAIN_DEPTH = 7 => "man_depth",
    MAIN_LCS = 8 => "man_lcs",
    MAIN_FD_YUV = 9 => "man_fd_yuv",
    MAIN_FD = 10 => "man_fd",
    SUB_FULL_RAW = 11 => "sub_full_raw",
    SUB_FULL_YUV = 12 => "sub_full_yuv",
    SUB_RSZ_RAW = 13 => "sub_rsz_raw",
    SUB_RSZ_YUV = 14 => "sub_rsz_yuv",
    SUB_LCS = 15 => "sub_lcs",
    POSTVIEW = 16 => "postview",
    JPEG = 17 => "jpeg",
    THUMBNAIL = 18 => "thumbnail",
});

/// Optional processing a request can ask for. Bit position in a feature set.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureId(pub u8);

named_ids!(FeatureId, "feature", {
    REMOSAIC = 0 => "remosaic",
    NR = 1 => "nr",
    ABF = 2 => "abf",
    HDR = 3 => "hdr",
    MFNR = 4 => "mfnr",
    FB = 5 => "fb",
    BOKEH = 6 => "bokeh",
    DEPTH = 7 => "depth",
    FUSION = 8 => "fusion",
    CZ = 9 => "cz",
    DRE = 10 => "dre",
    FB_3RD_PARTY = 11 => "fb_3rd_party",
    HDR_3RD_PARTY = 12 => "hdr_3rd_party",
    HDR2_3RD_PARTY = 13 => "hdr2_3rd_party",
    MFNR_3RD_PARTY = 14 => "mfnr_3rd_party",
    BOKEH_3RD_PARTY = 15 => "bokeh_3rd_party",
    DEPTH_3RD_PARTY = 16 => "depth_3rd_party",
    FUSION_3RD_PARTY = 17 => "fusion_3rd_party",
});

/// Metadata handle identifier (separate namespace from buffers).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetadataId(pub u8);

named_ids!(MetadataId, "metadata", {
    MAIN_IN_P1_DYNAMIC = 0 => "main_in_p1_dynamic",
    MAIN_IN_APP = 1 => "main_in_app",
    MAIN_IN_HAL = 2 => "main_in_hal",
    MAIN_OUT_APP = 3 => "main_out_app",
    MAIN_OUT_HAL = 4 => "main_out_hal",
    SUB_IN_P1_DYNAMIC = 5 => "sub_in_p1_dynamic",
    SUB_IN_HAL = 6 => "sub_in_hal",
});

/// One directed edge of the path table. Names live in the table itself.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathId(pub u8);

impl PathId {
    /// Reserved root-to-root path used when a request enters the pipe.
    pub const ENQUE: PathId = PathId(0);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathId({})", self.0)
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "path#{}", self.0)
    }
}

/// Size class a node declares for an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SizeId {
    #[default]
    Full,
    Resized,
    Binning,
    Arbitrary,
    Specific,
}

impl fmt::Display for SizeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SizeId::Full => "full",
            SizeId::Resized => "resized",
            SizeId::Binning => "binning",
            SizeId::Arbitrary => "arbitrary",
            SizeId::Specific => "specific",
        };
        f.write_str(name)
    }
}

/// Role of a client buffer: which way it flows and what it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientRole {
    pub direction: Direction,
    pub type_id: TypeId,
}

/// Buffer identifier: a client buffer or an internally allocated pipe buffer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BufferId(pub u32);

impl BufferId {
    /// Reserved bit marking pipe buffers.
    pub const PIPE_TAG: u32 = 1 << 31;

    pub const MAIN_IN_FULL_RAW: BufferId = BufferId(0);
    pub const MAIN_IN_RSZ_RAW: BufferId = BufferId(1);
    pub const MAIN_IN_LCS: BufferId = BufferId(2);
    pub const MAIN_IN_FULL_YUV: BufferId = BufferId(3);
    pub const SUB_IN_FULL_RAW: BufferId = BufferId(4);
    pub const SUB_IN_RSZ_RAW: BufferId = BufferId(5);
    pub const SUB_IN_LCS: BufferId = BufferId(6);
    pub const MAIN_OUT_JPEG: BufferId = BufferId(7);
    pub const MAIN_OUT_THUMBNAIL: BufferId = BufferId(8);
    pub const MAIN_OUT_POSTVIEW: BufferId = BufferId(9);
    pub const MAIN_OUT_YUV00: BufferId = BufferId(10);
    pub const MAIN_OUT_YUV01: BufferId = BufferId(11);
    pub const MAIN_OUT_DEPTH: BufferId = BufferId(12);

    const CLIENT: &'static [(BufferId, &'static str, Direction, TypeId)] = &[
        (Self::MAIN_IN_FULL_RAW, "main_in_full_raw", Direction::Input, TypeId::MAIN_FULL_RAW),
        (Self::MAIN_IN_RSZ_RAW, "main_in_rsz_raw", Direction::Input, TypeId::MAIN_RSZ_RAW),
        (Self::MAIN_IN_LCS, "main_in_lcs", Direction::Input, TypeId::MAIN_LCS),
        (Self::MAIN_IN_FULL_YUV, "main_in_full_yuv", Direction::Input, TypeId::MAIN_FULL_YUV),
        (Self::SUB_IN_FULL_RAW, "sub_in_full_raw", Direction::Input, TypeId::SUB_FULL_RAW),
        (Self::SUB_IN_RSZ_RAW, "sub_in_rsz_raw", Direction::Input, TypeId::SUB_RSZ_RAW),
        (Self::SUB_IN_LCS, "sub_in_lcs", Direction::Input, TypeId::SUB_LCS),
        (Self::MAIN_OUT_JPEG, "main_out_jpeg", Direction::Output, TypeId::JPEG),
        (Self::MAIN_OUT_THUMBNAIL, "main_out_thumbnail", Direction::Output, TypeId::THUMBNAIL),
        (Self::MAIN_OUT_POSTVIEW, "main_out_postview", Direction::Output, TypeId::POSTVIEW),
        (Self::MAIN_OUT_YUV00, "main_out_yuv00", Direction::Output, TypeId::MAIN_CROP1_YUV),
        (Self::MAIN_OUT_YUV01, "main_out_yuv01", Direction::Output, TypeId::MAIN_CROP2_YUV),
        (Self::MAIN_OUT_DEPTH, "main_out_depth", Direction::Output, TypeId::MAIN_DEPTH),
    ];

    /// Pipe buffer with the given per-request sequence number.
    #[inline]
    pub fn pipe(seq: u32) -> Self {
        debug_assert!(seq < Self::PIPE_TAG);
        BufferId(Self::PIPE_TAG | seq)
    }

    #[inline]
    pub fn is_pipe(self) -> bool {
        self.0 & Self::PIPE_TAG != 0
    }

    /// Direction and data type of a well-known client buffer.
    pub fn client_role(self) -> Option<ClientRole> {
        Self::CLIENT
            .iter()
            .find(|(id, ..)| *id == self)
            .map(|(_, _, direction, type_id)| ClientRole {
                direction: *direction,
                type_id: *type_id,
            })
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pipe() {
            return write!(f, "pipe#{}", self.0 & !Self::PIPE_TAG);
        }
        match Self::CLIENT.iter().find(|(id, ..)| id == self) {
            Some((_, name, ..)) => f.write_str(name),
            None => write!(f, "buffer#{}", self.0),
        }
    }
}

impl fmt::Debug for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferId({})", self)
    }
}
