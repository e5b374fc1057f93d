//! Bounded, index-addressed store of inferred data items.
//!
//! Indices are handed out in append order and stay valid for the whole
//! resolution; nothing is removed or reused. `redirect` links always point to
//! an earlier index, so following them terminates.

use crate::error::{ResolverError, Result};
use crate::pipeline::id::{BufferId, NodeId, SizeId, TypeId};
use crate::pipeline::id_set::{FeatureSet, NodeSet};
use crate::types::{ImageFormat, Size};
use std::collections::BTreeMap;

/// Index of a [`DataItem`] in its arena.
pub type ItemIndex = usize;

/// One inferred unit of pipeline data.
#[derive(Debug, Clone)]
pub struct DataItem {
    pub owner: NodeId,
    pub type_id: TypeId,
    /// `None` until bound as a target or resolved by `determine`.
    pub buffer: Option<BufferId>,
    pub format: ImageFormat,
    pub size: Size,
    pub size_id: SizeId,
    pub features: FeatureSet,
    pub consumers: NodeSet,
    /// Earlier item whose buffer this one reuses (in-place output).
    pub redirect: Option<ItemIndex>,
}

impl DataItem {
    pub fn new(owner: NodeId, type_id: TypeId) -> Self {
        Self {
            owner,
            type_id,
            buffer: None,
            format: ImageFormat::Unknown,
            size: Size::default(),
            size_id: SizeId::Full,
            features: FeatureSet::new(),
            consumers: NodeSet::new(),
            redirect: None,
        }
    }

    #[inline]
    pub fn is_consumed(&self) -> bool {
        !self.consumers.is_empty()
    }
}

/// Append-only data item store with a fixed capacity.
#[derive(Debug)]
pub struct DataArena {
    items: Vec<DataItem>,
    capacity: usize,
    /// Latest producer per type, as seen by later lookups.
    latest: BTreeMap<TypeId, ItemIndex>,
}

impl DataArena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            latest: BTreeMap::new(),
        }
    }

    /// Append an item and make it the latest producer of its type.
    pub fn add_data_item(&mut self, item: DataItem) -> Result<ItemIndex> {
        if self.items.len() >= self.capacity {
            tracing::error!(
                "Data item arena full ({}) adding {} from {}",
                self.capacity,
                item.type_id,
                item.owner
            );
            return Err(ResolverError::ArenaFull {
                capacity: self.capacity,
            });
        }

        if let Some(redirect) = item.redirect {
            debug_assert!(redirect < self.items.len(), "redirect must point backwards");
        }

        let index = self.items.len();
        self.latest.insert(item.type_id, index);
        self.items.push(item);
        Ok(index)
    }

    /// Latest item of `type_id`, if any was produced so far.
    #[inline]
    pub fn latest(&self, type_id: TypeId) -> Option<ItemIndex> {
        self.latest.get(&type_id).copied()
    }

    #[inline]
    pub fn has_type(&self, type_id: TypeId) -> bool {
        self.latest.contains_key(&type_id)
    }

    /// Size of the latest item of `type_id` (empty when there is none).
    pub fn get_size(&self, type_id: TypeId) -> Size {
        self.latest(type_id)
            .map(|idx| self.items[idx].size)
            .unwrap_or_default()
    }

    /// Follow `redirect` links from `index` to the item that owns the storage.
    pub fn resolve_redirect(&self, mut index: ItemIndex) -> ItemIndex {
        while let Some(next) = self.items[index].redirect {
            index = next;
        }
        index
    }

    #[inline]
    pub fn get(&self, index: ItemIndex) -> Option<&DataItem> {
        self.items.get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: ItemIndex) -> Option<&mut DataItem> {
        self.items.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemIndex, &DataItem)> {
        self.items.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(owner: NodeId, type_id: TypeId, size: Size) -> DataItem {
        DataItem {
            size,
            ..DataItem::new(owner, type_id)
        }
    }

    #[test]
    fn test_latest_supersedes() {
        let mut arena = DataArena::with_capacity(4);
        let first = arena
            .add_data_item(item(NodeId::ROOT, TypeId::MAIN_FULL_YUV, Size::new(8, 8)))
            .unwrap();
        assert_eq!(arena.latest(TypeId::MAIN_FULL_YUV), Some(first));

        let second = arena
            .add_data_item(item(NodeId::P2A, TypeId::MAIN_FULL_YUV, Size::new(4, 4)))
            .unwrap();
        assert_eq!(arena.latest(TypeId::MAIN_FULL_YUV), Some(second));
        assert_eq!(arena.get_size(TypeId::MAIN_FULL_YUV), Size::new(4, 4));
        // The superseded item is still addressable
        assert_eq!(arena.get(first).unwrap().owner, NodeId::ROOT);
    }

    #[test]
    fn test_missing_type() {
        let arena = DataArena::with_capacity(1);
        assert!(!arena.has_type(TypeId::JPEG));
        assert_eq!(arena.get_size(TypeId::JPEG), Size::default());
    }

    #[test]
    fn test_capacity_exhaustion() {
        let mut arena = DataArena::with_capacity(1);
        arena
            .add_data_item(DataItem::new(NodeId::ROOT, TypeId::MAIN_FULL_RAW))
            .unwrap();
        let err = arena
            .add_data_item(DataItem::new(NodeId::P2A, TypeId::MAIN_FULL_YUV))
            .unwrap_err();
        assert!(matches!(err, ResolverError::ArenaFull { capacity: 1 }));
        assert_eq!(arena.len(), 1);
        assert!(!arena.has_type(TypeId::MAIN_FULL_YUV));
    }

    #[test]
    fn test_redirect_chain_resolves_to_root() {
        let mut arena = DataArena::with_capacity(4);
        let a = arena
            .add_data_item(DataItem::new(NodeId::ROOT, TypeId::MAIN_FULL_YUV))
            .unwrap();
        let b = arena
            .add_data_item(DataItem {
                redirect: Some(a),
                ..DataItem::new(NodeId::YUV, TypeId::MAIN_FULL_YUV)
            })
            .unwrap();
        let c = arena
            .add_data_item(DataItem {
                redirect: Some(b),
                ..DataItem::new(NodeId::YUV2, TypeId::MAIN_FULL_YUV)
            })
            .unwrap();
        assert_eq!(arena.resolve_redirect(c), a);
        assert_eq!(arena.resolve_redirect(a), a);
    }
}
