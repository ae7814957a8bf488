use crate::engine::entity::LocalExtent;
use crate::error::{EngineError, Result};
use bevy::math::Mat4;
use constants::picking::{FIRST_PICK_ID, HOVER_CORNER_ID, HOVER_MESH_ID, HOVER_OUTLINE_ID, MAX_PICK_ID};
use std::collections::{BTreeMap, BTreeSet};

/// Flat pick color of an id, big endian.
pub fn id_to_rgb(id: u32) -> [u8; 3] {
    [(id >> 16) as u8, (id >> 8) as u8, id as u8]
}

pub fn rgb_to_id(rgb: [u8; 3]) -> u32 {
    (rgb[0] as u32) << 16 | (rgb[1] as u32) << 8 | rgb[2] as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickShape {
    Solid,
    Outline,
    Corners,
}

/// Geometry drawn into the pick target with the flat color of `id`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickPrimitive {
    pub id: u32,
    pub shape: PickShape,
    pub world: Mat4,
    pub extent: LocalExtent,
}

/// Solid copies of every pickable entity, keyed by pick id.
///
/// Removing a solid keeps its id reserved so the entity can come back with the same color.
#[derive(Debug, Clone)]
pub struct PickScene {
    solids: BTreeMap<u32, PickPrimitive>,
    reserved: BTreeSet<u32>,
    next_id: u32,
}

impl Default for PickScene {
    fn default() -> Self {
        Self {
            solids: BTreeMap::new(),
            reserved: BTreeSet::new(),
            next_id: FIRST_PICK_ID,
        }
    }
}

impl PickScene {
    pub fn allocate(&mut self) -> Result<u32> {
        if self.next_id > MAX_PICK_ID {
            return Err(EngineError::PickIdsExhausted);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.reserved.insert(id);
        Ok(id)
    }

    /// Insert or move the solid for a reserved id.
    pub fn insert(&mut self, id: u32, world: Mat4, extent: LocalExtent) {
        if !self.reserved.contains(&id) {
            return;
        }
        self.solids.insert(
            id,
            PickPrimitive {
                id,
                shape: PickShape::Solid,
                world,
                extent,
            },
        );
    }

    pub fn remove(&mut self, id: u32) -> bool {
        self.solids.remove(&id).is_some()
    }

    /// Drop the solid and give up the id.
    pub fn release(&mut self, id: u32) {
        self.solids.remove(&id);
        self.reserved.remove(&id);
    }

    pub fn contains(&self, id: u32) -> bool {
        self.solids.contains_key(&id)
    }

    pub fn is_reserved(&self, id: u32) -> bool {
        self.reserved.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.solids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solids.is_empty()
    }

    pub fn primitives(&self) -> Vec<PickPrimitive> {
        self.solids.values().copied().collect()
    }

    pub fn clear(&mut self) {
        self.solids.clear();
        self.reserved.clear();
        self.next_id = FIRST_PICK_ID;
    }
}

/// Part of the active entity under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HoverTarget {
    Mesh,
    Outline,
    Corner,
}

impl HoverTarget {
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            HOVER_MESH_ID => Some(Self::Mesh),
            HOVER_OUTLINE_ID => Some(Self::Outline),
            HOVER_CORNER_ID => Some(Self::Corner),
            _ => None,
        }
    }
}

/// Mirror of the active entity only, tagged with the fixed sentinel ids.
#[derive(Debug, Clone, Default)]
pub struct HoverPickScene {
    mirrored: Option<(Mat4, LocalExtent)>,
}

impl HoverPickScene {
    pub fn mirror(&mut self, world: Mat4, extent: LocalExtent) {
        self.mirrored = Some((world, extent));
    }

    pub fn clear(&mut self) {
        self.mirrored = None;
    }

    pub fn is_empty(&self) -> bool {
        self.mirrored.is_none()
    }

    pub fn primitives(&self) -> Vec<PickPrimitive> {
        let Some((world, extent)) = self.mirrored else {
            return Vec::new();
        };
        [
            (HOVER_MESH_ID, PickShape::Solid),
            (HOVER_OUTLINE_ID, PickShape::Outline),
            (HOVER_CORNER_ID, PickShape::Corners),
        ]
        .into_iter()
        .map(|(id, shape)| PickPrimitive {
            id,
            shape,
            world,
            extent,
        })
        .collect()
    }
}
