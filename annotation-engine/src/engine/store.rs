use super::entity::BoxEntity;

/// Entities in insertion order.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    entities: Vec<BoxEntity>,
}

impl EntityStore {
    pub fn insert(&mut self, entity: BoxEntity) {
        self.entities.push(entity);
    }

    pub fn get(&self, name: &str) -> Option<&BoxEntity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut BoxEntity> {
        self.entities.iter_mut().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn by_pick_id(&self, pick_id: u32) -> Option<&BoxEntity> {
        self.entities.iter().find(|e| e.pick_id == pick_id)
    }

    pub fn remove(&mut self, name: &str) -> Option<BoxEntity> {
        let index = self.entities.iter().position(|e| e.name == name)?;
        Some(self.entities.remove(index))
    }

    pub fn as_slice(&self) -> &[BoxEntity] {
        &self.entities
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, BoxEntity> {
        self.entities.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
