//! In-memory element store, used for development and as the test double

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::application::ports::outbound::{QueueElementStorePort, StoreError, StoredElement};
use crate::domain::entities::QueueElement;
use crate::domain::value_objects::{ElementId, Revision};

#[derive(Default)]
pub struct MemoryElementStore {
    elements: RwLock<HashMap<ElementId, StoredElement>>,
}

impl MemoryElementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueElementStorePort for MemoryElementStore {
    async fn insert_batch(
        &self,
        elements: Vec<QueueElement>,
    ) -> Result<Vec<StoredElement>, StoreError> {
        let stored: Vec<StoredElement> = elements
            .into_iter()
            .map(|element| StoredElement {
                id: ElementId::new(),
                rev: Revision::initial(),
                element,
            })
            .collect();

        let mut map = self.elements.write().await;
        for item in &stored {
            map.insert(item.id, item.clone());
        }
        Ok(stored)
    }

    async fn list_by_workflow(
        &self,
        request_name: Option<&str>,
    ) -> Result<Vec<StoredElement>, StoreError> {
        let map = self.elements.read().await;
        let mut items: Vec<StoredElement> = map
            .values()
            .filter(|stored| request_name.map_or(true, |name| stored.element.request_name == name))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.element.created_at.cmp(&b.element.created_at));
        Ok(items)
    }

    async fn delete(&self, id: ElementId, rev: &Revision) -> Result<(), StoreError> {
        let mut map = self.elements.write().await;
        let current = map.get(&id).ok_or(StoreError::NotFound(id))?;
        if current.rev != *rev {
            return Err(StoreError::Conflict {
                id,
                current: current.rev.clone(),
            });
        }
        map.remove(&id);
        Ok(())
    }

    async fn count_workflows(&self) -> Result<usize, StoreError> {
        let map = self.elements.read().await;
        let names: HashSet<&str> = map
            .values()
            .map(|stored| stored.element.request_name.as_str())
            .collect();
        Ok(names.len())
    }
}
