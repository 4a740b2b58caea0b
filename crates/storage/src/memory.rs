use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{SessionStore, Slot, SlotWrite};

/// Process-local store. Clones share the same slots.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    slots: Arc<Mutex<BTreeMap<Slot, String>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn populated_slots(&self) -> Vec<Slot> {
        self.slots.lock().await.keys().copied().collect()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, slot: Slot) -> Result<Option<String>> {
        Ok(self.slots.lock().await.get(&slot).cloned())
    }

    async fn apply(&self, writes: &[SlotWrite]) -> Result<()> {
        let mut slots = self.slots.lock().await;
        for write in writes {
            match write {
                SlotWrite::Set { slot, payload } => {
                    slots.insert(*slot, payload.clone());
                }
                SlotWrite::Clear(slot) => {
                    slots.remove(slot);
                }
            }
        }
        Ok(())
    }
}
