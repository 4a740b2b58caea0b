use std::{collections::BTreeSet, fmt};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use shared::domain::{AreaEstimate, ConfirmedArea, Location, Scenario, SimulationResult};
use tracing::{debug, warn};

mod memory;
mod sqlite;

pub use memory::MemorySessionStore;
pub use sqlite::{SqliteSessionStore, Storage, StoredSessionSummary};

/// One named unit of persisted wizard state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Location,
    AreaEstimate,
    ConfirmedArea,
    Scenario,
    Result,
}

impl Slot {
    /// Pipeline order.
    pub const ALL: [Slot; 5] = [
        Slot::Location,
        Slot::AreaEstimate,
        Slot::ConfirmedArea,
        Slot::Scenario,
        Slot::Result,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Slot::Location => "rooftop.location",
            Slot::AreaEstimate => "rooftop.estimate",
            Slot::ConfirmedArea => "rooftop.confirmed_area",
            Slot::Scenario => "rooftop.scenario",
            Slot::Result => "rooftop.result",
        }
    }

    pub fn from_key(key: &str) -> Option<Slot> {
        Slot::ALL.into_iter().find(|slot| slot.key() == key)
    }

    /// Slots whose values are derived directly from this one.
    fn direct_dependents(self) -> &'static [Slot] {
        match self {
            Slot::Location => &[Slot::AreaEstimate, Slot::ConfirmedArea, Slot::Scenario],
            Slot::AreaEstimate => &[],
            Slot::ConfirmedArea => &[Slot::Result],
            Slot::Scenario => &[Slot::Result],
            Slot::Result => &[],
        }
    }

    /// Every slot invalidated when this one is overwritten, walked transitively.
    pub fn invalidates(self) -> BTreeSet<Slot> {
        let mut seen = BTreeSet::new();
        let mut pending = self.direct_dependents().to_vec();
        while let Some(slot) = pending.pop() {
            if seen.insert(slot) {
                pending.extend_from_slice(slot.direct_dependents());
            }
        }
        seen
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotWrite {
    Set { slot: Slot, payload: String },
    Clear(Slot),
}

impl SlotWrite {
    pub fn slot(&self) -> Slot {
        match self {
            SlotWrite::Set { slot, .. } => *slot,
            SlotWrite::Clear(slot) => *slot,
        }
    }
}

/// Durable key/value persistence for a single user session.
///
/// Payloads are opaque serialized text; `apply` must commit its whole batch or
/// nothing.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, slot: Slot) -> Result<Option<String>>;

    async fn apply(&self, writes: &[SlotWrite]) -> Result<()>;

    async fn set(&self, slot: Slot, payload: &str) -> Result<()> {
        self.apply(&[SlotWrite::Set {
            slot,
            payload: payload.to_string(),
        }])
        .await
    }

    async fn clear(&self, slot: Slot) -> Result<()> {
        self.apply(&[SlotWrite::Clear(slot)]).await
    }

    async fn clear_all(&self) -> Result<()> {
        let writes: Vec<SlotWrite> = Slot::ALL.into_iter().map(SlotWrite::Clear).collect();
        self.apply(&writes).await
    }
}

/// A domain value that lives in exactly one slot.
pub trait SlotValue: Serialize + DeserializeOwned + Send + Sync {
    const SLOT: Slot;
}

impl SlotValue for Location {
    const SLOT: Slot = Slot::Location;
}

impl SlotValue for AreaEstimate {
    const SLOT: Slot = Slot::AreaEstimate;
}

impl SlotValue for ConfirmedArea {
    const SLOT: Slot = Slot::ConfirmedArea;
}

impl SlotValue for Scenario {
    const SLOT: Slot = Slot::Scenario;
}

impl SlotValue for SimulationResult {
    const SLOT: Slot = Slot::Result;
}

/// Values to be committed together in one atomic write.
#[derive(Debug, Default)]
pub struct CommitBatch {
    sets: Vec<(Slot, String)>,
}

impl CommitBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: SlotValue>(mut self, value: &T) -> Result<Self> {
        let payload = serde_json::to_string(value)
            .with_context(|| format!("failed to serialize {}", T::SLOT))?;
        self.sets.retain(|(slot, _)| *slot != T::SLOT);
        self.sets.push((T::SLOT, payload));
        Ok(self)
    }

    pub fn slots(&self) -> Vec<Slot> {
        self.sets.iter().map(|(slot, _)| *slot).collect()
    }
}

/// Typed view over a [`SessionStore`] that enforces cascade invalidation.
pub struct Session<S> {
    store: S,
}

impl<S: SessionStore> Session<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reads a slot. Payloads that fail to decode read as absent.
    pub async fn load<T: SlotValue>(&self) -> Result<Option<T>> {
        let Some(raw) = self.store.get(T::SLOT).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<T>(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(slot = %T::SLOT, error = %err, "discarding corrupt session slot");
                Ok(None)
            }
        }
    }

    /// Whether the slot holds a value that decodes.
    pub async fn is_populated(&self, slot: Slot) -> Result<bool> {
        Ok(match slot {
            Slot::Location => self.load::<Location>().await?.is_some(),
            Slot::AreaEstimate => self.load::<AreaEstimate>().await?.is_some(),
            Slot::ConfirmedArea => self.load::<ConfirmedArea>().await?.is_some(),
            Slot::Scenario => self.load::<Scenario>().await?.is_some(),
            Slot::Result => self.load::<SimulationResult>().await?.is_some(),
        })
    }

    pub async fn commit<T: SlotValue>(&self, value: &T) -> Result<BTreeSet<Slot>> {
        self.commit_batch(CommitBatch::new().with(value)?).await
    }

    /// Writes every value in the batch and clears their downstream slots in a
    /// single store transaction. Returns the slots that were invalidated.
    ///
    /// A value identical to what is already stored does not invalidate
    /// anything.
    pub async fn commit_batch(&self, batch: CommitBatch) -> Result<BTreeSet<Slot>> {
        let mut invalidated = BTreeSet::new();
        for (slot, payload) in &batch.sets {
            let current = self.store.get(*slot).await?;
            if current.as_deref() == Some(payload.as_str()) {
                continue;
            }
            invalidated.extend(slot.invalidates());
        }
        for (slot, _) in &batch.sets {
            invalidated.remove(slot);
        }

        let mut writes: Vec<SlotWrite> =
            invalidated.iter().copied().map(SlotWrite::Clear).collect();
        writes.extend(
            batch
                .sets
                .into_iter()
                .map(|(slot, payload)| SlotWrite::Set { slot, payload }),
        );
        self.store.apply(&writes).await?;

        debug!(
            written = ?writes.iter().filter(|w| matches!(w, SlotWrite::Set { .. })).map(SlotWrite::slot).collect::<Vec<_>>(),
            invalidated = ?invalidated,
            "committed session slots"
        );
        Ok(invalidated)
    }

    /// Empties the whole session and stores `value` as its only slot, atomically.
    pub async fn restart_with<T: SlotValue>(&self, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)
            .with_context(|| format!("failed to serialize {}", T::SLOT))?;
        let mut writes: Vec<SlotWrite> = Slot::ALL
            .into_iter()
            .filter(|slot| *slot != T::SLOT)
            .map(SlotWrite::Clear)
            .collect();
        writes.push(SlotWrite::Set {
            slot: T::SLOT,
            payload,
        });
        self.store.apply(&writes).await
    }

    pub async fn clear(&self, slot: Slot) -> Result<()> {
        self.store.clear(slot).await
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.store.clear_all().await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
