//! The replicated federation document.
//!
//! A last-writer-wins map CRDT: instances merge whole-record, federated
//! pool metadata merges per field. Every write carries a [`Stamp`]
//! ordered by (timestamp, writer id), so merges are commutative,
//! associative, idempotent, and convergent without a coordinator.
//! The document is additive: entries are never deleted, only overridden.

use rdv_types::{FederatedPoolMetadata, InstanceId, InstanceRecord, PoolId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A write stamp. Total order: timestamp first, writer id as tie-break.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stamp {
    /// When the write happened, by the writer's clock.
    pub at: Timestamp,
    /// Who wrote. Breaks timestamp ties deterministically.
    pub writer: InstanceId,
}

/// Per-field stamps for a federated pool entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolClocks {
    /// Stamp of `name` and `description`.
    pub descriptive: Stamp,
    /// Stamp of `status`.
    pub status: Stamp,
    /// Stamp of the deadlines.
    pub deadlines: Stamp,
    /// Stamp of owner instance + owner key + invite flag.
    pub ownership: Stamp,
}

impl PoolClocks {
    fn all(stamp: Stamp) -> Self {
        Self {
            descriptive: stamp,
            status: stamp,
            deadlines: stamp,
            ownership: stamp,
        }
    }
}

/// A pool entry: metadata plus the stamps governing each field group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolEntry {
    /// Current merged metadata.
    pub meta: FederatedPoolMetadata,
    /// Field-group stamps.
    pub clocks: PoolClocks,
}

impl PoolEntry {
    /// Merge another replica's entry into this one, field group by field
    /// group. Returns true when anything changed.
    fn merge(&mut self, other: &PoolEntry) -> bool {
        let mut changed = false;
        if other.clocks.descriptive > self.clocks.descriptive {
            self.meta.name = other.meta.name.clone();
            self.meta.description = other.meta.description.clone();
            self.clocks.descriptive = other.clocks.descriptive;
            changed = true;
        }
        if other.clocks.status > self.clocks.status {
            self.meta.status = other.meta.status;
            self.clocks.status = other.clocks.status;
            changed = true;
        }
        if other.clocks.deadlines > self.clocks.deadlines {
            self.meta.commit_deadline = other.meta.commit_deadline;
            self.meta.reveal_deadline = other.meta.reveal_deadline;
            self.clocks.deadlines = other.clocks.deadlines;
            changed = true;
        }
        if other.clocks.ownership > self.clocks.ownership {
            self.meta.owner_instance = other.meta.owner_instance;
            self.meta.owner_key = other.meta.owner_key;
            self.meta.requires_invite = other.meta.requires_invite;
            self.clocks.ownership = other.clocks.ownership;
            changed = true;
        }
        changed
    }
}

/// An instance entry: whole-record LWW.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceEntry {
    /// The record.
    pub record: InstanceRecord,
    /// Its stamp.
    pub stamp: Stamp,
}

/// The replicated document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FederationDocument {
    /// Known instances.
    pub instances: BTreeMap<InstanceId, InstanceEntry>,
    /// Federated pool metadata.
    pub pools: BTreeMap<PoolId, PoolEntry>,
    /// Local mutation counter; merge takes the max.
    pub version: u64,
}

impl FederationDocument {
    /// An empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or refresh) an instance.
    pub fn upsert_instance(&mut self, record: InstanceRecord, at: Timestamp, writer: InstanceId) {
        let stamp = Stamp { at, writer };
        let entry = InstanceEntry { record, stamp };
        match self.instances.get_mut(&entry.record.id) {
            Some(existing) if existing.stamp >= stamp => {}
            Some(existing) => *existing = entry,
            None => {
                self.instances.insert(entry.record.id, entry);
            }
        }
        self.version += 1;
    }

    /// Record (or update) a federated pool. Only field groups whose
    /// values actually changed get the new stamp, so an edit to one
    /// field never shadows a concurrent remote edit to another.
    pub fn upsert_pool(&mut self, meta: FederatedPoolMetadata, at: Timestamp, writer: InstanceId) {
        let stamp = Stamp { at, writer };
        match self.pools.get_mut(&meta.pool_id) {
            Some(existing) => {
                if existing.meta.name != meta.name || existing.meta.description != meta.description
                {
                    existing.meta.name = meta.name;
                    existing.meta.description = meta.description;
                    existing.clocks.descriptive = stamp;
                }
                if existing.meta.status != meta.status {
                    existing.meta.status = meta.status;
                    existing.clocks.status = stamp;
                }
                if existing.meta.commit_deadline != meta.commit_deadline
                    || existing.meta.reveal_deadline != meta.reveal_deadline
                {
                    existing.meta.commit_deadline = meta.commit_deadline;
                    existing.meta.reveal_deadline = meta.reveal_deadline;
                    existing.clocks.deadlines = stamp;
                }
                if existing.meta.owner_instance != meta.owner_instance
                    || existing.meta.owner_key != meta.owner_key
                    || existing.meta.requires_invite != meta.requires_invite
                {
                    existing.meta.owner_instance = meta.owner_instance;
                    existing.meta.owner_key = meta.owner_key;
                    existing.meta.requires_invite = meta.requires_invite;
                    existing.clocks.ownership = stamp;
                }
            }
            None => {
                self.pools.insert(
                    meta.pool_id,
                    PoolEntry {
                        meta,
                        clocks: PoolClocks::all(stamp),
                    },
                );
            }
        }
        self.version += 1;
    }

    /// Merge a replica's document into this one. Returns true when
    /// anything changed locally.
    pub fn merge(&mut self, other: &FederationDocument) -> bool {
        let mut changed = false;
        for (id, theirs) in &other.instances {
            match self.instances.get_mut(id) {
                Some(mine) => {
                    if theirs.stamp > mine.stamp {
                        *mine = theirs.clone();
                        changed = true;
                    }
                }
                None => {
                    self.instances.insert(*id, theirs.clone());
                    changed = true;
                }
            }
        }
        for (id, theirs) in &other.pools {
            match self.pools.get_mut(id) {
                Some(mine) => changed |= mine.merge(theirs),
                None => {
                    self.pools.insert(*id, theirs.clone());
                    changed = true;
                }
            }
        }
        if other.version > self.version {
            self.version = other.version;
            changed = true;
        }
        changed
    }

    /// Metadata for one pool, if replicated.
    pub fn pool(&self, id: &PoolId) -> Option<&FederatedPoolMetadata> {
        self.pools.get(id).map(|entry| &entry.meta)
    }

    /// A known instance record.
    pub fn instance(&self, id: &InstanceId) -> Option<&InstanceRecord> {
        self.instances.get(id).map(|entry| &entry.record)
    }
}
