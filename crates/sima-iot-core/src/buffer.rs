//! Channel buffer manager: bounded, ordered history per channel plus a
//! merged flat log used for tabular views and export.
//!
//! Per-channel buffers trust their single producer to deliver readings in
//! timestamp order and are never re-sorted. The flat log re-sorts itself
//! when an insert arrives out of order.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{ChannelKind, Reading, ResourceId};

// ─── Config ─────────────────────────────────────────────────────────

/// Per-channel history length (about three minutes at one reading per second).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 180;

/// Flat log length across all channels.
pub const DEFAULT_FLAT_CAPACITY: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    pub channel_capacity: usize,
    pub flat_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            flat_capacity: DEFAULT_FLAT_CAPACITY,
        }
    }
}

impl BufferConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        if self.flat_capacity < self.channel_capacity {
            return Err(ConfigError::FlatCapacityTooSmall {
                flat: self.flat_capacity,
                channel: self.channel_capacity,
            });
        }
        Ok(())
    }
}

// ─── ChannelBuffer ──────────────────────────────────────────────────

/// Capacity-bounded FIFO of readings for one channel.
#[derive(Debug, Clone)]
pub struct ChannelBuffer {
    kind: ChannelKind,
    capacity: usize,
    readings: VecDeque<Reading>,
}

impl ChannelBuffer {
    /// # Panics
    ///
    /// Panics when `capacity` is zero. Configuration is validated before
    /// buffers are built, so reaching this is an internal bug.
    pub fn new(kind: ChannelKind, capacity: usize) -> Self {
        assert!(capacity > 0, "channel buffer capacity must be positive");
        Self {
            kind,
            capacity,
            readings: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a reading, evicting and returning the oldest one when full.
    pub fn push(&mut self, reading: Reading) -> Option<Reading> {
        self.readings.push_back(reading);
        if self.readings.len() > self.capacity {
            self.readings.pop_front()
        } else {
            None
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn last(&self) -> Option<&Reading> {
        self.readings.back()
    }

    /// Readings in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    /// Buffered values in arrival order.
    pub fn values(&self) -> Vec<f64> {
        self.readings.iter().map(|r| r.value).collect()
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }
}

// ─── BufferManager ──────────────────────────────────────────────────

/// Result of [`BufferManager::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted { evicted: bool },
    /// The reading's channel is disabled; nothing was stored.
    ChannelDisabled,
    /// The reading belongs to a different resource; nothing was stored.
    ForeignResource,
}

/// Owns one [`ChannelBuffer`] per channel kind and the merged flat log
/// for a single resource.
#[derive(Debug, Clone)]
pub struct BufferManager {
    resource_id: ResourceId,
    config: BufferConfig,
    enabled: BTreeSet<ChannelKind>,
    channels: BTreeMap<ChannelKind, ChannelBuffer>,
    flat: VecDeque<Reading>,
}

impl BufferManager {
    /// # Panics
    ///
    /// Panics when `config` has a zero capacity (see [`ChannelBuffer::new`]).
    pub fn new(
        resource_id: ResourceId,
        config: BufferConfig,
        enabled: impl IntoIterator<Item = ChannelKind>,
    ) -> Self {
        assert!(
            config.flat_capacity > 0,
            "flat log capacity must be positive"
        );
        let channels = ChannelKind::ALL
            .into_iter()
            .map(|k| (k, ChannelBuffer::new(k, config.channel_capacity)))
            .collect();
        Self {
            resource_id,
            config,
            enabled: enabled.into_iter().collect(),
            channels,
            flat: VecDeque::with_capacity(config.flat_capacity),
        }
    }

    /// Store a reading in its channel buffer and the flat log.
    pub fn push(&mut self, reading: Reading) -> PushOutcome {
        if reading.resource_id != self.resource_id {
            return PushOutcome::ForeignResource;
        }
        if !self.enabled.contains(&reading.channel) {
            return PushOutcome::ChannelDisabled;
        }

        let Some(buffer) = self.channels.get_mut(&reading.channel) else {
            return PushOutcome::ChannelDisabled;
        };
        let evicted = buffer.push(reading.clone()).is_some();
        self.push_flat(reading);

        PushOutcome::Accepted { evicted }
    }

    fn push_flat(&mut self, reading: Reading) {
        let out_of_order = self
            .flat
            .back()
            .is_some_and(|last| reading.timestamp_ms < last.timestamp_ms);
        self.flat.push_back(reading);
        if self.flat.len() > self.config.flat_capacity {
            self.flat.pop_front();
        }
        if out_of_order {
            // Stable: equal timestamps keep arrival order.
            self.flat
                .make_contiguous()
                .sort_by_key(|r| r.timestamp_ms);
        }
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    pub fn config(&self) -> BufferConfig {
        self.config
    }

    pub fn is_enabled(&self, kind: ChannelKind) -> bool {
        self.enabled.contains(&kind)
    }

    /// Enable or disable a channel. Existing history is kept either way.
    pub fn set_enabled(&mut self, kind: ChannelKind, enabled: bool) {
        if enabled {
            self.enabled.insert(kind);
        } else {
            self.enabled.remove(&kind);
        }
    }

    pub fn enabled(&self) -> &BTreeSet<ChannelKind> {
        &self.enabled
    }

    pub fn channel(&self, kind: ChannelKind) -> Option<&ChannelBuffer> {
        self.channels.get(&kind)
    }

    pub fn last_value(&self, kind: ChannelKind) -> Option<f64> {
        self.channel(kind).and_then(ChannelBuffer::last).map(|r| r.value)
    }

    /// Flat log, oldest first.
    pub fn flat_log(&self) -> impl Iterator<Item = &Reading> {
        self.flat.iter()
    }

    pub fn flat_len(&self) -> usize {
        self.flat.len()
    }

    /// Up to `limit` flat-log readings, newest first.
    pub fn recent(&self, limit: usize) -> Vec<&Reading> {
        self.flat.iter().rev().take(limit).collect()
    }

    /// Drop all history, keeping the resource and enabled set.
    pub fn clear(&mut self) {
        for buffer in self.channels.values_mut() {
            buffer.clear();
        }
        self.flat.clear();
    }

    /// Drop all history and rebind to another resource.
    pub fn reset(&mut self, resource_id: ResourceId) {
        self.clear();
        self.resource_id = resource_id;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
