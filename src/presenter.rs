//! Marker presentation
//!
//! The registry owns marker handles and delegates every visual change to a
//! [`MarkerPresenter`]. Handles are neither `Clone` nor `Copy` and are moved
//! into `remove`, so the registry cannot remove the same marker twice.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::models::Mmsi;
use crate::viewport::LonLat;

/// Everything needed to draw one vessel marker
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub mmsi: Mmsi,
    pub position: LonLat,
    /// Rotation in degrees, clockwise from north
    pub rotation: f64,
    /// Popup text shown when the marker is selected
    pub popup: String,
}

pub trait MarkerPresenter {
    type Handle;

    /// Create a marker, or move and re-render `existing` in place.
    fn upsert(&mut self, existing: Option<Self::Handle>, marker: &Marker) -> Self::Handle;

    /// Remove a marker from the map.
    fn remove(&mut self, handle: Self::Handle);
}

#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MarkerId(u64);

impl MarkerId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenterStats {
    pub created: usize,
    pub moved: usize,
    /// Markers actually taken off the map
    pub removed: usize,
    /// Every call to `remove`, including ones for markers no longer shown
    pub remove_calls: usize,
}

/// Presenter without a map widget: logs marker changes and keeps count.
#[derive(Debug, Default)]
pub struct HeadlessPresenter {
    next_id: u64,
    live: HashSet<u64>,
    stats: PresenterStats,
}

impl HeadlessPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_markers(&self) -> usize {
        self.live.len()
    }

    pub fn stats(&self) -> PresenterStats {
        self.stats
    }
}

impl MarkerPresenter for HeadlessPresenter {
    type Handle = MarkerId;

    fn upsert(&mut self, existing: Option<MarkerId>, marker: &Marker) -> MarkerId {
        match existing {
            Some(id) => {
                debug!(
                    "Moving marker for {} to ({:.4}, {:.4}), rotation {}",
                    marker.mmsi, marker.position.lon, marker.position.lat, marker.rotation
                );
                self.stats.moved += 1;
                id
            }
            None => {
                let id = MarkerId(self.next_id);
                self.next_id += 1;
                info!(
                    "Adding marker for {} at ({:.4}, {:.4})",
                    marker.mmsi, marker.position.lon, marker.position.lat
                );
                self.live.insert(id.0);
                self.stats.created += 1;
                id
            }
        }
    }

    fn remove(&mut self, handle: MarkerId) {
        self.stats.remove_calls += 1;
        if self.live.remove(&handle.0) {
            self.stats.removed += 1;
        } else {
            warn!("Removing unknown marker {}", handle.value());
        }
    }
}
