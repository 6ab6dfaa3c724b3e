//! Registry of tracked vessels
//!
//! One entry per MMSI, each owning the handle of the vessel's marker. Reports
//! are applied insert-or-update, and a periodic sweep drops vessels that have
//! gone silent for longer than the expiration window.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use crate::models::{Mmsi, VesselReport};
use crate::presenter::{Marker, MarkerPresenter};
use crate::viewport::LonLat;

/// Latest known state of one vessel
#[derive(Debug)]
pub struct TrackedVessel<H> {
    pub report: VesselReport,
    /// Local time the last update was applied
    pub last_seen: DateTime<Utc>,
    marker: H,
}

/// Result of applying a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    Updated,
    /// The map is zoomed out too far, the report was ignored
    BelowZoomThreshold,
}

pub struct VesselRegistry<P: MarkerPresenter> {
    presenter: P,
    vessels: HashMap<Mmsi, TrackedVessel<P::Handle>>,
}

impl<P: MarkerPresenter> VesselRegistry<P> {
    pub fn new(presenter: P) -> Self {
        Self {
            presenter,
            vessels: HashMap::new(),
        }
    }

    /// Apply a position report.
    ///
    /// Does nothing when `viewport_zoom` is below `zoom_threshold`, even if a
    /// stale subscription is still delivering data.
    pub fn ingest(
        &mut self,
        report: VesselReport,
        viewport_zoom: f64,
        zoom_threshold: f64,
        now: DateTime<Utc>,
    ) -> IngestOutcome {
        if viewport_zoom < zoom_threshold {
            return IngestOutcome::BelowZoomThreshold;
        }

        let mmsi = report.mmsi.clone();
        let marker = Marker {
            mmsi: mmsi.clone(),
            position: LonLat {
                lon: report.lon,
                lat: report.lat,
            },
            rotation: report.cog,
            popup: popup_text(&report, now),
        };

        // The handle is moved out and back in so the presenter can re-render
        // the same marker.
        match self.vessels.remove(&mmsi) {
            Some(previous) => {
                let handle = self.presenter.upsert(Some(previous.marker), &marker);
                let last_seen = previous.last_seen.max(now);
                self.vessels.insert(
                    mmsi,
                    TrackedVessel {
                        report,
                        last_seen,
                        marker: handle,
                    },
                );
                IngestOutcome::Updated
            }
            None => {
                let handle = self.presenter.upsert(None, &marker);
                debug!("Tracking new vessel {}", mmsi);
                self.vessels.insert(
                    mmsi,
                    TrackedVessel {
                        report,
                        last_seen: now,
                        marker: handle,
                    },
                );
                IngestOutcome::Inserted
            }
        }
    }

    /// Remove vessels not seen for longer than `expiration` and return their
    /// identities.
    pub fn sweep(&mut self, now: DateTime<Utc>, expiration: Duration) -> BTreeSet<Mmsi> {
        let window = TimeDelta::from_std(expiration).unwrap_or(TimeDelta::MAX);

        let expired: BTreeSet<Mmsi> = self
            .vessels
            .iter()
            .filter(|(_, vessel)| now.signed_duration_since(vessel.last_seen) > window)
            .map(|(mmsi, _)| mmsi.clone())
            .collect();

        for mmsi in &expired {
            if let Some(vessel) = self.vessels.remove(mmsi) {
                self.presenter.remove(vessel.marker);
            }
        }

        if !expired.is_empty() {
            info!(
                "Expired {} vessels, {} still tracked",
                expired.len(),
                self.vessels.len()
            );
        }
        expired
    }

    /// Remove every marker and forget all vessels
    pub fn teardown(&mut self) {
        let count = self.vessels.len();
        for (_, vessel) in self.vessels.drain() {
            self.presenter.remove(vessel.marker);
        }
        info!("Registry torn down, removed {} markers", count);
    }

    pub fn get(&self, mmsi: &Mmsi) -> Option<&TrackedVessel<P::Handle>> {
        self.vessels.get(mmsi)
    }

    pub fn len(&self) -> usize {
        self.vessels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vessels.is_empty()
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub(crate) fn into_presenter(self) -> P {
        self.presenter
    }
}

fn popup_text(report: &VesselReport, now: DateTime<Utc>) -> String {
    format!(
        "Vessel: {} (MMSI: {})\n\
         Coordinates: {:.4}, {:.4}\n\
         COG: {}° | SOG: {} knots | Heading: {}°\n\
         Timestamp: {}\n\
         Delay: {} milliseconds",
        report.display_name(),
        report.mmsi,
        report.lat,
        report.lon,
        report.cog,
        report.sog,
        report.true_heading,
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        now.signed_duration_since(report.timestamp_received)
            .num_milliseconds()
    )
}
