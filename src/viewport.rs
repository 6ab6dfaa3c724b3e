//! Map viewport and its tracker

use std::fmt;

use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

/// Visible region of the map, given by two opposite corners
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub ne: LonLat,
    pub sw: LonLat,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Viewport {
    pub center: LonLat,
    pub zoom: f64,
    pub bounds: BoundingBox,
}

impl Viewport {
    /// Center rounded to 4 decimals and zoom rounded to 2 decimals, the
    /// precision at which the view is displayed to the user.
    fn displayed(&self) -> (f64, f64, f64) {
        (
            round_to(self.center.lon, 4),
            round_to(self.center.lat, 4),
            round_to(self.zoom, 2),
        )
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Longitude: {:.4} | Latitude: {:.4} | Zoom: {:.2}",
            self.center.lon, self.center.lat, self.zoom
        )
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Holds the most recently settled viewport
#[derive(Debug, Default)]
pub struct ViewportTracker {
    current: Option<Viewport>,
}

impl ViewportTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a settled viewport.
    ///
    /// Returns true when the displayed view (rounded center and zoom)
    /// differs from the previous one.
    pub fn settle(&mut self, viewport: Viewport) -> bool {
        let changed = self
            .current
            .map_or(true, |previous| previous.displayed() != viewport.displayed());
        if changed {
            debug!("Viewport changed: {}", viewport);
        }
        self.current = Some(viewport);
        changed
    }

    pub fn current(&self) -> Option<&Viewport> {
        self.current.as_ref()
    }

    /// Zoom of the last settled viewport, None before the map has settled once
    pub fn zoom(&self) -> Option<f64> {
        self.current.map(|v| v.zoom)
    }
}
