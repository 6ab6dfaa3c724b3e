//! Subscription gate
//!
//! Decides whether a settled viewport should be turned into a region
//! subscription. Requests go out only while the channel is open and the map
//! is zoomed in at least to the threshold.

use tokio::sync::watch;
use tracing::debug;

use crate::models::{DataAge, SubscriptionRequest};
use crate::transport::ChannelState;
use crate::viewport::Viewport;

pub struct SubscriptionGate {
    zoom_threshold: f64,
    channel: watch::Receiver<ChannelState>,
}

impl SubscriptionGate {
    pub fn new(zoom_threshold: f64, channel: watch::Receiver<ChannelState>) -> Self {
        Self {
            zoom_threshold,
            channel,
        }
    }

    pub fn zoom_threshold(&self) -> f64 {
        self.zoom_threshold
    }

    pub fn channel_state(&self) -> ChannelState {
        *self.channel.borrow()
    }

    pub fn on_viewport_settled(
        &self,
        viewport: &Viewport,
        age: DataAge,
    ) -> Option<SubscriptionRequest> {
        let state = self.channel_state();
        if !state.is_open() {
            debug!("Not subscribing, channel is {:?}", state);
            return None;
        }
        if viewport.zoom < self.zoom_threshold {
            debug!(
                "Not subscribing, zoom {} below threshold {}",
                viewport.zoom, self.zoom_threshold
            );
            return None;
        }
        Some(SubscriptionRequest::new(&viewport.bounds, age))
    }
}
