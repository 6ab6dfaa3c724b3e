//! Viewer session
//!
//! A session owns the vessel registry, the subscription gate and the viewport
//! of one viewer. All of its state is mutated from a single task: each
//! inbound frame, map event, channel state change and sweep tick is handled
//! to completion before the next one is looked at.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ViewerConfig;
use crate::errors::AisViewerError;
use crate::gate::SubscriptionGate;
use crate::map_events::MapEvent;
use crate::models::{DataAge, Mmsi, SubscriptionRequest, VesselReport};
use crate::presenter::MarkerPresenter;
use crate::registry::{IngestOutcome, VesselRegistry};
use crate::transport::ChannelState;
use crate::viewport::{Viewport, ViewportTracker};

pub struct ViewerSession<P: MarkerPresenter> {
    registry: VesselRegistry<P>,
    gate: SubscriptionGate,
    tracker: ViewportTracker,
    age: DataAge,
    outbound: mpsc::Sender<SubscriptionRequest>,
    channel: watch::Receiver<ChannelState>,
    expiration: Duration,
    sweep_interval: Duration,
}

impl<P: MarkerPresenter> ViewerSession<P> {
    pub fn new(
        presenter: P,
        config: &ViewerConfig,
        outbound: mpsc::Sender<SubscriptionRequest>,
        channel: watch::Receiver<ChannelState>,
    ) -> Result<Self, AisViewerError> {
        config.validate()?;

        Ok(Self {
            registry: VesselRegistry::new(presenter),
            gate: SubscriptionGate::new(config.zoom_threshold, channel.clone()),
            tracker: ViewportTracker::new(),
            age: DataAge::try_from(config.default_age)?,
            outbound,
            channel,
            expiration: config.expiration,
            sweep_interval: config.sweep_interval,
        })
    }

    pub fn registry(&self) -> &VesselRegistry<P> {
        &self.registry
    }

    pub fn age(&self) -> DataAge {
        self.age
    }

    /// Parse and apply one inbound text frame.
    ///
    /// Malformed frames are logged and dropped; they never end the session.
    pub fn handle_message(&mut self, text: &str, now: DateTime<Utc>) -> Option<IngestOutcome> {
        let report = match VesselReport::from_json(text) {
            Ok(report) => report,
            Err(e) => {
                warn!("Failed to parse message: {:?}", e);
                return None;
            }
        };

        let Some(zoom) = self.tracker.zoom() else {
            debug!("No viewport yet, ignoring report for {}", report.mmsi);
            return Some(IngestOutcome::BelowZoomThreshold);
        };

        let threshold = self.gate.zoom_threshold();
        Some(self.registry.ingest(report, zoom, threshold, now))
    }

    /// Record a settled viewport and subscribe to it if the gate allows.
    pub fn handle_viewport(&mut self, viewport: Viewport) -> Option<SubscriptionRequest> {
        if self.tracker.settle(viewport) {
            info!("{}", viewport);
        }
        self.subscribe()
    }

    /// Apply a new age selection; a changed age re-subscribes the current
    /// viewport.
    pub fn handle_age(&mut self, minutes: u8) -> Option<SubscriptionRequest> {
        let age = match DataAge::try_from(minutes) {
            Ok(age) => age,
            Err(e) => {
                warn!("Ignoring age selection: {}", e);
                return None;
            }
        };
        if age == self.age {
            return None;
        }
        info!("Data age in minutes: {}", age.minutes());
        self.age = age;
        self.subscribe()
    }

    /// React to a channel state change. Once the channel opens, the current
    /// viewport is subscribed without waiting for the map to move.
    pub fn handle_channel_state(&mut self, state: ChannelState) -> Option<SubscriptionRequest> {
        match state {
            ChannelState::Connecting => None,
            ChannelState::Open => {
                info!("Channel open");
                self.subscribe()
            }
            ChannelState::Closed | ChannelState::Errored => {
                info!("Channel unavailable ({:?}), no more subscriptions", state);
                None
            }
        }
    }

    /// Drop vessels that have been silent for longer than the expiration
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<Mmsi> {
        self.registry
            .sweep(now, self.expiration)
            .into_iter()
            .collect()
    }

    fn subscribe(&self) -> Option<SubscriptionRequest> {
        let viewport = self.tracker.current()?;
        let request = self.gate.on_viewport_settled(viewport, self.age)?;
        match self.outbound.try_send(request) {
            Ok(()) => {
                info!(
                    "Subscribed to ({}, {}) - ({}, {}), age {} min",
                    request.lat1,
                    request.long1,
                    request.lat2,
                    request.long2,
                    request.age.minutes()
                );
                Some(request)
            }
            Err(e) => {
                warn!("Failed to send subscription: {}", e);
                None
            }
        }
    }

    /// Run the session until `shutdown` resolves or the map event source
    /// closes, then remove every marker and hand back the presenter.
    pub async fn run<F>(
        mut self,
        mut inbound: mpsc::Receiver<String>,
        mut map_events: mpsc::Receiver<MapEvent>,
        shutdown: F,
    ) -> P
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut sweep_timer =
            interval_at(Instant::now() + self.sweep_interval, self.sweep_interval);
        sweep_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut channel = self.channel.clone();
        let mut inbound_open = true;
        let mut channel_watched = true;

        // The channel may already be open before the session starts
        let initial = *channel.borrow_and_update();
        self.handle_channel_state(initial);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Session shutting down");
                    break;
                }
                message = inbound.recv(), if inbound_open => match message {
                    Some(text) => {
                        self.handle_message(&text, Utc::now());
                    }
                    None => {
                        info!("Inbound stream ended");
                        inbound_open = false;
                    }
                },
                event = map_events.recv() => match event {
                    Some(MapEvent::ViewportSettled { viewport }) => {
                        self.handle_viewport(viewport);
                    }
                    Some(MapEvent::AgeChanged { minutes }) => {
                        self.handle_age(minutes);
                    }
                    None => {
                        info!("Map closed");
                        break;
                    }
                },
                changed = channel.changed(), if channel_watched => match changed {
                    Ok(()) => {
                        let state = *channel.borrow_and_update();
                        self.handle_channel_state(state);
                    }
                    Err(_) => channel_watched = false,
                },
                _ = sweep_timer.tick() => {
                    self.sweep_expired(Utc::now());
                }
            }
        }

        // Stop timers and message delivery before touching the markers
        drop(sweep_timer);
        drop(inbound);
        drop(map_events);

        self.registry.teardown();
        self.registry.into_presenter()
    }
}
