//! Pairs GGA and RMC sentences of the same fix into a `Location`.

use std::sync::{Arc, Mutex, PoisonError};

use config::{Config, FusionPolicy, KNOTS_TO_MPS};
use listener::{ListenerId, ListenerRegistry, LocationListener, SentenceListener};
use location::{Location, LocationBuilder};
use sentence::{GgaSentence, RmcSentence, Sentence};

#[derive(Debug, Default)]
struct Slots {
    gga: Option<GgaSentence>,
    rmc: Option<RmcSentence>,
}

/// Keeps the latest valid GGA and RMC sentence and emits a `Location` once
/// both describe the same fix.
///
/// Sentences without a valid fix are dropped and leave the retained sentence
/// of their type untouched. If the fix times of the retained sentences are
/// too far apart both are kept until either is replaced; stale sentences
/// never expire on their own.
pub struct LocationFusion {
    slots: Mutex<Slots>,
    listeners: ListenerRegistry<dyn LocationListener>,
    window_ms: u32,
    policy: FusionPolicy,
}

impl LocationFusion {
    pub fn new(window_ms: u32, policy: FusionPolicy) -> Self {
        LocationFusion {
            slots: Mutex::new(Slots::default()),
            listeners: ListenerRegistry::new(),
            window_ms,
            policy,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        LocationFusion::new(config.fusion_window_ms, config.fusion_policy)
    }

    pub fn add_listener(&self, listener: Arc<dyn LocationListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn policy(&self) -> FusionPolicy {
        self.policy
    }

    /// Stores `sentence` and returns the fused location if it completed a
    /// pair. Does not notify listeners.
    pub fn update(&self, sentence: &Sentence) -> Option<Location> {
        if !sentence.is_valid_fix() {
            warn!("Dropping {} without valid fix", sentence);
            return None;
        }

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match *sentence {
            Sentence::Gga(ref gga) => slots.gga = Some(gga.clone()),
            Sentence::Rmc(ref rmc) => slots.rmc = Some(rmc.clone()),
        }

        let delta = match (&slots.gga, &slots.rmc) {
            (&Some(ref gga), &Some(ref rmc)) => i64::from(gga.time) - i64::from(rmc.time),
            _ => return None,
        };
        if delta.abs() >= i64::from(self.window_ms) {
            warn!(
                "GGA and RMC fix times differ by {}ms, waiting for a matching sentence",
                delta
            );
            return None;
        }

        let location = match (slots.gga.take(), slots.rmc.take()) {
            (Some(gga), Some(rmc)) => self.combine(&gga, &rmc),
            _ => return None,
        };
        if let Some(ref location) = location {
            debug!("Fused location {}", location);
        }
        location
    }

    fn combine(&self, gga: &GgaSentence, rmc: &RmcSentence) -> Option<Location> {
        let (lat, lon) = match (gga.lat, gga.lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return None,
        };

        let mut builder = LocationBuilder::new(lat, lon)
            .received_time(gga.header.started_at)
            .time(gga.time);
        if let Some(altitude) = gga.altitude {
            builder = builder.altitude(altitude);
        }
        if let Some(heading) = rmc.heading {
            builder = builder.bearing(heading);
        }
        match self.policy {
            FusionPolicy::ConvertSpeed => {
                if let Some(knots) = rmc.speed {
                    builder = builder.speed(knots * KNOTS_TO_MPS);
                }
            }
            FusionPolicy::RawSpeedWithAccuracy => {
                if let Some(knots) = rmc.speed {
                    builder = builder.speed(knots);
                }
                if let Some(hdop) = gga.hdop {
                    builder = builder.accuracy(hdop);
                }
            }
        }
        Some(builder.build())
    }
}

impl SentenceListener for LocationFusion {
    fn receive_sentence(&self, sentence: &Sentence) {
        if let Some(location) = self.update(sentence) {
            self.listeners
                .notify("location", |l| l.receive_location(&location));
        }
    }
}
