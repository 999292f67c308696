//! Streaming reader for the *GGA* and *RMC* sentences of the *NMEA 0183*
//! protocol that fuses both into locations and tracks the proximity to the
//! waypoints of registered routes.
//!
//! ```no_run
//! extern crate nmea_route;
//!
//! use std::sync::Arc;
//! use nmea_route::{Config, Location, LocationManager, TcpSource};
//!
//! # fn main() {
//! let source = TcpSource::new("192.168.1.20:10110", Config::default().read_timeout);
//! let mut manager = LocationManager::new(source, Config::default());
//! manager.add_location_listener(Arc::new(|location: &Location| println!("{}", location)));
//! manager.start().unwrap();
//! # }
//! ```
#[cfg(test)]
#[macro_use]
extern crate assert_matches;
extern crate arrayvec;
extern crate chrono;
extern crate crossbeam_channel;
extern crate dashmap;
#[cfg(test)]
extern crate env_logger;
#[macro_use]
extern crate log;
#[macro_use]
extern crate quick_error;

pub mod err;
#[macro_use]
mod macros;
pub mod config;
pub mod fusion;
pub mod geo;
pub mod listener;
pub mod location;
pub mod manager;
pub mod parser;
pub mod reader;
pub mod route;
pub mod sentence;
pub mod source;

#[cfg(test)]
fn init_test_logger() {
    use std::sync::Once;

    static LOGGER: Once = Once::new();
    LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub use config::{Config, FusionPolicy, RouteFeed};
pub use err::{FieldError, ManagerError, ReaderError, RouteError, SourceError, SyncError};
pub use fusion::LocationFusion;
pub use listener::{
    LifecycleListener, ListenerId, ListenerRegistry, LocationListener, RouteListener,
    SentenceListener,
};
pub use location::{Location, LocationBuilder};
pub use manager::{LifecycleEvent, LocationManager};
pub use reader::{NmeaReader, SentenceReader};
pub use route::{Route, RouteTracker, Waypoint, WaypointEvent, WaypointEventType};
pub use sentence::{FixQuality, GgaSentence, ModeIndicator, RmcSentence, Sentence, StatusIndicator};
pub use source::{ByteSource, FileSource, StreamSource, TcpSource};
