//! Wires a byte source through the reader into fusion and route tracking.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use config::{Config, RouteFeed};
use err::{ManagerError, RouteError};
use fusion::LocationFusion;
use listener::{
    LifecycleListener, ListenerId, ListenerRegistry, LocationListener, RouteListener,
    SentenceListener,
};
use reader::NmeaReader;
use route::{Route, RouteTracker};
use source::ByteSource;

/// Start and stop notifications. The failure variants carry the error that
/// is also returned to the caller.
#[derive(Debug)]
pub enum LifecycleEvent<'a> {
    Starting,
    Started,
    StartFailed(&'a ManagerError),
    Stopping,
    Stopped,
    StopFailed(&'a ManagerError),
}

impl<'a> LifecycleEvent<'a> {
    pub fn name(&self) -> &'static str {
        match *self {
            LifecycleEvent::Starting => "STARTING",
            LifecycleEvent::Started => "STARTED",
            LifecycleEvent::StartFailed(_) => "START_FAILED",
            LifecycleEvent::Stopping => "STOPPING",
            LifecycleEvent::Stopped => "STOPPED",
            LifecycleEvent::StopFailed(_) => "STOP_FAILED",
        }
    }

    pub fn error(&self) -> Option<&ManagerError> {
        match *self {
            LifecycleEvent::StartFailed(err) | LifecycleEvent::StopFailed(err) => Some(err),
            _ => None,
        }
    }
}

impl<'a> fmt::Display for LifecycleEvent<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.error() {
            Some(err) => write!(f, "{}: {}", self.name(), err),
            None => f.write_str(self.name()),
        }
    }
}

/// Reads NMEA from `S`, fuses the sentences into locations and tracks the
/// registered routes.
///
/// Nothing is retried automatically. A failed start leaves the manager
/// stopped, so the caller (typically a lifecycle listener) may call `start`
/// again.
pub struct LocationManager<S: ByteSource> {
    source: S,
    config: Config,
    reader: NmeaReader,
    fusion: Arc<LocationFusion>,
    routes: Arc<RouteTracker>,
    lifecycle: ListenerRegistry<dyn LifecycleListener>,
    started: bool,
}

impl<S: ByteSource> LocationManager<S> {
    pub fn new(source: S, config: Config) -> Self {
        let sentences: Arc<ListenerRegistry<dyn SentenceListener>> =
            Arc::new(ListenerRegistry::new());
        let fusion = Arc::new(LocationFusion::from_config(&config));
        let routes = Arc::new(RouteTracker::new(config.route_feed));

        sentences.add(fusion.clone());
        match config.route_feed {
            RouteFeed::Location => {
                fusion.add_listener(routes.clone());
            }
            RouteFeed::Gga | RouteFeed::Rmc => {
                sentences.add(routes.clone());
            }
        }

        let reader = NmeaReader::new(sentences).with_checksum_verification(config.verify_checksum);
        LocationManager {
            source,
            config,
            reader,
            fusion,
            routes,
            lifecycle: ListenerRegistry::new(),
            started: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_running(&self) -> bool {
        self.reader.is_running()
    }

    fn notify(&self, event: &LifecycleEvent) {
        debug!("Location manager {}", event);
        self.lifecycle
            .notify("lifecycle", |l| l.lifecycle_event(event));
    }

    /// Connects the source and starts reading.
    ///
    /// Fails with `ManagerError::AlreadyStarted` while reading is in progress.
    /// Any other failure is also reported as `START_FAILED`.
    pub fn start(&mut self) -> Result<(), ManagerError> {
        if self.reader.is_running() {
            return Err(ManagerError::AlreadyStarted);
        }
        if self.started {
            // the previous run ended with its input; release it before reconnecting
            if let Err(e) = self.source.disconnect() {
                debug!("Disconnecting after finished run: {}", e);
            }
            self.started = false;
        }

        self.notify(&LifecycleEvent::Starting);
        match self.open() {
            Ok(()) => {
                self.started = true;
                info!("Location manager started");
                self.notify(&LifecycleEvent::Started);
                Ok(())
            }
            Err(err) => {
                error!("Starting location manager failed: {}", err);
                if let Err(e) = self.source.disconnect() {
                    debug!("Disconnecting after failed start: {}", e);
                }
                self.notify(&LifecycleEvent::StartFailed(&err));
                Err(err)
            }
        }
    }

    fn open(&mut self) -> Result<(), ManagerError> {
        self.source.connect()?;
        let input = self.source.input_stream()?;
        self.reader.start(input)?;
        Ok(())
    }

    /// Stops reading and disconnects the source. Stopping a manager that is
    /// not started does nothing.
    ///
    /// The source is disconnected and the reader released even if one of
    /// the steps fails; the first failure is returned and reported as
    /// `STOP_FAILED`.
    pub fn stop(&mut self) -> Result<(), ManagerError> {
        if !self.started {
            return Ok(());
        }
        self.started = false;
        self.notify(&LifecycleEvent::Stopping);

        self.reader.request_stop();
        let disconnected = self.source.disconnect();
        let stopped = self.reader.stop(self.config.stop_timeout);

        let result = match (disconnected, stopped) {
            (Err(err), _) => Err(ManagerError::from(err)),
            (_, Err(err)) => Err(ManagerError::from(err)),
            (Ok(()), Ok(())) => Ok(()),
        };
        match result {
            Ok(()) => {
                info!("Location manager stopped");
                self.notify(&LifecycleEvent::Stopped);
            }
            Err(ref err) => {
                error!("Stopping location manager failed: {}", err);
                self.notify(&LifecycleEvent::StopFailed(err));
            }
        }
        result
    }

    /// Blocks until the input is exhausted or `timeout` elapsed. Returns
    /// `true` if reading has ended.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.reader.wait(timeout)
    }

    pub fn add_sentence_listener(&self, listener: Arc<dyn SentenceListener>) -> ListenerId {
        self.reader.listeners().add(listener)
    }

    pub fn remove_sentence_listener(&self, id: ListenerId) -> bool {
        self.reader.listeners().remove(id)
    }

    pub fn add_location_listener(&self, listener: Arc<dyn LocationListener>) -> ListenerId {
        self.fusion.add_listener(listener)
    }

    pub fn remove_location_listener(&self, id: ListenerId) -> bool {
        self.fusion.remove_listener(id)
    }

    pub fn add_lifecycle_listener(&self, listener: Arc<dyn LifecycleListener>) -> ListenerId {
        self.lifecycle.add(listener)
    }

    pub fn remove_lifecycle_listener(&self, id: ListenerId) -> bool {
        self.lifecycle.remove(id)
    }

    pub fn add_route(
        &self,
        route: Arc<Route>,
        trigger_distance: f64,
        listeners: Vec<Arc<dyn RouteListener>>,
    ) -> Result<(), RouteError> {
        self.routes.add_route(route, trigger_distance, listeners)
    }

    pub fn remove_route(&self, route: &Arc<Route>) -> bool {
        self.routes.remove_route(route)
    }

    pub fn route_tracker(&self) -> &Arc<RouteTracker> {
        &self.routes
    }
}

impl<S: ByteSource> Drop for LocationManager<S> {
    fn drop(&mut self) {
        if self.started {
            self.reader.request_stop();
            if let Err(e) = self.source.disconnect() {
                debug!("Disconnecting dropped location manager: {}", e);
            }
        }
    }
}
