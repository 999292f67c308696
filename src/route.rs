//! Waypoint proximity tracking along registered routes.
//!
//! Every registered route has a cursor pointing at the waypoint it currently
//! heads for. Position updates are compared against that waypoint only:
//!
//! * outside the trigger distance nothing happens until the position comes
//!   closer than the trigger distance (`EnteringPerimeter`)
//! * inside, each update is reported as `Approaching` or `Receding` relative
//!   to the previous update, while the closest sample is remembered
//! * once the position is farther away than the trigger distance again,
//!   `LeavingPerimeter` is followed by `ClosestToWaypoint` and the cursor
//!   moves on to the next waypoint, wrapping around at the end of the route.

use dashmap::DashMap;

use std::f64;
use std::fmt;
use std::sync::Arc;

use config::RouteFeed;
use err::RouteError;
use geo;
use listener::{ListenerId, ListenerRegistry, LocationListener, RouteListener, SentenceListener};
use location::Location;
use sentence::Sentence;

#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    id: String,
    lat: f64,
    lon: f64,
}

impl Waypoint {
    pub fn new<S: Into<String>>(id: S, lat: f64, lon: f64) -> Self {
        Waypoint {
            id: id.into(),
            lat,
            lon,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

/// A named, ordered sequence of waypoints.
///
/// Routes are registered by identity: two `Arc<Route>` with equal content
/// are tracked independently.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    name: String,
    waypoints: Vec<Waypoint>,
}

impl Route {
    pub fn new<S: Into<String>>(name: S, waypoints: Vec<Waypoint>) -> Self {
        Route {
            name: name.into(),
            waypoints,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn waypoint(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaypointEventType {
    EnteringPerimeter,
    LeavingPerimeter,
    Approaching,
    Receding,
    ClosestToWaypoint,
}

impl fmt::Display for WaypointEventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            WaypointEventType::EnteringPerimeter => "ENTERING_PERIMETER",
            WaypointEventType::LeavingPerimeter => "LEAVING_PERIMETER",
            WaypointEventType::Approaching => "APPROACHING",
            WaypointEventType::Receding => "RECEDING",
            WaypointEventType::ClosestToWaypoint => "CLOSEST_TO_WAYPOINT",
        };
        f.write_str(name)
    }
}

/// A change in the proximity to the current waypoint of a route.
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointEvent {
    /// Index of the waypoint in its route.
    pub waypoint_index: usize,
    /// UTC time of the fix in milliseconds since midnight. For
    /// `ClosestToWaypoint` the time of the closest sample.
    pub fix_time: u32,
    /// Wall clock time in milliseconds since the unix epoch at which the
    /// fix was received.
    pub system_time: i64,
    pub kind: WaypointEventType,
    /// Distance to the waypoint in meters.
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    WaitingToReach,
    Reached,
}

#[derive(Debug, Clone)]
struct RouteState {
    cursor: usize,
    phase: Phase,
    trigger_distance: f64,
    last_distance: f64,
    closest_distance: f64,
    closest_fix_time: u32,
    closest_system_time: i64,
}

impl RouteState {
    fn new(trigger_distance: f64) -> Self {
        RouteState {
            cursor: 0,
            phase: Phase::WaitingToReach,
            trigger_distance,
            last_distance: 0.0,
            closest_distance: f64::INFINITY,
            closest_fix_time: 0,
            closest_system_time: 0,
        }
    }

    fn reset_closest(&mut self) {
        self.closest_distance = f64::INFINITY;
        self.closest_fix_time = 0;
        self.closest_system_time = 0;
    }

    fn advance(
        &mut self,
        route: &Route,
        lat: f64,
        lon: f64,
        fix_time: u32,
        system_time: i64,
    ) -> Vec<WaypointEvent> {
        let mut events = Vec::new();
        let waypoint = match route.waypoint(self.cursor) {
            Some(waypoint) => waypoint,
            None => return events,
        };
        let index = self.cursor;
        let distance = geo::distance(lat, lon, waypoint.lat, waypoint.lon);
        trace!(
            "Route {}: {:.2}m to waypoint {} ({})",
            route.name,
            distance,
            index,
            waypoint.id
        );

        let event = |kind, distance, fix_time, system_time| WaypointEvent {
            waypoint_index: index,
            fix_time,
            system_time,
            kind,
            distance,
        };

        match self.phase {
            Phase::WaitingToReach => {
                if distance < self.trigger_distance {
                    events.push(event(
                        WaypointEventType::EnteringPerimeter,
                        distance,
                        fix_time,
                        system_time,
                    ));
                    self.phase = Phase::Reached;
                    self.closest_distance = distance;
                    self.closest_fix_time = fix_time;
                    self.closest_system_time = system_time;
                }
            }
            Phase::Reached => {
                if distance > self.trigger_distance {
                    events.push(event(
                        WaypointEventType::LeavingPerimeter,
                        distance,
                        fix_time,
                        system_time,
                    ));
                    events.push(event(
                        WaypointEventType::ClosestToWaypoint,
                        self.closest_distance,
                        self.closest_fix_time,
                        self.closest_system_time,
                    ));
                    self.reset_closest();
                    self.cursor = (self.cursor + 1) % route.waypoints.len();
                    self.phase = Phase::WaitingToReach;
                } else {
                    if distance < self.closest_distance {
                        self.closest_distance = distance;
                        self.closest_fix_time = fix_time;
                        self.closest_system_time = system_time;
                    }
                    if distance < self.last_distance {
                        events.push(event(
                            WaypointEventType::Approaching,
                            distance,
                            fix_time,
                            system_time,
                        ));
                    } else if distance > self.last_distance {
                        events.push(event(
                            WaypointEventType::Receding,
                            distance,
                            fix_time,
                            system_time,
                        ));
                    }
                }
            }
        }

        self.last_distance = distance;
        events
    }
}

struct RouteEntry {
    route: Arc<Route>,
    state: RouteState,
    listeners: Arc<ListenerRegistry<dyn RouteListener>>,
}

#[inline]
fn route_key(route: &Arc<Route>) -> usize {
    &**route as *const Route as usize
}

/// Tracks any number of routes concurrently.
///
/// Listeners are called after the per-route state has been updated and
/// released, so they may add or remove routes from within the callback.
pub struct RouteTracker {
    routes: DashMap<usize, RouteEntry>,
    feed: RouteFeed,
}

impl Default for RouteTracker {
    fn default() -> Self {
        RouteTracker::new(RouteFeed::default())
    }
}

impl RouteTracker {
    /// `feed` selects which updates drive the tracker when it is registered
    /// as a sentence or location listener.
    pub fn new(feed: RouteFeed) -> Self {
        RouteTracker {
            routes: DashMap::new(),
            feed,
        }
    }

    pub fn feed(&self) -> RouteFeed {
        self.feed
    }

    /// Starts tracking `route` at its first waypoint.
    pub fn add_route(
        &self,
        route: Arc<Route>,
        trigger_distance: f64,
        listeners: Vec<Arc<dyn RouteListener>>,
    ) -> Result<(), RouteError> {
        if route.waypoints.is_empty() {
            return Err(RouteError::NoWaypoints(route.name.clone()));
        }
        if !(trigger_distance.is_finite() && trigger_distance > 0.0) {
            return Err(RouteError::InvalidTriggerDistance(trigger_distance));
        }

        let registry = ListenerRegistry::new();
        for listener in listeners {
            registry.add(listener);
        }

        use dashmap::mapref::entry::Entry;
        match self.routes.entry(route_key(&route)) {
            Entry::Occupied(_) => Err(RouteError::AlreadyRegistered(route.name.clone())),
            Entry::Vacant(vacant) => {
                debug!(
                    "Tracking route {} with {} waypoints, trigger distance {}m",
                    route.name,
                    route.waypoints.len(),
                    trigger_distance
                );
                vacant.insert(RouteEntry {
                    route,
                    state: RouteState::new(trigger_distance),
                    listeners: Arc::new(registry),
                });
                Ok(())
            }
        }
    }

    /// Stops tracking `route`. Returns `false` if it was not registered.
    pub fn remove_route(&self, route: &Arc<Route>) -> bool {
        match self.routes.remove(&route_key(route)) {
            Some(_) => {
                debug!("Stopped tracking route {}", route.name);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, route: &Arc<Route>) -> bool {
        self.routes.contains_key(&route_key(route))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Index of the waypoint `route` currently heads for.
    pub fn current_waypoint(&self, route: &Arc<Route>) -> Option<usize> {
        self.routes
            .get(&route_key(route))
            .map(|entry| entry.state.cursor)
    }

    pub fn add_route_listener(
        &self,
        route: &Arc<Route>,
        listener: Arc<dyn RouteListener>,
    ) -> Option<ListenerId> {
        self.routes
            .get(&route_key(route))
            .map(|entry| entry.listeners.add(listener))
    }

    pub fn remove_route_listener(&self, route: &Arc<Route>, id: ListenerId) -> bool {
        match self.routes.get(&route_key(route)) {
            Some(entry) => entry.listeners.remove(id),
            None => false,
        }
    }

    /// Advances every route with a new position and delivers the resulting
    /// events.
    pub fn process_update(&self, lat: f64, lon: f64, fix_time: u32, system_time: i64) {
        let mut pending = Vec::new();
        for mut entry in self.routes.iter_mut() {
            let entry = &mut *entry;
            let events = entry
                .state
                .advance(&entry.route, lat, lon, fix_time, system_time);
            if !events.is_empty() {
                pending.push((entry.route.clone(), entry.listeners.clone(), events));
            }
        }

        for (route, listeners, events) in pending {
            for event in &events {
                debug!(
                    "Route {}: {} waypoint {} at {:.2}m",
                    route.name, event.kind, event.waypoint_index, event.distance
                );
                listeners.notify("waypoint", |l| l.waypoint_event(&route, event));
            }
        }
    }
}

impl SentenceListener for RouteTracker {
    fn receive_sentence(&self, sentence: &Sentence) {
        let wanted = match (self.feed, sentence) {
            (RouteFeed::Gga, &Sentence::Gga(_)) | (RouteFeed::Rmc, &Sentence::Rmc(_)) => true,
            _ => false,
        };
        if !wanted {
            return;
        }
        if !sentence.is_valid_fix() {
            warn!("Ignoring {} for route tracking", sentence);
            return;
        }
        if let Some((lat, lon)) = sentence.position() {
            self.process_update(lat, lon, sentence.fix_time(), sentence.header().started_at);
        }
    }
}

impl LocationListener for RouteTracker {
    fn receive_location(&self, location: &Location) {
        if self.feed == RouteFeed::Location {
            self.process_update(
                location.lat(),
                location.lon(),
                location.time(),
                location.received_time(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentence::{FixQuality, GgaSentence, Header};
    use std::sync::Mutex;

    type Recorded = Arc<Mutex<Vec<(String, WaypointEvent)>>>;

    fn recorder() -> (Recorded, Arc<dyn RouteListener>) {
        let events: Recorded = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let listener: Arc<dyn RouteListener> = Arc::new(move |route: &Route, event: &WaypointEvent| {
            sink.lock().unwrap().push((route.name().to_owned(), event.clone()))
        });
        (events, listener)
    }

    fn test_route() -> Arc<Route> {
        Arc::new(Route::new(
            "test route",
            vec![
                Waypoint::new("wp1", 38.979896545410156, -77.54102325439453),
                Waypoint::new("wp2", 38.98295974731445, -77.53973388671875),
                Waypoint::new("wp3", 38.982906341552734, -77.54007720947266),
                Waypoint::new("wp4", 38.972618103027344, -77.54145050048828),
                Waypoint::new("wp5", 38.97257995605469, -77.5412826538086),
            ],
        ))
    }

    const FIXES: [(f64, f64); 17] = [
        (38.979763, -77.541084),
        (38.979782, -77.541077),
        (38.979805, -77.541077),
        (38.979828, -77.541077),
        (38.979847, -77.541077),
        (38.97987, -77.541069),
        (38.979889, -77.541069),
        (38.979897, -77.541069),
        (38.979912, -77.541069),
        (38.979935, -77.541061),
        (38.979954, -77.541061),
        (38.979977, -77.541061),
        (38.979996, -77.541061),
        (38.980015, -77.541054),
        (38.980038, -77.541054),
        (38.980057, -77.541054),
        (38.98008, -77.541046),
    ];

    fn gga(n: usize, fix_quality: FixQuality) -> Sentence {
        let (lat, lon) = FIXES[n - 1];
        Sentence::Gga(GgaSentence {
            header: Header {
                talker_id: *b"GP",
                started_at: n as i64,
                finished_at: n as i64,
            },
            time: n as u32 * 1000,
            lat: Some(lat),
            lon: Some(lon),
            fix_quality,
            ..GgaSentence::default()
        })
    }

    #[test]
    fn passing_a_waypoint() {
        ::init_test_logger();
        use route::WaypointEventType::*;

        let tracker = RouteTracker::new(RouteFeed::Gga);
        let route = test_route();
        let (events, listener) = recorder();
        tracker.add_route(route.clone(), 10.0, vec![listener]).unwrap();

        for n in 1..4 {
            tracker.receive_sentence(&gga(n, FixQuality::Gps));
        }
        tracker.receive_sentence(&gga(4, FixQuality::Invalid));
        assert!(events.lock().unwrap().is_empty());

        for n in 4..18 {
            tracker.receive_sentence(&gga(n, FixQuality::Gps));
        }

        let events = events.lock().unwrap();
        let kinds: Vec<_> = events.iter().map(|&(_, ref e)| (e.kind, e.fix_time)).collect();
        assert_eq!(
            kinds,
            vec![
                (EnteringPerimeter, 4000),
                (Approaching, 5000),
                (Approaching, 6000),
                (Approaching, 7000),
                (Approaching, 8000),
                (Receding, 9000),
                (Receding, 10000),
                (Receding, 11000),
                (Receding, 12000),
                (LeavingPerimeter, 13000),
                (ClosestToWaypoint, 8000),
            ]
        );
        assert!(events.iter().all(|&(ref name, ref e)| name == "test route" && e.waypoint_index == 0));

        let closest = &events[10].1;
        assert_eq!(closest.system_time, 8);
        assert!(closest.distance < 4.0);
        assert!(events[0].1.distance < 10.0);
        assert!(events[9].1.distance > 10.0);
        assert_eq!(tracker.current_waypoint(&route), Some(1));
    }

    #[test]
    fn passed_waypoint_does_not_trigger_again() {
        ::init_test_logger();
        let tracker = RouteTracker::new(RouteFeed::Gga);
        let route = test_route();
        let (events, listener) = recorder();
        tracker.add_route(route.clone(), 10.0, vec![listener]).unwrap();

        for n in 1..18 {
            tracker.receive_sentence(&gga(n, FixQuality::Gps));
        }
        assert_eq!(events.lock().unwrap().len(), 11);

        for n in 1..6 {
            tracker.receive_sentence(&gga(n, FixQuality::Gps));
        }
        assert_eq!(events.lock().unwrap().len(), 11);
        assert_eq!(tracker.current_waypoint(&route), Some(1));
    }

    #[test]
    fn cursor_wraps_at_end_of_route() {
        ::init_test_logger();
        let tracker = RouteTracker::default();
        let route = Arc::new(Route::new(
            "loop",
            vec![Waypoint::new("only", FIXES[7].0, FIXES[7].1)],
        ));
        tracker.add_route(route.clone(), 10.0, Vec::new()).unwrap();

        tracker.process_update(FIXES[7].0, FIXES[7].1, 0, 0);
        tracker.process_update(FIXES[16].0, FIXES[16].1, 0, 0);
        assert_eq!(tracker.current_waypoint(&route), Some(0));
    }

    #[test]
    fn registration_is_by_identity() {
        ::init_test_logger();
        let tracker = RouteTracker::default();
        let route = test_route();
        let twin = Arc::new((*route).clone());

        tracker.add_route(route.clone(), 10.0, Vec::new()).unwrap();
        assert_matches!(
            tracker.add_route(route.clone(), 5.0, Vec::new()),
            Err(RouteError::AlreadyRegistered(_))
        );
        tracker.add_route(twin.clone(), 10.0, Vec::new()).unwrap();
        assert_eq!(tracker.len(), 2);

        assert!(tracker.remove_route(&twin));
        assert!(!tracker.remove_route(&twin));
        assert!(tracker.contains(&route));
        assert!(!tracker.contains(&twin));
    }

    #[test]
    fn duplicate_registration_keeps_first_state() {
        ::init_test_logger();
        let tracker = RouteTracker::default();
        let route = test_route();
        let (events, listener) = recorder();
        tracker.add_route(route.clone(), 10.0, vec![listener]).unwrap();
        for n in 1..18 {
            tracker.process_update(FIXES[n - 1].0, FIXES[n - 1].1, n as u32, n as i64);
        }

        assert!(tracker.add_route(route.clone(), 10.0, Vec::new()).is_err());
        assert_eq!(tracker.current_waypoint(&route), Some(1));
        assert_eq!(events.lock().unwrap().len(), 11);
    }

    #[test]
    fn rejects_unusable_routes() {
        ::init_test_logger();
        let tracker = RouteTracker::default();
        assert_matches!(
            tracker.add_route(Arc::new(Route::new("empty", Vec::new())), 10.0, Vec::new()),
            Err(RouteError::NoWaypoints(_))
        );
        for &bad in &[0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert_matches!(
                tracker.add_route(test_route(), bad, Vec::new()),
                Err(RouteError::InvalidTriggerDistance(_))
            );
        }
        assert!(tracker.is_empty());
    }

    #[test]
    fn panicking_listener_is_isolated() {
        ::init_test_logger();
        let tracker = RouteTracker::default();
        let route = test_route();
        let (events, listener) = recorder();
        let failing: Arc<dyn RouteListener> =
            Arc::new(|_: &Route, _: &WaypointEvent| panic!("route listener failure"));
        tracker.add_route(route, 10.0, vec![failing, listener]).unwrap();

        for n in 1..18 {
            tracker.process_update(FIXES[n - 1].0, FIXES[n - 1].1, n as u32, n as i64);
        }
        assert_eq!(events.lock().unwrap().len(), 11);
    }

    #[test]
    fn listeners_can_be_added_later() {
        ::init_test_logger();
        let tracker = RouteTracker::default();
        let route = test_route();
        tracker.add_route(route.clone(), 10.0, Vec::new()).unwrap();

        let (events, listener) = recorder();
        let id = tracker.add_route_listener(&route, listener).unwrap();
        tracker.process_update(FIXES[3].0, FIXES[3].1, 4, 4);
        assert_eq!(events.lock().unwrap().len(), 1);

        assert!(tracker.remove_route_listener(&route, id));
        tracker.process_update(FIXES[4].0, FIXES[4].1, 5, 5);
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn feed_selects_updates() {
        ::init_test_logger();
        let tracker = RouteTracker::new(RouteFeed::Location);
        let route = test_route();
        let (events, listener) = recorder();
        tracker.add_route(route, 10.0, vec![listener]).unwrap();

        tracker.receive_sentence(&gga(4, FixQuality::Gps));
        assert!(events.lock().unwrap().is_empty());

        let location = ::location::LocationBuilder::new(FIXES[3].0, FIXES[3].1)
            .time(4000)
            .received_time(4)
            .build();
        tracker.receive_location(&location);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1.kind, WaypointEventType::EnteringPerimeter);
        assert_eq!(events[0].1.system_time, 4);
    }

    #[test]
    fn registration_from_other_threads_during_updates() {
        use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
        use std::thread;

        ::init_test_logger();
        let tracker = Arc::new(RouteTracker::default());
        let route = test_route();
        let (events, listener) = recorder();
        tracker.add_route(route.clone(), 10.0, vec![listener]).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let rounds = Arc::new(AtomicUsize::new(0));
        let churn = {
            let tracker = tracker.clone();
            let done = done.clone();
            let rounds = rounds.clone();
            thread::spawn(move || {
                while !done.load(Ordering::SeqCst) || rounds.load(Ordering::SeqCst) == 0 {
                    let other = test_route();
                    tracker.add_route(other.clone(), 10.0, Vec::new()).unwrap();
                    assert!(tracker.remove_route(&other));
                    rounds.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        for _ in 0..20 {
            for n in 1..18 {
                tracker.process_update(FIXES[n - 1].0, FIXES[n - 1].1, n as u32, n as i64);
            }
        }
        done.store(true, Ordering::SeqCst);
        churn.join().unwrap();

        assert!(rounds.load(Ordering::SeqCst) > 0);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.current_waypoint(&route), Some(1));
        assert_eq!(events.lock().unwrap().len(), 11);
    }

    #[test]
    fn listener_may_replace_its_route() {
        use std::sync::Weak;

        ::init_test_logger();
        let tracker = Arc::new(RouteTracker::default());
        let route = test_route();
        let next = Arc::new(Route::new(
            "next",
            vec![Waypoint::new("back", FIXES[0].0, FIXES[0].1)],
        ));

        let handle: Weak<RouteTracker> = Arc::downgrade(&tracker);
        let own = route.clone();
        let successor = next.clone();
        let replacing: Arc<dyn RouteListener> =
            Arc::new(move |_: &Route, event: &WaypointEvent| {
                if event.kind != WaypointEventType::LeavingPerimeter {
                    return;
                }
                if let Some(tracker) = handle.upgrade() {
                    assert!(tracker.remove_route(&own));
                    tracker.add_route(successor.clone(), 10.0, Vec::new()).unwrap();
                }
            });
        let (events, listener) = recorder();
        tracker
            .add_route(route.clone(), 10.0, vec![replacing, listener])
            .unwrap();

        for n in 1..18 {
            tracker.process_update(FIXES[n - 1].0, FIXES[n - 1].1, n as u32, n as i64);
        }

        // events of the update that removed the route are still delivered
        assert_eq!(events.lock().unwrap().len(), 11);
        assert!(!tracker.contains(&route));
        assert_eq!(tracker.current_waypoint(&route), None);
        assert!(tracker.contains(&next));
        assert_eq!(tracker.len(), 1);

        for n in 1..6 {
            tracker.process_update(FIXES[n - 1].0, FIXES[n - 1].1, n as u32, n as i64);
        }
        assert_eq!(events.lock().unwrap().len(), 11);
    }
}
