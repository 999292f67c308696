extern crate env_logger;
#[macro_use]
extern crate assert_matches;
extern crate nmea_route;

use std::io::{self, Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread;
use std::time::{Duration, Instant};

use nmea_route::{
    ByteSource, Config, FusionPolicy, LifecycleEvent, Location, LocationManager, ManagerError,
    Route, RouteFeed, RouteListener, SourceError, StreamSource, TcpSource, Waypoint,
    WaypointEvent, WaypointEventType,
};

const GGA: &str = "$GPGGA,180358.200,3859.0335,N,07731.9688,W,1,6,1.37,113.3,M,-33.4,M,,*6E\r\n";
const RMC: &str = "$GPRMC,180358.200,A,3859.0335,N,07731.9688,W,0.09,229.39,130512,,,A*78\r\n";

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

fn collect_locations<S: ByteSource>(manager: &LocationManager<S>) -> Arc<Mutex<Vec<Location>>> {
    let locations = Arc::new(Mutex::new(Vec::new()));
    let sink = locations.clone();
    manager.add_location_listener(Arc::new(move |l: &Location| sink.lock().unwrap().push(l.clone())));
    locations
}

fn collect_lifecycle<S: ByteSource>(manager: &LocationManager<S>) -> Arc<Mutex<Vec<String>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    manager.add_lifecycle_listener(Arc::new(move |e: &LifecycleEvent| {
        sink.lock().unwrap().push(e.name().to_owned())
    }));
    events
}

/// Never yields data, like a quiet receiver.
struct Idle;

impl Read for Idle {
    fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
        thread::sleep(Duration::from_millis(5));
        Err(io::Error::new(io::ErrorKind::WouldBlock, "no data"))
    }
}

#[test]
fn fuses_gga_and_rmc_from_stream() {
    init_logger();
    let input = format!("{}{}", GGA, RMC);
    let mut manager = LocationManager::new(StreamSource::new(io::Cursor::new(input)), Config::default());
    let locations = collect_locations(&manager);

    manager.start().unwrap();
    assert!(manager.wait(Duration::from_secs(5)));
    manager.stop().unwrap();

    let locations = locations.lock().unwrap();
    assert_eq!(locations.len(), 1);
    let location = &locations[0];
    assert_eq!(location.time(), 65_038_200);
    assert!((location.lat() - 38.983891666666665).abs() < 1e-12);
    assert!((location.lon() + 77.53281333333332).abs() < 1e-12);
    assert_eq!(location.altitude(), Some(113.3));
    assert_eq!(location.bearing(), Some(229.39));
    assert!((location.speed().unwrap() - 0.0463).abs() < 1e-4);
    assert!(location.received_time() > 0);
}

#[test]
fn raw_speed_policy_through_manager() {
    init_logger();
    let input = format!("{}{}", RMC, GGA);
    let config = Config::default().with_fusion_policy(FusionPolicy::RawSpeedWithAccuracy);
    let mut manager = LocationManager::new(StreamSource::new(io::Cursor::new(input)), config);
    let locations = collect_locations(&manager);

    manager.start().unwrap();
    assert!(manager.wait(Duration::from_secs(5)));
    manager.stop().unwrap();

    let locations = locations.lock().unwrap();
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].speed(), Some(0.09));
    assert_eq!(locations[0].accuracy(), Some(1.37));
}

#[test]
fn lifecycle_of_start_and_stop() {
    init_logger();
    let mut manager = LocationManager::new(StreamSource::new(Idle), Config::default());
    let events = collect_lifecycle(&manager);

    manager.start().unwrap();
    assert!(manager.is_running());
    assert_matches!(manager.start(), Err(ManagerError::AlreadyStarted));

    manager.stop().unwrap();
    assert!(!manager.is_running());
    manager.stop().unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec!["STARTING", "STARTED", "STOPPING", "STOPPED"]
    );
}

/// Refuses the first `failures` connection attempts.
struct Flaky {
    failures: usize,
    attempts: Arc<AtomicUsize>,
}

impl ByteSource for Flaky {
    fn connect(&mut self) -> Result<(), SourceError> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(SourceError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "receiver offline",
            )));
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn input_stream(&mut self) -> Result<Box<dyn Read + Send>, SourceError> {
        Ok(Box::new(Idle))
    }

    fn output_stream(&mut self) -> Result<Box<dyn Write + Send>, SourceError> {
        Ok(Box::new(io::sink()))
    }
}

#[test]
fn failed_start_is_reported_and_can_be_retried() {
    init_logger();
    let attempts = Arc::new(AtomicUsize::new(0));
    let source = Flaky {
        failures: 1,
        attempts: attempts.clone(),
    };
    let mut manager = LocationManager::new(source, Config::default());

    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = failures.clone();
    manager.add_lifecycle_listener(Arc::new(move |e: &LifecycleEvent| {
        if let Some(err) = e.error() {
            sink.lock().unwrap().push(format!("{} {}", e.name(), err));
        }
    }));
    let events = collect_lifecycle(&manager);

    assert_matches!(
        manager.start(),
        Err(ManagerError::Source(SourceError::Io(_)))
    );
    assert!(!manager.is_running());
    manager.stop().unwrap();

    manager.start().unwrap();
    manager.stop().unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with("START_FAILED"));
    assert!(failures[0].contains("receiver offline"));
    assert_eq!(
        *events.lock().unwrap(),
        vec!["STARTING", "START_FAILED", "STARTING", "STARTED", "STOPPING", "STOPPED"]
    );
}

#[test]
fn stream_can_only_be_started_once() {
    init_logger();
    let mut manager =
        LocationManager::new(StreamSource::new(io::Cursor::new(GGA)), Config::default());
    manager.start().unwrap();
    assert!(manager.wait(Duration::from_secs(5)));

    assert_matches!(
        manager.start(),
        Err(ManagerError::Source(SourceError::StreamTaken))
    );
}

/// Replays a log on every connection but never disconnects cleanly.
struct Stuck {
    connects: Arc<AtomicUsize>,
}

impl ByteSource for Stuck {
    fn connect(&mut self) -> Result<(), SourceError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), SourceError> {
        Err(SourceError::Io(io::Error::new(
            io::ErrorKind::Other,
            "port stuck",
        )))
    }

    fn input_stream(&mut self) -> Result<Box<dyn Read + Send>, SourceError> {
        Ok(Box::new(io::Cursor::new(format!("{}{}", GGA, RMC))))
    }

    fn output_stream(&mut self) -> Result<Box<dyn Write + Send>, SourceError> {
        Ok(Box::new(io::sink()))
    }
}

#[test]
fn failing_disconnect_does_not_block_restart() {
    init_logger();
    let connects = Arc::new(AtomicUsize::new(0));
    let source = Stuck {
        connects: connects.clone(),
    };
    let mut manager = LocationManager::new(source, Config::default());
    let locations = collect_locations(&manager);
    let events = collect_lifecycle(&manager);

    manager.start().unwrap();
    assert!(manager.wait(Duration::from_secs(5)));
    manager.start().unwrap();
    assert!(manager.wait(Duration::from_secs(5)));

    assert_matches!(
        manager.stop(),
        Err(ManagerError::Source(SourceError::Io(_)))
    );
    manager.start().unwrap();
    drop(manager);

    assert_eq!(connects.load(Ordering::SeqCst), 3);
    assert!(locations.lock().unwrap().len() >= 2);
    assert_eq!(
        events.lock().unwrap()[..6],
        ["STARTING", "STARTED", "STARTING", "STARTED", "STOPPING", "STOP_FAILED"]
    );
}

fn coordinate(value: f64, degree_digits: usize) -> String {
    let abs = value.abs();
    let degrees = abs.trunc();
    let minutes = (abs - degrees) * 60.0;
    format!(
        "{:0width$}{:08.5}",
        degrees as u32,
        minutes,
        width = degree_digits
    )
}

fn gga_at(n: u32, lat: f64, lon: f64) -> String {
    format!(
        "$GPGGA,1800{:02}.000,{},{},{},{},1,8,0.9,100.0,M,-33.4,M,,*00\r\n",
        n,
        coordinate(lat, 2),
        if lat < 0.0 { 'S' } else { 'N' },
        coordinate(lon, 3),
        if lon < 0.0 { 'W' } else { 'E' }
    )
}

#[test]
fn tracks_route_from_stream() {
    init_logger();
    let fixes = [
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
    ];
    let input: String = fixes
        .iter()
        .enumerate()
        .map(|(i, &(lat, lon))| gga_at(i as u32 + 1, lat, lon))
        .collect();

    let route = Arc::new(Route::new(
        "stream route",
        vec![
            Waypoint::new("wp1", 38.979896545410156, -77.54102325439453),
            Waypoint::new("wp2", 38.98295974731445, -77.53973388671875),
        ],
    ));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let listener: Arc<dyn RouteListener> = Arc::new(move |_: &Route, e: &WaypointEvent| {
        sink.lock().unwrap().push((e.kind, e.fix_time))
    });

    let config = Config::default().with_route_feed(RouteFeed::Gga);
    let mut manager = LocationManager::new(StreamSource::new(io::Cursor::new(input)), config);
    manager.add_route(route.clone(), 10.0, vec![listener]).unwrap();
    manager.start().unwrap();
    assert!(manager.wait(Duration::from_secs(5)));
    manager.stop().unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 11);
    assert_eq!(events[0], (WaypointEventType::EnteringPerimeter, 64_804_000));
    assert_eq!(events[9].0, WaypointEventType::LeavingPerimeter);
    assert_eq!(events[10], (WaypointEventType::ClosestToWaypoint, 64_808_000));
    assert_eq!(manager.route_tracker().current_waypoint(&route), Some(1));
    assert!(manager.remove_route(&route));
    assert!(!manager.remove_route(&route));
}

#[test]
fn reads_from_tcp_and_stops_promptly() {
    init_logger();
    let server = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = server.local_addr().unwrap();
    let (release_tx, release_rx) = ::std::sync::mpsc::channel::<()>();
    let sender = thread::spawn(move || {
        let (mut conn, _) = server.accept().unwrap();
        conn.write_all(GGA.as_bytes()).unwrap();
        conn.write_all(RMC.as_bytes()).unwrap();
        // keep the connection open until the client is done
        let _ = release_rx.recv();
    });

    let config = Config::default().with_read_timeout(Duration::from_millis(50));
    let source = TcpSource::new(addr.to_string(), config.read_timeout);
    let mut manager = LocationManager::new(source, config);
    let locations = collect_locations(&manager);
    manager.start().unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while locations.lock().unwrap().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(locations.lock().unwrap().len(), 1);
    assert!(manager.is_running());

    let stopping = Instant::now();
    manager.stop().unwrap();
    assert!(stopping.elapsed() < Duration::from_secs(2));
    assert!(!manager.is_running());

    release_tx.send(()).unwrap();
    sender.join().unwrap();
}
