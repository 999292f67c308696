extern crate clap;
extern crate env_logger;
#[macro_use]
extern crate log;
extern crate nmea_route;

use clap::{Parser, ValueEnum};

use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use nmea_route::{
    ByteSource, Config, FileSource, FusionPolicy, LifecycleEvent, Location, LocationManager,
    Route, RouteFeed, RouteListener, Sentence, StreamSource, TcpSource, Waypoint, WaypointEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Feed {
    Gga,
    Rmc,
    Location,
}

impl From<Feed> for RouteFeed {
    fn from(feed: Feed) -> Self {
        match feed {
            Feed::Gga => RouteFeed::Gga,
            Feed::Rmc => RouteFeed::Rmc,
            Feed::Location => RouteFeed::Location,
        }
    }
}

/// Read NMEA 0183 GGA/RMC sentences, print fused locations and track a route.
#[derive(Debug, Parser)]
#[command(name = "nmea-route", version)]
struct Args {
    /// NMEA log to replay, `-` reads stdin
    #[arg(required_unless_present = "tcp", conflicts_with = "tcp")]
    input: Option<PathBuf>,

    /// Read from an NMEA server instead
    #[arg(long, value_name = "HOST:PORT")]
    tcp: Option<String>,

    /// Waypoint of the route to track, in order; may be repeated
    #[arg(long = "waypoint", value_name = "ID,LAT,LON", value_parser = parse_waypoint)]
    waypoints: Vec<Waypoint>,

    /// Trigger distance around each waypoint in meters
    #[arg(long, default_value_t = 10.0)]
    trigger: f64,

    /// Updates driving the route tracking
    #[arg(long, value_enum, default_value_t = Feed::Gga)]
    feed: Feed,

    /// Maximum difference of GGA and RMC fix times in milliseconds
    #[arg(long, default_value_t = 100)]
    fusion_window: u32,

    /// Report speed in knots together with the HDOP
    #[arg(long)]
    raw_speed: bool,

    /// Drop sentences whose checksum does not match
    #[arg(long)]
    verify_checksum: bool,

    /// Also print every sentence read
    #[arg(long)]
    sentences: bool,
}

fn parse_waypoint(arg: &str) -> Result<Waypoint, String> {
    let parts: Vec<&str> = arg.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected ID,LAT,LON, got {:?}", arg));
    }
    let lat: f64 = parts[1]
        .trim()
        .parse()
        .map_err(|e| format!("invalid latitude {:?}: {}", parts[1], e))?;
    let lon: f64 = parts[2]
        .trim()
        .parse()
        .map_err(|e| format!("invalid longitude {:?}: {}", parts[2], e))?;
    if lat.abs() > 90.0 || lon.abs() > 180.0 {
        return Err(format!("coordinates out of range: {}, {}", lat, lon));
    }
    Ok(Waypoint::new(parts[0].trim(), lat, lon))
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let policy = if args.raw_speed {
        FusionPolicy::RawSpeedWithAccuracy
    } else {
        FusionPolicy::ConvertSpeed
    };
    let config = Config::default()
        .with_fusion_window_ms(args.fusion_window)
        .with_fusion_policy(policy)
        .with_route_feed(args.feed.into())
        .with_checksum_verification(args.verify_checksum);

    let source: Box<dyn ByteSource> = match (args.tcp, args.input) {
        (Some(addr), _) => Box::new(TcpSource::new(addr, config.read_timeout)),
        (None, Some(ref path)) if path.to_str() == Some("-") => {
            Box::new(StreamSource::new(io::stdin()))
        }
        (None, Some(path)) => Box::new(FileSource::new(path)),
        (None, None) => return Err("no input given".into()),
    };

    let mut manager = LocationManager::new(source, config);
    manager.add_lifecycle_listener(Arc::new(|event: &LifecycleEvent| info!("{}", event)));
    manager.add_location_listener(Arc::new(|location: &Location| {
        println!("location {}", location)
    }));
    if args.sentences {
        manager.add_sentence_listener(Arc::new(|sentence: &Sentence| {
            println!("sentence {}", sentence)
        }));
    }

    if !args.waypoints.is_empty() {
        let route = Arc::new(Route::new("command line", args.waypoints));
        let printer: Arc<dyn RouteListener> = Arc::new(|route: &Route, event: &WaypointEvent| {
            let id = route
                .waypoint(event.waypoint_index)
                .map(|wp| wp.id())
                .unwrap_or("?");
            println!(
                "waypoint {} {} at {:.2}m (fix {}ms)",
                id, event.kind, event.distance, event.fix_time
            )
        });
        manager.add_route(route, args.trigger, vec![printer])?;
    }

    manager.start()?;
    while !manager.wait(Duration::from_secs(1)) {}
    manager.stop()?;
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(err) = run(Args::parse()) {
        error!("{}", err);
        eprintln!("nmea-route: {}", err);
        process::exit(1);
    }
}
