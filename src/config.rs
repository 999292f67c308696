use std::time::Duration;

/// Knots to meters per second.
pub const KNOTS_TO_MPS: f64 = 0.514444444;

/// How the speed of a fused `Location` is derived from the RMC sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionPolicy {
    /// Speed in meters per second, no accuracy.
    ConvertSpeed,
    /// Speed in knots as reported, accuracy set to the GGA HDOP.
    RawSpeedWithAccuracy,
}

impl Default for FusionPolicy {
    fn default() -> Self {
        FusionPolicy::ConvertSpeed
    }
}

/// Which updates drive route tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteFeed {
    /// Every valid GGA sentence.
    Gga,
    /// Every valid RMC sentence.
    Rmc,
    /// Every fused location.
    Location,
}

impl Default for RouteFeed {
    fn default() -> Self {
        RouteFeed::Gga
    }
}

/// Settings of a `LocationManager`.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// GGA and RMC fuse when their fix times differ by less than this.
    pub fusion_window_ms: u32,
    pub fusion_policy: FusionPolicy,
    pub route_feed: RouteFeed,
    /// Check the checksum field against the XOR of the sentence.
    pub verify_checksum: bool,
    /// Upper bound for joining the reader thread on stop.
    pub stop_timeout: Duration,
    /// Read timeout of network sources; bounds how long a stop request can
    /// go unnoticed by a blocked reader.
    pub read_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            fusion_window_ms: 100,
            fusion_policy: FusionPolicy::default(),
            route_feed: RouteFeed::default(),
            verify_checksum: false,
            stop_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_millis(250),
        }
    }
}

impl Config {
    pub fn with_fusion_window_ms(mut self, window: u32) -> Self {
        self.fusion_window_ms = window;
        self
    }

    pub fn with_fusion_policy(mut self, policy: FusionPolicy) -> Self {
        self.fusion_policy = policy;
        self
    }

    pub fn with_route_feed(mut self, feed: RouteFeed) -> Self {
        self.route_feed = feed;
        self
    }

    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}
