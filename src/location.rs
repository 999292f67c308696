//! Fused location samples.

use std::fmt;

/// An immutable position fix combined from a GGA and an RMC sentence.
///
/// Optional values are `None` unless the builder set them; a speed of `0.0`
/// is a real measurement, not an absent one.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    received_time: i64,
    time: u32,
    lat: f64,
    lon: f64,
    altitude: Option<f64>,
    speed: Option<f64>,
    bearing: Option<f64>,
    accuracy: Option<f64>,
}

impl Location {
    /// Wall clock time in milliseconds since the unix epoch at which the
    /// position sentence started arriving.
    pub fn received_time(&self) -> i64 {
        self.received_time
    }

    /// UTC time of the fix in milliseconds since midnight.
    pub fn time(&self) -> u32 {
        self.time
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Altitude above mean sea level in meters.
    pub fn altitude(&self) -> Option<f64> {
        self.altitude
    }

    /// Speed over ground. Meters per second or knots, depending on the
    /// configured `FusionPolicy`.
    pub fn speed(&self) -> Option<f64> {
        self.speed
    }

    /// Heading in degrees true.
    pub fn bearing(&self) -> Option<f64> {
        self.bearing
    }

    /// Horizontal dilution of precision of the position.
    pub fn accuracy(&self) -> Option<f64> {
        self.accuracy
    }

    pub fn has_altitude(&self) -> bool {
        self.altitude.is_some()
    }

    pub fn has_speed(&self) -> bool {
        self.speed.is_some()
    }

    pub fn has_bearing(&self) -> bool {
        self.bearing.is_some()
    }

    pub fn has_accuracy(&self) -> bool {
        self.accuracy.is_some()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}ms ({:.6}, {:.6})", self.time, self.lat, self.lon)?;
        if let Some(alt) = self.altitude {
            write!(f, " alt {:.1}", alt)?;
        }
        if let Some(speed) = self.speed {
            write!(f, " speed {:.3}", speed)?;
        }
        if let Some(bearing) = self.bearing {
            write!(f, " bearing {:.2}", bearing)?;
        }
        if let Some(accuracy) = self.accuracy {
            write!(f, " hdop {:.2}", accuracy)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocationBuilder {
    received_time: i64,
    time: u32,
    lat: f64,
    lon: f64,
    altitude: Option<f64>,
    speed: Option<f64>,
    bearing: Option<f64>,
    accuracy: Option<f64>,
}

impl LocationBuilder {
    pub fn new(lat: f64, lon: f64) -> Self {
        LocationBuilder {
            lat,
            lon,
            ..LocationBuilder::default()
        }
    }

    pub fn received_time(mut self, millis: i64) -> Self {
        self.received_time = millis;
        self
    }

    pub fn time(mut self, millis_of_day: u32) -> Self {
        self.time = millis_of_day;
        self
    }

    pub fn altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing);
        self
    }

    pub fn accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn build(self) -> Location {
        Location {
            received_time: self.received_time,
            time: self.time,
            lat: self.lat,
            lon: self.lon,
            altitude: self.altitude,
            speed: self.speed,
            bearing: self.bearing,
            accuracy: self.accuracy,
        }
    }
}
