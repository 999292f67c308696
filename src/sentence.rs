//! Typed records for the position bearing sentences of the *NMEA 0183*
//! protocol.

use chrono::NaiveDate;
use std::fmt;

/// Length of the talker identifier following the `$`.
pub const TALKER_ID_LENGTH: usize = 2;

/// Indicator of the quality of gps data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixQuality {
    Invalid,
    Gps,
    Dgps,
    Pps,
    RealTimeKinematic,
    FloatRtk,
    Estimated,
    ManualInput,
    Simulation,
}

impl FixQuality {
    /// Takes the digit in the range `0..=8` and returns the corresponding
    /// `FixQuality`.
    #[inline]
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            b'0' => Some(FixQuality::Invalid),
            b'1' => Some(FixQuality::Gps),
            b'2' => Some(FixQuality::Dgps),
            b'3' => Some(FixQuality::Pps),
            b'4' => Some(FixQuality::RealTimeKinematic),
            b'5' => Some(FixQuality::FloatRtk),
            b'6' => Some(FixQuality::Estimated),
            b'7' => Some(FixQuality::ManualInput),
            b'8' => Some(FixQuality::Simulation),
            _ => None,
        }
    }
}

impl Default for FixQuality {
    fn default() -> Self {
        FixQuality::Invalid
    }
}

/// RMC data status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIndicator {
    Active,
    Void,
}

impl Default for StatusIndicator {
    fn default() -> Self {
        StatusIndicator::Void
    }
}

/// RMC positioning system mode (NMEA 2.3 and later).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeIndicator {
    Autonomous,
    Differential,
    Estimated,
    Manual,
    Simulated,
    NotValid,
}

impl ModeIndicator {
    #[inline]
    pub fn from_letter(letter: u8) -> Option<Self> {
        match letter {
            b'A' => Some(ModeIndicator::Autonomous),
            b'D' => Some(ModeIndicator::Differential),
            b'E' => Some(ModeIndicator::Estimated),
            b'M' => Some(ModeIndicator::Manual),
            b'S' => Some(ModeIndicator::Simulated),
            b'N' => Some(ModeIndicator::NotValid),
            _ => None,
        }
    }
}

impl Default for ModeIndicator {
    fn default() -> Self {
        ModeIndicator::NotValid
    }
}

/// Data common to every sentence, filled in by the reader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    /// Talker id contained in the header of every sentence.
    pub talker_id: [u8; TALKER_ID_LENGTH],
    /// Wall clock time in milliseconds since the unix epoch at which the `$`
    /// of this sentence was read.
    pub started_at: i64,
    /// Wall clock time in milliseconds since the unix epoch at which the
    /// sentence was completed.
    pub finished_at: i64,
}

impl Header {
    pub fn talker(&self) -> String {
        String::from_utf8_lossy(&self.talker_id).into_owned()
    }
}

/// A GGA sentence (global positioning system fix data).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GgaSentence {
    pub header: Header,
    /// UTC time of the fix in milliseconds since midnight.
    pub time: u32,
    /// Latitude in decimal degrees.
    /// A positive value indicates that the coordinate is in the northern hemisphere.
    /// A negative value indicates that the coordinate is in the southern hemisphere.
    pub lat: Option<f64>,
    /// Longitude in decimal degrees.
    /// A positive value indicates that the coordinate is in the eastern hemisphere.
    /// A negative value indicates that the coordinate is in the western hemisphere.
    pub lon: Option<f64>,
    /// Indicates the quality of the gps data.
    pub fix_quality: FixQuality,
    /// Number of satellites in use.
    pub satellites: Option<u8>,
    /// Horizontal dilution of precision
    pub hdop: Option<f64>,
    /// Antenna altitude above/below mean-sea-level (geoid)
    pub altitude: Option<f64>,
    pub altitude_units: Option<u8>,
    /// Geoidal separation, the difference between the WGS-84 earth ellipsoid
    /// and mean-sea-level (geoid), "-" means mean-sea-level below ellipsoid
    pub geoidal_separation: Option<f64>,
    pub geoidal_separation_units: Option<u8>,
    /// Age of differential GPS data, time in seconds since last SC104 type
    /// 1 or 9 update, null field when DGPS is not used
    pub dgps_age: Option<f64>,
    /// Differential reference station ID, 0000-1023
    pub dgps_station_id: Option<u16>,
}

impl GgaSentence {
    pub fn is_valid_fix(&self) -> bool {
        self.fix_quality != FixQuality::Invalid && self.lat.is_some() && self.lon.is_some()
    }
}

/// An RMC sentence (recommended minimum specific GNSS data).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RmcSentence {
    pub header: Header,
    /// UTC time of the fix in milliseconds since midnight.
    pub time: u32,
    pub status: StatusIndicator,
    /// Latitude in decimal degrees, negative in the southern hemisphere.
    pub lat: Option<f64>,
    /// Longitude in decimal degrees, negative in the western hemisphere.
    pub lon: Option<f64>,
    /// Speed over ground in knots.
    pub speed: Option<f64>,
    /// Track made good in degrees true.
    pub heading: Option<f64>,
    pub date: Option<NaiveDate>,
    /// Magnetic variation in degrees, negative for a westerly declination.
    pub magnetic_variation: Option<f64>,
    pub mode: ModeIndicator,
}

impl RmcSentence {
    pub fn is_valid_fix(&self) -> bool {
        self.status == StatusIndicator::Active
            && (self.mode == ModeIndicator::Autonomous || self.mode == ModeIndicator::Differential)
            && self.lat.is_some()
            && self.lon.is_some()
    }
}

/// A completely parsed sentence of one of the supported types.
#[derive(Debug, Clone, PartialEq)]
pub enum Sentence {
    Gga(GgaSentence),
    Rmc(RmcSentence),
}

impl Sentence {
    pub fn header(&self) -> &Header {
        match *self {
            Sentence::Gga(ref gga) => &gga.header,
            Sentence::Rmc(ref rmc) => &rmc.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut Header {
        match *self {
            Sentence::Gga(ref mut gga) => &mut gga.header,
            Sentence::Rmc(ref mut rmc) => &mut rmc.header,
        }
    }

    /// The three letter sentence type.
    pub fn kind(&self) -> &'static str {
        match *self {
            Sentence::Gga(_) => "GGA",
            Sentence::Rmc(_) => "RMC",
        }
    }

    pub fn fix_time(&self) -> u32 {
        match *self {
            Sentence::Gga(ref gga) => gga.time,
            Sentence::Rmc(ref rmc) => rmc.time,
        }
    }

    /// Whether the receiver reported a usable fix in this sentence.
    pub fn is_valid_fix(&self) -> bool {
        match *self {
            Sentence::Gga(ref gga) => gga.is_valid_fix(),
            Sentence::Rmc(ref rmc) => rmc.is_valid_fix(),
        }
    }

    /// Latitude and longitude, if both are present.
    pub fn position(&self) -> Option<(f64, f64)> {
        let (lat, lon) = match *self {
            Sentence::Gga(ref gga) => (gga.lat, gga.lon),
            Sentence::Rmc(ref rmc) => (rmc.lat, rmc.lon),
        };
        match (lat, lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let header = self.header();
        write!(
            f,
            "{}{} at {}ms",
            header.talker(),
            self.kind(),
            self.fix_time()
        )?;
        if let Some((lat, lon)) = self.position() {
            write!(f, " ({:.6}, {:.6})", lat, lon)?;
        }
        if !self.is_valid_fix() {
            write!(f, " without fix")?;
        }
        Ok(())
    }
}
