//! Field parsers for the *GGA* and *RMC* sentences of the *NMEA 0183*
//! protocol.
//!
//! The [reader](../reader/index.html) splits a sentence into fields and hands
//! them one at a time to the parser registered for the sentence type. Each
//! parser walks its fields in strict order and accumulates a typed sentence.

mod gga;
mod rmc;

pub use self::gga::GgaParser;
pub use self::rmc::RmcParser;

use chrono::{NaiveDate, NaiveTime, Timelike};
use std::str::{self, FromStr};

use err::FieldError;
use reader::State;
use sentence::{Sentence, TALKER_ID_LENGTH};

const ABS_MAX_LAT: f64 = 90.0;
const ABS_MAX_LON: f64 = 180.0;
const MAX_STATION_ID: u16 = 1023;

/// A state machine turning the fields of one sentence type into a `Sentence`.
pub trait FieldParser: Send {
    /// The three letter sentence type this parser handles, e.g. `b"GGA"`.
    fn sentence_type(&self) -> &'static [u8; 3];

    /// Start a fresh sentence. Called by the reader before the first field.
    fn reset(&mut self, talker_id: [u8; TALKER_ID_LENGTH]);

    /// Consume the next field (without delimiters) and tell the reader what
    /// to do next: keep reading fields, read the checksum after the final
    /// field, or re-synchronize on malformed content.
    fn parse_field(&mut self, field: &[u8]) -> State;

    /// The sentence built so far. Only complete once `parse_field` returned
    /// `State::ReadingChecksum`.
    fn sentence(&self) -> Sentence;
}

/// The cardinal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CardDir {
    North,
    South,
    East,
    West,
}

impl CardDir {
    #[inline]
    fn sign(&self) -> f64 {
        match *self {
            CardDir::North | CardDir::East => 1.0,
            CardDir::South | CardDir::West => -1.0,
        }
    }

    #[inline]
    fn from_letter(c: u8) -> Option<CardDir> {
        match c {
            b'N' => Some(CardDir::North),
            b'S' => Some(CardDir::South),
            b'E' => Some(CardDir::East),
            b'W' => Some(CardDir::West),
            _ => None,
        }
    }
}

const LATITUDE: [CardDir; 2] = [CardDir::North, CardDir::South];
const LONGITUDE: [CardDir; 2] = [CardDir::East, CardDir::West];

/// Parse an optional single letter direction and return its sign. Only the
/// two letters in `allowed` are accepted.
fn direction(field: &[u8], allowed: [CardDir; 2]) -> Result<Option<f64>, FieldError> {
    match field.len() {
        0 => Ok(None),
        1 => match CardDir::from_letter(field[0]) {
            Some(dir) if allowed.contains(&dir) => Ok(Some(dir.sign())),
            _ => Err(FieldError::Direction(field[0])),
        },
        n => Err(FieldError::Length("direction", n)),
    }
}

/// Returns the single character of a one character field.
fn single(field: &[u8], name: &'static str) -> Result<u8, FieldError> {
    match field.len() {
        1 => Ok(field[0]),
        n => Err(FieldError::Length(name, n)),
    }
}

/// A unit letter, which receivers without a fix may leave empty.
fn unit(field: &[u8]) -> Result<Option<u8>, FieldError> {
    match field.len() {
        0 => Ok(None),
        1 => Ok(Some(field[0])),
        n => Err(FieldError::Length("unit", n)),
    }
}

/// Runs `decode` unless the field was omitted.
fn optional<T, F>(field: &[u8], decode: F) -> Result<Option<T>, FieldError>
where
    F: FnOnce(&[u8]) -> Result<T, FieldError>,
{
    if field.is_empty() {
        Ok(None)
    } else {
        decode(field).map(Some)
    }
}

#[inline]
fn fl_as_f64(fl: &[u8]) -> Result<f64, FieldError> {
    let val = f64::from_str(str::from_utf8(fl)?)?;
    if !val.is_finite() {
        return Err(FieldError::OutOfRange("number must be finite"));
    }
    Ok(val)
}

#[inline]
fn int_as<T: FromStr<Err = ::std::num::ParseIntError>>(int: &[u8]) -> Result<T, FieldError> {
    Ok(T::from_str(str::from_utf8(int)?)?)
}

/// Parse a `DDDMM.MMMM` coordinate into unsigned decimal degrees.
/// `abs_max` is maximum value in degree, e.g. 180 for longitude.
fn coordinate(coord: &[u8], abs_max: f64) -> Result<f64, FieldError> {
    let raw = fl_as_f64(coord)?;
    if raw < 0.0 {
        return Err(FieldError::OutOfRange("coordinates carry their sign in the direction field"));
    }
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    if minutes >= 60.0 {
        return Err(FieldError::OutOfRange("minutes must be below 60"));
    }
    let dec_deg = degrees + minutes / 60.0;
    if dec_deg > abs_max {
        return Err(FieldError::Coordinate(dec_deg, abs_max));
    }
    Ok(dec_deg)
}

fn latitude(field: &[u8]) -> Result<f64, FieldError> {
    coordinate(field, ABS_MAX_LAT)
}

fn longitude(field: &[u8]) -> Result<f64, FieldError> {
    coordinate(field, ABS_MAX_LON)
}

/// Converts a `hhmmss.sss` field into milliseconds since midnight.
fn time_of_day(utc: &[u8]) -> Result<u32, FieldError> {
    if utc.is_empty() {
        return Err(FieldError::Empty("UTC time"));
    }
    if utc.len() < 6 {
        return Err(FieldError::Length("UTC time", utc.len()));
    }
    let time = NaiveTime::parse_from_str(str::from_utf8(utc)?, "%H%M%S%.f")?;
    Ok(time.num_seconds_from_midnight() * 1000 + time.nanosecond() / 1_000_000)
}

/// Converts a `ddmmyy` field into a date.
fn date(field: &[u8]) -> Result<NaiveDate, FieldError> {
    if field.len() != 6 {
        return Err(FieldError::Length("date", field.len()));
    }
    NaiveDate::parse_from_str(str::from_utf8(field)?, "%d%m%y").map_err(FieldError::Date)
}

fn station_id(field: &[u8]) -> Result<u16, FieldError> {
    match int_as::<u16>(field)? {
        id if id <= MAX_STATION_ID => Ok(id),
        _ => Err(FieldError::OutOfRange(
            "station_id must be between 0 and 1023",
        )),
    }
}

fn non_negative(field: &[u8]) -> Result<f64, FieldError> {
    match fl_as_f64(field)? {
        f if f < 0.0 => Err(FieldError::OutOfRange("age of the data cannot be negative")),
        f => Ok(f),
    }
}
