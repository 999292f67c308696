use chrono;
use std::time::Duration;
use std::{io, num, str};

quick_error! {
    /// Malformed content in a single comma separated field.
    #[derive(Debug)]
    pub enum FieldError {
        Empty(field: &'static str) {
            display("Missing mandatory field {}", field)
        }
        Length(field: &'static str, found: usize) {
            display("Field {} has unexpected length {}", field, found)
        }
        Utf8(err: str::Utf8Error) {
            from()
            display("Field is not valid UTF-8: {}", err)
            cause(err)
        }
        Float(err: num::ParseFloatError) {
            from()
            display("Could not parse field as float: {}", err)
            cause(err)
        }
        Int(err: num::ParseIntError) {
            from()
            display("Could not parse field as integer: {}", err)
            cause(err)
        }
        Time(err: chrono::format::ParseError) {
            from()
            display("Failed to parse field as time of day: {}", err)
            cause(err)
        }
        Date(err: chrono::format::ParseError) {
            display("Failed to parse field as date: {}", err)
            cause(err)
        }
        Direction(c: u8) {
            display("Encountered unexpected direction \"{}\"", *c as char)
        }
        Indicator(field: &'static str, c: u8) {
            display("Encountered unexpected {} \"{}\"", field, *c as char)
        }
        OutOfRange(msg: &'static str) {
            display("Value out of range: {}", msg)
        }
        Coordinate(val: f64, max: f64) {
            display("Invalid coordinate: {} should be between {} and {}", val, max*-1.0, max)
        }
    }
}

quick_error! {
    /// Framing problems detected by the sentence reader. The reader logs them
    /// and waits for the next `$`.
    #[derive(Debug)]
    pub enum SyncError {
        Overflow(state: &'static str, capacity: usize) {
            display("Buffer overflow while reading {}: more than {} bytes", state, capacity)
        }
        TalkerId(c: u8) {
            display("Encountered invalid character {:?} in talker id", *c as char)
        }
        LineEnding(state: &'static str) {
            display("Unexpected line ending while reading {}", state)
        }
        SentenceType(len: usize) {
            display("Sentence type must have 3 characters, found {}", len)
        }
        ChecksumFormat(len: usize) {
            display("Checksum must be 2 hex digits, found {} characters", len)
        }
        ChecksumDigits(err: num::ParseIntError) {
            from()
            display("Checksum is not hexadecimal: {}", err)
            cause(err)
        }
        ChecksumMismatch(expected: u8, actual: u8) {
            display("Expected checksum \"{:02X}\", found checksum \"{:02X}\"", expected, actual)
        }
        Termination(c: u8) {
            display("Expected line feed after checksum, found {:?}", *c as char)
        }
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum ReaderError {
        AlreadyStarted {
            display("The NMEA reader has already been started")
        }
        StopTimeout(timeout: Duration) {
            display("The NMEA reader thread did not terminate within {:?}", timeout)
        }
        Io(err: io::Error) {
            from()
            display("Encountered I/O error in the NMEA reader: {}", err)
            cause(err)
        }
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum RouteError {
        AlreadyRegistered(name: String) {
            display("Route \"{}\" is already registered", name)
        }
        NoWaypoints(name: String) {
            display("Route \"{}\" has no waypoints", name)
        }
        InvalidTriggerDistance(distance: f64) {
            display("Trigger distance must be a positive number of meters, got {}", distance)
        }
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum SourceError {
        NotConnected {
            display("The byte source is not connected")
        }
        StreamTaken {
            display("The input stream of this source has already been handed out")
        }
        Io(err: io::Error) {
            from()
            display("Encountered I/O error in the byte source: {}", err)
            cause(err)
        }
    }
}

quick_error! {
    #[derive(Debug)]
    pub enum ManagerError {
        AlreadyStarted {
            display("The location manager has already been started")
        }
        Source(err: SourceError) {
            from()
            display("Byte source failure: {}", err)
            cause(err)
        }
        Reader(err: ReaderError) {
            from()
            display("NMEA reader failure: {}", err)
            cause(err)
        }
    }
}
