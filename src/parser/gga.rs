use super::{
    direction, fl_as_f64, int_as, latitude, longitude, non_negative, optional, single,
    station_id, time_of_day, unit, FieldParser, LATITUDE, LONGITUDE,
};
use err::FieldError;
use reader::State;
use sentence::{FixQuality, GgaSentence, Sentence, TALKER_ID_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GgaField {
    UtcTime,
    Lat,
    LatDir,
    Lon,
    LonDir,
    FixQuality,
    Satellites,
    Hdop,
    Altitude,
    AltitudeUnits,
    GeoidalSeparation,
    GeoidalSeparationUnits,
    DgpsAge,
    DgpsStationId,
}

/// Parses the fields of a GGA sentence.
#[derive(Debug)]
pub struct GgaParser {
    field: GgaField,
    sentence: GgaSentence,
}

impl GgaParser {
    pub fn new() -> Self {
        GgaParser {
            field: GgaField::UtcTime,
            sentence: GgaSentence::default(),
        }
    }
}

impl Default for GgaParser {
    fn default() -> Self {
        GgaParser::new()
    }
}

impl FieldParser for GgaParser {
    fn sentence_type(&self) -> &'static [u8; 3] {
        b"GGA"
    }

    fn reset(&mut self, talker_id: [u8; TALKER_ID_LENGTH]) {
        self.field = GgaField::UtcTime;
        self.sentence = GgaSentence::default();
        self.sentence.header.talker_id = talker_id;
    }

    fn parse_field(&mut self, raw: &[u8]) -> State {
        trace!("GGA field {:?}: {:?}", self.field, String::from_utf8_lossy(raw));

        match self.field {
            GgaField::UtcTime => {
                self.sentence.time = try_field!(raw, "UTC time", time_of_day(raw));
                self.field = GgaField::Lat;
            }
            GgaField::Lat => {
                self.sentence.lat = try_field!(raw, "latitude", optional(raw, latitude));
                self.field = GgaField::LatDir;
            }
            GgaField::LatDir => {
                if let Some(sign) = try_field!(raw, "latitude direction", direction(raw, LATITUDE)) {
                    self.sentence.lat = self.sentence.lat.map(|lat| lat * sign);
                }
                self.field = GgaField::Lon;
            }
            GgaField::Lon => {
                self.sentence.lon = try_field!(raw, "longitude", optional(raw, longitude));
                self.field = GgaField::LonDir;
            }
            GgaField::LonDir => {
                if let Some(sign) = try_field!(raw, "longitude direction", direction(raw, LONGITUDE)) {
                    self.sentence.lon = self.sentence.lon.map(|lon| lon * sign);
                }
                self.field = GgaField::FixQuality;
            }
            GgaField::FixQuality => {
                let digit = try_field!(raw, "fix quality", single(raw, "fix quality"));
                self.sentence.fix_quality = try_field!(
                    raw,
                    "fix quality",
                    FixQuality::from_digit(digit).ok_or(FieldError::Indicator("fix quality", digit))
                );
                self.field = GgaField::Satellites;
            }
            GgaField::Satellites => {
                self.sentence.satellites =
                    try_field!(raw, "number of satellites", optional(raw, int_as::<u8>));
                self.field = GgaField::Hdop;
            }
            GgaField::Hdop => {
                self.sentence.hdop = try_field!(raw, "HDOP", optional(raw, fl_as_f64));
                self.field = GgaField::Altitude;
            }
            GgaField::Altitude => {
                self.sentence.altitude = try_field!(raw, "altitude", optional(raw, fl_as_f64));
                self.field = GgaField::AltitudeUnits;
            }
            GgaField::AltitudeUnits => {
                self.sentence.altitude_units = try_field!(raw, "altitude unit", unit(raw));
                self.field = GgaField::GeoidalSeparation;
            }
            GgaField::GeoidalSeparation => {
                self.sentence.geoidal_separation =
                    try_field!(raw, "geoidal separation", optional(raw, fl_as_f64));
                self.field = GgaField::GeoidalSeparationUnits;
            }
            GgaField::GeoidalSeparationUnits => {
                self.sentence.geoidal_separation_units =
                    try_field!(raw, "geoidal separation unit", unit(raw));
                self.field = GgaField::DgpsAge;
            }
            GgaField::DgpsAge => {
                self.sentence.dgps_age = try_field!(raw, "DGPS age", optional(raw, non_negative));
                self.field = GgaField::DgpsStationId;
            }
            GgaField::DgpsStationId => {
                self.sentence.dgps_station_id =
                    try_field!(raw, "DGPS station ID", optional(raw, station_id));
                return State::ReadingChecksum;
            }
        }

        State::ReadingField
    }

    fn sentence(&self) -> Sentence {
        Sentence::Gga(self.sentence.clone())
    }
}
