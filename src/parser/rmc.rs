use super::{
    date, direction, fl_as_f64, latitude, longitude, optional, single, time_of_day,
    FieldParser, LATITUDE, LONGITUDE,
};
use err::FieldError;
use reader::State;
use sentence::{ModeIndicator, RmcSentence, Sentence, StatusIndicator, TALKER_ID_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RmcField {
    UtcTime,
    Status,
    Lat,
    LatDir,
    Lon,
    LonDir,
    Speed,
    Heading,
    Date,
    MagneticVariation,
    MagneticVariationDir,
    Mode,
}

/// Parses the fields of an RMC sentence.
#[derive(Debug)]
pub struct RmcParser {
    field: RmcField,
    sentence: RmcSentence,
}

impl RmcParser {
    pub fn new() -> Self {
        RmcParser {
            field: RmcField::UtcTime,
            sentence: RmcSentence::default(),
        }
    }
}

impl Default for RmcParser {
    fn default() -> Self {
        RmcParser::new()
    }
}

fn status(c: u8) -> Result<StatusIndicator, FieldError> {
    match c {
        b'A' => Ok(StatusIndicator::Active),
        b'V' => Ok(StatusIndicator::Void),
        _ => Err(FieldError::Indicator("status", c)),
    }
}

impl FieldParser for RmcParser {
    fn sentence_type(&self) -> &'static [u8; 3] {
        b"RMC"
    }

    fn reset(&mut self, talker_id: [u8; TALKER_ID_LENGTH]) {
        self.field = RmcField::UtcTime;
        self.sentence = RmcSentence::default();
        self.sentence.header.talker_id = talker_id;
    }

    fn parse_field(&mut self, raw: &[u8]) -> State {
        trace!("RMC field {:?}: {:?}", self.field, String::from_utf8_lossy(raw));

        match self.field {
            RmcField::UtcTime => {
                self.sentence.time = try_field!(raw, "UTC time", time_of_day(raw));
                self.field = RmcField::Status;
            }
            RmcField::Status => {
                let c = try_field!(raw, "status indicator", single(raw, "status indicator"));
                self.sentence.status = try_field!(raw, "status indicator", status(c));
                self.field = RmcField::Lat;
            }
            RmcField::Lat => {
                self.sentence.lat = try_field!(raw, "latitude", optional(raw, latitude));
                self.field = RmcField::LatDir;
            }
            RmcField::LatDir => {
                if let Some(sign) = try_field!(raw, "latitude direction", direction(raw, LATITUDE)) {
                    self.sentence.lat = self.sentence.lat.map(|lat| lat * sign);
                }
                self.field = RmcField::Lon;
            }
            RmcField::Lon => {
                self.sentence.lon = try_field!(raw, "longitude", optional(raw, longitude));
                self.field = RmcField::LonDir;
            }
            RmcField::LonDir => {
                if let Some(sign) = try_field!(raw, "longitude direction", direction(raw, LONGITUDE)) {
                    self.sentence.lon = self.sentence.lon.map(|lon| lon * sign);
                }
                self.field = RmcField::Speed;
            }
            RmcField::Speed => {
                self.sentence.speed = try_field!(raw, "speed", optional(raw, fl_as_f64));
                self.field = RmcField::Heading;
            }
            RmcField::Heading => {
                self.sentence.heading = try_field!(raw, "heading", optional(raw, fl_as_f64));
                self.field = RmcField::Date;
            }
            RmcField::Date => {
                self.sentence.date = try_field!(raw, "date", optional(raw, date));
                self.field = RmcField::MagneticVariation;
            }
            RmcField::MagneticVariation => {
                self.sentence.magnetic_variation =
                    try_field!(raw, "magnetic variation", optional(raw, fl_as_f64));
                self.field = RmcField::MagneticVariationDir;
            }
            RmcField::MagneticVariationDir => {
                if let Some(sign) = try_field!(
                    raw,
                    "magnetic variation direction",
                    direction(raw, LONGITUDE)
                ) {
                    self.sentence.magnetic_variation =
                        self.sentence.magnetic_variation.map(|var| var * sign);
                }
                self.field = RmcField::Mode;
            }
            RmcField::Mode => {
                let c = try_field!(raw, "mode indicator", single(raw, "mode indicator"));
                self.sentence.mode = try_field!(
                    raw,
                    "mode indicator",
                    ModeIndicator::from_letter(c).ok_or(FieldError::Indicator("mode indicator", c))
                );
                return State::ReadingChecksum;
            }
        }

        State::ReadingField
    }

    fn sentence(&self) -> Sentence {
        Sentence::Rmc(self.sentence.clone())
    }
}
