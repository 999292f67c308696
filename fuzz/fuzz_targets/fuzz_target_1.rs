#![no_main]
#[macro_use] extern crate libfuzzer_sys;
extern crate nmea_route;

use nmea_route::SentenceReader;

fuzz_target!(|data: &[u8]| {
    let mut reader = SentenceReader::new().with_checksum_verification(data.len() % 2 == 0);

    for sentence in reader.feed_all(data) {
        let _ = sentence.position();
    }
});
