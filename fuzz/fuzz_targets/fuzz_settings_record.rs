//! Fuzz target: `SettingsRecord::from_bytes` and payload decode
//!
//! Feeds arbitrary flash images through the record parser and asserts
//! that validity depends only on the two markers and that decoding a
//! corrupt payload returns an error instead of panicking.
//!
//! cargo fuzz run fuzz_settings_record

#![no_main]

use elecdie::settings::{SETTINGS_RECORD_SIZE, SETTINGS_VALID_KEY, SettingsRecord};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut image = [0xFFu8; SETTINGS_RECORD_SIZE];
    let n = data.len().min(SETTINGS_RECORD_SIZE);
    image[..n].copy_from_slice(&data[..n]);

    let record = SettingsRecord::from_bytes(&image);
    assert_eq!(
        record.is_valid(),
        record.head == SETTINGS_VALID_KEY && record.tail == SETTINGS_VALID_KEY
    );

    if let Ok(settings) = record.settings() {
        // Anything that decodes must re-encode into a record of the same size.
        let again = SettingsRecord::from_settings(&settings);
        assert!(again.is_ok());
    }
});
