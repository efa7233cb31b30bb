//! Synthetic temperature readings of wind turbine gearbox sensors.
//!
//! An event is a comma separated record `timestamp, sensor id, location, value`,
//! where the timestamp is the send time in milliseconds since the unix epoch.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng as _;

mod locations;

pub use self::locations::LOCATIONS;

/// Location of the sensor with the given producer id.
pub fn location_for(producer_id: usize) -> &'static str {
    LOCATIONS[producer_id % LOCATIONS.len()]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorReading {
    pub timestamp: SystemTime,
    pub producer_id: usize,
    pub location: &'static str,
    pub value: u32,
}

impl SensorReading {
    /// A reading taken now, with a random value in `0..200`.
    pub fn sample(producer_id: usize, location: &'static str) -> Self {
        Self {
            timestamp: SystemTime::now(),
            producer_id,
            location,
            value: rand::rng().random_range(0..200),
        }
    }

    /// Encode as an event payload of exactly `size` bytes.
    ///
    /// Shorter records are padded with trailing spaces, longer ones truncated.
    pub fn to_payload(&self, size: usize) -> String {
        let record = format!(
            "{}, {}, {}, {}",
            epoch_millis(self.timestamp),
            self.producer_id,
            self.location,
            self.value
        );
        fit_to_size(record, size)
    }
}

fn fit_to_size(mut record: String, size: usize) -> String {
    if record.len() > size {
        let mut cut = size;
        while !record.is_char_boundary(cut) {
            cut -= 1;
        }
        record.truncate(cut);
    }
    let padding = size - record.len();
    record.extend(std::iter::repeat_n(' ', padding));
    record
}

fn epoch_millis(t: SystemTime) -> u128 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// Send time embedded in an event payload, if it has one.
pub fn parse_timestamp(payload: &str) -> Option<SystemTime> {
    let millis: u64 = payload.split(',').next()?.trim().parse().ok()?;
    UNIX_EPOCH.checked_add(Duration::from_millis(millis))
}
