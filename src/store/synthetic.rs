//! Synthetic plant data for demo mode and tests.
//!
//! Generates ten-minute consumption readings for each machine with a few
//! scripted events so every detector has something to find:
//!
//! - Machine 1: stopped for the last 6h10m (open stop, alert-eligible)
//! - Machine 2: a closed 3h stop in the middle of the series
//! - Machine 3: consumption spikes in the last few hours
//! - Machine 4: meter offline for the last 30 minutes (absent values)
//!
//! Other machines run with plain noise.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::Reading;

const SAMPLE_MINUTES: i64 = 10;
const SEED: u64 = 0x5eed_2025;

/// Build `hours` of readings ending at `now` for each machine.
pub fn demo_readings(machines: &[String], hours: u64, now: DateTime<Utc>) -> Vec<Reading> {
    let mut rng = StdRng::seed_from_u64(SEED);
    let samples = (hours as i64 * 60) / SAMPLE_MINUTES;
    let start = now - Duration::minutes(samples * SAMPLE_MINUTES);

    let mut readings = Vec::with_capacity(machines.len() * (samples as usize + 1));
    for (idx, machine) in machines.iter().enumerate() {
        let base: f64 = rng.gen_range(20.0..120.0);

        for i in 0..=samples {
            let ts = start + Duration::minutes(i * SAMPLE_MINUTES);
            let to_now = now - ts;
            let noise = base * rng.gen_range(-0.03..0.03);
            let mut value = Some(base + noise);

            match idx {
                1 if to_now < Duration::minutes(6 * 60 + 10) => value = Some(0.0),
                2 if i > samples / 2 && i <= samples / 2 + 18 => value = Some(rng.gen_range(0.0..0.2)),
                3 if to_now < Duration::hours(4) && i % 7 == 0 => value = Some(base * 2.5),
                4 if to_now < Duration::minutes(30) => value = None,
                _ => {}
            }

            readings.push(Reading::new(machine.as_str(), ts, value));
        }
    }

    readings.sort_by_key(|r| r.timestamp);
    readings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn machines() -> Vec<String> {
        ["M0", "M1", "M2", "M3", "M4"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_demo_readings_cover_window() {
        let now = Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap();
        let readings = demo_readings(&machines(), 24, now);
        assert_eq!(readings.len(), 5 * (24 * 6 + 1));
        assert!(readings.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(readings.last().unwrap().timestamp, now);
    }

    #[test]
    fn test_demo_readings_deterministic() {
        let now = Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap();
        assert_eq!(demo_readings(&machines(), 6, now), demo_readings(&machines(), 6, now));
    }

    #[test]
    fn test_scripted_stop_and_outage() {
        let now = Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap();
        let readings = demo_readings(&machines(), 24, now);
        let last = |m: &str| readings.iter().rev().find(|r| r.machine_id == m).unwrap().value;
        assert_eq!(last("M1"), Some(0.0));
        assert_eq!(last("M4"), None);
        assert!(last("M0").unwrap() > 0.5);
    }
}
