//! Selection of object keys by the capture time embedded in their names.
//!
//! VIIRS SDR keys look like
//! `VIIRS-I1-SDR/2024/02/20/SVI01_j01_d20240220_t1705308_e1706553_b32345_c20240220174017188614_oeac_ops.h5`.
//! The capture start time is the `d<YYYYMMDD>_t<HHMMSS>` run between the first `_d` and the
//! following `_e`.
use crate::error::KeyError;
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::warn;

static CAPTURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(d.*?)_e").expect("Regex pattern should always compile"));

/// Half-open interval `[start, end)` of naive capture times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts < self.end
    }
}

/// What to do with a key that carries no readable capture time.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MalformedKeyPolicy {
    /// Fail the whole batch on the first malformed key.
    #[default]
    Abort,
    /// Drop the key and log a warning.
    Skip,
}

/// Extract the capture start time from an object key.
pub fn parse_capture_time(key: &str) -> Result<NaiveDateTime, KeyError> {
    let segment = CAPTURE_RE
        .captures(key)
        .and_then(|c| c.get(1))
        .ok_or_else(|| KeyError::malformed(key, "no '_d..._e' segment"))?
        .as_str();

    let field = |range: std::ops::Range<usize>, name: &str| -> Result<u32, KeyError> {
        segment
            .get(range)
            .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| KeyError::malformed(key, format!("unreadable {name} in '{segment}'")))
    };

    let year = field(1..5, "year")?;
    let month = field(5..7, "month")?;
    let day = field(7..9, "day")?;
    let hour = field(11..13, "hour")?;
    let minute = field(13..15, "minute")?;
    let second = field(15..17, "second")?;

    NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(|| KeyError::malformed(key, format!("invalid date/time in '{segment}'")))
}

/// Keep the keys whose capture time lies in `window`, in input order.
pub fn filter_keys<S: AsRef<str>>(
    keys: &[S],
    window: &TimeWindow,
    policy: MalformedKeyPolicy,
) -> Result<Vec<String>, KeyError> {
    let mut selected = vec![];
    for key in keys {
        let key = key.as_ref();
        let ts = match parse_capture_time(key) {
            Ok(ts) => ts,
            Err(e) if policy == MalformedKeyPolicy::Skip => {
                warn!("{e}, skipping");
                continue;
            }
            Err(e) => return Err(e),
        };
        if window.contains(ts) {
            selected.push(key.to_string());
        }
    }
    Ok(selected)
}
