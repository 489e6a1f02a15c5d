//! Sunrise/sunset arithmetic for the day/night scheduler.
//!
//! Uses the NOAA general solar position approximation (fractional year,
//! equation of time, declination, hour angle). Everything is computed in UTC;
//! local time only shows up in [`local_display`] for log lines.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::error::CoreError;

/// Zenith angle of the sun's upper limb at the horizon, refraction included.
const HORIZON_ZENITH_DEG: f64 = 90.833;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SunPhase {
    Sunrise,
    Sunset,
}

impl SunPhase {
    #[cfg(test)]
    pub fn opposite(self) -> Self {
        match self {
            SunPhase::Sunrise => SunPhase::Sunset,
            SunPhase::Sunset => SunPhase::Sunrise,
        }
    }

    /// Phase that matches the current sky: `Sunrise` while the sun is up.
    pub fn for_sun_up(sun_up: bool) -> Self {
        if sun_up {
            SunPhase::Sunrise
        } else {
            SunPhase::Sunset
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SunPhase::Sunrise => "sunrise",
            SunPhase::Sunset => "sunset",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sunrise" | "day" => Some(SunPhase::Sunrise),
            "sunset" | "night" => Some(SunPhase::Sunset),
            _ => None,
        }
    }
}

impl std::fmt::Display for SunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub at: DateTime<Utc>,
    pub phase: SunPhase,
}

struct SolarTerms {
    eqtime_min: f64,
    declination: f64,
}

fn days_in_year(year: i32) -> f64 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366.0
    } else {
        365.0
    }
}

fn solar_terms(year: i32, day_of_year: u32, hour: f64) -> SolarTerms {
    let gamma = 2.0 * PI / days_in_year(year) * (day_of_year as f64 - 1.0 + (hour - 12.0) / 24.0);

    let eqtime_min = 229.18
        * (0.000075 + 0.001868 * gamma.cos()
            - 0.032077 * gamma.sin()
            - 0.014615 * (2.0 * gamma).cos()
            - 0.040849 * (2.0 * gamma).sin());

    let declination = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
        - 0.006758 * (2.0 * gamma).cos()
        + 0.000907 * (2.0 * gamma).sin()
        - 0.002697 * (3.0 * gamma).cos()
        + 0.00148 * (3.0 * gamma).sin();

    SolarTerms {
        eqtime_min,
        declination,
    }
}

/// Solar elevation above the horizon in degrees.
pub fn solar_elevation(latitude: f64, longitude: f64, at: DateTime<Utc>) -> f64 {
    let hour = at.hour() as f64 + at.minute() as f64 / 60.0 + at.second() as f64 / 3600.0;
    let terms = solar_terms(at.year(), at.ordinal(), hour);

    let true_solar_min = hour * 60.0 + terms.eqtime_min + 4.0 * longitude;
    let hour_angle = (true_solar_min / 4.0 - 180.0).to_radians();
    let lat = latitude.to_radians();

    let cos_zenith = lat.sin() * terms.declination.sin()
        + lat.cos() * terms.declination.cos() * hour_angle.cos();

    90.0 - cos_zenith.clamp(-1.0, 1.0).acos().to_degrees()
}

pub fn is_sun_up(latitude: f64, longitude: f64, at: DateTime<Utc>) -> bool {
    solar_elevation(latitude, longitude, at) > 90.0 - HORIZON_ZENITH_DEG
}

/// Sunrise and sunset for the solar day whose noon falls on `date` (UTC).
/// `None` during polar day or polar night.
fn transitions_on(latitude: f64, longitude: f64, date: NaiveDate) -> Option<[Transition; 2]> {
    let terms = solar_terms(date.year(), date.ordinal(), 12.0);
    let lat = latitude.to_radians();

    let cos_hour_angle = HORIZON_ZENITH_DEG.to_radians().cos()
        / (lat.cos() * terms.declination.cos())
        - lat.tan() * terms.declination.tan();

    if !(-1.0..=1.0).contains(&cos_hour_angle) {
        return None;
    }

    let hour_angle = cos_hour_angle.acos().to_degrees();
    let sunrise_min = 720.0 - 4.0 * (longitude + hour_angle) - terms.eqtime_min;
    let sunset_min = 720.0 - 4.0 * (longitude - hour_angle) - terms.eqtime_min;

    let midnight = date.and_hms_opt(0, 0, 0)?.and_utc();
    let offset = |minutes: f64| midnight + Duration::milliseconds((minutes * 60_000.0).round() as i64);

    Some([
        Transition {
            at: offset(sunrise_min),
            phase: SunPhase::Sunrise,
        },
        Transition {
            at: offset(sunset_min),
            phase: SunPhase::Sunset,
        },
    ])
}

/// Earliest sunrise or sunset strictly after `after`.
///
/// Scans the solar days around `after`; a location with no transition in that
/// window (polar day/night) yields `NoTransitionAvailable` instead of searching
/// further.
pub fn next_transition(
    latitude: f64,
    longitude: f64,
    after: DateTime<Utc>,
) -> Result<Transition, CoreError> {
    let anchor = after.date_naive();
    let mut best: Option<Transition> = None;

    for offset in -1..=2 {
        let Some(date) = anchor.checked_add_signed(Duration::days(offset)) else {
            continue;
        };
        let Some(events) = transitions_on(latitude, longitude, date) else {
            continue;
        };
        for event in events {
            if event.at > after && best.is_none_or(|b| event.at < b.at) {
                best = Some(event);
            }
        }
    }

    best.ok_or_else(|| {
        CoreError::NoTransitionAvailable(format!(
            "{:.4},{:.4} after {}",
            latitude,
            longitude,
            after.to_rfc3339()
        ))
    })
}

/// `2024-06-21 03:43:10 UTC (05:43:10 local)` style rendering for logs.
pub fn local_display(at: DateTime<Utc>) -> String {
    format!(
        "{} ({} local)",
        at.format("%Y-%m-%d %H:%M:%S UTC"),
        at.with_timezone(&Local).format("%H:%M:%S")
    )
}
