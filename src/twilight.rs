//! Nautical twilight calculation.
//!
//! Uses a low-precision solar ephemeris (mean anomaly, equation of centre and
//! the equation-of-time transit correction), which is good to about a minute
//! for the years this monitor runs in. Nautical dusk and dawn are the instants
//! the sun's centre crosses -12°, lowered further by the horizon dip of an
//! elevated observer.

use std::f64::consts::PI;
use std::fmt;

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, ScheduleError},
    model::TwilightWindow,
};

const RAD: f64 = PI / 180.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
const J1970: f64 = 2_440_588.0;
const J2000: f64 = 2_451_545.0;
const J0: f64 = 0.0009;
/// `num_days_from_ce` of 2000-01-01, the epoch of the solar cycle count.
const J2000_DAYS_FROM_CE: i32 = 730_120;
const OBLIQUITY: f64 = 23.4397 * RAD;
const NAUTICAL_ELEVATION_DEG: f64 = -12.0;
/// Local mean solar time runs 4 minutes ahead per degree east.
const SECONDS_PER_DEGREE: f64 = 240.0;
/// The night containing an instant is looked up half a day in the past, so
/// the calendar date only rolls over around local noon.
const REFERENCE_SHIFT_HOURS: i64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TwilightEvent {
    Dusk,
    Dawn,
}

impl fmt::Display for TwilightEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TwilightEvent::Dusk => f.write_str("dusk"),
            TwilightEvent::Dawn => f.write_str("dawn"),
        }
    }
}

/// Geographic position of the observer. Elevation is in metres above sea level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observer {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

impl Observer {
    /// The BTA 6-m telescope site.
    pub const BTA: Observer = Observer {
        latitude: 43.649329,
        longitude: 41.426829,
        elevation: 2070.0,
    };

    pub fn new(latitude: f64, longitude: f64, elevation: f64) -> Result<Self, ConfigError> {
        let observer = Self {
            latitude,
            longitude,
            elevation,
        };
        observer.validate()?;
        Ok(observer)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ConfigError::Invalid(format!(
                "latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ConfigError::Invalid(format!(
                "longitude {} is outside [-180, 180]",
                self.longitude
            )));
        }
        if !self.elevation.is_finite() || self.elevation < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "elevation {} must be a non-negative number of metres",
                self.elevation
            )));
        }
        Ok(())
    }

    /// Depression of the visible horizon, in degrees (negative).
    fn horizon_dip(&self) -> f64 {
        -2.076 * self.elevation.sqrt() / 60.0
    }

    fn local_solar_offset(&self) -> Duration {
        Duration::seconds((self.longitude * SECONDS_PER_DEGREE).round() as i64)
    }
}

/// Computes the nautical twilight window bracketing a night.
#[derive(Debug, Clone)]
pub struct TwilightCalculator {
    observer: Observer,
}

impl TwilightCalculator {
    pub fn new(observer: Observer) -> Self {
        Self { observer }
    }

    /// Local mean noon before the evening of `date`: the first instant that
    /// [`Self::night_of`] resolves to `date`.
    pub fn night_start(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(NaiveTime::MIN).and_utc() + Duration::hours(REFERENCE_SHIFT_HOURS)
            - self.observer.local_solar_offset()
    }

    /// Nautical dusk and the next nautical dawn for the night containing
    /// `reference`.
    ///
    /// Any instant between one local-noon rollover and the next resolves to the
    /// same window, so calls just before and just after midnight agree.
    pub fn compute_window(&self, reference: DateTime<Utc>) -> Result<TwilightWindow, ScheduleError> {
        let evening = self.night_of(reference);
        let morning = evening
            .checked_add_days(Days::new(1))
            .ok_or(ScheduleError::NoCrossing {
                event: TwilightEvent::Dawn,
                date: evening,
            })?;

        let dusk = self.crossing(evening, TwilightEvent::Dusk)?;
        let dawn = self.crossing(morning, TwilightEvent::Dawn)?;
        if dusk >= dawn {
            return Err(ScheduleError::DegenerateWindow { dusk, dawn });
        }

        Ok(TwilightWindow { dusk, dawn })
    }

    /// Calendar date (local mean solar time) of the evening that starts the
    /// night containing `reference`.
    pub fn night_of(&self, reference: DateTime<Utc>) -> NaiveDate {
        let shifted = reference - Duration::hours(REFERENCE_SHIFT_HOURS)
            + self.observer.local_solar_offset();
        shifted.date_naive()
    }

    fn crossing(&self, date: NaiveDate, event: TwilightEvent) -> Result<DateTime<Utc>, ScheduleError> {
        let no_crossing = || ScheduleError::NoCrossing { event, date };

        let day = SolarDay::new(date, &self.observer);
        let altitude = (NAUTICAL_ELEVATION_DEG + self.observer.horizon_dip()) * RAD;
        let set = day.setting(altitude).ok_or_else(no_crossing)?;

        let julian = match event {
            TwilightEvent::Dusk => set,
            // Rising is symmetric to setting around the transit.
            TwilightEvent::Dawn => 2.0 * day.transit - set,
        };
        from_julian(julian).ok_or_else(no_crossing)
    }
}

/// Solar quantities for the transit nearest local noon of one calendar day.
struct SolarDay {
    cycle: f64,
    lw: f64,
    phi: f64,
    mean_anomaly: f64,
    ecliptic_longitude: f64,
    declination: f64,
    transit: f64,
}

impl SolarDay {
    fn new(date: NaiveDate, observer: &Observer) -> Self {
        let cycle = f64::from(date.num_days_from_ce() - J2000_DAYS_FROM_CE);
        let lw = -observer.longitude * RAD;
        let phi = observer.latitude * RAD;

        let approx = approx_transit(0.0, lw, cycle);
        let mean_anomaly = solar_mean_anomaly(approx);
        let ecliptic_longitude = ecliptic_longitude(mean_anomaly);
        let declination = (OBLIQUITY.sin() * ecliptic_longitude.sin()).asin();
        let transit = solar_transit(approx, mean_anomaly, ecliptic_longitude);

        Self {
            cycle,
            lw,
            phi,
            mean_anomaly,
            ecliptic_longitude,
            declination,
            transit,
        }
    }

    /// Julian date at which the sun sets through `altitude` (radians), or
    /// `None` if it stays above or below it all day.
    fn setting(&self, altitude: f64) -> Option<f64> {
        let cos_hour_angle = (altitude.sin() - self.phi.sin() * self.declination.sin())
            / (self.phi.cos() * self.declination.cos());
        if !(-1.0..=1.0).contains(&cos_hour_angle) {
            return None;
        }

        let hour_angle = cos_hour_angle.acos();
        let approx = approx_transit(hour_angle, self.lw, self.cycle);
        Some(solar_transit(approx, self.mean_anomaly, self.ecliptic_longitude))
    }
}

fn approx_transit(hour_angle: f64, lw: f64, cycle: f64) -> f64 {
    J0 + (hour_angle + lw) / (2.0 * PI) + cycle
}

fn solar_mean_anomaly(days: f64) -> f64 {
    RAD * (357.5291 + 0.98560028 * days)
}

fn ecliptic_longitude(mean_anomaly: f64) -> f64 {
    let m = mean_anomaly;
    let centre = RAD * (1.9148 * m.sin() + 0.02 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin());
    let perihelion = RAD * 102.9372;
    m + centre + perihelion + PI
}

fn solar_transit(days: f64, mean_anomaly: f64, ecliptic_longitude: f64) -> f64 {
    J2000 + days + 0.0053 * mean_anomaly.sin() - 0.0069 * (2.0 * ecliptic_longitude).sin()
}

/// Julian date to a UTC instant, dropping fractional seconds.
fn from_julian(julian: f64) -> Option<DateTime<Utc>> {
    let seconds = ((julian + 0.5 - J1970) * SECONDS_PER_DAY).floor();
    if !seconds.is_finite() {
        return None;
    }
    DateTime::from_timestamp(seconds as i64, 0)
}
