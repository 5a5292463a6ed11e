use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::{
    config::AppConfig,
    error::{ConfigError, ScheduleError},
    model::TwilightWindow,
    traits::WorkSchedule,
    twilight::{Observer, TwilightCalculator},
};

/// A leap year, so every night of the solar cycle is visited once.
const LEAD_CHECK_YEAR: i32 = 2024;

/// Result of a single schedule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkStatus {
    pub window: TwilightWindow,
    pub is_work_time: bool,
}

/// Night work window: from `lead_time` before nautical dusk until nautical dawn.
#[derive(Debug, Clone)]
pub struct ScheduleGate {
    calculator: TwilightCalculator,
    lead_time: Duration,
}

impl ScheduleGate {
    /// A negative lead time is treated as zero.
    pub fn new(observer: Observer, lead_time: Duration) -> Self {
        Self {
            calculator: TwilightCalculator::new(observer),
            lead_time: lead_time.max(Duration::zero()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.observer, config.monitoring.lead_time())
    }

    pub fn lead_time(&self) -> Duration {
        self.lead_time
    }

    /// Reject a lead time that would open the work window before the night
    /// rolls over at local noon on any night of the year. Nights without a
    /// nautical crossing are skipped; they fail at runtime instead.
    pub fn check_lead_time(&self) -> Result<(), ConfigError> {
        let nights = NaiveDate::from_ymd_opt(LEAD_CHECK_YEAR, 1, 1)
            .into_iter()
            .flat_map(|first| first.iter_days())
            .take_while(|date| date.year() == LEAD_CHECK_YEAR);

        for date in nights {
            let rollover = self.calculator.night_start(date);
            let Ok(window) = self.calculator.compute_window(rollover) else {
                continue;
            };
            let opens_before_rollover = window
                .dusk
                .checked_sub_signed(self.lead_time)
                .is_none_or(|start| start < rollover);
            if opens_before_rollover {
                return Err(ConfigError::Invalid(format!(
                    "lead time of {} min starts monitoring before local noon around {} (nautical dusk {})",
                    self.lead_time.num_minutes(),
                    date.format("%d %b"),
                    window.dusk.format("%H:%M UTC")
                )));
            }
        }
        Ok(())
    }

    /// Check if `now` falls inside the work window.
    pub fn is_work_time(&self, now: DateTime<Utc>) -> Result<bool, ScheduleError> {
        Ok(self.work_status(now)?.is_work_time)
    }
}

impl WorkSchedule for ScheduleGate {
    fn work_status(&self, now: DateTime<Utc>) -> Result<WorkStatus, ScheduleError> {
        let window = self.calculator.compute_window(now)?;
        Ok(WorkStatus {
            window,
            is_work_time: in_work_window(&window, now, self.lead_time),
        })
    }
}

/// Half-open membership test: the start instant counts, dawn itself does not.
pub fn in_work_window(window: &TwilightWindow, now: DateTime<Utc>, lead_time: Duration) -> bool {
    let started = window
        .dusk
        .checked_sub_signed(lead_time)
        .is_none_or(|start| start <= now);
    started && now < window.dawn
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn gate(lead_minutes: i64) -> ScheduleGate {
        ScheduleGate::new(Observer::BTA, Duration::minutes(lead_minutes))
    }

    fn tonight(gate: &ScheduleGate) -> TwilightWindow {
        gate.work_status(Utc.with_ymd_and_hms(2024, 10, 18, 20, 0, 0).unwrap())
            .unwrap()
            .window
    }

    // ==================== Half-Open Boundaries ====================

    #[test]
    fn test_dawn_is_not_work_time() {
        let gate = gate(120);
        let window = tonight(&gate);

        assert!(!gate.is_work_time(window.dawn).unwrap());
        assert!(gate.is_work_time(window.dawn - Duration::seconds(1)).unwrap());
    }

    #[test]
    fn test_dusk_minus_lead_is_work_time() {
        let gate = gate(120);
        let window = tonight(&gate);
        let start = window.dusk - gate.lead_time();

        assert!(gate.is_work_time(start).unwrap());
        assert!(!gate.is_work_time(start - Duration::seconds(1)).unwrap());
    }

    #[test]
    fn test_zero_lead_starts_at_dusk() {
        let gate = gate(0);
        let window = tonight(&gate);

        assert!(gate.is_work_time(window.dusk).unwrap());
        assert!(!gate.is_work_time(window.dusk - Duration::seconds(1)).unwrap());
    }

    #[test]
    fn test_negative_lead_is_clamped() {
        let gate = ScheduleGate::new(Observer::BTA, Duration::minutes(-30));
        assert_eq!(gate.lead_time(), Duration::zero());
    }

    // ==================== Time of Day ====================

    #[test]
    fn test_midnight_is_work_time() {
        let gate = gate(120);
        let midnight = Utc.with_ymd_and_hms(2024, 10, 18, 21, 0, 0).unwrap();
        assert!(gate.is_work_time(midnight).unwrap());
    }

    #[test]
    fn test_noon_is_not_work_time() {
        let gate = gate(120);
        let noon = Utc.with_ymd_and_hms(2024, 10, 18, 9, 0, 0).unwrap();
        assert!(!gate.is_work_time(noon).unwrap());
    }

    #[test]
    fn test_status_reports_window_it_used() {
        let gate = gate(60);
        let now = Utc.with_ymd_and_hms(2024, 10, 18, 23, 0, 0).unwrap();
        let status = gate.work_status(now).unwrap();

        assert!(status.is_work_time);
        assert!(status.window.dusk < now && now < status.window.dawn);
    }

    #[test]
    fn test_in_work_window_pure() {
        let window = TwilightWindow {
            dusk: Utc.with_ymd_and_hms(2024, 1, 1, 18, 0, 0).unwrap(),
            dawn: Utc.with_ymd_and_hms(2024, 1, 2, 6, 0, 0).unwrap(),
        };
        let lead = Duration::hours(2);

        assert!(in_work_window(&window, Utc.with_ymd_and_hms(2024, 1, 1, 16, 0, 0).unwrap(), lead));
        assert!(!in_work_window(&window, Utc.with_ymd_and_hms(2024, 1, 1, 15, 59, 59).unwrap(), lead));
        assert!(!in_work_window(&window, window.dawn, lead));
    }

    // ==================== Lead Time Check ====================

    #[test]
    fn test_default_lead_time_fits_every_night() {
        assert!(gate(120).check_lead_time().is_ok());
        assert!(gate(300).check_lead_time().is_ok());
    }

    #[test]
    fn test_lead_time_past_winter_noon_rejected() {
        // Winter nautical dusk at BTA is about 17:45 local mean time.
        assert!(matches!(
            gate(350).check_lead_time(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_high_latitude_limits_lead_time() {
        let north = Observer::new(60.0, 10.0, 0.0).unwrap();

        assert!(ScheduleGate::new(north, Duration::minutes(120)).check_lead_time().is_ok());
        // Winter nautical dusk at 60N is before 17:00 local mean time.
        assert!(ScheduleGate::new(north, Duration::minutes(300)).check_lead_time().is_err());
    }

    #[test]
    fn test_polar_location_reports_error() {
        let gate = ScheduleGate::new(
            Observer::new(78.22, 15.65, 0.0).unwrap(),
            Duration::minutes(120),
        );
        let now = Utc.with_ymd_and_hms(2024, 6, 21, 20, 0, 0).unwrap();
        assert!(gate.is_work_time(now).is_err());
    }
}
