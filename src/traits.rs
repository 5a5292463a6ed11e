//! Capabilities the monitor depends on, and in-memory mocks for testing.
//!
//! This module provides traits for:
//! - `Clock`: Abstracting time access for deterministic testing
//! - `WorkSchedule`: Deciding whether the night work window is open
//! - `WeatherSource`, `ChartSource`: Pulling the latest conditions
//! - `Notifier`: Delivering lifecycle and weather updates to the chat

use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::{
    error::{CollaboratorError, ScheduleError},
    model::{Chart, Observation, TwilightWindow},
    schedule::WorkStatus,
};

// ==================== Clock Trait ====================

/// Trait for abstracting time access.
///
/// This allows injecting mock clocks during testing to create
/// deterministic, reproducible tests for time-dependent logic.
pub trait Clock: Send + Sync {
    /// Get the current time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for testing with controllable time.
#[derive(Debug, Clone)]
pub struct MockClock {
    utc_time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a new mock clock set to the given UTC time.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            utc_time: Arc::new(Mutex::new(time)),
        }
    }

    /// Set the mock clock to a new time.
    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.utc_time.lock().unwrap() = time;
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut time = self.utc_time.lock().unwrap();
        *time += duration;
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.utc_time.lock().unwrap()
    }
}

// ==================== Collaborator Traits ====================

pub trait WorkSchedule {
    /// Tonight's window and whether `now` lies inside the work part of it.
    fn work_status(&self, now: DateTime<Utc>) -> Result<WorkStatus, ScheduleError>;
}

pub trait WeatherSource {
    /// The most recent observation. Implementations return their cached value
    /// when the upstream record has not changed.
    fn latest(&mut self) -> impl Future<Output = Result<Observation, CollaboratorError>> + Send;
}

pub trait ChartSource {
    /// A locally materialized chart of the current conditions.
    fn updated_chart(&mut self) -> impl Future<Output = Result<Chart, CollaboratorError>> + Send;
}

pub trait Notifier {
    fn work_started(
        &mut self,
        window: &TwilightWindow,
    ) -> impl Future<Output = Result<(), CollaboratorError>> + Send;

    fn work_ended(&mut self) -> impl Future<Output = Result<(), CollaboratorError>> + Send;

    fn update(
        &mut self,
        chart: &Chart,
        observation: &Observation,
        hazardous: bool,
    ) -> impl Future<Output = Result<(), CollaboratorError>> + Send;
}

// ==================== Mocks ====================

/// Schedule whose answer is set directly by the test.
#[derive(Debug, Clone)]
pub struct MockSchedule {
    window: Arc<Mutex<TwilightWindow>>,
    is_work_time: Arc<Mutex<bool>>,
    failure: Arc<Mutex<Option<ScheduleError>>>,
}

impl MockSchedule {
    /// Starts outside the work window.
    pub fn new(window: TwilightWindow) -> Self {
        Self {
            window: Arc::new(Mutex::new(window)),
            is_work_time: Arc::new(Mutex::new(false)),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_work_time(&self, is_work_time: bool) {
        *self.is_work_time.lock().unwrap() = is_work_time;
    }

    pub fn set_window(&self, window: TwilightWindow) {
        *self.window.lock().unwrap() = window;
    }

    /// Fail every evaluation until `recover` is called.
    pub fn fail_with(&self, err: ScheduleError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }
}

impl WorkSchedule for MockSchedule {
    fn work_status(&self, _now: DateTime<Utc>) -> Result<WorkStatus, ScheduleError> {
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(WorkStatus {
            window: *self.window.lock().unwrap(),
            is_work_time: *self.is_work_time.lock().unwrap(),
        })
    }
}

/// Weather source that replays queued results, then repeats the last one.
#[derive(Debug, Clone, Default)]
pub struct MockWeatherSource {
    queue: Arc<Mutex<VecDeque<Result<Observation, CollaboratorError>>>>,
    last: Arc<Mutex<Option<Result<Observation, CollaboratorError>>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockWeatherSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, result: Result<Observation, CollaboratorError>) {
        self.queue.lock().unwrap().push_back(result);
    }

    pub fn push_observation(&self, observation: Observation) {
        self.push(Ok(observation));
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl WeatherSource for MockWeatherSource {
    async fn latest(&mut self) -> Result<Observation, CollaboratorError> {
        *self.calls.lock().unwrap() += 1;
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.queue.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        (*last)
            .clone()
            .unwrap_or_else(|| Err(CollaboratorError::Fetch("no observation queued".to_string())))
    }
}

/// Chart source returning a fixed path, optionally failing.
#[derive(Clone)]
pub struct MockChartSource {
    path: PathBuf,
    failure: Arc<Mutex<Option<CollaboratorError>>>,
    clock: Arc<dyn Clock>,
}

impl MockChartSource {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            failure: Arc::new(Mutex::new(None)),
            clock,
        }
    }

    /// Fail every request until `recover` is called.
    pub fn fail_with(&self, err: CollaboratorError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }
}

impl std::fmt::Debug for MockChartSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChartSource")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ChartSource for MockChartSource {
    async fn updated_chart(&mut self) -> Result<Chart, CollaboratorError> {
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(Chart {
            path: self.path.clone(),
            created_at: self.clock.now_utc(),
        })
    }
}

/// One call received by [`MockNotifier`].
#[derive(Debug, Clone, PartialEq)]
pub enum NotifierEvent {
    WorkStarted(TwilightWindow),
    WorkEnded,
    Update {
        chart: Chart,
        observation: Observation,
        hazardous: bool,
    },
}

/// Mock notifier for testing that records all delivered events.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    events: Arc<Mutex<Vec<NotifierEvent>>>,
    failure: Arc<Mutex<Option<CollaboratorError>>>,
}

impl MockNotifier {
    /// Create a new mock notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all events that have been delivered.
    pub fn events(&self) -> Vec<NotifierEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Get the count of events delivered.
    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Only the weather updates, as `(wind_speed, hazardous)` pairs.
    pub fn updates(&self) -> Vec<(f64, bool)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                NotifierEvent::Update {
                    observation,
                    hazardous,
                    ..
                } => Some((observation.wind_speed, *hazardous)),
                _ => None,
            })
            .collect()
    }

    /// Clear all recorded events.
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Reject every delivery until `recover` is called. Rejected events are not recorded.
    pub fn fail_with(&self, err: CollaboratorError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    fn record(&self, event: NotifierEvent) -> Result<(), CollaboratorError> {
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

impl Notifier for MockNotifier {
    async fn work_started(&mut self, window: &TwilightWindow) -> Result<(), CollaboratorError> {
        self.record(NotifierEvent::WorkStarted(*window))
    }

    async fn work_ended(&mut self) -> Result<(), CollaboratorError> {
        self.record(NotifierEvent::WorkEnded)
    }

    async fn update(
        &mut self,
        chart: &Chart,
        observation: &Observation,
        hazardous: bool,
    ) -> Result<(), CollaboratorError> {
        self.record(NotifierEvent::Update {
            chart: chart.clone(),
            observation: *observation,
            hazardous,
        })
    }
}
