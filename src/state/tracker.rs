//! Geofenced presence tracking.
//!
//! [`GeoPresenceTracker`] turns position samples into check-in/check-out intents
//! against the current court list. It performs no I/O: callers dispatch the
//! returned [`PresenceIntent`] and report the authoritative state back through
//! [`GeoPresenceTracker::reconcile`] or [`GeoPresenceTracker::adopt`].

use std::time::Duration;

use tokio::time::Instant;

use crate::{
    dao::models::{Court, CourtId, PresenceStatus},
    dto::presence::{NearbyCourt, PresenceSnapshot, SensorStatus},
    state::{
        geo::{PositionSample, distance_meters, nearest_court},
        presence::{PresenceEvent, PresenceMachine, PresencePhase},
    },
};

pub const CHECKIN_RADIUS_M: f64 = 100.0;
pub const CHECKOUT_RADIUS_M: f64 = 140.0;
pub const MAX_ACCURACY_M: f64 = 120.0;
pub const MIN_AUTO_ACTION_INTERVAL: Duration = Duration::from_secs(45);
pub const NEARBY_COURT_RADIUS_M: f64 = 5_000.0;

/// Thresholds driving the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceTuning {
    pub checkin_radius_m: f64,
    pub checkout_radius_m: f64,
    pub max_accuracy_m: f64,
    pub min_auto_action_interval: Duration,
    /// Consecutive out-of-range samples required before an automatic exit.
    pub checkout_confirm_reads: u32,
    /// Minimum time the out-of-range streak must span before an automatic exit.
    pub checkout_confirm_window: Duration,
    /// Upper bound of the accuracy-dependent widening of the exit radius.
    pub checkout_accuracy_buffer_max_m: f64,
    pub nearby_court_radius_m: f64,
}

impl Default for PresenceTuning {
    fn default() -> Self {
        Self {
            checkin_radius_m: CHECKIN_RADIUS_M,
            checkout_radius_m: CHECKOUT_RADIUS_M,
            max_accuracy_m: MAX_ACCURACY_M,
            min_auto_action_interval: MIN_AUTO_ACTION_INTERVAL,
            checkout_confirm_reads: 1,
            checkout_confirm_window: Duration::ZERO,
            checkout_accuracy_buffer_max_m: 0.0,
            nearby_court_radius_m: NEARBY_COURT_RADIUS_M,
        }
    }
}

/// Why a sample was not evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The position watch is stopped.
    WatchStopped,
    /// Accuracy worse than the configured maximum.
    Inaccurate,
    /// Timestamp older than the last accepted sample.
    OutOfOrder,
    /// Automatic presence is disabled (no credential).
    AutoDisabled,
}

/// Why an evaluated sample caused no transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// The sample does not cross a boundary.
    Stable,
    /// A transition is due but the last automatic action is too recent.
    CoolingDown,
    /// Out of range, but the exit streak is not confirmed yet.
    ConfirmingExit,
}

/// Side effect requested by an automatic transition.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceIntent {
    CheckIn { court: Court, distance_m: f64 },
    CheckOut {
        court_id: CourtId,
        /// Distance to the checked-in court (or the nearest one when it is no longer
        /// listed); `None` when no court is known.
        distance_m: Option<f64>,
    },
}

impl PresenceIntent {
    /// Court whose presence changed.
    pub fn court_id(&self) -> CourtId {
        match self {
            PresenceIntent::CheckIn { court, .. } => court.id,
            PresenceIntent::CheckOut { court_id, .. } => *court_id,
        }
    }
}

/// Outcome of [`GeoPresenceTracker::observe`].
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Ignored(IgnoreReason),
    Hold(HoldReason),
    Intent(PresenceIntent),
}

#[derive(Debug, Clone, Copy)]
struct ExitStreak {
    reads: u32,
    since: Instant,
}

/// Session-scoped presence state machine fed by position samples.
#[derive(Debug, Clone)]
pub struct GeoPresenceTracker {
    tuning: PresenceTuning,
    courts: Vec<Court>,
    machine: PresenceMachine,
    last_action_at: Option<Instant>,
    last_sample: Option<PositionSample>,
    exit_streak: Option<ExitStreak>,
    sensor: SensorStatus,
    auto_enabled: bool,
}

impl GeoPresenceTracker {
    pub fn new(tuning: PresenceTuning) -> Self {
        Self {
            tuning,
            courts: Vec::new(),
            machine: PresenceMachine::new(),
            last_action_at: None,
            last_sample: None,
            exit_streak: None,
            sensor: SensorStatus::Idle,
            auto_enabled: true,
        }
    }

    pub fn tuning(&self) -> &PresenceTuning {
        &self.tuning
    }

    pub fn phase(&self) -> PresencePhase {
        self.machine.phase()
    }

    pub fn checked_in_court(&self) -> Option<CourtId> {
        self.machine.phase().court()
    }

    /// Incremented whenever the phase changes.
    pub fn version(&self) -> usize {
        self.machine.version()
    }

    pub fn courts(&self) -> &[Court] {
        &self.courts
    }

    pub fn court(&self, id: CourtId) -> Option<&Court> {
        self.courts.iter().find(|court| court.id == id)
    }

    pub fn sensor(&self) -> SensorStatus {
        self.sensor
    }

    pub fn last_action_at(&self) -> Option<Instant> {
        self.last_action_at
    }

    /// Replace the known court list. The current phase is left untouched; the next
    /// sample is evaluated against the new list.
    pub fn replace_courts(&mut self, courts: Vec<Court>) {
        self.courts = courts;
    }

    /// Enable or disable automatic check-in/check-out.
    pub fn set_auto_enabled(&mut self, enabled: bool) {
        self.auto_enabled = enabled;
        if !enabled {
            self.exit_streak = None;
        }
    }

    pub fn auto_enabled(&self) -> bool {
        self.auto_enabled
    }

    /// Stop the position watch. Returns `false` if it was already stopped.
    pub fn stop_watch(&mut self) -> bool {
        if self.sensor == SensorStatus::Stopped {
            return false;
        }
        self.sensor = SensorStatus::Stopped;
        self.exit_streak = None;
        true
    }

    /// Restart a stopped watch. Returns `false` if it was not stopped.
    pub fn start_watch(&mut self) -> bool {
        if self.sensor != SensorStatus::Stopped {
            return false;
        }
        self.sensor = SensorStatus::Idle;
        true
    }

    /// Record that the platform has no location capability.
    pub fn mark_unavailable(&mut self) {
        self.sensor = SensorStatus::Unavailable;
        self.last_sample = None;
        self.exit_streak = None;
    }

    /// Evaluate a position sample received at `now`.
    pub fn observe(&mut self, sample: PositionSample, now: Instant) -> Evaluation {
        if self.sensor == SensorStatus::Stopped {
            return Evaluation::Ignored(IgnoreReason::WatchStopped);
        }
        self.sensor = SensorStatus::Active;

        if let (Some(previous), Some(current)) = (
            self.last_sample.and_then(|sample| sample.timestamp_ms),
            sample.timestamp_ms,
        ) && current < previous
        {
            return Evaluation::Ignored(IgnoreReason::OutOfOrder);
        }

        // NaN accuracy is treated as unusable.
        if !(sample.accuracy_m <= self.tuning.max_accuracy_m) {
            return Evaluation::Ignored(IgnoreReason::Inaccurate);
        }

        self.last_sample = Some(sample);
        if !self.auto_enabled {
            return Evaluation::Ignored(IgnoreReason::AutoDisabled);
        }

        let nearest = nearest_court(&self.courts, sample.latitude, sample.longitude)
            .map(|nearest| (nearest.court.clone(), nearest.distance_m));

        match self.machine.phase() {
            PresencePhase::Unchecked => {
                self.exit_streak = None;
                let Some((court, distance_m)) = nearest else {
                    return Evaluation::Hold(HoldReason::Stable);
                };
                if distance_m > self.tuning.checkin_radius_m {
                    return Evaluation::Hold(HoldReason::Stable);
                }
                if self.cooling_down(now) {
                    return Evaluation::Hold(HoldReason::CoolingDown);
                }
                if self.machine.apply(PresenceEvent::Enter(court.id)).is_err() {
                    return Evaluation::Hold(HoldReason::Stable);
                }
                self.last_action_at = Some(now);
                Evaluation::Intent(PresenceIntent::CheckIn { court, distance_m })
            }
            PresencePhase::CheckedIn(court_id) => {
                let exit_radius = self.tuning.checkout_radius_m
                    + sample.accuracy_m.min(self.tuning.checkout_accuracy_buffer_max_m).max(0.0);
                // Measured against the checked-in court while it is still listed.
                let distance_m = match self.court(court_id) {
                    Some(court) => Some(distance_meters(
                        sample.latitude,
                        sample.longitude,
                        court.latitude,
                        court.longitude,
                    )),
                    None => nearest.as_ref().map(|(_, distance)| *distance),
                };
                let out_of_range = distance_m.is_none_or(|distance| distance > exit_radius);
                if !out_of_range {
                    self.exit_streak = None;
                    return Evaluation::Hold(HoldReason::Stable);
                }

                let streak = match self.exit_streak {
                    Some(streak) => ExitStreak {
                        reads: streak.reads.saturating_add(1),
                        since: streak.since,
                    },
                    None => ExitStreak {
                        reads: 1,
                        since: now,
                    },
                };
                self.exit_streak = Some(streak);

                let confirmed = streak.reads >= self.tuning.checkout_confirm_reads
                    && now.saturating_duration_since(streak.since)
                        >= self.tuning.checkout_confirm_window;
                if !confirmed {
                    return Evaluation::Hold(HoldReason::ConfirmingExit);
                }
                if self.cooling_down(now) {
                    return Evaluation::Hold(HoldReason::CoolingDown);
                }
                if self.machine.apply(PresenceEvent::Exit).is_err() {
                    return Evaluation::Hold(HoldReason::Stable);
                }
                self.exit_streak = None;
                self.last_action_at = Some(now);
                Evaluation::Intent(PresenceIntent::CheckOut {
                    court_id,
                    distance_m,
                })
            }
        }
    }

    /// Adopt the server's authoritative presence. Returns `true` when the phase changed.
    pub fn reconcile(&mut self, status: PresenceStatus) -> bool {
        self.apply_authoritative(status.active_court())
    }

    /// Adopt the outcome of a confirmed manual action and stamp the action time.
    pub fn adopt(&mut self, court_id: Option<CourtId>, now: Instant) -> bool {
        self.last_action_at = Some(now);
        self.apply_authoritative(court_id)
    }

    /// Local logout: back to `Unchecked` without any request.
    pub fn reset(&mut self) -> bool {
        let before = self.machine.version();
        // Reset is valid from every phase.
        let _ = self.machine.apply(PresenceEvent::Reset);
        self.last_action_at = None;
        self.exit_streak = None;
        self.machine.version() != before
    }

    fn apply_authoritative(&mut self, court_id: Option<CourtId>) -> bool {
        let before = self.machine.version();
        // Reconciled is valid from every phase.
        let _ = self.machine.apply(PresenceEvent::Reconciled(court_id));
        self.exit_streak = None;
        self.machine.version() != before
    }

    fn cooling_down(&self, now: Instant) -> bool {
        self.last_action_at.is_some_and(|at| {
            now.saturating_duration_since(at) < self.tuning.min_auto_action_interval
        })
    }

    /// Nearest court to the last accepted sample, within the nearby radius.
    pub fn nearby(&self) -> Option<NearbyCourt> {
        let sample = self.last_sample?;
        let nearest = nearest_court(&self.courts, sample.latitude, sample.longitude)?;
        if nearest.distance_m > self.tuning.nearby_court_radius_m {
            return None;
        }
        Some(NearbyCourt {
            court_id: nearest.court.id,
            name: nearest.court.name.clone(),
            distance_m: nearest.distance_m,
        })
    }

    /// Current state as exposed to the view layer.
    pub fn snapshot(&self) -> PresenceSnapshot {
        let checked_in_court_id = self.checked_in_court();
        PresenceSnapshot {
            checked_in_court_id,
            court_name: checked_in_court_id
                .and_then(|id| self.court(id))
                .map(|court| court.name.clone()),
            nearby: self.nearby(),
            sensor: self.sensor,
            known_courts: self.courts.len(),
            changed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::geo::meters_to_latitude_degrees;

    const COURT_LAT: f64 = 40.0;
    const COURT_LNG: f64 = -73.0;

    fn court(id: CourtId, latitude: f64) -> Court {
        Court {
            id,
            name: format!("Court {id}"),
            latitude,
            longitude: COURT_LNG,
        }
    }

    fn tracker() -> GeoPresenceTracker {
        let mut tracker = GeoPresenceTracker::new(PresenceTuning::default());
        tracker.replace_courts(vec![court(1, COURT_LAT)]);
        tracker
    }

    /// Sample `meters` north of court 1.
    fn at(meters: f64) -> PositionSample {
        PositionSample::new(COURT_LAT + meters_to_latitude_degrees(meters), COURT_LNG, 10.0)
    }

    fn is_check_in(evaluation: &Evaluation) -> bool {
        matches!(evaluation, Evaluation::Intent(PresenceIntent::CheckIn { .. }))
    }

    fn is_check_out(evaluation: &Evaluation) -> bool {
        matches!(evaluation, Evaluation::Intent(PresenceIntent::CheckOut { .. }))
    }

    #[test]
    fn enters_within_checkin_radius() {
        let mut tracker = tracker();
        let evaluation = tracker.observe(at(50.0), Instant::now());
        match evaluation {
            Evaluation::Intent(PresenceIntent::CheckIn { court, distance_m }) => {
                assert_eq!(court.id, 1);
                assert!((distance_m - 50.0).abs() < 0.5);
            }
            other => panic!("unexpected evaluation {other:?}"),
        }
        assert_eq!(tracker.phase(), PresencePhase::CheckedIn(1));
    }

    #[test]
    fn oscillating_near_the_boundary_checks_in_once() {
        let mut tracker = tracker();
        let start = Instant::now();
        let mut check_ins = 0;

        for step in 0..20u64 {
            let meters = if step % 2 == 0 { 95.0 } else { 105.0 };
            let now = start + Duration::from_secs(60 * step);
            let evaluation = tracker.observe(at(meters), now);
            if is_check_in(&evaluation) {
                check_ins += 1;
            }
            assert!(!is_check_out(&evaluation));
        }
        assert_eq!(check_ins, 1);

        let later = start + Duration::from_secs(60 * 21);
        assert!(is_check_out(&tracker.observe(at(150.0), later)));
        assert_eq!(tracker.phase(), PresencePhase::Unchecked);
    }

    #[test]
    fn second_action_within_cooldown_is_suppressed() {
        let mut tracker = tracker();
        let start = Instant::now();
        assert!(is_check_in(&tracker.observe(at(20.0), start)));

        let evaluation = tracker.observe(at(500.0), start + Duration::from_secs(30));
        assert_eq!(evaluation, Evaluation::Hold(HoldReason::CoolingDown));
        assert_eq!(tracker.phase(), PresencePhase::CheckedIn(1));

        let evaluation = tracker.observe(at(500.0), start + Duration::from_secs(45));
        assert!(is_check_out(&evaluation));
    }

    #[test]
    fn inaccurate_samples_are_not_evaluated() {
        let mut tracker = tracker();
        let mut sample = at(0.0);
        sample.accuracy_m = 150.0;
        assert_eq!(
            tracker.observe(sample, Instant::now()),
            Evaluation::Ignored(IgnoreReason::Inaccurate)
        );
        assert_eq!(tracker.phase(), PresencePhase::Unchecked);

        tracker.reconcile(PresenceStatus {
            checked_in: true,
            court_id: Some(1),
        });
        let mut far = at(10_000.0);
        far.accuracy_m = 150.0;
        assert_eq!(
            tracker.observe(far, Instant::now()),
            Evaluation::Ignored(IgnoreReason::Inaccurate)
        );
        assert_eq!(tracker.phase(), PresencePhase::CheckedIn(1));
    }

    #[test]
    fn accuracy_at_the_limit_is_accepted() {
        let mut tracker = tracker();
        let mut sample = at(10.0);
        sample.accuracy_m = MAX_ACCURACY_M;
        assert!(is_check_in(&tracker.observe(sample, Instant::now())));
    }

    #[test]
    fn no_courts_while_checked_in_means_exit() {
        let mut tracker = tracker();
        let start = Instant::now();
        assert!(is_check_in(&tracker.observe(at(0.0), start)));
        tracker.replace_courts(Vec::new());

        let evaluation = tracker.observe(at(0.0), start + Duration::from_secs(60));
        assert_eq!(
            evaluation,
            Evaluation::Intent(PresenceIntent::CheckOut {
                court_id: 1,
                distance_m: None
            })
        );
    }

    #[test]
    fn court_to_court_passes_through_unchecked() {
        let mut tracker = tracker();
        tracker.replace_courts(vec![court(1, COURT_LAT), court(2, COURT_LAT + 0.01)]);
        let start = Instant::now();
        assert!(is_check_in(&tracker.observe(at(0.0), start)));

        // Standing on court 2, roughly 1.1 km away from court 1.
        let on_court_two = PositionSample::new(COURT_LAT + 0.01, COURT_LNG, 5.0);
        let evaluation = tracker.observe(on_court_two, start + Duration::from_secs(60));
        assert!(is_check_out(&evaluation));
        assert_eq!(tracker.phase(), PresencePhase::Unchecked);

        let evaluation = tracker.observe(on_court_two, start + Duration::from_secs(120));
        match evaluation {
            Evaluation::Intent(PresenceIntent::CheckIn { court, .. }) => assert_eq!(court.id, 2),
            other => panic!("unexpected evaluation {other:?}"),
        }
    }

    #[test]
    fn out_of_order_samples_are_dropped() {
        let mut tracker = tracker();
        let now = Instant::now();
        assert_eq!(
            tracker.observe(at(1_000.0).at(2_000), now),
            Evaluation::Hold(HoldReason::Stable)
        );
        assert_eq!(
            tracker.observe(at(0.0).at(1_000), now),
            Evaluation::Ignored(IgnoreReason::OutOfOrder)
        );
        assert!(is_check_in(&tracker.observe(at(0.0).at(3_000), now)));
    }

    #[test]
    fn disabled_auto_records_sample_without_acting() {
        let mut tracker = tracker();
        tracker.set_auto_enabled(false);
        assert_eq!(
            tracker.observe(at(10.0), Instant::now()),
            Evaluation::Ignored(IgnoreReason::AutoDisabled)
        );
        assert_eq!(tracker.phase(), PresencePhase::Unchecked);
        assert_eq!(tracker.nearby().map(|nearby| nearby.court_id), Some(1));
    }

    #[test]
    fn stopped_watch_ignores_samples_and_stop_is_idempotent() {
        let mut tracker = tracker();
        assert!(tracker.stop_watch());
        assert!(!tracker.stop_watch());
        assert_eq!(
            tracker.observe(at(0.0), Instant::now()),
            Evaluation::Ignored(IgnoreReason::WatchStopped)
        );
        assert!(tracker.start_watch());
        assert!(is_check_in(&tracker.observe(at(0.0), Instant::now())));
        assert_eq!(tracker.sensor(), SensorStatus::Active);
    }

    #[test]
    fn confirmation_requires_consecutive_reads_over_window() {
        let mut tracker = GeoPresenceTracker::new(PresenceTuning {
            checkout_confirm_reads: 3,
            checkout_confirm_window: Duration::from_secs(120),
            ..PresenceTuning::default()
        });
        tracker.replace_courts(vec![court(1, COURT_LAT)]);
        let start = Instant::now();
        assert!(is_check_in(&tracker.observe(at(0.0), start)));

        let t = |secs| start + Duration::from_secs(secs);
        assert_eq!(
            tracker.observe(at(300.0), t(60)),
            Evaluation::Hold(HoldReason::ConfirmingExit)
        );
        // Back in range breaks the streak.
        assert_eq!(tracker.observe(at(50.0), t(90)), Evaluation::Hold(HoldReason::Stable));
        assert_eq!(
            tracker.observe(at(300.0), t(100)),
            Evaluation::Hold(HoldReason::ConfirmingExit)
        );
        assert_eq!(
            tracker.observe(at(300.0), t(150)),
            Evaluation::Hold(HoldReason::ConfirmingExit)
        );
        // Three reads, but only 110 s elapsed.
        assert_eq!(
            tracker.observe(at(300.0), t(210)),
            Evaluation::Hold(HoldReason::ConfirmingExit)
        );
        assert!(is_check_out(&tracker.observe(at(300.0), t(220))));
    }

    #[test]
    fn accuracy_buffer_widens_exit_radius() {
        let mut tracker = GeoPresenceTracker::new(PresenceTuning {
            checkout_accuracy_buffer_max_m: 60.0,
            ..PresenceTuning::default()
        });
        tracker.replace_courts(vec![court(1, COURT_LAT)]);
        let start = Instant::now();
        assert!(is_check_in(&tracker.observe(at(0.0), start)));

        let mut fuzzy = at(170.0);
        fuzzy.accuracy_m = 40.0;
        assert_eq!(
            tracker.observe(fuzzy, start + Duration::from_secs(60)),
            Evaluation::Hold(HoldReason::Stable)
        );

        let mut fuzzy = at(210.0);
        fuzzy.accuracy_m = 100.0;
        assert!(is_check_out(&tracker.observe(fuzzy, start + Duration::from_secs(120))));
    }

    #[test]
    fn reconcile_adopts_server_state_and_reset_clears_it() {
        let mut tracker = tracker();
        assert!(tracker.reconcile(PresenceStatus {
            checked_in: true,
            court_id: Some(9),
        }));
        assert_eq!(tracker.checked_in_court(), Some(9));
        assert!(!tracker.reconcile(PresenceStatus {
            checked_in: true,
            court_id: Some(9),
        }));
        assert!(tracker.reset());
        assert_eq!(tracker.phase(), PresencePhase::Unchecked);
        assert!(!tracker.reset());
    }

    #[test]
    fn manual_adoption_stamps_cooldown() {
        let mut tracker = tracker();
        let start = Instant::now();
        tracker.adopt(None, start);
        assert_eq!(
            tracker.observe(at(0.0), start + Duration::from_secs(5)),
            Evaluation::Hold(HoldReason::CoolingDown)
        );
    }

    #[test]
    fn nearby_is_limited_to_radius() {
        let mut tracker = tracker();
        tracker.set_auto_enabled(false);
        tracker.observe(at(4_000.0), Instant::now());
        assert!(tracker.nearby().is_some());
        tracker.observe(at(6_000.0), Instant::now());
        assert!(tracker.nearby().is_none());
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.known_courts, 1);
        assert_eq!(snapshot.checked_in_court_id, None);
    }
}
