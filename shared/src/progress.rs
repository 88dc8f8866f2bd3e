//! Simulated progress for a request of unknown duration.
//!
//! The bar creeps toward a ceiling on a timer while the request is out, then
//! snaps to 100% once the outcome is known and holds briefly in the outcome
//! colour. Timer ids are handed in by the caller so a fire from an earlier
//! run can be told apart from the current one.

use serde::{Deserialize, Serialize};

use crate::capabilities::TimerId;

pub const RUNNING_COLOR: &str = "#007bff";
pub const SUCCESS_COLOR: &str = "#17b833";
pub const FAILURE_COLOR: &str = "#dc3545";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressConfig {
    pub ceiling_percent: u8,
    pub step_percent: u8,
    pub tick_interval_ms: u64,
    pub success_hold_ms: u64,
    pub failure_hold_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            ceiling_percent: 90,
            step_percent: 1,
            tick_interval_ms: 50,
            success_hold_ms: 500,
            failure_hold_ms: 400,
        }
    }
}

impl ProgressConfig {
    #[must_use]
    pub const fn hold_ms(&self, success: bool) -> u64 {
        if success {
            self.success_hold_ms
        } else {
            self.failure_hold_ms
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProgressPhase {
    #[default]
    Idle,
    Running,
    Completing {
        success: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    /// Re-arm the ticker.
    Advanced(u8),
    /// Ceiling hit; the ticker is dropped and the bar waits for the outcome.
    CeilingReached,
    /// Fire from a cancelled or superseded ticker.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub cancelled_ticker: Option<TimerId>,
    pub hold_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressIndicator {
    percent: u8,
    phase: ProgressPhase,
    ticker: Option<TimerId>,
    hold: Option<TimerId>,
}

impl ProgressIndicator {
    #[must_use]
    pub const fn percent(&self) -> u8 {
        self.percent
    }

    #[must_use]
    pub const fn phase(&self) -> ProgressPhase {
        self.phase
    }

    #[must_use]
    pub const fn ticker(&self) -> Option<TimerId> {
        self.ticker
    }

    #[must_use]
    pub const fn hold(&self) -> Option<TimerId> {
        self.hold
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase == ProgressPhase::Running
    }

    /// Resets to 0% and starts running under `ticker`. Returns any timers
    /// from a previous run that the caller should cancel.
    pub fn start(&mut self, ticker: TimerId) -> Vec<TimerId> {
        let stale = self.reset();
        self.phase = ProgressPhase::Running;
        self.ticker = Some(ticker);
        stale
    }

    pub fn tick(&mut self, id: TimerId, config: &ProgressConfig) -> TickResult {
        if !self.is_running() || self.ticker != Some(id) {
            return TickResult::Stale;
        }

        self.percent = self
            .percent
            .saturating_add(config.step_percent.max(1))
            .min(config.ceiling_percent);

        if self.percent >= config.ceiling_percent {
            self.ticker = None;
            TickResult::CeilingReached
        } else {
            TickResult::Advanced(self.percent)
        }
    }

    /// Snaps to 100% in the outcome colour. `None` if nothing was running,
    /// so a second completion is a no-op.
    pub fn complete(
        &mut self,
        success: bool,
        hold: TimerId,
        config: &ProgressConfig,
    ) -> Option<Completion> {
        if !self.is_running() {
            return None;
        }
        self.percent = 100;
        self.phase = ProgressPhase::Completing { success };
        self.hold = Some(hold);
        Some(Completion {
            cancelled_ticker: self.ticker.take(),
            hold_ms: config.hold_ms(success),
        })
    }

    /// Ends the completion hold. Returns the outcome when `id` is the
    /// current hold timer.
    pub fn finish(&mut self, id: TimerId) -> Option<bool> {
        let ProgressPhase::Completing { success } = self.phase else {
            return None;
        };
        if self.hold != Some(id) {
            return None;
        }
        *self = Self::default();
        Some(success)
    }

    /// Back to idle; returns timers that were still armed.
    pub fn reset(&mut self) -> Vec<TimerId> {
        let armed = self.ticker.into_iter().chain(self.hold).collect();
        *self = Self::default();
        armed
    }

    #[must_use]
    pub fn view(&self) -> ProgressView {
        let color = match self.phase {
            ProgressPhase::Idle | ProgressPhase::Running => RUNNING_COLOR,
            ProgressPhase::Completing { success: true } => SUCCESS_COLOR,
            ProgressPhase::Completing { success: false } => FAILURE_COLOR,
        };
        ProgressView {
            visible: self.phase != ProgressPhase::Idle,
            percent: self.percent,
            color: color.to_string(),
            completing: matches!(self.phase, ProgressPhase::Completing { .. }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressView {
    pub visible: bool,
    pub percent: u8,
    pub color: String,
    pub completing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICKER: TimerId = TimerId(1);
    const HOLD: TimerId = TimerId(2);

    fn running() -> ProgressIndicator {
        let mut progress = ProgressIndicator::default();
        progress.start(TICKER);
        progress
    }

    #[test]
    fn test_ticks_advance_to_ceiling_then_stop() {
        let config = ProgressConfig::default();
        let mut progress = running();

        for expected in 1..90u8 {
            assert_eq!(progress.tick(TICKER, &config), TickResult::Advanced(expected));
        }
        assert_eq!(progress.tick(TICKER, &config), TickResult::CeilingReached);
        assert_eq!(progress.percent(), 90);
        assert_eq!(progress.ticker(), None);
        assert_eq!(progress.tick(TICKER, &config), TickResult::Stale);
        assert_eq!(progress.percent(), 90);
    }

    #[test]
    fn test_foreign_tick_is_stale() {
        let config = ProgressConfig::default();
        let mut progress = running();
        assert_eq!(progress.tick(TimerId(99), &config), TickResult::Stale);
        assert_eq!(progress.percent(), 0);

        let mut idle = ProgressIndicator::default();
        assert_eq!(idle.tick(TICKER, &config), TickResult::Stale);
    }

    #[test]
    fn test_complete_before_ceiling() {
        let config = ProgressConfig::default();
        let mut progress = running();
        progress.tick(TICKER, &config);

        let completion = progress.complete(true, HOLD, &config).unwrap();
        assert_eq!(completion.cancelled_ticker, Some(TICKER));
        assert_eq!(completion.hold_ms, 500);
        assert_eq!(progress.percent(), 100);
        assert_eq!(progress.view().color, SUCCESS_COLOR);

        assert_eq!(progress.tick(TICKER, &config), TickResult::Stale);
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn test_complete_after_ceiling_has_no_ticker() {
        let config = ProgressConfig {
            ceiling_percent: 2,
            ..ProgressConfig::default()
        };
        let mut progress = running();
        progress.tick(TICKER, &config);
        assert_eq!(progress.tick(TICKER, &config), TickResult::CeilingReached);

        let completion = progress.complete(false, HOLD, &config).unwrap();
        assert_eq!(completion.cancelled_ticker, None);
        assert_eq!(completion.hold_ms, 400);
        assert_eq!(progress.view().color, FAILURE_COLOR);
    }

    #[test]
    fn test_second_complete_is_noop() {
        let config = ProgressConfig::default();
        let mut progress = running();
        assert!(progress.complete(true, HOLD, &config).is_some());
        assert!(progress.complete(false, TimerId(3), &config).is_none());
        assert_eq!(progress.phase(), ProgressPhase::Completing { success: true });
    }

    #[test]
    fn test_finish_only_for_current_hold() {
        let config = ProgressConfig::default();
        let mut progress = running();
        progress.complete(true, HOLD, &config);

        assert_eq!(progress.finish(TimerId(7)), None);
        assert_eq!(progress.finish(HOLD), Some(true));
        assert_eq!(progress, ProgressIndicator::default());
        assert!(!progress.view().visible);
    }

    #[test]
    fn test_reset_returns_armed_timers() {
        let config = ProgressConfig::default();
        let mut progress = running();
        assert_eq!(progress.reset(), vec![TICKER]);

        let mut progress = running();
        progress.complete(false, HOLD, &config);
        assert_eq!(progress.reset(), vec![HOLD]);
        assert_eq!(progress.percent(), 0);
    }

    #[test]
    fn test_restart_reports_previous_timers() {
        let mut progress = running();
        assert_eq!(progress.start(TimerId(5)), vec![TICKER]);
        assert_eq!(progress.ticker(), Some(TimerId(5)));
        assert_eq!(progress.percent(), 0);
    }
}
