//! Debounced LED/buzzer alerting.
//!
//! States: `Idle` (actuators off) and `Alerting` (actuators on).
//!
//! - Warnings present and the cooldown elapsed (or never triggered): actuators
//!   on, one ultrasonic ping, auto-off scheduled `auto_off` after the trigger.
//! - Warnings present inside the cooldown: nothing changes.
//! - No warnings: actuators off at once.
//!
//! The auto-off is a deadline checked at the start of every `update` and on
//! every `poll`, so it fires on the first cycle at or after the deadline.

mod clock;
mod gpio;
mod ultrasonic;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use gpio::{Gpio, GpioPins, LoggingGpio, PinState, SimulatedGpio};
pub use ultrasonic::{measure, RangingConfig, ECHO_TIMEOUT, SPEED_FACTOR_CM_PER_S};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::proximity::Warning;

pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(1500);
pub const DEFAULT_AUTO_OFF: Duration = Duration::from_millis(800);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlertConfig {
    /// Minimum time between two triggers; a trigger needs strictly more than this.
    pub cooldown: Duration,
    pub auto_off: Duration,
    pub ranging: RangingConfig,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            auto_off: DEFAULT_AUTO_OFF,
            ranging: RangingConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Idle,
    Alerting,
}

/// Point-in-time view of the alert machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertStatus {
    pub state: AlertState,
    pub actuators_on: bool,
    /// Last ultrasonic reading in cm; `None` when the last ping got no echo.
    pub last_range_cm: Option<f64>,
    pub trigger_count: u64,
    /// Whether the most recent `update` fired a trigger.
    pub triggered: bool,
}

pub struct AlertStateMachine {
    gpio: Box<dyn Gpio>,
    clock: Arc<dyn Clock>,
    cfg: AlertConfig,
    state: AlertState,
    actuators_on: bool,
    last_trigger: Option<Duration>,
    off_due: Option<Duration>,
    last_range_cm: Option<f64>,
    trigger_count: u64,
    triggered: bool,
}

impl AlertStateMachine {
    pub fn new(gpio: Box<dyn Gpio>, clock: Arc<dyn Clock>, cfg: AlertConfig) -> Self {
        let mut machine = Self {
            gpio,
            clock,
            cfg,
            state: AlertState::Idle,
            actuators_on: false,
            last_trigger: None,
            off_due: None,
            last_range_cm: None,
            trigger_count: 0,
            triggered: false,
        };
        machine.set_actuators(false);
        machine
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    pub fn status(&self) -> AlertStatus {
        AlertStatus {
            state: self.state,
            actuators_on: self.actuators_on,
            last_range_cm: self.last_range_cm,
            trigger_count: self.trigger_count,
            triggered: self.triggered,
        }
    }

    /// Feed one frame's warnings.
    pub fn update(&mut self, warnings: &[Warning]) -> AlertStatus {
        let now = self.clock.now();
        self.triggered = false;
        self.fire_auto_off(now);

        if warnings.is_empty() {
            // Drive the lines low every quiet cycle, whatever we last wrote.
            self.set_actuators(false);
            self.state = AlertState::Idle;
            self.off_due = None;
        } else if self.cooldown_elapsed(now) {
            self.trigger(now, warnings);
        }

        self.status()
    }

    /// Service the auto-off deadline without new warnings (skipped cycles).
    pub fn poll(&mut self) -> AlertStatus {
        let now = self.clock.now();
        self.fire_auto_off(now);
        self.status()
    }

    /// Force everything off; used on process exit.
    pub fn shutdown(&mut self) {
        self.set_actuators(false);
        self.state = AlertState::Idle;
        self.off_due = None;
    }

    fn cooldown_elapsed(&self, now: Duration) -> bool {
        match self.last_trigger {
            None => true,
            Some(t) => now.saturating_sub(t) > self.cfg.cooldown,
        }
    }

    fn fire_auto_off(&mut self, now: Duration) {
        if let Some(due) = self.off_due {
            if now >= due {
                log::debug!("alert auto-off");
                self.set_actuators(false);
                self.state = AlertState::Idle;
                self.off_due = None;
            }
        }
    }

    fn trigger(&mut self, now: Duration, warnings: &[Warning]) {
        self.set_actuators(true);
        self.state = AlertState::Alerting;
        self.last_trigger = Some(now);
        self.off_due = Some(now + self.cfg.auto_off);
        self.trigger_count += 1;
        self.triggered = true;

        self.last_range_cm = measure(self.gpio.as_mut(), self.clock.as_ref(), &self.cfg.ranging);

        let collisions = warnings.iter().filter(|w| w.is_collision()).count();
        log::warn!(
            "alert: {} warning(s) ({} proximity, {} collision)",
            warnings.len(),
            warnings.len() - collisions,
            collisions
        );
        for w in warnings {
            log::info!("  {}", w);
        }
        match self.last_range_cm {
            Some(cm) => log::info!("  ultrasonic range: {} cm", cm),
            None => log::warn!("  ultrasonic: no reading"),
        }
    }

    fn set_actuators(&mut self, on: bool) {
        self.gpio.set_led(on);
        self.gpio.set_buzzer(on);
        self.actuators_on = on;
    }
}

impl Drop for AlertStateMachine {
    fn drop(&mut self) {
        if self.actuators_on {
            self.set_actuators(false);
        }
    }
}
