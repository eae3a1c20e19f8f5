use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alert::clock::{Clock, ManualClock};

/// BCM pin assignment of the warning hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioPins {
    pub led: u8,
    pub buzzer: u8,
    pub trigger: u8,
    pub echo: u8,
}

impl Default for GpioPins {
    fn default() -> Self {
        Self {
            led: 18,
            buzzer: 19,
            trigger: 24,
            echo: 23,
        }
    }
}

/// Output/input lines the alert logic drives.
pub trait Gpio: Send {
    fn set_led(&mut self, on: bool);
    fn set_buzzer(&mut self, on: bool);
    fn set_trigger(&mut self, high: bool);
    fn read_echo(&mut self) -> bool;

    /// 10 µs trigger pulse for the ultrasonic sensor.
    fn trigger_pulse(&mut self, clock: &dyn Clock) {
        self.set_trigger(true);
        clock.sleep(Duration::from_micros(10));
        self.set_trigger(false);
    }
}

/// GPIO stand-in for hosts without the hardware: logs output changes, echo stays low.
#[derive(Debug)]
pub struct LoggingGpio {
    pins: GpioPins,
    led: bool,
    buzzer: bool,
}

impl LoggingGpio {
    pub fn new(pins: GpioPins) -> Self {
        log::info!(
            "gpio: led={} buzzer={} trig={} echo={} (logging only)",
            pins.led,
            pins.buzzer,
            pins.trigger,
            pins.echo
        );
        Self {
            pins,
            led: false,
            buzzer: false,
        }
    }
}

fn level(on: bool) -> &'static str {
    if on {
        "high"
    } else {
        "low"
    }
}

impl Gpio for LoggingGpio {
    fn set_led(&mut self, on: bool) {
        if self.led != on {
            log::debug!("gpio {} (led) -> {}", self.pins.led, level(on));
            self.led = on;
        }
    }

    fn set_buzzer(&mut self, on: bool) {
        if self.buzzer != on {
            log::debug!("gpio {} (buzzer) -> {}", self.pins.buzzer, level(on));
            self.buzzer = on;
        }
    }

    fn set_trigger(&mut self, high: bool) {
        log::trace!("gpio {} (trig) -> {}", self.pins.trigger, level(high));
    }

    fn read_echo(&mut self) -> bool {
        false
    }
}

/// Observable pin state of a `SimulatedGpio`, shared with the test that built it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PinState {
    pub led: bool,
    pub buzzer: bool,
    pub trigger_pulses: u32,
    /// Count of led/buzzer writes that changed a level.
    pub transitions: u32,
}

/// Simulated sensor: the echo goes high `delay` after the trigger falls and stays
/// high for `width`. Every echo read costs 1 µs of simulated time.
pub struct SimulatedGpio {
    clock: ManualClock,
    echo: Option<(Duration, Duration)>,
    trigger_fell_at: Option<Duration>,
    state: Arc<Mutex<PinState>>,
}

impl SimulatedGpio {
    /// A sensor that never answers.
    pub fn silent(clock: ManualClock) -> Self {
        Self {
            clock,
            echo: None,
            trigger_fell_at: None,
            state: Arc::new(Mutex::new(PinState::default())),
        }
    }

    pub fn with_echo(clock: ManualClock, delay: Duration, width: Duration) -> Self {
        Self {
            echo: Some((delay, width)),
            ..Self::silent(clock)
        }
    }

    pub fn state(&self) -> Arc<Mutex<PinState>> {
        Arc::clone(&self.state)
    }

    fn with_state(&self, f: impl FnOnce(&mut PinState)) {
        f(&mut self.state.lock().unwrap_or_else(|e| e.into_inner()));
    }
}

impl Gpio for SimulatedGpio {
    fn set_led(&mut self, on: bool) {
        self.with_state(|s| {
            if s.led != on {
                s.transitions += 1;
            }
            s.led = on;
        });
    }

    fn set_buzzer(&mut self, on: bool) {
        self.with_state(|s| {
            if s.buzzer != on {
                s.transitions += 1;
            }
            s.buzzer = on;
        });
    }

    fn set_trigger(&mut self, high: bool) {
        if !high {
            self.trigger_fell_at = Some(self.clock.now());
            self.with_state(|s| s.trigger_pulses += 1);
        }
    }

    fn read_echo(&mut self) -> bool {
        self.clock.advance(Duration::from_micros(1));
        let (Some((delay, width)), Some(fell)) = (self.echo, self.trigger_fell_at) else {
            return false;
        };
        let now = self.clock.now();
        let rise = fell + delay;
        now >= rise && now < rise + width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_echo_follows_script() {
        let clock = ManualClock::new();
        let mut gpio =
            SimulatedGpio::with_echo(clock.clone(), Duration::from_micros(5), Duration::from_micros(3));
        gpio.trigger_pulse(&clock);
        assert_eq!(clock.now(), Duration::from_micros(10));

        let reads: Vec<bool> = (0..10).map(|_| gpio.read_echo()).collect();
        assert_eq!(
            reads,
            vec![false, false, false, false, true, true, true, false, false, false]
        );
        assert_eq!(gpio.state().lock().unwrap().trigger_pulses, 1);
    }

    #[test]
    fn output_transitions_are_counted() {
        let mut gpio = SimulatedGpio::silent(ManualClock::new());
        gpio.set_led(true);
        gpio.set_led(true);
        gpio.set_buzzer(true);
        gpio.set_led(false);
        let state = gpio.state().lock().unwrap().clone();
        assert!(!state.led);
        assert!(state.buzzer);
        assert_eq!(state.transitions, 3);
    }
}
