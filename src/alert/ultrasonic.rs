use std::time::Duration;

use crate::alert::clock::Clock;
use crate::alert::gpio::Gpio;

/// Half the speed of sound in cm/s: echo time × this = one-way distance.
pub const SPEED_FACTOR_CM_PER_S: f64 = 17150.0;
pub const ECHO_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RangingConfig {
    /// Deadline shared by the wait for the echo to rise and the wait for it to fall.
    pub timeout: Duration,
    pub speed_factor: f64,
}

impl Default for RangingConfig {
    fn default() -> Self {
        Self {
            timeout: ECHO_TIMEOUT,
            speed_factor: SPEED_FACTOR_CM_PER_S,
        }
    }
}

/// Fire one ping and time the echo. Returns centimetres rounded to 2 decimals,
/// or `None` when no complete echo pulse was seen before the deadline.
pub fn measure(gpio: &mut dyn Gpio, clock: &dyn Clock, cfg: &RangingConfig) -> Option<f64> {
    gpio.trigger_pulse(clock);

    let deadline = clock.now() + cfg.timeout;
    let mut pulse_start = clock.now();
    let mut pulse_end = pulse_start;

    while !gpio.read_echo() && clock.now() < deadline {
        pulse_start = clock.now();
    }
    while gpio.read_echo() && clock.now() < deadline {
        pulse_end = clock.now();
    }

    if pulse_end <= pulse_start {
        return None;
    }
    let cm = (pulse_end - pulse_start).as_secs_f64() * cfg.speed_factor;
    Some((cm * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::clock::ManualClock;
    use crate::alert::gpio::SimulatedGpio;

    #[test]
    fn one_millisecond_echo_is_17_15_cm() {
        let clock = ManualClock::new();
        let mut gpio = SimulatedGpio::with_echo(
            clock.clone(),
            Duration::from_micros(300),
            Duration::from_micros(1000),
        );
        let range = measure(&mut gpio, &clock, &RangingConfig::default());
        assert_eq!(range, Some(17.15));
    }

    #[test]
    fn silent_sensor_times_out() {
        let clock = ManualClock::new();
        let mut gpio = SimulatedGpio::silent(clock.clone());
        let range = measure(&mut gpio, &clock, &RangingConfig::default());
        assert_eq!(range, None);
        let elapsed = clock.now();
        assert!(elapsed >= ECHO_TIMEOUT);
        assert!(elapsed < ECHO_TIMEOUT + Duration::from_millis(1));
    }

    #[test]
    fn echo_after_deadline_is_no_reading() {
        let clock = ManualClock::new();
        let mut gpio = SimulatedGpio::with_echo(
            clock.clone(),
            Duration::from_millis(150),
            Duration::from_micros(500),
        );
        assert_eq!(measure(&mut gpio, &clock, &RangingConfig::default()), None);
    }
}
