//! Periodic timer abstraction and tick-loop utilities for the transceiver.
//!
//! The transceiver needs a periodic callback at two rates: every 200 µs
//! while reading (5 samples per bit) and every 500 µs while writing (one per
//! Manchester half-bit). The platform supplies it by implementing
//! [`PeriodicTimer`] and calling [`Transceiver::tick`](crate::transceiver::Transceiver::tick)
//! from the timer's callback. This employs two approaches: an interrupt service
//! routine using `critical_section::with` (`timer-isr` feature), or a busy-loop
//! delay timer (`delay-loop` feature).
//!
//! Contains helpers for polling- and ISR-based scheduling, including:
//! - `compute_reload_value`: runtime reload value calculator
//! - `const_reload_value`: compile-time reload value calculator
//! - `run_tick_loop` and [`DelayTimer`]: blocking driver loop for `DelayNs` (feature `delay-loop`)
//! - `global_transceiver_tick` and `tick_opentherm!()`: interrupt-based tick callback wrapper
//!   (feature `timer-isr`)
//!
//! Common reload values: (For use with `compute_reload_value` and `const_reload_value`)
//!
//! | TIMER CLOCK | INTERVAL | RELOAD |
//! |-------------|----------|--------|
//! |       1 MHz |   200 µs |    200 |
//! |       1 MHz |   500 µs |    500 |
//! |    16 MHz/64|   200 µs |     50 |
//! |    16 MHz/64|   500 µs |    125 |

use libm::round;

use crate::error::TimerError;

#[cfg(feature = "delay-loop")]
mod delay;
#[cfg_attr(feature = "delay-loop", allow(unused_imports))]
#[cfg(feature = "delay-loop")]
pub use delay::*;

#[cfg(feature = "timer-isr")]
mod isr;
#[cfg_attr(feature = "timer-isr", allow(unused_imports))]
#[cfg(feature = "timer-isr")]
pub use isr::*;

#[cfg(feature = "timer-isr")]
mod macros;
#[cfg_attr(feature = "timer-isr", allow(unused_imports))]
#[cfg(feature = "timer-isr")]
pub use macros::*;

/// A hardware (or software) timer firing a periodic callback.
///
/// The callback itself is wired by the platform: it must call
/// [`Transceiver::tick`](crate::transceiver::Transceiver::tick) every time the
/// timer fires. The transceiver only arms and disarms the timer.
///
/// Implementations should make [`start`](PeriodicTimer::start) restart the
/// period from zero, the decoder relies on this to align its sampling phase
/// to the start bit.
pub trait PeriodicTimer {
    /// One-time configuration, called from
    /// [`Transceiver::initialize`](crate::transceiver::Transceiver::initialize).
    ///
    /// Platforms without a free timer return [`TimerError::Unavailable`].
    fn setup(&mut self) -> Result<(), TimerError> {
        Ok(())
    }

    /// Arms the timer to fire every `interval_us` microseconds, starting one
    /// interval from now.
    fn start(&mut self, interval_us: u32) -> Result<(), TimerError>;

    /// Disarms the timer. Stopping a stopped timer is not an error.
    fn stop(&mut self) -> Result<(), TimerError>;
}

impl<T: PeriodicTimer + ?Sized> PeriodicTimer for &mut T {
    fn setup(&mut self) -> Result<(), TimerError> {
        T::setup(self)
    }

    fn start(&mut self, interval_us: u32) -> Result<(), TimerError> {
        T::start(self, interval_us)
    }

    fn stop(&mut self) -> Result<(), TimerError> {
        T::stop(self)
    }
}

/// Computes the auto-reload value of a timer counting at `f_cpu / prescaler`
///
/// # Arguments
/// - `f_cpu`: timer input clock in Hz
/// - `prescaler`: timer prescaler (e.g., 1, 8, 64, 80)
/// - `interval_us`: desired tick interval in microseconds (e.g., 200 or 500)
///
/// # Returns
/// - Reload value (rounds to nearest integer)
/// - Number of ticks per 1 ms OpenTherm bit at that interval
pub fn compute_reload_value(f_cpu: u32, prescaler: u32, interval_us: f32) -> (u32, u8) {
    let ticks_per_second = f64::from(f_cpu) / f64::from(prescaler);
    let reload = round(ticks_per_second * f64::from(interval_us) / 1_000_000.0);
    (reload as u32, ticks_per_bit(interval_us))
}

/// Compile-time reload value calculator
///
/// Same as [`compute_reload_value`] with an integer interval, truncating
/// instead of rounding.
pub const fn const_reload_value(f_cpu: u32, prescaler: u32, interval_us: u32) -> (u32, u8) {
    let reload = (f_cpu / prescaler) as u64 * interval_us as u64 / 1_000_000;
    (reload as u32, const_ticks_per_bit(interval_us))
}

/// Compute ticks per bit value
///
/// # Arguments
/// - `interval_us`: tick interval in microseconds (e.g., 200)
pub fn ticks_per_bit(interval_us: f32) -> u8 {
    round(1_000.0 / f64::from(interval_us)) as u8
}

/// Compile-time ticks per bit value
pub const fn const_ticks_per_bit(interval_us: u32) -> u8 {
    (1_000 / interval_us) as u8
}

#[cfg(all(test, feature = "std"))]
pub(crate) mod tests {
    use super::*;
    use crate::consts::{READ_TICK_US, READ_TICKS_PER_BIT, WRITE_TICK_US, WRITE_TICKS_PER_BIT};

    /// What a [`MockTimer`] was asked to do.
    #[derive(PartialEq, Eq, Clone, Copy, Debug)]
    pub(crate) enum TimerCall {
        Setup,
        Start(u32),
        Stop,
    }

    /// Records every call and optionally fails some of them.
    #[derive(Default, Debug)]
    pub(crate) struct MockTimer {
        pub(crate) calls: Vec<TimerCall>,
        pub(crate) fail_setup: Option<TimerError>,
        pub(crate) fail_start: Option<TimerError>,
        pub(crate) fail_stop: Option<TimerError>,
    }

    impl MockTimer {
        pub(crate) fn starts(&self) -> Vec<u32> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    TimerCall::Start(us) => Some(*us),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn last(&self) -> Option<TimerCall> {
            self.calls.last().copied()
        }
    }

    impl PeriodicTimer for MockTimer {
        fn setup(&mut self) -> Result<(), TimerError> {
            self.calls.push(TimerCall::Setup);
            self.fail_setup.map_or(Ok(()), Err)
        }

        fn start(&mut self, interval_us: u32) -> Result<(), TimerError> {
            self.calls.push(TimerCall::Start(interval_us));
            self.fail_start.map_or(Ok(()), Err)
        }

        fn stop(&mut self) -> Result<(), TimerError> {
            self.calls.push(TimerCall::Stop);
            self.fail_stop.map_or(Ok(()), Err)
        }
    }

    #[test]
    fn test_reload_values() {
        assert_eq!(compute_reload_value(80_000_000, 80, 200.0), (200, 5));
        assert_eq!(compute_reload_value(16_000_000, 64, 500.0), (125, 2));
        assert_eq!(const_reload_value(16_000_000, 64, 200), (50, 5));
    }

    #[test]
    fn test_ticks_per_bit_matches_protocol_rates() {
        assert_eq!(u32::from(ticks_per_bit(READ_TICK_US as f32)), READ_TICKS_PER_BIT);
        assert_eq!(
            u32::from(const_ticks_per_bit(WRITE_TICK_US)),
            WRITE_TICKS_PER_BIT
        );
    }
}
