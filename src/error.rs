//! Error taxonomy shared by the transceiver and the scheduler.
//!
//! Protocol and timeout errors are transient: the scheduler logs them, drops
//! the conversation and carries on. Timer errors mean the periodic timer
//! backing the transceiver can no longer be trusted, and are fatal.

use core::fmt;

use thiserror::Error;

/// Classification of a Manchester decoding failure.
#[derive(Error, PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum ProtocolErrorKind {
    /// The mid-bit transition was missing.
    #[error("NO_TRANSITION")]
    NoTransition,
    /// The level after 32 data bits was not a stop bit.
    #[error("INVALID_STOP_BIT")]
    InvalidStopBit,
    /// The received 32 bits do not have odd parity.
    #[error("PARITY_ERROR")]
    ParityError,
    /// The line did not change level for 8 or more samples.
    #[error("NO_CHANGE_TOO_LONG")]
    NoChangeTooLong,
}

/// A decoding failure together with the sampler state at the time it
/// happened.
#[derive(Error, PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[error("{kind} at bit {bit_pos} (capture {capture:#b}, clock {clock}, data {data:#x})")]
pub struct ProtocolError {
    /// What went wrong.
    pub kind: ProtocolErrorKind,
    /// Number of data points read so far, start bit included.
    pub bit_pos: u8,
    /// Sample shift register, newest sample in bit 0.
    pub capture: u32,
    /// Manchester clock phase (1 = a data point is expected next).
    pub clock: u8,
    /// Data shift register.
    pub data: u32,
}

/// A failure of the periodic timer driving the transceiver.
#[derive(Error, PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum TimerError {
    /// No free timer was found on the platform.
    #[error("no free timer available")]
    Unavailable,
    /// The alarm or reload value could not be set.
    #[error("failed to set the alarm value")]
    SetAlarmValue,
    /// The timer could not be started.
    #[error("failed to start the timer")]
    Start,
    /// The timer could not be paused.
    #[error("failed to pause the timer")]
    Pause,
    /// The counter value could not be reset.
    #[error("failed to set the counter value")]
    SetCounterValue,
}

/// Errors raised by [`Transceiver::initialize`](crate::transceiver::Transceiver::initialize).
#[derive(Error, PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum InitError {
    /// The output pin could not be driven to its idle level.
    #[error("failed to drive the output pin idle")]
    Pin,
    /// The periodic timer could not be set up.
    #[error("timer setup failed: {0}")]
    Timer(#[from] TimerError),
}

/// Errors raised when registering message handlers.
#[derive(Error, PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum RegistryError {
    /// The role is already taken for this data-id.
    #[error("a handler is already registered for data-id {0}")]
    Occupied(u8),
    /// The registry has no room for another data-id.
    #[error("no slot left in the registry")]
    Full,
}

/// Fatal errors reported by the scheduler.
#[derive(Error, PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum HubError {
    /// The timer failed during this call; the scheduler is now failed.
    #[error("timer error: {0}")]
    Timer(#[from] TimerError),
    /// The scheduler failed earlier and no longer talks to the bus.
    #[error("OpenTherm component has failed")]
    Failed,
}

impl ProtocolErrorKind {
    /// Protocol name of the error, for logs.
    pub fn name(self) -> &'static str {
        match self {
            ProtocolErrorKind::NoTransition => "NO_TRANSITION",
            ProtocolErrorKind::InvalidStopBit => "INVALID_STOP_BIT",
            ProtocolErrorKind::ParityError => "PARITY_ERROR",
            ProtocolErrorKind::NoChangeTooLong => "NO_CHANGE_TOO_LONG",
        }
    }
}

/// Renders a 32-bit word as four space separated binary octets.
pub(crate) struct Octets(pub(crate) u32);

impl fmt::Display for Octets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0.to_be_bytes();
        write!(f, "{a:08b} {b:08b} {c:08b} {d:08b}")
    }
}

#[cfg(feature = "defmt-0-3")]
impl defmt::Format for Octets {
    fn format(&self, f: defmt::Formatter) {
        let [a, b, c, d] = self.0.to_be_bytes();
        defmt::write!(f, "{=u8:b} {=u8:b} {=u8:b} {=u8:b}", a, b, c, d)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError {
            kind: ProtocolErrorKind::ParityError,
            bit_pos: 33,
            capture: 0b10,
            clock: 1,
            data: 0x4019_1234,
        };
        assert_eq!(
            err.to_string(),
            "PARITY_ERROR at bit 33 (capture 0b10, clock 1, data 0x40191234)"
        );
    }

    #[test]
    fn test_timer_error_converts() {
        assert_eq!(
            InitError::from(TimerError::Unavailable),
            InitError::Timer(TimerError::Unavailable)
        );
        assert_eq!(
            HubError::from(TimerError::Pause).to_string(),
            "timer error: failed to pause the timer"
        );
    }

    #[test]
    fn test_octets() {
        assert_eq!(
            Octets(0x8000_0001).to_string(),
            "10000000 00000000 00000000 00000001"
        );
    }
}
