use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::{InitError, ProtocolError, TimerError};
use crate::frame::Frame;
use crate::timer::PeriodicTimer;
use crate::transceiver::{Line, Mode, Transceiver};

/// A software stand-in for a periodic timer, paced by a blocking delay.
///
/// It only remembers the interval it was armed with; [`run_tick_loop`]
/// does the waiting.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
pub struct DelayTimer {
    interval_us: Option<u32>,
}

impl DelayTimer {
    /// Creates a disarmed timer.
    pub const fn new() -> Self {
        Self { interval_us: None }
    }

    /// The armed interval, or `None` while stopped.
    pub fn interval_us(&self) -> Option<u32> {
        self.interval_us
    }
}

impl PeriodicTimer for DelayTimer {
    fn start(&mut self, interval_us: u32) -> Result<(), TimerError> {
        self.interval_us = Some(interval_us);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TimerError> {
        self.interval_us = None;
        Ok(())
    }
}

/// Runs a blocking loop that calls `tick()` on the transceiver until its
/// timer is stopped, i.e. until the transfer in flight has ended.
///
/// This is a simple timing loop for use in environments where interrupts are unavailable
/// or undesired. It drives the transceiver's timing using a delay provider implementing
/// `embedded_hal::delay::DelayNs`.
///
/// # Arguments
/// - `transceiver`: A transceiver paced by a [`DelayTimer`].
/// - `delay`: A delay provider implementing `DelayNs`, typically from the HAL.
///
/// # Returns
/// The mode the transfer ended in.
///
/// # Notes
/// - The time spent in `tick()` adds to every delay, so the effective rate
///   is slightly below nominal. The decoder tolerates this, but the HAL's
///   delay should be accurate to a few microseconds.
pub fn run_tick_loop<D: DelayNs, IN, OUT>(
    transceiver: &mut Transceiver<IN, OUT, DelayTimer>,
    delay: &mut D,
) -> Mode
where
    IN: InputPin,
    OUT: OutputPin,
{
    while let Some(interval_us) = transceiver.timer.interval_us() {
        delay.delay_us(interval_us);
        transceiver.tick();
    }
    transceiver.mode()
}

/// A transceiver whose `listen()` and `send()` block until the transfer ends.
///
/// Lets the [`Scheduler`](crate::scheduler::Scheduler) run without a timer
/// interrupt.
#[derive(Debug)]
pub struct BlockingTransceiver<IN, OUT, D>
where
    IN: InputPin,
    OUT: OutputPin,
    D: DelayNs,
{
    /// The paced transceiver
    pub transceiver: Transceiver<IN, OUT, DelayTimer>,
    /// The delay provider
    pub delay: D,
}

impl<IN, OUT, D> BlockingTransceiver<IN, OUT, D>
where
    IN: InputPin,
    OUT: OutputPin,
    D: DelayNs,
{
    /// Wraps a transceiver built on a [`DelayTimer`].
    pub fn new(in_pin: IN, out_pin: OUT, delay: D, device_timeout_ms: u32) -> Self {
        Self {
            transceiver: Transceiver::new(in_pin, out_pin, DelayTimer::new(), device_timeout_ms),
            delay,
        }
    }
}

impl<IN, OUT, D> Line for BlockingTransceiver<IN, OUT, D>
where
    IN: InputPin,
    OUT: OutputPin,
    D: DelayNs,
{
    fn initialize(&mut self) -> Result<(), InitError> {
        self.transceiver.initialize()
    }

    fn mode(&self) -> Mode {
        self.transceiver.mode()
    }

    fn listen(&mut self) {
        self.transceiver.listen();
        let _ = run_tick_loop(&mut self.transceiver, &mut self.delay);
    }

    fn send(&mut self, frame: &Frame) {
        self.transceiver.send(frame);
        let _ = run_tick_loop(&mut self.transceiver, &mut self.delay);
    }

    fn get_message(&self) -> Option<Frame> {
        self.transceiver.get_message()
    }

    fn get_protocol_error(&self) -> Option<ProtocolError> {
        self.transceiver.get_protocol_error()
    }

    fn stop(&mut self) {
        self.transceiver.stop()
    }

    fn take_timer_error(&mut self) -> Option<TimerError> {
        self.transceiver.take_timer_error()
    }

    fn device_timeout_ms(&self) -> u32 {
        self.transceiver.device_timeout_ms()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::decoder::tests::input_waveform;
    use crate::frame::MessageType;
    use crate::message::MessageId;
    use crate::transceiver::tests::ReplayPin;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::Mock as PinMock;

    #[test]
    fn test_tick_loop_stops_with_the_timer() {
        let mut line = BlockingTransceiver::new(
            ReplayPin::new(0, &[]),
            PinMock::new(&[]),
            NoopDelay::new(),
            1,
        );

        line.listen();
        assert_eq!(line.mode(), Mode::ErrorTimeout);
        assert_eq!(line.transceiver.timer.interval_us(), None);
        line.transceiver.out_pin.done();
    }

    #[test]
    fn test_blocking_listen_receives_a_frame() {
        let mut frame = Frame::new(MessageType::ReadAck, MessageId::RelHumidity);
        frame.set_f88(55.5);

        let mut line = BlockingTransceiver::new(
            ReplayPin::new(11, &input_waveform(frame.to_raw())),
            PinMock::new(&[]),
            NoopDelay::new(),
            800,
        );

        line.listen();
        assert!(line.has_message());
        assert_eq!(line.get_message(), Some(frame));
        line.stop();
        assert!(line.is_idle());
        line.transceiver.out_pin.done();
    }
}
