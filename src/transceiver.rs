//! Timer-driven Manchester transceiver for the OpenTherm bus.
//!
//! This module provides the [`Transceiver`] struct, which owns the input and
//! output pins of an OpenTherm interface plus a [`PeriodicTimer`], and moves
//! exactly one 32-bit frame at a time in either direction.
//!
//! The transceiver never blocks. [`listen()`](Transceiver::listen) and
//! [`send()`](Transceiver::send) only arm the timer; the actual sampling and
//! level generation happens in [`tick()`](Transceiver::tick), which the
//! platform must call from the timer callback. Completion is observed by
//! polling [`mode()`](Transceiver::mode) or
//! [`poll_complete()`](Line::poll_complete).
//!
//! ## Modes
//!
//! ```text
//! Idle -> Listen -> Read -> Received
//! Idle -> Write -> Sent
//! Listen | Read | Write -> ErrorProtocol | ErrorTimeout | ErrorTimer
//! ```
//!
//! `Received`, `Sent` and the error modes are terminal until [`stop()`](Transceiver::stop)
//! brings the transceiver back to `Idle`.
//!
//! ## Example
//!
//! ```rust
//! # use embedded_hal_mock::eh1::digital::{Mock as Pin, State as PinState, Transaction as PinTransaction};
//! # use opentherm::error::TimerError;
//! # use opentherm::timer::PeriodicTimer;
//! # struct Timer;
//! # impl PeriodicTimer for Timer {
//! #     fn start(&mut self, _: u32) -> Result<(), TimerError> { Ok(()) }
//! #     fn stop(&mut self) -> Result<(), TimerError> { Ok(()) }
//! # }
//! use opentherm::transceiver::{Mode, Transceiver};
//!
//! # let in_pin = Pin::new(&[]);
//! # let out_pin = Pin::new(&[PinTransaction::set(PinState::High)]);
//! let mut transceiver = Transceiver::new(in_pin, out_pin, Timer, 800);
//! transceiver.initialize().unwrap();
//! assert_eq!(transceiver.mode(), Mode::Idle);
//! # transceiver.in_pin.done();
//! # transceiver.out_pin.done();
//! ```
//!
//! For decoding internals, see [`crate::decoder::ManchesterDecoder`].
//!
//! For timer and tick scheduling helpers, see [`crate::timer`].

use core::convert::Infallible;
use core::fmt;

use embedded_hal::digital::{InputPin, OutputPin, PinState};

use crate::consts::{READ_TICK_US, READ_TICKS_PER_BIT, WRITE_START_BIT_POS, WRITE_TICK_US};
use crate::decoder::{DecodeStep, ManchesterDecoder};
use crate::encoding::{output_level, slot_bit};
use crate::error::{InitError, ProtocolError, TimerError};
use crate::frame::Frame;
use crate::timer::PeriodicTimer;

/// Operation mode of the [`Transceiver`].
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Mode {
    /// Nothing in flight. The only mode a new operation may start from.
    #[default]
    Idle,
    /// Waiting for the start bit of a response.
    Listen,
    /// Decoding a response.
    Read,
    /// A valid response is waiting in the transceiver.
    Received,
    /// Transmitting a request.
    Write,
    /// The request has been transmitted.
    Sent,
    /// The response was not valid Manchester or failed its checks.
    ErrorProtocol,
    /// No response started within the device timeout.
    ErrorTimeout,
    /// The timer could not be armed.
    ErrorTimer,
}

impl Mode {
    /// Whether a transfer is in flight.
    pub fn is_active(self) -> bool {
        matches!(self, Mode::Listen | Mode::Read | Mode::Write)
    }

    /// Whether the last transfer failed.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            Mode::ErrorProtocol | Mode::ErrorTimeout | Mode::ErrorTimer
        )
    }

    /// Name of the mode, for logs.
    pub fn name(self) -> &'static str {
        match self {
            Mode::Idle => "IDLE",
            Mode::Listen => "LISTEN",
            Mode::Read => "READ",
            Mode::Received => "RECEIVED",
            Mode::Write => "WRITE",
            Mode::Sent => "SENT",
            Mode::ErrorProtocol => "ERROR_PROTOCOL",
            Mode::ErrorTimeout => "ERROR_TIMEOUT",
            Mode::ErrorTimer => "ERROR_TIMER",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The bus as seen by the [`Scheduler`](crate::scheduler::Scheduler).
///
/// Implemented by [`Transceiver`] for single-context use (e.g. a delay loop)
/// and by [`SharedTransceiver`](crate::timer::SharedTransceiver) when the
/// transceiver is ticked from a timer interrupt.
pub trait Line {
    /// Prepares the pins and the timer. See [`Transceiver::initialize`].
    fn initialize(&mut self) -> Result<(), InitError>;
    /// Current mode.
    fn mode(&self) -> Mode;
    /// Starts waiting for a response. See [`Transceiver::listen`].
    fn listen(&mut self);
    /// Starts transmitting `frame`. See [`Transceiver::send`].
    fn send(&mut self, frame: &Frame);
    /// The received frame, if any.
    fn get_message(&self) -> Option<Frame>;
    /// Details of the last protocol error, if any.
    fn get_protocol_error(&self) -> Option<ProtocolError>;
    /// Stops the timer and returns to [`Mode::Idle`].
    fn stop(&mut self);
    /// Reports and clears the last timer failure.
    fn take_timer_error(&mut self) -> Option<TimerError>;
    /// Configured device timeout in milliseconds.
    fn device_timeout_ms(&self) -> u32;

    /// Whether nothing is in flight.
    fn is_idle(&self) -> bool {
        self.mode() == Mode::Idle
    }

    /// Whether a transfer is in flight.
    fn is_active(&self) -> bool {
        self.mode().is_active()
    }

    /// Whether the request has been transmitted.
    fn is_sent(&self) -> bool {
        self.mode() == Mode::Sent
    }

    /// Whether a valid response is waiting.
    fn has_message(&self) -> bool {
        self.mode() == Mode::Received
    }

    /// Whether the last transfer failed.
    fn is_error(&self) -> bool {
        self.mode().is_error()
    }

    /// Non-blocking wait for the transfer in flight.
    ///
    /// Returns `WouldBlock` while a transfer is active, the final mode otherwise.
    fn poll_complete(&self) -> nb::Result<Mode, Infallible> {
        let mode = self.mode();
        if mode.is_active() {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(mode)
        }
    }
}

/// A software Manchester transceiver for one OpenTherm interface.
///
/// ## Type Parameters
///
/// - `IN`: the pin reading the bus (through the interface's receive stage)
/// - `OUT`: the pin driving the bus (through the interface's transmit stage)
/// - `T`: the periodic timer whose callback calls [`tick()`](Transceiver::tick)
///
/// ## Notes
///
/// - Only one `Transceiver` instance should be active if you're using interrupts.
/// - The output pin idles high, which keeps the bus powered.
#[derive(Debug)]
pub struct Transceiver<IN, OUT, T>
where
    IN: InputPin,
    OUT: OutputPin,
    T: PeriodicTimer,
{
    /// Input pin
    pub in_pin: IN,
    /// Output pin
    pub out_pin: OUT,
    /// Periodic timer
    pub timer: T,
    mode: Mode,
    decoder: ManchesterDecoder,
    protocol_error: Option<ProtocolError>,
    timer_error: Option<TimerError>,
    device_timeout_ms: u32,
    timeout_counter: u32,
    tx_data: u32,
    tx_bit_pos: u8,
    tx_first_half: bool,
}

impl<IN, OUT, T> Transceiver<IN, OUT, T>
where
    IN: InputPin,
    OUT: OutputPin,
    T: PeriodicTimer,
{
    /// Creates a new idle transceiver.
    ///
    /// # Arguments
    /// - `in_pin`: the input pin sampled while listening
    /// - `out_pin`: the output pin toggled while sending
    /// - `timer`: the periodic timer driving [`tick()`](Transceiver::tick)
    /// - `device_timeout_ms`: how long the boiler gets to start its response
    ///   (the protocol allows up to 800 ms)
    pub fn new(in_pin: IN, out_pin: OUT, timer: T, device_timeout_ms: u32) -> Self {
        Self {
            in_pin,
            out_pin,
            timer,
            mode: Mode::Idle,
            decoder: ManchesterDecoder::new(),
            protocol_error: None,
            timer_error: None,
            device_timeout_ms,
            timeout_counter: 0,
            tx_data: 0,
            tx_bit_pos: 0,
            tx_first_half: true,
        }
    }

    /// Drives the output idle-high and sets up the timer.
    ///
    /// # Errors
    /// - [`InitError::Pin`] when the output pin cannot be driven
    /// - [`InitError::Timer`] when the timer cannot be set up, e.g.
    ///   [`TimerError::Unavailable`] on a platform without a free timer
    pub fn initialize(&mut self) -> Result<(), InitError> {
        self.out_pin.set_high().map_err(|_| InitError::Pin)?;
        if let Err(err) = self.timer.setup() {
            error!("No usable timer for OpenTherm: {}", err);
            return Err(err.into());
        }
        debug!(
            "OpenTherm transceiver initialized, device timeout {} ms",
            self.device_timeout_ms
        );
        Ok(())
    }

    /// Starts waiting for a response.
    ///
    /// Clears the decoder, arms the timeout countdown and starts the 5 kHz
    /// sampling timer. If no start bit arrives within the device timeout the
    /// mode becomes [`Mode::ErrorTimeout`].
    pub fn listen(&mut self) {
        self.stop_timer();
        self.timeout_counter = self.device_timeout_ms.saturating_mul(READ_TICKS_PER_BIT);
        self.mode = Mode::Listen;
        self.protocol_error = None;
        self.decoder.reset();
        self.start_timer(READ_TICK_US);
    }

    /// Starts transmitting `frame`.
    ///
    /// The frame is packed with its parity bit and emitted MSB first between
    /// a start and a stop bit, one Manchester half per 500 µs tick. The mode
    /// becomes [`Mode::Sent`] after the stop bit.
    pub fn send(&mut self, frame: &Frame) {
        self.stop_timer();
        self.tx_data = frame.to_raw();
        self.tx_bit_pos = WRITE_START_BIT_POS;
        self.tx_first_half = true;
        self.mode = Mode::Write;
        self.start_timer(WRITE_TICK_US);
    }

    /// The received frame, only in [`Mode::Received`].
    pub fn get_message(&self) -> Option<Frame> {
        (self.mode == Mode::Received).then(|| Frame::from_raw(self.decoder.data()))
    }

    /// Details of the decoding failure, only in [`Mode::ErrorProtocol`].
    pub fn get_protocol_error(&self) -> Option<ProtocolError> {
        if self.mode == Mode::ErrorProtocol {
            self.protocol_error
        } else {
            None
        }
    }

    /// Stops the timer and forces [`Mode::Idle`]. Safe to call in any mode.
    pub fn stop(&mut self) {
        self.stop_timer();
        self.mode = Mode::Idle;
    }

    /// Reports and clears the last timer failure.
    pub fn take_timer_error(&mut self) -> Option<TimerError> {
        self.timer_error.take()
    }

    /// The current mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Configured device timeout in milliseconds.
    pub fn device_timeout_ms(&self) -> u32 {
        self.device_timeout_ms
    }

    /// Advances the transceiver by one timer period.
    ///
    /// Must be called from the timer callback: every 200 µs while listening or
    /// reading, every 500 µs while writing. Does nothing in the other modes.
    pub fn tick(&mut self) {
        match self.mode {
            Mode::Listen => self.tick_listen(),
            Mode::Read => self.tick_read(),
            Mode::Write => self.tick_write(),
            _ => {}
        }
    }

    fn tick_listen(&mut self) {
        if self.timeout_counter == 0 {
            self.mode = Mode::ErrorTimeout;
            self.stop_timer();
            return;
        }
        if self.read_input() {
            // Rising edge of the start bit. Restarting the timer puts the
            // following samples at a fixed phase within each half-bit.
            self.decoder.start();
            self.mode = Mode::Read;
            self.start_timer(READ_TICK_US);
        }
        self.timeout_counter -= 1;
    }

    fn tick_read(&mut self) {
        let sample = self.read_input();
        match self.decoder.update(sample) {
            DecodeStep::Pending => {}
            DecodeStep::Complete(_) => {
                self.mode = Mode::Received;
                self.stop_timer();
            }
            DecodeStep::Error(kind) => {
                self.protocol_error = Some(self.decoder.error(kind));
                self.mode = Mode::ErrorProtocol;
                self.stop_timer();
            }
        }
    }

    fn tick_write(&mut self) {
        let bit = slot_bit(self.tx_data, self.tx_bit_pos);
        self.write_output(output_level(bit, self.tx_first_half));
        if self.tx_first_half {
            self.tx_first_half = false;
            return;
        }
        if self.tx_bit_pos == 0 {
            self.mode = Mode::Sent;
            self.stop_timer();
        } else {
            self.tx_bit_pos -= 1;
        }
        self.tx_first_half = true;
    }

    fn read_input(&mut self) -> bool {
        self.in_pin.is_high().unwrap_or(false)
    }

    fn write_output(&mut self, level: bool) {
        let _ = self.out_pin.set_state(PinState::from(level));
    }

    fn start_timer(&mut self, interval_us: u32) {
        if let Err(err) = self.timer.start(interval_us) {
            self.timer_error = Some(err);
            self.mode = Mode::ErrorTimer;
        }
    }

    fn stop_timer(&mut self) {
        if let Err(err) = self.timer.stop() {
            self.timer_error = Some(err);
        }
    }
}

impl<IN, OUT, T> Line for Transceiver<IN, OUT, T>
where
    IN: InputPin,
    OUT: OutputPin,
    T: PeriodicTimer,
{
    fn initialize(&mut self) -> Result<(), InitError> {
        Transceiver::initialize(self)
    }

    fn mode(&self) -> Mode {
        Transceiver::mode(self)
    }

    fn listen(&mut self) {
        Transceiver::listen(self)
    }

    fn send(&mut self, frame: &Frame) {
        Transceiver::send(self, frame)
    }

    fn get_message(&self) -> Option<Frame> {
        Transceiver::get_message(self)
    }

    fn get_protocol_error(&self) -> Option<ProtocolError> {
        Transceiver::get_protocol_error(self)
    }

    fn stop(&mut self) {
        Transceiver::stop(self)
    }

    fn take_timer_error(&mut self) -> Option<TimerError> {
        Transceiver::take_timer_error(self)
    }

    fn device_timeout_ms(&self) -> u32 {
        Transceiver::device_timeout_ms(self)
    }
}
