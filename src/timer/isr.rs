use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::{InitError, ProtocolError, TimerError};
use crate::frame::Frame;
use crate::timer::PeriodicTimer;
use crate::transceiver::{Line, Mode, Transceiver};

/// A transceiver shared between the main loop and the timer interrupt.
pub type GlobalTransceiver<IN, OUT, T> = Mutex<RefCell<Option<Transceiver<IN, OUT, T>>>>;

/// Used to initialize the global static `Transceiver` for use with
/// `critical_section`.
///
/// # Returns
/// * An empty mutable ref-cell
///
/// # Example
/// ```rust,ignore
/// use opentherm::timer::{GlobalTransceiver, global_transceiver_init};
/// use some_hal::{PD1, PD2, Timer1};
///
/// static OPENTHERM: GlobalTransceiver<PD1, PD2, Timer1> = global_transceiver_init();
/// ```
pub const fn global_transceiver_init<IN: InputPin, OUT: OutputPin, T: PeriodicTimer>()
-> GlobalTransceiver<IN, OUT, T> {
    Mutex::new(RefCell::new(None))
}

/// Stores a new transceiver in the global slot and hands out a [`SharedTransceiver`]
/// for the scheduler.
///
/// # Arguments
/// * The global static `Transceiver`
/// * The input pin
/// * The output pin
/// * The periodic timer whose interrupt calls [`global_transceiver_tick`]
/// * The device timeout in milliseconds
///
/// # Example
/// ```rust,ignore
/// let line = global_transceiver_setup(&OPENTHERM, in_pin, out_pin, timer, 800);
/// line.initialize()?;
/// ```
pub fn global_transceiver_setup<IN, OUT, T>(
    global: &'static GlobalTransceiver<IN, OUT, T>,
    in_pin: IN,
    out_pin: OUT,
    timer: T,
    device_timeout_ms: u32,
) -> SharedTransceiver<IN, OUT, T>
where
    IN: InputPin + 'static,
    OUT: OutputPin + 'static,
    T: PeriodicTimer + 'static,
{
    critical_section::with(|cs| {
        let _ = global.borrow(cs).replace(Some(Transceiver::new(
            in_pin,
            out_pin,
            timer,
            device_timeout_ms,
        )));
    });
    SharedTransceiver::new(global)
}

/// Runs the tick at each interrupt
///
/// # Arguments
/// * The global static `Transceiver`
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn TIM2() {
///     global_transceiver_tick(&OPENTHERM);
/// }
/// ```
pub fn global_transceiver_tick<IN: InputPin, OUT: OutputPin, T: PeriodicTimer>(
    global: &'static GlobalTransceiver<IN, OUT, T>,
) {
    critical_section::with(|cs| {
        if let Some(transceiver) = global.borrow(cs).borrow_mut().as_mut() {
            transceiver.tick();
        }
    });
}

/// Main-loop handle to a transceiver living in a [`GlobalTransceiver`].
///
/// Every call runs inside a critical section, so a timer stop followed by a
/// restart is never interleaved with a tick. While the global slot is empty
/// the line reports [`Mode::ErrorTimer`] and [`TimerError::Unavailable`].
pub struct SharedTransceiver<IN, OUT, T>
where
    IN: InputPin + 'static,
    OUT: OutputPin + 'static,
    T: PeriodicTimer + 'static,
{
    global: &'static GlobalTransceiver<IN, OUT, T>,
}

impl<IN, OUT, T> SharedTransceiver<IN, OUT, T>
where
    IN: InputPin + 'static,
    OUT: OutputPin + 'static,
    T: PeriodicTimer + 'static,
{
    /// Wraps the global slot.
    pub fn new(global: &'static GlobalTransceiver<IN, OUT, T>) -> Self {
        Self { global }
    }

    /// Runs `f` on the transceiver inside a critical section.
    pub fn with<R>(&self, f: impl FnOnce(&mut Transceiver<IN, OUT, T>) -> R) -> Option<R> {
        critical_section::with(|cs| self.global.borrow(cs).borrow_mut().as_mut().map(f))
    }

    /// See [`Transceiver::initialize`].
    pub fn initialize(&self) -> Result<(), InitError> {
        self.with(Transceiver::initialize)
            .unwrap_or(Err(TimerError::Unavailable.into()))
    }
}

impl<IN, OUT, T> Line for SharedTransceiver<IN, OUT, T>
where
    IN: InputPin + 'static,
    OUT: OutputPin + 'static,
    T: PeriodicTimer + 'static,
{
    fn initialize(&mut self) -> Result<(), InitError> {
        SharedTransceiver::initialize(self)
    }

    fn mode(&self) -> Mode {
        self.with(|t| t.mode()).unwrap_or(Mode::ErrorTimer)
    }

    fn listen(&mut self) {
        let _ = self.with(Transceiver::listen);
    }

    fn send(&mut self, frame: &Frame) {
        let _ = self.with(|t| t.send(frame));
    }

    fn get_message(&self) -> Option<Frame> {
        self.with(|t| t.get_message()).flatten()
    }

    fn get_protocol_error(&self) -> Option<ProtocolError> {
        self.with(|t| t.get_protocol_error()).flatten()
    }

    fn stop(&mut self) {
        let _ = self.with(Transceiver::stop);
    }

    fn take_timer_error(&mut self) -> Option<TimerError> {
        self.with(Transceiver::take_timer_error)
            .unwrap_or(Some(TimerError::Unavailable))
    }

    fn device_timeout_ms(&self) -> u32 {
        self.with(|t| t.device_timeout_ms()).unwrap_or(0)
    }
}

impl<IN, OUT, T> fmt::Debug for SharedTransceiver<IN, OUT, T>
where
    IN: InputPin + 'static,
    OUT: OutputPin + 'static,
    T: PeriodicTimer + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedTransceiver")
            .field("mode", &self.mode())
            .finish()
    }
}
