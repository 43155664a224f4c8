/// Declares a static global `OPENTHERM` transceiver protected by a `critical_section` mutex.
///
/// This macro creates a `static` singleton `OPENTHERM` suitable for use in
/// interrupt-based environments, where both the main loop and the timer ISR
/// need to safely access the shared transceiver state.
///
/// # Arguments
/// - `$in`: The concrete type of the input pin (must implement `InputPin`)
/// - `$out`: The concrete type of the output pin (must implement `OutputPin`)
/// - `$timer`: The concrete type of the timer (must implement `PeriodicTimer`)
///
/// # Example
/// ```rust,ignore
/// init_opentherm!(MyInPinType, MyOutPinType, MyTimerType);
/// ```
#[macro_export]
macro_rules! init_opentherm {
    ( $in:ty, $out:ty, $timer:ty ) => {
        pub static OPENTHERM: $crate::timer::GlobalTransceiver<$in, $out, $timer> =
            $crate::critical_section::Mutex::new(core::cell::RefCell::new(None));
    };
}

/// Initializes the global `OPENTHERM` singleton with a new transceiver and
/// evaluates to a [`SharedTransceiver`](crate::timer::SharedTransceiver) for the scheduler.
///
/// # Arguments
/// - `$in`: The input pin (must implement `InputPin`)
/// - `$out`: The output pin (must implement `OutputPin`)
/// - `$timer`: The periodic timer (must implement `PeriodicTimer`)
/// - `$timeout`: The device timeout in milliseconds (defaults to 800)
///
/// # Example
/// ```rust,ignore
/// let line = setup_opentherm!(in_pin, out_pin, timer);
/// ```
///
/// # Notes
/// - Requires `init_opentherm!` to have been used earlier.
#[macro_export]
macro_rules! setup_opentherm {
    ( $in:expr, $out:expr, $timer:expr ) => {
        $crate::setup_opentherm!(
            $in,
            $out,
            $timer,
            $crate::consts::DEFAULT_DEVICE_TIMEOUT_MS
        )
    };
    ( $in:expr, $out:expr, $timer:expr, $timeout:expr ) => {
        $crate::timer::global_transceiver_setup(&OPENTHERM, $in, $out, $timer, $timeout)
    };
}

/// Calls `tick()` on the global `OPENTHERM` transceiver if it has been initialized.
///
/// This macro is intended to be invoked from the timer ISR to advance the
/// transceiver at its current rate (every 200 µs reading, 500 µs writing).
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn TIM2() {
///     tick_opentherm!();
/// }
/// ```
///
/// # Notes
/// - This macro assumes `OPENTHERM` was declared with `init_opentherm!`
///   and initialized via `setup_opentherm!`.
/// - Safe to call repeatedly; does nothing if the transceiver hasn't been set up yet.
#[macro_export]
macro_rules! tick_opentherm {
    () => {
        $crate::timer::global_transceiver_tick(&OPENTHERM)
    };
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use crate::timer::tests::MockTimer;
    use crate::transceiver::tests::ReplayPin;
    use crate::transceiver::{Line, Mode};
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };

    init_opentherm!(ReplayPin, PinMock, MockTimer);

    #[test]
    fn test_macros_share_one_transceiver() {
        let mut line = setup_opentherm!(
            ReplayPin::new(0, &[]),
            PinMock::new(&[PinTransaction::set(PinState::High)]),
            MockTimer::default(),
            2
        );
        assert_eq!(line.initialize(), Ok(()));
        assert_eq!(line.device_timeout_ms(), 2);

        line.listen();
        for _ in 0..11 {
            tick_opentherm!();
        }
        assert_eq!(line.mode(), Mode::ErrorTimeout);

        let _ = line.with(|t| t.out_pin.done());
    }
}
