//! # opentherm
//!
//! A portable, no_std Rust implementation of the master side of the OpenTherm
//! boiler protocol, for the usual two-transistor/optocoupler OpenTherm interface
//! boards hanging off two GPIOs.
//!
//! The crate is split in two layers:
//! - a [`Transceiver`](transceiver::Transceiver) that owns the pin pair and a
//!   periodic timer, and Manchester-encodes/decodes one 32-bit frame at a time
//!   from the timer callback
//! - a [`Scheduler`](scheduler::Scheduler) that rotates through the configured
//!   data-ids, builds requests, drives one request/response conversation per
//!   call, recovers from bus errors and dispatches decoded responses
//!
//! ## Crate features
//! | Feature               | Description |
//! |-----------------------|-------------|
//! | `std`                 | Disables `#![no_std]` support and replaces `heapless::Vec`s with
//! `std::vec::Vec`s |
//! | `delay-loop`          | Drives `tick()` from a blocking `embedded_hal::delay::DelayNs` loop |
//! | `timer-isr` (default) | Shares the transceiver with a timer ISR through `critical_section` |
//! | `defmt-0-3`           | Uses `defmt` logging |
//! | `log`                 | Uses `log` logging |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use opentherm::config::HubConfig;
//! use opentherm::frame::Frame;
//! use opentherm::message::{MessageId, Value};
//! use opentherm::registry::Registry;
//! use opentherm::scheduler::Scheduler;
//! use opentherm::{init_opentherm, setup_opentherm, tick_opentherm};
//!
//! init_opentherm!(InPin, OutPin, Timer);
//!
//! #[interrupt]
//! fn TIM2() {
//!     tick_opentherm!();
//! }
//!
//! let setpoint = || Value::F88(55.0);
//! let mut on_feed_temp = |_: &Frame, value: Value| display.show(value);
//!
//! let mut registry = Registry::new();
//! registry.register_write(MessageId::ChSetpoint, &setpoint)?;
//! registry.register_read(MessageId::FeedTemp)?;
//! registry.register_response(MessageId::FeedTemp, &mut on_feed_temp)?;
//!
//! let line = setup_opentherm!(in_pin, out_pin, timer);
//! let mut hub = Scheduler::new(line, clock, registry, HubConfig::default());
//! hub.add_repeating_message(MessageId::ChSetpoint);
//! hub.add_repeating_message(MessageId::FeedTemp);
//! hub.setup()?;
//! loop {
//!     hub.run()?;
//! }
//! ```
//!
//! ## Integration Notes
//!
//! - Reading samples the bus every 200 µs (5 samples per 1 ms bit), writing toggles every 500 µs
//! - The boiler must be talked to at least once per second; `STATUS` is always polled
//! - Only one transceiver instance should be active at a time in interrupt-driven mode
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "timer-isr")]
pub use critical_section;

#[cfg(not(feature = "std"))]
pub use heapless;

#[macro_use]
pub(crate) mod fmt;

pub mod config;
pub mod consts;
pub mod decoder;
pub mod encoding;
pub mod error;
pub mod frame;
pub mod message;
pub(crate) mod parity;
pub mod registry;
pub mod scheduler;
pub mod timer;
pub mod transceiver;

pub use error::{HubError, InitError, ProtocolError, ProtocolErrorKind, TimerError};
pub use frame::{Frame, MessageType};
pub use message::{MessageId, Value, ValueKind};
