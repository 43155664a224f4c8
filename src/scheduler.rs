//! Conversation scheduler: the OpenTherm master's main loop.
//!
//! The [`Scheduler`] owns a [`Line`] and decides which data-id to talk about
//! next. Every call to [`run()`](Scheduler::run) advances the current
//! conversation (request, then response) by one step, or, in sync mode, runs a
//! whole conversation before returning.
//!
//! ## Rotation
//!
//! Messages are registered with an order value:
//! - `0..=253`: sent once at startup, ascending by order
//! - [`INITIAL_UNORDERED_MESSAGE_ORDER`] (254): sent once at startup, after the ordered ones
//! - [`REPEATING_MESSAGE_ORDER`] (255): cycled forever once startup is done
//!
//! `STATUS` is always repeating. The boiler expects to hear from the master
//! at least once per second, so the repeating set should stay small.
//!
//! ## Timing
//!
//! A conversation may take at most 1150 ms and two conversations are at least
//! 100 ms apart. The scheduler warns when the main loop is too slow to hold
//! the first bound and enforces the second.
//!
//! ## Errors
//!
//! Protocol errors and timeouts abort the conversation; the same id is retried
//! next. A timer error is fatal: [`run()`](Scheduler::run) returns it once and
//! [`HubError::Failed`] on every later call.

use core::fmt;

use heapless::FnvIndexMap;
#[cfg(not(feature = "std"))]
use heapless::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

use crate::config::{HubConfig, StatusInputs};
use crate::consts::{
    INITIAL_UNORDERED_MESSAGE_ORDER, MAX_CONVERSATION_MS, MAX_MESSAGES, MIN_CONVERSATION_GAP_MS,
    REPEATING_MESSAGE_ORDER,
};
use crate::error::{HubError, InitError, Octets, ProtocolError, TimerError};
use crate::frame::{Frame, MessageType};
use crate::message::MessageId;
use crate::registry::Registry;
use crate::transceiver::{Line, Mode};

/// A millisecond clock.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch. May wrap.
    fn now_ms(&self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        C::now_ms(self)
    }
}

/// A list of data-ids in conversation order.
#[cfg(feature = "std")]
pub type MessageList = Vec<MessageId>;
/// A list of data-ids in conversation order.
#[cfg(not(feature = "std"))]
pub type MessageList = Vec<MessageId, MAX_MESSAGES>;

/// Callback invoked with a frame right before it is sent or processed.
pub type FrameHook<'a> = &'a mut dyn FnMut(&mut Frame);

/// The OpenTherm master.
///
/// ## Type Parameters
///
/// - `L`: the bus, usually a [`SharedTransceiver`](crate::timer::SharedTransceiver)
///   or a [`BlockingTransceiver`](crate::timer::BlockingTransceiver)
/// - `C`: the millisecond clock
pub struct Scheduler<'a, L: Line, C: Clock> {
    line: L,
    clock: C,
    registry: Registry<'a>,
    config: HubConfig,
    inputs: &'a dyn StatusInputs,
    orders: FnvIndexMap<MessageId, u8, MAX_MESSAGES>,
    messages: MessageList,
    cursor: usize,
    sending_initial: bool,
    last_conversation_start: Option<u32>,
    last_conversation_end: Option<u32>,
    failed: bool,
    before_send: Option<FrameHook<'a>>,
    before_process_response: Option<FrameHook<'a>>,
}

impl<'a, L: Line, C: Clock> Scheduler<'a, L, C> {
    /// Creates a scheduler. Nothing is sent before [`setup()`](Scheduler::setup).
    pub fn new(line: L, clock: C, registry: Registry<'a>, config: HubConfig) -> Self {
        Self {
            line,
            clock,
            registry,
            config,
            inputs: &(),
            orders: FnvIndexMap::new(),
            messages: MessageList::new(),
            cursor: 0,
            sending_initial: true,
            last_conversation_start: None,
            last_conversation_end: None,
            failed: false,
            before_send: None,
            before_process_response: None,
        }
    }

    /// Sets the runtime switches and setpoints feeding the `STATUS` request.
    pub fn set_status_inputs(&mut self, inputs: &'a dyn StatusInputs) {
        self.inputs = inputs;
    }

    /// Registers a hook that may adjust every request right before it is sent.
    pub fn on_before_send(&mut self, hook: FrameHook<'a>) {
        self.before_send = Some(hook);
    }

    /// Registers a hook that may adjust every response right before it is dispatched.
    pub fn on_before_process_response(&mut self, hook: FrameHook<'a>) {
        self.before_process_response = Some(hook);
    }

    /// Requests `id` once at startup.
    ///
    /// Ordered messages go out ascending by `order`; `None` places the
    /// message after all ordered ones. An order of 255 makes it repeating.
    pub fn add_initial_message(&mut self, id: MessageId, order: Option<u8>) {
        self.set_order(id, order.unwrap_or(INITIAL_UNORDERED_MESSAGE_ORDER));
    }

    /// Requests `id` over and over once startup is done.
    pub fn add_repeating_message(&mut self, id: MessageId) {
        self.set_order(id, REPEATING_MESSAGE_ORDER);
    }

    fn set_order(&mut self, id: MessageId, order: u8) {
        if self.orders.insert(id, order).is_err() {
            error!("Message order table full, dropping id {}", u8::from(id));
        }
    }

    /// The startup messages, in the order they are sent.
    pub fn initial_messages(&self) -> MessageList {
        let mut list: MessageList = self
            .orders
            .iter()
            .filter(|&(_, &order)| order < REPEATING_MESSAGE_ORDER)
            .map(|(&id, _)| id)
            .collect();
        list.sort_unstable_by_key(|id| (self.orders.get(id).copied(), *id));
        list
    }

    /// The repeating messages, ascending by id.
    pub fn repeating_messages(&self) -> MessageList {
        let mut list: MessageList = self
            .orders
            .iter()
            .filter(|&(_, &order)| order == REPEATING_MESSAGE_ORDER)
            .map(|(&id, _)| id)
            .collect();
        list.sort_unstable();
        list
    }

    /// Initializes the line and prepares the startup messages.
    ///
    /// `STATUS` is added to the repeating set so the boiler is talked to at
    /// least once per cycle.
    ///
    /// # Errors
    /// The line's [`InitError`]. The scheduler is then marked failed and
    /// [`run()`](Scheduler::run) returns [`HubError::Failed`].
    pub fn setup(&mut self) -> Result<(), InitError> {
        debug!("Setting up OpenTherm scheduler");
        if let Err(err) = self.line.initialize() {
            error!("Failed to initialize OpenTherm: {}", err);
            self.failed = true;
            return Err(err);
        }

        self.add_repeating_message(MessageId::Status);
        self.messages = self.initial_messages();
        self.sending_initial = true;
        self.cursor = 0;
        Ok(())
    }

    /// Stops any transfer in flight.
    pub fn shutdown(&mut self) {
        self.line.stop();
    }

    /// Runs one step of the main loop, in sync or async mode depending on
    /// [`HubConfig::sync_mode`].
    pub fn run(&mut self) -> Result<(), HubError> {
        if self.config.sync_mode {
            self.sync_loop()
        } else {
            self.poll()
        }
    }

    /// Advances the current conversation by one step without blocking.
    ///
    /// # Errors
    /// - [`HubError::Timer`] the first time a timer failure is seen
    /// - [`HubError::Failed`] on every call after that
    pub fn poll(&mut self) -> Result<(), HubError> {
        if self.failed {
            return Err(HubError::Failed);
        }

        let mode = self.line.mode();
        if self.handle_error(mode)? {
            return Ok(());
        }

        match mode {
            Mode::Sent => self.line.listen(),
            Mode::Received => self.read_response(),
            Mode::Idle => {
                let now = self.clock.now_ms();
                self.check_timings(now);
                if !self.should_skip(now) {
                    self.start_conversation();
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Runs a whole conversation, spinning on the line between phases.
    ///
    /// Each phase gets at most 1150 ms; an expired phase stops the line and
    /// counts as a timeout.
    ///
    /// # Errors
    /// Same as [`poll()`](Scheduler::poll).
    pub fn sync_loop(&mut self) -> Result<(), HubError> {
        if self.failed {
            return Err(HubError::Failed);
        }
        if self.handle_error(self.line.mode())? {
            return Ok(());
        }
        if !self.line.is_idle() {
            error!(
                "OpenTherm is not idle at the start of the loop: {}",
                self.line.mode()
            );
            self.stop_line();
            return Ok(());
        }

        let now = self.clock.now_ms();
        self.check_timings(now);
        if self.should_skip(now) {
            return Ok(());
        }

        self.start_conversation();
        if self.handle_error(self.line.mode())? {
            return Ok(());
        }
        if !self.spin_wait(MAX_CONVERSATION_MS) {
            error!("Hub timeout triggered during send");
            self.stop_line();
            return Ok(());
        }
        if self.handle_error(self.line.mode())? {
            return Ok(());
        }
        if !self.line.is_sent() {
            warn!(
                "Unexpected state after sending request: {}",
                self.line.mode()
            );
            self.stop_line();
            return Ok(());
        }

        self.line.listen();
        if self.handle_error(self.line.mode())? {
            return Ok(());
        }
        if !self.spin_wait(MAX_CONVERSATION_MS) {
            error!("Hub timeout triggered during receive");
            self.stop_line();
            return Ok(());
        }
        if self.handle_error(self.line.mode())? {
            return Ok(());
        }
        if !self.line.has_message() {
            warn!(
                "Unexpected state after receiving response: {}",
                self.line.mode()
            );
            self.stop_line();
            return Ok(());
        }

        self.read_response();
        Ok(())
    }

    /// Builds the request for `id`.
    ///
    /// `STATUS` carries the master flags. Otherwise a registered write
    /// source wins over the read role. An id with neither yields an all-zero
    /// frame, which is a `STATUS` read with every flag cleared.
    pub fn build_request(&self, id: MessageId) -> Frame {
        if id == MessageId::Status {
            let mut frame = Frame::new(MessageType::ReadData, id);
            frame.value_hb = self.config.status.master_flags(self.inputs);
            return frame;
        }

        if let Some(source) = self.registry.write_source(id.into()) {
            let mut frame = Frame::new(MessageType::WriteData, id);
            source.value().encode_into(&mut frame);
            return frame;
        }

        if self.registry.is_read(id.into()) {
            return Frame::new(MessageType::ReadData, id);
        }

        error!(
            "Tried to create a request with unregistered id {} ({})",
            u8::from(id),
            id.name()
        );
        Frame::default()
    }

    /// Sends the request for the message under the cursor.
    ///
    /// At the end of the list the repeating set is reloaded and the cursor
    /// wraps, which also ends the startup phase.
    pub fn start_conversation(&mut self) {
        if self.cursor >= self.messages.len() {
            if self.sending_initial {
                self.sending_initial = false;
                debug!("Startup messages done, switching to repeating messages");
            }
            self.messages = self.repeating_messages();
            self.cursor = 0;
        }
        let Some(&id) = self.messages.get(self.cursor) else {
            warn!("No OpenTherm messages to send");
            return;
        };

        let mut request = self.build_request(id);
        if let Some(hook) = self.before_send.as_mut() {
            hook(&mut request);
        }

        debug!(
            "Sending request with id {} ({})",
            request.id,
            id_name(request.id)
        );
        debug_frame(&request);
        self.last_conversation_start = Some(self.clock.now_ms());
        self.line.send(&request);
    }

    /// Dispatches a response to its registered sink.
    pub fn process_response(&mut self, response: &Frame) {
        debug!(
            "Received OpenTherm response with id {} ({})",
            response.id,
            id_name(response.id)
        );
        debug_frame(response);

        if !response.msg_type.is_ack() {
            warn!(
                "Boiler answered id {} with {}",
                response.id, response.msg_type
            );
        }
        if !self.registry.publish(response) {
            trace!("No response handler for id {}", response.id);
        }
    }

    /// Logs the configuration and both message lists.
    pub fn dump_config(&self) {
        info!("OpenTherm:");
        info!(
            "  Sync mode: {}",
            if self.config.sync_mode { "YES" } else { "NO" }
        );
        info!("  Device timeout: {} ms", self.line.device_timeout_ms());
        info!("  Registered ids: {}", self.registry.len());
        info!("  Initial requests:");
        for id in self.initial_messages().iter() {
            info!("  - {} ({})", u8::from(*id), id.name());
        }
        info!("  Repeating requests:");
        for id in self.repeating_messages().iter() {
            info!("  - {} ({})", u8::from(*id), id.name());
        }
    }

    /// Whether a fatal error stopped the scheduler.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Whether the startup messages are still being sent.
    pub fn is_sending_initial(&self) -> bool {
        self.sending_initial
    }

    /// The line.
    pub fn line(&self) -> &L {
        &self.line
    }

    /// The line, mutably.
    pub fn line_mut(&mut self) -> &mut L {
        &mut self.line
    }

    /// The handler registry.
    pub fn registry_mut(&mut self) -> &mut Registry<'a> {
        &mut self.registry
    }

    /// The static configuration.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    fn read_response(&mut self) {
        let Some(mut response) = self.line.get_message() else {
            warn!("Couldn't get the response, but the line reported one");
            self.stop_line();
            return;
        };
        self.stop_line();

        if let Some(hook) = self.before_process_response.as_mut() {
            hook(&mut response);
        }
        self.process_response(&response);
        self.cursor += 1;
    }

    /// Returns `Ok(true)` when `mode` was an error that has been handled.
    fn handle_error(&mut self, mode: Mode) -> Result<bool, HubError> {
        if let Some(err) = self.line.take_timer_error() {
            return Err(self.fail(err));
        }
        match mode {
            Mode::ErrorProtocol => {
                self.handle_protocol_error();
                Ok(true)
            }
            Mode::ErrorTimeout => {
                warn!("Timeout while waiting for response from device");
                self.stop_line();
                Ok(true)
            }
            Mode::ErrorTimer => Err(self.fail(TimerError::Unavailable)),
            _ => Ok(false),
        }
    }

    fn handle_protocol_error(&mut self) {
        match self.line.get_protocol_error() {
            Some(err) => {
                warn!(
                    "Protocol error occurred while receiving response: {}",
                    err.kind
                );
                debug_error(&err);
            }
            None => warn!("Protocol error occurred while receiving response"),
        }
        self.stop_line();
    }

    fn fail(&mut self, err: TimerError) -> HubError {
        error!("OpenTherm timer failed, giving up: {}", err);
        self.stop_line();
        self.failed = true;
        HubError::Timer(err)
    }

    fn stop_line(&mut self) {
        self.line.stop();
        self.last_conversation_end = Some(self.clock.now_ms());
    }

    fn check_timings(&self, now: u32) {
        if let Some(start) = self.last_conversation_start {
            let elapsed = now.wrapping_sub(start);
            if elapsed > MAX_CONVERSATION_MS {
                warn!(
                    "{} ms elapsed since the start of the last conversation, but {} ms are allowed at maximum",
                    elapsed,
                    MAX_CONVERSATION_MS
                );
            }
        }
    }

    fn should_skip(&self, now: u32) -> bool {
        match self.last_conversation_end {
            Some(end) if now.wrapping_sub(end) < MIN_CONVERSATION_GAP_MS => {
                trace!("Less than 100 ms elapsed since last conversation, skipping");
                true
            }
            _ => false,
        }
    }

    /// Spins while the line is active. Returns `false` when `timeout_ms` expired first.
    fn spin_wait(&self, timeout_ms: u32) -> bool {
        let start = self.clock.now_ms();
        loop {
            match self.line.poll_complete() {
                Ok(_) => return true,
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(never)) => match never {},
            }
            if self.clock.now_ms().wrapping_sub(start) >= timeout_ms {
                return false;
            }
            core::hint::spin_loop();
        }
    }
}

impl<L: Line, C: Clock> fmt::Debug for Scheduler<'_, L, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("mode", &self.line.mode())
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("messages", &self.messages)
            .field("cursor", &self.cursor)
            .field("sending_initial", &self.sending_initial)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

fn id_name(id: u8) -> &'static str {
    MessageId::try_from(id).map_or("UNKNOWN", MessageId::name)
}

fn debug_frame(frame: &Frame) {
    debug!("{}", Octets(frame.to_raw()));
    debug!("{}", frame);
}

fn debug_error(err: &ProtocolError) {
    debug!(
        "data: {:#x}; clock: {}; capture: {}; bit_pos: {}",
        err.data,
        err.clock,
        Octets(err.capture),
        err.bit_pos
    );
}
