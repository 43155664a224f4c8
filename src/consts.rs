//! Constants used across the OpenTherm implementation.
//!
//! These cover the frame layout, the transceiver's tick arithmetic and the
//! scheduler's conversation timing.
//!
//! ## Key Concepts
//!
//! - **Frame**: 32 data bits framed by a start and a stop bit, 34 slots on the wire.
//! - **Ticks**: the read timer fires 5 times per 1 ms bit, the write timer twice.
//! - **Conversation**: one request plus its response, which must fit in 1150 ms,
//!   with at least 100 ms of quiet bus between two conversations.
//! - **Order**: the per-message priority in the conversation order table, with two
//!   reserved values for unordered startup messages and repeating messages.

/// Number of data bits in an OpenTherm frame (parity included).
pub const FRAME_DATA_BITS: u8 = 32;

/// Number of slots transmitted per frame: start bit, 32 data bits, stop bit.
pub const FRAME_SLOTS: usize = FRAME_DATA_BITS as usize + 2;

/// Bit position of the start bit while writing (counted down to 0).
pub const WRITE_START_BIT_POS: u8 = 33;

/// Bit position at which the decoder expects the stop bit.
///
/// The start bit is shifted into the data register like any other bit, so
/// after 33 data points the next one is the stop bit.
pub const READ_STOP_BIT_POS: u8 = 33;

/// Mask of the parity bit.
pub const PARITY_MASK: u32 = 0x8000_0000;

/// Mask of the spare bits between message type and data-id.
pub const SPARE_MASK: u32 = 0x0F00_0000;

/// Read timer ticks per 1 ms bit period.
pub const READ_TICKS_PER_BIT: u32 = 5;

/// Write timer ticks per 1 ms bit period (one per Manchester half).
pub const WRITE_TICKS_PER_BIT: u32 = 2;

/// Read timer interval: 5 kHz.
pub const READ_TICK_US: u32 = 1_000 / READ_TICKS_PER_BIT;

/// Write timer interval: 2 kHz.
pub const WRITE_TICK_US: u32 = 1_000 / WRITE_TICKS_PER_BIT;

/// Default time the boiler gets to start answering, in milliseconds.
///
/// The protocol allows a slave between 20 and 800 ms to respond.
pub const DEFAULT_DEVICE_TIMEOUT_MS: u32 = 800;

/// Capture register threshold beyond which a level has been stable for more
/// than 4 ticks, i.e. longer than half a bit.
pub const CAPTURE_HALF_BIT_LIMIT: u32 = 0xF;

/// Capture register threshold beyond which a level has been stable for 8 or
/// more ticks, which no valid Manchester stream can produce.
pub const CAPTURE_STALL_LIMIT: u32 = 0xFF;

/// Minimum quiet time between the end of one conversation and the start of the next.
pub const MIN_CONVERSATION_GAP_MS: u32 = 100;

/// Maximum time a single conversation may take, and the keepalive budget of the bus.
pub const MAX_CONVERSATION_MS: u32 = 1_150;

/// Order value of messages requested once at startup, after the explicitly ordered ones.
pub const INITIAL_UNORDERED_MESSAGE_ORDER: u8 = 254;

/// Order value of messages requested forever after startup.
pub const REPEATING_MESSAGE_ORDER: u8 = 255;

/// Capacity of the conversation order table and of the handler registry.
///
/// The catalog holds 93 ids; the index maps need a power of two.
pub const MAX_MESSAGES: usize = 128;
