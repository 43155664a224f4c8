//! The OpenTherm frame and its data interpretations.
//!
//! Every OpenTherm exchange carries exactly one 32-bit frame in each direction:
//!
//! ```text
//!  31   30..28   27..24   23..16   15..8   7..0
//! +---+--------+--------+--------+-------+------+
//! | P |  type  | spare  | data-id|  HB   |  LB  |
//! +---+--------+--------+--------+-------+------+
//! ```
//!
//! The parity bit is computed when the frame is packed with [`Frame::to_raw`]
//! and checked by the decoder, so a [`Frame`] only stores the four fields.
//!
//! The two data bytes can be read as independent bytes, as two flag vectors,
//! as an unsigned or signed 16-bit integer, or as a signed 8.8 fixed-point
//! number (`raw16 / 256`), which is how the protocol transports temperatures.

use core::fmt;

use crate::consts::SPARE_MASK;
use crate::message::MessageId;
use crate::parity::with_parity;

/// The 3-bit message type carried in bits 28..=30 of a frame.
///
/// Master-to-slave types are [`ReadData`](MessageType::ReadData),
/// [`WriteData`](MessageType::WriteData) and [`InvalidData`](MessageType::InvalidData);
/// the rest are slave-to-master answers.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[repr(u8)]
pub enum MessageType {
    /// Master asks for the value of a data-id.
    #[default]
    ReadData = 0,
    /// Master writes a value to a data-id.
    WriteData = 1,
    /// Master signals that its own data is invalid.
    InvalidData = 2,
    /// Unassigned by the protocol.
    Reserved = 3,
    /// Slave answers a read with a value.
    ReadAck = 4,
    /// Slave accepts a write.
    WriteAck = 5,
    /// Slave recognizes the data-id but its value is invalid.
    DataInvalid = 6,
    /// Slave does not support the data-id.
    UnknownDataId = 7,
}

impl MessageType {
    /// Decodes the three low bits of `bits`.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x7 {
            0 => MessageType::ReadData,
            1 => MessageType::WriteData,
            2 => MessageType::InvalidData,
            3 => MessageType::Reserved,
            4 => MessageType::ReadAck,
            5 => MessageType::WriteAck,
            6 => MessageType::DataInvalid,
            _ => MessageType::UnknownDataId,
        }
    }

    /// Protocol name of the message type, for logs.
    pub fn name(self) -> &'static str {
        match self {
            MessageType::ReadData => "READ_DATA",
            MessageType::WriteData => "WRITE_DATA",
            MessageType::InvalidData => "INVALID_DATA",
            MessageType::Reserved => "RESERVED",
            MessageType::ReadAck => "READ_ACK",
            MessageType::WriteAck => "WRITE_ACK",
            MessageType::DataInvalid => "DATA_INVALID",
            MessageType::UnknownDataId => "UNKNOWN_DATAID",
        }
    }

    /// Whether a slave sent this type to acknowledge a request.
    pub fn is_ack(self) -> bool {
        matches!(self, MessageType::ReadAck | MessageType::WriteAck)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One OpenTherm frame, without its parity bit.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Frame {
    /// Message type (bits 28..=30).
    pub msg_type: MessageType,
    /// Data-id (bits 16..=23), see [`MessageId`].
    pub id: u8,
    /// High data byte (bits 8..=15).
    pub value_hb: u8,
    /// Low data byte (bits 0..=7).
    pub value_lb: u8,
}

impl Frame {
    /// Creates a frame with an all-zero payload.
    pub fn new(msg_type: MessageType, id: MessageId) -> Self {
        Self {
            msg_type,
            id: id.into(),
            value_hb: 0,
            value_lb: 0,
        }
    }

    /// Unpacks a raw 32-bit word. Parity and spare bits are ignored.
    pub fn from_raw(raw: u32) -> Self {
        if raw & SPARE_MASK != 0 {
            trace!("Ignoring spare bits {:#x} of frame {:#x}", (raw & SPARE_MASK) >> 24, raw);
        }
        Self {
            msg_type: MessageType::from_bits((raw >> 28) as u8),
            id: (raw >> 16) as u8,
            value_hb: (raw >> 8) as u8,
            value_lb: raw as u8,
        }
    }

    /// Packs the frame into its wire representation, parity bit included.
    pub fn to_raw(&self) -> u32 {
        let data = (u32::from(self.msg_type as u8) << 28)
            | (u32::from(self.id) << 16)
            | (u32::from(self.value_hb) << 8)
            | u32::from(self.value_lb);
        with_parity(data)
    }

    /// The data-id as a catalog entry, if it is one.
    pub fn message_id(&self) -> Option<MessageId> {
        MessageId::try_from(self.id).ok()
    }

    /// Both data bytes as an unsigned 16-bit integer.
    pub fn u16(&self) -> u16 {
        u16::from_be_bytes([self.value_hb, self.value_lb])
    }

    /// Stores an unsigned 16-bit integer in the data bytes.
    pub fn set_u16(&mut self, value: u16) {
        [self.value_hb, self.value_lb] = value.to_be_bytes();
    }

    /// Both data bytes as a signed 16-bit integer.
    pub fn s16(&self) -> i16 {
        i16::from_be_bytes([self.value_hb, self.value_lb])
    }

    /// Stores a signed 16-bit integer in the data bytes.
    pub fn set_s16(&mut self, value: i16) {
        [self.value_hb, self.value_lb] = value.to_be_bytes();
    }

    /// Both data bytes as a signed 8.8 fixed-point number.
    pub fn f88(&self) -> f32 {
        f32::from(self.s16()) / 256.0
    }

    /// Stores `value` as signed 8.8 fixed point.
    ///
    /// Rounds to the nearest 1/256 and saturates at the representable range
    /// (-128.0 ..= 127.996).
    pub fn set_f88(&mut self, value: f32) {
        let scaled = libm::roundf(value * 256.0);
        let raw = if scaled.is_nan() {
            0
        } else if scaled >= f32::from(i16::MAX) {
            i16::MAX
        } else if scaled <= f32::from(i16::MIN) {
            i16::MIN
        } else {
            scaled as i16
        };
        self.set_s16(raw);
    }

    /// The high data byte reinterpreted as signed.
    pub fn s8_hb(&self) -> i8 {
        self.value_hb as i8
    }

    /// The low data byte reinterpreted as signed.
    pub fn s8_lb(&self) -> i8 {
        self.value_lb as i8
    }

    /// Reads flag `bit` (0..=7) of the high data byte.
    pub fn flag_hb(&self, bit: u8) -> bool {
        read_bit(self.value_hb, bit)
    }

    /// Reads flag `bit` (0..=7) of the low data byte.
    pub fn flag_lb(&self, bit: u8) -> bool {
        read_bit(self.value_lb, bit)
    }

    /// Sets or clears flag `bit` (0..=7) of the high data byte.
    pub fn set_flag_hb(&mut self, bit: u8, value: bool) {
        self.value_hb = write_bit(self.value_hb, bit, value);
    }

    /// Sets or clears flag `bit` (0..=7) of the low data byte.
    pub fn set_flag_lb(&mut self, bit: u8, value: bool) {
        self.value_lb = write_bit(self.value_lb, bit, value);
    }
}

impl From<u32> for Frame {
    fn from(raw: u32) -> Self {
        Frame::from_raw(raw)
    }
}

impl From<Frame> for u32 {
    fn from(frame: Frame) -> Self {
        frame.to_raw()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type: {}; id: {}; HB: {}; LB: {}; uint_16: {}; float: {}",
            self.msg_type,
            self.id,
            self.value_hb,
            self.value_lb,
            self.u16(),
            self.f88()
        )
    }
}

fn read_bit(byte: u8, bit: u8) -> bool {
    byte & (1 << (bit & 0x7)) != 0
}

fn write_bit(byte: u8, bit: u8, value: bool) -> u8 {
    let mask = 1 << (bit & 0x7);
    if value { byte | mask } else { byte & !mask }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parity::is_odd;

    #[test]
    fn test_pack_layout() {
        let frame = Frame {
            msg_type: MessageType::WriteData,
            id: 0x38,
            value_hb: 0x12,
            value_lb: 0x34,
        };
        let raw = frame.to_raw();
        assert_eq!(raw & 0x7FFF_FFFF, 0x1038_1234);
        assert!(is_odd(raw));
        assert_eq!(Frame::from_raw(raw), frame);
    }

    #[test]
    fn test_status_read_of_zero_payload_sets_parity() {
        let frame = Frame::new(MessageType::ReadData, MessageId::Status);
        assert_eq!(frame.to_raw(), 0x8000_0000);
    }

    #[test]
    fn test_unpack_ignores_spare_bits() {
        let frame = Frame::from_raw(0xC019_0000 | SPARE_MASK);
        assert_eq!(frame.msg_type, MessageType::ReadAck);
        assert_eq!(frame.id, 0x19);
        assert_eq!(frame.to_raw() & SPARE_MASK, 0);
    }

    #[test]
    fn test_f88_exact_value() {
        let mut frame = Frame::default();
        frame.set_f88(21.5);
        assert_eq!(frame.u16(), 5504);
        assert_eq!(frame.f88(), 21.5);
    }

    #[test]
    fn test_f88_resolution() {
        let mut frame = Frame::default();
        frame.set_f88(21.51);
        assert!((frame.f88() - 21.51).abs() < 1.0 / 256.0);
    }

    #[test]
    fn test_f88_negative_and_saturation() {
        let mut frame = Frame::default();
        frame.set_f88(-5.25);
        assert_eq!(frame.s16(), -1344);
        assert_eq!(frame.f88(), -5.25);

        frame.set_f88(500.0);
        assert_eq!(frame.s16(), i16::MAX);
        frame.set_f88(-500.0);
        assert_eq!(frame.s16(), i16::MIN);
    }

    #[test]
    fn test_flags() {
        let mut frame = Frame::default();
        frame.set_flag_hb(0, true);
        frame.set_flag_hb(6, true);
        frame.set_flag_lb(3, true);
        assert_eq!(frame.value_hb, 0b0100_0001);
        assert_eq!(frame.value_lb, 0b0000_1000);
        assert!(frame.flag_lb(3));
        frame.set_flag_hb(0, false);
        assert!(!frame.flag_hb(0));
    }

    #[test]
    fn test_signed_bytes() {
        let frame = Frame {
            value_hb: 0xFB,
            value_lb: 0x50,
            ..Frame::default()
        };
        assert_eq!(frame.s8_hb(), -5);
        assert_eq!(frame.s8_lb(), 80);
        assert_eq!(frame.s16(), -1200);
    }
}
