//! Manchester sampling decoder for incoming OpenTherm frames.
//!
//! The decoder is fed one input sample per read tick (5 per 1 ms bit) and
//! reconstructs the frame from the level transitions alone, without any
//! phase-locked clock. Two registers carry its state:
//!
//! - `capture`: a shift register of the samples seen since the last level
//!   change, seeded with a single `1`. Its magnitude tells how long the line
//!   has been stable: above `0xF` means more than four samples (longer than
//!   half a bit), above `0xFF` means eight or more samples, which a valid
//!   Manchester stream never produces.
//! - `clock`: `1` when the next transition is expected in the middle of a bit
//!   (a data point), `0` when it may be a bit-boundary transition.
//!
//! A transition is a data point when it happens with `clock == 1`, or after a
//! long stable run (two equal half-bits meeting at a boundary). The level
//! *before* the transition is the bit value, since a logical `1` reads
//! high-then-low on the input pin.
//!
//! The start bit is shifted into `data` like every other bit and falls off
//! the top of the register after 32 more, so the 34th data point
//! ([`READ_STOP_BIT_POS`]) is the stop bit.

use crate::consts::{CAPTURE_HALF_BIT_LIMIT, CAPTURE_STALL_LIMIT, READ_STOP_BIT_POS};
use crate::error::{ProtocolError, ProtocolErrorKind};
use crate::parity::is_odd;

/// Outcome of feeding one sample to the [`ManchesterDecoder`].
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum DecodeStep {
    /// The frame is still being read.
    Pending,
    /// A complete frame with a valid stop bit and parity was read.
    Complete(u32),
    /// The waveform is not a valid frame.
    Error(ProtocolErrorKind),
}

/// Sampling state machine for one incoming frame.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
pub struct ManchesterDecoder {
    capture: u32,
    clock: u8,
    data: u32,
    bit_pos: u8,
}

impl ManchesterDecoder {
    /// Creates an idle decoder.
    pub const fn new() -> Self {
        Self {
            capture: 0,
            clock: 0,
            data: 0,
            bit_pos: 0,
        }
    }

    /// Clears the data register and the bit position.
    pub fn reset(&mut self) {
        self.data = 0;
        self.bit_pos = 0;
    }

    /// Starts reading a frame after the rising edge of its start bit.
    ///
    /// The edge sample counts as the first sample of the start bit, and the
    /// clock is high since the first transition is the start bit's middle.
    pub fn start(&mut self) {
        self.reset();
        self.capture = 1;
        self.clock = 1;
    }

    /// Consumes one input sample.
    pub fn update(&mut self, sample: bool) -> DecodeStep {
        let last = self.capture & 1 == 1;
        if sample != last {
            if self.clock == 1 && self.capture > CAPTURE_HALF_BIT_LIMIT {
                return DecodeStep::Error(ProtocolErrorKind::NoTransition);
            } else if self.clock == 1 || self.capture > CAPTURE_HALF_BIT_LIMIT {
                if self.bit_pos == READ_STOP_BIT_POS {
                    return self.verify_stop_bit(last);
                }
                self.data = (self.data << 1) | u32::from(last);
                self.bit_pos += 1;
                self.clock = 0;
            } else {
                self.clock = 1;
            }
            self.capture = 1;
        } else if self.capture > CAPTURE_STALL_LIMIT {
            return DecodeStep::Error(ProtocolErrorKind::NoChangeTooLong);
        }
        self.capture = (self.capture << 1) | u32::from(sample);
        DecodeStep::Pending
    }

    fn verify_stop_bit(&self, level: bool) -> DecodeStep {
        if !level {
            DecodeStep::Error(ProtocolErrorKind::InvalidStopBit)
        } else if !is_odd(self.data) {
            DecodeStep::Error(ProtocolErrorKind::ParityError)
        } else {
            DecodeStep::Complete(self.data)
        }
    }

    /// The data register.
    pub fn data(&self) -> u32 {
        self.data
    }

    /// Number of data points read, start bit included.
    pub fn bit_pos(&self) -> u8 {
        self.bit_pos
    }

    /// Snapshot of the decoder registers, tagged with `kind`.
    pub fn error(&self, kind: ProtocolErrorKind) -> ProtocolError {
        ProtocolError {
            kind,
            bit_pos: self.bit_pos,
            capture: self.capture,
            clock: self.clock,
            data: self.data,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::encoding::frame_slots;
    use crate::parity::with_parity;

    /// Input pin levels of `raw` at 100 µs resolution (10 per bit), as seen
    /// behind the receive stage of the interface.
    pub(crate) fn input_waveform(raw: u32) -> [bool; 340] {
        let mut wave = [false; 340];
        for (slot, bit) in frame_slots(raw).into_iter().enumerate() {
            for i in 0..10 {
                wave[slot * 10 + i] = if i < 5 { bit } else { !bit };
            }
        }
        wave
    }

    /// Runs the decoder over `wave`, sampling every 200 µs starting at the
    /// first high sample at or after `offset`.
    fn decode(wave: &[bool], offset: usize) -> (DecodeStep, ManchesterDecoder) {
        let mut decoder = ManchesterDecoder::new();
        let mut samples = wave.iter().skip(offset).step_by(2).copied();
        for sample in samples.by_ref() {
            if sample {
                decoder.start();
                break;
            }
        }
        for sample in samples.chain(core::iter::repeat(false).take(20)) {
            match decoder.update(sample) {
                DecodeStep::Pending => {}
                step => return (step, decoder),
            }
        }
        (DecodeStep::Pending, decoder)
    }

    #[test]
    fn test_decodes_frames_at_any_sampling_phase() {
        let raw = with_parity(0x4019_2A80);
        let wave = input_waveform(raw);
        for offset in 0..2 {
            let (step, decoder) = decode(&wave, offset);
            assert_eq!(step, DecodeStep::Complete(raw));
            assert_eq!(decoder.bit_pos(), READ_STOP_BIT_POS);
        }
    }

    #[test]
    fn test_decodes_all_zero_and_all_one_payloads() {
        for raw in [with_parity(0), with_parity(0x7FFF_FFFF)] {
            let (step, _) = decode(&input_waveform(raw), 1);
            assert_eq!(step, DecodeStep::Complete(raw));
        }
    }

    #[test]
    fn test_parity_violation_is_reported() {
        let raw = with_parity(0x4019_2A80) ^ 0x0000_0100;
        let (step, decoder) = decode(&input_waveform(raw), 0);
        assert_eq!(step, DecodeStep::Error(ProtocolErrorKind::ParityError));
        assert_eq!(decoder.error(ProtocolErrorKind::ParityError).data, raw);
    }

    #[test]
    fn test_missing_stop_bit_is_reported() {
        let mut wave = input_waveform(with_parity(0x4019_2A80));
        // Stop bit sent as a logical 0.
        for (i, level) in wave[330..].iter_mut().enumerate() {
            *level = i >= 5;
        }
        let (step, _) = decode(&wave, 0);
        assert_eq!(step, DecodeStep::Error(ProtocolErrorKind::InvalidStopBit));
    }

    #[test]
    fn test_stuck_line_is_reported() {
        let mut wave = input_waveform(with_parity(0x4019_2A80));
        for level in wave[100..].iter_mut() {
            *level = true;
        }
        let (step, _) = decode(&wave, 0);
        assert!(matches!(
            step,
            DecodeStep::Error(ProtocolErrorKind::NoTransition | ProtocolErrorKind::NoChangeTooLong)
        ));
    }

    #[test]
    fn test_missing_mid_bit_transition_is_reported() {
        let mut decoder = ManchesterDecoder::new();
        decoder.start();
        // Middle of the start bit, a bit boundary, then a high level lasting
        // past the middle of the next bit.
        for sample in [true, true, false, false, true, true, true, true, true] {
            assert_eq!(decoder.update(sample), DecodeStep::Pending);
        }
        // The late transition arrives while a data point is expected.
        assert_eq!(
            decoder.update(false),
            DecodeStep::Error(ProtocolErrorKind::NoTransition)
        );
        assert_eq!(decoder.bit_pos(), 1);
    }
}
