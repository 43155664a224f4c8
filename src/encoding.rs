//! Manchester line coding of OpenTherm frames.
//!
//! A frame goes on the wire as 34 slots: a start bit, the 32 frame bits MSB
//! first (parity bit included), and a stop bit. Start and stop are always a
//! logical `1`. Every slot lasts 1 ms and is split into two halves carrying
//! opposite levels.
//!
//! The output stage of an OpenTherm interface inverts, so a logical `1` is
//! driven low during the first half and high during the second, and a
//! logical `0` the other way round. On the receive side the interface inverts
//! once more and a logical `1` reads high-then-low on the input pin.
//!
//! ## Slot numbering
//!
//! Slots are numbered the way the transmitter walks them: 33 is the start
//! bit, 32..=1 carry frame bits 31..=0, and 0 is the stop bit.

use crate::consts::{FRAME_SLOTS, WRITE_START_BIT_POS};

/// Logical value carried in `slot` when transmitting the packed word `raw`.
///
/// `slot` counts down from [`WRITE_START_BIT_POS`] (start bit) to 0 (stop bit).
pub fn slot_bit(raw: u32, slot: u8) -> bool {
    match slot {
        0 => true,
        WRITE_START_BIT_POS => true,
        pos => raw & (1 << (pos - 1)) != 0,
    }
}

/// Level driven on the output pin for one half of a slot carrying `bit`.
pub fn output_level(bit: bool, first_half: bool) -> bool {
    if first_half { !bit } else { bit }
}

/// The logical values of all 34 slots of `raw`, in transmission order.
pub fn frame_slots(raw: u32) -> [bool; FRAME_SLOTS] {
    let mut slots = [false; FRAME_SLOTS];
    for (i, slot) in slots.iter_mut().enumerate() {
        *slot = slot_bit(raw, WRITE_START_BIT_POS - i as u8);
    }
    slots
}

/// Output pin levels for the whole frame, two per slot.
pub fn output_levels(raw: u32) -> [bool; 2 * FRAME_SLOTS] {
    let mut levels = [false; 2 * FRAME_SLOTS];
    for (i, bit) in frame_slots(raw).into_iter().enumerate() {
        levels[2 * i] = output_level(bit, true);
        levels[2 * i + 1] = output_level(bit, false);
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_and_stop_bits_are_set() {
        let slots = frame_slots(0);
        assert!(slots[0]);
        assert!(slots[FRAME_SLOTS - 1]);
        assert!(slots[1..FRAME_SLOTS - 1].iter().all(|bit| !bit));
    }

    #[test]
    fn test_slots_are_msb_first() {
        let slots = frame_slots(0x8000_0001);
        assert!(slots[1]);
        assert!(!slots[2]);
        assert!(slots[32]);
    }

    #[test]
    fn test_logical_one_is_low_then_high() {
        assert_eq!((output_level(true, true), output_level(true, false)), (false, true));
        assert_eq!((output_level(false, true), output_level(false, false)), (true, false));
    }

    #[test]
    fn test_every_slot_has_a_mid_bit_transition() {
        let levels = output_levels(0x4019_2A55);
        for pair in levels.chunks(2) {
            assert_ne!(pair[0], pair[1]);
        }
        assert_eq!(&levels[..2], &[false, true]);
        assert_eq!(&levels[levels.len() - 2..], &[false, true]);
    }
}
