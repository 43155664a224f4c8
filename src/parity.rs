use crate::consts::PARITY_MASK;

/// Returns `true` when `val` has an odd number of set bits.
pub(crate) fn is_odd(val: u32) -> bool {
    val.count_ones() & 1 == 1
}

/// Sets or clears bit 31 so that the whole word has odd parity.
pub(crate) fn with_parity(val: u32) -> u32 {
    let data = val & !PARITY_MASK;
    if is_odd(data) { data } else { data | PARITY_MASK }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_zero_payload_gets_parity_bit() {
        assert_eq!(with_parity(0), PARITY_MASK);
        assert!(is_odd(with_parity(0)));
    }

    #[test]
    fn test_odd_payload_keeps_parity_clear() {
        let framed = with_parity(0x0001_0000);
        assert_eq!(framed & PARITY_MASK, 0);
        assert!(is_odd(framed));
    }

    #[test]
    fn test_stale_parity_bit_is_recomputed() {
        assert_eq!(with_parity(PARITY_MASK | 0x0000_0003), PARITY_MASK | 0x0000_0003);
        assert_eq!(with_parity(PARITY_MASK | 0x0000_0001), 0x0000_0001);
    }
}
