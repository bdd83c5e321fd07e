//! Fixed-point and fixed-width helpers shared by every fund component.
//!
//! All amounts are 18-decimal fixed point held in `U256`. Zero operands are
//! rejected outright: in this domain a zero quantity reaching `multiply` or
//! `divide` is a caller bug, not a degenerate case.

use alloy_primitives::{B256, U256};

use crate::error::FundError;

/// 1e18, the fixed-point unit.
pub const SCALE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

pub const WORD_LEN: usize = 32;

const BPS_DENOMINATOR: u64 = 10_000;

/// `a * b / 1e18`, truncating.
pub fn multiply(a: U256, b: U256) -> Result<U256, FundError> {
    if a.is_zero() || b.is_zero() {
        return Err(FundError::InvalidZeroInput);
    }
    let product = a.checked_mul(b).ok_or(FundError::ArithmeticOverflow)?;
    Ok(product / SCALE)
}

/// `n * 1e18 / d`, truncating.
pub fn divide(n: U256, d: U256) -> Result<U256, FundError> {
    if n.is_zero() || d.is_zero() {
        return Err(FundError::InvalidZeroInput);
    }
    let scaled = n.checked_mul(SCALE).ok_or(FundError::ArithmeticOverflow)?;
    Ok(scaled / d)
}

/// Big-endian 32-byte word to integer. Any other length is rejected.
pub fn decode_word(bytes: &[u8]) -> Result<U256, FundError> {
    if bytes.len() != WORD_LEN {
        return Err(FundError::ReadOutOfBounds(bytes.len()));
    }
    Ok(U256::from_be_slice(bytes))
}

pub fn encode_word(value: U256) -> [u8; WORD_LEN] {
    value.to_be_bytes::<WORD_LEN>()
}

/// Left-aligns up to 32 bytes of `s` into a word, zero padded on the right.
pub fn pack_short_string(s: &str) -> Result<B256, FundError> {
    let raw = s.as_bytes();
    if raw.len() > WORD_LEN {
        return Err(FundError::ReadOutOfBounds(raw.len()));
    }
    let mut word = [0u8; WORD_LEN];
    word[..raw.len()].copy_from_slice(raw);
    Ok(B256::from(word))
}

/// Inverse of [`pack_short_string`] for display; trailing zero bytes are dropped.
pub fn unpack_short_string(word: &B256) -> String {
    let end = word
        .iter()
        .rposition(|b| *b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    String::from_utf8_lossy(&word[..end]).into_owned()
}

/// `amount * bps / 10_000`.
pub fn apply_bps(amount: U256, bps: u16) -> Result<U256, FundError> {
    let scaled = amount
        .checked_mul(U256::from(bps))
        .ok_or(FundError::ArithmeticOverflow)?;
    Ok(scaled / U256::from(BPS_DENOMINATOR))
}

/// `amount` reduced by a tolerance expressed in basis points.
pub fn floor_by_bps(amount: U256, bps: u16) -> Result<U256, FundError> {
    let cut = apply_bps(amount, bps)?;
    amount.checked_sub(cut).ok_or(FundError::ArithmeticOverflow)
}

/// `amount * percentage / 100` for integer percentages in `1..=100`.
pub fn percent_of(amount: U256, percentage: u8) -> Result<U256, FundError> {
    if percentage == 0 || percentage > 100 {
        return Err(FundError::InvalidPercentage(percentage));
    }
    let scaled = amount
        .checked_mul(U256::from(percentage))
        .ok_or(FundError::ArithmeticOverflow)?;
    Ok(scaled / U256::from(100u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn ether(n: u64) -> U256 {
        U256::from(n) * SCALE
    }

    #[test]
    fn test_multiply_rejects_zero() {
        assert_eq!(multiply(ether(1), U256::ZERO), Err(FundError::InvalidZeroInput));
        assert_eq!(multiply(U256::ZERO, ether(1)), Err(FundError::InvalidZeroInput));
    }

    #[test]
    fn test_multiply_truncates() {
        assert_eq!(multiply(U256::from(1u64), U256::from(1u64)).unwrap(), U256::ZERO);
        assert_eq!(
            multiply(U256::from(100_000_000u64), U256::from(1_000_000_000u64)).unwrap(),
            U256::ZERO
        );
        assert_eq!(
            multiply(U256::from(1_000_000_000u64), U256::from(1_000_000_000u64)).unwrap(),
            U256::from(1u64)
        );
        assert_eq!(multiply(ether(1), U256::from(2u64)).unwrap(), U256::from(2u64));
        assert_eq!(multiply(ether(1), ether(2)).unwrap(), ether(2));
    }

    #[test]
    fn test_multiply_large() {
        let a = ether(1_000_000_000_000_000_000);
        let b = ether(2_000_000_000_000_000_000);
        let expected: U256 = "2000000000000000000000000000000000000000000000000000000"
            .parse()
            .unwrap();
        assert_eq!(multiply(a, b).unwrap(), expected);
    }

    #[test]
    fn test_multiply_overflow() {
        assert_eq!(multiply(U256::MAX, U256::from(2u64)), Err(FundError::ArithmeticOverflow));
    }

    #[test]
    fn test_divide() {
        assert_eq!(divide(U256::ZERO, ether(1)), Err(FundError::InvalidZeroInput));
        assert_eq!(divide(ether(1), U256::ZERO), Err(FundError::InvalidZeroInput));

        let half = U256::from(500_000_000_000_000_000u64);
        assert_eq!(divide(U256::from(1u64), U256::from(2u64)).unwrap(), half);
        assert_eq!(divide(ether(1), ether(2)).unwrap(), half);
        assert_eq!(divide(U256::from(100u64), U256::from(2u64)).unwrap(), ether(50));
        assert_eq!(
            divide(U256::from(1u64), U256::from(200u64)).unwrap(),
            U256::from(5_000_000_000_000_000u64)
        );
        assert_eq!(divide(U256::from(10u64), ether(2)).unwrap(), U256::from(5u64));
    }

    #[test]
    fn test_multiply_divide_round_trip() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let a = U256::from(rng.gen_range(1u64..u64::MAX)) * U256::from(1_000u64);
            let b = U256::from(rng.gen_range(1_000_000u64..u64::MAX));
            let product = multiply(a, b).unwrap();
            if product.is_zero() {
                continue;
            }
            let back = divide(product, b).unwrap();
            // Two truncations: error is bounded by 1e18 / b + 1.
            let tolerance = SCALE / b + U256::from(1u64);
            let diff = if back > a { back - a } else { a - back };
            assert!(diff <= tolerance, "a={a} b={b} back={back}");
        }
    }

    #[test]
    fn test_decode_word_lengths() {
        assert_eq!(decode_word(&[0u8; 31]), Err(FundError::ReadOutOfBounds(31)));
        assert_eq!(decode_word(&[0u8; 33]), Err(FundError::ReadOutOfBounds(33)));
        assert_eq!(decode_word(&[0u8; 32]).unwrap(), U256::ZERO);
        assert_eq!(decode_word(&[0xffu8; 32]).unwrap(), U256::MAX);

        let raw = hex::decode("00000000000000000000000000000000000000000000444b316c141919a1c41a").unwrap();
        assert_eq!(
            decode_word(&raw).unwrap(),
            "322507987884167470892058".parse::<U256>().unwrap()
        );
    }

    #[test]
    fn test_decode_inverts_encode() {
        let v: U256 = "662381954349503859623456".parse().unwrap();
        assert_eq!(decode_word(&encode_word(v)).unwrap(), v);
    }

    #[test]
    fn test_pack_short_string() {
        let word = pack_short_string("TEST").unwrap();
        assert_eq!(
            hex::encode(word),
            "5445535400000000000000000000000000000000000000000000000000000000"
        );
        let full = pack_short_string("12345678901234567890123456789012").unwrap();
        assert_eq!(
            hex::encode(full),
            "3132333435363738393031323334353637383930313233343536373839303132"
        );
        assert_eq!(
            pack_short_string("123456789012345678901234567890123"),
            Err(FundError::ReadOutOfBounds(33))
        );
        assert_eq!(unpack_short_string(&pack_short_string("LINK").unwrap()), "LINK");
        assert_eq!(pack_short_string("").unwrap(), B256::ZERO);
    }

    #[test]
    fn test_bps_and_percent() {
        assert_eq!(apply_bps(ether(1), 150).unwrap(), U256::from(15_000_000_000_000_000u64));
        assert_eq!(floor_by_bps(U256::from(10_000u64), 200).unwrap(), U256::from(9_800u64));
        assert_eq!(floor_by_bps(U256::from(10_000u64), 10_000).unwrap(), U256::ZERO);
        assert_eq!(floor_by_bps(U256::from(10_000u64), 10_001), Err(FundError::ArithmeticOverflow));
        assert_eq!(percent_of(U256::from(90u64), 50).unwrap(), U256::from(45u64));
        assert_eq!(percent_of(U256::from(90u64), 0), Err(FundError::InvalidPercentage(0)));
        assert_eq!(percent_of(U256::from(90u64), 101), Err(FundError::InvalidPercentage(101)));
    }
}
