//! Join code allocation.
//!
//! Join codes are 4-character base-36 strings (`0-9A-Z`), handed out in
//! strictly increasing order by incrementing the highest code seen so far.
//! `"ZZZZ"` wraps around to `"0000"`; at that point codes of finished games
//! are long since recyclable.

use crate::error::{GameError, Result};

/// Number of characters in a join code.
pub const JOIN_CODE_LEN: usize = 4;

const CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// The code assigned to the very first session.
pub fn first_join_code() -> String {
    "0".repeat(JOIN_CODE_LEN)
}

/// Returns the join code following `current`.
///
/// The increment is digit-wise with carry, so `"0009"` becomes `"000A"` and
/// `"000Z"` becomes `"0010"`. A carry out of the leftmost digit wraps the
/// code to `"0000"`.
///
/// # Errors
///
/// Returns [`GameError::Storage`] when the stored code is malformed, since
/// that can only happen through corrupted repository data.
pub fn next_join_code(current: &str) -> Result<String> {
    if current.len() != JOIN_CODE_LEN {
        return Err(GameError::storage(format!(
            "join code '{current}' is not {JOIN_CODE_LEN} characters"
        )));
    }

    let mut digits = current
        .bytes()
        .map(digit_value)
        .collect::<Result<Vec<usize>>>()?;

    let mut carry = true;
    for digit in digits.iter_mut().rev() {
        if !carry {
            break;
        }
        *digit += 1;
        if *digit == CHARSET.len() {
            *digit = 0;
        } else {
            carry = false;
        }
    }
    // A carry past the leftmost digit wraps to all zeros, which the loop
    // above has already produced.

    Ok(digits.into_iter().map(|d| CHARSET[d] as char).collect())
}

fn digit_value(byte: u8) -> Result<usize> {
    CHARSET
        .iter()
        .position(|&c| c == byte)
        .ok_or_else(|| GameError::storage(format!("invalid join code character '{}'", byte as char)))
}
