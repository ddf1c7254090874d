//! Korean resident registration numbers (`YYMMDD-GNNNNNN`).
//!
//! The 7th digit encodes century and gender: `1`/`2` for births in the
//! 1900s, `3`/`4` for the 2000s; odd is male, even is female.

use chrono::{Datelike, Local};
use serde::Serialize;

use crate::models::Gender;

pub const RESIDENT_NUMBER_DIGITS: usize = 13;
const BIRTH_DATE_DIGITS: usize = 6;
const MASKED_PREFIX_LEN: usize = 8;
const MASK: &str = "******";

/// Outcome of reading age and gender from a resident number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Derivation {
    /// Too short to carry a gender digit. Derived fields must be reset.
    Cleared,
    Derived { birth_year: i32, age: i32, gender: Gender },
    /// Long enough but the gender digit is not one we can read (e.g. a
    /// foreign registration). Existing values are kept.
    Undetermined,
}

/// Keeps digits only, at most 13, with a `-` after the birth date once
/// the gender digit is present.
pub fn normalize(input: &str) -> String {
    let digits: String = input.chars()
        .filter(char::is_ascii_digit)
        .take(RESIDENT_NUMBER_DIGITS)
        .collect();

    if digits.len() > BIRTH_DATE_DIGITS {
        format!("{}-{}", &digits[..BIRTH_DATE_DIGITS], &digits[BIRTH_DATE_DIGITS..])
    } else {
        digits
    }
}

pub fn derive(resident_number: &str, current_year: i32) -> Derivation {
    let digits: Vec<u32> = resident_number.chars()
        .filter_map(|c| c.to_digit(10))
        .collect();

    if digits.len() <= BIRTH_DATE_DIGITS {
        return Derivation::Cleared;
    }

    let century = match digits[BIRTH_DATE_DIGITS] {
        1 | 2 => 1900,
        3 | 4 => 2000,
        _ => return Derivation::Undetermined,
    };

    let birth_year = century + (digits[0] * 10 + digits[1]) as i32;
    let gender = if digits[BIRTH_DATE_DIGITS] % 2 == 1 {
        Gender::Male
    } else {
        Gender::Female
    };

    Derivation::Derived {
        birth_year,
        age: current_year - birth_year,
        gender,
    }
}

/// [`derive`] against the local calendar year.
pub fn derive_now(resident_number: &str) -> Derivation {
    derive(resident_number, Local::now().year())
}

/// Display form: birth date, separator and gender digit, rest hidden.
pub fn mask(resident_number: &str) -> String {
    let visible: String = resident_number.chars().take(MASKED_PREFIX_LEN).collect();
    format!("{}{}", visible, MASK)
}
