//! CPF (Cadastro de Pessoas Físicas) validation.
//!
//! A CPF is 11 digits: nine base digits followed by two check digits, each
//! computed with a weighted sum modulo 11.

/// Number of digits in a CPF.
pub const CPF_LEN: usize = 11;

/// Returns `true` when `input` is a correctly checksummed CPF.
///
/// Any non-digit characters (dots, dashes, spaces) are ignored, so both
/// `529.982.247-25` and `52998224725` are accepted.
pub fn is_valid(input: &str) -> bool {
    let digits: Vec<u32> = input.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != CPF_LEN {
        return false;
    }

    // 000.000.000-00, 111.111.111-11, ... pass the checksum but are not issued.
    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }

    check_digit(&digits[..9]) == digits[9] && check_digit(&digits[..10]) == digits[10]
}

/// Computes the check digit over `base` with weights `base.len() + 1` down to 2.
fn check_digit(base: &[u32]) -> u32 {
    let top = base.len() as u32 + 1;
    let sum: u32 = base
        .iter()
        .zip((2..=top).rev())
        .map(|(digit, weight)| digit * weight)
        .sum();
    match sum % 11 {
        r if r < 2 => 0,
        r => 11 - r,
    }
}

/// Returns the bare 11-digit form of a valid CPF, or `None`.
pub fn normalize(input: &str) -> Option<String> {
    if !is_valid(input) {
        return None;
    }
    Some(input.chars().filter(char::is_ascii_digit).collect())
}

/// Formats 11 digits as `000.000.000-00`. Other inputs are returned as-is.
pub fn format(digits: &str) -> String {
    if digits.len() != CPF_LEN || !digits.chars().all(|c| c.is_ascii_digit()) {
        return digits.to_string();
    }
    format!(
        "{}.{}.{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    )
}

/// Masks a CPF for logs: `***.982.247-**`.
pub fn mask(input: &str) -> String {
    let digits: String = input.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != CPF_LEN {
        return "***".to_string();
    }
    format!("***.{}.{}-**", &digits[3..6], &digits[6..9])
}
