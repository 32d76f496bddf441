use std::num::ParseIntError;

#[cfg(test)]
#[path = "./string_test.rs"]
mod string_test;

pub fn right_pad(s: &str, len: usize) -> String {
    let mut res = String::with_capacity(len);
    res.push_str(s);
    while res.len() < len {
        res.push(' ');
    }
    res
}

/// parses string to a integer. unprefixed values assume base 10, "0x" prefix or "h" suffix indicates base 16,
/// a leading "-" negates the value.
pub fn parse_number_string(s: &str) -> Result<i64, ParseIntError> {
    let x = &s.replace("_", "").to_lowercase();
    if let Some(rest) = x.strip_prefix('-') {
        return parse_number_string(rest).map(|v| -v);
    }
    if let Some(hex) = x.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16);
    }
    match x.strip_suffix('h') {
        Some(hex) if hex.starts_with(|c: char| c.is_ascii_digit()) => i64::from_str_radix(hex, 16),
        _ => x.parse::<i64>(),
    }
}
