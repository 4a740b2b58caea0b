//! Display formatting for numeric view values.
//!
//! Missing or non-finite inputs render as [`PLACEHOLDER`], never as `0`, so a
//! value that was not computed cannot be mistaken for a computed zero.

pub const PLACEHOLDER: &str = "-";

/// Fixed-decimal rendering with `,` thousands grouping.
pub fn format_number(value: Option<f64>, digits: usize) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return PLACEHOLDER.to_string();
    };

    // Ties round away from zero, like the ko-KR locale formatter.
    let scale = 10f64.powi(digits as i32);
    let rounded = (value.abs() * scale).round() / scale;
    let fixed = format!("{:.*}", digits, rounded);
    let (integer, fraction) = match fixed.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(fixed.len() + integer.len() / 3 + 1);
    let is_zero = fixed.chars().all(|c| c == '0' || c == '.');
    if value.is_sign_negative() && !is_zero {
        grouped.push('-');
    }
    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(fraction) = fraction {
        grouped.push('.');
        grouped.push_str(fraction);
    }
    grouped
}

/// Ratio (0..=1) scaled to percent, without the `%` sign.
pub fn format_percent(value: Option<f64>, digits: usize) -> String {
    format_number(value.map(|ratio| ratio * 100.0), digits)
}
