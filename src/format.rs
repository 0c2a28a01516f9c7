//! pt-BR presentation helpers
//!
//! The only place amounts are rounded.

/// Largest magnitude whose cents fit in a `u64`
const MAX_FORMATTABLE: f64 = u64::MAX as f64 / 100.0;

fn formattable(value: f64) -> bool {
    value.is_finite() && value.abs() < MAX_FORMATTABLE
}

/// Round to cents
pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

fn group_thousands(whole: u64) -> String {
    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

/// Format with `.` thousands separators and `,` decimal mark
fn format_decimal(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}{},{:02}", sign, group_thousands(cents / 100), cents % 100)
}

/// `1024.2413` → `R$ 1.024,24`
pub fn format_brl(amount: f64) -> String {
    if !formattable(amount) {
        return "R$ -".to_string();
    }
    let formatted = format_decimal(amount);
    match formatted.strip_prefix('-') {
        Some(positive) => format!("-R$ {}", positive),
        None => format!("R$ {}", formatted),
    }
}

/// `2.4241` → `2,42%`
pub fn format_percent(value: f64) -> String {
    if !formattable(value) {
        return "-".to_string();
    }
    format!("{}%", format_decimal(value))
}
