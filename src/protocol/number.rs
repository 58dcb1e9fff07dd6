//! Numeric coercion compatible with the values the web client produced.
//!
//! Operators type transmit values as free text and devices report
//! frequencies as either JSON numbers or strings.  Both go through
//! [`parse_number`], which accepts what `Number(text)` would in a browser
//! (minus the non-finite results), and come back out through
//! [`format_number`] in shortest form.

/// Parse operator / device text as a finite number.
///
/// Accepts surrounding whitespace, an optional sign, decimals, exponents,
/// and unsigned `0x` / `0o` / `0b` integer literals.  Blank input and
/// anything non-finite yields `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(radix_value) = parse_prefixed_integer(s) {
        return Some(radix_value);
    }

    // `f64::from_str` also accepts "inf", "infinity" and "nan"; those are
    // filtered by the finiteness check below.
    let n: f64 = s.parse().ok()?;
    n.is_finite().then_some(n)
}

fn parse_prefixed_integer(s: &str) -> Option<f64> {
    let (radix, digits) = match s.get(..2)? {
        "0x" | "0X" => (16, &s[2..]),
        "0o" | "0O" => (8, &s[2..]),
        "0b" | "0B" => (2, &s[2..]),
        _ => return None,
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    u64::from_str_radix(digits, radix).ok().map(|v| v as f64)
}

/// Render a number the way it is sent on the wire: no trailing `.0`,
/// negative zero collapsed to `0`.
///
/// Magnitudes of `1e21` and above, or below `1e-6`, use exponent form with
/// an explicit exponent sign (`1e+21`, `1.5e-7`), as a browser prints them.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if !(1e-6..1e21).contains(&abs) {
        let exp = format!("{n:e}");
        return match exp.split_once('e') {
            Some((mantissa, power)) if !power.starts_with('-') => {
                format!("{mantissa}e+{power}")
            }
            _ => exp,
        };
    }
    format!("{n}")
}

/// Parse a positive whole number of milliseconds.
pub fn parse_millis(raw: &str) -> Option<u64> {
    let n = parse_number(raw)?;
    if n <= 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
        return None;
    }
    Some(n as u64)
}
