use crate::error::Result;
use std::io::Write;

const SIGNIFICANT_DIGITS: i32 = 6;

/// Formats like C's `%g`: six significant digits, trailing zeros removed, and
/// exponent notation when the exponent is below -4 or at least six.
pub fn format_g(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0".to_string() } else { "0".to_string() };
    }

    // The exponent after rounding to the requested precision decides the style.
    let scientific = format!("{:.*e}", (SIGNIFICANT_DIGITS - 1) as usize, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", strip_zeros(mantissa), sign, exponent.abs())
    } else {
        let decimals = (SIGNIFICANT_DIGITS - 1 - exponent) as usize;
        strip_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Writes one `"<value> <diagnostic>\n"` line per row, both in `%g` style.
pub fn write_results<W: Write>(mut writer: W, rows: &[(f64, f64)]) -> Result<()> {
    for &(value, diagnostic) in rows {
        writeln!(writer, "{} {}", format_g(value), format_g(diagnostic))?;
    }
    writer.flush()?;
    Ok(())
}
