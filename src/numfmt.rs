//! Numeric formatting for expanded values
//!
//! Implements the format rules attached to `@[fmt]{...}` tokens and to
//! values declared with a significant-figure count:
//! - a digit count rounds to that many significant figures, keeping
//!   trailing zeros ("3.14", "100", "1.00e+03"),
//! - `g`/`G` collapses the rounded value to its shortest general form,
//! - `t`/`T` renders a scientific-notation result as a LaTeX construct.

/// Parsed form of a format string such as `"3"`, `"2t"` or `"3g"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Format {
    pub digits: Option<usize>,
    pub general: bool,
    pub latex: bool,
}

impl Format {
    /// Parse a format string; characters outside `[0-9tTgG]` are ignored
    pub fn parse(spec: &str) -> Self {
        let mut format = Format::default();
        let mut digits = String::new();
        for ch in spec.chars() {
            match ch {
                '0'..='9' => digits.push(ch),
                'g' | 'G' => format.general = true,
                't' | 'T' => format.latex = true,
                _ => {}
            }
        }
        if !digits.is_empty() {
            format.digits = digits.parse().ok();
        }
        format
    }

    /// The format used by values with a `Significant` count: round then collapse
    pub fn significant(digits: usize) -> Self {
        Format {
            digits: Some(digits),
            general: true,
            latex: false,
        }
    }
}

/// Format a number according to `format`
pub fn apply(value: f64, format: &Format) -> String {
    let mut text = match format.digits {
        Some(digits) => general_form(value, digits.max(1), true),
        None => value.to_string(),
    };
    if format.general {
        let collapsed: f64 = text.parse().unwrap_or(value);
        text = general_form(collapsed, 6, false);
    }
    if !format.latex {
        return text.trim_end_matches('.').to_string();
    }
    latex_scientific(&text)
}

/// Round `value` to `digits` significant figures and render it in general
/// form: fixed notation while the exponent fits, scientific otherwise.
/// `keep_zeros` preserves trailing zeros up to the requested precision.
fn general_form(value: f64, digits: usize, keep_zeros: bool) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return if keep_zeros {
            format!("{:.*}", digits.saturating_sub(1), 0.0)
        } else {
            "0".to_string()
        };
    }

    let rounded = round_significant(value, digits);
    // Recompute the exponent after rounding: 999.9 at three figures is 1000,
    // which no longer fits three fixed digits.
    let exponent = rounded.abs().log10().floor() as i32;

    if exponent >= -4 && exponent < digits as i32 {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        let mut text = format!("{:.*}", decimals, rounded);
        if !keep_zeros && text.contains('.') {
            text = text.trim_end_matches('0').trim_end_matches('.').to_string();
        }
        text
    } else {
        let mantissa = rounded / 10f64.powi(exponent);
        let mut text = format!("{:.*}", digits - 1, mantissa);
        if !keep_zeros && text.contains('.') {
            text = text.trim_end_matches('0').trim_end_matches('.').to_string();
        }
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", text, sign, exponent.abs())
    }
}

fn round_significant(value: f64, digits: usize) -> f64 {
    let exponent = value.abs().log10().floor() as i32;
    let factor = 10f64.powi(digits as i32 - 1 - exponent);
    (value * factor).round() / factor
}

/// Translate a scientific-notation string ("3.0e+08") into a LaTeX
/// construct, dropping the exponent's sign when positive and its zero
/// padding. Fixed-notation input is returned unchanged apart from a
/// trailing-point strip.
fn latex_scientific(text: &str) -> String {
    let Some((mantissa, exponent)) = text.split_once(['e', 'E']) else {
        return text.trim_end_matches('.').to_string();
    };
    let mantissa = mantissa.trim_end_matches('.');
    let (sign, digits) = match exponent.as_bytes().first() {
        Some(b'+') => ("", &exponent[1..]),
        Some(b'-') => ("-", &exponent[1..]),
        _ => ("", exponent),
    };
    let digits = digits.trim_start_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };
    format!("\\ensuremath{{{}\\times{{}}10^{{{}{}}}}}", mantissa, sign, digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_significant_figures() {
        assert_eq!(apply(3.14159, &Format::parse("3")), "3.14");
        assert_eq!(apply(2.0, &Format::parse("3")), "2.00");
        assert_eq!(apply(100.0, &Format::parse("3")), "100");
    }

    #[test]
    fn test_rounding_carries_into_scientific() {
        assert_eq!(apply(999.9, &Format::parse("3")), "1.00e+03");
    }

    #[test]
    fn test_general_collapses_trailing_zeros() {
        assert_eq!(apply(2.0, &Format::parse("3g")), "2");
        assert_eq!(apply(2.5, &Format::parse("3g")), "2.5");
        assert_eq!(apply(0.25, &Format::parse("2g")), "0.25");
    }

    #[test]
    fn test_general_switches_to_scientific_for_large_values() {
        assert_eq!(apply(3.0e8, &Format::parse("2g")), "3e+08");
    }

    #[test]
    fn test_latex_scientific_notation() {
        assert_eq!(
            apply(3.0e8, &Format::parse("2t")),
            "\\ensuremath{3.0\\times{}10^{8}}"
        );
        assert_eq!(
            apply(2.5e-7, &Format::parse("2t")),
            "\\ensuremath{2.5\\times{}10^{-7}}"
        );
    }

    #[test]
    fn test_latex_leaves_fixed_notation_alone() {
        assert_eq!(apply(3.14159, &Format::parse("3t")), "3.14");
    }

    #[test]
    fn test_no_digits_uses_default_display() {
        assert_eq!(apply(4.0, &Format::parse("")), "4");
        assert_eq!(apply(1.5, &Format::parse("")), "1.5");
    }

    #[test]
    fn test_negative_values() {
        assert_eq!(apply(-3.14159, &Format::parse("3")), "-3.14");
        assert_eq!(
            apply(-3.0e8, &Format::parse("2t")),
            "\\ensuremath{-3.0\\times{}10^{8}}"
        );
    }

    #[test]
    fn test_zero() {
        assert_eq!(apply(0.0, &Format::parse("3")), "0.00");
        assert_eq!(apply(0.0, &Format::parse("3g")), "0");
    }
}
