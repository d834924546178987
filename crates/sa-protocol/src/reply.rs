//! ASCII reply parsing shared by all bus dialects
//!
//! Analyzers answer numeric queries in a handful of styles:
//!
//! - bare numbers: `-10`, `+1.000000000E+06`
//! - Tektronix headers: `REFLVL -20.0`, `FREQ 1.5E+9`
//! - trailing units or terminators: `-10.0DBM;`, `300HZ\r\n`

use crate::error::ParseError;

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')
}

/// Extract the first finite number from an instrument reply
pub fn parse_number(reply: &str) -> Result<f64, ParseError> {
    let value = first_number(reply)?;
    if !value.is_finite() {
        return Err(ParseError::InvalidNumber(reply.to_string()));
    }
    Ok(value)
}

fn first_number(reply: &str) -> Result<f64, ParseError> {
    let text = reply.trim().trim_end_matches(';').trim();
    if let Ok(v) = text.parse::<f64>() {
        return Ok(v);
    }

    // Find the first character that can start a number, skipping any
    // alphabetic header such as "REFLVL".
    let bytes: Vec<char> = text.chars().collect();
    let start = (0..bytes.len()).find(|&i| {
        let c = bytes[i];
        let next_is_digit = bytes.get(i + 1).is_some_and(|n| n.is_ascii_digit() || *n == '.');
        let header_boundary = i == 0 || matches!(bytes[i - 1], ' ' | ':' | ',' | '\t');
        c.is_ascii_digit() && header_boundary
            || matches!(c, '+' | '-' | '.') && next_is_digit && header_boundary
    });

    let Some(start) = start else {
        return Err(ParseError::InvalidNumber(reply.to_string()));
    };

    let mut token: String = bytes[start..].iter().take_while(|c| is_number_char(**c)).collect();
    // A trailing exponent marker without digits belongs to a unit ("dBm" -> "e")
    while token.ends_with(['e', 'E', '+', '-']) {
        token.pop();
    }

    token
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidNumber(reply.to_string()))
}

/// Extract the first number from a reply and round it to an integer
pub fn parse_integer(reply: &str) -> Result<i64, ParseError> {
    Ok(parse_number(reply)?.round() as i64)
}

/// Strip whitespace, terminators and an optional echoed header from a text reply
pub fn parse_word(reply: &str) -> String {
    let text = reply.trim().trim_end_matches(';').trim();
    text.rsplit([' ', ':'])
        .next()
        .unwrap_or(text)
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_numbers() {
        assert_eq!(parse_number("-10").unwrap(), -10.0);
        assert_eq!(parse_number("+1.000000000E+06\n").unwrap(), 1e6);
        assert_eq!(parse_number("  2000000\r\n").unwrap(), 2e6);
    }

    #[test]
    fn test_headers_and_units() {
        assert_eq!(parse_number("REFLVL -20.0").unwrap(), -20.0);
        assert_eq!(parse_number("FREQ 1.5E+9").unwrap(), 1.5e9);
        assert_eq!(parse_number("-10.0DBM;").unwrap(), -10.0);
        assert_eq!(parse_number("300HZ").unwrap(), 300.0);
        assert_eq!(parse_number("RL -10.5dBm").unwrap(), -10.5);
    }

    #[test]
    fn test_rejects_text() {
        assert!(parse_number("LIN").is_err());
        assert!(parse_number("").is_err());
        assert!(parse_number("VRTDSP").is_err());
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(parse_number("nan").is_err());
        assert!(parse_number("NaN\r\n").is_err());
        assert!(parse_number("inf").is_err());
        assert!(parse_number("-infinity").is_err());
        assert!(parse_number("1e400").is_err());
        assert!(parse_integer("inf").is_err());
    }

    #[test]
    fn test_integer() {
        assert_eq!(parse_integer("401\n").unwrap(), 401);
        assert_eq!(parse_integer("+6.25E+02").unwrap(), 625);
    }

    #[test]
    fn test_word() {
        assert_eq!(parse_word("LOG\n"), "LOG");
        assert_eq!(parse_word("VRTDSP LIN"), "LIN");
        assert_eq!(parse_word("lin;"), "LIN");
    }
}
