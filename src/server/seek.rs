//! Parsing of the textual `AESDCHAR_IOCSEEKTO:` control line.

use crate::error::{AesdError, Result};

pub const PREFIX: &[u8] = b"AESDCHAR_IOCSEEKTO:";

/// Parse `AESDCHAR_IOCSEEKTO:<decimal>,<uint>` (without the trailing
/// newline requirement — callers pass the command with or without it).
/// The second integer accepts an optional `0x`/`0X` hex prefix.
pub fn parse(line: &[u8]) -> Result<(u32, u32)> {
    let rest = line
        .strip_prefix(PREFIX)
        .ok_or_else(|| AesdError::invalid("missing AESDCHAR_IOCSEEKTO: prefix"))?;
    let rest = rest.strip_suffix(b"\n").unwrap_or(rest);
    let text = std::str::from_utf8(rest)
        .map_err(|_| AesdError::invalid("seek directive is not valid utf-8"))?;

    let (idx_str, off_str) = text
        .split_once(',')
        .ok_or_else(|| AesdError::invalid("seek directive missing comma"))?;

    let cmd_index: u32 = idx_str
        .trim()
        .parse()
        .map_err(|_| AesdError::invalid(format!("bad command index: {idx_str}")))?;
    let byte_offset = parse_uint(off_str.trim())?;

    Ok((cmd_index, byte_offset))
}

fn parse_uint(s: &str) -> Result<u32> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|_| AesdError::invalid(format!("bad hex byte offset: {s}")))
    } else {
        s.parse()
            .map_err(|_| AesdError::invalid(format!("bad byte offset: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_decimal_offset() {
        assert_eq!(parse(b"AESDCHAR_IOCSEEKTO:2,3\n").unwrap(), (2, 3));
    }

    #[test]
    fn test_parses_hex_offset() {
        assert_eq!(parse(b"AESDCHAR_IOCSEEKTO:2,0x1a\n").unwrap(), (2, 0x1a));
    }

    #[test]
    fn test_accepts_missing_trailing_newline() {
        assert_eq!(parse(b"AESDCHAR_IOCSEEKTO:0,0").unwrap(), (0, 0));
    }

    #[test]
    fn test_rejects_wrong_prefix() {
        assert!(parse(b"not a seek\n").is_err());
    }

    #[test]
    fn test_rejects_missing_comma() {
        assert!(parse(b"AESDCHAR_IOCSEEKTO:2\n").is_err());
    }

    #[test]
    fn test_rejects_non_numeric_index() {
        assert!(parse(b"AESDCHAR_IOCSEEKTO:x,3\n").is_err());
    }
}
