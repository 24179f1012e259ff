//! Directive parsing.
//!
//! Only the directives the PROM load needs are interpreted:
//! `SDR`, `SIR`, `RUNTEST`, `STATE RESET` and `ENDIR IDLE|IRPAUSE`.
//! Everything else parses to [`Command::Ignored`].

use crate::error::{Result, SvfError};
use crate::framing::byte_count;

/// State the TAP parks in after an instruction shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndIr {
    /// Run-Test/Idle.
    Idle,
    /// Pause-IR.
    IrPause,
}

/// A bit vector to shift in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shift {
    /// Number of bits.
    pub bits: usize,
    /// TDI payload, least significant byte first. `None` when the
    /// statement carries no `TDI` field.
    pub tdi: Option<Vec<u8>>,
}

/// A parsed SVF directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `SDR`: shift the data register.
    ShiftData(Shift),
    /// `SIR`: shift the instruction register.
    ShiftInstruction(Shift),
    /// `RUNTEST`: idle for a number of TCK cycles.
    RunTest {
        /// Idle clock cycles.
        cycles: usize,
    },
    /// `STATE RESET`.
    Reset,
    /// `ENDIR`.
    EndIr(EndIr),
    /// Anything not acted upon, keyed by its first word.
    Ignored(String),
}

/// Split a statement into words on blanks and double quotes. An opening
/// parenthesis always starts a new word so `TDI(FF)` and `TDI (FF)` agree.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        match c {
            ' ' | '\t' | '\r' | '\n' | '"' => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            '(' => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
                current.push(c);
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

impl Command {
    /// Parse tokenized statement words.
    ///
    /// # Errors
    ///
    /// Returns `SvfError::Parse` for a malformed bit count, hex vector or
    /// cycle count.
    pub fn parse(line: usize, words: &[String]) -> Result<Self> {
        let Some(keyword) = words.first() else {
            return Ok(Self::Ignored(String::new()));
        };
        let keyword = keyword.trim_end_matches(';');

        match keyword {
            "SDR" => Ok(parse_shift(line, words)?.map_or_else(
                || Self::Ignored(keyword.to_string()),
                Self::ShiftData,
            )),
            "SIR" => Ok(parse_shift(line, words)?.map_or_else(
                || Self::Ignored(keyword.to_string()),
                Self::ShiftInstruction,
            )),
            "RUNTEST" => {
                let args: Vec<&str> = words[1..].iter().map(|w| w.trim_end_matches(';')).collect();
                if let Some(cycles) = args.iter().find_map(|w| w.parse::<usize>().ok()) {
                    return Ok(Self::RunTest { cycles });
                }
                if args.contains(&"SEC") {
                    tracing::warn!("Line {line}: RUNTEST without TCK count ignored");
                    return Ok(Self::Ignored(keyword.to_string()));
                }
                Err(SvfError::parse(line, "RUNTEST without a cycle count"))
            }
            "STATE" => match words.get(1).map(|w| w.trim_end_matches(';')) {
                Some("RESET") => Ok(Self::Reset),
                other => {
                    tracing::debug!("Line {line}: STATE {other:?} ignored");
                    Ok(Self::Ignored(keyword.to_string()))
                }
            },
            "ENDIR" => {
                let target = words.get(1).map_or("", |w| w.trim_end_matches(';'));
                if target.starts_with("IDLE") {
                    Ok(Self::EndIr(EndIr::Idle))
                } else if target.starts_with("IRPAUSE") {
                    Ok(Self::EndIr(EndIr::IrPause))
                } else {
                    tracing::warn!("Line {line}: unknown ENDIR type {target}");
                    Ok(Self::Ignored(keyword.to_string()))
                }
            }
            other => {
                tracing::debug!("Line {line}: command type ignored: {other}");
                Ok(Self::Ignored(other.to_string()))
            }
        }
    }
}

/// Parse `<bits> TDI (<hex>)`. Returns `None` for zero-length shifts.
fn parse_shift(line: usize, words: &[String]) -> Result<Option<Shift>> {
    let bits_word = words
        .get(1)
        .ok_or_else(|| SvfError::parse(line, "missing bit count"))?;
    let bits: usize = bits_word
        .trim_end_matches(';')
        .parse()
        .map_err(|_| SvfError::parse(line, format!("invalid bit count {bits_word:?}")))?;
    if bits == 0 {
        tracing::debug!("Line {line}: zero-length shift ignored");
        return Ok(None);
    }

    if words.get(2).map(String::as_str) != Some("TDI") {
        return Ok(Some(Shift { bits, tdi: None }));
    }
    let vector = words
        .get(3)
        .ok_or_else(|| SvfError::parse(line, "TDI without a vector"))?;
    let tdi = decode_vector(line, vector, byte_count(bits))?;
    Ok(Some(Shift {
        bits,
        tdi: Some(tdi),
    }))
}

/// Decode a parenthesised, most-significant-digit-first hex vector into
/// `nbytes` bytes, least significant byte first. Short vectors are zero
/// extended; surplus leading digits are dropped.
fn decode_vector(line: usize, word: &str, nbytes: usize) -> Result<Vec<u8>> {
    let digits: Vec<u8> = word
        .trim_start_matches('(')
        .trim_end_matches(|c: char| c == ')' || c == ';')
        .bytes()
        .map(|b| {
            char::from(b)
                .to_digit(16)
                .and_then(|d| u8::try_from(d).ok())
                .ok_or_else(|| SvfError::parse(line, format!("invalid hex digit {:?} in TDI", char::from(b))))
        })
        .collect::<Result<_>>()?;

    if digits.is_empty() {
        return Err(SvfError::parse(line, "empty TDI vector"));
    }

    let mut bytes = Vec::with_capacity(nbytes);
    let mut rev = digits.iter().rev();
    for _ in 0..nbytes {
        let lo = rev.next().copied().unwrap_or(0);
        let hi = rev.next().copied().unwrap_or(0);
        bytes.push((hi << 4) | lo);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Command {
        Command::parse(1, &tokenize(text)).unwrap()
    }

    #[test]
    fn sdr_eight_bits() {
        assert_eq!(
            parse("SDR 8 TDI (FF);"),
            Command::ShiftData(Shift { bits: 8, tdi: Some(vec![0xFF]) })
        );
    }

    #[test]
    fn bytes_come_back_lsb_first() {
        assert_eq!(
            parse("SDR 32 TDI (71D55948) SMASK (FFFFFFFF);"),
            Command::ShiftData(Shift { bits: 32, tdi: Some(vec![0x48, 0x59, 0xD5, 0x71]) })
        );
    }

    #[test]
    fn odd_digit_counts_are_right_aligned() {
        assert_eq!(
            parse("SIR 12 TDI (7FE);"),
            Command::ShiftInstruction(Shift { bits: 12, tdi: Some(vec![0xFE, 0x07]) })
        );
    }

    #[test]
    fn shift_without_tdi() {
        assert_eq!(
            parse("SDR 16 TDO (0000);"),
            Command::ShiftData(Shift { bits: 16, tdi: None })
        );
    }

    #[test]
    fn tdi_glued_to_parenthesis() {
        assert_eq!(
            tokenize("SIR 8 TDI(E8);"),
            vec!["SIR", "8", "TDI", "(E8);"]
        );
    }

    #[test]
    fn quotes_are_delimiters() {
        assert_eq!(tokenize("TRST \"OFF\";"), vec!["TRST", "OFF", ";"]);
    }

    #[test]
    fn runtest_and_state() {
        assert_eq!(parse("RUNTEST 20000 TCK;"), Command::RunTest { cycles: 20000 });
        assert_eq!(parse("RUNTEST IDLE 5 TCK;"), Command::RunTest { cycles: 5 });
        assert_eq!(parse("STATE RESET;"), Command::Reset);
        assert_eq!(parse("STATE IDLE;"), Command::Ignored("STATE".into()));
    }

    #[test]
    fn runtest_time_only_is_ignored() {
        assert_eq!(parse("RUNTEST 1.0E-2 SEC;"), Command::Ignored("RUNTEST".into()));
        assert_eq!(
            parse("RUNTEST 300 TCK 1.0E-2 SEC;"),
            Command::RunTest { cycles: 300 }
        );
    }

    #[test]
    fn endir_states() {
        assert_eq!(parse("ENDIR IRPAUSE;"), Command::EndIr(EndIr::IrPause));
        assert_eq!(parse("ENDIR IDLE;"), Command::EndIr(EndIr::Idle));
        assert_eq!(parse("ENDIR DRPAUSE;"), Command::Ignored("ENDIR".into()));
    }

    #[test]
    fn unknown_directives_are_ignored() {
        assert_eq!(parse("FREQUENCY 1E6 HZ;"), Command::Ignored("FREQUENCY".into()));
        assert_eq!(parse("HIR 0;"), Command::Ignored("HIR".into()));
    }

    #[test]
    fn malformed_input() {
        assert!(Command::parse(3, &tokenize("SDR x TDI (00);")).is_err());
        assert!(Command::parse(3, &tokenize("SDR 8 TDI (GG);")).is_err());
        assert!(Command::parse(3, &tokenize("RUNTEST;")).is_err());
    }
}
