//! Statement assembly from physical lines.
//!
//! A statement ends at the first line containing `;`. Lines are joined as-is
//! (the line break is dropped, nothing is inserted) so hex payloads wrapped by
//! the toolchain come back together. Long `SDR` statements first pull the
//! number of lines their size bracket predicts, see [`crate::framing`], and
//! a statement that used a different number of lines is reported.

use crate::command::{tokenize, Command};
use crate::error::{Result, SvfError};
use crate::framing::{byte_count, SdrFraming};

/// One logical SVF statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// First physical line (1-based).
    pub line: usize,
    /// Last physical line consumed (1-based).
    pub last_line: usize,
    /// Joined statement text.
    pub text: String,
}

impl Statement {
    /// Tokenize and parse the statement.
    ///
    /// # Errors
    ///
    /// Returns `SvfError::Parse` if a recognised directive is malformed.
    pub fn command(&self) -> Result<Command> {
        Command::parse(self.line, &tokenize(&self.text))
    }
}

/// Whether a physical line is a pure comment.
#[must_use]
pub fn is_comment(line: &str) -> bool {
    line.starts_with("//") || line.starts_with('!')
}

/// Iterator over the statements of an SVF text.
#[derive(Debug)]
pub struct StatementReader<'a> {
    lines: std::str::Lines<'a>,
    consumed: usize,
    framing_mismatches: usize,
}

impl<'a> StatementReader<'a> {
    /// Read statements from `text`.
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            consumed: 0,
            framing_mismatches: 0,
        }
    }

    /// Physical lines consumed so far.
    #[must_use]
    pub const fn lines_consumed(&self) -> usize {
        self.consumed
    }

    /// Framed `SDR` statements whose line count disagreed with their bracket.
    #[must_use]
    pub const fn framing_mismatches(&self) -> usize {
        self.framing_mismatches
    }

    fn next_line(&mut self) -> Option<&'a str> {
        let line = self.lines.next()?;
        self.consumed += 1;
        Some(line)
    }

    /// Pull the continuation lines an `SDR` bracket predicts. Returns the
    /// expected continuation count when a bracket applies.
    fn pull_framed_sdr(&mut self, text: &mut String) -> Option<usize> {
        let tokens = tokenize(text);
        if tokens.first().map(String::as_str) != Some("SDR") {
            return None;
        }
        let bits = tokens.get(1).and_then(|t| t.parse::<usize>().ok())?;
        let nbytes = byte_count(bits);
        let framing = SdrFraming::for_payload(nbytes)?;
        let wanted = framing.continuation_lines(nbytes);
        tracing::trace!(
            "SDR {bits} bits: bracket < {} bytes, pulling {wanted} line(s)",
            framing.below_bytes
        );
        for _ in 0..wanted {
            let Some(line) = self.next_line() else {
                break;
            };
            text.push_str(line);
            if line.contains(';') {
                break;
            }
        }
        Some(wanted)
    }
}

impl Iterator for StatementReader<'_> {
    type Item = Result<Statement>;

    fn next(&mut self) -> Option<Self::Item> {
        let (line, mut text) = loop {
            let raw = self.next_line()?;
            if is_comment(raw) || raw.trim().is_empty() {
                continue;
            }
            break (self.consumed, raw.to_string());
        };

        let framed = if text.contains(';') {
            None
        } else {
            self.pull_framed_sdr(&mut text)
        };

        while !text.contains(';') {
            match self.next_line() {
                Some(more) => text.push_str(more),
                None => return Some(Err(SvfError::UnexpectedEof { line })),
            }
        }

        if let Some(wanted) = framed {
            let used = self.consumed - line;
            if used != wanted {
                tracing::warn!(
                    "Line {line}: SDR spans {used} continuation line(s), framing expects {wanted}"
                );
                self.framing_mismatches += 1;
            }
        }

        Some(Ok(Statement {
            line,
            last_line: self.consumed,
            text,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statements(text: &str) -> Vec<Statement> {
        StatementReader::new(text).collect::<Result<_>>().unwrap()
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let s = statements("// header\n! note\n\nSIR 8 TDI (FF);\n");
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].line, 4);
        assert_eq!(s[0].text, "SIR 8 TDI (FF);");
    }

    #[test]
    fn joins_continuation_lines() {
        let s = statements("SDR 16 TDI\n(ABCD);\nRUNTEST 10;\n");
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].text, "SDR 16 TDI(ABCD);");
        assert_eq!((s[0].line, s[0].last_line), (1, 2));
        assert_eq!(s[1].line, 3);
    }

    #[test]
    fn wrapped_hex_is_rejoined() {
        let s = statements("SDR 32 TDI (0123\n4567) SMASK (FFFFFFFF);\n");
        assert_eq!(s[0].text, "SDR 32 TDI (01234567) SMASK (FFFFFFFF);");
    }

    #[test]
    fn framed_sdr_stops_at_terminator() {
        let s = statements("SDR 64 TDI (00000000\n00000001);\nSTATE RESET;\n");
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].last_line, 2);
        assert_eq!(s[1].text, "STATE RESET;");
    }

    fn wrapped_sdr(payload: &str, line_len: usize) -> String {
        let mut text = format!("SDR {} TDI (", payload.len() * 4);
        for (i, chunk) in payload.as_bytes().chunks(line_len).enumerate() {
            if i > 0 {
                text.push('\n');
            }
            text.push_str(std::str::from_utf8(chunk).unwrap());
        }
        text.push_str(");\nSTATE RESET;\n");
        text
    }

    #[test]
    fn long_sdr_over_intermediate_lines() {
        // 200 bytes: 120 + 53 on the outer lines leaves one intermediate line
        let payload: String = (0..400).map(|i| char::from(b"0123456789ABCDEF"[i % 16])).collect();
        let text = wrapped_sdr(&payload, 150);
        let mut r = StatementReader::new(&text);
        let sdr = r.next().unwrap().unwrap();
        assert_eq!((sdr.line, sdr.last_line), (1, 3));
        assert_eq!(sdr.text, format!("SDR 1600 TDI ({payload});"));
        let Command::ShiftData(shift) = sdr.command().unwrap() else {
            panic!("expected SDR");
        };
        let tdi = shift.tdi.unwrap();
        assert_eq!(tdi.len(), 200);
        assert_eq!((tdi[0], tdi[199]), (0xEF, 0x01));
        assert_eq!(r.next().unwrap().unwrap().text, "STATE RESET;");
        assert_eq!(r.framing_mismatches(), 0);
    }

    #[test]
    fn sdr_framing_mismatch_is_counted() {
        let payload = "A5".repeat(200);
        for (line_len, mismatches) in [(200, 1), (150, 0), (100, 1), (16, 1)] {
            let text = wrapped_sdr(&payload, line_len);
            let mut r = StatementReader::new(&text);
            let sdr = r.next().unwrap().unwrap();
            assert_eq!(sdr.text, format!("SDR 1600 TDI ({payload});"));
            assert_eq!(r.framing_mismatches(), mismatches, "line length {line_len}");
        }
    }

    #[test]
    fn eof_inside_statement() {
        let mut r = StatementReader::new("SIR 8 TDI (FF);\nSDR 8 TDI\n(FF)\n");
        assert!(r.next().unwrap().is_ok());
        match r.next() {
            Some(Err(SvfError::UnexpectedEof { line })) => assert_eq!(line, 2),
            other => panic!("expected EOF error, got {other:?}"),
        }
    }

    #[test]
    fn counts_consumed_lines() {
        let mut r = StatementReader::new("// c\nSTATE RESET;\n");
        r.next();
        assert_eq!(r.lines_consumed(), 2);
    }
}
