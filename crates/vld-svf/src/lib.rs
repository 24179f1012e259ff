#![deny(unsafe_code)]

//! Reader for the SVF subset used by the VLD emergency PROM loader
//!
//! This crate turns a Serial Vector Format file into a stream of parsed
//! directives. It does no hardware access; the driver maps the directives to
//! JTAG TAP operations.
//!
//! # Format
//!
//! - Lines starting with `//` or `!` are comments.
//! - A statement runs until the first line containing `;`. Unterminated
//!   lines are joined with the following ones before tokenizing.
//! - `SDR <n> TDI (<hex>)` / `SIR <n> TDI (<hex>)`: hex is written most
//!   significant digit first and returned least significant byte first.
//! - `RUNTEST <cycles>`, `STATE RESET`, `ENDIR IDLE|IRPAUSE`.
//! - All other directives are reported as [`Command::Ignored`].
//!
//! # Example
//!
//! ```no_run
//! use vld_svf::{Command, SvfFile};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = SvfFile::from_file("prom.svf")?;
//! println!("{} lines", file.line_count());
//!
//! for statement in file.statements() {
//!     if let Command::ShiftData(shift) = statement?.command()? {
//!         println!("SDR {} bits", shift.bits);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod command;
mod error;
pub mod framing;
mod reader;

use std::path::Path;

pub use command::{tokenize, Command, EndIr, Shift};
pub use error::{Result, SvfError};
pub use framing::{SdrFraming, SDR_FRAMING};
pub use reader::{is_comment, Statement, StatementReader};

/// An SVF file held in memory.
///
/// The whole file is read up front so the line count is known before the
/// single statement pass starts.
#[derive(Debug, Clone)]
pub struct SvfFile {
    text: String,
}

impl SvfFile {
    /// Read an SVF file.
    ///
    /// # Errors
    ///
    /// Returns `SvfError::FileNotFound` if the file does not exist, or
    /// `SvfError::Io` if it cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Reading SVF file {}", path.display());

        if !path.exists() {
            return Err(SvfError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let text = std::fs::read_to_string(path)?;
        Ok(Self { text })
    }

    /// Wrap already loaded SVF text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Number of physical lines.
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }

    /// Statement iterator over the file.
    pub fn statements(&self) -> StatementReader<'_> {
        StatementReader::new(&self.text)
    }
}
