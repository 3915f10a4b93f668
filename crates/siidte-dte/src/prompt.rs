#![forbid(unsafe_code)]

//! Folio prompting for interactive re-signing.

use std::io::{BufRead, Write};

use siidte_core::Error;

/// Asked once per document for the folio it should carry.
pub trait FolioPrompt {
    /// `Ok(None)` keeps `current`.
    fn ask(&mut self, id: &str, tipo: u32, current: u64) -> Result<Option<u64>, Error>;
}

/// Never changes a folio.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepFolio;

impl FolioPrompt for KeepFolio {
    fn ask(&mut self, _id: &str, _tipo: u32, _current: u64) -> Result<Option<u64>, Error> {
        Ok(None)
    }
}

/// Line-oriented prompt. An empty answer keeps the current folio; an
/// answer that is not a number is asked again.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl LinePrompt<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> FolioPrompt for LinePrompt<R, W> {
    fn ask(&mut self, id: &str, tipo: u32, current: u64) -> Result<Option<u64>, Error> {
        loop {
            write!(self.output, "{id} (TipoDTE {tipo}) folio [{current}]: ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let answer = line.trim();
            if answer.is_empty() {
                return Ok(None);
            }
            match answer.parse::<u64>() {
                Ok(folio) if folio > 0 => return Ok(Some(folio)),
                _ => writeln!(self.output, "not a folio: {answer:?}")?,
            }
        }
    }
}
