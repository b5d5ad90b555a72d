use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors for a report run.
///
/// Faults confined to a single line of an otherwise readable capture are not
/// errors; they are carried as [`ParseFault`] values alongside the extraction
/// result and surface as absent fields.
#[derive(Error, Debug)]
pub enum Error {
    /// An input capture does not exist or could not be read
    #[error("cannot read input {0}: {1}")]
    InputNotFound(PathBuf, #[source] io::Error),

    /// Neither capture yielded a single iteration
    #[error("no valid iterations could be extracted ({0})")]
    NoIterations(PathBuf),

    /// The output table could not be created or renamed into place
    #[error("cannot write output {0}: {1}")]
    WriteFailure(PathBuf, #[source] io::Error),
}

/// A recoverable extraction fault: a recognized field's position held
/// non-numeric text.
///
/// The affected field stays absent from its iteration and extraction of the
/// remaining lines continues. Whether the iteration survives is decided later
/// by the completeness filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFault {
    /// 1-based line number in the source capture
    pub line: usize,
    /// Label of the field that failed to parse
    pub label: String,
    /// The offending text
    pub text: String,
}

impl fmt::Display for ParseFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: expected a number for {}, found {:?}",
            self.line, self.label, self.text
        )
    }
}
