//! Error and result-code vocabulary shared by every class.
//!
//! Fallible operations return [`Result<T>`]. [`ResultCode`] is the flat, numbered form of the
//! same outcomes (plus the `Invalid`/`Max` sentinels) for callers that want a printable status.

use core::fmt;

use thiserror::Error;

/// Errors reported by the object model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Error {
    /// A handle, buffer, table or slot failed validation
    #[error("Invalid input")]
    InvalidArgument,
    /// The heap refused an allocation
    #[error("No memory")]
    OutOfMemory,
}

pub type Result<T> = core::result::Result<T, Error>;

/// Numbered operation outcome.
///
/// `Invalid` and `Max` bracket the meaningful codes and are never produced by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ResultCode {
    Invalid = 0,
    Success = 1,
    InvalidArgument = 2,
    OutOfMemory = 3,
    Max = 4,
}

const RESULT_CODE_STRINGS: [&str; 5] = ["Invalid RC", "Success", "Invalid input", "No memory", "Max RC"];

const _: () = assert!(RESULT_CODE_STRINGS.len() == ResultCode::Max as usize + 1);

impl ResultCode {
    /// Text used for raw codes outside `Invalid..=Max`
    pub const OUT_OF_RANGE: &'static str = "__Invalid__";

    #[inline]
    pub const fn is_ok(self) -> bool {
        matches!(self, ResultCode::Success)
    }

    #[inline]
    pub const fn is_notok(self) -> bool {
        !self.is_ok()
    }

    /// True when `raw` names one of the codes (sentinels included)
    #[inline]
    pub const fn is_valid(raw: u32) -> bool {
        raw <= ResultCode::Max as u32
    }

    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(ResultCode::Invalid),
            1 => Some(ResultCode::Success),
            2 => Some(ResultCode::InvalidArgument),
            3 => Some(ResultCode::OutOfMemory),
            4 => Some(ResultCode::Max),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        RESULT_CODE_STRINGS[self as usize]
    }

    /// Text for an arbitrary raw code
    pub const fn string_of(raw: u32) -> &'static str {
        match ResultCode::from_raw(raw) {
            Some(code) => code.as_str(),
            None => ResultCode::OUT_OF_RANGE,
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Error> for ResultCode {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidArgument => ResultCode::InvalidArgument,
            Error::OutOfMemory => ResultCode::OutOfMemory,
        }
    }
}

impl<T> From<&Result<T>> for ResultCode {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => ResultCode::Success,
            Err(err) => ResultCode::from(*err),
        }
    }
}
