// SPDX-License-Identifier: MIT

use core::fmt;

/// Result type for RexIO operations.
pub type RexIOResult<T = ()> = core::result::Result<T, RexIOError>;

/// Error type for RexIO operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RexIOError {
    /// Operating-system error, carrying the raw `errno`.
    Os(i32),
    UnexpectedEof,
    OutOfBounds,
    Misaligned {
        offset: u64,
        len: usize,
        align: usize,
    },
    Invalid(&'static str),
    Unsupported,
    Other(&'static str),
}

impl RexIOError {
    pub fn msg(&self) -> &'static str {
        match self {
            RexIOError::Os(_) => "OS error",
            RexIOError::UnexpectedEof => "Unexpected end of device",
            RexIOError::OutOfBounds => "Out of bounds",
            RexIOError::Misaligned { .. } => "Misaligned access",
            RexIOError::Invalid(msg) => msg,
            RexIOError::Unsupported => "Unsupported operation",
            RexIOError::Other(msg) => msg,
        }
    }

    /// Raw OS error code, if this error came from the operating system.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            RexIOError::Os(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<&'static str> for RexIOError {
    #[inline]
    fn from(msg: &'static str) -> Self {
        RexIOError::Other(msg)
    }
}

impl fmt::Display for RexIOError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg())?;
        match self {
            RexIOError::Os(code) => write!(f, " (errno {code})"),
            RexIOError::Misaligned { offset, len, align } => {
                write!(f, " (offset: {offset:#x}, len: {len}, align: {align})")
            }
            _ => Ok(()),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RexIOError {}

#[cfg(feature = "std")]
impl From<std::io::Error> for RexIOError {
    #[cold]
    #[inline(never)]
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;

        if let Some(code) = e.raw_os_error() {
            return RexIOError::Os(code);
        }
        match e.kind() {
            ErrorKind::UnexpectedEof => RexIOError::UnexpectedEof,
            ErrorKind::InvalidInput => RexIOError::Invalid("invalid input"),
            ErrorKind::Unsupported => RexIOError::Unsupported,
            _ => RexIOError::Other("io error"),
        }
    }
}
