//! Status codes and the status/abort reporting mode

use crate::error::DescriptorError;
use crate::terminator::{SourceLocation, Terminator};

pub const STAT_OK: i32 = 0;
pub const CFI_ERROR_BASE_ADDR_NULL: i32 = 1;
pub const CFI_ERROR_BASE_ADDR_NOT_NULL: i32 = 2;
pub const CFI_INVALID_ELEM_LEN: i32 = 3;
pub const CFI_INVALID_RANK: i32 = 4;
pub const CFI_INVALID_TYPE: i32 = 5;
pub const CFI_INVALID_ATTRIBUTE: i32 = 6;
pub const CFI_INVALID_EXTENT: i32 = 7;
pub const CFI_INVALID_DESCRIPTOR: i32 = 8;
pub const CFI_ERROR_MEM_ALLOCATION: i32 = 9;
pub const CFI_ERROR_OUT_OF_BOUNDS: i32 = 10;
/// Runtime extension: deallocating a pointer that does not own its target
pub const STAT_BAD_POINTER_DEALLOCATION: i32 = 110;

/// How a fallible runtime operation reports failure
#[derive(Debug, Default)]
pub enum StatMode<'a> {
    /// Crash with a diagnostic (no `STAT=` specifier)
    #[default]
    Abort,
    /// Return the status code; write the message into the buffer when given
    /// (`STAT=` with optional `ERRMSG=`)
    Report(Option<&'a mut [u8]>),
}

impl<'a> StatMode<'a> {
    pub fn report() -> Self {
        StatMode::Report(None)
    }

    pub fn report_into(errmsg: &'a mut [u8]) -> Self {
        StatMode::Report(Some(errmsg))
    }

    pub fn has_stat(&self) -> bool {
        matches!(self, StatMode::Report(_))
    }

    /// Convert an operation outcome to a status code.
    ///
    /// # Panics
    ///
    /// In abort mode, on any error.
    pub fn finish(self, result: crate::Result<()>, location: SourceLocation) -> i32 {
        match result {
            Ok(()) => STAT_OK,
            Err(err) => self.fail(&err, location),
        }
    }

    fn fail(self, err: &DescriptorError, location: SourceLocation) -> i32 {
        match self {
            StatMode::Abort => Terminator::new(location).crash(err),
            StatMode::Report(errmsg) => {
                let stat = err.stat();
                tracing::warn!(stat, %location, error = %err, "descriptor operation failed");
                if let Some(buffer) = errmsg {
                    fill_errmsg(buffer, &err.to_string());
                }
                stat
            }
        }
    }
}

/// Copy `message` into a fixed-length character buffer: truncated when too
/// long, blank padded when short.
pub fn fill_errmsg(buffer: &mut [u8], message: &str) {
    let bytes = message.as_bytes();
    let copied = bytes.len().min(buffer.len());
    buffer[..copied].copy_from_slice(&bytes[..copied]);
    buffer[copied..].fill(b' ');
}
