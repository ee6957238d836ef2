//! Fatal-error path
//!
//! Every crash carries the `file:line` of the call site that reported it.
//! Contract violations inside the engines use the caller's location through
//! `#[track_caller]`; runtime entry points take an explicit
//! [`SourceLocation`] supplied by generated code.
//!
//! A crash is a panic. Release builds of the workspace set
//! `panic = "abort"`, so there it terminates the process; hosts linking the
//! static library must build with the same setting. Test and dev builds
//! unwind so `#[should_panic]` can observe the diagnostic.

use std::fmt;

/// Caller-supplied source position for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
}

impl SourceLocation {
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }

    /// Location of the (tracked) caller.
    #[track_caller]
    pub fn caller() -> Self {
        let location = std::panic::Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Build a [`SourceLocation`] for the current file and line.
#[macro_export]
macro_rules! source_location {
    () => {
        $crate::terminator::SourceLocation::new(file!(), line!())
    };
}

/// Reports fatal errors against one source location.
#[derive(Debug, Clone, Copy)]
pub struct Terminator {
    location: SourceLocation,
}

impl Terminator {
    pub fn new(location: SourceLocation) -> Self {
        Self { location }
    }

    /// Terminator for the (tracked) caller's location.
    #[track_caller]
    pub fn here() -> Self {
        Self::new(SourceLocation::caller())
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }

    /// Log and terminate. Never returns; see the module docs for how the
    /// panic strategy decides between unwinding and process abort.
    pub fn crash(&self, message: impl fmt::Display) -> ! {
        tracing::error!(location = %self.location, "fatal: {message}");
        panic!("{message} at {}", self.location);
    }

    /// Crash unless `condition` holds.
    pub fn check(&self, condition: bool, message: impl fmt::Display) {
        if !condition {
            self.crash(message);
        }
    }
}
