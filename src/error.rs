//! Process exit codes.

/// Exit codes for the cachecopy binary.
///
/// - 0: the run completed normally
/// - 1: a structural failure aborted the run
/// - 130: interrupted by the user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// The run completed normally.
    Success = 0,
    /// A fatal error aborted the run after best-effort cache persistence.
    GeneralError = 1,
    /// The run was interrupted by the user.
    Interrupted = 130,
}

impl ExitCode {
    /// Numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
