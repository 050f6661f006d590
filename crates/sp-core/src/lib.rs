//! Shared pieces of the `sp` command-line front end.

/// Process exit codes for the `sp` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Command completed.
    Clean = 0,
    /// Command ran but failed.
    Failure = 1,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
