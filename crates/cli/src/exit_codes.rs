//! CLI Exit Code Registry
//!
//! Single source of truth for `gstaudit` exit codes. Scripts and CI jobs
//! branch on these, so a code never changes meaning once released.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 2    | Usage error (bad arguments, conflicting flags)       |
//! | 3    | Input could not be read or parsed                    |
//! | 4    | Config file invalid                                  |
//! | 5    | Export could not be produced or written              |
//! | 6    | High-risk findings present (`--fail-on-high`)        |

/// Success - command completed.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, conflicting options.
/// clap exits with 2 on its own parse failures; this matches it.
pub const EXIT_USAGE: u8 = 2;

/// Input file missing, unreadable, or not a valid payload.
pub const EXIT_INPUT: u8 = 3;

/// Config file failed TOML parsing or validation.
pub const EXIT_INVALID_CONFIG: u8 = 4;

/// CSV/JSON export failed, or the output file could not be written.
pub const EXIT_EXPORT: u8 = 5;

/// At least one HIGH-band record or vendor was found and the caller asked
/// for a failing exit (`--fail-on-high`). Output is still written.
pub const EXIT_HIGH_RISK: u8 = 6;
