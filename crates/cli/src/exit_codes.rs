//! CLI Exit Code Registry
//!
//! Single source of truth for `tgrid` exit codes. Scripts rely on them.
//!
//! | Code  | Meaning                                        |
//! |-------|------------------------------------------------|
//! | 0     | Success (including the "no data" sentinel)     |
//! | 2     | Usage error (bad arguments)                    |
//! | 3     | Local I/O error (input or output file)         |
//! | 60-65 | Run failures, one per error category           |

/// Success - the run produced a report.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Input file unreadable or output file unwritable.
pub const EXIT_IO: u8 = 3;

// =============================================================================
// Run failures (60-69)
// =============================================================================

/// Host unreachable, auth rejected, non-success status, retries exhausted.
pub const EXIT_SOURCE_UNREACHABLE: u8 = 60;

/// Extension or content signature not accepted.
pub const EXIT_UNSUPPORTED_FORMAT: u8 = 61;

/// Structurally malformed file or response body.
pub const EXIT_PARSE_FAILURE: u8 = 62;

/// Run budget exhausted.
pub const EXIT_TIMEOUT: u8 = 63;

/// Config file failed to parse or validate.
pub const EXIT_CONFIG_INVALID: u8 = 64;

/// Trigger request incomplete (no file, no url, reversed dates).
pub const EXIT_INVALID_REQUEST: u8 = 65;

/// Map a run error category to its exit code.
pub fn category_exit_code(category: &str) -> u8 {
    match category {
        "source_unreachable" => EXIT_SOURCE_UNREACHABLE,
        "unsupported_format" => EXIT_UNSUPPORTED_FORMAT,
        "parse_failure" => EXIT_PARSE_FAILURE,
        "timeout" => EXIT_TIMEOUT,
        "config_invalid" => EXIT_CONFIG_INVALID,
        "invalid_request" => EXIT_INVALID_REQUEST,
        _ => EXIT_USAGE,
    }
}
