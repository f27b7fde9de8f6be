//! Error Propagation
//!
//! Library and CLI code return `Result` and use `?`; a malformed frame or
//! a dead backend must never take the client down.

use architectural_enforcement::{report, scan, PRODUCTION_DIRS};

#[test]
fn test_no_unwrap_in_production_code() {
    let violations = scan(PRODUCTION_DIRS, &[".unwrap()", ".expect("]);

    report(
        &violations,
        "unwrap()/expect() found in production code!",
        &[
            "Propagate with ? into ClientError / anyhow::Result",
            "unwrap_or / unwrap_or_default / unwrap_or_else for real defaults",
            "Log at warn and discard for malformed inbound data",
        ],
    );
}

#[test]
fn test_no_panic_macros_in_core() {
    let violations = scan(
        &["counsel/core/src"],
        &["panic!(", "todo!(", "unimplemented!("],
    );

    report(
        &violations,
        "Panicking macros found in the client library!",
        &["Return an error variant instead"],
    );
}
