#![forbid(unsafe_code)]

//! Maintenance utilities for link graphs.
//!
//! Verification walks every link column and its backlink column and reports any
//! disagreement between the two halves of a link relation.

mod verify;

/// Link graph integrity verification.
///
/// Verifies column pairing and forward/backlink agreement and reports any issues found.
pub use verify::{verify, VerifyCounts, VerifyFinding, VerifyLevel, VerifyReport, VerifySeverity};
