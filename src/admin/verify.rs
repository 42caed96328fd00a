use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::{broken_invariant, Result};
use crate::storage::link::Target;
use crate::storage::{BacklinkColumn, Group, LinkColumn, LinkKind, Table};

const MAX_FINDINGS: usize = 32;

/// Specifies the depth of verification checks to perform.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyLevel {
    /// Schema pairing, bindings and row-key bookkeeping only.
    Fast,
    /// Additionally compares every forward reference against the backlink multisets.
    #[default]
    Full,
}

/// Indicates the severity level of a verification finding.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifySeverity {
    /// Non-critical issue that may indicate a problem.
    Warning,
    /// The link graph is inconsistent.
    Error,
}

/// Represents a single issue discovered during verification.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyFinding {
    /// The severity level of this finding.
    pub severity: VerifySeverity,
    /// Human-readable description of the issue.
    pub message: String,
}

impl VerifyFinding {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: VerifySeverity::Error,
            message: message.into(),
        }
    }
}

/// Statistics collected during the verification process.
#[derive(Clone, Debug, Default, Serialize)]
pub struct VerifyCounts {
    /// Tables examined.
    pub tables: u64,
    /// Rows across all tables.
    pub rows: u64,
    /// Link columns examined.
    pub link_columns: u64,
    /// Live forward references (one per list occurrence).
    pub forward_refs: u64,
    /// Backlink tuples across all backlink columns.
    pub backlink_entries: u64,
    /// References to primary keys without a row.
    pub unresolved_refs: u64,
}

/// Complete report of a verification operation.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyReport {
    /// The verification level that was performed.
    pub level: VerifyLevel,
    /// Whether verification passed without finding any issues.
    pub success: bool,
    /// List of issues discovered during verification (capped).
    pub findings: Vec<VerifyFinding>,
    /// Statistics about the data structures examined.
    pub counts: VerifyCounts,
}

impl VerifyReport {
    /// Converts a failed report into a [`crate::LinkError::BrokenInvariant`].
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let first = self
            .findings
            .first()
            .map(|finding| finding.message.clone())
            .unwrap_or_default();
        Err(broken_invariant(format!(
            "verification failed with {} finding(s): {first}",
            self.findings.len()
        )))
    }
}

/// Verifies that every link column and its backlink column agree.
///
/// `VerifyLevel::Fast` checks bindings, column pairing and row bookkeeping.
/// `VerifyLevel::Full` also checks that, for every link column, the multiset of
/// (origin row, target row) pairs stored forward equals the one stored in the backlink
/// column, and that every live target names an existing slot.
pub fn verify(group: &Group, level: VerifyLevel) -> VerifyReport {
    let mut findings = Vec::new();
    let mut counts = VerifyCounts::default();

    for table in group.tables() {
        counts.tables += 1;
        counts.rows += table.len() as u64;
        check_row_keys(table, &mut findings);
        for backlink in table.backlinks() {
            counts.backlink_entries += backlink.total() as u64;
            check_backlink_pairing(group, table, backlink, &mut findings);
        }
        for link in table.links() {
            counts.link_columns += 1;
            let Some(backlink) = check_link_pairing(group, table, link, &mut findings) else {
                continue;
            };
            if level == VerifyLevel::Full {
                run_link_checks(group, table, link, backlink, &mut counts, &mut findings);
            }
        }
    }

    VerifyReport {
        level,
        success: findings.is_empty(),
        findings,
        counts,
    }
}

fn check_row_keys(table: &Table, findings: &mut Vec<VerifyFinding>) {
    for (slot, &row) in table.row_keys().iter().enumerate() {
        if table.slot_of(row) != Some(slot) {
            push_error(
                findings,
                format!("table '{}' maps row {row} to the wrong slot", table.name()),
            );
        }
    }
}

fn check_backlink_pairing(
    group: &Group,
    table: &Table,
    backlink: &BacklinkColumn,
    findings: &mut Vec<VerifyFinding>,
) {
    if backlink.len() != table.len() {
        push_error(
            findings,
            format!(
                "backlink column {} of '{}' has {} rows, table has {}",
                backlink.key(),
                table.name(),
                backlink.len(),
                table.len()
            ),
        );
    }
    let Some(origin) = backlink.origin_column() else {
        push_error(
            findings,
            format!("backlink column {} of '{}' is unbound", backlink.key(), table.name()),
        );
        return;
    };
    match group.link_column(origin) {
        Ok(link)
            if link.target_table() == Some(table.key())
                && link.backlink_column() == Some(backlink.key()) => {}
        _ => push_error(
            findings,
            format!(
                "backlink column {} of '{}' mirrors {origin}, which does not point back",
                backlink.key(),
                table.name()
            ),
        ),
    }
}

fn check_link_pairing<'g>(
    group: &'g Group,
    table: &Table,
    link: &LinkColumn,
    findings: &mut Vec<VerifyFinding>,
) -> Option<&'g BacklinkColumn> {
    if link.len() != table.len() {
        push_error(
            findings,
            format!(
                "link column '{}.{}' has {} rows, table has {}",
                table.name(),
                link.name(),
                link.len(),
                table.len()
            ),
        );
        return None;
    }
    let (Some(target), Some(backlink)) = (link.target_table(), link.backlink_column()) else {
        push_error(
            findings,
            format!("link column '{}.{}' is not fully bound", table.name(), link.name()),
        );
        return None;
    };
    let paired = group
        .table(target)
        .ok()
        .and_then(|target| target.backlink(backlink).ok())
        .filter(|column| column.origin_column() == Some(link.column_ref()));
    if paired.is_none() {
        push_error(
            findings,
            format!(
                "link column '{}.{}' has no matching backlink column on table {target}",
                table.name(),
                link.name()
            ),
        );
    }
    paired
}

fn run_link_checks(
    group: &Group,
    table: &Table,
    link: &LinkColumn,
    backlink: &BacklinkColumn,
    counts: &mut VerifyCounts,
    findings: &mut Vec<VerifyFinding>,
) {
    let target_len = backlink.len();
    let mut forward: FxHashMap<(usize, usize), i64> = FxHashMap::default();

    for origin_row in 0..table.len() {
        let targets = link.targets(origin_row);
        if link.kind() == LinkKind::Set && targets.windows(2).any(|pair| pair[0] >= pair[1]) {
            push_error(
                findings,
                format!(
                    "link set '{}.{}' row {origin_row} is not sorted and unique",
                    table.name(),
                    link.name()
                ),
            );
        }
        for target in targets {
            match target {
                Target::Row(target_row) if target_row >= target_len => push_error(
                    findings,
                    format!(
                        "link column '{}.{}' row {origin_row} names missing slot {target_row}",
                        table.name(),
                        link.name()
                    ),
                ),
                Target::Row(target_row) => {
                    counts.forward_refs += 1;
                    *forward.entry((origin_row, target_row)).or_insert(0) += 1;
                }
                Target::Unresolved(pk) => {
                    counts.unresolved_refs += 1;
                    let resolved = link
                        .target_table()
                        .and_then(|t| group.table(t).ok())
                        .and_then(|t| t.find_primary_key(&pk));
                    if resolved.is_some() {
                        push_error(
                            findings,
                            format!(
                                "link column '{}.{}' row {origin_row} keeps {pk} unresolved \
                                 although the row exists",
                                table.name(),
                                link.name()
                            ),
                        );
                    }
                }
            }
        }
    }

    for target_row in 0..target_len {
        for &origin_row in backlink.origins(target_row) {
            *forward.entry((origin_row, target_row)).or_insert(0) -= 1;
        }
    }

    let mut mismatches: Vec<_> = forward.into_iter().filter(|(_, diff)| *diff != 0).collect();
    mismatches.sort_unstable();
    for ((origin_row, target_row), diff) in mismatches {
        if findings.len() >= MAX_FINDINGS {
            break;
        }
        let detail = if diff > 0 {
            format!("{diff} forward reference(s) without backlink")
        } else {
            format!("{} backlink tuple(s) without forward reference", -diff)
        };
        push_error(
            findings,
            format!(
                "link column '{}.{}': origin row {origin_row} -> target row {target_row}: {detail}",
                table.name(),
                link.name()
            ),
        );
    }
}

fn push_error(findings: &mut Vec<VerifyFinding>, message: impl Into<String>) {
    if findings.len() < MAX_FINDINGS {
        findings.push(VerifyFinding::error(message));
    }
}
