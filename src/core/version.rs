//! Build identity string derivation

use chrono::{DateTime, Utc};

/// Derive the code version string for this build.
///
/// The format combines the committer timestamp (UTC, fixed layout), the
/// first 7 characters of the commit id, and the zero-padded build counter:
/// `2024-03-01-120000-abc1234-000042`. Builds that reuse an earlier build's
/// artifacts must not call this; they copy the referenced build's published
/// version verbatim, since recomputing it would wrongly claim a different
/// artifact.
pub fn build_code_version(
    commit_id: &str,
    committer_time: DateTime<Utc>,
    build_number: u64,
) -> String {
    let short_id = &commit_id[..commit_id.len().min(7)];
    format!(
        "{}-{}-{:06}",
        committer_time.format("%Y-%m-%d-%H%M%S"),
        short_id,
        build_number
    )
}
