use std::collections::BTreeMap;
use tracing::warn;

use crate::types::{BadLine, RawRow};

/// Rows split by the structural check, bad ones keyed by their original
/// 0-based position.
pub struct ValidatedRows {
    pub good: Vec<RawRow>,
    pub bad: BTreeMap<usize, BadLine>,
}

/// Flags every row whose field count differs from the first row's (the first
/// row is assumed correct). Purely structural; field content is not examined
/// and the run continues with the good rows.
pub fn split_bad_rows(rows: Vec<RawRow>) -> ValidatedRows {
    let reference = rows.first().map(Vec::len).unwrap_or(0);
    let mut good = Vec::with_capacity(rows.len());
    let mut bad = BTreeMap::new();

    for (index, row) in rows.into_iter().enumerate() {
        if row.len() == reference {
            good.push(row);
        } else {
            bad.insert(index, BadLine { index, fields: row });
        }
    }

    if !bad.is_empty() {
        warn!("{} bad lines found", bad.len());
    }
    ValidatedRows { good, bad }
}
