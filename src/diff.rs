use std::collections::HashSet;

use crate::schema::PROJECTION;
use crate::types::AuctionRecord;

/// The declared diff key: the record's relevant fields, in catalog order.
pub fn project(record: &AuctionRecord) -> Vec<String> {
    PROJECTION.iter().map(|&idx| record.field(idx).to_string()).collect()
}

/// Records of `today` whose projection never appeared in `yesterday`, in
/// today's original order. Set membership on the projection only: a record
/// whose other fields changed is not new.
pub fn new_records(yesterday: &[AuctionRecord], today: &[AuctionRecord]) -> Vec<AuctionRecord> {
    let seen: HashSet<Vec<String>> = yesterday.iter().map(project).collect();
    today
        .iter()
        .filter(|r| !seen.contains(&project(r)))
        .cloned()
        .collect()
}
