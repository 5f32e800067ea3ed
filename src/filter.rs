use std::collections::HashSet;

use crate::types::AuctionRecord;

/// Drops records whose customer email matches a blacklisted domain or full
/// address. Both sets are matched case-insensitively.
pub struct ExclusionFilter {
    domains: HashSet<String>,
    emails: HashSet<String>,
}

impl ExclusionFilter {
    pub fn new(domains: HashSet<String>, emails: HashSet<String>) -> Self {
        Self { domains, emails }
    }

    /// Exclusion needs a recognizable domain: an email without `@` is kept.
    pub fn is_excluded(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        let Some((_, domain)) = email.split_once('@') else {
            return false;
        };
        self.domains.contains(domain) || self.emails.contains(&email)
    }

    /// Returns the retained records and the count removed.
    pub fn retain(&self, records: Vec<AuctionRecord>) -> (Vec<AuctionRecord>, usize) {
        let before = records.len();
        let kept: Vec<_> = records
            .into_iter()
            .filter(|r| !self.is_excluded(r.email()))
            .collect();
        let removed = before - kept.len();
        (kept, removed)
    }
}
