use rust_decimal::Decimal;

use crate::types::AuctionRecord;

/// Flags bids that look too good to be honest: a high bid-to-cost ratio or an
/// outsized absolute bid, on transactions that never reached a terminal state.
pub struct BidClassifier {
    max_bid: Decimal,
    ratio: Decimal,
}

impl BidClassifier {
    pub fn new(max_bid: i64, ratio: i64) -> Self {
        Self {
            max_bid: Decimal::from(max_bid),
            ratio: Decimal::from(ratio),
        }
    }

    /// A paid or cancelled record is never suspicious; the money already
    /// moved or never will.
    pub fn is_suspicious(&self, record: &AuctionRecord) -> bool {
        if record.is_paid() || record.is_cancelled() {
            return false;
        }
        let bid = record.high_bid();
        let cost = record.admin_cost();
        if !cost.is_zero() {
            bid / cost > self.ratio || bid > self.max_bid
        } else {
            bid > self.max_bid
        }
    }

    /// Annotates every record in place; returns how many were flagged.
    pub fn annotate(&self, records: &mut [AuctionRecord]) -> usize {
        let mut flagged = 0;
        for record in records.iter_mut() {
            let suspicious = self.is_suspicious(record);
            record.set_suspicious(suspicious);
            if suspicious {
                flagged += 1;
            }
        }
        flagged
    }
}
