//! In-memory ledger of tokens currently checked in.
//!
//! The ledger is never persisted directly. Its truth is always
//! re-derivable from the record log with [`TokenLedger::from_records`].

use crate::session::LedgerChange;
use crate::{CheckStatus, ScanRecord, Token};
use std::collections::{HashMap, HashSet};

/// Token -> epoch of its last (re-)check-in
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenLedger {
    entries: HashMap<Token, i64>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a chronologically ordered record slice
    ///
    /// Only the newest `window` records are considered. Scanning newest
    /// first, the first record seen for a token is authoritative: a
    /// check-in puts the token in the ledger, a checkout leaves it out.
    pub fn from_records(records: &[ScanRecord], window: usize) -> Self {
        let start = records.len().saturating_sub(window);
        let mut seen = HashSet::new();
        let mut entries = HashMap::new();

        for record in records[start..].iter().rev() {
            if !seen.insert(record.token.clone()) {
                continue;
            }
            if record.status == CheckStatus::CheckedIn {
                entries.insert(record.token.clone(), record.epoch);
            }
        }

        tracing::debug!(
            "Rebuilt ledger with {} checked-in tokens from {} records",
            entries.len(),
            records.len() - start
        );
        Self { entries }
    }

    pub fn checked_in_at(&self, token: &Token) -> Option<i64> {
        self.entries.get(token).copied()
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.entries.contains_key(token)
    }

    pub fn check_in(&mut self, token: Token, epoch: i64) {
        self.entries.insert(token, epoch);
    }

    /// Idempotent when the token is absent
    pub fn check_out(&mut self, token: &Token) {
        self.entries.remove(token);
    }

    /// Commit a decision's change for `token`
    pub fn apply(&mut self, token: &Token, change: LedgerChange) {
        match change {
            LedgerChange::CheckIn(epoch) => self.check_in(token.clone(), epoch),
            LedgerChange::CheckOut => self.check_out(token),
            LedgerChange::Unchanged => {}
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by check-in time, oldest first
    pub fn sorted_entries(&self) -> Vec<(&Token, i64)> {
        let mut entries: Vec<_> = self.entries.iter().map(|(t, e)| (t, *e)).collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(c: char) -> Token {
        Token::parse(&c.to_string().repeat(22)).unwrap()
    }

    fn record(t: &Token, status: CheckStatus, epoch: i64) -> ScanRecord {
        ScanRecord::new(t.clone(), "Hall A", status, epoch)
    }

    #[test]
    fn test_checkout_after_checkin_leaves_token_out() {
        let t = token('T');
        let records = vec![
            record(&t, CheckStatus::CheckedIn, 0),
            record(&t, CheckStatus::CheckedOut, 50),
        ];
        let ledger = TokenLedger::from_records(&records, 800);
        assert!(!ledger.contains(&t));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_single_checkin_is_restored() {
        let t = token('T');
        let ledger = TokenLedger::from_records(&[record(&t, CheckStatus::CheckedIn, 0)], 800);
        assert_eq!(ledger.checked_in_at(&t), Some(0));
    }

    #[test]
    fn test_latest_recheckin_wins() {
        let t = token('T');
        let records = vec![
            record(&t, CheckStatus::CheckedIn, 0),
            record(&t, CheckStatus::CheckedIn, 10),
        ];
        let ledger = TokenLedger::from_records(&records, 800);
        assert_eq!(ledger.checked_in_at(&t), Some(10));
    }

    #[test]
    fn test_checkin_after_checkout_is_restored() {
        let t = token('T');
        let records = vec![
            record(&t, CheckStatus::CheckedIn, 0),
            record(&t, CheckStatus::CheckedOut, 700),
            record(&t, CheckStatus::CheckedIn, 900),
        ];
        let ledger = TokenLedger::from_records(&records, 800);
        assert_eq!(ledger.checked_in_at(&t), Some(900));
    }

    #[test]
    fn test_window_drops_oldest_records() {
        let a = token('A');
        let b = token('B');
        let records = vec![
            record(&a, CheckStatus::CheckedIn, 0),
            record(&b, CheckStatus::CheckedIn, 1),
            record(&b, CheckStatus::CheckedOut, 2),
        ];
        let ledger = TokenLedger::from_records(&records, 2);
        assert!(!ledger.contains(&a));
        assert!(!ledger.contains(&b));
    }

    #[test]
    fn test_apply_changes() {
        let t = token('T');
        let mut ledger = TokenLedger::new();
        ledger.apply(&t, LedgerChange::CheckIn(5));
        assert_eq!(ledger.checked_in_at(&t), Some(5));
        ledger.apply(&t, LedgerChange::Unchanged);
        assert_eq!(ledger.checked_in_at(&t), Some(5));
        ledger.apply(&t, LedgerChange::CheckOut);
        assert!(!ledger.contains(&t));
        ledger.apply(&t, LedgerChange::CheckOut);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_sorted_entries() {
        let mut ledger = TokenLedger::new();
        ledger.check_in(token('B'), 20);
        ledger.check_in(token('A'), 10);
        let entries = ledger.sorted_entries();
        assert_eq!(entries[0].1, 10);
        assert_eq!(entries[1].1, 20);
    }
}
