//! Session engine: turns "token scanned at time T" into a decision.
//!
//! `evaluate` is pure. It reads the ledger and returns the change to
//! commit; the caller applies it with [`TokenLedger::apply`].
//!
//! Windows of `elapsed = now - last_checkin`, tested in this order:
//! 1. `elapsed >= duration` -> checkout
//! 2. `duration/2 <= elapsed < duration` -> too soon (report checkout time)
//! 3. `elapsed <= cooldown` -> wait
//! 4. otherwise -> re-check-in

use crate::config::DeviceConfig;
use crate::{CheckStatus, ScanRecord, Token, TokenLedger};

/// What a scan resolved to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    CheckedIn,
    Rechecked,
    CheckedOut,
    TooSoon { next_checkout_at: i64 },
    Wait,
}

impl Outcome {
    /// Wire status: 1, 0 or -1
    pub fn status(&self) -> i8 {
        match self {
            Outcome::CheckedIn | Outcome::Rechecked => 1,
            Outcome::CheckedOut => 0,
            Outcome::TooSoon { .. } | Outcome::Wait => -1,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Outcome::CheckedIn => "Checked in",
            Outcome::Rechecked => "Rechecked in",
            Outcome::CheckedOut => "Checked out",
            Outcome::TooSoon { .. } => "Too soon to checkout",
            Outcome::Wait => "Wait...",
        }
    }

    /// Status to persist, if this outcome is a committed transition
    pub fn committed(&self) -> Option<CheckStatus> {
        match self {
            Outcome::CheckedIn | Outcome::Rechecked => Some(CheckStatus::CheckedIn),
            Outcome::CheckedOut => Some(CheckStatus::CheckedOut),
            Outcome::TooSoon { .. } | Outcome::Wait => None,
        }
    }
}

/// Ledger mutation a decision carries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerChange {
    CheckIn(i64),
    CheckOut,
    Unchanged,
}

/// Result of evaluating one scan
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub token: Token,
    pub outcome: Outcome,
    /// Whether the token was in the ledger before this scan
    pub existed: bool,
    pub change: LedgerChange,
    pub record: Option<ScanRecord>,
    pub decided_at: i64,
}

impl Decision {
    pub fn status(&self) -> i8 {
        self.outcome.status()
    }

    pub fn message(&self) -> &'static str {
        self.outcome.message()
    }

    pub fn next_checkout_at(&self) -> Option<i64> {
        match self.outcome {
            Outcome::TooSoon { next_checkout_at } => Some(next_checkout_at),
            _ => None,
        }
    }
}

/// Decision rules for one device
#[derive(Clone, Debug)]
pub struct SessionEngine {
    location: String,
    cooldown: i64,
    duration: i64,
}

impl SessionEngine {
    pub fn new(location: impl Into<String>, cooldown_secs: u64, duration_secs: u64) -> Self {
        Self {
            location: location.into(),
            cooldown: i64::try_from(cooldown_secs).unwrap_or(i64::MAX),
            duration: i64::try_from(duration_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn from_config(device: &DeviceConfig) -> Self {
        Self::new(device.location.clone(), device.scan_cooldown, device.stay_duration)
    }

    /// Decide what a scan of `token` at `now` means
    pub fn evaluate(&self, ledger: &TokenLedger, token: &Token, now: i64) -> Decision {
        let last_checkin = ledger.checked_in_at(token);
        let outcome = match last_checkin {
            None => Outcome::CheckedIn,
            Some(last) => self.classify(last, now),
        };
        self.decide(token, outcome, last_checkin.is_some(), now)
    }

    fn classify(&self, last_checkin: i64, now: i64) -> Outcome {
        let elapsed = now.saturating_sub(last_checkin);
        if elapsed >= self.duration {
            return Outcome::CheckedOut;
        }

        let remaining = self.duration - elapsed;
        // remaining <= duration / 2 without losing the odd half second
        if remaining > 0 && remaining.saturating_mul(2) <= self.duration {
            return Outcome::TooSoon {
                next_checkout_at: last_checkin.saturating_add(self.duration),
            };
        }

        if elapsed <= self.cooldown {
            Outcome::Wait
        } else {
            Outcome::Rechecked
        }
    }

    /// Build a decision for an outcome, deriving its ledger change and record
    pub(crate) fn decide(&self, token: &Token, outcome: Outcome, existed: bool, now: i64) -> Decision {
        let change = match outcome {
            Outcome::CheckedIn | Outcome::Rechecked => LedgerChange::CheckIn(now),
            Outcome::CheckedOut => LedgerChange::CheckOut,
            Outcome::TooSoon { .. } | Outcome::Wait => LedgerChange::Unchanged,
        };
        let record = outcome
            .committed()
            .map(|status| ScanRecord::new(token.clone(), self.location.clone(), status, now));

        Decision {
            token: token.clone(),
            outcome,
            existed,
            change,
            record,
            decided_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SessionEngine {
        SessionEngine::new("Hall A", 5, 600)
    }

    fn token() -> Token {
        Token::parse("KKKKKKKKKKKKKKKKKKKKKK").unwrap()
    }

    /// Evaluate and commit, the way the kiosk loop does
    fn scan(engine: &SessionEngine, ledger: &mut TokenLedger, t: &Token, now: i64) -> Decision {
        let decision = engine.evaluate(ledger, t, now);
        ledger.apply(t, decision.change);
        decision
    }

    #[test]
    fn test_unseen_token_checks_in() {
        let mut ledger = TokenLedger::new();
        let t = token();
        let d = scan(&engine(), &mut ledger, &t, 1_000);
        assert_eq!(d.status(), 1);
        assert_eq!(d.message(), "Checked in");
        assert!(!d.existed);
        assert_eq!(ledger.checked_in_at(&t), Some(1_000));
        let record = d.record.unwrap();
        assert_eq!(record.status, CheckStatus::CheckedIn);
        assert_eq!(record.epoch, 1_000);
        assert_eq!(record.location, "Hall A");
    }

    #[test]
    fn test_rescan_within_cooldown_waits_without_change() {
        let e = engine();
        let mut ledger = TokenLedger::new();
        let t = token();
        scan(&e, &mut ledger, &t, 0);

        for now in [3, 5] {
            let d = scan(&e, &mut ledger, &t, now);
            assert_eq!(d.outcome, Outcome::Wait);
            assert_eq!(d.message(), "Wait...");
            assert!(d.record.is_none());
            assert_eq!(d.next_checkout_at(), None);
            assert_eq!(ledger.checked_in_at(&t), Some(0));
        }
    }

    #[test]
    fn test_rescan_after_cooldown_rechecks_in() {
        let e = engine();
        let mut ledger = TokenLedger::new();
        let t = token();
        scan(&e, &mut ledger, &t, 0);

        let d = scan(&e, &mut ledger, &t, 6);
        assert_eq!(d.outcome, Outcome::Rechecked);
        assert!(d.existed);
        assert_eq!(ledger.checked_in_at(&t), Some(6));
        assert_eq!(d.record.unwrap().status, CheckStatus::CheckedIn);
    }

    #[test]
    fn test_too_soon_window_bounds() {
        let e = engine();
        let t = token();
        let mut ledger = TokenLedger::new();
        ledger.check_in(t.clone(), 100);

        // elapsed 299 is still re-check-in territory
        assert_eq!(e.evaluate(&ledger, &t, 399).outcome, Outcome::Rechecked);

        for now in [400, 500, 699] {
            let d = e.evaluate(&ledger, &t, now);
            assert_eq!(d.outcome, Outcome::TooSoon { next_checkout_at: 700 });
            assert_eq!(d.change, LedgerChange::Unchanged);
            assert!(d.record.is_none());
        }
    }

    #[test]
    fn test_checkout_at_and_after_duration() {
        let e = engine();
        let t = token();
        for now in [600, 601, 10_000] {
            let mut ledger = TokenLedger::new();
            ledger.check_in(t.clone(), 0);
            let d = scan(&e, &mut ledger, &t, now);
            assert_eq!(d.status(), 0);
            assert_eq!(d.message(), "Checked out");
            assert!(!ledger.contains(&t));
            assert_eq!(d.record.unwrap().status, CheckStatus::CheckedOut);
        }
    }

    #[test]
    fn test_odd_duration_halving() {
        let e = SessionEngine::new("Hall A", 1, 7);
        let t = token();
        let mut ledger = TokenLedger::new();
        ledger.check_in(t.clone(), 0);
        // remaining 4 > 3.5
        assert_eq!(e.evaluate(&ledger, &t, 3).outcome, Outcome::Rechecked);
        // remaining 3 <= 3.5
        assert_eq!(
            e.evaluate(&ledger, &t, 4).outcome,
            Outcome::TooSoon { next_checkout_at: 7 }
        );
    }

    #[test]
    fn test_overlapping_cooldown_prefers_too_soon() {
        // cooldown >= duration/2: first match wins
        let e = SessionEngine::new("Hall A", 400, 600);
        let t = token();
        let mut ledger = TokenLedger::new();
        ledger.check_in(t.clone(), 0);
        assert_eq!(e.evaluate(&ledger, &t, 200).outcome, Outcome::Wait);
        assert_eq!(
            e.evaluate(&ledger, &t, 350).outcome,
            Outcome::TooSoon { next_checkout_at: 600 }
        );
    }

    #[test]
    fn test_full_visit_scenario() {
        let e = engine();
        let t = token();
        let mut ledger = TokenLedger::new();

        let d = scan(&e, &mut ledger, &t, 0);
        assert_eq!((d.status(), d.message()), (1, "Checked in"));

        let d = scan(&e, &mut ledger, &t, 2);
        assert_eq!((d.status(), d.message()), (-1, "Wait..."));

        let d = scan(&e, &mut ledger, &t, 10);
        assert_eq!((d.status(), d.message()), (1, "Rechecked in"));
        assert_eq!(ledger.checked_in_at(&t), Some(10));

        let d = scan(&e, &mut ledger, &t, 350);
        assert_eq!((d.status(), d.message()), (-1, "Too soon to checkout"));
        assert_eq!(d.next_checkout_at(), Some(610));
        assert_eq!(ledger.checked_in_at(&t), Some(10));

        let d = scan(&e, &mut ledger, &t, 650);
        assert_eq!((d.status(), d.message()), (0, "Checked out"));
        assert!(!ledger.contains(&t));
    }
}
