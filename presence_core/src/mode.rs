//! Forced-mode override driven by the external controller.
//!
//! The controller sends `MODE:0` (force checkout) or `MODE:1` (force
//! check-in) lines on the serial channel. Every poll drains whatever is
//! buffered and keeps the last valid line; the mode is sticky otherwise.

use crate::session::{Decision, Outcome, SessionEngine};
use crate::ForcedMode;

/// Parse one control line, ignoring anything that is not a mode line
pub fn parse_mode_line(line: &str) -> Option<ForcedMode> {
    let value = line.trim().strip_prefix("MODE:")?;
    match value.trim() {
        "0" => Some(ForcedMode::CheckOut),
        "1" => Some(ForcedMode::CheckIn),
        _ => None,
    }
}

/// Owner of the device-wide forced mode
#[derive(Debug, Default)]
pub struct ModeOverrideController {
    mode: ForcedMode,
}

impl ModeOverrideController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ForcedMode {
        self.mode
    }

    /// Fold a batch of buffered control lines into the current mode
    pub fn poll<I, S>(&mut self, lines: I) -> ForcedMode
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let latest = lines
            .into_iter()
            .filter_map(|line| parse_mode_line(line.as_ref()))
            .last();

        if let Some(mode) = latest {
            if mode != self.mode {
                tracing::info!("Forced mode changed: {:?} -> {:?}", self.mode, mode);
            }
            self.mode = mode;
        }
        self.mode
    }

    /// Reinterpret a decision under the current mode
    ///
    /// A pinned mode always yields status 0 or 1 and the matching ledger
    /// change. A record (and so a serial line) only exists when the engine
    /// itself committed a transition; it is re-stamped with the forced status.
    pub fn apply(&self, engine: &SessionEngine, decision: Decision, now: i64) -> Decision {
        let outcome = match self.mode {
            ForcedMode::Unset => return decision,
            ForcedMode::CheckOut => Outcome::CheckedOut,
            ForcedMode::CheckIn if decision.existed => Outcome::Rechecked,
            ForcedMode::CheckIn => Outcome::CheckedIn,
        };
        if outcome != decision.outcome {
            tracing::debug!(
                "Forced mode {:?} overrides {:?} for {}",
                self.mode,
                decision.outcome,
                decision.token
            );
        }
        let mut forced = engine.decide(&decision.token, outcome, decision.existed, now);
        if decision.record.is_none() {
            forced.record = None;
        }
        forced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::LedgerChange;
    use crate::{CheckStatus, Token, TokenLedger};

    fn token() -> Token {
        Token::parse("MMMMMMMMMMMMMMMMMMMMMM").unwrap()
    }

    #[test]
    fn test_parse_mode_line() {
        assert_eq!(parse_mode_line("MODE:0"), Some(ForcedMode::CheckOut));
        assert_eq!(parse_mode_line("MODE:1\r\n"), Some(ForcedMode::CheckIn));
        assert_eq!(parse_mode_line("MODE: 1"), Some(ForcedMode::CheckIn));
        assert_eq!(parse_mode_line("MODE:2"), None);
        assert_eq!(parse_mode_line("mode:1"), None);
        assert_eq!(parse_mode_line("hello"), None);
    }

    #[test]
    fn test_poll_last_line_wins_and_is_sticky() {
        let mut controller = ModeOverrideController::new();
        assert_eq!(controller.mode(), ForcedMode::Unset);

        let mode = controller.poll(["MODE:1", "noise", "MODE:0", "MODE:9"]);
        assert_eq!(mode, ForcedMode::CheckOut);

        let mode = controller.poll(Vec::<String>::new());
        assert_eq!(mode, ForcedMode::CheckOut);

        let mode = controller.poll(["garbage"]);
        assert_eq!(mode, ForcedMode::CheckOut);

        let mode = controller.poll(["MODE:1"]);
        assert_eq!(mode, ForcedMode::CheckIn);
    }

    #[test]
    fn test_unset_passes_through() {
        let engine = SessionEngine::new("Hall A", 5, 600);
        let mut ledger = TokenLedger::new();
        ledger.check_in(token(), 0);
        let decision = engine.evaluate(&ledger, &token(), 2);
        let applied = ModeOverrideController::new().apply(&engine, decision.clone(), 2);
        assert_eq!(applied, decision);
    }

    #[test]
    fn test_force_checkout_dominates_any_ledger_state() {
        let engine = SessionEngine::new("Hall A", 5, 600);
        let mut controller = ModeOverrideController::new();
        controller.poll(["MODE:0"]);

        // absent token
        let mut ledger = TokenLedger::new();
        let d = controller.apply(&engine, engine.evaluate(&ledger, &token(), 10), 10);
        ledger.apply(&token(), d.change);
        assert_eq!((d.status(), d.message()), (0, "Checked out"));
        assert!(!ledger.contains(&token()));
        assert_eq!(d.record.unwrap().status, CheckStatus::CheckedOut);

        // token in the wait window: ledger follows the mode, nothing is recorded
        ledger.check_in(token(), 8);
        let d = controller.apply(&engine, engine.evaluate(&ledger, &token(), 10), 10);
        ledger.apply(&token(), d.change);
        assert_eq!(d.status(), 0);
        assert!(d.record.is_none());
        assert!(!ledger.contains(&token()));
    }

    #[test]
    fn test_force_checkin_dominates_any_ledger_state() {
        let engine = SessionEngine::new("Hall A", 5, 600);
        let mut controller = ModeOverrideController::new();
        controller.poll(["MODE:1"]);

        let mut ledger = TokenLedger::new();
        let d = controller.apply(&engine, engine.evaluate(&ledger, &token(), 10), 10);
        assert_eq!(d.message(), "Checked in");
        ledger.apply(&token(), d.change);
        assert_eq!(ledger.checked_in_at(&token()), Some(10));

        // too-soon window never survives an override
        let d = controller.apply(&engine, engine.evaluate(&ledger, &token(), 400), 400);
        assert_eq!((d.status(), d.message()), (1, "Rechecked in"));
        assert_eq!(d.next_checkout_at(), None);
        assert_eq!(d.change, LedgerChange::CheckIn(400));
        assert!(d.record.is_none());

        // past duration would have checked out
        let d = controller.apply(&engine, engine.evaluate(&ledger, &token(), 5_000), 5_000);
        ledger.apply(&token(), d.change);
        assert_eq!(d.status(), 1);
        assert_eq!(d.record.unwrap().status, CheckStatus::CheckedIn);
        assert_eq!(ledger.checked_in_at(&token()), Some(5_000));
    }
}
