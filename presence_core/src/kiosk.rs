//! The kiosk processing loop.
//!
//! One cycle: drain control lines into the forced mode, check the
//! admission gate, take one candidate from the source, validate it,
//! evaluate, apply the override, commit the ledger change, then dispatch
//! the line and record. Only a fatal error stops [`Kiosk::run`].

use crate::channel::ChannelConnector;
use crate::clock::{Clock, LocalZone};
use crate::dispatcher::{AdmissionGate, OutputDispatcher};
use crate::mode::ModeOverrideController;
use crate::session::{Decision, SessionEngine};
use crate::source::TokenSource;
use crate::store::{AppendOutcome, RecordSink};
use crate::{Config, ForcedMode, Result, Token, TokenLedger};
use std::time::{Duration, Instant};

/// What one loop iteration did
#[derive(Debug)]
pub enum CycleOutcome {
    /// No candidate was waiting
    Idle,
    /// A previous scan still holds the admission gate
    Gated,
    /// The candidate was not a token; nothing changed
    Rejected,
    Decided(Decision),
}

/// Everything one device process owns
pub struct Kiosk<C: ChannelConnector, S: RecordSink, K: Clock> {
    engine: SessionEngine,
    ledger: TokenLedger,
    mode: ModeOverrideController,
    dispatcher: OutputDispatcher<C>,
    sink: S,
    gate: AdmissionGate,
    clock: K,
    idle_sleep: Duration,
}

impl<C: ChannelConnector, S: RecordSink, K: Clock> Kiosk<C, S, K> {
    pub fn new(config: &Config, ledger: TokenLedger, connector: C, sink: S, clock: K) -> Self {
        let zone = LocalZone::from_offset_minutes(config.device.utc_offset_minutes);
        Self {
            engine: SessionEngine::from_config(&config.device),
            ledger,
            mode: ModeOverrideController::new(),
            dispatcher: OutputDispatcher::new(connector, config.serial.reconnect_interval(), zone),
            sink,
            gate: AdmissionGate::new(config.gate.admission_interval()),
            clock,
            idle_sleep: config.source.idle_sleep(),
        }
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn forced_mode(&self) -> ForcedMode {
        self.mode.mode()
    }

    /// Run one iteration of the loop
    pub fn run_cycle(&mut self, source: &mut dyn TokenSource) -> Result<CycleOutcome> {
        let control = self.dispatcher.drain_control_lines();
        self.mode.poll(control);

        if !self.gate.is_open(Instant::now()) {
            return Ok(CycleOutcome::Gated);
        }

        let candidate = match source.poll_token() {
            Some(candidate) => candidate,
            None => return Ok(CycleOutcome::Idle),
        };
        let token = match Token::parse(&candidate) {
            Ok(token) => token,
            Err(e) => {
                tracing::debug!("Ignoring scan: {}", e);
                return Ok(CycleOutcome::Rejected);
            }
        };

        let now = self.clock.now();
        let decision = self.engine.evaluate(&self.ledger, &token, now);
        let decision = self.mode.apply(&self.engine, decision, now);
        self.ledger.apply(&token, decision.change);
        self.gate.arm(Instant::now());

        match decision.next_checkout_at() {
            Some(at) => tracing::info!(
                token = %token,
                status = decision.status(),
                "{} | Checkout time: {}",
                decision.message(),
                self.dispatcher.zone().checkout_time(at)
            ),
            None => tracing::info!(
                token = %token,
                status = decision.status(),
                "{} at: {}",
                decision.message(),
                self.dispatcher.zone().line_time(now)
            ),
        }

        if let Some(AppendOutcome::Lost { reason }) =
            self.dispatcher.dispatch(&decision, &mut self.sink)?
        {
            tracing::error!("Running without a durable record for {}: {}", token, reason);
        }
        Ok(CycleOutcome::Decided(decision))
    }

    /// Serve scans until the source is exhausted or a fatal error occurs
    pub fn run(&mut self, source: &mut dyn TokenSource) -> Result<()> {
        self.dispatcher.connect_blocking();
        tracing::info!(
            "Serving scans with {} tokens checked in",
            self.ledger.len()
        );

        loop {
            match self.run_cycle(source) {
                Ok(CycleOutcome::Idle) if source.is_exhausted() => break,
                Ok(CycleOutcome::Idle) | Ok(CycleOutcome::Gated) => {
                    std::thread::sleep(self.idle_sleep);
                }
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    tracing::error!("Fatal error, stopping: {}", e);
                    return Err(e);
                }
                Err(e) => tracing::warn!("Scan cycle failed: {}", e),
            }
        }
        tracing::info!("Token source closed, kiosk shutting down");
        Ok(())
    }
}
