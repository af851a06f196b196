//! Output dispatch: admission gate, serial lines and reconnect.
//!
//! Lines written to the controller:
//! - `<token>,<status>,<hh:mm:ss AM/PM>` for committed transitions
//! - `TIME,-1,Checkout at <HH:MM>` inside the too-soon window
//!
//! The wait outcome emits nothing. A failed write closes the channel and
//! blocks until an endpoint accepts a connection again.

use crate::channel::{ChannelConnector, LineChannel};
use crate::clock::LocalZone;
use crate::session::{Decision, Outcome};
use crate::store::{AppendOutcome, RecordSink};
use crate::{Error, Result};
use std::time::{Duration, Instant};

/// Device-wide throttle on how often any scan is admitted
#[derive(Debug)]
pub struct AdmissionGate {
    interval: Duration,
    next_allowed: Option<Instant>,
}

impl AdmissionGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_allowed: None,
        }
    }

    pub fn is_open(&self, now: Instant) -> bool {
        self.next_allowed.map_or(true, |next| now >= next)
    }

    /// Close the gate for one interval starting at `now`
    pub fn arm(&mut self, now: Instant) {
        self.next_allowed = Some(now + self.interval);
    }
}

/// Serial line for a decision, if it produces one
pub fn output_line(decision: &Decision, zone: &LocalZone) -> Option<String> {
    match decision.outcome {
        Outcome::TooSoon { next_checkout_at } => Some(format!(
            "TIME,-1,Checkout at {}\n",
            zone.checkout_time(next_checkout_at)
        )),
        Outcome::Wait => None,
        _ => decision.record.as_ref().map(|record| {
            format!(
                "{},{},{}\n",
                record.token,
                record.status.code(),
                zone.line_time(decision.decided_at)
            )
        }),
    }
}

/// Rate-gated line emitter with automatic reconnect
pub struct OutputDispatcher<C: ChannelConnector> {
    connector: C,
    channel: Option<Box<dyn LineChannel>>,
    reconnect_interval: Duration,
    zone: LocalZone,
}

impl<C: ChannelConnector> OutputDispatcher<C> {
    pub fn new(connector: C, reconnect_interval: Duration, zone: LocalZone) -> Self {
        Self {
            connector,
            channel: None,
            reconnect_interval,
            zone,
        }
    }

    pub fn zone(&self) -> &LocalZone {
        &self.zone
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Probe endpoints in enumeration order until one opens
    ///
    /// Blocks, retrying every reconnect interval, until a channel is up.
    pub fn connect_blocking(&mut self) {
        if self.channel.is_some() {
            return;
        }
        loop {
            if let Some(channel) = self.try_connect() {
                tracing::info!("Connected to channel {}", channel.name());
                self.channel = Some(channel);
                return;
            }
            tracing::warn!(
                "No channel endpoint available, retrying in {:?}",
                self.reconnect_interval
            );
            std::thread::sleep(self.reconnect_interval);
        }
    }

    fn try_connect(&self) -> Option<Box<dyn LineChannel>> {
        let endpoints = match self.connector.endpoints() {
            Ok(endpoints) => endpoints,
            Err(e) => {
                tracing::warn!("Cannot enumerate channel endpoints: {}", e);
                return None;
            }
        };
        endpoints.iter().find_map(|endpoint| match self.connector.open(endpoint) {
            Ok(channel) => Some(channel),
            Err(e) => {
                tracing::debug!("Endpoint {} refused: {}", endpoint, e);
                None
            }
        })
    }

    fn reconnect(&mut self, cause: &Error) {
        tracing::warn!("Channel disconnected ({}), reconnecting", cause);
        self.channel = None;
        self.connect_blocking();
    }

    /// Write one line, reconnecting and retrying once on failure
    pub fn send(&mut self, line: &str) -> Result<()> {
        self.connect_blocking();
        let first = match self.channel.as_mut() {
            Some(channel) => channel.write_line(line),
            None => Err(Error::Channel("no channel".into())),
        };
        let err = match first {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        self.reconnect(&err);
        match self.channel.as_mut() {
            Some(channel) => channel.write_line(line),
            None => Err(err),
        }
    }

    /// Buffered control lines from the controller, never blocking on input
    pub fn drain_control_lines(&mut self) -> Vec<String> {
        self.connect_blocking();
        let drained = match self.channel.as_mut() {
            Some(channel) => channel.drain_lines(),
            None => return Vec::new(),
        };
        match drained {
            Ok(lines) => lines,
            Err(e) => {
                self.reconnect(&e);
                Vec::new()
            }
        }
    }

    /// Emit a finalized decision and persist its record
    ///
    /// The line goes out first, then the record is appended. A record is
    /// appended even when the line could not be delivered; the channel
    /// error is still reported to the caller.
    pub fn dispatch(
        &mut self,
        decision: &Decision,
        sink: &mut dyn RecordSink,
    ) -> Result<Option<AppendOutcome>> {
        let sent = match output_line(decision, &self.zone) {
            Some(line) => self.send(&line),
            None => Ok(()),
        };
        let appended = decision.record.as_ref().map(|record| sink.append(record));
        sent?;
        Ok(appended)
    }
}
