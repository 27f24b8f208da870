//! A live game session: board, orchestrator, transport, and inbox.
//!
//! All mutation happens on the thread that owns the [`Session`]. Other
//! threads (a network reader, a file loader, a UI) hold cloned
//! [`SessionHandle`]s and push [`Delivery`]s into an unbounded channel;
//! [`Session::pump`] drains it in arrival order. The orchestrator is never
//! shared, so it needs no lock.
//!
//! # Example
//!
//! ```
//! use rewind_core::prelude::*;
//! use rewind_engine::session::{LoopbackTransport, Session, SessionConfig};
//!
//! let (transport, sent) = LoopbackTransport::new();
//! let mut session = Session::new(GameState::new(), Box::new(transport), SessionConfig::default());
//!
//! session.send_and_log(Command::display_text("hello")).unwrap();
//! assert_eq!(sent.try_recv().unwrap(), "CHAT\thello");
//! assert_eq!(session.state().chat(), ["hello"]);
//! ```

use std::path::Path;

use crossbeam_channel::{Receiver, Sender};
use rewind_core::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dice::{DiceRoll, DiceRoller};
use crate::logfile::save_log_file;
use crate::logger::{BasicLogger, LoadSummary, LoggerConfig, UndoOutcome};
use crate::report::{DataReport, ReportJournal, ReportKind};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Construction-time settings for a [`Session`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub logger: LoggerConfig,
    /// Seed for this participant's dice.
    pub dice_seed: u64,
    /// Namespace for piece ids this participant creates. Must differ
    /// between the participants of one game; 0 is left for board setup.
    pub id_namespace: u16,
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A unit could not be handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport failed: {reason}")]
pub struct TransportError {
    pub reason: String,
}

impl TransportError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Outbound delivery of encoded units to the other participants.
pub trait Transport {
    /// Hand one encoded unit to the peers.
    fn send(&mut self, encoded: &str) -> Result<(), TransportError>;
}

/// Transport that keeps every sent unit on a channel, for offline play and
/// tests.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    sent: Sender<String>,
}

impl LoopbackTransport {
    /// A transport plus the receiver that observes what it sent.
    pub fn new() -> (Self, Receiver<String>) {
        let (sent, observed) = crossbeam_channel::unbounded();
        (Self { sent }, observed)
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, encoded: &str) -> Result<(), TransportError> {
        // Nobody watching is fine for a loopback.
        let _ = self.sent.send(encoded.to_owned());
        Ok(())
    }
}

/// Transport that delivers straight into other in-process sessions.
#[derive(Debug, Clone, Default)]
pub struct PeerTransport {
    peers: Vec<SessionHandle>,
}

impl PeerTransport {
    pub fn new(peers: Vec<SessionHandle>) -> Self {
        Self { peers }
    }

    pub fn add_peer(&mut self, peer: SessionHandle) {
        self.peers.push(peer);
    }
}

impl Transport for PeerTransport {
    fn send(&mut self, encoded: &str) -> Result<(), TransportError> {
        for peer in &self.peers {
            peer.deliver_remote(encoded)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Inbox
// ---------------------------------------------------------------------------

/// Something queued for the owning thread to apply.
#[derive(Debug, Clone)]
pub enum Delivery {
    /// An encoded unit from a peer. Applied with `log`, not re-sent.
    Remote(String),
    /// A unit originated on another local thread. Sent and logged.
    Local(Command),
}

/// Cloneable, `Send` entry point into a [`Session`]'s inbox.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inbox: Sender<Delivery>,
}

impl SessionHandle {
    /// Queue an encoded unit received from a peer.
    pub fn deliver_remote(&self, encoded: &str) -> Result<(), TransportError> {
        self.deliver(Delivery::Remote(encoded.to_owned()))
    }

    /// Queue a locally originated unit.
    pub fn submit(&self, command: Command) -> Result<(), TransportError> {
        self.deliver(Delivery::Local(command))
    }

    fn deliver(&self, delivery: Delivery) -> Result<(), TransportError> {
        self.inbox
            .send(delivery)
            .map_err(|_| TransportError::new("session has shut down"))
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One participant's view of a game.
pub struct Session {
    state: GameState,
    logger: BasicLogger,
    reports: ReportJournal,
    transport: Box<dyn Transport>,
    dice: DiceRoller,
    inbox: Receiver<Delivery>,
    handle: SessionHandle,
}

impl Session {
    pub fn new(
        mut state: GameState,
        transport: Box<dyn Transport>,
        config: SessionConfig,
    ) -> Self {
        let (sender, inbox) = crossbeam_channel::unbounded();
        state.set_id_namespace(config.id_namespace);
        Self {
            state,
            logger: BasicLogger::new(config.logger),
            reports: ReportJournal::new(),
            transport,
            dice: DiceRoller::new(config.dice_seed),
            inbox,
            handle: SessionHandle { inbox: sender },
        }
    }

    /// A new handle for feeding this session from another thread.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn set_transport(&mut self, transport: Box<dyn Transport>) {
        self.transport = transport;
    }

    // -- accessors ----------------------------------------------------------

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn logger(&self) -> &BasicLogger {
        &self.logger
    }

    pub fn reports(&self) -> &ReportJournal {
        &self.reports
    }

    pub fn reports_mut(&mut self) -> &mut ReportJournal {
        &mut self.reports
    }

    // -- origination --------------------------------------------------------

    /// Send `command` to the peers, then log it here.
    ///
    /// The two happen as one step: if the transport refuses the unit,
    /// nothing is logged and the error is returned.
    ///
    /// # Errors
    ///
    /// [`EngineError::Transport`] if sending failed, or
    /// [`EngineError::Core`] if a trigger chain was aborted after logging.
    pub fn send_and_log(&mut self, command: Command) -> Result<(), EngineError> {
        if command.is_null() {
            return Ok(());
        }
        self.send(&command)?;
        let result = self.logger.log(&mut self.state, command.clone());
        self.note_core(result, &command)
    }

    /// Run a game action against the board and send and log its unit.
    ///
    /// If sending fails the action's board changes are reversed and any ids
    /// it allocated are handed back, so the board never holds changes the
    /// peers did not get.
    pub fn perform<F>(&mut self, action: F) -> Result<Command, EngineError>
    where
        F: FnOnce(&mut GameState) -> Command,
    {
        let serial = self.state.next_serial();
        let command = action(&mut self.state);
        if command.is_null() {
            return Ok(command);
        }
        if let Err(e) = self.send(&command) {
            let rollback = command.undo_command();
            if let Err(undo_err) = rollback.execute(&mut self.state, self.logger.guard()) {
                warn!(error = %undo_err, "rollback of unsent action was cut short");
            }
            self.state.restore_next_serial(serial);
            return Err(e);
        }
        let result = self.logger.log(&mut self.state, command.clone());
        self.note_core(result, &command)?;
        Ok(command)
    }

    /// Roll dice for `player` and announce the result to everyone.
    pub fn roll_dice(
        &mut self,
        player: &str,
        count: usize,
        sides: u32,
    ) -> Result<DiceRoll, EngineError> {
        let roll = self.dice.roll(player, count, sides);
        self.send_and_log(roll.to_command())?;
        Ok(roll)
    }

    // -- replay -------------------------------------------------------------

    /// Save the output log to `path`. See [`save_log_file`].
    pub fn save_log(&self, path: impl AsRef<Path>) -> Result<(), anyhow::Error> {
        save_log_file(path, &self.logger)
    }

    /// Install a saved log as the input log. Undecodable lines are reported
    /// and skipped.
    pub fn load_log<I, S>(&mut self, lines: I) -> LoadSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let summary = self.logger.load_input(lines);
        info!(
            loaded = summary.loaded,
            skipped = summary.skipped(),
            "log loaded"
        );
        self.reports.extend(summary.reports.iter().cloned());
        summary
    }

    /// Replay the next input unit and forward it to the peers.
    ///
    /// Returns `Ok(false)` when there is nothing left to replay.
    pub fn step(&mut self) -> Result<bool, EngineError> {
        let Some(next) = self.logger.input().get(self.logger.next_input()) else {
            debug!("step ignored: nothing left to replay");
            return Ok(false);
        };
        let next = next.clone();
        self.send(&next)?;
        let result = self.logger.step(&mut self.state);
        self.note_core(result, &next)
    }

    /// Step until the input log is exhausted.
    ///
    /// A unit whose trigger chain is aborted is reported and replay moves
    /// on. Returns the number of units stepped.
    pub fn replay_all(&mut self) -> Result<usize, EngineError> {
        let mut steps = 0;
        while self.logger.is_replaying() {
            match self.step() {
                Ok(_) => {}
                Err(EngineError::Core(e)) => {
                    debug!(error = %e, "continuing replay after aborted chain");
                }
                Err(e) => return Err(e),
            }
            steps += 1;
        }
        Ok(steps)
    }

    /// Undo the most recent forward entry and tell the peers.
    pub fn undo(&mut self) -> Result<UndoOutcome, EngineError> {
        let Some(target) = self.logger.undo_target() else {
            debug!("undo ignored: nothing to undo");
            return Ok(UndoOutcome::NothingToUndo);
        };
        let marker = Command::undo_of(target.clone());
        self.send(&marker)?;

        let outcome = self.logger.undo(&mut self.state);
        let outcome = self.note_core(outcome, &marker)?;
        if outcome == UndoOutcome::NoInverse {
            self.reports.record(DataReport::new(
                ReportKind::InverseUnavailable,
                "undo had nothing to reverse",
                CommandEncoder.encode(&marker),
            ));
        }
        Ok(outcome)
    }

    // -- inbox --------------------------------------------------------------

    /// Apply everything queued on the inbox, in arrival order.
    ///
    /// Never fails: bad remote data and aborted chains are reported and the
    /// next delivery is processed. Returns the number of deliveries applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(delivery) = self.inbox.try_recv() {
            let result = match delivery {
                Delivery::Remote(encoded) => self.receive(&encoded),
                Delivery::Local(command) => self.send_and_log(command),
            };
            match result {
                Ok(()) => applied += 1,
                Err(e) => debug!(error = %e, "delivery not applied"),
            }
        }
        applied
    }

    fn receive(&mut self, encoded: &str) -> Result<(), EngineError> {
        let command = match CommandEncoder.decode(encoded) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "discarding undecodable remote unit");
                self.reports
                    .record(DataReport::bad_data(e.to_string(), encoded));
                return Err(e.into());
            }
        };
        let result = self.logger.log(&mut self.state, command.clone());
        self.note_core(result, &command)
    }

    // -- helpers ------------------------------------------------------------

    fn send(&mut self, command: &Command) -> Result<(), EngineError> {
        let encoded = CommandEncoder.encode(command);
        self.transport.send(&encoded).map_err(|e| {
            warn!(error = %e, "unit not sent, nothing logged");
            self.reports.record(DataReport::new(
                ReportKind::Transport,
                e.to_string(),
                encoded.clone(),
            ));
            EngineError::from(e)
        })
    }

    /// Report a failed execution of `command` and pass the result through.
    fn note_core<T>(
        &mut self,
        result: Result<T, CoreError>,
        command: &Command,
    ) -> Result<T, EngineError> {
        result.map_err(|e| {
            self.reports
                .record(DataReport::from_core(&e, CommandEncoder.encode(command)));
            EngineError::from(e)
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("logger", &self.logger)
            .field("reports", &self.reports.len())
            .field("queued", &self.inbox.len())
            .finish_non_exhaustive()
    }
}
