// Game Actor - sole owner and mutator of live session, tally and selection
// Runs on a dedicated thread; commands in, notifications out, both via channels

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use ulid::Ulid;

use crate::agents::{Agent, IdentityCache, IdentityError};
use crate::codec::{self, EncodeError, Persist, StateCodec};
use crate::config::rng::SEED_LEN;
use crate::config::store::{RNG_SEED_KEY, SELECTED_AGENTS_KEY};
use crate::db::{AgentId, AgentListing, AgentPair, SessionRow, Store, StoreError};
use crate::game::{same_agents, Session, Slot, SlotAgents, Status, Tally};

use super::rendezvous::FlushOutcome;
use super::types::{GameCommand, GameEvent, InputMode};
use super::workers::spawn_entropy_collection;

#[derive(Debug, Clone, Copy)]
pub struct ActorOptions {
    /// Spawn the entropy worker when no seed has been persisted
    pub entropy_bootstrap: bool,
}

impl Default for ActorOptions {
    fn default() -> Self {
        Self {
            entropy_bootstrap: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum PersistError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Programming error: fatal in debug builds, logged in release
fn report_identity_error(error: &IdentityError) {
    tracing::error!(error = %error, "agent identity lost");
    debug_assert!(false, "{}", error);
}

fn report_persist_error(what: &'static str, error: &PersistError) {
    match error {
        PersistError::Encode(EncodeError::Identity(e)) => report_identity_error(e),
        _ => tracing::error!(what, error = %error, "persist failed, transaction rolled back"),
    }
}

pub struct GameActor {
    store: Arc<Store>,
    cache: Arc<IdentityCache>,
    codec: StateCodec,

    // === COMMUNICATION ===
    command_rx: Receiver<GameCommand>,
    event_tx: Sender<GameEvent>,

    options: ActorOptions,

    // === OWNED STATE ===
    agents: Vec<AgentListing>,
    pair: AgentPair,
    session: Session,
    tally: Tally,
    last_result: Option<Status>,
    rng: StdRng,
}

impl GameActor {
    pub fn new(
        store: Arc<Store>,
        cache: Arc<IdentityCache>,
        command_rx: Receiver<GameCommand>,
        event_tx: Sender<GameEvent>,
        options: ActorOptions,
    ) -> Self {
        Self {
            codec: StateCodec::new(cache.clone()),
            store,
            cache,
            command_rx,
            event_tx,
            options,
            agents: Vec::new(),
            pair: AgentPair::new(AgentId(0), AgentId(0)),
            session: Session::new([None, None]),
            tally: Tally::new([None, None]),
            last_result: None,
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Cold start: selection, seed and session from the store, then `Ready`.
    /// `entropy_tx` is handed to the entropy worker if one is needed.
    pub fn start(&mut self, entropy_tx: Sender<GameCommand>) {
        self.agents = match self.store.list_agents() {
            Ok(agents) => agents,
            Err(e) => {
                tracing::warn!(error = %e, "agent listing failed");
                Vec::new()
            }
        };
        self.pair = self.restore_selection();

        if !self.restore_seed() && self.options.entropy_bootstrap {
            if let Err(e) = spawn_entropy_collection(entropy_tx) {
                tracing::warn!(error = %e, "entropy worker failed to start");
            }
        }

        self.adopt(self.pair);
        tracing::info!(pair = %self.pair, agents = self.agents.len(), "game actor ready");

        self.emit(GameEvent::Ready {
            agents: self.agents.clone(),
            selected: self.pair,
        });
        self.emit_state();
    }

    /// Handle one command. Returns false when the actor should stop.
    pub fn handle(&mut self, command: GameCommand) -> bool {
        tracing::debug!(?command, "game command");
        match command {
            GameCommand::NewSession { pair } => self.new_session(pair),
            GameCommand::PlayMove { x, y } => self.play_move(x, y),
            GameCommand::AdvanceAutomated => self.advance_automated(),
            GameCommand::SetAgent { slot, id } => self.set_agent(slot, id),
            GameCommand::Flush { flush_id, arrival } => {
                let outcome = self.flush(flush_id);
                if let Some(arrival) = arrival {
                    arrival.arrive(outcome);
                }
            }
            GameCommand::SeedRandom { seed } => self.seed_random(seed),
            GameCommand::Shutdown => {
                self.flush(Ulid::new());
                return false;
            }
        }
        true
    }

    /// Run the command loop (called on the dedicated thread)
    pub fn run(mut self) {
        while let Ok(command) = self.command_rx.recv() {
            if !self.handle(command) {
                tracing::info!("game actor stopped");
                return;
            }
        }
        tracing::info!("command channel closed, final flush");
        self.flush(Ulid::new());
    }

    // === Commands ===

    fn new_session(&mut self, pair: AgentPair) {
        if !self.knows(pair) {
            tracing::warn!(%pair, "new session for unknown agents ignored");
            return;
        }
        if pair == self.pair {
            let agents = self.session.agents().clone();
            self.session = self.fresh_session(agents);
            self.emit_state();
            return;
        }
        self.switch_to(pair);
    }

    fn play_move(&mut self, x: usize, y: usize) {
        let slot = self.session.current_slot();
        if self.session.status().is_terminal()
            || self.session.is_automated(slot)
            || !self.session.board().is_free(x, y)
        {
            tracing::debug!(x, y, "move ignored");
            return;
        }
        if let Err(e) = self.session.play(x, y, slot) {
            tracing::debug!(x, y, error = %e, "move rejected");
            return;
        }

        if self.session.status() == Status::Playing
            && self.session.is_automated(self.session.current_slot())
        {
            self.session.run(1, &mut self.rng);
        }
        self.after_ply();
    }

    fn advance_automated(&mut self) {
        if self.session.status().is_terminal() {
            let agents = self.session.agents().clone();
            self.session = self.fresh_session(agents);
            self.emit_state();
            return;
        }
        if !self.session.is_automated(self.session.current_slot()) {
            tracing::debug!("advance ignored, human slot engaged");
            return;
        }
        self.session.run(1, &mut self.rng);
        self.after_ply();
    }

    fn set_agent(&mut self, slot: Slot, id: AgentId) {
        if self.pair.get(slot.index()) == id {
            return;
        }
        let pair = self.pair.with(slot.index(), id);
        if !self.knows(pair) {
            tracing::warn!(%id, ?slot, "unknown agent ignored");
            return;
        }
        self.switch_to(pair);
    }

    fn flush(&mut self, flush_id: Ulid) -> FlushOutcome {
        match self.persist_selection_and_session() {
            Ok(()) => {
                tracing::info!(%flush_id, pair = %self.pair, "flush committed");
                FlushOutcome::Committed
            }
            Err(e) => {
                report_persist_error("flush", &e);
                tracing::warn!(%flush_id, "flush failed");
                FlushOutcome::Failed
            }
        }
    }

    fn seed_random(&mut self, seed: [u8; SEED_LEN]) {
        let mut advanced = [0u8; SEED_LEN];
        StdRng::from_seed(seed).fill_bytes(&mut advanced);
        self.rng = StdRng::from_seed(advanced);

        let stored = codec::encode_scalar(&advanced)
            .map_err(PersistError::from)
            .and_then(|bytes| Ok(self.store.put_scalar(RNG_SEED_KEY, &bytes)?));
        match stored {
            Ok(()) => tracing::debug!("rng seeded and persisted"),
            Err(e) => report_persist_error("rng seed", &e),
        }
    }

    // === Session lifecycle ===

    /// Store the outgoing session, then adopt `pair`
    fn switch_to(&mut self, pair: AgentPair) {
        if let Err(e) = self.store_session() {
            report_persist_error("outgoing session", &e);
        }
        tracing::debug!(from = %self.pair, to = %pair, "switching agent pair");
        self.pair = pair;
        self.adopt(pair);
        self.emit_state();
    }

    /// Restore the persisted session for `pair`, or start a fresh one
    fn adopt(&mut self, pair: AgentPair) {
        let agents: SlotAgents = [self.cache.get(pair.get(0)), self.cache.get(pair.get(1))];

        let row = match self.store.load_session(pair) {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(%pair, error = %e, "session load failed, starting fresh");
                None
            }
        };

        let Some(row) = row else {
            self.tally = Tally::new(agents.clone());
            self.last_result = None;
            self.session = self.fresh_session(agents);
            return;
        };

        self.tally = self
            .decode_part::<Tally>("tally", row.tally.as_deref(), &agents)
            .unwrap_or_else(|| Tally::new(agents.clone()));
        self.last_result = Status::from_code(row.result).filter(|status| status.is_terminal());
        self.session = match self.decode_part::<Session>("session", row.session.as_deref(), &agents) {
            Some(session) => session,
            None => self.fresh_session(agents),
        };
        tracing::debug!(%pair, status = ?self.session.status(), games = self.tally.total(), "session restored");
    }

    fn decode_part<T: Persist>(
        &self,
        what: &'static str,
        bytes: Option<&[u8]>,
        agents: &SlotAgents,
    ) -> Option<T> {
        match self.codec.decode::<T>(bytes?) {
            Ok(value) if same_agents(value.agent_refs(), agents) => Some(value),
            Ok(_) => {
                tracing::warn!(what, "persisted agents do not match the pair, using defaults");
                None
            }
            Err(e) => {
                tracing::warn!(what, error = %e, "persisted state unreadable, using defaults");
                None
            }
        }
    }

    /// New game; an automated first slot opens immediately
    fn fresh_session(&mut self, agents: SlotAgents) -> Session {
        let mut session = Session::new(agents);
        if session.is_automated(Slot::First) {
            session.run(1, &mut self.rng);
        }
        session
    }

    fn after_ply(&mut self) {
        if self.session.status().is_terminal() {
            self.finish_game();
        }
        self.emit_state();
    }

    /// Tally, learn, then snapshot session, tally and learned agents together
    fn finish_game(&mut self) {
        let status = self.session.status();
        self.tally.record(status);
        self.last_result = Some(status);
        tracing::info!(
            pair = %self.pair,
            result = status.label(),
            p1_wins = self.tally.p1_wins,
            p2_wins = self.tally.p2_wins,
            draws = self.tally.draws,
            "game finished"
        );

        let mut learners: Vec<Arc<Agent>> = Vec::new();
        for slot in Slot::BOTH {
            let Some(agent) = self.session.agent(slot) else {
                continue;
            };
            if !agent.saveable() {
                continue;
            }
            agent.learn(self.session.history(), slot, status);
            if !learners.iter().any(|known| Arc::ptr_eq(known, agent)) {
                learners.push(agent.clone());
            }
        }

        if let Err(e) = self.persist_finished(&learners) {
            report_persist_error("finished game", &e);
        }
    }

    // === Persistence ===

    fn knows(&self, pair: AgentPair) -> bool {
        self.agents.is_empty()
            || pair.0.iter().all(|id| self.agents.iter().any(|agent| agent.id == *id))
    }

    fn restore_selection(&self) -> AgentPair {
        let stored = match self.store.get_scalar(SELECTED_AGENTS_KEY) {
            Ok(Some(bytes)) => match codec::decode_scalar::<AgentPair>(&bytes) {
                Ok(pair) => Some(pair),
                Err(e) => {
                    tracing::warn!(error = %e, "stored selection unreadable");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "selection load failed");
                None
            }
        };

        let fallback = self.agents.first().map_or(AgentId(1), |agent| agent.id);
        let mut pair = stored.unwrap_or(AgentPair::new(fallback, fallback));
        for index in 0..2 {
            if !self.knows(AgentPair::new(pair.get(index), pair.get(index))) {
                pair = pair.with(index, fallback);
            }
        }
        pair
    }

    /// True when a persisted seed was applied
    fn restore_seed(&mut self) -> bool {
        let bytes = match self.store.get_scalar(RNG_SEED_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(error = %e, "seed load failed");
                return false;
            }
        };
        match codec::decode_scalar::<[u8; SEED_LEN]>(&bytes) {
            Ok(seed) => {
                self.rng = StdRng::from_seed(seed);
                tracing::debug!("rng restored from persisted seed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "persisted seed unreadable");
                false
            }
        }
    }

    fn session_row(&self) -> Result<SessionRow, EncodeError> {
        Ok(SessionRow {
            tally: Some(self.codec.encode(&self.tally)?),
            session: Some(self.codec.encode(&self.session)?),
            result: self.last_result.map_or(0, Status::code),
        })
    }

    // Everything is encoded before the transaction opens; the store lock is
    // not reentrant and decoding may hit the store through the cache.

    fn store_session(&self) -> Result<(), PersistError> {
        let row = self.session_row()?;
        let pair = self.pair;
        self.store.transaction(|tx| tx.put_session(pair, &row))?;
        Ok(())
    }

    fn persist_selection_and_session(&self) -> Result<(), PersistError> {
        let selected = codec::encode_scalar(&self.pair)?;
        let row = self.session_row()?;
        let pair = self.pair;
        self.store.transaction(|tx| {
            tx.put_scalar(SELECTED_AGENTS_KEY, &selected)?;
            tx.put_session(pair, &row)
        })?;
        Ok(())
    }

    fn persist_finished(&self, learners: &[Arc<Agent>]) -> Result<(), PersistError> {
        let row = self.session_row()?;
        let mut states = Vec::with_capacity(learners.len());
        for agent in learners {
            let id = self.cache.get_id(agent).map_err(EncodeError::from)?;
            states.push((id, codec::encode_agent(agent)?));
        }

        let pair = self.pair;
        self.store.transaction(|tx| {
            tx.put_session(pair, &row)?;
            for (id, state) in &states {
                tx.save_agent_state(*id, state)?;
            }
            Ok::<(), StoreError>(())
        })?;
        Ok(())
    }

    // === Notifications ===

    fn input_mode(&self) -> InputMode {
        if self.session.status().is_terminal() || self.session.is_automated(self.session.current_slot()) {
            InputMode::Tap
        } else {
            InputMode::Move
        }
    }

    fn emit_state(&self) {
        self.emit(GameEvent::Display {
            board: self.session.board().encoded(),
            result_text: self.tally.summary(self.last_result),
        });
        self.emit(GameEvent::AwaitInput(self.input_mode()));
    }

    fn emit(&self, event: GameEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::debug!("presentation gone, event dropped");
        }
    }
}

/// Owner side of the Game Actor thread
pub struct GameActorHandle {
    commands: Sender<GameCommand>,
    thread: Option<JoinHandle<()>>,
}

impl GameActorHandle {
    pub fn send(&self, command: GameCommand) -> bool {
        if self.commands.send(command).is_err() {
            tracing::warn!("game actor gone, command dropped");
            return false;
        }
        true
    }

    pub fn sender(&self) -> Sender<GameCommand> {
        self.commands.clone()
    }

    /// Flush, stop and join the actor thread
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.commands.send(GameCommand::Shutdown);
        if thread.join().is_err() {
            tracing::error!("game actor thread panicked");
        }
    }
}

impl Drop for GameActorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the Game Actor on a dedicated thread
pub fn spawn_game_actor(
    store: Arc<Store>,
    cache: Arc<IdentityCache>,
    options: ActorOptions,
) -> std::io::Result<(GameActorHandle, Receiver<GameEvent>)> {
    let (command_tx, command_rx) = unbounded();
    let (event_tx, event_rx) = unbounded();
    let entropy_tx = command_tx.clone();

    let thread = thread::Builder::new()
        .name("game-actor".to_string())
        .spawn(move || {
            let mut actor = GameActor::new(store, cache, command_rx, event_tx, options);
            actor.start(entropy_tx);
            actor.run();
        })?;

    Ok((
        GameActorHandle {
            commands: command_tx,
            thread: Some(thread),
        },
        event_rx,
    ))
}
