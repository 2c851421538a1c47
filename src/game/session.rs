// Live session and per-pair tally
//
// A `Session` is one game: the board, the move history, and references to
// the agents in each slot. Agents are shared with the identity cache; the
// session never owns their durable identity.

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;

use crate::agents::Agent;
use crate::config::board as board_config;

use super::board::{Board, Ply, Slot, Status};

/// Agent references for both slots; `None` is a human slot
pub type SlotAgents = [Option<Arc<Agent>>; 2];

/// Compare agent references by identity
pub fn same_agents(a: &SlotAgents, b: &SlotAgents) -> bool {
    a.iter().zip(b.iter()).all(|pair| match pair {
        (Some(x), Some(y)) => Arc::ptr_eq(x, y),
        (None, None) => true,
        _ => false,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IllegalMove {
    #[error("cell ({x}, {y}) is off the board")]
    OutOfBounds { x: usize, y: usize },
    #[error("cell ({x}, {y}) is occupied")]
    Occupied { x: usize, y: usize },
    #[error("{played:?} moved but {expected:?} is to play")]
    WrongSlot { expected: Slot, played: Slot },
    #[error("game is already over")]
    GameOver,
}

#[derive(Clone)]
pub struct Session {
    board: Board,
    agents: SlotAgents,
    history: Vec<Ply>,
}

impl Session {
    pub fn new(agents: SlotAgents) -> Self {
        Self {
            board: Board::new(),
            agents,
            history: Vec::new(),
        }
    }

    /// Rebuild from persisted parts. History must replay onto `board`.
    pub(crate) fn from_parts(board: Board, agents: SlotAgents, history: Vec<Ply>) -> Option<Self> {
        let mut replay = Board::new();
        for ply in &history {
            if ply.before != replay || !replay.is_free(ply.cell().0, ply.cell().1) {
                return None;
            }
            replay = replay.with_mark(ply.cell().0, ply.cell().1, ply.slot);
        }
        if replay != board {
            return None;
        }
        Some(Self { board, agents, history })
    }

    pub fn board(&self) -> Board {
        self.board
    }

    pub fn status(&self) -> Status {
        self.board.status()
    }

    pub fn current_slot(&self) -> Slot {
        self.board.to_move()
    }

    pub fn agents(&self) -> &SlotAgents {
        &self.agents
    }

    pub fn agent(&self, slot: Slot) -> Option<&Arc<Agent>> {
        self.agents[slot.index()].as_ref()
    }

    pub fn is_automated(&self, slot: Slot) -> bool {
        self.agents[slot.index()].is_some()
    }

    pub fn history(&self) -> &[Ply] {
        &self.history
    }

    /// Apply one move for `slot`
    pub fn play(&mut self, x: usize, y: usize, slot: Slot) -> Result<Status, IllegalMove> {
        if self.status().is_terminal() {
            return Err(IllegalMove::GameOver);
        }
        if !board_config::is_in_bounds(x, y) {
            return Err(IllegalMove::OutOfBounds { x, y });
        }
        let expected = self.current_slot();
        if slot != expected {
            return Err(IllegalMove::WrongSlot { expected, played: slot });
        }
        if !self.board.is_free(x, y) {
            return Err(IllegalMove::Occupied { x, y });
        }

        self.history.push(Ply {
            slot,
            x: x as u8,
            y: y as u8,
            before: self.board,
        });
        self.board = self.board.with_mark(x, y, slot);
        Ok(self.status())
    }

    /// Let automated slots play up to `plies` moves. Stops early at a human
    /// slot, a terminal status, or an agent with no move. Returns plies played.
    pub fn run(&mut self, plies: usize, rng: &mut StdRng) -> usize {
        let mut played = 0;
        while played < plies && self.status() == Status::Playing {
            let slot = self.current_slot();
            let Some(agent) = self.agent(slot).cloned() else {
                break;
            };
            let Some((x, y)) = agent.choose_move(&self.board, slot, rng) else {
                tracing::warn!(agent = agent.name(), board = %self.board, "agent returned no move");
                break;
            };
            if let Err(e) = self.play(x, y, slot) {
                tracing::warn!(agent = agent.name(), error = %e, "agent chose an illegal move");
                break;
            }
            debug_log!("{} ({:?}) played ({}, {}) -> {}", agent.name(), slot, x, y, self.board);
            played += 1;
        }
        played
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.board == other.board
            && self.history == other.history
            && same_agents(&self.agents, &other.agents)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("board", &self.board.to_string())
            .field("status", &self.status())
            .field("agents", &self.agents)
            .field("plies", &self.history.len())
            .finish()
    }
}

/// Cumulative results for one ordered agent pair
#[derive(Clone)]
pub struct Tally {
    agents: SlotAgents,
    pub p1_wins: u64,
    pub p2_wins: u64,
    pub draws: u64,
}

impl Tally {
    pub fn new(agents: SlotAgents) -> Self {
        Self {
            agents,
            p1_wins: 0,
            p2_wins: 0,
            draws: 0,
        }
    }

    pub(crate) fn from_parts(agents: SlotAgents, p1_wins: u64, p2_wins: u64, draws: u64) -> Self {
        Self { agents, p1_wins, p2_wins, draws }
    }

    pub fn agents(&self) -> &SlotAgents {
        &self.agents
    }

    /// Count one finished game. `Playing` is ignored.
    pub fn record(&mut self, status: Status) {
        match status {
            Status::P1Win => self.p1_wins += 1,
            Status::P2Win => self.p2_wins += 1,
            Status::Draw => self.draws += 1,
            Status::Playing => {}
        }
    }

    pub fn total(&self) -> u64 {
        self.p1_wins + self.p2_wins + self.draws
    }

    /// Result text shown under the board
    pub fn summary(&self, last_result: Option<Status>) -> String {
        format!(
            "Result: {}\nP1 win: {}\nP2 win: {}\nDraw:   {}",
            last_result.map_or("", Status::label),
            self.p1_wins,
            self.p2_wins,
            self.draws
        )
    }
}

impl PartialEq for Tally {
    fn eq(&self, other: &Self) -> bool {
        self.p1_wins == other.p1_wins
            && self.p2_wins == other.p2_wins
            && self.draws == other.draws
            && same_agents(&self.agents, &other.agents)
    }
}

impl fmt::Debug for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tally")
            .field("p1_wins", &self.p1_wins)
            .field("p2_wins", &self.p2_wins)
            .field("draws", &self.draws)
            .finish()
    }
}
