// Command and notification types crossing the actor boundary

use ulid::Ulid;

use crate::config::rng::SEED_LEN;
use crate::db::{AgentId, AgentListing, AgentPair};
use crate::game::Slot;

use super::rendezvous::FlushArrival;

/// Commands sent to the Game Actor. Order is preserved per sender.
#[derive(Debug)]
pub enum GameCommand {
    /// Adopt the session for `pair`, flushing the outgoing one if it differs
    NewSession { pair: AgentPair },
    /// Human move for the engaged slot
    PlayMove { x: usize, y: usize },
    /// One automated ply, or a new game if the current one is over
    AdvanceAutomated,
    SetAgent { slot: Slot, id: AgentId },
    /// Persist selection and session. `arrival` is signalled once done.
    Flush {
        flush_id: Ulid,
        arrival: Option<FlushArrival>,
    },
    SeedRandom { seed: [u8; SEED_LEN] },
    /// Flush, then stop the actor loop
    Shutdown,
}

/// What the presentation should accept next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Ignore,
    /// A human slot is engaged: cell taps become moves
    Move,
    /// An automated slot is engaged or the game is over: any tap advances
    Tap,
}

/// Notifications sent from the Game Actor to the presentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// Emitted once at start so agent selectors can be filled
    Ready {
        agents: Vec<AgentListing>,
        selected: AgentPair,
    },
    Display {
        board: u32,
        result_text: String,
    },
    AwaitInput(InputMode),
}
