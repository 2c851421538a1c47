// Move-processing and persistence core for a two-player tic-tac-toe host

macro_rules! debug_log {
    ($($arg:tt)*) => {
        if cfg!(feature = "debug_logs") {
            tracing::debug!($($arg)*);
        }
    };
}

pub mod config;  // Centralized configuration constants
pub mod logging;
pub mod db;  // SQLite-backed store gateway
pub mod game;
pub mod agents;
pub mod codec;
pub mod events;  // Actor system (game actor, presentation, rendezvous)
pub mod host;

pub use agents::{Agent, IdentityCache, IdentityError, Strategy, StrategyRegistry};
pub use codec::{DecodeError, EncodeError, StateCodec};
pub use config::HostConfig;
pub use db::{AgentId, AgentListing, AgentPair, Store, StoreError, StoreLocation};
pub use events::{GameCommand, GameEvent, InputMode, PresentationActor, RendezvousOutcome, Surface};
pub use game::{Board, Session, Slot, Status, Tally};
pub use host::{Host, HostError};
