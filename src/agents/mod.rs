// Agents: the move-choice capability plus durable identity
//
// An `Agent` wraps a boxed `Strategy`. Live agents are handed out by the
// `IdentityCache`, which is the only place that knows their durable id.

mod bean_counter;
mod cache;
mod optimal;
mod random;
mod registry;

use std::fmt;

use parking_lot::Mutex;
use rand::rngs::StdRng;

use crate::game::{Board, Cell, Ply, Slot, Status};

pub use bean_counter::BeanCounterStrategy;
pub use cache::{IdentityCache, IdentityError};
pub use optimal::OptimalStrategy;
pub use random::RandomStrategy;
pub use registry::{FreshFn, RestoreFn, StrategyRegistry};

/// Move-choice capability for one automated slot
pub trait Strategy: Send {
    /// Registry key stored alongside the state blob
    fn kind(&self) -> &'static str;

    /// Pick a free cell for `slot`, or `None` if the strategy has no move
    fn choose_move(&self, board: &Board, slot: Slot, rng: &mut StdRng) -> Option<Cell>;

    /// Whether learned state should be written back after each game
    fn saveable(&self) -> bool {
        false
    }

    /// Reinforce from a finished game played as `slot`
    fn learn(&mut self, _history: &[Ply], _slot: Slot, _status: Status) {}

    /// Serialize the strategy's own state (empty for stateless strategies)
    fn save_state(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        Ok(Vec::new())
    }
}

pub struct Agent {
    name: String,
    strategy: Mutex<Box<dyn Strategy>>,
}

impl Agent {
    pub fn new(name: impl Into<String>, strategy: Box<dyn Strategy>) -> Self {
        Self {
            name: name.into(),
            strategy: Mutex::new(strategy),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &'static str {
        self.strategy.lock().kind()
    }

    pub fn saveable(&self) -> bool {
        self.strategy.lock().saveable()
    }

    pub fn choose_move(&self, board: &Board, slot: Slot, rng: &mut StdRng) -> Option<Cell> {
        self.strategy.lock().choose_move(board, slot, rng)
    }

    pub fn learn(&self, history: &[Ply], slot: Slot, status: Status) {
        self.strategy.lock().learn(history, slot, status);
    }

    /// Run `f` against the strategy while holding its lock
    pub(crate) fn with_strategy<R>(&self, f: impl FnOnce(&dyn Strategy) -> R) -> R {
        let strategy = self.strategy.lock();
        f(strategy.as_ref())
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}
