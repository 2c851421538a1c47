// Actor system: Game Actor on its own thread, presentation on the caller's
// Commands and notifications cross only through channels

pub mod actor;
pub mod bridge;
pub mod rendezvous;
pub mod types;
pub mod workers;

pub use actor::{spawn_game_actor, ActorOptions, GameActor, GameActorHandle};
pub use bridge::{PresentationActor, Surface};
pub use rendezvous::{flush_rendezvous, FlushArrival, FlushOutcome, FlushWaiter, RendezvousOutcome};
pub use types::{GameCommand, GameEvent, InputMode};
