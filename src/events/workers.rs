// Worker threads
// The entropy worker may block for an unbounded time, so it runs detached and
// reports back as an ordinary command instead of being awaited.

use std::thread;

use crossbeam_channel::Sender;
use rand::rngs::OsRng;
use rand::{RngCore, TryRngCore};

use crate::config::rng::SEED_LEN;

use super::types::GameCommand;

/// Collect a fresh seed off-thread and post it as `SeedRandom`
pub fn spawn_entropy_collection(tx: Sender<GameCommand>) -> std::io::Result<()> {
    thread::Builder::new()
        .name("entropy-worker".to_string())
        .spawn(move || {
            let mut seed = [0u8; SEED_LEN];
            if let Err(e) = OsRng.try_fill_bytes(&mut seed) {
                tracing::warn!(error = %e, "OS entropy unavailable, using thread rng");
                rand::rng().fill_bytes(&mut seed);
            }

            if tx.send(GameCommand::SeedRandom { seed }).is_err() {
                tracing::debug!("game actor gone before entropy arrived");
            } else {
                tracing::debug!("entropy collected");
            }
        })?;
    Ok(())
}
