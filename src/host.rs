// Host wiring: store, identity cache, Game Actor thread and presentation.
// Lifecycle callbacks are thin pass-throughs to the presentation actor.

use std::sync::Arc;

use crate::agents::{IdentityCache, StrategyRegistry};
use crate::codec::{self, EncodeError};
use crate::config::store::DEFAULT_AGENTS;
use crate::config::HostConfig;
use crate::db::{AgentSeed, Store, StoreError, StoreLocation};
use crate::events::{
    spawn_game_actor, ActorOptions, GameActorHandle, PresentationActor, RendezvousOutcome, Surface,
};
use crate::logging;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to encode default agents: {0}")]
    Seed(#[from] EncodeError),
    #[error("failed to start game actor: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Agents for a freshly created store. Kinds missing from `registry` are skipped.
pub fn default_seeds(registry: &StrategyRegistry) -> Result<Vec<AgentSeed>, EncodeError> {
    let mut seeds = Vec::with_capacity(DEFAULT_AGENTS.len());
    for (name, kind) in DEFAULT_AGENTS {
        let state = match kind {
            None => None,
            Some(kind) => match registry.fresh(kind) {
                Some(strategy) => Some(codec::encode_strategy(strategy.as_ref())?),
                None => {
                    tracing::warn!(name, kind, "default agent kind not registered, skipped");
                    continue;
                }
            },
        };
        seeds.push(AgentSeed {
            name: name.to_string(),
            state,
        });
    }
    Ok(seeds)
}

pub struct Host<S: Surface> {
    store: Arc<Store>,
    cache: Arc<IdentityCache>,
    game: GameActorHandle,
    presentation: PresentationActor<S>,
}

impl<S: Surface> Host<S> {
    pub fn start(config: HostConfig, surface: S) -> Result<Self, HostError> {
        Self::start_with(config, StrategyRegistry::with_builtins(), surface)
    }

    pub fn start_with(
        config: HostConfig,
        registry: StrategyRegistry,
        surface: S,
    ) -> Result<Self, HostError> {
        logging::init(&config.log_filter);

        let seeds = if config.seed_default_agents {
            default_seeds(&registry)?
        } else {
            Vec::new()
        };
        let location = StoreLocation::from(config.database_path.clone());
        let store = Arc::new(Store::open(&location, &seeds)?);
        let cache = Arc::new(IdentityCache::new(store.clone(), Arc::new(registry)));

        let options = ActorOptions {
            entropy_bootstrap: config.entropy_bootstrap,
        };
        let (game, events) = spawn_game_actor(store.clone(), cache.clone(), options)?;
        let presentation =
            PresentationActor::new(surface, game.sender(), events, config.flush_timeout());

        tracing::info!(?location, "host started");
        Ok(Self {
            store,
            cache,
            game,
            presentation,
        })
    }

    pub fn presentation(&self) -> &PresentationActor<S> {
        &self.presentation
    }

    pub fn presentation_mut(&mut self) -> &mut PresentationActor<S> {
        &mut self.presentation
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    pub fn on_suspend(&mut self) -> RendezvousOutcome {
        self.presentation.on_suspend()
    }

    pub fn on_resume(&mut self) -> usize {
        self.presentation.on_resume()
    }

    pub fn on_layout_change(&mut self, landscape: bool) {
        self.presentation.on_layout_change(landscape);
    }

    /// Final flush, then join the Game Actor
    pub fn shutdown(self) {
        self.game.shutdown();
        tracing::info!("host stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_seeds_follow_registry() {
        let seeds = default_seeds(&StrategyRegistry::with_builtins()).unwrap();
        let names: Vec<_> = seeds.iter().map(|seed| seed.name.as_str()).collect();
        assert_eq!(names, vec!["User", "Random", "Bean Counter", "Optimal"]);
        assert!(seeds[0].state.is_none());
        assert!(seeds[1..].iter().all(|seed| seed.state.is_some()));

        let seeds = default_seeds(&StrategyRegistry::new()).unwrap();
        assert_eq!(seeds.len(), 1);
    }
}
