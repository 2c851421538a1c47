use std::collections::HashMap;

use super::{BeanCounterStrategy, OptimalStrategy, RandomStrategy, Strategy};

/// Builds a strategy with no learned state
pub type FreshFn = fn() -> Box<dyn Strategy>;
/// Rebuilds a strategy from its own saved state
pub type RestoreFn = fn(&[u8]) -> Result<Box<dyn Strategy>, bincode::error::DecodeError>;

#[derive(Clone, Copy)]
struct StrategyEntry {
    fresh: FreshFn,
    restore: RestoreFn,
}

/// Maps a persisted strategy kind to its constructors
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    entries: HashMap<&'static str, StrategyEntry>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in strategies
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            RandomStrategy::KIND,
            || Box::new(RandomStrategy),
            |_| Ok(Box::new(RandomStrategy)),
        );
        registry.register(
            OptimalStrategy::KIND,
            || Box::new(OptimalStrategy),
            |_| Ok(Box::new(OptimalStrategy)),
        );
        registry.register(
            BeanCounterStrategy::KIND,
            || Box::new(BeanCounterStrategy::default()),
            |bytes| Ok(Box::new(BeanCounterStrategy::restore(bytes)?)),
        );
        registry
    }

    /// Add or replace a kind
    pub fn register(&mut self, kind: &'static str, fresh: FreshFn, restore: RestoreFn) {
        if self.entries.insert(kind, StrategyEntry { fresh, restore }).is_some() {
            tracing::debug!(kind, "strategy kind replaced");
        }
    }

    pub fn fresh(&self, kind: &str) -> Option<Box<dyn Strategy>> {
        self.entries.get(kind).map(|entry| (entry.fresh)())
    }

    /// `None` when the kind is unknown
    pub fn restore(
        &self,
        kind: &str,
        state: &[u8],
    ) -> Option<Result<Box<dyn Strategy>, bincode::error::DecodeError>> {
        self.entries.get(kind).map(|entry| (entry.restore)(state))
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.entries.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }
}
