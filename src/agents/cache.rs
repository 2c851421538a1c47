// Agent Identity Cache
//
// Forward map: durable id -> weak live agent (or the "nothing persisted"
// marker). Reverse map: agent allocation -> durable id. A reverse entry lives
// exactly as long as its forward entry; the Weak held there keeps the
// allocation address reserved, so reverse keys are never reused while mapped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::codec;
use crate::db::{AgentId, Store};

use super::{Agent, StrategyRegistry};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("agent '{name}' was never resolved through the identity cache")]
    Unresolved { name: String },
}

enum CacheEntry {
    /// Row exists but has nothing to persist (human slot) or its state was unreadable
    Absent,
    Live(Weak<Agent>),
}

pub struct IdentityCache {
    store: Arc<Store>,
    registry: Arc<StrategyRegistry>,
    by_id: DashMap<AgentId, CacheEntry>,
    by_agent: DashMap<usize, AgentId>,
    loads: AtomicU64,
}

#[inline]
fn agent_key(agent: *const Agent) -> usize {
    agent as usize
}

impl IdentityCache {
    pub fn new(store: Arc<Store>, registry: Arc<StrategyRegistry>) -> Self {
        Self {
            store,
            registry,
            by_id: DashMap::new(),
            by_agent: DashMap::new(),
            loads: AtomicU64::new(0),
        }
    }

    /// Live agent for `id`, loading it from the store on a miss.
    /// `None` for human slots, unknown ids and unreadable state.
    pub fn get(&self, id: AgentId) -> Option<Arc<Agent>> {
        match self.by_id.entry(id) {
            Entry::Occupied(mut entry) => {
                let stale = match entry.get() {
                    CacheEntry::Absent => return None,
                    CacheEntry::Live(weak) => match weak.upgrade() {
                        Some(agent) => return Some(agent),
                        None => agent_key(weak.as_ptr()),
                    },
                };
                self.by_agent.remove(&stale);

                let (cached, agent) = self.load(id)?;
                entry.insert(cached);
                agent
            }
            Entry::Vacant(entry) => {
                let (cached, agent) = self.load(id)?;
                entry.insert(cached);
                agent
            }
        }
    }

    /// Durable id of a live agent handed out by `get`
    pub fn get_id(&self, agent: &Arc<Agent>) -> Result<AgentId, IdentityError> {
        let unresolved = || IdentityError::Unresolved {
            name: agent.name().to_string(),
        };

        let id = *self
            .by_agent
            .get(&agent_key(Arc::as_ptr(agent)))
            .ok_or_else(unresolved)?;

        match self.by_id.get(&id).as_deref() {
            Some(CacheEntry::Live(weak)) if std::ptr::eq(weak.as_ptr(), Arc::as_ptr(agent)) => Ok(id),
            _ => Err(unresolved()),
        }
    }

    /// Drop entries whose agent is no longer referenced. Returns how many went.
    pub fn reclaim(&self) -> usize {
        let dead: Vec<AgentId> = self
            .by_id
            .iter()
            .filter(|entry| matches!(entry.value(), CacheEntry::Live(weak) if weak.strong_count() == 0))
            .map(|entry| *entry.key())
            .collect();

        let mut reclaimed = 0;
        for id in dead {
            let removed = self.by_id.remove_if(&id, |_, cached| {
                matches!(cached, CacheEntry::Live(weak) if weak.strong_count() == 0)
            });
            if let Some((_, CacheEntry::Live(weak))) = removed {
                self.by_agent.remove(&agent_key(weak.as_ptr()));
                reclaimed += 1;
            }
        }

        if reclaimed > 0 {
            tracing::debug!(reclaimed, "identity cache reclaimed agents");
        }
        reclaimed
    }

    /// Store queries issued so far
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// Entries whose agent is still referenced
    pub fn live_count(&self) -> usize {
        self.by_id
            .iter()
            .filter(|entry| matches!(entry.value(), CacheEntry::Live(weak) if weak.strong_count() > 0))
            .count()
    }

    /// Load and decode one agent. `None` means nothing may be cached.
    fn load(&self, id: AgentId) -> Option<(CacheEntry, Option<Arc<Agent>>)> {
        self.loads.fetch_add(1, Ordering::Relaxed);

        let row = match self.store.load_agent(id) {
            Ok(Some(row)) => row,
            Ok(None) => {
                tracing::warn!(%id, "unknown agent id");
                return None;
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "agent load failed");
                return None;
            }
        };

        let Some(state) = row.state else {
            tracing::debug!(%id, name = %row.name, "agent has no persisted state");
            return Some((CacheEntry::Absent, None));
        };

        match codec::decode_agent(&row.name, &state, &self.registry) {
            Ok(agent) => {
                let agent = Arc::new(agent);
                self.by_agent.insert(agent_key(Arc::as_ptr(&agent)), id);
                tracing::debug!(%id, name = %row.name, kind = agent.kind(), "agent loaded");
                Some((CacheEntry::Live(Arc::downgrade(&agent)), Some(agent)))
            }
            Err(e) => {
                tracing::warn!(%id, name = %row.name, error = %e, "agent state unreadable, treating as absent");
                Some((CacheEntry::Absent, None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::RandomStrategy;
    use crate::db::AgentSeed;

    fn cache() -> IdentityCache {
        let registry = StrategyRegistry::with_builtins();
        let random = codec::encode_strategy(&RandomStrategy).unwrap();
        let seeds = vec![
            AgentSeed { name: "User".to_string(), state: None },
            AgentSeed { name: "Random".to_string(), state: Some(random) },
            AgentSeed { name: "Broken".to_string(), state: Some(vec![0xde, 0xad]) },
        ];
        let store = Arc::new(Store::in_memory(&seeds).unwrap());
        IdentityCache::new(store, Arc::new(registry))
    }

    #[test]
    fn test_get_returns_same_instance_while_alive() {
        let cache = cache();
        let first = cache.get(AgentId(2)).unwrap();
        let second = cache.get(AgentId(2)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.load_count(), 1);
        assert_eq!(cache.get_id(&first), Ok(AgentId(2)));
        assert_eq!(first.name(), "Random");
    }

    #[test]
    fn test_absent_marker_is_cached() {
        let cache = cache();
        assert!(cache.get(AgentId(1)).is_none());
        assert!(cache.get(AgentId(1)).is_none());
        assert_eq!(cache.load_count(), 1);

        // Unreadable state degrades to absent, also cached
        assert!(cache.get(AgentId(3)).is_none());
        assert!(cache.get(AgentId(3)).is_none());
        assert_eq!(cache.load_count(), 2);
    }

    #[test]
    fn test_unknown_id_is_not_cached() {
        let cache = cache();
        assert!(cache.get(AgentId(42)).is_none());
        assert!(cache.get(AgentId(42)).is_none());
        assert_eq!(cache.load_count(), 2);
    }

    #[test]
    fn test_get_id_rejects_foreign_agent() {
        let cache = cache();
        let stranger = Arc::new(Agent::new("Random", Box::new(RandomStrategy)));
        assert!(matches!(cache.get_id(&stranger), Err(IdentityError::Unresolved { .. })));
    }

    #[test]
    fn test_reclaim_then_reload() {
        let cache = cache();
        let agent = cache.get(AgentId(2)).unwrap();
        assert_eq!(cache.live_count(), 1);
        assert_eq!(cache.reclaim(), 0);

        drop(agent);
        assert_eq!(cache.live_count(), 0);
        assert_eq!(cache.reclaim(), 1);

        let reloaded = cache.get(AgentId(2)).unwrap();
        assert_eq!(cache.load_count(), 2);
        assert_eq!(cache.get_id(&reloaded), Ok(AgentId(2)));
    }

    #[test]
    fn test_stale_entry_reloads_without_reclaim() {
        let cache = cache();
        drop(cache.get(AgentId(2)).unwrap());
        let reloaded = cache.get(AgentId(2)).unwrap();
        assert_eq!(cache.load_count(), 2);
        assert_eq!(cache.get_id(&reloaded), Ok(AgentId(2)));
    }
}
