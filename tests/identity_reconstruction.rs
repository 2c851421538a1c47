use std::sync::Arc;

use tictactoe_host::codec;
use tictactoe_host::host::default_seeds;
use tictactoe_host::{AgentId, IdentityCache, Session, Slot, Store, StrategyRegistry};

const BEAN_COUNTER: AgentId = AgentId(3);

fn open_cache(store: Arc<Store>) -> IdentityCache {
    IdentityCache::new(store, Arc::new(StrategyRegistry::with_builtins()))
}

fn finished_game() -> Session {
    let mut session = Session::new([None, None]);
    for (x, y) in [(2, 2), (0, 0), (2, 1), (0, 1), (2, 0)] {
        let slot = session.current_slot();
        session.play(x, y, slot).unwrap();
    }
    session
}

#[test]
fn test_evicted_agent_reconstructs_saved_state() {
    let seeds = default_seeds(&StrategyRegistry::with_builtins()).unwrap();
    let store = Arc::new(Store::in_memory(&seeds).unwrap());
    let cache = open_cache(store.clone());

    let agent = cache.get(BEAN_COUNTER).unwrap();
    assert!(agent.saveable());
    let game = finished_game();
    agent.learn(game.history(), Slot::First, game.status());

    let saved = codec::encode_agent(&agent).unwrap();
    let id = cache.get_id(&agent).unwrap();
    store
        .transaction(|tx| tx.save_agent_state(id, &saved))
        .unwrap();

    drop(agent);
    assert_eq!(cache.reclaim(), 1);

    let rebuilt = cache.get(BEAN_COUNTER).unwrap();
    assert_eq!(codec::encode_agent(&rebuilt).unwrap(), saved);
    assert_eq!(cache.get_id(&rebuilt).unwrap(), BEAN_COUNTER);
}

#[test]
fn test_learned_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let location = tictactoe_host::StoreLocation::File(dir.path().join("agents.db"));
    let seeds = default_seeds(&StrategyRegistry::with_builtins()).unwrap();

    let saved = {
        let store = Arc::new(Store::open(&location, &seeds).unwrap());
        let cache = open_cache(store.clone());
        let agent = cache.get(BEAN_COUNTER).unwrap();
        let game = finished_game();
        agent.learn(game.history(), Slot::Second, game.status());
        let saved = codec::encode_agent(&agent).unwrap();
        store
            .transaction(|tx| tx.save_agent_state(BEAN_COUNTER, &saved))
            .unwrap();
        saved
    };

    let store = Arc::new(Store::open(&location, &seeds).unwrap());
    assert!(!store.was_created());
    let cache = open_cache(store);
    let agent = cache.get(BEAN_COUNTER).unwrap();
    assert_eq!(codec::encode_agent(&agent).unwrap(), saved);
}
