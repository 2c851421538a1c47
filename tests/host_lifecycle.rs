use std::time::{Duration, Instant};

use tictactoe_host::{
    AgentId, AgentPair, Board, Host, HostConfig, InputMode, RendezvousOutcome, Slot, Status,
    Surface,
};

#[derive(Default)]
struct CountingSurface {
    boards: usize,
    texts: usize,
    last_board: u32,
}

impl Surface for CountingSurface {
    fn set_board(&mut self, encoded: u32) {
        self.boards += 1;
        self.last_board = encoded;
    }

    fn set_result_text(&mut self, _text: &str) {
        self.texts += 1;
    }
}

const USER: AgentId = AgentId(1);
const RANDOM: AgentId = AgentId(2);

fn config() -> HostConfig {
    HostConfig {
        entropy_bootstrap: false,
        log_filter: "warn".to_string(),
        ..HostConfig::default()
    }
}

/// Every notification sent before a committed flush has arrived once it returns
fn settle(host: &mut Host<CountingSurface>) {
    assert_eq!(host.on_suspend(), RendezvousOutcome::Committed);
    host.on_resume();
}

fn tap(host: &mut Host<CountingSurface>, x: usize, y: usize) {
    host.presentation_mut().on_cell_tapped(x, y);
    settle(host);
}

/// Human vs human; first slot takes the top row
fn play_top_row_win(host: &mut Host<CountingSurface>) {
    for (x, y) in [(0, 0), (0, 1), (1, 0), (1, 1), (2, 0)] {
        assert_eq!(host.presentation().input_mode(), InputMode::Move);
        tap(host, x, y);
    }
}

#[test]
fn test_fresh_host_reports_agents_and_accepts_moves() {
    let mut host = Host::start(config(), CountingSurface::default()).unwrap();
    settle(&mut host);

    let names: Vec<_> = host.presentation().agents().iter().map(|a| a.name.clone()).collect();
    assert_eq!(names, vec!["User", "Random", "Bean Counter", "Optimal"]);
    assert_eq!(host.presentation().selected(), Some(AgentPair::new(USER, USER)));
    assert_eq!(host.presentation().input_mode(), InputMode::Move);
    assert!(host.presentation().surface().texts > 0);

    tap(&mut host, 1, 1);
    assert_eq!(host.presentation().board().get(1, 1), Some(Slot::First));
    assert_eq!(host.presentation().surface().last_board, host.presentation().board().encoded());

    // Occupied cell never leaves the presentation
    let boards = host.presentation().surface().boards;
    tap(&mut host, 1, 1);
    assert_eq!(host.presentation().surface().boards, boards);

    host.shutdown();
}

#[test]
fn test_terminal_game_updates_result_text() {
    let mut host = Host::start(config(), CountingSurface::default()).unwrap();
    settle(&mut host);
    play_top_row_win(&mut host);

    assert_eq!(host.presentation().board().status(), Status::P1Win);
    assert_eq!(host.presentation().input_mode(), InputMode::Tap);
    assert_eq!(
        host.presentation().result_text(),
        "Result: P1 Win\nP1 win: 1\nP2 win: 0\nDraw:   0"
    );

    // Tap after the game ends starts the next one
    host.presentation_mut().on_background_tapped();
    settle(&mut host);
    assert_eq!(host.presentation().board(), Board::new());
    assert!(host.presentation().result_text().contains("P1 win: 1"));

    host.shutdown();
}

#[test]
fn test_automated_first_slot_opens_on_selection() {
    let mut host = Host::start(config(), CountingSurface::default()).unwrap();
    settle(&mut host);

    host.presentation_mut().on_agent_selected(Slot::First, RANDOM);
    settle(&mut host);
    assert_eq!(host.presentation().board().filled(), 1);
    assert_eq!(host.presentation().input_mode(), InputMode::Move);

    host.shutdown();
}

#[test]
fn test_restart_restores_selection_session_and_tally() {
    let dir = tempfile::tempdir().unwrap();
    let config = config().with_database_dir(dir.path());

    let finished = {
        let mut host = Host::start(config.clone(), CountingSurface::default()).unwrap();
        settle(&mut host);
        play_top_row_win(&mut host);
        let board = host.presentation().board();
        host.shutdown();
        board
    };

    let mut host = Host::start(config, CountingSurface::default()).unwrap();
    settle(&mut host);
    assert_eq!(host.presentation().selected(), Some(AgentPair::new(USER, USER)));
    assert_eq!(host.presentation().board(), finished);
    assert_eq!(
        host.presentation().result_text(),
        "Result: P1 Win\nP1 win: 1\nP2 win: 0\nDraw:   0"
    );
    host.shutdown();
}

#[test]
fn test_suspend_is_released_when_flush_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = config().with_database_dir(dir.path());
    let path = config.database_path.clone().unwrap();

    let mut host = Host::start(config, CountingSurface::default()).unwrap();
    settle(&mut host);

    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER fail_scalars BEFORE INSERT ON scalars
         BEGIN SELECT RAISE(ABORT, 'forced failure'); END;",
    )
    .unwrap();
    drop(conn);

    let started = Instant::now();
    assert_eq!(host.on_suspend(), RendezvousOutcome::Failed);
    assert!(started.elapsed() < Duration::from_secs(2));

    // Still serving input afterwards
    host.presentation_mut().on_cell_tapped(0, 0);
    assert_eq!(host.on_suspend(), RendezvousOutcome::Failed);
    host.on_resume();
    assert_eq!(host.presentation().board().get(0, 0), Some(Slot::First));
    host.shutdown();
}
