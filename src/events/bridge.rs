// Presentation bridge - the foreground side of the actor boundary
// Owns UI-visible state, turns input into commands and applies notifications.
// Never touches the store; blocks only at suspend.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use ulid::Ulid;

use crate::db::{AgentId, AgentListing, AgentPair};
use crate::game::{Board, Slot};

use super::rendezvous::{flush_rendezvous, RendezvousOutcome};
use super::types::{GameCommand, GameEvent, InputMode};

/// Rendering and input surface driven by the presentation actor
pub trait Surface {
    /// Packed board, two bits per cell
    fn set_board(&mut self, encoded: u32);
    fn set_result_text(&mut self, text: &str);

    fn set_agents(&mut self, _agents: &[AgentListing], _selected: AgentPair) {}
    fn set_input_mode(&mut self, _mode: InputMode) {}
    fn set_layout(&mut self, _landscape: bool) {}
}

pub struct PresentationActor<S: Surface> {
    surface: S,
    commands: Sender<GameCommand>,
    events: Receiver<GameEvent>,
    flush_timeout: Duration,

    // UI-visible state
    input: InputMode,
    board: Board,
    result_text: String,
    agents: Vec<AgentListing>,
    selected: Option<AgentPair>,
    landscape: bool,
}

impl<S: Surface> PresentationActor<S> {
    pub fn new(
        surface: S,
        commands: Sender<GameCommand>,
        events: Receiver<GameEvent>,
        flush_timeout: Duration,
    ) -> Self {
        Self {
            surface,
            commands,
            events,
            flush_timeout,
            input: InputMode::Ignore,
            board: Board::new(),
            result_text: String::new(),
            agents: Vec::new(),
            selected: None,
            landscape: false,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn input_mode(&self) -> InputMode {
        self.input
    }

    pub fn board(&self) -> Board {
        self.board
    }

    pub fn result_text(&self) -> &str {
        &self.result_text
    }

    pub fn agents(&self) -> &[AgentListing] {
        &self.agents
    }

    pub fn selected(&self) -> Option<AgentPair> {
        self.selected
    }

    /// Apply every pending notification without blocking. Returns how many.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, event: GameEvent) {
        match event {
            GameEvent::Ready { agents, selected } => {
                self.surface.set_agents(&agents, selected);
                self.agents = agents;
                self.selected = Some(selected);
            }
            GameEvent::Display { board, result_text } => {
                self.board = Board::from_encoded(board).unwrap_or_default();
                self.surface.set_board(board);
                self.surface.set_result_text(&result_text);
                self.result_text = result_text;
            }
            GameEvent::AwaitInput(mode) => self.set_input(mode),
        }
    }

    fn set_input(&mut self, mode: InputMode) {
        self.input = mode;
        self.surface.set_input_mode(mode);
    }

    fn send(&self, command: GameCommand) -> bool {
        if self.commands.send(command).is_err() {
            tracing::warn!("game actor gone, input dropped");
            return false;
        }
        true
    }

    /// Cell tap. Occupied cells are dropped here so no command is wasted.
    pub fn on_cell_tapped(&mut self, x: usize, y: usize) {
        match self.input {
            InputMode::Move if self.board.is_free(x, y) => {
                if self.send(GameCommand::PlayMove { x, y }) {
                    self.set_input(InputMode::Ignore);
                }
            }
            InputMode::Tap => self.on_background_tapped(),
            _ => {}
        }
    }

    /// Tap anywhere outside a cell
    pub fn on_background_tapped(&mut self) {
        if self.input == InputMode::Tap && self.send(GameCommand::AdvanceAutomated) {
            self.set_input(InputMode::Ignore);
        }
    }

    pub fn on_agent_selected(&mut self, slot: Slot, id: AgentId) {
        if let Some(selected) = self.selected {
            if selected.get(slot.index()) == id {
                return;
            }
            self.selected = Some(selected.with(slot.index(), id));
        }
        self.send(GameCommand::SetAgent { slot, id });
    }

    pub fn on_new_session(&mut self, pair: AgentPair) {
        self.selected = Some(pair);
        self.send(GameCommand::NewSession { pair });
    }

    /// Host is about to suspend: force a flush and wait for it, bounded
    pub fn on_suspend(&mut self) -> RendezvousOutcome {
        let flush_id = Ulid::new();
        let (arrival, waiter) = flush_rendezvous(flush_id);
        tracing::debug!(%flush_id, "suspend requested");

        // A failed send drops the arrival, which releases the waiter at once
        self.send(GameCommand::Flush {
            flush_id,
            arrival: Some(arrival),
        });
        waiter.wait(self.flush_timeout)
    }

    pub fn on_resume(&mut self) -> usize {
        self.pump()
    }

    pub fn on_layout_change(&mut self, landscape: bool) {
        if self.landscape == landscape {
            return;
        }
        self.landscape = landscape;
        self.surface.set_layout(landscape);
        self.surface.set_board(self.board.encoded());
        self.surface.set_result_text(&self.result_text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::rendezvous::FlushOutcome;
    use crossbeam_channel::unbounded;
    use std::thread;

    #[derive(Default)]
    struct RecordingSurface {
        boards: Vec<u32>,
        texts: Vec<String>,
        layouts: Vec<bool>,
    }

    impl Surface for RecordingSurface {
        fn set_board(&mut self, encoded: u32) {
            self.boards.push(encoded);
        }

        fn set_result_text(&mut self, text: &str) {
            self.texts.push(text.to_string());
        }

        fn set_layout(&mut self, landscape: bool) {
            self.layouts.push(landscape);
        }
    }

    fn presentation() -> (
        PresentationActor<RecordingSurface>,
        Receiver<GameCommand>,
        Sender<GameEvent>,
    ) {
        let (command_tx, command_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let actor = PresentationActor::new(
            RecordingSurface::default(),
            command_tx,
            event_rx,
            Duration::from_millis(200),
        );
        (actor, command_rx, event_tx)
    }

    #[test]
    fn test_move_mode_sends_one_move_then_ignores() {
        let (mut ui, commands, events) = presentation();
        let board = Board::new().with_mark(1, 1, Slot::First);
        events.send(GameEvent::Display { board: board.encoded(), result_text: "Result: ".into() }).unwrap();
        events.send(GameEvent::AwaitInput(InputMode::Move)).unwrap();
        assert_eq!(ui.pump(), 2);
        assert_eq!(ui.surface().boards, vec![board.encoded()]);
        assert_eq!(ui.surface().texts, vec!["Result: ".to_string()]);

        // Occupied cell dropped locally
        ui.on_cell_tapped(1, 1);
        assert!(commands.try_recv().is_err());

        ui.on_cell_tapped(0, 2);
        assert!(matches!(commands.try_recv(), Ok(GameCommand::PlayMove { x: 0, y: 2 })));
        assert_eq!(ui.input_mode(), InputMode::Ignore);

        ui.on_cell_tapped(2, 2);
        assert!(commands.try_recv().is_err());
    }

    #[test]
    fn test_tap_mode_advances() {
        let (mut ui, commands, events) = presentation();
        events.send(GameEvent::AwaitInput(InputMode::Tap)).unwrap();
        ui.pump();
        ui.on_cell_tapped(0, 0);
        assert!(matches!(commands.try_recv(), Ok(GameCommand::AdvanceAutomated)));
        ui.on_background_tapped();
        assert!(commands.try_recv().is_err());
    }

    #[test]
    fn test_unchanged_selection_is_not_sent() {
        let (mut ui, commands, events) = presentation();
        let pair = AgentPair::new(AgentId(1), AgentId(2));
        events.send(GameEvent::Ready { agents: Vec::new(), selected: pair }).unwrap();
        ui.pump();

        ui.on_agent_selected(Slot::Second, AgentId(2));
        assert!(commands.try_recv().is_err());
        ui.on_agent_selected(Slot::Second, AgentId(3));
        assert!(matches!(
            commands.try_recv(),
            Ok(GameCommand::SetAgent { slot: Slot::Second, id: AgentId(3) })
        ));
        assert_eq!(ui.selected(), Some(AgentPair::new(AgentId(1), AgentId(3))));
    }

    #[test]
    fn test_suspend_waits_for_arrival() {
        let (mut ui, commands, _events) = presentation();
        let game = thread::spawn(move || match commands.recv().unwrap() {
            GameCommand::Flush { arrival: Some(arrival), .. } => arrival.arrive(FlushOutcome::Committed),
            other => panic!("unexpected command {:?}", other),
        });
        assert_eq!(ui.on_suspend(), RendezvousOutcome::Committed);
        game.join().unwrap();
    }

    #[test]
    fn test_suspend_with_no_game_actor_does_not_hang() {
        let (mut ui, commands, _events) = presentation();
        drop(commands);
        assert_eq!(ui.on_suspend(), RendezvousOutcome::Unknown);
    }

    #[test]
    fn test_layout_change_repaints() {
        let (mut ui, _commands, _events) = presentation();
        ui.on_layout_change(true);
        ui.on_layout_change(true);
        assert_eq!(ui.surface().layouts, vec![true]);
        assert_eq!(ui.surface().boards, vec![0]);
    }
}
