/// Keyboard collaborator: terminal key events → player commands.
///
/// Movement is continuous while a key is held; jump and shoot fire on the
/// initial press only. Terminals that report key releases (keyboard
/// enhancement) end a hold immediately; others fall back to a short
/// timeout since the last press or repeat.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use tilestep::domain::entity::{Command, FrameInput};

/// Without release events, a key counts as held this long after its last
/// press or repeat.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

const LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const JUMP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char(' '), KeyCode::Char('w'), KeyCode::Char('W')];
const SHOOT: &[KeyCode] = &[KeyCode::Char('f'), KeyCode::Char('F'), KeyCode::Char('j'), KeyCode::Char('J')];

pub struct InputState {
    /// Last press/repeat time per held key.
    held_since: HashMap<KeyCode, Instant>,
    /// Keys that went from released to held during the last drain.
    fresh: Vec<KeyCode>,
    /// Every key event from the last drain, for menu and meta keys.
    pub raw_events: Vec<KeyEvent>,
    /// Trust release events. Only set when keyboard enhancement is on.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            held_since: HashMap::with_capacity(16),
            fresh: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Read every pending terminal event without blocking. Call once per
    /// rendered frame.
    pub fn drain_events(&mut self) {
        self.fresh.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            let Ok(Event::Key(key)) = event::read() else { continue };
            self.raw_events.push(key);
            match key.kind {
                KeyEventKind::Release => {
                    if self.honor_release {
                        self.held_since.remove(&key.code);
                    }
                }
                _ => {
                    if !self.is_held(key.code) {
                        self.fresh.push(key.code);
                    }
                    self.held_since.insert(key.code, Instant::now());
                }
            }
        }

        let now = Instant::now();
        self.held_since.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        self.held_since.get(&code).map_or(false, |t| t.elapsed() < HOLD_TIMEOUT)
    }

    pub fn any_held(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.is_held(*c))
    }

    /// Pressed during the last drain (edge trigger).
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh.contains(&code)
    }

    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL) && matches!(k.code, KeyCode::Char('c') | KeyCode::Char('C'))
        })
    }

    /// Commands for the current frame.
    pub fn commands(&self) -> Vec<Command> {
        let mut cmds = Vec::with_capacity(4);
        if self.any_held(LEFT) {
            cmds.push(Command::MoveLeft);
        }
        if self.any_held(RIGHT) {
            cmds.push(Command::MoveRight);
        }
        if self.any_pressed(JUMP) {
            cmds.push(Command::Jump);
        }
        if self.any_pressed(SHOOT) {
            cmds.push(Command::Shoot);
        }
        if cmds.is_empty() {
            cmds.push(Command::None);
        }
        cmds
    }

    pub fn frame_input(&self) -> FrameInput {
        FrameInput::from_commands(&self.commands())
    }
}
