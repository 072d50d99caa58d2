/// Entry point and game loop.

mod ui;

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyboardEnhancementFlags, PushKeyboardEnhancementFlags, PopKeyboardEnhancementFlags};
use crossterm::{execute, terminal};

use tilestep::sim::level::{load_level, load_levels, LevelDef};
use tilestep::sim::save;
use tilestep::{step, EngineResult, GameConfig, Outcome, WorldState};

use ui::input::InputState;
use ui::renderer::{Renderer, Screen};
use ui::sound::{play_events, SoundEngine};

const FRAME_SLEEP: Duration = Duration::from_millis(5);
/// How long a status message stays on screen, in seconds.
const MESSAGE_SECS: f32 = 2.5;

// ══════════════════════════════════════════════════════════════
// Phases
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Phase {
    Title,
    Playing { level: usize },
    LevelComplete { level: usize },
    GameOver { level: usize },
    Finished,
}

/// Things that move the game between phases.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Signal {
    Confirm,
    Back,
    Restart,
    Ended(Outcome),
}

fn transition(phase: Phase, signal: Signal, level_count: usize) -> Phase {
    match (phase, signal) {
        (Phase::Title, Signal::Confirm) if level_count > 0 => Phase::Playing { level: 0 },
        (Phase::Playing { level }, Signal::Ended(Outcome::LevelComplete)) => Phase::LevelComplete { level },
        (Phase::Playing { level }, Signal::Ended(Outcome::PlayerDied)) => Phase::GameOver { level },
        (Phase::Playing { level }, Signal::Restart) => Phase::Playing { level },
        (Phase::Playing { .. }, Signal::Back) => Phase::Title,
        (Phase::LevelComplete { level }, Signal::Confirm) => {
            if level + 1 < level_count {
                Phase::Playing { level: level + 1 }
            } else {
                Phase::Finished
            }
        }
        (Phase::GameOver { level }, Signal::Confirm | Signal::Restart) => Phase::Playing { level },
        (Phase::GameOver { .. } | Phase::LevelComplete { .. }, Signal::Back) => Phase::Title,
        (Phase::Finished, Signal::Confirm | Signal::Back) => Phase::Title,
        (p, _) => p,
    }
}

// ══════════════════════════════════════════════════════════════
// Game
// ══════════════════════════════════════════════════════════════

struct Game {
    config: GameConfig,
    levels: Vec<LevelDef>,
    phase: Phase,
    world: Option<WorldState>,
    /// Score banked from cleared levels; a restart falls back to it.
    banked_score: u32,
    message: String,
    message_timer: f32,
}

impl Game {
    fn new(config: GameConfig) -> Self {
        let levels = load_levels(&config);
        Game {
            config,
            levels,
            phase: Phase::Title,
            world: None,
            banked_score: 0,
            message: String::new(),
            message_timer: 0.0,
        }
    }

    fn say(&mut self, msg: impl Into<String>) {
        self.message = msg.into();
        self.message_timer = MESSAGE_SECS;
    }

    fn signal(&mut self, signal: Signal) {
        let prev = self.phase;
        let next = transition(prev, signal, self.levels.len());
        if next == prev && signal != Signal::Restart {
            return;
        }
        log::debug!("phase {prev:?} -> {next:?} on {signal:?}");

        match next {
            Phase::Playing { level } => {
                match prev {
                    Phase::LevelComplete { .. } => {
                        self.banked_score = self.world.as_ref().map_or(self.banked_score, |w| w.score);
                    }
                    Phase::Title => self.banked_score = 0,
                    _ => {}
                }
                self.start_level(level);
            }
            Phase::Title => self.world = None,
            _ => {}
        }
        self.phase = self.phase_after_start(next);
    }

    /// A level that fails to load leaves the player on the title screen.
    fn phase_after_start(&self, next: Phase) -> Phase {
        match next {
            Phase::Playing { .. } if self.world.is_none() => Phase::Title,
            p => p,
        }
    }

    fn start_level(&mut self, level: usize) {
        self.world = None;
        let Some(def) = self.levels.get(level) else { return };
        match load_level(def, &self.config) {
            Ok(mut w) => {
                w.score = self.banked_score;
                self.world = Some(w);
            }
            Err(e) => {
                let msg = format!("level '{}' is broken: {e}", def.name);
                log::warn!("{msg}");
                self.say(msg);
            }
        }
    }

    fn save(&mut self) {
        let (Phase::Playing { level }, Some(w)) = (self.phase, self.world.as_ref()) else { return };
        let snap = save::capture_snapshot(w);
        match save::save_to(&self.config.save_file, level, &snap) {
            Ok(()) => self.say("saved"),
            Err(e) => self.say(format!("save failed: {e}")),
        }
    }

    fn load(&mut self) {
        match self.try_load() {
            Ok(level) => {
                self.phase = Phase::Playing { level };
                self.say("loaded");
            }
            Err(e) => self.say(format!("load failed: {e}")),
        }
    }

    fn try_load(&mut self) -> EngineResult<usize> {
        let data = save::load_from(&self.config.save_file)?;
        let def = self.levels.get(data.level).ok_or_else(|| {
            tilestep::EngineError::SaveFormat(format!("no level {}", data.level))
        })?;
        let mut w = load_level(def, &self.config)?;
        save::restore_snapshot(&mut w, &data.snapshot)?;
        self.banked_score = 0;
        self.world = Some(w);
        Ok(data.level)
    }

    fn screen(&self) -> Screen<'_> {
        match (self.phase, self.world.as_ref()) {
            (Phase::Playing { level }, Some(world)) => Screen::Playing { world, level, message: &self.message },
            (Phase::LevelComplete { level }, Some(world)) => {
                Screen::LevelComplete { world, level, last: level + 1 >= self.levels.len() }
            }
            (Phase::GameOver { level }, Some(world)) => Screen::GameOver { world, level },
            (Phase::Finished, w) => Screen::Finished {
                score: w.map_or(self.banked_score, |w| w.score),
                level_count: self.levels.len(),
            },
            _ => Screen::Title { level_count: self.levels.len(), has_save: self.config.save_file.exists() },
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Loop
// ══════════════════════════════════════════════════════════════

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = GameConfig::load();
    let mut game = Game::new(config);
    if game.levels.is_empty() {
        eprintln!("No levels found.");
        return;
    }

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let mut kb = InputState::new();
    let enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false)
        && execute!(
            std::io::stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )
        .is_ok();
    kb.honor_release = enhanced;

    let sound = SoundEngine::new();
    let result = game_loop(&mut game, &mut renderer, &mut kb, sound.as_ref());

    if enhanced {
        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
    }
    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        eprintln!("Game error: {e}");
    }

    let score = game.world.as_ref().map_or(game.banked_score, |w| w.score);
    println!("Final score: {score}");
}

const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter];
const KEYS_QUIT: &[KeyCode] = &[KeyCode::Char('q'), KeyCode::Char('Q')];
const KEYS_RESTART: &[KeyCode] = &[KeyCode::Char('r'), KeyCode::Char('R')];

fn game_loop(
    game: &mut Game,
    renderer: &mut Renderer,
    kb: &mut InputState,
    sound: Option<&SoundEngine>,
) -> std::io::Result<()> {
    let fixed = game.config.physics.fixed_timestep;
    let max_steps = game.config.physics.max_timesteps.max(1);
    let mut accumulator = 0.0_f32;
    let mut last = Instant::now();

    loop {
        kb.drain_events();
        if kb.ctrl_c_pressed() {
            break;
        }

        let playing = matches!(game.phase, Phase::Playing { .. });
        if kb.any_pressed(&[KeyCode::Esc]) {
            if game.phase == Phase::Title {
                break;
            }
            game.signal(Signal::Back);
        } else if kb.any_pressed(KEYS_QUIT) && !playing {
            break;
        } else if kb.any_pressed(KEYS_CONFIRM) {
            game.signal(Signal::Confirm);
        } else if kb.any_pressed(KEYS_RESTART) {
            game.signal(Signal::Restart);
        } else if kb.any_pressed(&[KeyCode::F(5)]) {
            game.save();
        } else if kb.any_pressed(&[KeyCode::F(9)]) {
            game.load();
        }

        let now = Instant::now();
        let frame = now.duration_since(last).as_secs_f32();
        last = now;

        if matches!(game.phase, Phase::Playing { .. }) {
            accumulator += frame;
            // Edge-triggered commands apply to the first substep only.
            let mut input = kb.frame_input();
            let mut steps = 0;
            while accumulator >= fixed && steps < max_steps {
                accumulator -= fixed;
                steps += 1;
                let Some(world) = game.world.as_mut() else { break };
                let report = step(world, input, fixed);
                input.jump = false;
                input.shoot = false;
                play_events(sound, &report.events);
                if report.outcome.is_terminal() {
                    game.signal(Signal::Ended(report.outcome));
                    accumulator = 0.0;
                    break;
                }
            }
            if steps == max_steps {
                // Fell behind; drop the backlog rather than spiral.
                accumulator = accumulator.min(fixed);
            }
        } else {
            accumulator = 0.0;
        }

        if game.message_timer > 0.0 {
            game.message_timer -= frame;
            if game.message_timer <= 0.0 {
                game.message.clear();
            }
        }

        renderer.render(&game.screen())?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_starts_first_level() {
        assert_eq!(transition(Phase::Title, Signal::Confirm, 2), Phase::Playing { level: 0 });
        assert_eq!(transition(Phase::Title, Signal::Confirm, 0), Phase::Title);
    }

    #[test]
    fn outcomes_end_play() {
        let p = Phase::Playing { level: 1 };
        assert_eq!(transition(p, Signal::Ended(Outcome::LevelComplete), 3), Phase::LevelComplete { level: 1 });
        assert_eq!(transition(p, Signal::Ended(Outcome::PlayerDied), 3), Phase::GameOver { level: 1 });
        assert_eq!(transition(p, Signal::Ended(Outcome::Running), 3), p);
    }

    #[test]
    fn clear_advances_until_last_level() {
        assert_eq!(transition(Phase::LevelComplete { level: 0 }, Signal::Confirm, 2), Phase::Playing { level: 1 });
        assert_eq!(transition(Phase::LevelComplete { level: 1 }, Signal::Confirm, 2), Phase::Finished);
        assert_eq!(transition(Phase::Finished, Signal::Confirm, 2), Phase::Title);
    }

    #[test]
    fn retry_and_back() {
        assert_eq!(transition(Phase::GameOver { level: 2 }, Signal::Confirm, 3), Phase::Playing { level: 2 });
        assert_eq!(transition(Phase::GameOver { level: 2 }, Signal::Back, 3), Phase::Title);
        assert_eq!(transition(Phase::Playing { level: 2 }, Signal::Restart, 3), Phase::Playing { level: 2 });
        assert_eq!(transition(Phase::Playing { level: 2 }, Signal::Back, 3), Phase::Title);
    }

    #[test]
    fn restart_reloads_level() {
        let mut game = Game::new(GameConfig::default());
        game.signal(Signal::Confirm);
        assert_eq!(game.phase, Phase::Playing { level: 0 });
        let world = game.world.as_mut().unwrap();
        world.tick = 99;
        world.score = 500;

        game.signal(Signal::Restart);
        let world = game.world.as_ref().unwrap();
        assert_eq!(world.tick, 0);
        assert_eq!(world.score, 0);
    }
}
