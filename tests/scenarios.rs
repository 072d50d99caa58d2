//! Whole-level runs through `sim::step`.

use tilestep::domain::entity::{AiState, Command, FrameInput};
use tilestep::sim::level::{embedded_levels, load_level, parse_level, LevelDef};
use tilestep::sim::save;
use tilestep::{step, GameConfig, GameEvent, Outcome, WorldState};

const DT: f32 = 1.0 / 60.0;

/// Level text with solid (code 122) runs `(row, first_col, last_col)` and
/// the given `[entity]` blocks.
fn level(width: usize, height: usize, floors: &[(usize, usize, usize)], entities: &str) -> LevelDef {
    let mut grid = vec![vec![0u16; width]; height];
    for &(row, c0, c1) in floors {
        for cell in &mut grid[row][c0..=c1] {
            *cell = 122;
        }
    }
    let data: Vec<String> = grid
        .iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(","))
        .collect();
    let text = format!(
        "[header]\nname=scenario\nwidth={width}\nheight={height}\n\n[layer]\ndata=\n{}\n\n{entities}",
        data.join(",\n")
    );
    parse_level(&text).unwrap()
}

fn run(w: &mut WorldState, frames: usize) -> Vec<GameEvent> {
    let mut events = vec![];
    for _ in 0..frames {
        events.extend(step(w, FrameInput::default(), DT).events);
    }
    events
}

#[test]
fn player_lands_on_ground_row() {
    let def = level(8, 48, &[(46, 0, 7)], "[entity]\ntype=player\nlocation=4,45\n");
    let mut w = load_level(&def, &GameConfig::default()).unwrap();
    run(&mut w, 120);

    let ts = w.config.physics.tile_size;
    let eps = w.config.physics.epsilon;
    let expected = -46.0 * ts + w.config.player.half_height;
    assert!(w.player.grounded);
    assert!((w.player.body.pos.y - expected).abs() <= 2.0 * eps, "y = {}", w.player.body.pos.y);
    assert!(w.player.body.pos.y >= expected);
}

#[test]
fn enemy_patrols_between_ledge_edges() {
    let def = level(
        40,
        8,
        &[(5, 10, 20), (7, 34, 39)],
        "[entity]\ntype=player\nlocation=38,6\n\n[entity]\ntype=enemy\nlocation=15,4\n",
    );
    let mut w = load_level(&def, &GameConfig::default()).unwrap();
    let left = w.map.col_left(10);
    let right = w.map.col_right(20);

    let mut reversals = 0;
    let mut last_sign = w.enemies[0].body.vel.x.signum();
    for _ in 0..1800 {
        step(&mut w, FrameInput::default(), DT);
        let e = &w.enemies[0];
        assert!(e.alive);
        assert_eq!(e.brain().map(|b| b.state), Some(AiState::Idle));
        assert!(e.body.pos.x >= left && e.body.pos.x <= right, "x = {}", e.body.pos.x);
        let sign = e.body.vel.x.signum();
        if sign != last_sign {
            reversals += 1;
            last_sign = sign;
        }
    }
    assert!(reversals >= 4, "only {reversals} reversals");
    assert_eq!(w.outcome, Outcome::Running);
}

#[test]
fn fleeing_enemy_jumps_off_ledge() {
    let def = level(
        30,
        10,
        &[(5, 10, 14), (9, 0, 29)],
        "[entity]\ntype=player\nlocation=11,4\n\n[entity]\ntype=enemy\nlocation=13,4\n",
    );
    let mut w = load_level(&def, &GameConfig::default()).unwrap();
    run(&mut w, 10);
    let rest_y = w.enemies[0].body.pos.y;
    assert_eq!(w.enemies[0].brain().map(|b| b.state), Some(AiState::Fleeing));
    assert!(w.enemies[0].body.vel.x > 0.0);

    let mut peak = rest_y;
    for _ in 0..60 {
        step(&mut w, FrameInput::default(), DT);
        if let Some(e) = w.enemies.first() {
            peak = peak.max(e.body.pos.y);
        }
    }
    assert!(peak > rest_y + 0.1, "no jump: rest {rest_y} peak {peak}");
}

#[test]
fn player_walks_off_map_edge_and_dies() {
    let def = level(6, 4, &[(3, 0, 2)], "[entity]\ntype=player\nlocation=1,2\n");
    let mut w = load_level(&def, &GameConfig::default()).unwrap();
    let right = FrameInput::from_commands(&[Command::MoveRight]);

    let mut outcome = Outcome::Running;
    for _ in 0..600 {
        outcome = step(&mut w, right, DT).outcome;
        if outcome.is_terminal() {
            break;
        }
    }
    assert_eq!(outcome, Outcome::PlayerDied);
}

#[test]
fn demo_levels_load_and_run() {
    let cfg = GameConfig::default();
    let levels = embedded_levels();
    assert!(!levels.is_empty());
    for def in &levels {
        let mut w = load_level(def, &cfg).unwrap();
        run(&mut w, 300);
        assert!(w.tick > 0, "{} never stepped", def.name);
        if !w.outcome.is_terminal() {
            assert!(w.player.grounded, "{}: player not resting on anything", def.name);
        }
    }
}

#[test]
fn save_file_round_trip_continues_identically() {
    let cfg = GameConfig::default();
    let def = &embedded_levels()[0];
    let mut w = load_level(def, &cfg).unwrap();
    run(&mut w, 45);

    let path = std::env::temp_dir().join(format!("tilestep-scenario-{}.sav", std::process::id()));
    save::save_to(&path, 0, &save::capture_snapshot(&w)).unwrap();
    let data = save::load_from(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let mut restored = load_level(def, &cfg).unwrap();
    save::restore_snapshot(&mut restored, &data.snapshot).unwrap();
    assert_eq!(data.level, 0);
    assert_eq!(restored.tick, w.tick);

    let input = FrameInput::from_commands(&[Command::MoveRight]);
    for _ in 0..90 {
        let a = step(&mut w, input, DT);
        let b = step(&mut restored, input, DT);
        assert_eq!(a, b);
    }
    assert_eq!(w.player.body.pos, restored.player.body.pos);
    assert_eq!(w.score, restored.score);
}
