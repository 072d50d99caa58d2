/// Collision resolver: axis-separated AABB vs tilemap.
///
/// ## Per-entity order
///
///   1. `integrate`:      friction (lerp toward rest), input, gravity
///   2. `advance_y`:      move along Y, resolve against the tile above/below
///   3. `ride_platforms`: snap onto a platform landed on from above
///   4. `advance_x`:      move along X, resolve against the sides
///
/// Y is resolved before X so an entity walking along the ground never sees
/// the floor as a wall.
///
/// ## Probes
///
/// Vertical probes sit at the entity's horizontal centre; horizontal probes
/// at its vertical centre. The downward probe reaches `2·epsilon` below the
/// feet, so an entity resting `epsilon` above its floor still finds it and
/// `grounded` holds steady frame after frame.
///
/// The resolver never fires triggers itself: it reports what it touched in
/// `Contacts` and the step decides what happens.

use glam::Vec2;

use super::entity::{Body, Entity, EntityId, EntityKind, Facing};
use super::tile::{TileClass, TriggerKind};
use super::tilemap::Tilemap;
use crate::config::PhysicsConfig;

/// Linear interpolation; `t` is clamped to `[0, 1]` so a long frame cannot
/// overshoot rest.
pub fn lerp(v0: f32, v1: f32, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    (1.0 - t) * v0 + t * v1
}

/// A trigger tile touched this frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TriggerHit {
    pub col: i32,
    pub row: i32,
    pub kind: TriggerKind,
}

/// What the resolver touched during one axis pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Contacts {
    pub landed: bool,
    pub ceiling: bool,
    pub wall: Option<Facing>,
    pub hazard: bool,
    pub triggers: Vec<TriggerHit>,
}

impl Contacts {
    fn note_trigger(&mut self, col: i32, row: i32, class: TileClass) {
        if let Some(kind) = class.trigger() {
            self.triggers.push(TriggerHit { col, row, kind });
        }
    }
}

/// Horizontal carry from a platform the entity is standing on.
#[derive(Clone, Copy, Debug)]
pub struct Carrier {
    pub vx: f32,
    /// Share of the player's input acceleration added on top.
    pub input_factor: f32,
}

// ══════════════════════════════════════════════════════════════
// Integration
// ══════════════════════════════════════════════════════════════

/// Update velocity from acceleration, friction and gravity.
///
/// Players decay horizontally toward rest; an enemy's horizontal velocity is
/// its patrol command and is left alone. Bullets and platforms are
/// kinematic and skip this entirely.
pub fn integrate(e: &mut Entity, phys: &PhysicsConfig, carrier: Option<Carrier>, elapsed: f32) {
    let kind = e.kind();
    if !kind.has_gravity() {
        return;
    }
    let b = &mut e.body;

    match (kind, carrier) {
        (EntityKind::Player, Some(c)) => {
            b.vel.x = c.vx + b.acc.x * c.input_factor;
        }
        (EntityKind::Player, None) => {
            b.vel.x = lerp(b.vel.x, 0.0, elapsed * phys.friction_x);
            b.vel.x += b.acc.x * elapsed;
        }
        (_, Some(c)) => {
            // Enemies keep their patrol velocity and are carried along.
            b.pos.x += c.vx * elapsed;
        }
        _ => {}
    }

    b.vel.y = lerp(b.vel.y, 0.0, elapsed * phys.friction_y);
    b.vel.y += (b.acc.y - phys.gravity) * elapsed;
}

// ══════════════════════════════════════════════════════════════
// Y axis
// ══════════════════════════════════════════════════════════════

/// Advance along Y and resolve against the tile above (rising) or below
/// (falling or resting). Recomputes `grounded`.
pub fn advance_y(e: &mut Entity, map: &Tilemap, phys: &PhysicsConfig, elapsed: f32) -> Contacts {
    let mut contacts = Contacts::default();
    let eps = phys.epsilon;
    e.grounded = false;
    e.body.pos.y += e.body.vel.y * elapsed;

    let (col, _) = map.world_to_tile(e.body.pos.x, e.body.pos.y);

    if e.body.vel.y > 0.0 {
        let (_, row) = map.world_to_tile(e.body.pos.x, e.body.top());
        let class = map.classify(col, row);
        if class.is_blocking() {
            let penetration = e.body.top() - map.row_bottom(row);
            e.body.pos.y -= penetration + eps;
            e.body.vel.y = 0.0;
            contacts.ceiling = true;
        }
        return contacts;
    }

    let (_, row) = map.world_to_tile(e.body.pos.x, e.body.bottom() - 2.0 * eps);
    let class = map.classify(col, row);
    match class {
        c if c.is_blocking() || c == TileClass::Hazard => {
            let penetration = map.row_top(row) - e.body.bottom();
            e.body.pos.y += penetration + eps;
            e.body.vel.y = 0.0;
            if c == TileClass::Hazard {
                contacts.hazard = true;
            } else {
                e.grounded = true;
                contacts.landed = true;
            }
            contacts.note_trigger(col, row, c);
        }
        TileClass::Trigger(_) => contacts.note_trigger(col, row, class),
        _ => {}
    }
    contacts
}

// ══════════════════════════════════════════════════════════════
// Platforms
// ══════════════════════════════════════════════════════════════

/// Snap onto a platform landed on from above. Overlap from any other
/// direction falls through. Returns the platform ridden, if any.
///
/// Skipped while rising, so platforms are one-way from below.
pub fn ride_platforms(e: &mut Entity, platforms: &[Entity], eps: f32) -> Option<EntityId> {
    e.riding = None;
    if e.grounded || e.body.vel.y > 0.0 || !e.kind().has_gravity() {
        return None;
    }
    let mut probe = e.body;
    probe.pos.y -= 2.0 * eps;

    for p in platforms.iter().filter(|p| !p.is_gone()) {
        if !probe.overlaps(&p.body) {
            continue;
        }
        if e.body.bottom() > p.body.bottom() {
            let penetration = p.body.top() - e.body.bottom();
            e.body.pos.y += penetration + eps;
            e.body.vel.y = 0.0;
            e.grounded = true;
            e.riding = Some(p.id);
            return Some(p.id);
        }
    }
    None
}

/// Move a platform along its path. Inactive platforms stay put.
/// Returns the horizontal displacement applied.
pub fn move_platform(p: &mut Entity, elapsed: f32) -> f32 {
    let (left, right, speed, active) = match p.path() {
        Some(path) => (path.left, path.right, path.speed, path.active),
        None => return 0.0,
    };
    let b = &mut p.body;
    if !active {
        b.vel.x = 0.0;
        return 0.0;
    }
    if b.vel.x == 0.0 {
        b.vel.x = speed;
    }
    let before = b.pos.x;
    b.pos.x += b.vel.x * elapsed;
    if b.pos.x > right {
        b.pos.x = right;
        b.vel.x = -speed.abs();
    } else if b.pos.x < left {
        b.pos.x = left;
        b.vel.x = speed.abs();
    }
    b.pos.x - before
}

/// Start a platform shuttling. Returns `false` if it was already running.
pub fn activate_platform(p: &mut Entity) -> bool {
    let Some(path) = p.path_mut() else { return false };
    if path.active {
        return false;
    }
    path.active = true;
    let speed = path.speed;
    p.body.vel.x = speed;
    true
}

// ══════════════════════════════════════════════════════════════
// X axis
// ══════════════════════════════════════════════════════════════

/// Advance along X and resolve against the tiles at either side.
///
/// Response by kind on a blocking tile:
///   Enemy  → bounce (velocity points away from the wall)
///   Bullet → flagged for removal
///   Player → stops
pub fn advance_x(e: &mut Entity, map: &Tilemap, phys: &PhysicsConfig, elapsed: f32) -> Contacts {
    let mut contacts = Contacts::default();
    let eps = phys.epsilon;
    let kind = e.kind();
    e.body.pos.x += e.body.vel.x * elapsed;

    let y = e.body.pos.y;
    let (col_l, row) = map.world_to_tile(e.body.left(), y);
    let (col_r, _) = map.world_to_tile(e.body.right(), y);
    let class_l = map.classify(col_l, row);
    let class_r = map.classify(col_r, row);

    // Enemies treat hazards as walls; players die in them.
    let blocks = |c: TileClass| c.is_wall() || (kind == EntityKind::Enemy && c == TileClass::Hazard);

    // Leading side first, so a fast mover whose both probes land in the
    // same wall cell is pushed back, not through.
    let order = if e.body.vel.x > 0.0 {
        [Facing::Right, Facing::Left]
    } else {
        [Facing::Left, Facing::Right]
    };
    for side in order {
        match side {
            Facing::Left if blocks(class_l) => {
                let penetration = map.col_right(col_l) - e.body.left();
                e.body.pos.x += penetration + eps;
            }
            Facing::Right if blocks(class_r) => {
                let penetration = e.body.right() - map.col_left(col_r);
                e.body.pos.x -= penetration + eps;
            }
            _ => continue,
        }
        contacts.wall = Some(side);
        break;
    }
    if contacts.wall.is_none() && (class_l == TileClass::Hazard || class_r == TileClass::Hazard) {
        contacts.hazard = true;
    }

    // Launch pads fire only from the Y pass.
    let side_trigger = |c: TileClass| c.trigger().filter(|&k| k != TriggerKind::LaunchPad).map(TileClass::Trigger);
    if let Some(c) = side_trigger(class_l) {
        contacts.note_trigger(col_l, row, c);
    }
    if col_r != col_l {
        if let Some(c) = side_trigger(class_r) {
            contacts.note_trigger(col_r, row, c);
        }
    }

    if let Some(side) = contacts.wall {
        match kind {
            EntityKind::Enemy => {
                let speed = e.body.vel.x.abs();
                e.body.vel.x = match side {
                    Facing::Left => speed,
                    Facing::Right => -speed,
                };
            }
            EntityKind::Bullet => {
                e.mark_removed();
            }
            EntityKind::Player => e.body.vel.x = 0.0,
            EntityKind::Platform => {}
        }
    }
    contacts
}

/// Has the entity dropped entirely below the map?
pub fn fell_out(body: &Body, map: &Tilemap) -> bool {
    body.top() < map.bottom_y()
}

/// Depth by which `body` overlaps the cell `(col, row)`; zero if apart.
pub fn penetration_depth(body: &Body, map: &Tilemap, col: i32, row: i32) -> Vec2 {
    let dx = body.right().min(map.col_right(col)) - body.left().max(map.col_left(col));
    let dy = body.top().min(map.row_top(row)) - body.bottom().max(map.row_bottom(row));
    if dx <= 0.0 || dy <= 0.0 {
        Vec2::ZERO
    } else {
        Vec2::new(dx, dy)
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{EnemyBrain, PlatformPath, PlayerState, Role};
    use crate::domain::tile::{TileCode, TileTable};
    use proptest::prelude::*;

    const TS: f32 = 0.25;
    const DT: f32 = 1.0 / 60.0;

    fn phys() -> PhysicsConfig {
        PhysicsConfig::default()
    }

    fn table() -> TileTable {
        let mut t = TileTable::new();
        t.insert(TileCode(1), TileClass::Solid);
        t.insert(TileCode(2), TileClass::Hazard);
        t.insert(TileCode(3), TileClass::Trigger(TriggerKind::LaunchPad));
        t.insert(TileCode(5), TileClass::Trigger(TriggerKind::Switch { becomes: TileCode(1) }));
        t
    }

    fn tiles_from(rows: &[&str]) -> Tilemap {
        let rows: Vec<Vec<u16>> = rows
            .iter()
            .map(|r| {
                r.chars()
                    .map(|ch| match ch {
                        '#' => 1,
                        '^' => 2,
                        'L' => 3,
                        'S' => 5,
                        _ => 0,
                    })
                    .collect()
            })
            .collect();
        Tilemap::from_rows(&rows, TS, table()).unwrap()
    }

    /// `height` rows, solid floor on `floor_row`.
    fn floor_map(width: usize, height: usize, floor_row: usize) -> Tilemap {
        let mut rows = vec![vec![0u16; width]; height];
        rows[floor_row] = vec![1; width];
        Tilemap::from_rows(&rows, TS, table()).unwrap()
    }

    fn player_at(map: &Tilemap, col: i32, row: i32) -> Entity {
        Entity::new(
            EntityId(0),
            Role::Player(PlayerState::default()),
            map.tile_center(col, row),
            Vec2::new(TS * 0.375, TS * 0.5),
        )
        .unwrap()
    }

    fn enemy_at(map: &Tilemap, col: i32, row: i32, vx: f32) -> Entity {
        Entity::new(EntityId(1), Role::Enemy(EnemyBrain::default()), map.tile_center(col, row), Vec2::splat(TS * 0.5))
            .unwrap()
            .with_velocity(Vec2::new(vx, 0.0))
    }

    fn frame(e: &mut Entity, map: &Tilemap) -> (Contacts, Contacts) {
        let p = phys();
        integrate(e, &p, None, DT);
        let y = advance_y(e, map, &p, DT);
        let x = advance_x(e, map, &p, DT);
        (y, x)
    }

    #[test]
    fn lerp_is_clamped() {
        assert_eq!(lerp(4.0, 0.0, 0.5), 2.0);
        assert_eq!(lerp(4.0, 0.0, 3.0), 0.0);
        assert_eq!(lerp(4.0, 0.0, -1.0), 4.0);
    }

    #[test]
    fn friction_pulls_toward_rest() {
        let map = floor_map(10, 5, 4);
        let mut e = player_at(&map, 5, 3);
        e.body.vel.x = 1.0;
        let p = phys();
        integrate(&mut e, &p, None, 0.5);
        assert!((e.body.vel.x - lerp(1.0, 0.0, 0.5 * p.friction_x)).abs() < 1e-6);
    }

    #[test]
    fn player_lands_on_row_46() {
        let map = floor_map(8, 48, 46);
        let mut e = player_at(&map, 4, 45);
        for _ in 0..30 {
            frame(&mut e, &map);
        }
        let expected = -46.0 * TS + e.body.half.y;
        assert!(e.grounded);
        assert_eq!(e.body.vel.y, 0.0);
        assert!((e.body.pos.y - expected).abs() <= phys().epsilon * 1.5, "y = {}", e.body.pos.y);
    }

    #[test]
    fn player_falls_then_lands() {
        let map = floor_map(8, 48, 46);
        let mut e = player_at(&map, 4, 40);
        let (y, _) = frame(&mut e, &map);
        assert!(!y.landed);
        assert!(!e.grounded);
        for _ in 0..120 {
            frame(&mut e, &map);
        }
        assert!(e.grounded);
        assert!((e.body.bottom() - map.row_top(46)).abs() <= phys().epsilon * 1.5);
    }

    #[test]
    fn grounded_is_stable_at_rest() {
        let map = floor_map(8, 10, 9);
        let mut e = player_at(&map, 4, 8);
        for _ in 0..10 {
            frame(&mut e, &map);
        }
        let rest = e.body.pos.y;
        for _ in 0..300 {
            frame(&mut e, &map);
            assert!(e.grounded);
            assert!((e.body.pos.y - rest).abs() < 1e-4);
        }
    }

    #[test]
    fn grounded_is_stable_with_tiny_timestep() {
        let map = floor_map(8, 10, 9);
        let mut e = player_at(&map, 4, 8);
        let p = phys();
        for _ in 0..20 {
            frame(&mut e, &map);
        }
        for _ in 0..100 {
            integrate(&mut e, &p, None, 0.001);
            advance_y(&mut e, &map, &p, 0.001);
            assert!(e.grounded);
        }
    }

    #[test]
    fn ceiling_stops_rise() {
        let map = tiles_from(&["###", "   ", "   ", "###"]);
        let mut e = player_at(&map, 1, 1);
        e.body.vel.y = 3.0;
        let p = phys();
        let c = advance_y(&mut e, &map, &p, 0.05);
        assert!(c.ceiling);
        assert_eq!(e.body.vel.y, 0.0);
        assert!(e.body.top() <= map.row_bottom(0));
        assert!(!e.grounded);
    }

    #[test]
    fn player_stops_at_wall() {
        let map = tiles_from(&["     ", "#   #", "#####"]);
        let mut e = player_at(&map, 3, 1);
        e.body.vel.x = 5.0;
        let c = advance_x(&mut e, &map, &phys(), 0.05);
        assert_eq!(c.wall, Some(Facing::Right));
        assert_eq!(e.body.vel.x, 0.0);
        assert!(e.body.right() < map.col_left(4));
    }

    #[test]
    fn enemy_bounces_off_walls() {
        let map = tiles_from(&["     ", "#   #", "#####"]);
        let mut e = enemy_at(&map, 1, 1, -5.0);
        advance_x(&mut e, &map, &phys(), 0.05);
        assert!(e.body.vel.x > 0.0);
        assert!(e.body.left() > map.col_right(0));
        // Hitting the same wall again never flips it back toward the wall.
        advance_x(&mut e, &map, &phys(), 0.0);
        assert!(e.body.vel.x > 0.0);
    }

    #[test]
    fn enemy_treats_hazard_as_wall() {
        let map = tiles_from(&["     ", "^   #", "#####"]);
        let mut e = enemy_at(&map, 1, 1, -5.0);
        let c = advance_x(&mut e, &map, &phys(), 0.05);
        assert_eq!(c.wall, Some(Facing::Left));
        assert!(!c.hazard);
        assert!(e.body.vel.x > 0.0);
    }

    #[test]
    fn player_touching_hazard_side_reports_it() {
        let map = tiles_from(&["     ", "^   #", "#####"]);
        let mut e = player_at(&map, 1, 1);
        e.body.vel.x = -5.0;
        let c = advance_x(&mut e, &map, &phys(), 0.05);
        assert!(c.hazard);
        assert_eq!(c.wall, None);
    }

    #[test]
    fn hazard_below_reports_and_pushes_out() {
        let map = tiles_from(&["   ", "   ", "^^^"]);
        let mut e = player_at(&map, 1, 1);
        let (y, _) = frame(&mut e, &map);
        assert!(y.hazard);
        assert!(!e.grounded);
        assert!(e.body.bottom() >= map.row_top(2));
    }

    #[test]
    fn bullet_is_removed_once_on_wall() {
        let map = tiles_from(&["     ", "    #", "#####"]);
        let mut b = Entity::new(
            EntityId(3),
            Role::Bullet(crate::domain::entity::BulletState {
                owner: crate::domain::entity::Owner { kind: EntityKind::Player, id: EntityId(0) },
                ttl: 1.0,
            }),
            map.tile_center(2, 1),
            Vec2::splat(TS * 0.5),
        )
        .unwrap()
        .with_velocity(Vec2::new(1.5, 0.0));
        let mut hits = 0;
        for _ in 0..60 {
            let c = advance_x(&mut b, &map, &phys(), DT);
            if c.wall.is_some() {
                hits += 1;
            }
            if b.is_removed() {
                break;
            }
        }
        assert_eq!(hits, 1);
        assert!(b.is_removed());
        assert!(!b.mark_removed());
    }

    #[test]
    fn launch_pad_reported_below() {
        let map = tiles_from(&["   ", "   ", "#L#", "###"]);
        let mut e = player_at(&map, 1, 1);
        let (y, _) = frame(&mut e, &map);
        assert_eq!(y.triggers.len(), 1);
        assert_eq!(y.triggers[0].kind, TriggerKind::LaunchPad);
        assert_eq!((y.triggers[0].col, y.triggers[0].row), (1, 2));
    }

    #[test]
    fn launch_pad_blocks_from_side_without_firing() {
        let map = tiles_from(&["     ", "L    ", "#####"]);
        let mut e = player_at(&map, 1, 1);
        e.body.vel.x = -5.0;
        let c = advance_x(&mut e, &map, &phys(), 0.05);
        assert_eq!(c.wall, Some(Facing::Left));
        assert!(e.body.left() > map.col_right(0));
        assert!(c.triggers.is_empty());
    }

    #[test]
    fn switch_blocks_and_reports_on_side() {
        let map = tiles_from(&["     ", "S    ", "#####"]);
        let mut e = player_at(&map, 1, 1);
        e.body.vel.x = -5.0;
        let c = advance_x(&mut e, &map, &phys(), 0.05);
        assert_eq!(c.wall, Some(Facing::Left));
        assert!(matches!(c.triggers[0].kind, TriggerKind::Switch { .. }));
    }

    fn platform(map: &Tilemap, col: i32, row: i32, active: bool) -> Entity {
        let centre = map.tile_center(col, row);
        Entity::new(
            EntityId(7),
            Role::Platform(PlatformPath { left: centre.x - 1.0, right: centre.x + 1.0, speed: 2.0, active }),
            centre,
            Vec2::new(TS * 2.0, TS * 0.5),
        )
        .unwrap()
    }

    #[test]
    fn player_rides_platform_from_above() {
        let map = tiles_from(&["          "; 10]);
        let plat = platform(&map, 5, 6, false);
        let mut e = player_at(&map, 5, 5);
        e.body.pos.y -= 0.01;
        let p = phys();
        integrate(&mut e, &p, None, DT);
        advance_y(&mut e, &map, &p, DT);
        let rode = ride_platforms(&mut e, std::slice::from_ref(&plat), p.epsilon);
        assert_eq!(rode, Some(EntityId(7)));
        assert!(e.grounded);
        assert!(e.body.bottom() >= plat.body.top());
    }

    #[test]
    fn platform_from_below_falls_through() {
        let map = tiles_from(&["          "; 10]);
        let plat = platform(&map, 5, 5, false);
        let mut e = player_at(&map, 5, 5);
        // Feet below the platform's underside.
        e.body.pos.y = plat.body.bottom() - e.body.half.y + 0.05;
        let rode = ride_platforms(&mut e, std::slice::from_ref(&plat), phys().epsilon);
        assert_eq!(rode, None);
        assert!(!e.grounded);
    }

    #[test]
    fn rider_adopts_platform_velocity() {
        let map = floor_map(10, 5, 4);
        let mut e = player_at(&map, 5, 3);
        e.body.acc.x = 2.0;
        integrate(&mut e, &phys(), Some(Carrier { vx: 2.0, input_factor: 0.5 }), DT);
        assert_eq!(e.body.vel.x, 3.0);
    }

    #[test]
    fn platform_shuttles_between_ends() {
        let map = tiles_from(&["          "; 4]);
        let mut plat = platform(&map, 5, 2, false);
        assert_eq!(move_platform(&mut plat, 1.0), 0.0);
        assert!(activate_platform(&mut plat));
        assert!(!activate_platform(&mut plat));
        let start = plat.body.pos.x;
        move_platform(&mut plat, 0.4);
        assert!(plat.body.pos.x > start);
        move_platform(&mut plat, 1.0);
        assert_eq!(plat.body.pos.x, start + 1.0);
        assert!(plat.body.vel.x < 0.0);
    }

    #[test]
    fn kill_plane_below_map() {
        let map = tiles_from(&["   ", "   "]);
        let mut e = player_at(&map, 1, 1);
        assert!(!fell_out(&e.body, &map));
        e.body.pos.y = map.bottom_y() - 1.0;
        assert!(fell_out(&e.body, &map));
    }

    proptest! {
        #[test]
        fn never_left_inside_floor(
            start_row in 1i32..7,
            offset in 0.0f32..0.24,
            vy in -6.0f32..0.0,
            frames in 1usize..240,
        ) {
            let map = floor_map(6, 10, 8);
            let mut e = player_at(&map, 2, start_row);
            e.body.pos.y -= offset;
            e.body.vel.y = vy;
            for _ in 0..frames {
                frame(&mut e, &map);
                let (col, _) = map.world_to_tile(e.body.pos.x, e.body.pos.y);
                let depth = penetration_depth(&e.body, &map, col, 8);
                prop_assert!(depth.y <= phys().epsilon);
            }
        }

        #[test]
        fn never_left_inside_wall(
            start_col in prop::sample::select(vec![1i32, 2, 3, 5, 6]),
            vx in -12.0f32..12.0,
            enemy in any::<bool>(),
            frames in 1usize..240,
        ) {
            let map = tiles_from(&["#   #  #"; 5]);
            let mut e = if enemy { enemy_at(&map, start_col, 2, vx) } else { player_at(&map, start_col, 2) };
            for _ in 0..frames {
                if !enemy {
                    e.body.vel.x = vx;
                }
                advance_x(&mut e, &map, &phys(), DT);
                for col in [0, 4, 7] {
                    let depth = penetration_depth(&e.body, &map, col, 2);
                    prop_assert!(depth.x <= phys().epsilon, "col {} depth {}", col, depth.x);
                }
            }
        }
    }
}
