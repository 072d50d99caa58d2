/// Entities: Player, Enemy, Bullet, Platform.
///
/// Every entity is an axis-aligned box (`Body`) plus a `Role` carrying the
/// kind-specific state, so an enemy can never hold a bullet's ttl and the
/// kind is always derived from the role.

use glam::Vec2;

use crate::config::BulletConfig;
use crate::error::{EngineError, EngineResult};

/// Stable identifier, unique within one world.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct EntityId(pub u32);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EntityKind {
    Player,
    Enemy,
    Bullet,
    Platform,
}

impl EntityKind {
    /// Kinds affected by gravity and able to stand on things.
    pub fn has_gravity(self) -> bool {
        matches!(self, EntityKind::Player | EntityKind::Enemy)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }
}

/// Enemy sensing state.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum AiState {
    #[default]
    Idle,
    Alert,
    Fleeing,
}

/// Who fired a bullet. No back-pointer: the firer may be gone by the time
/// the bullet hits something.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Owner {
    pub kind: EntityKind,
    pub id: EntityId,
}

// ── Body ──

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Body {
    pub pos: Vec2,
    pub vel: Vec2,
    pub acc: Vec2,
    /// Half-extents; both components positive.
    pub half: Vec2,
}

impl Body {
    pub fn left(&self) -> f32 { self.pos.x - self.half.x }
    pub fn right(&self) -> f32 { self.pos.x + self.half.x }
    pub fn top(&self) -> f32 { self.pos.y + self.half.y }
    pub fn bottom(&self) -> f32 { self.pos.y - self.half.y }

    /// Closed-interval AABB overlap (touching counts).
    pub fn overlaps(&self, other: &Body) -> bool {
        !(self.right() < other.left()
            || self.left() > other.right()
            || self.top() < other.bottom()
            || self.bottom() > other.top())
    }
}

// ── Kind-specific state ──

#[derive(Clone, Debug, PartialEq, Default)]
pub struct PlayerState {
    /// Picked up the weapon.
    pub armed: bool,
    /// Seconds until the next shot is allowed.
    pub fire_cooldown: f32,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct EnemyBrain {
    pub state: AiState,
    /// Fire-cooldown accumulator; advances only while Alert.
    pub alert_timer: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BulletState {
    pub owner: Owner,
    /// Seconds left before the bullet expires.
    pub ttl: f32,
}

/// Horizontal shuttle between two world x positions.
#[derive(Clone, Debug, PartialEq)]
pub struct PlatformPath {
    pub left: f32,
    pub right: f32,
    pub speed: f32,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Role {
    Player(PlayerState),
    Enemy(EnemyBrain),
    Bullet(BulletState),
    Platform(PlatformPath),
}

// ── Entity ──

#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub body: Body,
    /// Set by the downward resolver this frame only.
    pub grounded: bool,
    pub alive: bool,
    /// Platform this entity stood on at the end of the last frame.
    pub riding: Option<EntityId>,
    removed: bool,
    pub role: Role,
}

impl Entity {
    pub fn new(id: EntityId, role: Role, pos: Vec2, half: Vec2) -> EngineResult<Self> {
        if !(half.x > 0.0 && half.y > 0.0) || !half.is_finite() {
            return Err(EngineError::InvalidEntityConfig { hx: half.x, hy: half.y });
        }
        Ok(Entity {
            id,
            body: Body { pos, vel: Vec2::ZERO, acc: Vec2::ZERO, half },
            grounded: false,
            alive: true,
            riding: None,
            removed: false,
            role,
        })
    }

    pub fn with_velocity(mut self, vel: Vec2) -> Self {
        self.body.vel = vel;
        self
    }

    pub fn kind(&self) -> EntityKind {
        match self.role {
            Role::Player(_) => EntityKind::Player,
            Role::Enemy(_) => EntityKind::Enemy,
            Role::Bullet(_) => EntityKind::Bullet,
            Role::Platform(_) => EntityKind::Platform,
        }
    }

    /// Facing from the sign of horizontal velocity; `None` when standing still.
    pub fn facing(&self) -> Option<Facing> {
        if self.body.vel.x > 0.0 {
            Some(Facing::Right)
        } else if self.body.vel.x < 0.0 {
            Some(Facing::Left)
        } else {
            None
        }
    }

    /// Flag for end-of-frame removal. Returns `true` only the first time.
    pub fn mark_removed(&mut self) -> bool {
        if self.removed {
            return false;
        }
        self.removed = true;
        true
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Swept at the end of the frame?
    pub fn is_gone(&self) -> bool {
        self.removed || !self.alive
    }

    /// Spawn a bullet travelling along the current facing.
    ///
    /// A shooter with `v.x == 0` has no facing; firing is then a no-op.
    /// The bullet's direction is fixed here and never changes.
    pub fn shoot(&self, id: EntityId, cfg: &BulletConfig) -> Option<Entity> {
        let dir = self.facing()?.sign();
        let pos = Vec2::new(self.body.pos.x + dir * cfg.spawn_offset, self.body.pos.y);
        let role = Role::Bullet(BulletState {
            owner: Owner { kind: self.kind(), id: self.id },
            ttl: cfg.ttl,
        });
        let half = Vec2::new(cfg.half_width, cfg.half_height);
        Entity::new(id, role, pos, half)
            .ok()
            .map(|b| b.with_velocity(Vec2::new(dir * cfg.speed, 0.0)))
    }

    // ── Role accessors ──

    pub fn brain(&self) -> Option<&EnemyBrain> {
        match &self.role {
            Role::Enemy(b) => Some(b),
            _ => None,
        }
    }

    pub fn brain_mut(&mut self) -> Option<&mut EnemyBrain> {
        match &mut self.role {
            Role::Enemy(b) => Some(b),
            _ => None,
        }
    }

    pub fn player_state(&self) -> Option<&PlayerState> {
        match &self.role {
            Role::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn player_state_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.role {
            Role::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn bullet(&self) -> Option<&BulletState> {
        match &self.role {
            Role::Bullet(b) => Some(b),
            _ => None,
        }
    }

    pub fn bullet_mut(&mut self) -> Option<&mut BulletState> {
        match &mut self.role {
            Role::Bullet(b) => Some(b),
            _ => None,
        }
    }

    pub fn path(&self) -> Option<&PlatformPath> {
        match &self.role {
            Role::Platform(p) => Some(p),
            _ => None,
        }
    }

    pub fn path_mut(&mut self) -> Option<&mut PlatformPath> {
        match &mut self.role {
            Role::Platform(p) => Some(p),
            _ => None,
        }
    }
}

// ── Input ──

/// One input command, as produced by the input collaborator.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Command {
    MoveLeft,
    MoveRight,
    Jump,
    Shoot,
    None,
}

/// All commands for one frame, folded.
/// Movement is continuous (held key); jump and shoot are requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub movement: Option<Facing>,
    pub jump: bool,
    pub shoot: bool,
}

impl FrameInput {
    pub fn from_commands(cmds: &[Command]) -> Self {
        let mut input = FrameInput::default();
        for &cmd in cmds {
            input.push(cmd);
        }
        input
    }

    /// Fold one command in. Opposite moves in one frame cancel.
    pub fn push(&mut self, cmd: Command) {
        match cmd {
            Command::MoveLeft => {
                self.movement = match self.movement {
                    Some(Facing::Right) => None,
                    _ => Some(Facing::Left),
                }
            }
            Command::MoveRight => {
                self.movement = match self.movement {
                    Some(Facing::Left) => None,
                    _ => Some(Facing::Right),
                }
            }
            Command::Jump => self.jump = true,
            Command::Shoot => self.shoot = true,
            Command::None => {}
        }
    }
}
