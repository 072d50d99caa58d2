/// Presentation layer: double-buffered, diff-based terminal renderer.
///
///   1. Compose the next frame into `front` (one `Cell` per terminal column)
///   2. Compare each cell with `back` (the previous frame)
///   3. Queue terminal commands only for cells that changed, flush once
///   4. Swap front/back
///
/// One tile is two terminal columns wide. The camera keeps the player's
/// tile near the centre of the viewport and clamps to the map edges.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use tilestep::domain::entity::{AiState, Entity, EntityKind};
use tilestep::domain::tile::{TileClass, TriggerKind};
use tilestep::domain::tilemap::Tilemap;
use tilestep::sim::world::WorldState;

// ── Cell ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit background for every empty cell, matched by every Clear,
    /// so row gaps never show the terminal's own default colour.
    const BASE_BG: Color = Color::Rgb { r: 18, g: 20, b: 30 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Differs from any composed cell; forces a full repaint.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = if bg == Color::Reset { Self::BASE_BG } else { bg };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }
}

// ── Camera ──

/// Top-left tile of the viewport and its size in tiles.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Camera {
    pub col: i32,
    pub row: i32,
    pub view_w: usize,
    pub view_h: usize,
}

impl Camera {
    /// Centre on (col, row), clamped so the view never leaves the map
    /// unless the map is smaller than the view.
    pub fn follow(&mut self, col: i32, row: i32, map_w: usize, map_h: usize) {
        self.col = Self::axis(col, self.view_w, map_w);
        self.row = Self::axis(row, self.view_h, map_h);
    }

    fn axis(target: i32, view: usize, map: usize) -> i32 {
        if view >= map {
            return 0;
        }
        let max = (map - view) as i32;
        (target - view as i32 / 2).clamp(0, max)
    }

    /// Screen offset of a tile, if it is inside the view.
    pub fn to_view(&self, col: i32, row: i32) -> Option<(usize, usize)> {
        let vx = col - self.col;
        let vy = row - self.row;
        if vx < 0 || vy < 0 || vx as usize >= self.view_w || vy as usize >= self.view_h {
            return None;
        }
        Some((vx as usize, vy as usize))
    }
}

// ── Screens ──

/// What to draw this frame.
pub enum Screen<'a> {
    Title { level_count: usize, has_save: bool },
    Playing { world: &'a WorldState, level: usize, message: &'a str },
    LevelComplete { world: &'a WorldState, level: usize, last: bool },
    GameOver { world: &'a WorldState, level: usize },
    Finished { score: u32, level_count: usize },
}

impl Screen<'_> {
    fn id(&self) -> u8 {
        match self {
            Screen::Title { .. } => 0,
            Screen::Playing { .. } => 1,
            Screen::LevelComplete { .. } => 2,
            Screen::GameOver { .. } => 3,
            Screen::Finished { .. } => 4,
        }
    }
}

/// Each tile spans two terminal columns.
const CELL_W: usize = 2;

const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;
/// HUD, gap, message line and help line.
const RESERVED_ROWS: usize = MAP_ROW + 2;

const GOLD: Color = Color::Rgb { r: 255, g: 210, b: 60 };
const GREEN: Color = Color::Rgb { r: 90, g: 240, b: 110 };
const RED: Color = Color::Rgb { r: 255, g: 70, b: 70 };
const SKY: Color = Color::Rgb { r: 110, g: 190, b: 255 };

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_screen: Option<u8>,
    camera: Camera,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_screen: None,
            camera: Camera::default(),
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;
        self.sync_size(true)
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    /// Pick up a terminal resize; a changed size forces a full repaint.
    fn sync_size(&mut self, force: bool) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        let (tw, th) = (tw as usize, th as usize);
        if force || tw != self.term_w || th != self.term_h {
            self.term_w = tw;
            self.term_h = th;
            self.front.resize(tw, th);
            self.back.resize(tw, th);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }
        Ok(())
    }

    pub fn render(&mut self, screen: &Screen) -> io::Result<()> {
        self.sync_size(false)?;

        if self.last_screen != Some(screen.id()) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_screen = Some(screen.id());
        }

        self.front.clear();
        match *screen {
            Screen::Title { level_count, has_save } => self.compose_title(level_count, has_save),
            Screen::Playing { world, level, message } => self.compose_game(world, level, message),
            Screen::LevelComplete { world, level, last } => {
                self.compose_game(world, level, "");
                let next = if last { "ENTER: Finish" } else { "ENTER: Next level" };
                self.compose_banner("LEVEL CLEAR", GREEN, world.score, next);
            }
            Screen::GameOver { world, level } => {
                self.compose_game(world, level, "");
                self.compose_banner("YOU DIED", RED, world.score, "ENTER: Retry   ESC: Title");
            }
            Screen::Finished { score, level_count } => self.compose_finished(score, level_count),
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        // Explicit base colours; ResetColor would fall back to the
        // terminal's default background.
        queue!(self.writer, SetForegroundColor(last_fg), SetBackgroundColor(last_bg))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    continue;
                }
                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }

    // ── Compose ──

    fn compose_game(&mut self, w: &WorldState, level: usize, message: &str) {
        let map = &w.map;
        self.camera.view_w = (self.term_w / CELL_W).min(map.width());
        self.camera.view_h = self.term_h.saturating_sub(RESERVED_ROWS).max(1).min(map.height());
        let (pc, pr) = map.world_to_tile(w.player.body.pos.x, w.player.body.pos.y);
        self.camera.follow(pc, pr, map.width(), map.height());

        // HUD
        let armed = w.player.player_state().map_or(false, |p| p.armed);
        let hud = format!(
            " L{} {}   SCORE {:>6}   {}",
            level + 1,
            w.level_name,
            w.score,
            if armed { "ARMED" } else { "-----" }
        );
        self.front.put_str(0, HUD_ROW, &hud, GOLD, Color::Reset);

        // Tiles
        let cam = self.camera;
        for vy in 0..cam.view_h {
            for vx in 0..cam.view_w {
                let (col, row) = (cam.col + vx as i32, cam.row + vy as i32);
                let (glyph, fg, bg) = tile_glyph(map.classify(col, row));
                self.put_tile(vx, vy, glyph, fg, bg);
            }
        }

        // Entities: platforms underneath, player on top.
        for p in &w.platforms {
            self.put_entity(map, p);
        }
        for b in w.bullets.iter().filter(|b| !b.is_gone()) {
            self.put_entity(map, b);
        }
        for e in w.enemies.iter().filter(|e| !e.is_gone()) {
            self.put_entity(map, e);
        }
        if w.player.alive {
            self.put_entity(map, &w.player);
        }

        // Message + help
        let msg_row = MAP_ROW + cam.view_h;
        if !message.is_empty() {
            self.front.put_str(1, msg_row, message, SKY, Color::Reset);
        }
        self.front.put_str(
            1,
            msg_row + 1,
            "←→/AD move  ↑/W/SPACE jump  F/J shoot  R restart  F5 save  F9 load  ESC quit",
            Color::DarkGrey,
            Color::Reset,
        );
    }

    fn put_tile(&mut self, vx: usize, vy: usize, glyph: [char; 2], fg: Color, bg: Color) {
        let x = vx * CELL_W;
        let y = MAP_ROW + vy;
        self.front.set(x, y, Cell::new(glyph[0], fg, bg));
        self.front.set(x + 1, y, Cell::new(glyph[1], fg, bg));
    }

    /// Draw an entity over every tile its box covers.
    fn put_entity(&mut self, map: &Tilemap, e: &Entity) {
        let (glyph, fg) = entity_glyph(e);
        let b = &e.body;
        let inset = map.tile_size() * 0.01;
        let (c0, r0) = map.world_to_tile(b.left() + inset, b.top() - inset);
        let (c1, r1) = map.world_to_tile(b.right() - inset, b.bottom() + inset);
        for row in r0..=r1 {
            for col in c0..=c1 {
                if let Some((vx, vy)) = self.camera.to_view(col, row) {
                    let bg = self.front.get(vx * CELL_W, MAP_ROW + vy).bg;
                    self.put_tile(vx, vy, glyph, fg, bg);
                }
            }
        }
    }

    fn compose_banner(&mut self, title: &str, color: Color, score: u32, hint: &str) {
        let w = 34;
        let x = (self.front.width.saturating_sub(w)) / 2;
        let y = MAP_ROW + 2;
        let bg = Color::Rgb { r: 30, g: 30, b: 45 };
        for dy in 0..5 {
            for dx in 0..w {
                self.front.set(x + dx, y + dy, Cell::new(' ', color, bg));
            }
        }
        self.front.put_str(x + (w - title.len()) / 2, y + 1, title, color, bg);
        let line = format!("Score {score}");
        self.front.put_str(x + (w - line.len()) / 2, y + 2, &line, Color::White, bg);
        self.front.put_str(x + (w.saturating_sub(hint.len())) / 2, y + 3, hint, Color::DarkGrey, bg);
    }

    fn compose_title(&mut self, level_count: usize, has_save: bool) {
        let title = [
            r" _   _ _           _                ",
            r"| |_(_) | ___  ___| |_ ___ _ __     ",
            r"| __| | |/ _ \/ __| __/ _ \ '_ \    ",
            r"| |_| | |  __/\__ \ ||  __/ |_) |   ",
            r" \__|_|_|\___||___/\__\___| .__/    ",
            r"                          |_|       ",
        ];
        for (i, line) in title.iter().enumerate() {
            self.front.put_str(4, 2 + i, line, GOLD, Color::Reset);
        }

        let base = 10;
        self.front.put_str(6, base, "ENTER   Start", GREEN, Color::Reset);
        if has_save {
            self.front.put_str(6, base + 1, "  F9    Continue saved game", GOLD, Color::Reset);
        } else {
            self.front.put_str(6, base + 1, "  F9    Continue  (no save)", Color::DarkGrey, Color::Reset);
        }
        self.front.put_str(6, base + 2, "  Q     Quit", Color::White, Color::Reset);
        let info = format!("{level_count} levels loaded");
        self.front.put_str(6, base + 4, &info, Color::DarkGrey, Color::Reset);

        let legend: [(&str, [char; 2], Color); 6] = [
            ("you", ['@', '@'], GREEN),
            ("enemy", ['ö', 'ö'], GOLD),
            ("hazard", ['^', '^'], RED),
            ("weapon", ['¶', ' '], SKY),
            ("key / switch", ['♦', ' '], GOLD),
            ("exit", ['[', ']'], GREEN),
        ];
        for (i, (name, glyph, color)) in legend.iter().enumerate() {
            let y = base + 6 + i;
            let s: String = glyph.iter().collect();
            self.front.put_str(8, y, &s, *color, Color::Reset);
            self.front.put_str(12, y, name, Color::White, Color::Reset);
        }
    }

    fn compose_finished(&mut self, score: u32, level_count: usize) {
        self.front.put_str(6, 4, "*  ALL LEVELS CLEARED  *", GOLD, Color::Reset);
        let s = format!("Final score: {score}");
        let l = format!("{level_count} of {level_count} levels");
        self.front.put_str(6, 6, &s, Color::White, Color::Reset);
        self.front.put_str(6, 7, &l, GREEN, Color::Reset);
        self.front.put_str(6, 9, "ENTER / ESC: Back to title", Color::DarkGrey, Color::Reset);
    }
}

fn tile_glyph(class: TileClass) -> ([char; 2], Color, Color) {
    match class {
        TileClass::Empty => ([' ', ' '], Color::White, Color::Reset),
        TileClass::Solid => (['▓', '▓'], Color::Rgb { r: 120, g: 110, b: 140 }, Color::Rgb { r: 60, g: 55, b: 75 }),
        TileClass::Hazard => (['^', '^'], RED, Color::Reset),
        TileClass::Collectible => (['$', ' '], GOLD, Color::Reset),
        TileClass::Trigger(kind) => match kind {
            TriggerKind::WeaponPickup => (['¶', ' '], SKY, Color::Reset),
            TriggerKind::LaunchPad => (['⇈', '⇈'], GREEN, Color::Reset),
            TriggerKind::Key { .. } => (['♦', ' '], GOLD, Color::Reset),
            TriggerKind::Switch { .. } => (['[', '♦'], GOLD, Color::Rgb { r: 60, g: 55, b: 75 }),
            TriggerKind::Exit => (['[', ']'], GREEN, Color::Rgb { r: 20, g: 60, b: 30 }),
        },
    }
}

fn entity_glyph(e: &Entity) -> ([char; 2], Color) {
    match e.kind() {
        EntityKind::Player => {
            let armed = e.player_state().map_or(false, |p| p.armed);
            (['@', '@'], if armed { SKY } else { GREEN })
        }
        EntityKind::Enemy => match e.brain().map(|b| b.state).unwrap_or_default() {
            AiState::Idle => (['ö', 'ö'], Color::Rgb { r: 200, g: 160, b: 90 }),
            AiState::Alert => (['Ö', 'Ö'], GOLD),
            AiState::Fleeing => (['ö', 'ö'], RED),
        },
        EntityKind::Bullet => (['-', '-'], Color::White),
        EntityKind::Platform => (['=', '='], SKY),
    }
}
