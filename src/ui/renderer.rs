/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. `Scene::capture` copies what is visible out of the world under the
///      lock, so no terminal I/O ever happens while the world is held
///   2. The scene is composed into the `front` buffer (array of Cell)
///   3. Each cell is compared with `back` (previous frame); only changed
///      cells are emitted, batched with `queue!` and flushed once
///   4. Swap front/back

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::entity::Entity;
use crate::domain::grid::{Facing, Pos};
use crate::sim::world::{Phase, World};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Differs from every real cell, forcing a full repaint.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

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
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Scene: a lock-free snapshot of what to draw
// ══════════════════════════════════════════════════════════════

/// One grid tile's look.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Glyph {
    pub ch: char,
    pub fg: Color,
}

impl Glyph {
    const FLOOR: Glyph = Glyph { ch: '·', fg: Color::DarkGrey };
}

#[derive(Clone, Debug)]
pub struct Scene {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub tiles: Vec<Glyph>,
    pub phase: Phase,
    pub collected: u32,
    pub remaining: usize,
    pub tick: u64,
}

impl Scene {
    /// Copy the drawable state out of the world. Later layers overwrite
    /// earlier ones, so the actor always shows on top.
    pub fn capture(world: &World) -> Scene {
        let width = world.width.max(0) as usize;
        let height = world.height.max(0) as usize;
        let mut tiles = vec![Glyph::FLOOR; width * height];
        let mut put = |p: Pos, glyph: Glyph| {
            if p.x >= 0 && p.y >= 0 && (p.x as usize) < width && (p.y as usize) < height {
                tiles[p.y as usize * width + p.x as usize] = glyph;
            }
        };

        for e in &world.entities {
            let (cell, glyph) = match e {
                Entity::Decor(d) => (d.cell, Glyph { ch: '~', fg: Color::DarkGreen }),
                Entity::Platform(p) => (p.visual().nearest_cell(), Glyph { ch: '=', fg: Color::DarkYellow }),
                Entity::Teleporter(t) => {
                    let fg = if t.ready() { Color::Magenta } else { Color::DarkMagenta };
                    (t.cell, Glyph { ch: 'O', fg })
                }
                Entity::Switch(s) => {
                    let (ch, fg) = if s.pressed { ('v', Color::Green) } else { ('^', Color::Yellow) };
                    (s.cell, Glyph { ch, fg })
                }
                Entity::Gate(g) => {
                    let (ch, fg) = if g.open { ('_', Color::Green) } else { ('#', Color::Red) };
                    (g.cell, Glyph { ch, fg })
                }
                Entity::Collectible(c) if c.active => (c.cell, Glyph { ch: '*', fg: Color::Yellow }),
                Entity::Collectible(_) => continue,
                Entity::Block(b) => (b.visual.nearest_cell(), Glyph { ch: '■', fg: Color::Grey }),
                Entity::Hazard(h) => (h.cell, Glyph { ch: 'X', fg: Color::Red }),
            };
            put(cell, glyph);
        }

        let actor = &world.actor;
        let ch = if !actor.alive {
            '†'
        } else {
            match actor.facing {
                Facing::North => '▲',
                Facing::East => '▶',
                Facing::South => '▼',
                Facing::West => '◀',
            }
        };
        let fg = if actor.lift > 0.0 { Color::White } else { Color::Cyan };
        put(actor.visual.nearest_cell(), Glyph { ch, fg });

        Scene {
            name: world.blueprint.name.clone(),
            width,
            height,
            tiles,
            phase: world.phase,
            collected: world.collected,
            remaining: world.active_collectibles(),
            tick: world.tick,
        }
    }

    pub fn glyph(&self, p: Pos) -> Option<Glyph> {
        if p.x < 0 || p.y < 0 { return None; }
        let (x, y) = (p.x as usize, p.y as usize);
        (x < self.width && y < self.height).then(|| self.tiles[y * self.width + x])
    }
}

// ══════════════════════════════════════════════════════════════
// Renderer
// ══════════════════════════════════════════════════════════════

/// Each grid tile is two terminal columns wide so the board looks square.
const CELL_W: usize = 2;

const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
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
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        self.back.cells.fill(Cell::INVALID);
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    /// Draw one frame. `message` is the latest status line (last event,
    /// current instruction).
    pub fn render(&mut self, scene: &Scene, message: &str) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        self.front.clear();
        self.compose(scene, message);
        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Compose: build front buffer content ──

    fn compose(&mut self, scene: &Scene, message: &str) {
        let buf_w = self.front.width;

        let phase = match scene.phase {
            Phase::Playing => "",
            Phase::Solved => "SOLVED",
            Phase::Lost => "CAUGHT",
        };
        let hud = format!(
            " {}  *{}/{}  t{}  {} ",
            scene.name,
            scene.collected,
            scene.collected as usize + scene.remaining,
            scene.tick,
            phase,
        );
        for x in 0..buf_w {
            self.front.set(x, HUD_ROW, Cell::new(' ', Color::White, HUD_BG));
        }
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);

        for gy in 0..scene.height {
            let row = MAP_ROW + gy;
            if row >= self.front.height { break; }
            for gx in 0..scene.width {
                let col = gx * CELL_W;
                if col + 1 >= buf_w { break; }
                let glyph = scene.tiles[gy * scene.width + gx];
                self.front.set(col, row, Cell::new(glyph.ch, glyph.fg, Cell::BASE_BG));
                self.front.set(col + 1, row, Cell::BLANK);
            }
        }

        let msg_row = MAP_ROW + scene.height + 1;
        if msg_row < self.front.height && !message.is_empty() {
            for x in 0..buf_w {
                self.front.set(x, msg_row, Cell::new(' ', Color::Black, MSG_BG));
            }
            self.front.put_str(0, msg_row, &format!(" {message} "), Color::Black, MSG_BG);
        }

        let help_row = MAP_ROW + scene.height + 3;
        if help_row < self.front.height {
            let help = " Space/Enter:Run  S:Stop  R:Reset  Q/Esc:Quit";
            self.front.put_str(0, help_row, help, Color::DarkGrey, Cell::BASE_BG);
        }
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        queue!(self.writer, SetForegroundColor(last_fg), SetBackgroundColor(last_bg))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) { continue; }

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
}
