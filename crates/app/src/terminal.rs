//! Crossterm front-end: event pump, character canvas and control strip.

use std::{
    io::{self, Stdout, Write},
    time::Instant,
};

use crossterm::{
    cursor,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use glam::{Mat4, Vec2, Vec3, Vec4};
use morph_core::{DrawSink, Key, KeyOutcome, Result, Rgba, Session, TransportCommand, Viewport};

/// Rows under the scene: slider, progress and time, buttons.
const CONTROL_ROWS: u16 = 3;

/// Nominal pixel size of one cell, so pointer and viewport units match what
/// the rotation sensitivities expect.
const CELL_WIDTH: f32 = 8.0;
const CELL_HEIGHT: f32 = 16.0;

const SEEK_STEP_SECONDS: f64 = 5.0;

/// Segments are cut where clip-space `w` drops below this, just in front of
/// the camera, so projected coordinates stay bounded.
const MIN_CLIP_W: f32 = 1e-3;

/// Runs the interactive loop until the user quits. The terminal is restored
/// and the session closed on every exit path.
pub fn run(session: &mut Session) -> Result<()> {
    let mut stdout = io::stdout();
    let guard = TerminalGuard::enter(&mut stdout)?;
    let outcome = event_loop(session, &mut stdout);
    session.close();
    drop(guard);
    outcome
}

struct TerminalGuard;

impl TerminalGuard {
    fn enter(stdout: &mut Stdout) -> Result<Self> {
        terminal::enable_raw_mode()?;
        let guard = Self;
        execute!(
            stdout,
            terminal::EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide
        )?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = execute!(
            stdout,
            cursor::Show,
            DisableMouseCapture,
            terminal::LeaveAlternateScreen
        );
        let _ = terminal::disable_raw_mode();
    }
}

fn event_loop(session: &mut Session, out: &mut impl Write) -> Result<()> {
    let interval = session.tick_interval();
    let (cols, rows) = terminal::size()?;
    let mut canvas = TerminalCanvas::new(cols, rows.saturating_sub(CONTROL_ROWS));
    let mut slider_held = false;
    let mut last_tick = Instant::now();
    let mut next_tick = last_tick + interval;

    loop {
        let timeout = next_tick.saturating_duration_since(Instant::now());
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    if handle_key(session, key) == KeyOutcome::Quit {
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => handle_mouse(session, &canvas, &mut slider_held, mouse),
                Event::Resize(cols, rows) => {
                    canvas.resize(cols, rows.saturating_sub(CONTROL_ROWS));
                    queue!(out, terminal::Clear(ClearType::All))?;
                }
                _ => {}
            }
        }

        let now = Instant::now();
        if now < next_tick {
            continue;
        }
        session.tick(now.duration_since(last_tick).as_secs_f64());
        last_tick = now;
        next_tick = now + interval;

        draw(session, &mut canvas, out)?;
    }
}

fn handle_key(session: &mut Session, key: KeyEvent) -> KeyOutcome {
    match key.code {
        KeyCode::Char(' ') => session.on_key(Key::Space),
        KeyCode::Esc | KeyCode::Char('q') => session.on_key(Key::Escape),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            session.on_key(Key::Escape)
        }
        KeyCode::Char('p') => {
            session.toggle_play_pause();
            KeyOutcome::Continue
        }
        KeyCode::Char('r') => {
            session.toggle_rewind();
            KeyOutcome::Continue
        }
        KeyCode::Char('s') => {
            session.cycle_speed();
            KeyOutcome::Continue
        }
        KeyCode::Left => {
            let to = session.elapsed_seconds() - SEEK_STEP_SECONDS;
            session.apply(TransportCommand::Seek(to));
            KeyOutcome::Continue
        }
        KeyCode::Right => {
            let to = session.elapsed_seconds() + SEEK_STEP_SECONDS;
            session.apply(TransportCommand::Seek(to));
            KeyOutcome::Continue
        }
        _ => KeyOutcome::Continue,
    }
}

fn handle_mouse(
    session: &mut Session,
    canvas: &TerminalCanvas,
    slider_held: &mut bool,
    mouse: MouseEvent,
) {
    let on_slider = mouse.row == canvas.height;
    let slider_seconds = slider_position(mouse.column, canvas.width) * session.duration_seconds();
    let (x, y) = (
        mouse.column as f32 * CELL_WIDTH,
        mouse.row as f32 * CELL_HEIGHT,
    );

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) if on_slider => {
            *slider_held = true;
            session.on_slider_drag(slider_seconds);
        }
        MouseEventKind::Down(MouseButton::Left) => session.on_pointer_down(x, y),
        MouseEventKind::Drag(MouseButton::Left) if *slider_held => {
            session.on_slider_drag(slider_seconds)
        }
        MouseEventKind::Drag(MouseButton::Left) => session.on_pointer_move(x, y),
        MouseEventKind::Up(MouseButton::Left) if *slider_held => {
            *slider_held = false;
            session.on_slider_release(slider_seconds);
        }
        MouseEventKind::Up(MouseButton::Left) => session.on_pointer_up(x, y),
        _ => {}
    }
}

/// Fraction of the slider under `column`, in `[0, 1]`.
fn slider_position(column: u16, width: u16) -> f64 {
    if width <= 1 {
        return 0.0;
    }
    (column as f64 / (width - 1) as f64).clamp(0.0, 1.0)
}

fn draw(session: &mut Session, canvas: &mut TerminalCanvas, out: &mut impl Write) -> Result<()> {
    canvas.clear();
    let surface = canvas.surface();
    session.render(canvas, surface);
    canvas.flush(out)?;
    draw_controls(session, canvas.width, canvas.height, out)?;
    out.flush()?;
    Ok(())
}

fn draw_controls(session: &Session, width: u16, top: u16, out: &mut impl Write) -> Result<()> {
    let labels = session.labels();
    let columns = width as usize;
    let filled = ((session.normalized_progress() * columns as f64).round() as usize).min(columns);
    let bar = format!("{}{}", "=".repeat(filled), "-".repeat(columns - filled));
    let status = format!("{}   {}", labels.progress, labels.time);
    let buttons = format!(
        "[p] {}  [r] {}  [s] {}  {}  | drag: orbit  space: hold  \u{2190}\u{2192}: seek  q: quit",
        labels.play, labels.rewind, labels.speed, labels.audio
    );

    for (offset, line) in [bar, status, buttons].into_iter().enumerate() {
        let text: String = line.chars().take(columns).collect();
        queue!(
            out,
            cursor::MoveTo(0, top + offset as u16),
            terminal::Clear(ClearType::CurrentLine),
            Print(text)
        )?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    glyph: char,
    color: Rgba,
}

/// Character-cell rasteriser for wireframe lines.
pub struct TerminalCanvas {
    width: u16,
    height: u16,
    cells: Vec<Option<Cell>>,
    viewport: Viewport,
    transform: Mat4,
}

impl TerminalCanvas {
    pub fn new(width: u16, height: u16) -> Self {
        let mut canvas = Self {
            width: 0,
            height: 0,
            cells: Vec::new(),
            viewport: Viewport::new(0.0, 0.0, 0.0, 0.0),
            transform: Mat4::IDENTITY,
        };
        canvas.resize(width, height);
        canvas
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.cells = vec![None; width as usize * height as usize];
    }

    pub fn clear(&mut self) {
        self.cells.fill(None);
    }

    /// Whole canvas in nominal pixels.
    pub fn surface(&self) -> Viewport {
        Viewport::new(
            0.0,
            0.0,
            self.width as f32 * CELL_WIDTH,
            self.height as f32 * CELL_HEIGHT,
        )
    }

    #[cfg(test)]
    fn cell(&self, column: u16, row: u16) -> Option<char> {
        if column >= self.width || row >= self.height {
            return None;
        }
        self.cells[row as usize * self.width as usize + column as usize].map(|cell| cell.glyph)
    }

    /// Clip-space point to fractional cell coordinates. `clip.w` must be
    /// positive.
    fn to_cell(&self, clip: Vec4) -> Vec2 {
        let ndc = clip.truncate() / clip.w;
        let px = self.viewport.x + (ndc.x + 1.0) * 0.5 * self.viewport.width;
        let py = self.viewport.y + (1.0 - ndc.y) * 0.5 * self.viewport.height;
        Vec2::new(px / CELL_WIDTH, py / CELL_HEIGHT)
    }

    fn plot(&mut self, column: i32, row: i32, cell: Cell) {
        if column < 0 || row < 0 || column >= self.width as i32 || row >= self.height as i32 {
            return;
        }
        let index = row as usize * self.width as usize + column as usize;
        self.cells[index] = Some(cell);
    }

    fn flush(&self, out: &mut impl Write) -> Result<()> {
        let mut current: Option<Color> = None;
        for row in 0..self.height {
            queue!(out, cursor::MoveTo(0, row))?;
            let start = row as usize * self.width as usize;
            for cell in &self.cells[start..start + self.width as usize] {
                match cell {
                    Some(cell) => {
                        let color = terminal_color(cell.color);
                        if current != Some(color) {
                            queue!(out, SetForegroundColor(color))?;
                            current = Some(color);
                        }
                        queue!(out, Print(cell.glyph))?;
                    }
                    None => queue!(out, Print(' '))?,
                }
            }
        }
        queue!(out, ResetColor)?;
        Ok(())
    }
}

impl DrawSink for TerminalCanvas {
    fn begin_pass(&mut self, viewport: Viewport, transform: Mat4) {
        self.viewport = viewport;
        self.transform = transform;
    }

    fn line(&mut self, from: Vec3, to: Vec3, color: Rgba) {
        let clip_from = self.transform * from.extend(1.0);
        let clip_to = self.transform * to.extend(1.0);
        let Some((clip_from, clip_to)) = clip_near(clip_from, clip_to) else {
            return;
        };
        let (start, end) = (self.to_cell(clip_from), self.to_cell(clip_to));
        let bounds = Vec2::new(self.width as f32, self.height as f32) - 0.5;
        let Some((start, end)) = clip_to_rect(start, end, Vec2::splat(-0.5), bounds) else {
            return;
        };
        let (x0, y0, x1, y1) = (start.x, start.y, end.x, end.y);
        let cell = Cell {
            glyph: line_glyph(x1 - x0, y1 - y0, color[3]),
            color,
        };

        // Bresenham over character cells.
        let (mut x, mut y) = (x0.round() as i32, y0.round() as i32);
        let (x1, y1) = (x1.round() as i32, y1.round() as i32);
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.plot(x, y, cell);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}

/// Cuts the part of a clip-space segment that lies behind
/// [`MIN_CLIP_W`]. `None` when nothing is left.
fn clip_near(from: Vec4, to: Vec4) -> Option<(Vec4, Vec4)> {
    match (from.w >= MIN_CLIP_W, to.w >= MIN_CLIP_W) {
        (true, true) => Some((from, to)),
        (false, false) => None,
        (from_visible, _) => {
            let t = (MIN_CLIP_W - from.w) / (to.w - from.w);
            let cut = from.lerp(to, t);
            if from_visible {
                Some((from, cut))
            } else {
                Some((cut, to))
            }
        }
    }
}

/// Liang-Barsky clip of a 2D segment to the rectangle `min..=max`.
fn clip_to_rect(from: Vec2, to: Vec2, min: Vec2, max: Vec2) -> Option<(Vec2, Vec2)> {
    if !(from.is_finite() && to.is_finite()) {
        return None;
    }
    let delta = to - from;
    let (mut enter, mut exit) = (0.0_f32, 1.0_f32);
    for (p, q) in [
        (-delta.x, from.x - min.x),
        (delta.x, max.x - from.x),
        (-delta.y, from.y - min.y),
        (delta.y, max.y - from.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > exit {
                return None;
            }
            enter = enter.max(r);
        } else {
            if r < enter {
                return None;
            }
            exit = exit.min(r);
        }
    }
    Some((from + delta * enter, from + delta * exit))
}

/// Glyph for a line running `dx` columns and `dy` rows (rows grow
/// downwards). Faint lines use a dot.
fn line_glyph(dx: f32, dy: f32, alpha: f32) -> char {
    if alpha < 0.5 {
        return '.';
    }
    // Cells are about twice as tall as they are wide.
    let (run, rise) = (dx.abs(), dy.abs() * 2.0);
    if rise < run * 0.5 {
        '-'
    } else if run < rise * 0.5 {
        '|'
    } else if (dx > 0.0) == (dy > 0.0) {
        '\\'
    } else {
        '/'
    }
}

fn terminal_color(color: Rgba) -> Color {
    let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color::Rgb {
        r: channel(color[0]),
        g: channel(color[1]),
        b: channel(color[2]),
    }
}
