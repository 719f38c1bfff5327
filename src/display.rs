use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use tracing::{debug, info, warn};
use tui::backend::CrosstermBackend;
use tui::layout::{Constraint, Direction, Layout, Rect};
use tui::style::{Color, Modifier, Style};
use tui::symbols::Marker;
use tui::text::{Span, Spans};
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders, Gauge, Paragraph};
use tui::Terminal;

/// native panel size in pixels
pub const PANEL_WIDTH: usize = 320;
pub const PANEL_HEIGHT: usize = 170;

/// how often the progress bar moves during a delay
pub const DELAY_STEP_MS: u64 = 50;

// glyph cell of the panel's built-in font at text size 1
const GLYPH_HEIGHT: i16 = 8;

// text lines kept for redraw before the oldest go
const MAX_TEXT_RUNS: usize = 64;

/// 16bit 5-6-5 colour, as the panel takes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Rgb565(pub u16);

impl Rgb565 {
    pub const BLACK: Rgb565 = Rgb565(0x0000);
    pub const BLUE: Rgb565 = Rgb565(0x001F);
    pub const RED: Rgb565 = Rgb565(0xF800);
    pub const GREEN: Rgb565 = Rgb565(0x07E0);
    pub const WHITE: Rgb565 = Rgb565(0xFFFF);

    /// expand to 8 bits per channel
    pub fn to_rgb(self) -> (u8, u8, u8) {
        let r = ((self.0 >> 11) & 0x1f) as u8;
        let g = ((self.0 >> 5) & 0x3f) as u8;
        let b = (self.0 & 0x1f) as u8;
        ((r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2))
    }
}

impl From<Rgb565> for Color {
    fn from(c: Rgb565) -> Self {
        let (r, g, b) = c.to_rgb();
        Color::Rgb(r, g, b)
    }
}

/// Display is what commands and the slideshow draw on. It abstracts the
/// panel so the engine doesn't care whether it's the real thing, a terminal
/// or a test recorder.
pub trait Display {
    /// print a line at the cursor and move the cursor to the next line
    fn println(&mut self, text: &str) -> Result<(), io::Error>;

    fn set_text_color(&mut self, color: Rgb565) -> Result<(), io::Error>;

    /// scale factor for the built-in font
    fn set_text_size(&mut self, size: u8) -> Result<(), io::Error>;

    /// where the next println lands, in pixels
    fn cursor(&self) -> (i16, i16);

    fn set_cursor(&mut self, x: i16, y: i16) -> Result<(), io::Error>;

    /// paint everything, dropping any text and picture
    fn fill_screen(&mut self, color: Rgb565) -> Result<(), io::Error>;

    /// backlight level
    fn set_brightness(&mut self, level: u8) -> Result<(), io::Error>;

    /// progress bar along the bottom edge
    fn progress(&mut self, elapsed_ms: u64, total_ms: u64) -> Result<(), io::Error>;

    /// full-screen picture, row-major, exactly width * height pixels
    fn draw_picture(&mut self, pixels: &[Rgb565]) -> Result<(), io::Error>;

    /// (width, height) in pixels
    fn resolution(&self) -> (usize, usize);
}

/// Block for `ms`, moving the progress bar every [`DELAY_STEP_MS`]. A
/// display failure doesn't cut the wait short; the first one is returned
/// once the full time has passed.
pub fn delay_display(display: &mut dyn Display, ms: u64) -> Result<(), io::Error> {
    let mut result = display.progress(0, ms);
    let mut elapsed = 0;
    while elapsed < ms {
        let step = DELAY_STEP_MS.min(ms - elapsed);
        spin_sleep::sleep(Duration::from_millis(step));
        elapsed += step;
        if let Err(e) = display.progress(elapsed, ms) {
            result = result.and(Err(e));
        }
    }
    result
}

/// one println worth of text, remembered so the panel can be redrawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub x: i16,
    pub y: i16,
    pub color: Rgb565,
    pub size: u8,
    pub text: String,
}

/// In-memory model of the panel: what would currently be lit up. Every
/// display implementation keeps one of these; the terminal one renders it.
#[derive(Debug, Clone)]
pub struct Panel {
    pub fill: Rgb565,
    pub text_color: Rgb565,
    pub text_size: u8,
    pub cursor: (i16, i16),
    pub brightness: u8,
    pub runs: Vec<TextRun>,
    pub progress: Option<(u64, u64)>,
    pub picture: Option<Vec<Rgb565>>,
    resolution: Resolution,
}

impl Panel {
    pub fn new(width: usize, height: usize) -> Self {
        Panel {
            fill: Rgb565::BLACK,
            text_color: Rgb565::WHITE,
            text_size: 1,
            cursor: (0, 0),
            brightness: u8::MAX,
            runs: Vec::new(),
            progress: None,
            picture: None,
            resolution: Resolution(width, height),
        }
    }
}

impl Default for Panel {
    fn default() -> Self {
        Panel::new(PANEL_WIDTH, PANEL_HEIGHT)
    }
}

impl Display for Panel {
    fn println(&mut self, text: &str) -> Result<(), io::Error> {
        let (x, y) = self.cursor;
        if self.runs.len() == MAX_TEXT_RUNS {
            self.runs.remove(0);
        }
        self.runs.push(TextRun {
            x,
            y,
            color: self.text_color,
            size: self.text_size,
            text: text.to_string(),
        });
        let line_height = GLYPH_HEIGHT.saturating_mul(i16::from(self.text_size));
        self.cursor = (0, y.saturating_add(line_height));
        Ok(())
    }

    fn set_text_color(&mut self, color: Rgb565) -> Result<(), io::Error> {
        self.text_color = color;
        Ok(())
    }

    fn set_text_size(&mut self, size: u8) -> Result<(), io::Error> {
        self.text_size = size.max(1);
        Ok(())
    }

    fn cursor(&self) -> (i16, i16) {
        self.cursor
    }

    fn set_cursor(&mut self, x: i16, y: i16) -> Result<(), io::Error> {
        self.cursor = (x, y);
        Ok(())
    }

    fn fill_screen(&mut self, color: Rgb565) -> Result<(), io::Error> {
        self.fill = color;
        self.runs.clear();
        self.picture = None;
        Ok(())
    }

    fn set_brightness(&mut self, level: u8) -> Result<(), io::Error> {
        self.brightness = level;
        Ok(())
    }

    fn progress(&mut self, elapsed_ms: u64, total_ms: u64) -> Result<(), io::Error> {
        self.progress = Some((elapsed_ms, total_ms));
        Ok(())
    }

    fn draw_picture(&mut self, pixels: &[Rgb565]) -> Result<(), io::Error> {
        if pixels.len() != self.resolution.pixel_count() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "picture has {} pixels, panel needs {}",
                    pixels.len(),
                    self.resolution.pixel_count()
                ),
            ));
        }
        self.runs.clear();
        self.picture = Some(pixels.to_vec());
        Ok(())
    }

    fn resolution(&self) -> (usize, usize) {
        (self.resolution.0, self.resolution.1)
    }
}

// width and height of the panel in pixels
#[derive(Debug, Clone, Copy)]
struct Resolution(usize, usize);

impl Resolution {
    fn pixel_count(&self) -> usize {
        self.0 * self.1
    }

    fn x_bounds(&self) -> [f64; 2] {
        [0.0, (self.0 - 1) as f64]
    }

    fn y_bounds(&self) -> [f64; 2] {
        [-1.0 * (self.1 - 1) as f64, 0.0]
    }

    /// sample the picture once per terminal cell and bucket the points by
    /// colour, since a tui Points shape only has the one
    fn sample_by_color(
        &self,
        pixels: &[Rgb565],
        cols: usize,
        rows: usize,
    ) -> BTreeMap<Rgb565, Vec<(f64, f64)>> {
        let mut buckets: BTreeMap<Rgb565, Vec<(f64, f64)>> = BTreeMap::new();
        if cols == 0 || rows == 0 {
            return buckets;
        }
        for row in 0..rows {
            let y = row * self.1 / rows;
            for col in 0..cols {
                let x = col * self.0 / cols;
                if let Some(px) = pixels.get(y * self.0 + x) {
                    buckets
                        .entry(*px)
                        .or_default()
                        .push((x as f64, -1.0 * y as f64));
                }
            }
        }
        buckets
    }

    /// map a pixel position to a cell inside a cols x rows grid
    fn cell_of(&self, x: i16, y: i16, cols: u16, rows: u16) -> Option<(u16, u16)> {
        if x < 0 || y < 0 {
            return None;
        }
        let col = x as usize * cols as usize / self.0;
        let row = y as usize * rows as usize / self.1;
        if col < cols as usize && row < rows as usize {
            Some((col as u16, row as u16))
        } else {
            None
        }
    }
}

// terminal cells the panel is squeezed into (cells are about twice as tall
// as they are wide)
const PANEL_COLS: u16 = 80;
const PANEL_ROWS: u16 = 21;

/// colour panel emulated in a terminal, rendered using TUI and crossterm
pub struct TermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    panel: Panel,
    // dropped last, after the terminal
    _screen: Undo<fn()>,
}

// runs its closure when dropped
struct Undo<F: FnMut()>(F);

impl<F: FnMut()> Drop for Undo<F> {
    fn drop(&mut self) {
        (self.0)()
    }
}

fn restore_screen() {
    if let Err(e) = crossterm::execute!(io::stdout(), LeaveAlternateScreen) {
        warn!(error = %e, "failed to leave alternate screen");
    }
    if let Err(e) = terminal::disable_raw_mode() {
        warn!(error = %e, "failed to leave raw mode");
    }
}

impl TermDisplay {
    /// Take over the terminal. If any step fails the terminal is put back
    /// the way it was before the error is returned.
    pub fn new() -> Result<TermDisplay, io::Error> {
        terminal::enable_raw_mode()?;
        let screen = Undo(restore_screen as fn());
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.hide_cursor()?;
        terminal.clear()?;
        let mut d = TermDisplay {
            terminal,
            panel: Panel::default(),
            _screen: screen,
        };
        d.render()?;
        Ok(d)
    }

    fn render(&mut self) -> Result<(), io::Error> {
        let TermDisplay { terminal, panel, .. } = self;
        let resolution = panel.resolution;
        let dim = if panel.brightness < 0x80 {
            Modifier::DIM
        } else {
            Modifier::empty()
        };

        terminal.draw(|f| {
            let area = Rect::new(0, 0, 2 + PANEL_COLS, 3 + PANEL_ROWS).intersection(f.size());
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(3), Constraint::Length(1)].as_ref())
                .split(area);

            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title(format!(
                            "slidebox {}x{} [brightness {}]",
                            resolution.0, resolution.1, panel.brightness
                        ))
                        .borders(Borders::ALL)
                        .style(Style::default().bg(panel.fill.into()).add_modifier(dim)),
                )
                .x_bounds(resolution.x_bounds())
                .y_bounds(resolution.y_bounds())
                .marker(Marker::Block)
                .paint(|ctx| {
                    if let Some(pixels) = &panel.picture {
                        let buckets = resolution.sample_by_color(
                            pixels,
                            PANEL_COLS as usize,
                            PANEL_ROWS as usize,
                        );
                        for (color, coords) in buckets {
                            ctx.draw(&Points {
                                coords: &coords,
                                color: color.into(),
                            });
                        }
                    }
                });
            f.render_widget(canvas, chunks[0]);

            // text goes over the canvas, one paragraph per println
            let inner = Rect::new(
                chunks[0].x + 1,
                chunks[0].y + 1,
                chunks[0].width.saturating_sub(2),
                chunks[0].height.saturating_sub(2),
            );
            for run in &panel.runs {
                let Some((col, row)) = resolution.cell_of(run.x, run.y, inner.width, inner.height)
                else {
                    continue;
                };
                let mut style = Style::default().fg(run.color.into()).add_modifier(dim);
                if run.size > 1 {
                    style = style.add_modifier(Modifier::BOLD);
                }
                let rect = Rect::new(inner.x + col, inner.y + row, inner.width - col, 1);
                let line = Paragraph::new(Spans::from(vec![Span::styled(run.text.as_str(), style)]));
                f.render_widget(line, rect);
            }

            if let Some((elapsed, total)) = panel.progress {
                let ratio = if total == 0 {
                    1.0
                } else {
                    (elapsed as f64 / total as f64).clamp(0.0, 1.0)
                };
                let gauge = Gauge::default()
                    .gauge_style(Style::default().fg(Color::Red).bg(Color::Blue))
                    .ratio(ratio);
                f.render_widget(gauge, chunks[1]);
            }
        })?;
        Ok(())
    }
}

impl Drop for TermDisplay {
    fn drop(&mut self) {
        if let Err(e) = self.terminal.show_cursor() {
            warn!(error = %e, "failed to restore cursor");
        }
    }
}

impl Display for TermDisplay {
    fn println(&mut self, text: &str) -> Result<(), io::Error> {
        self.panel.println(text)?;
        self.render()
    }

    fn set_text_color(&mut self, color: Rgb565) -> Result<(), io::Error> {
        self.panel.set_text_color(color)
    }

    fn set_text_size(&mut self, size: u8) -> Result<(), io::Error> {
        self.panel.set_text_size(size)
    }

    fn cursor(&self) -> (i16, i16) {
        self.panel.cursor()
    }

    fn set_cursor(&mut self, x: i16, y: i16) -> Result<(), io::Error> {
        self.panel.set_cursor(x, y)
    }

    fn fill_screen(&mut self, color: Rgb565) -> Result<(), io::Error> {
        self.panel.fill_screen(color)?;
        self.render()
    }

    fn set_brightness(&mut self, level: u8) -> Result<(), io::Error> {
        self.panel.set_brightness(level)?;
        self.render()
    }

    fn progress(&mut self, elapsed_ms: u64, total_ms: u64) -> Result<(), io::Error> {
        self.panel.progress(elapsed_ms, total_ms)?;
        self.render()
    }

    fn draw_picture(&mut self, pixels: &[Rgb565]) -> Result<(), io::Error> {
        self.panel.draw_picture(pixels)?;
        self.render()
    }

    fn resolution(&self) -> (usize, usize) {
        self.panel.resolution()
    }
}

/// display with no screen; every operation becomes a trace event
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    panel: Panel,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Display for HeadlessDisplay {
    fn println(&mut self, text: &str) -> Result<(), io::Error> {
        let (x, y) = self.panel.cursor;
        info!(target: "slidebox::display", x, y, "{text}");
        self.panel.println(text)
    }

    fn set_text_color(&mut self, color: Rgb565) -> Result<(), io::Error> {
        debug!(target: "slidebox::display", color = color.0, "text color");
        self.panel.set_text_color(color)
    }

    fn set_text_size(&mut self, size: u8) -> Result<(), io::Error> {
        debug!(target: "slidebox::display", size, "text size");
        self.panel.set_text_size(size)
    }

    fn cursor(&self) -> (i16, i16) {
        self.panel.cursor()
    }

    fn set_cursor(&mut self, x: i16, y: i16) -> Result<(), io::Error> {
        debug!(target: "slidebox::display", x, y, "cursor");
        self.panel.set_cursor(x, y)
    }

    fn fill_screen(&mut self, color: Rgb565) -> Result<(), io::Error> {
        debug!(target: "slidebox::display", color = color.0, "fill screen");
        self.panel.fill_screen(color)
    }

    fn set_brightness(&mut self, level: u8) -> Result<(), io::Error> {
        info!(target: "slidebox::display", level, "brightness");
        self.panel.set_brightness(level)
    }

    fn progress(&mut self, elapsed_ms: u64, total_ms: u64) -> Result<(), io::Error> {
        debug!(target: "slidebox::display", elapsed_ms, total_ms, "progress");
        self.panel.progress(elapsed_ms, total_ms)
    }

    fn draw_picture(&mut self, pixels: &[Rgb565]) -> Result<(), io::Error> {
        debug!(target: "slidebox::display", pixels = pixels.len(), "picture");
        self.panel.draw_picture(pixels)
    }

    fn resolution(&self) -> (usize, usize) {
        self.panel.resolution()
    }
}

/// what a [`DummyDisplay`] was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayOp {
    Println(String),
    TextColor(Rgb565),
    TextSize(u8),
    Cursor(i16, i16),
    Fill(Rgb565),
    Brightness(u8),
    Progress(u64, u64),
    Picture(usize),
}

/// useful for testing; records every call and keeps a panel model
#[derive(Debug, Default)]
pub struct DummyDisplay {
    pub ops: Vec<DisplayOp>,
    pub panel: Panel,
}

impl DummyDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Display for DummyDisplay {
    fn println(&mut self, text: &str) -> Result<(), io::Error> {
        self.ops.push(DisplayOp::Println(text.to_string()));
        self.panel.println(text)
    }

    fn set_text_color(&mut self, color: Rgb565) -> Result<(), io::Error> {
        self.ops.push(DisplayOp::TextColor(color));
        self.panel.set_text_color(color)
    }

    fn set_text_size(&mut self, size: u8) -> Result<(), io::Error> {
        self.ops.push(DisplayOp::TextSize(size));
        self.panel.set_text_size(size)
    }

    fn cursor(&self) -> (i16, i16) {
        self.panel.cursor()
    }

    fn set_cursor(&mut self, x: i16, y: i16) -> Result<(), io::Error> {
        self.ops.push(DisplayOp::Cursor(x, y));
        self.panel.set_cursor(x, y)
    }

    fn fill_screen(&mut self, color: Rgb565) -> Result<(), io::Error> {
        self.ops.push(DisplayOp::Fill(color));
        self.panel.fill_screen(color)
    }

    fn set_brightness(&mut self, level: u8) -> Result<(), io::Error> {
        self.ops.push(DisplayOp::Brightness(level));
        self.panel.set_brightness(level)
    }

    fn progress(&mut self, elapsed_ms: u64, total_ms: u64) -> Result<(), io::Error> {
        self.ops.push(DisplayOp::Progress(elapsed_ms, total_ms));
        self.panel.progress(elapsed_ms, total_ms)
    }

    fn draw_picture(&mut self, pixels: &[Rgb565]) -> Result<(), io::Error> {
        self.ops.push(DisplayOp::Picture(pixels.len()));
        self.panel.draw_picture(pixels)
    }

    fn resolution(&self) -> (usize, usize) {
        self.panel.resolution()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    // Resolution tests
    #[test]
    fn test_pixel_count() {
        let r = Resolution(320, 170);
        assert_eq!(r.pixel_count(), 54_400)
    }

    #[test]
    fn test_x_bounds() {
        let r = Resolution(320, 170);
        assert_eq!(r.x_bounds(), [0.0, 319.0]);
    }

    #[test]
    fn test_y_bounds() {
        let r = Resolution(320, 170);
        assert_eq!(r.y_bounds(), [-169.0, 0.0]);
    }

    #[test]
    fn test_sample_by_color_buckets() {
        let r = Resolution(4, 2);
        let mut px = vec![Rgb565::BLACK; 8];
        px[0] = Rgb565::RED;
        let b = r.sample_by_color(&px, 2, 2);
        assert_eq!(b[&Rgb565::RED], vec![(0.0, 0.0)]);
        assert_eq!(b[&Rgb565::BLACK].len(), 3);
    }

    #[test]
    fn test_cell_of() {
        let r = Resolution(320, 170);
        assert_eq!(r.cell_of(0, 0, 80, 21), Some((0, 0)));
        assert_eq!(r.cell_of(160, 85, 80, 21), Some((40, 10)));
        assert_eq!(r.cell_of(-1, 0, 80, 21), None);
        assert_eq!(r.cell_of(400, 0, 80, 21), None);
    }

    // colour tests
    #[test]
    fn test_rgb565_expands() {
        assert_eq!(Rgb565::WHITE.to_rgb(), (255, 255, 255));
        assert_eq!(Rgb565::BLACK.to_rgb(), (0, 0, 0));
        assert_eq!(Rgb565::RED.to_rgb(), (255, 0, 0));
        assert_eq!(Rgb565::GREEN.to_rgb(), (0, 255, 0));
        assert_eq!(Rgb565::BLUE.to_rgb(), (0, 0, 255));
    }

    // Panel tests
    #[test]
    fn test_println_advances_cursor_by_text_size() -> Result<(), io::Error> {
        let mut p = Panel::default();
        p.set_cursor(10, 4)?;
        p.set_text_size(3)?;
        p.println("big")?;
        assert_eq!(p.cursor(), (0, 28));
        assert_eq!(p.runs[0].x, 10);
        assert_eq!(p.runs[0].size, 3);
        Ok(())
    }

    #[test]
    fn test_fill_screen_clears_text() -> Result<(), io::Error> {
        let mut p = Panel::default();
        p.println("gone soon")?;
        p.fill_screen(Rgb565::GREEN)?;
        assert!(p.runs.is_empty());
        assert_eq!(p.fill, Rgb565::GREEN);
        Ok(())
    }

    #[test]
    fn test_text_runs_are_capped() -> Result<(), io::Error> {
        let mut p = Panel::default();
        for i in 0..(MAX_TEXT_RUNS + 5) {
            p.println(&i.to_string())?;
        }
        assert_eq!(p.runs.len(), MAX_TEXT_RUNS);
        assert_eq!(p.runs[0].text, "5");
        Ok(())
    }

    #[test]
    fn test_draw_rejects_wrong_size_picture() {
        let mut p = Panel::default();
        assert!(p.draw_picture(&[Rgb565::RED; 10]).is_err());
        assert!(p.picture.is_none());
    }

    #[test]
    fn test_draw_accepts_full_picture() -> Result<(), io::Error> {
        let mut p = Panel::default();
        p.draw_picture(&vec![Rgb565::BLUE; PANEL_WIDTH * PANEL_HEIGHT])?;
        assert!(p.picture.is_some());
        Ok(())
    }

    // delay tests
    #[test]
    fn test_delay_display_reports_progress() -> Result<(), io::Error> {
        let mut d = DummyDisplay::new();
        delay_display(&mut d, 120)?;
        assert_eq!(
            d.ops,
            vec![
                DisplayOp::Progress(0, 120),
                DisplayOp::Progress(50, 120),
                DisplayOp::Progress(100, 120),
                DisplayOp::Progress(120, 120),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_zero_delay_still_draws_bar() -> Result<(), io::Error> {
        let mut d = DummyDisplay::new();
        delay_display(&mut d, 0)?;
        assert_eq!(d.ops, vec![DisplayOp::Progress(0, 0)]);
        Ok(())
    }

    fn half_done_setup(undone: &Cell<u32>, fail: bool) -> Result<(), io::Error> {
        let _screen = Undo(|| undone.set(undone.get() + 1));
        if fail {
            return Err(io::Error::new(io::ErrorKind::Other, "no terminal"));
        }
        Ok(())
    }

    #[test]
    fn test_failed_setup_is_undone() {
        let undone = Cell::new(0);
        assert!(half_done_setup(&undone, true).is_err());
        assert_eq!(undone.get(), 1);
        half_done_setup(&undone, false).unwrap();
        assert_eq!(undone.get(), 2);
    }

    #[test]
    #[ignore]
    // NB. needs a real terminal
    fn test_term_display_starts() -> Result<(), io::Error> {
        let mut d = TermDisplay::new()?;
        d.println("hello")
    }
}
