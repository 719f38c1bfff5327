use tracing::{debug, warn};

use crate::display::{delay_display, Display, Rgb565};
use crate::error::ExecError;
use crate::storage::{read_rgb565, Storage};

/// Show a raw picture full screen. Anything that stops the picture being
/// drawn (empty path, missing file, read error) leaves a black screen.
pub fn display_picture(
    display: &mut dyn Display,
    storage: &dyn Storage,
    path: &str,
) -> Result<(), ExecError> {
    if path.is_empty() || !storage.exists(path) {
        debug!(path, "no picture, blanking screen");
        display.fill_screen(Rgb565::BLACK)?;
        return Ok(());
    }
    let (width, height) = display.resolution();
    match read_rgb565(storage, path, width * height) {
        Ok(pixels) => display.draw_picture(&pixels)?,
        Err(e) => {
            warn!(path, "picture unreadable: {e}");
            display.fill_screen(Rgb565::BLACK)?;
        }
    }
    Ok(())
}

/// The looping picture slideshow the device plays between command runs.
#[derive(Debug, Clone)]
pub struct Slideshow {
    slides: Vec<String>,
    captions: Vec<String>,
    slide_ms: u64,
    next: usize,
}

impl Slideshow {
    pub fn new(slides: Vec<String>, captions: Vec<String>, slide_ms: u64) -> Self {
        Slideshow {
            slides,
            captions,
            slide_ms,
            next: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    /// index of the slide the next `show_next` will put up
    pub fn position(&self) -> usize {
        self.next
    }

    /// jump over the upcoming slide
    pub fn skip(&mut self) {
        if !self.is_empty() {
            self.next = (self.next + 1) % self.slides.len();
        }
    }

    /// Put the next slide up with its captions and hold it for the slide
    /// time. Does nothing without slides.
    pub fn show_next(
        &mut self,
        display: &mut dyn Display,
        storage: &dyn Storage,
    ) -> Result<(), ExecError> {
        let Some(path) = self.slides.get(self.next) else {
            return Ok(());
        };
        self.next = (self.next + 1) % self.slides.len();

        display_picture(display, storage, path)?;

        display.set_text_color(Rgb565::WHITE)?;
        display.set_cursor(0, 0)?;
        for (i, caption) in self.captions.iter().enumerate() {
            display.set_text_size(u8::try_from(i + 1).unwrap_or(u8::MAX))?;
            display.println(caption)?;
        }

        delay_display(display, self.slide_ms)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{DisplayOp, DummyDisplay, PANEL_HEIGHT, PANEL_WIDTH};
    use crate::storage::MemStorage;

    fn picture(color: Rgb565) -> Vec<u8> {
        color
            .0
            .to_be_bytes()
            .repeat(PANEL_WIDTH * PANEL_HEIGHT)
    }

    #[test]
    fn test_missing_picture_blanks_screen() {
        let mut d = DummyDisplay::new();
        let s = MemStorage::new();
        display_picture(&mut d, &s, "/missing.raw").unwrap();
        assert_eq!(d.ops, vec![DisplayOp::Fill(Rgb565::BLACK)]);
    }

    #[test]
    fn test_empty_path_blanks_screen() {
        let mut d = DummyDisplay::new();
        let s = MemStorage::new();
        display_picture(&mut d, &s, "").unwrap();
        assert_eq!(d.ops, vec![DisplayOp::Fill(Rgb565::BLACK)]);
    }

    #[test]
    fn test_picture_is_drawn() {
        let mut d = DummyDisplay::new();
        let mut s = MemStorage::new();
        s.files.insert("/red.raw".into(), picture(Rgb565::RED));
        display_picture(&mut d, &s, "/red.raw").unwrap();
        assert_eq!(d.ops, vec![DisplayOp::Picture(PANEL_WIDTH * PANEL_HEIGHT)]);
        assert_eq!(d.panel.picture.as_ref().unwrap()[0], Rgb565::RED);
    }

    #[test]
    fn test_slide_has_captions_and_delay() {
        let mut d = DummyDisplay::new();
        let mut s = MemStorage::new();
        s.files.insert("/a.raw".into(), picture(Rgb565::BLUE));
        let mut show = Slideshow::new(
            vec!["/a.raw".into()],
            vec!["one".into(), "two".into()],
            0,
        );
        show.show_next(&mut d, &s).unwrap();
        assert_eq!(
            d.ops,
            vec![
                DisplayOp::Picture(PANEL_WIDTH * PANEL_HEIGHT),
                DisplayOp::TextColor(Rgb565::WHITE),
                DisplayOp::Cursor(0, 0),
                DisplayOp::TextSize(1),
                DisplayOp::Println("one".into()),
                DisplayOp::TextSize(2),
                DisplayOp::Println("two".into()),
                DisplayOp::Progress(0, 0),
            ]
        );
    }

    #[test]
    fn test_slides_loop() {
        let mut d = DummyDisplay::new();
        let s = MemStorage::new();
        let mut show = Slideshow::new(vec!["/a".into(), "/b".into()], vec![], 0);
        for expected in [1, 0, 1] {
            show.show_next(&mut d, &s).unwrap();
            assert_eq!(show.position(), expected);
        }
    }

    #[test]
    fn test_skip_moves_on() {
        let mut show = Slideshow::new(vec!["/a".into(), "/b".into(), "/c".into()], vec![], 0);
        show.skip();
        show.skip();
        assert_eq!(show.position(), 2);
        show.skip();
        assert_eq!(show.position(), 0);
    }

    #[test]
    fn test_no_slides_does_nothing() {
        let mut d = DummyDisplay::new();
        let s = MemStorage::new();
        let mut show = Slideshow::new(vec![], vec!["hi".into()], 0);
        show.skip();
        show.show_next(&mut d, &s).unwrap();
        assert!(d.ops.is_empty());
    }
}
