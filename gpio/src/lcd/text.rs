//! Text on top of single glyph writes.
//!
//! Nothing here knows about the controller: anything implementing [GlyphSink] can print.
use crate::lcd::hd44780::driver::GlyphSink;
use crate::{GpioError, GpioResult};
use log::warn;
use std::fmt;

/// Character code printed in place of characters the display can't show.
pub const REPLACEMENT: u8 = b'?';

pub trait TextExt: GlyphSink {
    /// Prints the string starting at the cursor, returning the number of glyphs written.
    ///
    /// ASCII characters are sent as they are, so `'\u{0}'`–`'\u{7}'` show the custom glyphs.
    /// Anything else is replaced with [REPLACEMENT].
    fn print(&mut self, s: &str) -> GpioResult<usize> {
        let mut written = 0;
        for c in s.chars() {
            written += self.write_glyph(glyph_code(c))?;
        }
        Ok(written)
    }

    /// Prints formatted text, like `lcd.print_fmt(format_args!("{:>3}%", level))`.
    fn print_fmt(&mut self, args: fmt::Arguments<'_>) -> GpioResult<usize> {
        let mut writer = GlyphWriter::new(self);
        match fmt::write(&mut writer, args) {
            Ok(()) => Ok(writer.written),
            // A formatting error without a GPIO error comes from a Display impl
            Err(_) => Err(writer.error.unwrap_or(GpioError::InvalidArgument)),
        }
    }
}

impl<T: GlyphSink + ?Sized> TextExt for T {}

fn glyph_code(c: char) -> u8 {
    if c.is_ascii() {
        c as u8
    } else {
        warn!("Non-ASCII character: {}", c);
        REPLACEMENT
    }
}

/// Adapter implementing [fmt::Write] for a [GlyphSink].
///
/// [fmt::Write] can't carry the underlying error, so the first one is kept in the writer.
pub struct GlyphWriter<'s, S: GlyphSink + ?Sized> {
    sink: &'s mut S,
    written: usize,
    error: Option<GpioError>,
}

impl<'s, S: GlyphSink + ?Sized> GlyphWriter<'s, S> {
    pub fn new(sink: &'s mut S) -> Self {
        GlyphWriter {
            sink,
            written: 0,
            error: None,
        }
    }

    /// Number of glyphs written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Takes the error that made the last write fail, if any.
    pub fn take_error(&mut self) -> Option<GpioError> {
        self.error.take()
    }
}

impl<S: GlyphSink + ?Sized> fmt::Write for GlyphWriter<'_, S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            match self.sink.write_glyph(glyph_code(c)) {
                Ok(written) => self.written += written,
                Err(err) => {
                    self.error = Some(err);
                    return Err(fmt::Error);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    #[derive(Default)]
    struct Glyphs {
        codes: Vec<u8>,
        fail_after: Option<usize>,
    }

    impl GlyphSink for Glyphs {
        fn write_glyph(&mut self, code: u8) -> GpioResult<usize> {
            if self.fail_after == Some(self.codes.len()) {
                return Err(GpioError::Io(std::io::ErrorKind::BrokenPipe));
            }
            self.codes.push(code);
            Ok(1)
        }
    }

    #[test]
    fn print_replaces_non_ascii() {
        let mut glyphs = Glyphs::default();
        assert_eq!(glyphs.print("Zażółć\u{1}").unwrap(), 7);
        assert_eq!(glyphs.codes, b"Za????\x01");
    }

    #[test]
    fn print_fmt_formats_numbers() {
        let mut glyphs = Glyphs::default();
        assert_eq!(glyphs.print_fmt(format_args!("{:>4}|{:02}", 42, 7)).unwrap(), 7);
        assert_eq!(glyphs.codes, b"  42|07");
    }

    #[test]
    fn errors_are_kept() {
        let mut glyphs = Glyphs { fail_after: Some(2), ..Glyphs::default() };
        assert_eq!(
            glyphs.print_fmt(format_args!("{}", 12345)),
            Err(GpioError::Io(std::io::ErrorKind::BrokenPipe))
        );

        let mut glyphs = Glyphs { fail_after: Some(1), ..Glyphs::default() };
        let mut writer = GlyphWriter::new(&mut glyphs);
        assert!(write!(writer, "ab").is_err());
        // 'a' went out before the sink failed
        assert_eq!(writer.written(), 1);
        assert!(writer.take_error().is_some());
        assert!(writer.take_error().is_none());
    }
}
