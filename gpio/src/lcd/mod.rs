//! Character LCD drivers.
//!
//! [hd44780] talks to the controller itself, [text] turns strings and formatted values into
//! glyph writes on top of it.
pub mod hd44780;
pub mod text;
