//! HD44780 driver module.
//!
//! See [ParallelBus] for how bytes get onto the wire and [GpioHD44780Driver] for the display
//! operations. The two traits here are the seams for code that only needs part of the driver:
//! [GlyphSink] for anything that just writes characters, [HD44780Driver] for raw commands.

mod bus;
mod gpio;

use crate::GpioResult;
use std::fmt::Debug;
pub use bus::*;
pub use gpio::*;

/// Something a single character code can be written to.
///
/// This is all a text or formatting layer needs, see [crate::lcd::text].
pub trait GlyphSink {
    /// Writes one character code at the current address and advances the address.
    ///
    /// Returns the number of glyphs written, which is always `1`: the bus has no way to report
    /// a failed write.
    fn write_glyph(&mut self, code: u8) -> GpioResult<usize>;
}

/// Raw access to an HD44780-compatible controller.
pub trait HD44780Driver: GlyphSink + Debug {
    /// Sends a raw instruction byte with RS set to `0`.
    ///
    /// Meant for instructions the driver doesn't wrap, like vendor extensions. Changing the
    /// display control or entry mode this way is not tracked by the driver, and will be
    /// overwritten by its next toggle.
    fn command(&mut self, command: u8) -> GpioResult<()>;
}

/// The controller register a byte is sent to, selected by the RS line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Register {
    /// RS low: the byte is an instruction.
    Instruction,
    /// RS high: the byte goes to CGRAM or DDRAM, whichever was addressed last.
    Data,
}

impl Register {
    /// Level of the RS line selecting this register.
    pub fn level(self) -> bool {
        self == Register::Data
    }
}

/// What to do with arguments that are out of range for the display.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum InputPolicy {
    /// Rows are clamped to the last one, glyph slots are masked to 3 bits, and addresses to
    /// their bit width. Nothing is reported. This is what existing callers expect.
    #[default] Clamp,
    /// Out-of-range arguments are rejected with `GpioError::InvalidArgument` and nothing is sent.
    Strict,
}
