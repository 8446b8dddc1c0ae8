//! HD44780 LCD module.
//!
//! The HD44780 is driven over a write-only parallel bus: there is no acknowledgment and no
//! error signal, so everything here relies on sending the exact bytes, in the exact order,
//! with waits long enough for the slowest controller around.
//!
//! - [command] encodes the instruction set into bytes, without touching any pins.
//! - [driver] contains the bus port strobing those bytes onto GPIO lines, and the controller
//!   driver keeping the display configuration in sync with the chip.

pub mod command;
pub mod driver;
