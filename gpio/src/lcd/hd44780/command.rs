//! The HD44780 instruction set.
//!
//! Every instruction is a single byte, where the highest set bit selects the instruction and the
//! bits below it are its arguments. The configuration structs here are plain values; they're only
//! turned into bytes by [Command::encode], so the encoding can be checked without a bus.

/// Clears the display and sets the cursor to the home position.
pub const CLEAR_DISPLAY: u8 = 0b00000001;
/// Sets the cursor to the home position and undoes any display shift.
pub const RETURN_HOME: u8 = 0b00000010;
pub const ENTRY_MODE_SET: u8 = 0b00000100;
pub const DISPLAY_CONTROL: u8 = 0b00001000;
pub const CURSOR_SHIFT: u8 = 0b00010000;
pub const FUNCTION_SET: u8 = 0b00100000;
pub const SET_CGRAM_ADDRESS: u8 = 0b01000000;
pub const SET_DDRAM_ADDRESS: u8 = 0b10000000;

/// Width of the parallel data bus.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BusWidth {
    /// Only DB4–DB7 are connected, every byte is sent as two nibbles, high one first.
    FourBit,
    /// DB0–DB7 are connected.
    EightBit,
}

/// Number of display lines the controller drives.
///
/// Four-row modules are wired as two long lines, so they use [LineCount::Two] too.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LineCount {
    One,
    Two,
}

/// Character font height.
///
/// The taller font is only available on single-line displays.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum Font {
    #[default] Dots5x8,
    Dots5x10,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing/reading data.
    Left,
    /// Moves the cursor to the right after writing/reading data.
    Right,
}

/// Arguments of the function set instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FunctionSet {
    pub bus_width: BusWidth,
    pub lines: LineCount,
    pub font: Font,
}

impl FunctionSet {
    /// The configuration the controller has after power-on.
    pub const POWER_ON: FunctionSet = FunctionSet {
        bus_width: BusWidth::EightBit,
        lines: LineCount::One,
        font: Font::Dots5x8,
    };
}

/// Arguments of the display on/off control instruction.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct DisplayControl {
    pub display: bool,
    pub cursor: bool,
    pub blink: bool,
}

/// Arguments of the entry mode set instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EntryMode {
    /// Where the cursor moves after a character is written. [CursorDirection::Right] is
    /// left-to-right text.
    pub direction: CursorDirection,
    /// Shifts the whole display instead of the cursor, so the text seems to scroll away from a
    /// fixed cursor.
    pub autoscroll: bool,
}

impl Default for EntryMode {
    fn default() -> Self {
        EntryMode {
            direction: CursorDirection::Right,
            autoscroll: false,
        }
    }
}

/// A single HD44780 instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Command {
    ClearDisplay,
    ReturnHome,
    EntryModeSet(EntryMode),
    DisplayControl(DisplayControl),
    /// Moves the cursor, or shifts the whole display when `display` is set, without touching
    /// DDRAM.
    Shift {
        display: bool,
        direction: CursorDirection,
    },
    FunctionSet(FunctionSet),
    /// Sets the 6-bit CGRAM address. Extra bits are dropped.
    SetCgramAddress(u8),
    /// Sets the 7-bit DDRAM address. Extra bits are dropped.
    SetDdramAddress(u8),
}

impl Command {
    /// Encodes the instruction into the byte sent with RS low.
    pub fn encode(self) -> u8 {
        match self {
            Command::ClearDisplay => CLEAR_DISPLAY,
            Command::ReturnHome => RETURN_HOME,
            Command::EntryModeSet(mode) => {
                let mut command = ENTRY_MODE_SET;
                if mode.direction == CursorDirection::Right {
                    command |= 0b00000010;
                }
                if mode.autoscroll {
                    command |= 0b00000001;
                }
                command
            }
            Command::DisplayControl(control) => {
                let mut command = DISPLAY_CONTROL;
                if control.display {
                    command |= 0b00000100;
                }
                if control.cursor {
                    command |= 0b00000010;
                }
                if control.blink {
                    command |= 0b00000001;
                }
                command
            }
            Command::Shift { display, direction } => {
                let mut command = CURSOR_SHIFT;
                if display {
                    command |= 0b00001000;
                }
                if direction == CursorDirection::Right {
                    command |= 0b00000100;
                }
                command
            }
            Command::FunctionSet(function) => {
                let mut command = FUNCTION_SET;
                if function.bus_width == BusWidth::EightBit {
                    command |= 0b00010000;
                }
                if function.lines == LineCount::Two {
                    command |= 0b00001000;
                }
                if function.font == Font::Dots5x10 {
                    command |= 0b00000100;
                }
                command
            }
            Command::SetCgramAddress(address) => SET_CGRAM_ADDRESS | (address & 0b00111111),
            Command::SetDdramAddress(address) => SET_DDRAM_ADDRESS | (address & 0b01111111),
        }
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> Self {
        command.encode()
    }
}
