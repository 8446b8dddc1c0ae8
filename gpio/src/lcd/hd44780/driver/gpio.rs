use crate::lcd::hd44780::command::{
    BusWidth, Command, CursorDirection, DisplayControl, EntryMode, Font, FunctionSet, LineCount,
};
use crate::lcd::hd44780::driver::{
    DataPins, GlyphSink, HD44780Driver, InputPolicy, ParallelBus, Register,
};
use crate::{GpioDriver, GpioError, GpioResult};
use log::{debug, trace, warn};

/// Driver for the HD44780 controller connected through GPIO pins.
///
/// The controller can't be read from (the busy flag is never polled), so the driver keeps its
/// own copy of the display control and entry mode flags and re-sends the whole instruction
/// whenever one of them changes. Every wait is the worst case from the datasheet.
///
/// Nothing is sent before [Self::begin], which runs the initialization sequence. Until then
/// every operation fails with [GpioError::NotInitialized].
///
/// The driver is meant to have a single owner. Interleaving calls from several threads would
/// mix up the nibbles of different bytes, so any sharing has to wrap the whole driver in a
/// mutex.
#[derive(Debug)]
pub struct GpioHD44780Driver<'a> {
    bus: ParallelBus<'a>,
    policy: InputPolicy,
    initialized: bool,

    function: FunctionSet,
    control: DisplayControl,
    entry: EntryMode,
    rows: u8,
    row_offsets: [u8; 4],
}

impl<'a> GpioHD44780Driver<'a> {
    /// Time the controller may need after power rises above 2.7 V.
    pub const POWER_ON_DELAY_US: u32 = 50_000;
    /// Wait after the first two synchronization instructions (datasheet: 4.1 ms).
    pub const SYNC_DELAY_US: u32 = 4_500;
    /// Wait after the third synchronization instruction (datasheet: 100 µs).
    pub const SYNC_SHORT_DELAY_US: u32 = 150;
    /// Wait after clear display and return home, which take far longer than other instructions.
    pub const LONG_COMMAND_DELAY_US: u32 = 2_000;

    /// Creates a new driver on top of the given bus.
    pub fn new(bus: ParallelBus<'a>) -> Self {
        GpioHD44780Driver {
            function: FunctionSet {
                bus_width: bus.width(),
                ..FunctionSet::POWER_ON
            },
            bus,
            policy: InputPolicy::default(),
            initialized: false,
            control: DisplayControl::default(),
            entry: EntryMode::default(),
            rows: 1,
            row_offsets: Self::default_row_offsets(16),
        }
    }

    /// Creates a new driver using a 4-bit data bus.
    ///
    /// # Parameters
    ///
    /// - `gpio`: Driver owning all the pins below.
    /// - `pin_rs`: Register select output pin.
    /// - `pin_rw`: Optional read/write output pin. If not provided, the R/W pin of the display
    ///   must be connected to GND.
    /// - `pin_e`: Enable output pin.
    /// - `data`: Pins wired to DB4–DB7, in that order.
    pub fn new_4bit(
        gpio: &'a dyn GpioDriver,
        pin_rs: usize,
        pin_rw: Option<usize>,
        pin_e: usize,
        data: [usize; 4],
    ) -> Self {
        Self::new(ParallelBus::new(gpio, pin_rs, pin_rw, pin_e, DataPins::Bus4Bit(data)))
    }

    /// Creates a new driver using an 8-bit data bus.
    ///
    /// Same as [Self::new_4bit], except `data` are the pins wired to DB0–DB7.
    pub fn new_8bit(
        gpio: &'a dyn GpioDriver,
        pin_rs: usize,
        pin_rw: Option<usize>,
        pin_e: usize,
        data: [usize; 8],
    ) -> Self {
        Self::new(ParallelBus::new(gpio, pin_rs, pin_rw, pin_e, DataPins::Bus8Bit(data)))
    }

    /// Sets what happens with out-of-range rows and glyph slots. Clamping by default.
    pub fn with_input_policy(mut self, policy: InputPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// DDRAM addresses of the rows of a display `columns` wide.
    ///
    /// Rows 0 and 1 are the two controller lines. Four-row displays continue row 0 into row 2,
    /// and row 1 into row 3.
    fn default_row_offsets(columns: u8) -> [u8; 4] {
        [0x00, 0x40, columns, 0x40u8.wrapping_add(columns)]
    }

    /// Declares the display geometry and initializes the controller.
    ///
    /// The controller might be in any state (the host may have been reset without the display),
    /// so this always goes through the full synchronization sequence from the datasheet:
    ///
    /// - waits 50 ms for the supply to settle,
    /// - pulls RS, E and R/W low,
    /// - on a 4-bit bus, sends the `0011` nibble three times to force 8-bit mode, whatever the
    ///   current mode is, then `0010` to switch to 4-bit mode;
    ///   on an 8-bit bus, sends the function set instruction three times,
    /// - sends the final function set with the line count and font,
    /// - turns the display on with no cursor and no blinking,
    /// - clears the display,
    /// - sets left-to-right entry without autoscroll.
    ///
    /// The tall font is only used when `rows` is 1. Calling this again starts from scratch.
    pub fn begin(&mut self, columns: u8, rows: u8, font: Font) -> GpioResult<()> {
        if self.policy == InputPolicy::Strict && !(1..=4).contains(&rows) {
            return Err(GpioError::InvalidArgument);
        }

        self.initialized = false;
        self.rows = rows.max(1);
        self.row_offsets = Self::default_row_offsets(columns);
        self.function = FunctionSet {
            bus_width: self.bus.width(),
            lines: if self.rows > 1 { LineCount::Two } else { LineCount::One },
            font: if self.rows == 1 { font } else { Font::Dots5x8 },
        };

        debug!("Initializing HD44780: {} columns, {} rows, {:?}", columns, self.rows, self.function);

        self.bus.configure()?;
        self.bus.delay_us(Self::POWER_ON_DELAY_US);
        self.bus.idle()?;

        // Synchronize
        let function_set = Command::FunctionSet(self.function).encode();
        match self.function.bus_width {
            BusWidth::FourBit => {
                self.bus.transmit_nibble(0b0011)?;
                self.bus.delay_us(Self::SYNC_DELAY_US);
                self.bus.transmit_nibble(0b0011)?;
                self.bus.delay_us(Self::SYNC_DELAY_US);
                self.bus.transmit_nibble(0b0011)?;
                self.bus.delay_us(Self::SYNC_SHORT_DELAY_US);
                self.bus.transmit_nibble(0b0010)?;
            }
            BusWidth::EightBit => {
                self.send(function_set, Register::Instruction)?;
                self.bus.delay_us(Self::SYNC_DELAY_US);
                self.send(function_set, Register::Instruction)?;
                self.bus.delay_us(Self::SYNC_SHORT_DELAY_US);
                self.send(function_set, Register::Instruction)?;
            }
        }
        self.send(function_set, Register::Instruction)?;

        self.control = DisplayControl {
            display: true,
            cursor: false,
            blink: false,
        };
        self.send_display_control()?;

        self.send_clear()?;

        self.entry = EntryMode {
            direction: CursorDirection::Right,
            autoscroll: false,
        };
        self.send_entry_mode()?;

        self.initialized = true;
        debug!("HD44780 initialized.");
        Ok(())
    }

    /// Clears the display and moves the cursor to the top left corner.
    pub fn clear(&mut self) -> GpioResult<()> {
        self.ensure_initialized()?;
        self.send_clear()
    }

    /// Moves the cursor to the top left corner and undoes any scrolling, without clearing.
    pub fn home(&mut self) -> GpioResult<()> {
        self.ensure_initialized()?;
        self.send(Command::ReturnHome.encode(), Register::Instruction)?;
        self.bus.delay_us(Self::LONG_COMMAND_DELAY_US);
        Ok(())
    }

    /// Moves the cursor to the given column and row, counted from `0`.
    ///
    /// Rows past the last one are clamped to the last one. The column isn't checked, as DDRAM
    /// lines are longer than the visible part of the display.
    pub fn set_cursor(&mut self, column: u8, row: u8) -> GpioResult<()> {
        self.ensure_initialized()?;

        let row_count = self.rows.min(self.row_offsets.len() as u8);
        let row = if row < row_count {
            row
        } else if self.policy == InputPolicy::Strict {
            return Err(GpioError::InvalidArgument);
        } else {
            warn!("Row {} out of range, using row {}.", row, row_count - 1);
            row_count - 1
        };

        let offset = self.row_offsets[row as usize];
        let address = match self.policy {
            InputPolicy::Clamp => column.wrapping_add(offset),
            InputPolicy::Strict => match column.checked_add(offset) {
                Some(address) if address <= 0b01111111 => address,
                _ => return Err(GpioError::InvalidArgument),
            },
        };
        self.send(Command::SetDdramAddress(address).encode(), Register::Instruction)
    }

    /// Overrides the DDRAM addresses of the rows, for displays wired differently than usual.
    ///
    /// Stays in effect until the next [Self::begin].
    pub fn set_row_offsets(&mut self, offsets: [u8; 4]) {
        self.row_offsets = offsets;
    }

    /// Turns the display on, showing DDRAM contents.
    pub fn display(&mut self) -> GpioResult<()> {
        self.update_display_control(|control| control.display = true)
    }

    /// Turns the display off. DDRAM contents are kept.
    pub fn no_display(&mut self) -> GpioResult<()> {
        self.update_display_control(|control| control.display = false)
    }

    /// Shows the underline cursor.
    pub fn cursor(&mut self) -> GpioResult<()> {
        self.update_display_control(|control| control.cursor = true)
    }

    /// Hides the underline cursor.
    pub fn no_cursor(&mut self) -> GpioResult<()> {
        self.update_display_control(|control| control.cursor = false)
    }

    /// Starts blinking the character at the cursor.
    pub fn blink(&mut self) -> GpioResult<()> {
        self.update_display_control(|control| control.blink = true)
    }

    /// Stops blinking the character at the cursor.
    pub fn no_blink(&mut self) -> GpioResult<()> {
        self.update_display_control(|control| control.blink = false)
    }

    /// Shifts the visible window one column to the left. Neither DDRAM nor the cursor address
    /// change.
    pub fn scroll_display_left(&mut self) -> GpioResult<()> {
        self.shift_display(CursorDirection::Left)
    }

    /// Shifts the visible window one column to the right.
    pub fn scroll_display_right(&mut self) -> GpioResult<()> {
        self.shift_display(CursorDirection::Right)
    }

    /// Makes the cursor move right after each character.
    pub fn left_to_right(&mut self) -> GpioResult<()> {
        self.update_entry_mode(|entry| entry.direction = CursorDirection::Right)
    }

    /// Makes the cursor move left after each character.
    pub fn right_to_left(&mut self) -> GpioResult<()> {
        self.update_entry_mode(|entry| entry.direction = CursorDirection::Left)
    }

    /// Shifts the display with each character instead of moving the cursor, which
    /// "right justifies" text at the cursor.
    pub fn autoscroll(&mut self) -> GpioResult<()> {
        self.update_entry_mode(|entry| entry.autoscroll = true)
    }

    pub fn no_autoscroll(&mut self) -> GpioResult<()> {
        self.update_entry_mode(|entry| entry.autoscroll = false)
    }

    /// Defines one of the 8 custom glyphs, shown for character codes `0`–`7`.
    ///
    /// `bitmap` holds the rows from the top, using the low 5 bits of each. The slot is masked to
    /// 3 bits.
    ///
    /// This leaves the controller addressing CGRAM, so the next glyph write would go there too:
    /// call [Self::set_cursor], [Self::home] or [Self::clear] before writing text again.
    pub fn create_char(&mut self, slot: u8, bitmap: &[u8; 8]) -> GpioResult<()> {
        self.ensure_initialized()?;

        if self.policy == InputPolicy::Strict && slot > 0b111 {
            return Err(GpioError::InvalidArgument);
        }
        let slot = slot & 0b111;

        self.send(Command::SetCgramAddress(slot << 3).encode(), Register::Instruction)?;
        for &row in bitmap {
            self.send(row, Register::Data)?;
        }
        Ok(())
    }

    fn ensure_initialized(&self) -> GpioResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(GpioError::NotInitialized)
        }
    }

    fn update_display_control(&mut self, update: impl FnOnce(&mut DisplayControl)) -> GpioResult<()> {
        self.ensure_initialized()?;
        update(&mut self.control);
        self.send_display_control()
    }

    fn update_entry_mode(&mut self, update: impl FnOnce(&mut EntryMode)) -> GpioResult<()> {
        self.ensure_initialized()?;
        update(&mut self.entry);
        self.send_entry_mode()
    }

    fn shift_display(&mut self, direction: CursorDirection) -> GpioResult<()> {
        self.ensure_initialized()?;
        let command = Command::Shift {
            display: true,
            direction,
        };
        self.send(command.encode(), Register::Instruction)
    }

    fn send_display_control(&mut self) -> GpioResult<()> {
        self.send(Command::DisplayControl(self.control).encode(), Register::Instruction)
    }

    fn send_entry_mode(&mut self) -> GpioResult<()> {
        self.send(Command::EntryModeSet(self.entry).encode(), Register::Instruction)
    }

    fn send_clear(&mut self) -> GpioResult<()> {
        self.send(Command::ClearDisplay.encode(), Register::Instruction)?;
        self.bus.delay_us(Self::LONG_COMMAND_DELAY_US);
        Ok(())
    }

    /// Sends a whole byte to the given register, as two nibbles on a 4-bit bus.
    fn send(&mut self, data: u8, register: Register) -> GpioResult<()> {
        trace!("Sending data: {:08b}, RS: {}", data, register.level());

        self.bus.select(register)?;
        self.bus.set_write_direction()?;

        match self.bus.width() {
            BusWidth::EightBit => self.bus.transmit_byte(data),
            BusWidth::FourBit => {
                self.bus.transmit_nibble(data >> 4)?;
                self.bus.transmit_nibble(data & 0x0F)
            }
        }
    }
}

impl GlyphSink for GpioHD44780Driver<'_> {
    fn write_glyph(&mut self, code: u8) -> GpioResult<usize> {
        self.ensure_initialized()?;
        self.send(code, Register::Data)?;
        Ok(1)
    }
}

impl HD44780Driver for GpioHD44780Driver<'_> {
    fn command(&mut self, command: u8) -> GpioResult<()> {
        self.ensure_initialized()?;
        self.send(command, Register::Instruction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::RecordingGpio;

    fn driver(gpio: &RecordingGpio) -> GpioHD44780Driver<'_> {
        let mut lcd = GpioHD44780Driver::new_4bit(gpio, 0, None, 1, [2, 3, 4, 5]);
        lcd.begin(16, 2, Font::default()).unwrap();
        lcd
    }

    #[test]
    fn begin_sets_default_flags() {
        let gpio = RecordingGpio::new(8);
        let lcd = driver(&gpio);
        assert!(lcd.is_initialized());
        assert_eq!(lcd.control, DisplayControl { display: true, cursor: false, blink: false });
        assert_eq!(lcd.entry, EntryMode { direction: CursorDirection::Right, autoscroll: false });
        assert_eq!(lcd.function.lines, LineCount::Two);
        assert_eq!(lcd.row_offsets, [0x00, 0x40, 16, 0x50]);
    }

    #[test]
    fn display_control_toggles_accumulate() {
        let gpio = RecordingGpio::new(8);
        let mut lcd = driver(&gpio);
        lcd.cursor().unwrap();
        lcd.blink().unwrap();
        lcd.no_cursor().unwrap();
        assert_eq!(lcd.control, DisplayControl { display: true, cursor: false, blink: true });
    }

    #[test]
    fn entry_mode_toggles_accumulate() {
        let gpio = RecordingGpio::new(8);
        let mut lcd = driver(&gpio);
        lcd.right_to_left().unwrap();
        lcd.autoscroll().unwrap();
        assert_eq!(lcd.entry, EntryMode { direction: CursorDirection::Left, autoscroll: true });
        lcd.left_to_right().unwrap();
        lcd.no_autoscroll().unwrap();
        assert_eq!(lcd.entry, EntryMode::default());
    }

    #[test]
    fn tall_font_only_on_one_row() {
        let gpio = RecordingGpio::new(8);
        let mut lcd = GpioHD44780Driver::new_4bit(&gpio, 0, None, 1, [2, 3, 4, 5]);
        lcd.begin(16, 2, Font::Dots5x10).unwrap();
        assert_eq!(lcd.function.font, Font::Dots5x8);
        lcd.begin(16, 1, Font::Dots5x10).unwrap();
        assert_eq!(lcd.function.font, Font::Dots5x10);
        assert_eq!(lcd.function.lines, LineCount::One);
    }

    #[test]
    fn zero_rows_act_as_one() {
        let gpio = RecordingGpio::new(8);
        let mut lcd = GpioHD44780Driver::new_4bit(&gpio, 0, None, 1, [2, 3, 4, 5]);
        lcd.begin(16, 0, Font::default()).unwrap();
        assert_eq!(lcd.rows, 1);
        lcd.set_cursor(3, 2).unwrap();
    }

    #[test]
    fn nothing_is_sent_before_begin() {
        let gpio = RecordingGpio::new(8);
        let mut lcd = GpioHD44780Driver::new_4bit(&gpio, 0, None, 1, [2, 3, 4, 5]);
        assert!(!lcd.is_initialized());
        assert_eq!(lcd.clear(), Err(GpioError::NotInitialized));
        assert_eq!(lcd.display(), Err(GpioError::NotInitialized));
        assert_eq!(lcd.write_glyph(b'A'), Err(GpioError::NotInitialized));
        assert_eq!(lcd.command(0x01), Err(GpioError::NotInitialized));
        assert!(gpio.events().is_empty());
        assert_eq!(lcd.control, DisplayControl::default());
    }

    #[test]
    fn strict_policy_rejects_out_of_range_input() {
        let gpio = RecordingGpio::new(8);
        let mut lcd = GpioHD44780Driver::new_4bit(&gpio, 0, None, 1, [2, 3, 4, 5])
            .with_input_policy(InputPolicy::Strict);
        assert_eq!(lcd.begin(16, 5, Font::default()), Err(GpioError::InvalidArgument));
        assert!(!lcd.is_initialized());
        lcd.begin(16, 2, Font::default()).unwrap();

        let mark = gpio.mark();
        assert_eq!(lcd.set_cursor(0, 2), Err(GpioError::InvalidArgument));
        assert_eq!(lcd.set_cursor(0x40, 1), Err(GpioError::InvalidArgument));
        // 0xC8 + 0x40 would wrap around to 0x08
        assert_eq!(lcd.set_cursor(0xC8, 1), Err(GpioError::InvalidArgument));
        assert_eq!(lcd.create_char(8, &[0; 8]), Err(GpioError::InvalidArgument));
        assert!(gpio.events_since(mark).is_empty());

        lcd.set_cursor(15, 1).unwrap();
        lcd.create_char(7, &[0; 8]).unwrap();
    }
}
