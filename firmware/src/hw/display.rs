//! SSD1306 128x64 OLED adapter.

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use embedded_hal::i2c::I2c;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::{I2CDisplayInterface, Ssd1306};
use tracker_core::devices::DisplaySink;

type Panel<I2C> = Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

/// Buffered text display. Bus errors are logged and otherwise ignored.
pub struct OledDisplay<I2C> {
    panel: Panel<I2C>,
}

impl<I2C: I2c> OledDisplay<I2C> {
    /// Initialises the controller and blanks the panel.
    pub fn new(bus: I2C) -> Self {
        let interface = I2CDisplayInterface::new(bus);
        let mut panel = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        if panel.init().is_err() {
            crate::log::display_write_failed("init");
        }
        panel.clear_buffer();
        Self { panel }
    }
}

impl<I2C: I2c> DisplaySink for OledDisplay<I2C> {
    fn clear(&mut self) {
        self.panel.clear_buffer();
    }

    fn draw_line(&mut self, x: u8, y: u8, text: &str) {
        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        let origin = Point::new(i32::from(x), i32::from(y));
        // Drawing into the frame buffer cannot fail.
        let _ = Text::with_baseline(text, origin, style, Baseline::Alphabetic).draw(&mut self.panel);
    }

    fn flush(&mut self) {
        if self.panel.flush().is_err() {
            crate::log::display_write_failed("flush");
        }
    }

    fn power_off(&mut self) {
        if self.panel.set_display_on(false).is_err() {
            crate::log::display_write_failed("power off");
        }
    }
}
