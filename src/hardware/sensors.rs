//! Row sense line sampling.
//!
//! The twelve photo-sensitive data lines all live on GPIOE so one input
//! data register read snapshots every row at the same instant; sampling the
//! lines pin by pin could tear across a mechanical transition. Bit 10 has
//! no sense line and is masked off by [`RowPattern`].

use deck::RowPattern;

use super::hal;

pub struct RowSensors {
    // Held to keep the pins configured as pull-up inputs.
    _pins: [hal::gpio::ErasedPin<hal::gpio::Input>; 12],
}

impl RowSensors {
    pub fn new(pins: [hal::gpio::ErasedPin<hal::gpio::Input>; 12]) -> Self {
        Self { _pins: pins }
    }

    /// Instantaneous state of all row lines.
    pub fn sample(&self) -> RowPattern {
        // Note(unsafe): reading IDR has no side effects and the pins are
        // owned by `self`.
        let idr = unsafe { (*hal::stm32::GPIOE::ptr()).idr.read().bits() };
        RowPattern::new(idr as u16)
    }
}
