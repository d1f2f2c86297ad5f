//! Hardware-specific setup and glue for the card reader.
pub use stm32h7xx_hal as hal;

pub mod design_parameters;
pub mod platform;
mod sensors;
mod serial;
pub mod setup;

pub use sensors::RowSensors;
pub use serial::SerialInterface;

// The odometer emits one rising edge per mechanical row increment.
pub type TimebaseInput = hal::gpio::gpiog::PG9<hal::gpio::Input>;

// Falls while a card blocks the presence sensor.
pub type PresenceInput = hal::gpio::gpioc::PC15<hal::gpio::Input>;

// Momentary button, pulled up; falling edge requests a device restart.
pub type ResetButton = hal::gpio::gpioa::PA3<hal::gpio::Input>;

// Feed-enable toggle switch, polled by the feeder task.
pub type FeedSwitch = hal::gpio::gpiob::PB6<hal::gpio::Input>;

// Feeder motor driver input.
pub type FeederOutput =
    hal::gpio::gpiod::PD0<hal::gpio::Output<hal::gpio::PushPull>>;

// Front panel status LED, lit by the panic handler.
pub type StatusLed =
    hal::gpio::gpiod::PD6<hal::gpio::Output<hal::gpio::PushPull>>;

pub type UsbBus = hal::usb_hs::UsbBus<hal::usb_hs::USB2>;

rtic_monotonics::systick_monotonic!(Systick, 1_000);

#[inline(never)]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    use core::{
        fmt::Write,
        sync::atomic::{AtomicBool, Ordering},
    };
    use cortex_m::asm;
    use rtt_target::{ChannelMode, UpChannel};

    cortex_m::interrupt::disable();

    // Recursion protection
    static PANICKED: AtomicBool = AtomicBool::new(false);
    while PANICKED.load(Ordering::Relaxed) {
        asm::bkpt();
    }
    PANICKED.store(true, Ordering::Relaxed);

    // Stop the feeder and light the status LED.
    let gpiod = unsafe { &*hal::stm32::GPIOD::ptr() };
    gpiod.odr.modify(|_, w| w.odr0().low().odr6().high());

    // Analogous to panic-rtt-target
    if let Some(mut channel) = unsafe { UpChannel::conjure(0) } {
        channel.set_mode(ChannelMode::BlockIfFull);
        writeln!(channel, "{}", info).ok();
    }

    // Abort
    asm::udf();
}

#[cortex_m_rt::exception]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    panic!("HardFault at {:#?}", ef);
}

#[cortex_m_rt::exception]
unsafe fn DefaultHandler(irqn: i16) {
    panic!("Unhandled exception (IRQn = {})", irqn);
}
