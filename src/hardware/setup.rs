//! Card reader hardware configuration
//!
//! This file contains all of the hardware-specific bring-up of the reader.
use core::sync::atomic::{AtomicBool, Ordering};

use stm32h7xx_hal::{self as hal, gpio::ExtiPin, prelude::*};

use super::{
    design_parameters, FeedSwitch, FeederOutput, PresenceInput, ResetButton,
    RowSensors, SerialInterface, StatusLed, Systick, TimebaseInput,
};

/// The reader's hardware interfaces, configured and quiescent.
pub struct ReaderDevices {
    pub timebase: TimebaseInput,
    pub presence: PresenceInput,
    pub reset_button: ResetButton,
    pub rows: RowSensors,
    pub feed_switch: FeedSwitch,
    pub feeder: FeederOutput,
    pub status_led: StatusLed,
    pub usb_serial: SerialInterface,
}

/// Configure the reader hardware.
///
/// Clock tree, RTT logging, the monotonic, the five input signals, the two
/// outputs, and the USB console. Interrupt unmasking is left to RTIC; no
/// edges are delivered until the task bindings are in place.
pub fn setup(
    mut core: hal::stm32::CorePeripherals,
    mut device: hal::stm32::Peripherals,
) -> ReaderDevices {
    // Set up RTT logging
    {
        // Enable debug during WFE/WFI-induced sleep
        device.DBGMCU.cr.modify(|_, w| w.dbgsleep_d1().set_bit());

        // Set up RTT channel to use for `rprintln!()` as "best effort".
        // This removes a critical section around the logging and thus allows
        // high-prio tasks to always interrupt at low latency.
        // It comes at a cost:
        // If a high-priority tasks preempts while we are logging something,
        // and if we then also want to log from within that high-preiority task,
        // the high-prio log message will be lost.
        let channels = rtt_target::rtt_init_default!();
        // Note(unsafe): The closure we pass does not establish a critical section
        // as demanded but it does ensure synchronization and implements a lock.
        unsafe {
            rtt_target::set_print_channel_cs(
                channels.up.0,
                &((|arg, f| {
                    static LOCKED: AtomicBool = AtomicBool::new(false);
                    if LOCKED.compare_exchange_weak(
                        false,
                        true,
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    ) == Ok(false)
                    {
                        f(arg);
                        LOCKED.store(false, Ordering::Release);
                    }
                }) as rtt_target::CriticalSectionFunc),
            );
        }

        static LOGGER: rtt_logger::RTTLogger =
            rtt_logger::RTTLogger::new(log::LevelFilter::Info);
        log::set_logger(&LOGGER)
            .map(|()| log::set_max_level(log::LevelFilter::Trace))
            .unwrap();
        log::info!("Starting");
    }

    let pwr = device.PWR.constrain();
    let vos = pwr.freeze();

    // Clear reset flags.
    device.RCC.rsr.write(|w| w.rmvf().set_bit());

    let rcc = device.RCC.constrain();
    let ccdr = rcc
        .use_hse(8.MHz())
        .sysclk(design_parameters::SYSCLK_MHZ.MHz())
        .hclk(200.MHz())
        .freeze(vos, &device.SYSCFG);

    // Set up USB clocks.
    ccdr.clocks.hsi48_ck().unwrap();
    ccdr.peripheral
        .kernel_usb_clk_mux(hal::rcc::rec::UsbClkSel::Hsi48);

    Systick::start(core.SYST, ccdr.clocks.sysclk().to_Hz());

    core.SCB.enable_icache();

    let gpioa = device.GPIOA.split(ccdr.peripheral.GPIOA);
    let gpiob = device.GPIOB.split(ccdr.peripheral.GPIOB);
    let gpioc = device.GPIOC.split(ccdr.peripheral.GPIOC);
    let gpiod = device.GPIOD.split(ccdr.peripheral.GPIOD);
    let gpioe = device.GPIOE.split(ccdr.peripheral.GPIOE);
    let gpiog = device.GPIOG.split(ccdr.peripheral.GPIOG);

    // Row sense lines: one port, pulled up, read as a single snapshot.
    // PE10 is skipped; its bit position carries no sense line.
    let rows = RowSensors::new([
        gpioe.pe0.into_pull_up_input().erase(),
        gpioe.pe1.into_pull_up_input().erase(),
        gpioe.pe2.into_pull_up_input().erase(),
        gpioe.pe3.into_pull_up_input().erase(),
        gpioe.pe4.into_pull_up_input().erase(),
        gpioe.pe5.into_pull_up_input().erase(),
        gpioe.pe6.into_pull_up_input().erase(),
        gpioe.pe7.into_pull_up_input().erase(),
        gpioe.pe8.into_pull_up_input().erase(),
        gpioe.pe9.into_pull_up_input().erase(),
        gpioe.pe11.into_pull_up_input().erase(),
        gpioe.pe12.into_pull_up_input().erase(),
    ]);

    // Odometer: one rising edge per row increment.
    let timebase = {
        let mut pin = gpiog.pg9.into_pull_down_input();
        pin.make_interrupt_source(&mut device.SYSCFG);
        pin.trigger_on_edge(&mut device.EXTI, hal::gpio::Edge::Rising);
        pin.enable_interrupt(&mut device.EXTI);
        pin
    };

    // Card presence: both edges; the handler reads the level to tell a
    // fall (insertion) from a rise (removal).
    let presence = {
        let mut pin = gpioc.pc15.into_pull_down_input();
        pin.make_interrupt_source(&mut device.SYSCFG);
        pin.trigger_on_edge(&mut device.EXTI, hal::gpio::Edge::RisingFalling);
        pin.enable_interrupt(&mut device.EXTI);
        pin
    };

    // Reset request: momentary button to ground.
    let reset_button = {
        let mut pin = gpioa.pa3.into_pull_up_input();
        pin.make_interrupt_source(&mut device.SYSCFG);
        pin.trigger_on_edge(&mut device.EXTI, hal::gpio::Edge::Falling);
        pin.enable_interrupt(&mut device.EXTI);
        pin
    };

    let feed_switch = gpiob.pb6.into_pull_up_input();

    let mut feeder = gpiod.pd0.into_push_pull_output();
    feeder.set_low();

    let mut status_led = gpiod.pd6.into_push_pull_output();
    status_led.set_low();

    let (usb_device, usb_serial) = {
        let _usb_id = gpioa.pa10.into_alternate::<10>();
        let usb_n = gpioa.pa11.into_alternate();
        let usb_p = gpioa.pa12.into_alternate();
        let usb = hal::usb_hs::USB2::new(
            device.OTG2_HS_GLOBAL,
            device.OTG2_HS_DEVICE,
            device.OTG2_HS_PWRCLK,
            usb_n,
            usb_p,
            ccdr.peripheral.USB2OTG,
            &ccdr.clocks,
        );

        let endpoint_memory =
            cortex_m::singleton!(: Option<&'static mut [u32]> = None).unwrap();
        endpoint_memory.replace(
            &mut cortex_m::singleton!(: [u32; 1024] = [0; 1024]).unwrap()[..],
        );
        let usb_bus =
            cortex_m::singleton!(: usb_device::bus::UsbBusAllocator<super::UsbBus> =
                hal::usb_hs::UsbBus::new(usb, endpoint_memory.take().unwrap()))
            .unwrap();

        let read_store = cortex_m::singleton!(: [u8; 128] = [0; 128]).unwrap();
        let write_store =
            cortex_m::singleton!(: [u8; 1024] = [0; 1024]).unwrap();
        let serial = usbd_serial::SerialPort::new_with_store(
            usb_bus,
            &mut read_store[..],
            &mut write_store[..],
        );

        let usb_device = usb_device::device::UsbDeviceBuilder::new(
            usb_bus,
            usb_device::device::UsbVidPid(0x1209, 0x0001),
        )
        .strings(&[usb_device::device::StringDescriptors::default()
            .manufacturer("Hollerith Reader")
            .product("Punched card digitizer")
            .serial_number("80-column")])
        .unwrap()
        .device_class(usbd_serial::USB_CLASS_CDC)
        .build();

        (usb_device, serial)
    };

    log::info!("setup() complete");

    ReaderDevices {
        timebase,
        presence,
        reset_button,
        rows,
        feed_switch,
        feeder,
        status_led,
        usb_serial: SerialInterface::new(usb_device, usb_serial),
    }
}
