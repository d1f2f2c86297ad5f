//! Punched-card digitizer firmware.
//!
//! Captures 80-column cards as they pass the mechanical reader. An
//! odometer sensor clocks one edge per row increment and a presence sensor
//! brackets each card's transit; the acquisition state machine decimates
//! the edge train into per-column samples of the twelve row sense lines.
//! Completed cards land in a fixed table that the USB console dumps as
//! punch-cell art or hex. An independent task pulses the card feeder
//! motor while the feed switch is enabled.
#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(not(target_os = "none"))]
fn main() {}

#[cfg(target_os = "none")]
#[rtic::app(device = hollerith::hardware::hal::stm32, peripherals = true, dispatchers = [DCMI, JPEG])]
mod app {
    use fugit::ExtU32;
    use rtic_monotonics::Monotonic;
    use stm32h7xx_hal::gpio::ExtiPin;

    use deck::feeder::Debouncer;
    use deck::{Acquisition, DeckStore, Edge};
    use hollerith::console::Console;
    use hollerith::hardware::{
        self, design_parameters, platform, FeedSwitch, FeederOutput,
        PresenceInput, ResetButton, RowSensors, StatusLed, Systick,
        TimebaseInput,
    };

    use hollerith::hardware::design_parameters::MAX_CARDS;

    static DECK: DeckStore<MAX_CARDS> = DeckStore::new();

    #[shared]
    struct Shared {
        acquisition: Acquisition<'static, MAX_CARDS>,
        feeder: FeederOutput,
    }

    #[local]
    struct Local {
        timebase: TimebaseInput,
        presence: PresenceInput,
        reset_button: ResetButton,
        rows: RowSensors,
        feed_switch: FeedSwitch,
        console: Console<MAX_CARDS>,
        _status_led: StatusLed,
    }

    #[init]
    fn init(c: init::Context) -> (Shared, Local) {
        let reader_devices = hardware::setup::setup(c.core, c.device);

        let (writer, reader) = DECK.split().unwrap();
        let acquisition = Acquisition::new(writer, design_parameters::TIMING);

        feed::spawn().unwrap();
        log::info!(
            "up and running, capacity {} cards",
            reader.capacity()
        );

        (
            Shared {
                acquisition,
                feeder: reader_devices.feeder,
            },
            Local {
                timebase: reader_devices.timebase,
                presence: reader_devices.presence,
                reset_button: reader_devices.reset_button,
                rows: reader_devices.rows,
                feed_switch: reader_devices.feed_switch,
                console: Console::new(reader_devices.usb_serial, reader),
                _status_led: reader_devices.status_led,
            },
        )
    }

    /// One odometer pulse per mechanical row increment.
    ///
    /// Same priority as `presence`: the two edge sources never preempt one
    /// another, so the state machine sees a totally ordered event stream.
    #[task(binds = EXTI9_5, priority = 3, shared = [acquisition], local = [timebase, rows])]
    fn timebase(mut c: timebase::Context) {
        c.local.timebase.clear_interrupt_pending_bit();
        let rows = c.local.rows.sample();
        c.shared
            .acquisition
            .lock(|acq| acq.handle(Edge::Timebase(rows)));
    }

    /// Card presence edge; the level tells insertion from removal.
    #[task(binds = EXTI15_10, priority = 3, shared = [acquisition], local = [presence])]
    fn presence(mut c: presence::Context) {
        c.local.presence.clear_interrupt_pending_bit();
        let edge = if c.local.presence.is_low() {
            Edge::PresenceFell
        } else {
            Edge::PresenceRose
        };
        c.shared.acquisition.lock(|acq| acq.handle(edge));
    }

    /// Reset request: bypasses the acquisition machine entirely.
    ///
    /// Runs above the acquisition priority and supervises the shutdown:
    /// the feeder actuator is forced off before the processor restarts.
    #[task(binds = EXTI3, priority = 4, shared = [feeder], local = [reset_button])]
    fn reset_request(mut c: reset_request::Context) {
        c.local.reset_button.clear_interrupt_pending_bit();
        c.shared.feeder.lock(|feeder| feeder.set_low());
        platform::reboot();
    }

    /// Feeder drive loop.
    ///
    /// Polls the debounced feed switch and, while enabled, pulses the
    /// actuator with a long on phase and a short off phase for an
    /// intermittent feed motion. Shares nothing with the acquisition path.
    #[task(priority = 1, shared = [feeder], local = [
        feed_switch,
        debounce: Debouncer = Debouncer::new(design_parameters::FEED_DEBOUNCE_MS, false),
        enabled: bool = false,
    ])]
    async fn feed(mut c: feed::Context) {
        loop {
            let now_ms = u64::from(Systick::now().ticks());
            let on = c
                .local
                .debounce
                .update(now_ms, c.local.feed_switch.is_high());
            if on != *c.local.enabled {
                *c.local.enabled = on;
                log::info!("feed {}", if on { "on" } else { "off" });
            }

            if on {
                c.shared.feeder.lock(|feeder| feeder.set_high());
                Systick::delay(design_parameters::FEED_PULSE_ON_MS.millis())
                    .await;
                c.shared.feeder.lock(|feeder| feeder.set_low());
                Systick::delay(design_parameters::FEED_PULSE_OFF_MS.millis())
                    .await;
            } else {
                c.shared.feeder.lock(|feeder| feeder.set_low());
                Systick::delay(design_parameters::FEED_POLL_MS.millis()).await;
            }
        }
    }

    /// Console service. Reads are bounded by the completed-card count, so
    /// no lock against the acquisition interrupts is taken here.
    #[idle(local = [console])]
    fn idle(c: idle::Context) -> ! {
        loop {
            c.local.console.poll();
            if c.local.console.usb_is_suspended() {
                cortex_m::asm::wfi();
            }
        }
    }
}
