//! Low-level platform control.

/// Restart the processor.
///
/// Called by the reset-request supervisor once the feeder actuator has been
/// forced off. Never returns; all volatile state (including the capture
/// table) is lost, which is the documented recovery semantic.
pub fn reboot() -> ! {
    log::warn!("reset requested, restarting");
    cortex_m::interrupt::disable();
    cortex_m::peripheral::SCB::sys_reset();
}
