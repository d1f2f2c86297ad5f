//! Reader calibration and sizing constants.

use deck::Timing;

/// Core clock.
pub const SYSCLK_MHZ: u32 = 400;

/// Capture table capacity. 1000 cards of 80 columns fit comfortably in
/// AXISRAM and outlast any one reading session.
pub const MAX_CARDS: usize = 1000;

/// Odometer decimation for this reader's gearing: 4 edges of mechanical
/// lead after the presence sensor trips, then 8 edges per column with the
/// sample taken on the last of each group. Sampling completes 644 edges in;
/// a full transit runs somewhat longer, and the advisory threshold sits
/// past that.
pub const TIMING: Timing = Timing {
    pre_roll: 4,
    per_column: 8,
    anomaly_ticks: 700,
};

/// Feeder actuator pulse: long drive phase, short rest phase, repeating
/// while feed is enabled.
pub const FEED_PULSE_ON_MS: u32 = 600;
pub const FEED_PULSE_OFF_MS: u32 = 200;

/// Feed switch poll period while the feeder is off.
pub const FEED_POLL_MS: u32 = 10;

/// Hold time before a feed switch level change is believed.
pub const FEED_DEBOUNCE_MS: u32 = 200;
