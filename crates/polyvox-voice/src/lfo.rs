//! Block-rate triangle LFO.

/// Triangle LFO advanced once per block.
///
/// Output runs between -1 and +1. The LFO holds at 0 for `delay` ticks
/// before it starts moving; `increment` is the change per tick, so a full
/// cycle takes `4 / increment` blocks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockLfo {
    value: f32,
    increment: f32,
    delay: u32,
}

impl BlockLfo {
    /// Create a stopped LFO.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment for a given rate in Hz at `blocks_per_second` ticks/s.
    pub fn increment_for(freq_hz: f32, blocks_per_second: f32) -> f32 {
        if blocks_per_second <= 0.0 {
            return 0.0;
        }
        4.0 * freq_hz / blocks_per_second
    }

    /// Set the per-tick increment.
    pub fn set_increment(&mut self, increment: f32) {
        self.increment = increment;
    }

    /// Per-tick increment.
    pub fn increment(&self) -> f32 {
        self.increment
    }

    /// Set the number of ticks to hold at zero.
    pub fn set_delay(&mut self, delay: u32) {
        self.delay = delay;
    }

    /// Remaining delay ticks.
    pub fn delay(&self) -> u32 {
        self.delay
    }

    /// Current output.
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Return to zero. Increment and delay are kept.
    pub fn reset(&mut self) {
        self.value = 0.0;
    }

    /// Advance one block; returns the new value.
    pub fn tick(&mut self) -> f32 {
        if self.delay > 0 {
            self.delay -= 1;
            return self.value;
        }

        self.value += self.increment;
        if self.value > 1.0 {
            self.increment = -self.increment;
            self.value = 2.0 - self.value;
        } else if self.value < -1.0 {
            self.increment = -self.increment;
            self.value = -2.0 - self.value;
        }
        self.value
    }
}
