//! Block-rate section envelope.
//!
//! The envelope is a table of seven sections, each described by an
//! [`EnvSegment`]. It advances one tick per rendered block:
//!
//! ```text
//! value = coeff * value + increment
//! ```
//!
//! If the new value leaves `[min, max]` it is clamped and the envelope moves
//! to the next section. A section also ends once it has run for `count`
//! ticks. Sections with `count == 0` are skipped. [`EnvSection::Finished`] is
//! terminal.
//!
//! Linear ramps use `coeff = 1`; exponential approaches use `coeff < 1`.

/// Envelope sections in playback order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum EnvSection {
    /// Silent wait before the attack.
    #[default]
    Delay,
    /// Rise to peak.
    Attack,
    /// Hold at peak.
    Hold,
    /// Fall towards the sustain level.
    Decay,
    /// Held until note-off.
    Sustain,
    /// Fade out after note-off.
    Release,
    /// Terminal; the voice is done.
    Finished,
}

impl EnvSection {
    /// Number of sections.
    pub const COUNT: usize = 7;

    /// All sections in order.
    pub const ALL: [EnvSection; Self::COUNT] = [
        EnvSection::Delay,
        EnvSection::Attack,
        EnvSection::Hold,
        EnvSection::Decay,
        EnvSection::Sustain,
        EnvSection::Release,
        EnvSection::Finished,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn next(self) -> Self {
        match self {
            EnvSection::Delay => EnvSection::Attack,
            EnvSection::Attack => EnvSection::Hold,
            EnvSection::Hold => EnvSection::Decay,
            EnvSection::Decay => EnvSection::Sustain,
            EnvSection::Sustain => EnvSection::Release,
            EnvSection::Release | EnvSection::Finished => EnvSection::Finished,
        }
    }
}

/// Parameters of one envelope section.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvSegment {
    /// Length in blocks.
    pub count: u32,
    /// Multiplier applied to the previous value.
    pub coeff: f32,
    /// Added after the multiply.
    pub increment: f32,
    /// Lower bound; reaching below it ends the section.
    pub min: f32,
    /// Upper bound; reaching above it ends the section.
    pub max: f32,
}

impl EnvSegment {
    /// A section that is skipped immediately.
    pub const SKIP: Self = Self {
        count: 0,
        coeff: 1.0,
        increment: 0.0,
        min: -1.0,
        max: 1.0,
    };

    /// Hold the current value indefinitely.
    pub const HOLD_FOREVER: Self = Self {
        count: u32::MAX,
        coeff: 1.0,
        increment: 0.0,
        min: -1.0,
        max: 2.0,
    };

    /// Linear ramp from `from` to `to` over `blocks` ticks.
    pub fn linear(from: f32, to: f32, blocks: u32) -> Self {
        let blocks = blocks.max(1);
        Self {
            count: blocks,
            coeff: 1.0,
            increment: (to - from) / blocks as f32,
            min: from.min(to),
            max: from.max(to),
        }
    }

    /// Hold the current value for `blocks` ticks.
    pub fn hold(blocks: u32) -> Self {
        Self {
            count: blocks,
            ..Self::HOLD_FOREVER
        }
    }
}

impl Default for EnvSegment {
    fn default() -> Self {
        Self::SKIP
    }
}

/// Seven-section block-rate envelope.
///
/// # Example
///
/// ```rust
/// use polyvox_voice::{EnvSection, Envelope};
///
/// let mut env = Envelope::one_shot(2);
/// assert_eq!(env.tick(), 1.0);
/// assert_eq!(env.section(), EnvSection::Hold);
/// env.tick();
/// assert!(env.is_finished());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    data: [EnvSegment; EnvSection::COUNT],
    section: EnvSection,
    count: u32,
    value: f32,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::sustained()
    }
}

impl Envelope {
    /// An envelope whose every section is skipped.
    ///
    /// Useful as a base for [`set_segment`](Self::set_segment); as-is it is
    /// finished on its first tick.
    pub fn empty() -> Self {
        let mut data = [EnvSegment::SKIP; EnvSection::COUNT];
        data[EnvSection::Finished.index()] = EnvSegment {
            count: u32::MAX,
            coeff: 0.0,
            increment: 0.0,
            min: -1.0,
            max: 1.0,
        };
        Self {
            data,
            section: EnvSection::Delay,
            count: 0,
            value: 0.0,
        }
    }

    /// Jump to full level on the first tick and sustain until released.
    ///
    /// Release takes one block.
    pub fn sustained() -> Self {
        Self::adsr(1, 0, 1.0, 1)
    }

    /// Full level for exactly `blocks` ticks, then finished.
    ///
    /// The envelope reaches [`EnvSection::Finished`] on tick `blocks`.
    pub fn one_shot(blocks: u32) -> Self {
        let mut env = Self::empty();
        env.set_segment(EnvSection::Attack, EnvSegment::linear(0.0, 1.0, 1));
        env.set_segment(EnvSection::Hold, EnvSegment::hold(blocks.saturating_sub(1)));
        env
    }

    /// Linear attack/decay/sustain/release, all lengths in blocks.
    pub fn adsr(attack: u32, decay: u32, sustain: f32, release: u32) -> Self {
        let sustain = sustain.clamp(0.0, 1.0);
        let mut env = Self::empty();
        env.set_segment(EnvSection::Attack, EnvSegment::linear(0.0, 1.0, attack));
        if decay > 0 && sustain < 1.0 {
            env.set_segment(EnvSection::Decay, EnvSegment::linear(1.0, sustain, decay));
        }
        env.set_segment(EnvSection::Sustain, EnvSegment::HOLD_FOREVER);
        env.set_segment(EnvSection::Release, EnvSegment::linear(1.0, 0.0, release));
        env
    }

    /// Replace the parameters of one section.
    pub fn set_segment(&mut self, section: EnvSection, segment: EnvSegment) {
        self.data[section.index()] = segment;
    }

    /// Parameters of one section.
    pub fn segment(&self, section: EnvSection) -> EnvSegment {
        self.data[section.index()]
    }

    /// Current section.
    pub fn section(&self) -> EnvSection {
        self.section
    }

    /// Current value.
    pub fn value(&self) -> f32 {
        self.value
    }

    /// `true` once the envelope has reached its terminal section.
    pub fn is_finished(&self) -> bool {
        self.section == EnvSection::Finished
    }

    /// Jump to `section`, restarting its tick count.
    pub fn set_section(&mut self, section: EnvSection) {
        self.section = section;
        self.count = 0;
        self.skip_exhausted();
    }

    /// Enter the release section (note-off).
    pub fn release(&mut self) {
        if self.section < EnvSection::Release {
            self.set_section(EnvSection::Release);
        }
    }

    /// Jump straight to the terminal section.
    pub fn finish(&mut self) {
        self.section = EnvSection::Finished;
        self.count = 0;
        self.value = 0.0;
    }

    /// Rewind to the start with value 0.
    pub fn reset(&mut self) {
        self.section = EnvSection::Delay;
        self.count = 0;
        self.value = 0.0;
    }

    /// Advance one block; returns the new value.
    pub fn tick(&mut self) -> f32 {
        self.skip_exhausted();
        if self.is_finished() {
            self.value = 0.0;
            return 0.0;
        }

        let seg = self.data[self.section.index()];
        let mut x = seg.coeff * self.value + seg.increment;
        if x < seg.min {
            x = seg.min;
            self.advance();
        } else if x > seg.max {
            x = seg.max;
            self.advance();
        } else {
            self.count += 1;
        }
        self.value = x;

        self.skip_exhausted();
        self.value
    }

    fn advance(&mut self) {
        self.section = self.section.next();
        self.count = 0;
    }

    fn skip_exhausted(&mut self) {
        while !self.is_finished() && self.count >= self.data[self.section.index()].count {
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot_length() {
        for k in 1..6 {
            let mut env = Envelope::one_shot(k);
            for tick in 1..=k {
                assert!(!env.is_finished(), "k={} finished early at tick {}", k, tick);
                assert_eq!(env.tick(), 1.0);
            }
            assert!(env.is_finished(), "k={} should finish on tick {}", k, k);
        }
    }

    #[test]
    fn test_sustain_until_release() {
        let mut env = Envelope::sustained();
        for _ in 0..1000 {
            assert_eq!(env.tick(), 1.0);
        }
        assert_eq!(env.section(), EnvSection::Sustain);

        env.release();
        env.tick();
        assert!(env.is_finished());
    }

    #[test]
    fn test_adsr_shape() {
        let mut env = Envelope::adsr(4, 4, 0.5, 4);
        let attack: Vec<f32> = (0..4).map(|_| env.tick()).collect();
        assert_eq!(attack, vec![0.25, 0.5, 0.75, 1.0]);
        assert_eq!(env.section(), EnvSection::Decay);

        for _ in 0..4 {
            env.tick();
        }
        assert!((env.value() - 0.5).abs() < 1e-6);
        assert_eq!(env.section(), EnvSection::Sustain);

        env.release();
        let mut ticks = 0;
        while !env.is_finished() {
            env.tick();
            ticks += 1;
            assert!(ticks < 10);
        }
        assert_eq!(env.value(), 0.0);
    }

    #[test]
    fn test_clamp_advances_section() {
        let mut env = Envelope::empty();
        env.set_segment(
            EnvSection::Attack,
            EnvSegment {
                count: 100,
                coeff: 1.0,
                increment: 0.6,
                min: 0.0,
                max: 1.0,
            },
        );
        env.set_segment(EnvSection::Sustain, EnvSegment::HOLD_FOREVER);
        assert_eq!(env.tick(), 0.6);
        assert_eq!(env.tick(), 1.0);
        assert_eq!(env.section(), EnvSection::Sustain);
    }

    #[test]
    fn test_delay_section_holds_zero() {
        let mut env = Envelope::sustained();
        env.set_segment(EnvSection::Delay, EnvSegment::hold(3));
        for _ in 0..2 {
            assert_eq!(env.tick(), 0.0);
            assert_eq!(env.section(), EnvSection::Delay);
        }
        env.tick();
        assert_eq!(env.section(), EnvSection::Attack);
        assert_eq!(env.tick(), 1.0);
    }

    #[test]
    fn test_empty_finishes_immediately() {
        let mut env = Envelope::empty();
        env.tick();
        assert!(env.is_finished());
    }

    #[test]
    fn test_release_after_finish_is_noop() {
        let mut env = Envelope::one_shot(1);
        env.tick();
        env.release();
        assert!(env.is_finished());
    }
}
