//! Mixer output buffers.
//!
//! A [`BufferSet`] owns every buffer a render call writes into, each sized
//! for `max_blocks * BLOCK_SIZE` frames. Voices address buffers through a
//! flat channel index:
//!
//! | Index | Buffer |
//! |-------|--------|
//! | `2g` | dry left of group `g` |
//! | `2g + 1` | dry right of group `g` |
//! | `2 * groups` | reverb send |
//! | `2 * groups + 1` | chorus send |
//!
//! Sends are mono. Each send also has a hidden right-return buffer that
//! receives the right channel of its effect in replace mode, in which the
//! send buffer itself becomes the left return.

use std::ops::Range;

use polyvox_core::{BLOCK_SIZE, FxMode, SendEffect};
use polyvox_voice::{BlockWrite, Voice};

/// Reverb send index.
pub const REVERB_SEND: usize = 0;
/// Chorus send index.
pub const CHORUS_SEND: usize = 1;
/// Number of effect sends.
pub const SEND_COUNT: usize = 2;

/// Which sends accept voice output in the current render.
///
/// Writing to a disabled send is skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendRoutes {
    /// Reverb send is live.
    pub reverb: bool,
    /// Chorus send is live.
    pub chorus: bool,
}

impl SendRoutes {
    /// Routing with the given sends live.
    pub const fn new(reverb: bool, chorus: bool) -> Self {
        Self { reverb, chorus }
    }

    fn enabled(self, send: usize) -> bool {
        match send {
            REVERB_SEND => self.reverb,
            CHORUS_SEND => self.chorus,
            _ => false,
        }
    }
}

/// Dry group buffers plus the two effect sends.
#[derive(Debug, Clone)]
pub struct BufferSet {
    groups: usize,
    max_blocks: usize,
    dry: Vec<Vec<f32>>,
    sends: [Vec<f32>; SEND_COUNT],
    returns_right: [Vec<f32>; SEND_COUNT],
    touched: bool,
}

impl BufferSet {
    /// Allocate zeroed buffers for `groups` stereo groups.
    pub fn new(groups: usize, max_blocks: usize) -> Self {
        let groups = groups.max(1);
        let max_blocks = max_blocks.max(1);
        let len = max_blocks * BLOCK_SIZE;
        Self {
            groups,
            max_blocks,
            dry: vec![vec![0.0; len]; 2 * groups],
            sends: [vec![0.0; len], vec![0.0; len]],
            returns_right: [vec![0.0; len], vec![0.0; len]],
            touched: false,
        }
    }

    /// Number of stereo dry groups.
    pub fn groups(&self) -> usize {
        self.groups
    }

    /// Most blocks one render can hold.
    pub fn max_blocks(&self) -> usize {
        self.max_blocks
    }

    /// Frames per buffer.
    pub fn capacity(&self) -> usize {
        self.max_blocks * BLOCK_SIZE
    }

    /// Number of addressable channels (dry channels plus sends).
    pub fn channel_count(&self) -> usize {
        2 * self.groups + SEND_COUNT
    }

    /// Flat index of a send.
    pub fn send_index(&self, send: usize) -> usize {
        2 * self.groups + send
    }

    /// Clear the first `blocks` blocks of every buffer.
    pub fn zero(&mut self, blocks: usize) {
        let n = blocks.min(self.max_blocks) * BLOCK_SIZE;
        for buf in self
            .dry
            .iter_mut()
            .chain(self.sends.iter_mut())
            .chain(self.returns_right.iter_mut())
        {
            buf[..n].fill(0.0);
        }
        self.touched = false;
    }

    /// Writable channel by flat index.
    ///
    /// `None` for out-of-range indices and for sends disabled in `routes`.
    pub fn channel_mut(&mut self, index: usize, routes: SendRoutes) -> Option<&mut [f32]> {
        let dry = 2 * self.groups;
        let buf = if index < dry {
            &mut self.dry[index]
        } else {
            let send = index - dry;
            if send >= SEND_COUNT || !routes.enabled(send) {
                return None;
            }
            &mut self.sends[send]
        };
        self.touched = true;
        Some(buf.as_mut_slice())
    }

    /// Dry left channel of `group`.
    pub fn left(&self, group: usize) -> &[f32] {
        &self.dry[2 * group]
    }

    /// Dry right channel of `group`.
    pub fn right(&self, group: usize) -> &[f32] {
        &self.dry[2 * group + 1]
    }

    /// Send buffer `send`. In replace mode this holds the left effect return
    /// after the render.
    pub fn send(&self, send: usize) -> &[f32] {
        &self.sends[send]
    }

    /// Left and right effect returns of `send` (replace mode).
    pub fn fx_return(&self, send: usize) -> (&[f32], &[f32]) {
        (&self.sends[send], &self.returns_right[send])
    }

    /// `true` if anything was routed into this set since the last zero.
    pub fn has_data(&self) -> bool {
        self.touched
    }

    /// Add `other`'s first `blocks` blocks of dry and send audio into this
    /// set. Both sets must have the same layout.
    pub fn add_from(&mut self, other: &BufferSet, blocks: usize) {
        if !other.touched {
            return;
        }
        let n = blocks.min(self.max_blocks).min(other.max_blocks) * BLOCK_SIZE;
        for (dst, src) in self
            .dry
            .iter_mut()
            .zip(&other.dry)
            .chain(self.sends.iter_mut().zip(&other.sends))
        {
            for (d, s) in dst[..n].iter_mut().zip(&src[..n]) {
                *d += s;
            }
        }
        self.touched = true;
    }

    /// Render `voice` for up to `blocks` blocks and add its output into the
    /// mapped channels.
    ///
    /// Returns `true` if the voice finished during this call.
    pub fn render_voice(&mut self, voice: &mut Voice, routes: SendRoutes, blocks: usize) -> bool {
        let blocks = blocks.min(self.max_blocks);
        let mut scratch = [0.0f32; BLOCK_SIZE];
        for b in 0..blocks {
            let (n, ended) = match voice.write(&mut scratch) {
                BlockWrite::Full => (BLOCK_SIZE, false),
                BlockWrite::Silent => continue,
                BlockWrite::Ended(n) => (n.min(BLOCK_SIZE), true),
            };
            if n > 0 {
                let offset = b * BLOCK_SIZE;
                for map in voice.mappings().iter() {
                    if let Some(ch) = self.channel_mut(map.buffer, routes) {
                        for (d, s) in ch[offset..offset + n].iter_mut().zip(&scratch[..n]) {
                            *d += s * map.amp;
                        }
                    }
                }
            }
            if ended {
                return true;
            }
        }
        false
    }

    /// Run `fx` over `frames` of send `send`, in block-sized chunks.
    ///
    /// Mix mode adds the effect output into group 0's dry pair; replace mode
    /// overwrites the send (left) and its right return.
    pub fn process_send<E: SendEffect>(
        &mut self,
        send: usize,
        fx: &mut E,
        mode: FxMode,
        frames: usize,
    ) {
        let frames = frames.min(self.capacity());
        let mut input = [0.0f32; BLOCK_SIZE];
        let mut start = 0;
        while start < frames {
            let range: Range<usize> = start..(start + BLOCK_SIZE).min(frames);
            let len = range.len();
            input[..len].copy_from_slice(&self.sends[send][range.clone()]);
            match mode {
                FxMode::Mix => {
                    let (left, rest) = self.dry.split_at_mut(1);
                    fx.process_mix(&input[..len], &mut left[0][range.clone()], &mut rest[0][range]);
                }
                FxMode::Replace => {
                    fx.process_replace(
                        &input[..len],
                        &mut self.sends[send][range.clone()],
                        &mut self.returns_right[send][range],
                    );
                }
            }
            start += len;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let set = BufferSet::new(3, 4);
        assert_eq!(set.channel_count(), 8);
        assert_eq!(set.send_index(REVERB_SEND), 6);
        assert_eq!(set.send_index(CHORUS_SEND), 7);
        assert_eq!(set.capacity(), 256);
    }

    #[test]
    fn test_routes_follow_effect_switches() {
        let routes = SendRoutes::new(true, false);
        assert!(routes.enabled(REVERB_SEND));
        assert!(!routes.enabled(CHORUS_SEND));
        assert!(!routes.enabled(SEND_COUNT));
        assert_eq!(SendRoutes::new(false, false), SendRoutes::default());
    }

    #[test]
    fn test_disabled_send_not_writable() {
        let mut set = BufferSet::new(1, 1);
        let routes = SendRoutes::new(false, true);
        assert!(set.channel_mut(2, routes).is_none());
        assert!(set.channel_mut(3, routes).is_some());
        assert!(set.channel_mut(4, routes).is_none());
    }

    #[test]
    fn test_zero_clears_only_requested_span() {
        let mut set = BufferSet::new(1, 2);
        let routes = SendRoutes::new(true, true);
        for i in 0..set.channel_count() {
            set.channel_mut(i, routes).unwrap().fill(1.0);
        }
        set.zero(1);
        assert!(set.left(0)[..BLOCK_SIZE].iter().all(|&x| x == 0.0));
        assert!(set.left(0)[BLOCK_SIZE..].iter().all(|&x| x == 1.0));
        assert!(set.send(CHORUS_SEND)[..BLOCK_SIZE].iter().all(|&x| x == 0.0));
        assert!(!set.has_data());
    }

    #[test]
    fn test_add_from_skips_untouched() {
        let mut a = BufferSet::new(1, 1);
        let mut b = BufferSet::new(1, 1);
        a.add_from(&b, 1);
        assert!(!a.has_data());

        let routes = SendRoutes::new(true, false);
        b.channel_mut(1, routes).unwrap()[5] = 0.5;
        b.channel_mut(2, routes).unwrap()[6] = 0.25;
        a.add_from(&b, 1);
        a.add_from(&b, 1);
        assert_eq!(a.right(0)[5], 1.0);
        assert_eq!(a.send(REVERB_SEND)[6], 0.5);
    }
}
