//! Fixed-capacity output routing for a voice.

/// Maximum output mappings per voice.
pub const MAX_MAPPINGS: usize = 4;

/// One voice output route: a flat buffer index and a gain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutputMapping {
    /// Flat channel index into the mixer's buffer set.
    pub buffer: usize,
    /// Linear amplitude applied on the way into the buffer.
    pub amp: f32,
}

/// Up to [`MAX_MAPPINGS`] output routes, addressed by slot.
///
/// Slots are set independently; an unset slot contributes nothing. The usual
/// layout for group `g` with `n` groups is slot 0 = `2g` (left), slot 1 =
/// `2g + 1` (right), slot 2 = `2n` (reverb send), slot 3 = `2n + 1`
/// (chorus send); see [`OutputMappings::stereo`].
///
/// ```rust
/// use polyvox_voice::OutputMappings;
///
/// let mut map = OutputMappings::stereo(0, 1, 0.5, 0.0);
/// assert_eq!(map.iter().count(), 4);
/// map.clear_slot(3);
/// assert_eq!(map.iter().count(), 3);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OutputMappings {
    slots: [Option<OutputMapping>; MAX_MAPPINGS],
}

impl OutputMappings {
    /// No routes.
    pub const fn new() -> Self {
        Self {
            slots: [None; MAX_MAPPINGS],
        }
    }

    /// Left/right of `group` at unity gain plus both effect sends.
    ///
    /// `groups` is the total group count, which places the send channels.
    pub fn stereo(group: usize, groups: usize, reverb_send: f32, chorus_send: f32) -> Self {
        let mut map = Self::new();
        map.set(0, 2 * group, 1.0);
        map.set(1, 2 * group + 1, 1.0);
        map.set(2, 2 * groups, reverb_send);
        map.set(3, 2 * groups + 1, chorus_send);
        map
    }

    /// Route `slot` to `buffer` at `amp`. Returns `false` if `slot` is out
    /// of range.
    pub fn set(&mut self, slot: usize, buffer: usize, amp: f32) -> bool {
        match self.slots.get_mut(slot) {
            Some(s) => {
                *s = Some(OutputMapping { buffer, amp });
                true
            }
            None => false,
        }
    }

    /// Change the destination of `slot`, keeping its gain (0 if unset).
    pub fn set_buffer(&mut self, slot: usize, buffer: usize) -> bool {
        let amp = self.get(slot).map_or(0.0, |m| m.amp);
        self.set(slot, buffer, amp)
    }

    /// Change the gain of `slot`. Returns `false` if the slot is unset.
    pub fn set_amp(&mut self, slot: usize, amp: f32) -> bool {
        match self.slots.get_mut(slot) {
            Some(Some(m)) => {
                m.amp = amp;
                true
            }
            _ => false,
        }
    }

    /// Remove the route in `slot`.
    pub fn clear_slot(&mut self, slot: usize) {
        if let Some(s) = self.slots.get_mut(slot) {
            *s = None;
        }
    }

    /// Route in `slot`, if any.
    pub fn get(&self, slot: usize) -> Option<OutputMapping> {
        self.slots.get(slot).copied().flatten()
    }

    /// Iterate over the set routes in slot order.
    pub fn iter(&self) -> impl Iterator<Item = OutputMapping> + '_ {
        self.slots.iter().filter_map(|s| *s)
    }

    /// Maximum number of routes.
    pub const fn capacity(&self) -> usize {
        MAX_MAPPINGS
    }
}
