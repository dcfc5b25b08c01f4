//! Property-based tests for the send effects.
//!
//! Any legal parameter combination must produce finite output, and mix mode
//! must equal replace mode plus whatever the destination already held.

use polyvox_core::{FxMode, SendEffect};
use polyvox_effects::{
    Chorus, ChorusParamSet, ChorusParams, ChorusWaveform, Reverb, ReverbParamSet, ReverbParams,
};
use proptest::prelude::*;

fn run_pair<E: SendEffect>(mut a: E, mut b: E, input: &[f32], base: f32) -> (Vec<f32>, Vec<f32>) {
    let n = input.len();
    let (mut rl, mut rr) = (vec![0.0; n], vec![0.0; n]);
    a.process(FxMode::Replace, input, &mut rl, &mut rr);
    let (mut ml, mut mr) = (vec![base; n], vec![base; n]);
    b.process(FxMode::Mix, input, &mut ml, &mut mr);
    let diff_l = rl.iter().zip(&ml).map(|(r, m)| m - r - base).collect();
    let diff_r = rr.iter().zip(&mr).map(|(r, m)| m - r - base).collect();
    (diff_l, diff_r)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn reverb_finite_for_any_params(
        roomsize in -1.0f32..2.0,
        damping in -1.0f32..2.0,
        width in 0.0f32..120.0,
        level in 0.0f32..2.0,
        input in prop::collection::vec(-1.0f32..1.0, 256..1024),
    ) {
        let mut reverb = Reverb::new(44100.0);
        reverb.set_params(ReverbParamSet::ALL, &ReverbParams { roomsize, damping, width, level });
        let mut l = vec![0.0; input.len()];
        let mut r = vec![0.0; input.len()];
        reverb.process_replace(&input, &mut l, &mut r);
        prop_assert!(l.iter().chain(r.iter()).all(|x| x.is_finite()));
    }

    #[test]
    fn chorus_finite_for_any_params(
        nr in 0usize..120,
        level in 0.0f32..12.0,
        speed in 0.0f32..8.0,
        depth_ms in 0.0f32..400.0,
        triangle in any::<bool>(),
        input in prop::collection::vec(-1.0f32..1.0, 256..1024),
    ) {
        let mut chorus = Chorus::new(22050.0);
        let waveform = if triangle { ChorusWaveform::Triangle } else { ChorusWaveform::Sine };
        chorus.set_params(
            ChorusParamSet::ALL,
            &ChorusParams { nr, level, speed, depth_ms, waveform },
        );
        let mut l = vec![0.0; input.len()];
        let mut r = vec![0.0; input.len()];
        chorus.process_replace(&input, &mut l, &mut r);
        prop_assert!(l.iter().all(|x| x.is_finite()));
        prop_assert_eq!(l, r);
    }

    #[test]
    fn reverb_mix_is_replace_plus_base(
        base in -1.0f32..1.0,
        input in prop::collection::vec(-1.0f32..1.0, 64..512),
    ) {
        let (dl, dr) = run_pair(Reverb::new(48000.0), Reverb::new(48000.0), &input, base);
        prop_assert!(dl.iter().chain(dr.iter()).all(|d| d.abs() < 1e-5));
    }

    #[test]
    fn chorus_mix_is_replace_plus_base(
        base in -1.0f32..1.0,
        input in prop::collection::vec(-1.0f32..1.0, 64..512),
    ) {
        let (dl, dr) = run_pair(Chorus::new(48000.0), Chorus::new(48000.0), &input, base);
        prop_assert!(dl.iter().chain(dr.iter()).all(|d| d.abs() < 1e-5));
    }
}
