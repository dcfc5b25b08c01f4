//! Integration tests for polyvox-engine crate.
//!
//! Tests cover command ordering, buffer zeroing, finished-voice reporting in
//! single and multi-threaded rendering, polyphony limits, effect routing,
//! and the threadsafe front end.

use std::sync::{Arc, Mutex};

use polyvox_config::SynthSettings;
use polyvox_engine::{
    BLOCK_SIZE, CHORUS_SEND, Command, CommandSink, EngineError, FinishedCallback, Mixer,
    MixerConfig, MixerOp, REVERB_SEND, Synth, command_queue,
};
use polyvox_voice::{Envelope, LoopMode, OutputMappings, Sample, Voice, VoiceId, VoiceOp};

const SR: f32 = 48000.0;

fn config(polyphony: usize, threads: usize) -> MixerConfig {
    MixerConfig {
        sample_rate: SR,
        polyphony,
        max_blocks: 8,
        threads,
        ..MixerConfig::default()
    }
}

fn looped(id: u32, key: f32) -> Voice {
    Voice::new(VoiceId(id), Sample::sine(SR, 120).into_shared(), SR)
        .with_key(key)
        .with_loop_mode(LoopMode::Looped)
}

fn one_shot(id: u32, blocks: u32) -> Box<Voice> {
    Box::new(looped(id, 60.0).with_envelope(Envelope::one_shot(blocks)))
}

/// Callback that records the id of every finished voice.
fn recorder() -> (FinishedCallback, Arc<Mutex<Vec<VoiceId>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let cb: FinishedCallback = Box::new(move |v: &Voice| sink.lock().unwrap().push(v.id()));
    (cb, log)
}

fn energy(buf: &[f32]) -> f32 {
    buf.iter().map(|x| x * x).sum()
}

fn all_silent(mixer: &Mixer, blocks: usize) -> bool {
    let b = mixer.buffers();
    let n = blocks * BLOCK_SIZE;
    (0..b.groups()).all(|g| energy(&b.left(g)[..n]) == 0.0 && energy(&b.right(g)[..n]) == 0.0)
        && energy(&b.send(REVERB_SEND)[..n]) == 0.0
        && energy(&b.send(CHORUS_SEND)[..n]) == 0.0
}

// ---------------------------------------------------------------------------
// 1. Command ordering
// ---------------------------------------------------------------------------

#[test]
fn commands_execute_in_fifo_order_exactly_once() {
    let mut mixer = Mixer::new(config(64, 0), None).unwrap();
    let (mut tx, mut rx) = command_queue(128);

    for id in 0..40 {
        tx.push(Command::add_voice(looped(id, 60.0))).unwrap();
    }
    assert_eq!(rx.dispatch_all(&mut mixer), 0);

    tx.flush();
    assert_eq!(rx.dispatch_all(&mut mixer), 40);
    assert_eq!(rx.dispatch_all(&mut mixer), 0);

    let ids: Vec<u32> = mixer.voices().map(|v| v.id().0).collect();
    assert_eq!(ids, (0..40).collect::<Vec<_>>());
}

#[test]
fn voice_ops_apply_in_push_order() {
    let mut mixer = Mixer::new(config(4, 0), None).unwrap();
    let (mut tx, mut rx) = command_queue(16);
    tx.push(Command::add_voice(looped(1, 60.0))).unwrap();
    for cents in [100.0, 200.0, 300.0] {
        tx.push(Command::voice(VoiceId(1), VoiceOp::SetPitch(cents)))
            .unwrap();
    }
    tx.flush();
    rx.dispatch_all(&mut mixer);
    assert_eq!(mixer.voices().next().map(Voice::pitch), Some(300.0));
}

#[test]
fn direct_mixer_is_a_command_sink() {
    let mut mixer = Mixer::new(config(1, 0), None).unwrap();
    CommandSink::push(&mut mixer, Command::add_voice(looped(1, 60.0))).unwrap();
    assert_eq!(mixer.active_count(), 1);
    assert_eq!(
        CommandSink::push(&mut mixer, Command::add_voice(looped(2, 60.0))),
        Err(EngineError::PolyphonyExceeded { polyphony: 1 })
    );
}

// ---------------------------------------------------------------------------
// 2. Zero before render
// ---------------------------------------------------------------------------

#[test]
fn empty_render_is_silent_twice() {
    let mut mixer = Mixer::new(config(8, 0), None).unwrap();
    assert_eq!(mixer.render(8), 8);
    assert!(all_silent(&mixer, 8));
    assert_eq!(mixer.render(8), 8);
    assert!(all_silent(&mixer, 8));
}

#[test]
fn output_does_not_leak_into_next_render() {
    let cfg = MixerConfig {
        reverb_enabled: false,
        chorus_enabled: false,
        ..config(8, 0)
    };
    let mut mixer = Mixer::new(cfg, None).unwrap();
    mixer.add_voice(one_shot(1, 2)).unwrap();

    mixer.render(2);
    assert!(energy(mixer.buffers().left(0)) > 0.0);
    assert_eq!(mixer.active_count(), 0);

    mixer.render(2);
    assert!(all_silent(&mixer, 2));
}

// ---------------------------------------------------------------------------
// 3. Finished exactly once
// ---------------------------------------------------------------------------

fn finish_renders(threads: usize, voices: u32) -> Vec<(usize, VoiceId)> {
    let (cb, log) = recorder();
    let mut mixer = Mixer::new(config(64, threads), Some(cb)).unwrap();
    for id in 0..voices {
        mixer.add_voice(one_shot(id, id % 7 + 1)).unwrap();
    }

    let mut seen = Vec::new();
    for render in 1..=10 {
        mixer.render(1);
        for id in log.lock().unwrap().drain(..) {
            seen.push((render, id));
        }
    }
    assert_eq!(mixer.active_count(), 0);
    seen
}

#[test]
fn finished_fires_once_on_block_k_single_thread() {
    let seen = finish_renders(0, 20);
    assert_eq!(seen.len(), 20);
    for (render, id) in seen {
        assert_eq!(render as u32, id.0 % 7 + 1, "{id}");
    }
}

#[test]
fn finished_fires_once_on_block_k_multi_thread() {
    let seen = finish_renders(3, 40);
    assert_eq!(seen.len(), 40);
    let mut ids: Vec<u32> = seen.iter().map(|(_, id)| id.0).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 40);
    for (render, id) in seen {
        assert_eq!(render as u32, id.0 % 7 + 1, "{id}");
    }
}

#[test]
fn finished_voices_come_back_in_slot_order() {
    let (cb, log) = recorder();
    let mut mixer = Mixer::new(config(16, 2), Some(cb)).unwrap();
    for id in 0..16 {
        let blocks = if id % 3 == 0 { 1 } else { 4 };
        mixer.add_voice(one_shot(id, blocks)).unwrap();
    }
    mixer.render(1);
    let ids: Vec<u32> = log.lock().unwrap().iter().map(|id| id.0).collect();
    assert_eq!(ids, vec![0, 3, 6, 9, 12, 15]);

    let mut returned = Vec::new();
    mixer.take_finished(|v| returned.push(v.id().0));
    assert_eq!(returned, ids);
}

#[test]
fn one_block_voice_in_two_block_render() {
    let (cb, log) = recorder();
    let mut mixer = Mixer::new(config(4, 0), Some(cb)).unwrap();
    mixer.add_voice(one_shot(1, 1)).unwrap();

    assert_eq!(mixer.render(2), 2);
    assert_eq!(log.lock().unwrap().as_slice(), &[VoiceId(1)]);
    assert_eq!(mixer.active_count(), 0);

    mixer.render(2);
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn voice_off_finishes_on_next_render() {
    let (cb, log) = recorder();
    let mut mixer = Mixer::new(config(4, 0), Some(cb)).unwrap();
    mixer.add_voice(Box::new(looped(5, 60.0))).unwrap();
    mixer.render(1);
    assert!(log.lock().unwrap().is_empty());

    mixer.execute(Command::voice(VoiceId(5), VoiceOp::Off));
    mixer.render(1);
    assert_eq!(log.lock().unwrap().as_slice(), &[VoiceId(5)]);
}

// ---------------------------------------------------------------------------
// 4. Polyphony
// ---------------------------------------------------------------------------

#[test]
fn add_beyond_limit_needs_a_finished_voice() {
    let (cb, log) = recorder();
    let mut mixer = Mixer::new(config(2, 0), Some(cb)).unwrap();
    mixer.add_voice(Box::new(looped(1, 60.0))).unwrap();
    mixer.add_voice(Box::new(looped(2, 60.0))).unwrap();
    assert!(mixer.add_voice(Box::new(looped(3, 60.0))).is_err());

    mixer.execute(Command::voice(VoiceId(2), VoiceOp::Off));
    mixer.add_voice(Box::new(looped(4, 60.0))).unwrap();
    assert_eq!(mixer.active_count(), 2);

    // Evicted voice is reported on the next render, before voices finishing there
    mixer.render(1);
    assert_eq!(log.lock().unwrap().as_slice(), &[VoiceId(2)]);

    let mut back = Vec::new();
    mixer.take_finished(|v| back.push(v.id()));
    assert_eq!(back, vec![VoiceId(3), VoiceId(2)]);
}

#[test]
fn shrinking_polyphony_below_active_fails() {
    let mut mixer = Mixer::new(config(8, 0), None).unwrap();
    for id in 0..5 {
        mixer.add_voice(Box::new(looped(id, 60.0))).unwrap();
    }
    assert_eq!(
        mixer.set_polyphony(4),
        Err(EngineError::PolyphonyBelowActive {
            requested: 4,
            active: 5
        })
    );
    mixer.set_polyphony(5).unwrap();
    assert!(mixer.add_voice(Box::new(looped(9, 60.0))).is_err());
}

#[test]
fn polyphony_change_keeps_worker_pool() {
    let mut mixer = Mixer::new(config(8, 2), None).unwrap();
    mixer.set_polyphony(32).unwrap();
    assert_eq!(mixer.threads(), 2);
    for id in 0..32 {
        mixer.add_voice(one_shot(id, 2)).unwrap();
    }
    mixer.render(2);
    assert_eq!(mixer.active_count(), 0);
}

#[test]
fn four_voices_all_reach_the_dry_buffer() {
    let cfg = MixerConfig {
        polyphony: 4,
        audio_groups: 4,
        ..config(4, 0)
    };
    let mut mixer = Mixer::new(cfg, None).unwrap();
    for g in 0..4 {
        let voice = looped(g as u32, 60.0).with_mappings(OutputMappings::stereo(g, 4, 0.0, 0.0));
        mixer.add_voice(Box::new(voice)).unwrap();
    }

    mixer.render(1);
    assert_eq!(mixer.active_count(), 4);
    for g in 0..4 {
        assert!(energy(&mixer.buffers().left(g)[..BLOCK_SIZE]) > 0.0, "group {g}");
        assert!(energy(&mixer.buffers().right(g)[..BLOCK_SIZE]) > 0.0, "group {g}");
    }
}

// ---------------------------------------------------------------------------
// 5. Multithread equivalence
// ---------------------------------------------------------------------------

fn render_set(threads: usize) -> (Vec<f32>, Vec<f32>, Vec<f32>, Vec<f32>) {
    let mut mixer = Mixer::new(config(64, threads), None).unwrap();
    for id in 0..48 {
        let key = 40.0 + id as f32;
        let voice = looped(id, key)
            .with_mappings(OutputMappings::stereo(0, 1, 0.3, 0.2))
            .with_envelope(Envelope::adsr(2, 4, 0.5, 3))
            .with_filter(9000.0 + 50.0 * id as f32, 6.0);
        mixer.add_voice(Box::new(voice)).unwrap();
    }

    let (mut l, mut r, mut rev, mut cho) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
    for _ in 0..4 {
        let n = mixer.render(8) * BLOCK_SIZE;
        let b = mixer.buffers();
        l.extend_from_slice(&b.left(0)[..n]);
        r.extend_from_slice(&b.right(0)[..n]);
        rev.extend_from_slice(&b.send(REVERB_SEND)[..n]);
        cho.extend_from_slice(&b.send(CHORUS_SEND)[..n]);
    }
    (l, r, rev, cho)
}

#[test]
fn worker_threads_match_single_thread_output() {
    let single = render_set(0);
    for threads in [1, 2, 5] {
        let multi = render_set(threads);
        for (a, b) in [
            (&single.0, &multi.0),
            (&single.1, &multi.1),
            (&single.2, &multi.2),
            (&single.3, &multi.3),
        ] {
            assert_eq!(a.len(), b.len());
            for (i, (x, y)) in a.iter().zip(b).enumerate() {
                assert!((x - y).abs() < 1e-4, "threads={threads} frame {i}: {x} vs {y}");
            }
        }
    }
}

#[test]
fn thread_count_can_change_between_renders() {
    let mut mixer = Mixer::new(config(32, 0), None).unwrap();
    for id in 0..32 {
        mixer.add_voice(Box::new(looped(id, 60.0))).unwrap();
    }
    for threads in [2, 4, 0, 1] {
        mixer.set_threads(threads).unwrap();
        assert_eq!(mixer.threads(), threads);
        mixer.render(2);
        assert_eq!(mixer.active_count(), 32);
    }
}

// ---------------------------------------------------------------------------
// 6. Effect mix vs replace
// ---------------------------------------------------------------------------

fn dry_left(mix_fx: bool, effects: bool, chorus_send: f32) -> (Vec<f32>, Vec<f32>) {
    let cfg = MixerConfig {
        mix_fx,
        reverb_enabled: effects,
        chorus_enabled: effects,
        ..config(4, 0)
    };
    let mut mixer = Mixer::new(cfg, None).unwrap();
    let voice = looped(1, 60.0).with_mappings(OutputMappings::stereo(0, 1, 0.0, chorus_send));
    mixer.add_voice(Box::new(voice)).unwrap();
    let n = mixer.render(8) * BLOCK_SIZE;
    (
        mixer.buffers().left(0)[..n].to_vec(),
        mixer.buffers().send(CHORUS_SEND)[..n].to_vec(),
    )
}

#[test]
fn mix_mode_with_silent_send_leaves_dry_unchanged() {
    let (reference, _) = dry_left(true, false, 0.0);
    let (with_fx, _) = dry_left(true, true, 0.0);
    assert_eq!(reference, with_fx);
}

#[test]
fn mix_mode_adds_effect_output_to_dry() {
    let (reference, _) = dry_left(true, false, 0.0);
    let (with_fx, _) = dry_left(true, true, 1.0);
    assert_ne!(reference, with_fx);
}

#[test]
fn replace_mode_keeps_effect_out_of_dry() {
    let (reference, _) = dry_left(false, false, 0.0);
    let (dry, send) = dry_left(false, true, 1.0);
    assert_eq!(reference, dry);
    assert!(energy(&send) > 0.0);
}

#[test]
fn disabled_send_receives_nothing() {
    let mut mixer = Mixer::new(config(4, 0), None).unwrap();
    mixer.execute(MixerOp::SetMixFx(false).into());
    mixer.execute(MixerOp::SetChorusEnabled(false).into());
    let voice = looped(1, 60.0).with_mappings(OutputMappings::stereo(0, 1, 0.0, 1.0));
    mixer.add_voice(Box::new(voice)).unwrap();
    mixer.render(4);
    assert!(all_silent_send(&mixer, CHORUS_SEND, 4));
}

fn all_silent_send(mixer: &Mixer, send: usize, blocks: usize) -> bool {
    energy(&mixer.buffers().send(send)[..blocks * BLOCK_SIZE]) == 0.0
}

// ---------------------------------------------------------------------------
// 7. Front end
// ---------------------------------------------------------------------------

fn settings(threads: usize) -> SynthSettings {
    SynthSettings {
        sample_rate: SR,
        polyphony: 32,
        max_blocks: 8,
        gain: 1.0,
        cpu_cores: threads + 1,
        ..SynthSettings::default()
    }
}

#[test]
fn threaded_and_direct_front_ends_agree() {
    let (mut handle, mut renderer) = Synth::new(&settings(0)).unwrap();
    let mut direct = Synth::direct(&settings(0)).unwrap();

    for key in [48.0, 55.0, 60.0] {
        handle.start_voice(looped(0, key)).unwrap();
        direct.start_voice(looped(0, key)).unwrap();
    }
    handle.flush();

    let mut a = (vec![0.0; 1000], vec![0.0; 1000]);
    let mut b = (vec![0.0; 1000], vec![0.0; 1000]);
    renderer.write_stereo(&mut a.0, &mut a.1);
    direct.write_stereo(&mut b.0, &mut b.1);
    assert_eq!(a, b);
    assert!(energy(&a.0) > 0.0);
}

#[test]
fn note_off_then_release_returns_voice() {
    let (mut handle, mut renderer) = Synth::new(&settings(2)).unwrap();
    let voice = looped(0, 60.0).with_envelope(Envelope::adsr(1, 1, 0.8, 2));
    let id = handle.start_voice(voice).unwrap();
    handle.flush();
    renderer.render(4);
    assert!(handle.collect_finished().is_empty());

    handle.note_off(id).unwrap();
    handle.flush();
    renderer.render(8);
    let done = handle.collect_finished();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id(), id);
    assert_eq!(handle.active_voices().count(), 0);
}

#[test]
fn rejected_voice_is_returned_not_lost() {
    let s = SynthSettings {
        polyphony: 1,
        ..settings(0)
    };
    let (mut handle, mut renderer) = Synth::new(&s).unwrap();
    let first = handle.start_voice(looped(0, 60.0)).unwrap();
    let second = handle.start_voice(looped(0, 60.0)).unwrap();
    handle.flush();
    renderer.render(1);

    let back: Vec<VoiceId> = handle.collect_finished().iter().map(|v| v.id()).collect();
    assert_eq!(back, vec![second]);
    assert!(handle.is_active(first));
    assert!(!handle.is_active(second));
}

#[test]
fn mixer_settings_through_queue() {
    let (mut handle, mut renderer) = Synth::new(&settings(0)).unwrap();
    handle.set_polyphony(12).unwrap();
    handle.set_threads(2).unwrap();
    handle.set_mix_fx(false).unwrap();
    handle.set_reverb_enabled(false).unwrap();
    assert!(matches!(
        handle.set_sample_rate(f32::NAN),
        Err(EngineError::InvalidSampleRate(_))
    ));
    handle.flush();
    renderer.render(1);

    let m = renderer.mixer();
    assert_eq!(m.polyphony(), 12);
    assert_eq!(m.threads(), 2);
    assert!(!m.reverb_enabled());
    assert_eq!(m.fx_mode(), polyvox_core::FxMode::Replace);
}
