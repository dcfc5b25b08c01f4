//! Integration tests for polyvox-cli.
//!
//! Tests run the `polyvox` binary for settings handling and offline
//! rendering. Device commands are not exercised since they depend on the
//! host's audio setup.

use std::process::Command;

/// Helper to get the path to the `polyvox` binary built by cargo.
fn polyvox_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_polyvox"));
    cmd.env("RUST_LOG", "warn");
    cmd
}

// ---------------------------------------------------------------------------
// settings
// ---------------------------------------------------------------------------

#[test]
fn settings_show_prints_defaults() {
    let output = polyvox_bin()
        .args(["settings", "show"])
        .output()
        .expect("failed to run polyvox settings show");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("polyphony = 256"), "got: {stdout}");
    assert!(stdout.contains("[reverb]"));
    assert!(stdout.contains("[chorus]"));
}

#[test]
fn settings_check_accepts_valid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("synth.toml");
    std::fs::write(&path, "polyphony = 32\ncpu_cores = 4\n").unwrap();

    let output = polyvox_bin()
        .args(["settings", "check"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("OK"));
    assert!(stdout.contains("3 worker thread(s)"), "got: {stdout}");
}

#[test]
fn settings_check_rejects_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "polyphony = 0\n[reverb]\nroomsize = 3.0\n").unwrap();

    let output = polyvox_bin()
        .args(["settings", "check"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("polyphony"), "got: {stderr}");
}

// ---------------------------------------------------------------------------
// render
// ---------------------------------------------------------------------------

#[test]
fn render_writes_audible_stereo_wav() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.wav");
    let settings = dir.path().join("synth.toml");
    std::fs::write(&settings, "sample_rate = 22050.0\n").unwrap();

    let output = polyvox_bin()
        .arg("render")
        .arg(&out)
        .args(["--notes", "60:0:0.25,67:0.1:0.25", "--tail", "0.25"])
        .args(["--reverb-send", "0"])
        .arg("--settings")
        .arg(&settings)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "render failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let info = polyvox_io::read_wav_info(&out).unwrap();
    assert_eq!(info.spec.channels, 2);
    assert_eq!(info.spec.sample_rate, 22050);
    // last note-off at 0.35s, plus release and tail
    assert!(info.duration_secs > 0.7 && info.duration_secs < 1.1, "{}", info.duration_secs);

    let (samples, _) = polyvox_io::read_wav(&out).unwrap();
    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(peak > 0.01, "render is silent");
    let last = &samples[samples.len() - 256..];
    assert!(last.iter().all(|s| s.abs() < 0.01), "tail should have died out");
}

#[test]
fn render_modes_agree() {
    let dir = tempfile::tempdir().unwrap();
    let notes = "48:0:0.2,52:0:0.2,55:0:0.2,60:0:0.2,64:0:0.2,67:0:0.2,\
                 72:0:0.2,76:0:0.2,79:0:0.2,84:0:0.2,50:0:0.2,53:0:0.2,\
                 57:0:0.2,62:0:0.2,65:0:0.2,69:0:0.2,74:0:0.2";

    let mut outputs = Vec::new();
    let configs = [
        ("serial", "cpu_cores = 1\n"),
        ("parallel", "cpu_cores = 3\n"),
        ("direct", "cpu_cores = 1\nthreadsafe = false\n"),
    ];
    for (name, toml) in configs {
        let settings = dir.path().join(format!("{name}.toml"));
        std::fs::write(&settings, toml).unwrap();
        let out = dir.path().join(format!("{name}.wav"));
        let status = polyvox_bin()
            .arg("render")
            .arg(&out)
            .args(["--notes", notes, "--tail", "0.1", "--reverb-send", "0"])
            .arg("--settings")
            .arg(&settings)
            .status()
            .unwrap();
        assert!(status.success());
        outputs.push(polyvox_io::read_wav(&out).unwrap().0);
    }

    for other in &outputs[1..] {
        assert_eq!(outputs[0].len(), other.len());
        for (a, b) in outputs[0].iter().zip(other) {
            assert!((a - b).abs() < 1e-4);
        }
    }
}

#[test]
fn render_rejects_bad_score() {
    let dir = tempfile::tempdir().unwrap();
    let output = polyvox_bin()
        .arg("render")
        .arg(dir.path().join("x.wav"))
        .args(["--notes", "60:zero:1"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(!dir.path().join("x.wav").exists());
}

#[test]
fn render_from_wav_sample() {
    let dir = tempfile::tempdir().unwrap();
    let sample = dir.path().join("sample.wav");
    let tone: Vec<f32> = (0..4410)
        .map(|i| (i as f32 * 0.0627).sin() * 0.5)
        .collect();
    polyvox_io::write_wav_stereo(&sample, &tone, &tone, polyvox_io::WavSpec::default()).unwrap();

    let out = dir.path().join("out.wav");
    let status = polyvox_bin()
        .arg("render")
        .arg(&out)
        .args(["--notes", "60:0:0.5", "--loop-sample", "--bit-depth", "16"])
        .arg("--sample")
        .arg(&sample)
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(polyvox_io::read_wav_info(&out).unwrap().spec.bits_per_sample, 16);
}
