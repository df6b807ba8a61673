use super::*;
use crate::config::DrcPresetSpec;
use std::collections::HashSet;
use tempfile::{tempdir, TempDir};

fn tone(freq: f32, secs: f32) -> Vec<f32> {
    let len = (16_000.0 * secs) as usize;
    (0..len)
        .map(|i| 0.4 * (2.0 * std::f32::consts::PI * freq * i as f32 / 16_000.0).sin())
        .collect()
}

fn write_source(root: &Path, class_name: &str, file: &str, samples: &[f32]) {
    let dir = root.join(class_name);
    fs::create_dir_all(&dir).unwrap();
    write_wav(&dir.join(file), samples, 16_000).unwrap();
}

fn quiet_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.augment.show_progress = false;
    config.augment.seed = Some(42);
    config.augment.num_workers = Some(2);
    config
}

fn dataset_with_yes() -> TempDir {
    let dir = tempdir().unwrap();
    write_source(&dir.path().join("in"), "yes", "a.wav", &tone(440.0, 1.0));
    dir
}

#[test]
fn test_single_recording_produces_28_files() {
    let dir = dataset_with_yes();
    let out = dir.path().join("out");
    let augmenter = Augmenter::new(quiet_config()).unwrap();

    let report = augmenter
        .run(&dir.path().join("in"), &out, &AugmentOptions::new(16_000))
        .unwrap();

    assert_eq!(report.num_files(), 28);
    assert_eq!(report.num_sources, 1);
    assert_eq!(report.num_noise_chunks, 0);
    assert!(out.join(JAMS_DIR).is_dir());
    assert_eq!(fs::read_dir(out.join(WAV_DIR)).unwrap().count(), 28);

    let ledger = Ledger::read(&report.ledger_path).unwrap();
    assert_eq!(ledger.len(), 28);
    assert_eq!(ledger.total_samples(), report.ledger.total_samples());
    let names: HashSet<&str> = ledger.entries().iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names.len(), 28);
    assert!(names.contains("yes-a-1-orig.wav"));
    assert!(names.contains("yes-a-1-ts1.wav"));
    assert!(ledger.entries().iter().all(|e| e.label == "yes-a"));

    let shifted = ledger
        .entries()
        .iter()
        .find(|e| e.filename == "yes-a-1-ts1.wav")
        .unwrap();
    assert_eq!(shifted.sample_count, 15_600);
}

#[test]
fn test_noise_pool_adds_chunks_and_mixes() {
    let dir = dataset_with_yes();
    let noise_dir = dir.path().join("noise");
    fs::create_dir_all(&noise_dir).unwrap();
    write_wav(&noise_dir.join("hum.wav"), &tone(60.0, 5.0), 16_000).unwrap();

    let mut options = AugmentOptions::new(16_000);
    options.noise_dir = Some(noise_dir);
    let out = dir.path().join("out");
    let report = Augmenter::new(quiet_config())
        .unwrap()
        .run(&dir.path().join("in"), &out, &options)
        .unwrap();

    assert_eq!(report.num_noise_files, 1);
    assert_eq!(report.num_noise_chunks, 8);
    assert_eq!(report.num_files(), 8 + 28 + 2);

    let entries = report.ledger.entries();
    let chunks: Vec<&LedgerEntry> = entries
        .iter()
        .filter(|e| e.label == "unknownkeywords-noise")
        .collect();
    assert_eq!(chunks.len(), 8);
    assert!(chunks.iter().all(|e| e.sample_count == 16_000));
    // the noise file takes index 1, so the keyword continues at 2
    assert!(entries.iter().any(|e| e.filename == "yes-a-2-orig.wav"));
    assert!(entries.iter().any(|e| e.filename == "yes-a-2-bgn2.wav"));
}

#[test]
fn test_seeded_noise_mix_is_reproducible() {
    let dir = dataset_with_yes();
    let noise_dir = dir.path().join("noise");
    fs::create_dir_all(&noise_dir).unwrap();
    let noise: Vec<f32> = (0..20_000).map(|i| ((i * 7919) % 1000) as f32 / 500.0 - 1.0).collect();
    write_wav(&noise_dir.join("babble.wav"), &noise, 16_000).unwrap();

    let mut options = AugmentOptions::new(16_000);
    options.noise_dir = Some(noise_dir);
    let augmenter = Augmenter::new(quiet_config()).unwrap();

    let read_mix = |out: &Path| {
        read_audio_file(&out.join(WAV_DIR).join("yes-a-2-bgn1.wav"), 16_000, None)
            .unwrap()
            .samples
    };
    let first_out = dir.path().join("first");
    let second_out = dir.path().join("second");
    augmenter.run(&dir.path().join("in"), &first_out, &options).unwrap();
    augmenter.run(&dir.path().join("in"), &second_out, &options).unwrap();
    assert_eq!(read_mix(&first_out), read_mix(&second_out));
}

#[test]
fn test_validation_mode_skips_unknown_keywords() {
    let dir = dataset_with_yes();
    write_source(
        &dir.path().join("in"),
        "unknownkeywords",
        "u.wav",
        &tone(300.0, 1.0),
    );

    let mut options = AugmentOptions::new(16_000);
    options.validation_mode = true;
    let report = Augmenter::new(quiet_config())
        .unwrap()
        .run(&dir.path().join("in"), &dir.path().join("out"), &options)
        .unwrap();

    let unknown: Vec<&LedgerEntry> = report
        .ledger
        .entries()
        .iter()
        .filter(|e| e.label.starts_with("unknownkeywords-"))
        .collect();
    assert_eq!(unknown.len(), 1);
    assert_eq!(unknown[0].filename, "unknownkeywords-u-1-orig.wav");
    assert_eq!(report.num_files(), 1 + 28);
}

#[test]
fn test_denoise_mode_writes_originals_and_shifts() {
    let dir = dataset_with_yes();
    let noise_dir = dir.path().join("noise");
    fs::create_dir_all(&noise_dir).unwrap();
    write_wav(&noise_dir.join("hum.wav"), &tone(60.0, 5.0), 16_000).unwrap();

    let mut options = AugmentOptions::new(16_000);
    options.variants = false;
    options.noise_dir = Some(noise_dir);
    let report = Augmenter::new(quiet_config())
        .unwrap()
        .run(&dir.path().join("in"), &dir.path().join("out"), &options)
        .unwrap();

    let mut names: Vec<&str> = report
        .ledger
        .entries()
        .iter()
        .map(|e| e.filename.as_str())
        .collect();
    names.sort();
    assert_eq!(names, vec!["yes-a-1-orig.wav", "yes-a-1-ts1.wav"]);
    assert_eq!(report.num_noise_files, 0);
}

#[test]
fn test_output_directory_is_recreated() {
    let dir = dataset_with_yes();
    let out = dir.path().join("out");
    fs::create_dir_all(out.join(WAV_DIR)).unwrap();
    fs::write(out.join(WAV_DIR).join("stale.wav"), b"old").unwrap();

    let mut config = quiet_config();
    config.augment.time_shift_steps = vec![0];
    config.augment.time_stretch_rates.clear();
    config.augment.pitch_shift_steps.clear();
    config.augment.pitch_shift_steps_fine.clear();
    Augmenter::new(config)
        .unwrap()
        .run(&dir.path().join("in"), &out, &AugmentOptions::new(16_000))
        .unwrap();

    assert!(!out.join(WAV_DIR).join("stale.wav").exists());
    assert!(out.join(LEDGER_FILE).is_file());
}

#[test]
fn test_failing_compressor_aborts_without_ledger() {
    let dir = dataset_with_yes();
    let out = dir.path().join("out");
    let mut config = quiet_config();
    config.drc.program = "kws-prep-missing-compander".to_string();
    config.drc.presets = vec![DrcPresetSpec::Named("radio".to_string())];

    let err = Augmenter::new(config)
        .unwrap()
        .run(&dir.path().join("in"), &out, &AugmentOptions::new(16_000))
        .unwrap_err();

    assert!(matches!(err, PipelineError::ExternalTool { .. }));
    assert!(!out.join(LEDGER_FILE).exists());
}

#[test]
fn test_missing_input_directory_is_config_error() {
    let dir = tempdir().unwrap();
    let err = Augmenter::new(quiet_config())
        .unwrap()
        .run(
            &dir.path().join("absent"),
            &dir.path().join("out"),
            &AugmentOptions::new(16_000),
        )
        .unwrap_err();
    assert!(matches!(err, PipelineError::Configuration { .. }));
}

#[test]
fn test_task_seed_depends_on_identity_only() {
    let task = |index, sub_index| AugmentTask {
        kind: TaskKind::BackgroundNoise { shift: 0, noise: 0 },
        source: SourceRef::Keyword(0),
        index,
        sub_index,
        label: "yes-a".to_string(),
    };
    assert_eq!(task_seed(9, &task(1, 1)), task_seed(9, &task(1, 1)));
    assert_ne!(task_seed(9, &task(1, 1)), task_seed(9, &task(1, 2)));
    assert_ne!(task_seed(9, &task(1, 1)), task_seed(9, &task(2, 1)));
    assert_ne!(task_seed(9, &task(1, 1)), task_seed(10, &task(1, 1)));
}
