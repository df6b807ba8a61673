//! Dynamic range compression through an external `compand` utility.
//!
//! Presets are argument lists appended after `compand`. Config may name a
//! catalog entry or spell the arguments out; both resolve to raw arguments
//! before any task is planned.

use std::path::Path;
use std::process::Command;

use once_cell::sync::Lazy;

use crate::audio::read_audio_file;
use crate::config::DrcPresetSpec;
use crate::error::{PipelineError, PipelineResult};

/// Named presets: attack/decay, transfer function, then optional gain,
/// initial volume and delay
static PRESET_CATALOG: Lazy<Vec<(&'static str, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        ("radio", vec!["0.01,1", "-90,-90,-70,-70,-60,-20,0,0", "-5"]),
        (
            "film-standard",
            vec!["0.1,0.3", "-90,-90,-70,-64,-43,-37,-31,-31,-21,-21,0,-20", "0", "0", "0.1"],
        ),
        (
            "music-standard",
            vec!["0.1,0.3", "-90,-90,-70,-58,-55,-43,-31,-31,-21,-21,0,-20", "0", "0", "0.1"],
        ),
        (
            "speech",
            vec!["0.1,0.3", "-90,-90,-70,-55,-50,-35,-31,-31,-21,-21,0,-20", "0", "0", "0.1"],
        ),
    ]
});

/// Names accepted by [`resolve_presets`]
pub fn preset_names() -> Vec<&'static str> {
    PRESET_CATALOG.iter().map(|(name, _)| *name).collect()
}

/// Turn configured presets into raw `compand` argument lists
///
/// # Errors
/// Configuration error for an unknown name or an empty argument list.
pub fn resolve_presets(specs: &[DrcPresetSpec]) -> PipelineResult<Vec<Vec<String>>> {
    specs
        .iter()
        .map(|spec| match spec {
            DrcPresetSpec::Named(name) => PRESET_CATALOG
                .iter()
                .find(|(candidate, _)| candidate == name)
                .map(|(_, args)| args.iter().map(|arg| arg.to_string()).collect())
                .ok_or_else(|| {
                    PipelineError::config(format!(
                        "unknown DRC preset '{}' (known: {})",
                        name,
                        preset_names().join(", ")
                    ))
                }),
            DrcPresetSpec::Args(args) if args.is_empty() => {
                Err(PipelineError::config("DRC preset argument list is empty"))
            }
            DrcPresetSpec::Args(args) => Ok(args.clone()),
        })
        .collect()
}

/// Compress `input` into `output` and return the sample count of the result
///
/// Runs `<program> -G <input> <output> -q compand <preset...>`, then re-reads
/// the output at `sample_rate`.
pub fn apply_drc(
    program: &str,
    input: &Path,
    output: &Path,
    preset: &[String],
    sample_rate: u32,
) -> PipelineResult<usize> {
    let result = Command::new(program)
        .arg("-G")
        .arg(input)
        .arg(output)
        .args(["-q", "compand"])
        .args(preset)
        .output()
        .map_err(|err| PipelineError::ExternalTool {
            program: program.to_string(),
            status: None,
            details: format!("failed to start: {}", err),
        })?;

    if !result.status.success() {
        return Err(PipelineError::ExternalTool {
            program: program.to_string(),
            status: result.status.code(),
            details: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        });
    }

    let compressed = read_audio_file(output, sample_rate, None)?;
    Ok(compressed.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_named_presets_resolve() {
        let specs = vec![
            DrcPresetSpec::Named("radio".to_string()),
            DrcPresetSpec::Named("speech".to_string()),
        ];
        let resolved = resolve_presets(&specs).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0], vec!["0.01,1", "-90,-90,-70,-70,-60,-20,0,0", "-5"]);
        assert_eq!(resolved[1].len(), 5);
    }

    #[test]
    fn test_raw_arguments_pass_through() {
        let args = vec!["0.3,1".to_string(), "6:-70,-60,-20".to_string()];
        let resolved = resolve_presets(&[DrcPresetSpec::Args(args.clone())]).unwrap();
        assert_eq!(resolved, vec![args]);
    }

    #[test]
    fn test_unknown_or_empty_preset_is_config_error() {
        let err = resolve_presets(&[DrcPresetSpec::Named("loud".to_string())]).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));

        let err = resolve_presets(&[DrcPresetSpec::Args(Vec::new())]).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
    }

    #[test]
    fn test_empty_catalog_resolves_to_nothing() {
        assert!(resolve_presets(&[]).unwrap().is_empty());
        assert_eq!(preset_names().len(), 4);
    }

    #[test]
    fn test_missing_program_is_external_tool_error() {
        let dir = tempdir().unwrap();
        let err = apply_drc(
            "kws-prep-no-such-compander",
            &dir.path().join("in.wav"),
            &dir.path().join("out.wav"),
            &["0.01,1".to_string()],
            16_000,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::ExternalTool { status: None, .. }));
    }
}
