//! INI parsing logic for converting `Ini` → `PipelineConfig`.

use ini::Ini;

use super::file::ConfigFileError;
use super::PipelineConfig;
use crate::compression::Compression;

/// Parse an `Ini` object into a `PipelineConfig`.
///
/// Starts from `PipelineConfig::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<PipelineConfig, ConfigFileError> {
    let mut config = PipelineConfig::default();

    // [pipeline] section
    if let Some(section) = ini.section(Some("pipeline")) {
        if let Some(v) = section.get("compression") {
            config.compression = v
                .parse::<Compression>()
                .map_err(|_| ConfigFileError::InvalidValue {
                    section: "pipeline".to_string(),
                    key: "compression".to_string(),
                    value: v.to_string(),
                    reason: "must be one of: gzip, zlib, none".to_string(),
                })?;
        }
        if let Some(v) = section.get("max_concurrent") {
            config.max_concurrent = match v.trim().parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigFileError::InvalidValue {
                        section: "pipeline".to_string(),
                        key: "max_concurrent".to_string(),
                        value: v.to_string(),
                        reason: "must be a positive integer".to_string(),
                    });
                }
            };
        }
        if let Some(v) = section.get("queue_length") {
            config.queue_length = v
                .trim()
                .parse()
                .map_err(|_| ConfigFileError::InvalidValue {
                    section: "pipeline".to_string(),
                    key: "queue_length".to_string(),
                    value: v.to_string(),
                    reason: "must be a non-negative integer".to_string(),
                })?;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn load(content: &str) -> Result<PipelineConfig, ConfigFileError> {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, content).unwrap();
        PipelineConfig::load_from(&config_path)
    }

    #[test]
    fn test_full_config() {
        let config = load(
            r#"
[pipeline]
compression = zlib
max_concurrent = 8
queue_length = 64
"#,
        )
        .unwrap();

        assert_eq!(config.compression, Compression::Zlib);
        assert_eq!(config.max_concurrent, 8);
        assert_eq!(config.queue_length, 64);
    }

    #[test]
    fn test_partial_config() {
        let config = load(
            r#"
[pipeline]
compression = none
"#,
        )
        .unwrap();

        assert_eq!(config.compression, Compression::None);
        assert_eq!(config.max_concurrent, PipelineConfig::default().max_concurrent);
        assert_eq!(config.queue_length, PipelineConfig::default().queue_length);
    }

    #[test]
    fn test_unrelated_sections_are_ignored() {
        let config = load(
            r#"
[other]
compression = brotli
"#,
        )
        .unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_invalid_compression() {
        let err = load(
            r#"
[pipeline]
compression = brotli
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("pipeline.compression"));
        assert!(err.to_string().contains("gzip, zlib, none"));
    }

    #[test]
    fn test_zero_max_concurrent_is_rejected() {
        let err = load(
            r#"
[pipeline]
max_concurrent = 0
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidValue { ref key, .. } if key == "max_concurrent"
        ));
    }

    #[test]
    fn test_invalid_queue_length() {
        let err = load(
            r#"
[pipeline]
queue_length = lots
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("queue_length"));
    }
}
