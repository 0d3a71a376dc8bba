//! INI serialization logic for converting `PipelineConfig` → INI string.

use super::PipelineConfig;

/// Convert a `PipelineConfig` to a commented INI string for saving.
pub(super) fn to_config_string(config: &PipelineConfig) -> String {
    format!(
        r#"[pipeline]
; Payload compression applied before storage:
;   gzip - gzip stream (default)
;   zlib - zlib stream
;   none - store payloads as produced
compression = {}
; Maximum number of tiles or metadata documents generated at once (default: 32)
max_concurrent = {}
; Requests allowed to wait for a generation slot before new ones are
; rejected (default: 2048)
queue_length = {}
"#,
        config.compression, config.max_concurrent, config.queue_length
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_through_ini() {
        let config = PipelineConfig::default().with_max_concurrent(3);
        let text = to_config_string(&config);
        let ini = ini::Ini::load_from_str(&text).unwrap();
        let parsed = super::super::parser::parse_ini(&ini).unwrap();
        assert_eq!(parsed, config);
    }
}
