use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{StoreError, StoreResult};
use crate::types::{CollisionPolicy, IdMode, DEFAULT_ID_LENGTH, DEFAULT_MAP_PATH, MIN_ID_LENGTH};

/// 混淆配置
///
/// 所有字段都有默认值，可从 JSON（camelCase）加载：
///
/// ```json
/// { "mapPath": ".next/class-map.json", "idLength": 8, "idMode": "random" }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RandomizerConfig {
    /// 映射文件路径（相对项目根目录）
    pub map_path: PathBuf,
    /// 不小于 `MIN_ID_LENGTH`
    pub id_length: usize,
    pub id_mode: IdMode,
    pub collision_policy: CollisionPolicy,
    /// 防抖落盘的静默期（毫秒）。
    ///
    /// None 表示每次转换后立即落盘（`TransformOptions::from_config`）；
    /// 设置后由 `DebouncedFlusher::from_config` 启动的后台线程落盘。
    pub flush_debounce_ms: Option<u64>,
}

impl Default for RandomizerConfig {
    fn default() -> Self {
        Self {
            map_path: PathBuf::from(DEFAULT_MAP_PATH),
            id_length: DEFAULT_ID_LENGTH,
            id_mode: IdMode::default(),
            collision_policy: CollisionPolicy::default(),
            flush_debounce_ms: None,
        }
    }
}

impl RandomizerConfig {
    /// 解析并校验配置
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(json)?;
        config.validate().map_err(serde::de::Error::custom)?;
        Ok(config)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.id_length < MIN_ID_LENGTH {
            return Err(StoreError::InvalidIdLength {
                length: self.id_length,
                min: MIN_ID_LENGTH,
            });
        }
        Ok(())
    }

    pub fn flush_debounce(&self) -> Option<Duration> {
        self.flush_debounce_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RandomizerConfig::default();
        assert_eq!(config.map_path, PathBuf::from(".next/class-map.json"));
        assert_eq!(config.id_length, 8);
        assert_eq!(config.id_mode, IdMode::Random);
        assert_eq!(config.collision_policy, CollisionPolicy::Regenerate);
        assert!(config.flush_debounce().is_none());
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            RandomizerConfig::from_json(r#"{ "idMode": "stable", "flushDebounceMs": 50 }"#).unwrap();
        assert_eq!(config.id_mode, IdMode::Stable);
        assert_eq!(config.flush_debounce(), Some(Duration::from_millis(50)));
        assert_eq!(config.id_length, 8);
    }

    #[test]
    fn test_from_json_full() {
        let config = RandomizerConfig::from_json(
            r#"{
                "mapPath": "build/classes.json",
                "idLength": 10,
                "idMode": "random",
                "collisionPolicy": "allow"
            }"#,
        )
        .unwrap();
        assert_eq!(config.map_path, PathBuf::from("build/classes.json"));
        assert_eq!(config.id_length, 10);
        assert_eq!(config.collision_policy, CollisionPolicy::Allow);
    }

    #[test]
    fn test_from_json_rejects_short_id_length() {
        let err = RandomizerConfig::from_json(r#"{ "idLength": 0 }"#).unwrap_err();
        assert!(err.to_string().contains("invalid idLength 0"), "{err}");
        assert!(RandomizerConfig::from_json(r#"{ "idLength": 3 }"#).is_err());
        assert!(RandomizerConfig::from_json(r#"{ "idLength": 4 }"#).is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(RandomizerConfig::default().validate().is_ok());
        let config = RandomizerConfig {
            id_length: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StoreError::InvalidIdLength { length: 0, min: 4 })
        ));
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(RandomizerConfig::from_json(r#"{ "idMode": "sequential" }"#).is_err());
    }
}
