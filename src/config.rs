//! 编译器配置
//!
//! 控制日期精度、时区、区域设置以及服务器支持的功能开关。
//! 配置可以从 JSON 文件加载，所有字段都有默认值。

use crate::error::{Error, Result};
use crate::query::datetime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 编译器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// 日期等值比较按整天处理
    pub day_precision: bool,
    /// 写入查询文档的 `Product` 属性
    pub product: String,
    /// IANA 时区名
    pub time_zone: String,
    /// 区域设置，决定短日期的年月日顺序
    pub locale: String,
    /// 服务器支持字段之间的比较
    pub supports_field_comparison: bool,
    /// 服务器支持链接查询
    pub supports_link_queries: bool,
    /// 服务器支持 `in group`
    pub supports_in_group: bool,
    /// 未知的 `@宏` 交给服务器求值
    pub server_side_macros: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            day_precision: false,
            product: String::new(),
            time_zone: "UTC".to_string(),
            locale: "en-US".to_string(),
            supports_field_comparison: true,
            supports_link_queries: true,
            supports_in_group: true,
            server_side_macros: false,
        }
    }
}

impl CompilerConfig {
    /// 从 JSON 字符串加载并校验
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: CompilerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件加载并校验
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("无法读取配置文件 {:?}: {}", path, e)))?;
        Self::from_json_str(&data)
    }

    /// 检查时区和区域设置
    pub fn validate(&self) -> Result<()> {
        self.tz()?;
        if !datetime::is_valid_locale(&self.locale) {
            return Err(Error::Config(format!("无效的区域设置: {}", self.locale)));
        }
        Ok(())
    }

    /// 解析后的时区
    pub fn tz(&self) -> Result<Tz> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|_| Error::Config(format!("无效的时区: {}", self.time_zone)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert!(!config.day_precision);
        assert_eq!(config.tz().unwrap(), Tz::UTC);
        assert!(config.supports_link_queries);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = CompilerConfig::from_json_str(
            r#"{ "day_precision": true, "time_zone": "Europe/Berlin" }"#,
        )
        .unwrap();
        assert!(config.day_precision);
        assert_eq!(config.locale, "en-US");
        assert_eq!(config.tz().unwrap(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn test_invalid_values() {
        let err = CompilerConfig::from_json_str(r#"{ "time_zone": "Mars/Olympus" }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = CompilerConfig::from_json_str(r#"{ "locale": "???" }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"{ "product": "Fabrikam" }"#).unwrap();
        let config = CompilerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.product, "Fabrikam");
    }
}
