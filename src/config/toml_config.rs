use crate::core::ops::{ListingFormat, LISTING_FORMATS};
use crate::core::yaz0;
use crate::utils::error::{Result, SzsError};
use crate::utils::release::Repositories;
use crate::utils::validation::{validate_one_of, validate_path, validate_range, validate_url, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub list: ListConfig,
    pub extract: ExtractConfig,
    pub compress: CompressConfig,
    pub logging: LoggingConfig,
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    pub format: Option<String>,
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub output_path: Option<String>,
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressConfig {
    pub window_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub releases_url: Option<String>,
    pub snapshots_url: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| SzsError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${OUTPUT_DIR})，未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| SzsError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 取得列表輸出格式
    pub fn list_format(&self) -> Result<Option<ListingFormat>> {
        self.list.format.as_deref().map(str::parse).transpose()
    }

    /// 取得壓縮視窗大小
    pub fn window_size(&self) -> usize {
        self.compress.window_size.unwrap_or(yaz0::MAX_DISTANCE)
    }

    pub fn log_json(&self) -> bool {
        self.logging.json.unwrap_or(false)
    }

    /// 取得發佈倉庫，未設定的項目使用預設值
    pub fn repositories(&self) -> Repositories {
        let defaults = Repositories::default();
        Repositories {
            releases: self.publish.releases_url.clone().unwrap_or(defaults.releases),
            snapshots: self.publish.snapshots_url.clone().unwrap_or(defaults.snapshots),
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        if let Some(format) = &self.list.format {
            validate_one_of("list.format", &format.to_ascii_lowercase(), LISTING_FORMATS)?;
        }
        if let Some(output_path) = &self.extract.output_path {
            validate_path("extract.output_path", output_path)?;
        }
        if let Some(window) = self.compress.window_size {
            validate_range("compress.window_size", window, 1, yaz0::MAX_DISTANCE)?;
        }
        if let Some(level) = &self.logging.level {
            validate_one_of("logging.level", &level.to_ascii_lowercase(), LOG_LEVELS)?;
        }
        if let Some(url) = &self.publish.releases_url {
            validate_url("publish.releases_url", url)?;
        }
        if let Some(url) = &self.publish.snapshots_url {
            validate_url("publish.snapshots_url", url)?;
        }
        Ok(())
    }
}
