//! # 配置管理器
//!
//! 负责定位配置文件、解析 TOML 并应用环境变量覆盖。
//! 配置在进程启动时加载一次，之后只读。

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::AppConfig;
use crate::bail;
use crate::error::ConfigResult;
use crate::error::config::ConfigError;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "DISCOURSE_PROXY_";
/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "DISCOURSE_PROXY_CONFIG_PATH";

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// 配置文件路径
    path: PathBuf,
    /// 当前配置
    config: AppConfig,
    /// 已应用的环境变量覆盖数量
    overrides_applied: usize,
}

impl ConfigManager {
    /// 确定配置文件路径
    ///
    /// 命令行参数优先，其次 `DISCOURSE_PROXY_CONFIG_PATH`，
    /// 最后是 `config/config.{RUST_ENV}.toml`（默认 dev）。
    #[must_use]
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(path) = cli_path {
            return path.to_path_buf();
        }
        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }
        let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        PathBuf::from(format!("config/config.{env}.toml"))
    }

    /// 从指定文件创建配置管理器，并应用进程环境变量覆盖
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::from_file_with_env(path, env::vars())
    }

    /// 从指定文件创建配置管理器，环境变量由调用方提供
    pub fn from_file_with_env<I>(path: impl AsRef<Path>, vars: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let path = path.as_ref();
        let mut config = Self::load_config_file(path)?;

        let overrides = Self::build_env_overrides(vars);
        Self::apply_env_overrides(&mut config, &overrides)?;

        info!(
            path = %path.display(),
            clients = config.client_keys.len(),
            overrides = overrides.len(),
            "配置文件加载完成"
        );

        Ok(Self {
            path: path.to_path_buf(),
            config,
            overrides_applied: overrides.len(),
        })
    }

    /// 当前配置
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 取出配置
    #[must_use]
    pub fn into_config(self) -> AppConfig {
        self.config
    }

    /// 配置文件路径
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 已应用的环境变量覆盖数量
    #[must_use]
    pub const fn overrides_applied(&self) -> usize {
        self.overrides_applied
    }

    /// 加载配置文件
    fn load_config_file(path: &Path) -> ConfigResult<AppConfig> {
        if !path.exists() {
            bail!(ConfigError::Load(format!(
                "配置文件不存在: {}",
                path.display()
            )));
        }

        let config_content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Load(format!("读取配置文件失败: {}: {e}", path.display()))
        })?;

        Ok(toml::from_str(&config_content)?)
    }

    /// 构建环境变量覆盖映射
    ///
    /// `DISCOURSE_PROXY_API_KEY` -> `api_key`
    fn build_env_overrides<I>(vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let overrides: HashMap<String, String> = vars
            .into_iter()
            .filter(|(key, _)| key != CONFIG_PATH_ENV)
            .filter_map(|(key, value)| {
                key.strip_prefix(ENV_PREFIX)
                    .map(|name| (name.to_lowercase(), value))
            })
            .collect();

        debug!("发现 {} 个环境变量覆盖", overrides.len());
        overrides
    }

    /// 应用环境变量覆盖
    fn apply_env_overrides(
        config: &mut AppConfig,
        overrides: &HashMap<String, String>,
    ) -> ConfigResult<()> {
        for (name, value) in overrides {
            debug!(
                "应用环境变量覆盖: {} = {}",
                name,
                if name.contains("key") {
                    "***"
                } else {
                    value
                }
            );

            match name.as_str() {
                "url" => config.upstream.url.clone_from(value),
                "api_key" => config.upstream.api_key.clone_from(value),
                "listen" => config.server.listen.clone_from(value),
                "debug" => config.upstream.debug = parse_bool(name, value)?,
                "trust_forwarded_headers" => {
                    config.server.trust_forwarded_headers = parse_bool(name, value)?;
                }
                "timeout_seconds" => {
                    config.upstream.timeout_seconds = value.parse().map_err(|_| {
                        ConfigError::invalid("upstream.timeout_seconds", format!("无效的数字: {value}"))
                    })?;
                }
                _ => {
                    warn!("未知的配置项，忽略环境变量覆盖: {}{}", ENV_PREFIX, name.to_uppercase());
                }
            }
        }
        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::invalid(
            format!("{ENV_PREFIX}{}", name.to_uppercase()),
            format!("无效的布尔值: {value}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const BASE: &str = r#"
[upstream]
url = "https://forums.yoursite.com/"
api_key = "123def789"

[client_keys.k1]
endpoint_whitelist = ["GET /categories.json"]
ip_whitelist = ["127.0.0.1"]
"#;

    #[test]
    fn loads_file_without_overrides() {
        let file = write_config(BASE);
        let manager = ConfigManager::from_file_with_env(file.path(), Vec::new()).unwrap();
        assert_eq!(manager.config().upstream.api_key, "123def789");
        assert_eq!(manager.overrides_applied(), 0);
        assert_eq!(manager.path(), file.path());
    }

    #[test]
    fn env_overrides_replace_values() {
        let file = write_config(BASE);
        let vars = vec![
            ("DISCOURSE_PROXY_API_KEY".to_string(), "from-env".to_string()),
            ("DISCOURSE_PROXY_DEBUG".to_string(), "true".to_string()),
            ("DISCOURSE_PROXY_LISTEN".to_string(), "0.0.0.0:1234".to_string()),
            ("DISCOURSE_PROXY_CONFIG_PATH".to_string(), "/ignored".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ];
        let config = ConfigManager::from_file_with_env(file.path(), vars)
            .unwrap()
            .into_config();

        assert_eq!(config.upstream.api_key, "from-env");
        assert!(config.upstream.debug);
        assert_eq!(config.server.listen, "0.0.0.0:1234");
    }

    #[test]
    fn invalid_bool_override_fails() {
        let file = write_config(BASE);
        let vars = vec![("DISCOURSE_PROXY_DEBUG".to_string(), "maybe".to_string())];
        let err = ConfigManager::from_file_with_env(file.path(), vars).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn missing_file_is_load_error() {
        let err = ConfigManager::from_file_with_env("/nonexistent/discourse-proxy.toml", Vec::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn broken_toml_is_parse_error() {
        let file = write_config("upstream = = 1");
        let err = ConfigManager::from_file_with_env(file.path(), Vec::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn cli_path_wins() {
        let path = ConfigManager::resolve_path(Some(Path::new("/etc/proxy.toml")));
        assert_eq!(path, PathBuf::from("/etc/proxy.toml"));
    }
}
