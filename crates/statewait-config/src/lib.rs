//! statewait-config
//!
//! 操作ごとのタイムアウトと名前付きの待機プロファイルを YAML / JSON から読み込み、
//! [`statewait::WaitSpec`] に変換する。

pub mod duration;
pub mod error;
pub mod profile;
pub mod timeouts;

pub use error::*;
pub use profile::WaitProfile;
pub use timeouts::{DEFAULT_TIMEOUT, Operation, Timeouts};

use serde::{Deserialize, Serialize};
use statewait::WaitSpec;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "STATEWAIT_CONFIG_PATH";

const CANDIDATES: [&str; 4] = [
    "statewait.local.yaml",
    ".statewait.local.yaml",
    "statewait.yaml",
    ".statewait.yaml",
];

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 `STATEWAIT_CONFIG_PATH` (直接パス指定)
/// 2. カレントディレクトリ: statewait.local.yaml, .statewait.local.yaml, statewait.yaml, .statewait.yaml
/// 3. ./.statewait/ ディレクトリ内: 同様の順序
/// 4. ~/.config/statewait/statewait.yaml (グローバル設定)
pub fn find_config_file() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from) {
        if path.exists() {
            return Ok(path);
        }
        // 存在しないパスは無視して通常の検索に進む
        tracing::debug!(path = %path.display(), "{CONFIG_PATH_ENV} points at a missing file");
    }

    let current_dir = std::env::current_dir()?;
    let project_roots = [current_dir.clone(), current_dir.join(".statewait")];

    let project_config = project_roots
        .iter()
        .filter(|root| root.is_dir())
        .flat_map(|root| CANDIDATES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists());
    if let Some(path) = project_config {
        return Ok(path);
    }

    dirs::config_dir()
        .map(|dir| dir.join("statewait").join("statewait.yaml"))
        .filter(|path| path.exists())
        .ok_or(ConfigError::ConfigFileNotFound)
}

/// 設定ファイル全体
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatewaitConfig {
    pub timeouts: Timeouts,
    pub profiles: BTreeMap<String, WaitProfile>,
}

impl StatewaitConfig {
    /// 設定ファイルを読み込む。拡張子が `.json` なら JSON、それ以外は YAML として解釈する。
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config: Self = if is_json {
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        };

        tracing::debug!(
            path = %path.display(),
            profiles = config.profiles.len(),
            "設定ファイルを読み込みました"
        );
        Ok(config)
    }

    /// [`find_config_file`] で見つけたファイルを読み込む
    pub fn discover() -> Result<Self> {
        let path = find_config_file()?;
        Self::load(path)
    }

    pub fn profile(&self, name: &str) -> Option<&WaitProfile> {
        self.profiles.get(name)
    }

    /// 名前付きプロファイルから `WaitSpec` を組み立てる
    pub fn spec(&self, name: &str) -> Result<WaitSpec> {
        let profile = self
            .profile(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;

        profile
            .to_spec(&self.timeouts)
            .map_err(|source| ConfigError::InvalidProfile {
                name: name.to_string(),
                source,
            })
    }
}
