use statewait::SpecError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "設定ファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: statewait.local.yaml, .statewait.local.yaml, statewait.yaml, .statewait.yaml\n\
        - ./.statewait/ ディレクトリ\n\
        - ~/.config/statewait/statewait.yaml\n\
        または STATEWAIT_CONFIG_PATH 環境変数で直接指定できます"
    )]
    ConfigFileNotFound,

    #[error("待機プロファイルが見つかりません: {0}")]
    UnknownProfile(String),

    #[error("待機プロファイル '{name}' が不正です: {source}")]
    InvalidProfile {
        name: String,
        #[source]
        source: SpecError,
    },

    #[error("{} の解析に失敗しました: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{} の解析に失敗しました: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
