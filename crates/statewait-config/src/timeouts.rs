use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 各操作のタイムアウト既定値 (20分)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// 待機が属するリソース操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// 操作ごとのタイムアウト。未指定の操作は [`DEFAULT_TIMEOUT`] になる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "crate::duration")]
    pub create: Duration,
    #[serde(with = "crate::duration")]
    pub read: Duration,
    #[serde(with = "crate::duration")]
    pub update: Duration,
    #[serde(with = "crate::duration")]
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_TIMEOUT,
            read: DEFAULT_TIMEOUT,
            update: DEFAULT_TIMEOUT,
            delete: DEFAULT_TIMEOUT,
        }
    }
}

impl Timeouts {
    pub fn get(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}
