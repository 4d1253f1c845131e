use crate::timeouts::{Operation, Timeouts};
use serde::{Deserialize, Serialize};
use statewait::{SpecError, WaitSpec};
use std::time::Duration;

/// 設定ファイルに書かれた待機プロファイル
///
/// 未指定の項目は `WaitSpec` ビルダーの既定値のまま。タイムアウトは
/// プロファイル自身の `timeout` → `operation` に対応する `timeouts` の値 →
/// ビルダーの既定値、の順で決まる。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    #[serde(default)]
    pub pending: Vec<String>,
    #[serde(default)]
    pub target: Vec<String>,
    #[serde(
        default,
        with = "crate::duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
    #[serde(
        default,
        with = "crate::duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub delay: Option<Duration>,
    #[serde(
        default,
        with = "crate::duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_timeout: Option<Duration>,
    #[serde(
        default,
        with = "crate::duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub poll_interval: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_found_checks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuous_target_occurrence: Option<u32>,
}

impl WaitProfile {
    pub fn resolve_timeout(&self, timeouts: &Timeouts) -> Option<Duration> {
        self.timeout
            .or_else(|| self.operation.map(|op| timeouts.get(op)))
    }

    pub fn to_spec(&self, timeouts: &Timeouts) -> Result<WaitSpec, SpecError> {
        let mut builder = WaitSpec::builder()
            .pending(self.pending.iter().cloned())
            .target(self.target.iter().cloned());

        if let Some(timeout) = self.resolve_timeout(timeouts) {
            builder = builder.timeout(timeout);
        }
        if let Some(delay) = self.delay {
            builder = builder.delay(delay);
        }
        if let Some(min_timeout) = self.min_timeout {
            builder = builder.min_timeout(min_timeout);
        }
        if let Some(interval) = self.poll_interval {
            builder = builder.poll_interval(interval);
        }
        if let Some(checks) = self.not_found_checks {
            builder = builder.not_found_checks(checks);
        }
        if let Some(occurrence) = self.continuous_target_occurrence {
            builder = builder.continuous_target_occurrence(occurrence);
        }

        builder.build()
    }
}
