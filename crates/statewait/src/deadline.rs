//! 操作全体の期限
//!
//! 1つの操作（例: 作成 → 設定変更 → 再起動待ち）が複数の待機を順に行うとき、
//! それぞれに個別のタイムアウトを渡す代わりに [`Deadline`] を共有し、
//! 残り時間だけを次の待機に割り当てる。

use std::time::Duration;
use tokio::time::Instant;

/// `start + timeout` が `Instant` に収まらない場合の代替期限
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// 期限切れの [`Deadline`] から作られる待機に割り当てる最短タイムアウト
const MIN_BUDGET: Duration = Duration::from_millis(1);

/// `start` から `timeout` 後の時刻。オーバーフローする場合は遠い未来。
pub(crate) fn instant_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// 複数の待機で共有する期限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// 現在時刻から `timeout` 後を期限とする
    pub fn new(timeout: Duration) -> Self {
        Self {
            at: instant_after(Instant::now(), timeout),
        }
    }

    /// 期限までの残り時間。期限を過ぎていれば `Duration::ZERO`。
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// 次の待機に渡すタイムアウト
    ///
    /// 期限切れでも 0 にはせず最短値を返すので、待機は即座にタイムアウトする
    /// （状態確認は高々1回）。
    pub(crate) fn budget(&self) -> Duration {
        self.remaining().max(MIN_BUDGET)
    }
}
