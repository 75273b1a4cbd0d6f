//! 搜索任务跟踪器（TaskTracker）
//!
//! 记录 `taskUid -> userId`，在任务提交（命令处理器）与完成回调（webhook）两条独立路径间共享。
//! 条目带 TTL，过期条目查找时视为不存在，并由后台清扫任务定期回收；不跨进程重启保留。
//!
use dashmap::DashMap;
use repertoire_domain::search::TaskUid;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskTrackerConfig {
    /// 条目存活时间
    pub ttl: Duration,
    /// 后台清扫间隔
    pub sweep_interval: Duration,
}

impl Default for TaskTrackerConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    user_id: Uuid,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default)]
pub struct TaskTracker {
    entries: DashMap<TaskUid, Entry>,
    config: TaskTrackerConfig,
}

impl TaskTracker {
    pub fn new(config: TaskTrackerConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &TaskTrackerConfig {
        &self.config
    }

    /// 记录任务所属用户；同一任务重复记录时以最后一次为准并刷新 TTL
    pub fn track(&self, uid: TaskUid, user_id: Uuid) {
        let expires_at = Instant::now() + self.config.ttl;
        self.entries.insert(uid, Entry { user_id, expires_at });
        tracing::debug!(task_uid = uid, %user_id, "search task tracked");
    }

    /// 查询任务所属用户（不移除）
    pub fn get_user_id(&self, uid: TaskUid) -> Option<Uuid> {
        let now = Instant::now();
        self.entries
            .get(&uid)
            .filter(|e| e.is_live(now))
            .map(|e| e.user_id)
    }

    /// 取出任务所属用户，保证同一任务至多被消费一次
    pub fn take(&self, uid: TaskUid) -> Option<Uuid> {
        let now = Instant::now();
        self.entries
            .remove(&uid)
            .map(|(_, e)| e)
            .filter(|e| e.is_live(now))
            .map(|e| e.user_id)
    }

    /// 回收过期条目，返回回收数量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 启动后台清扫，`token` 取消后退出
    pub fn spawn_sweeper(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        let period = tracker.config.sweep_interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // interval 首次 tick 立即完成
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = tracker.purge_expired();
                        if purged > 0 {
                            tracing::debug!(purged, remaining = tracker.len(), "expired search tasks purged");
                        }
                    }
                }
            }
            tracing::debug!("task tracker sweeper stopped");
        })
    }
}
