//! 重试中间件（retry）
//!
//! 单条消息的状态机：`Attempt(n) → Success | Failure`。失败且 `n < max_retries` 时按指数
//! 退避等待后重试；等待期间上下文被取消则立即结束并返回 `Cancelled`；重试耗尽返回
//! `Exhausted`。后两种结果都由路由强制确认，避免“毒消息”被总线无限重投。
//!
//! 不可重试的错误（见 `DomainError::is_retryable`）首个失败即返回 `Exhausted`。
//!
use crate::error::{DomainError, DomainResult};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 指数退避重试策略
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// 首次执行之外的最大重试次数
    pub max_retries: u32,
    /// 首次退避间隔
    pub initial_interval: Duration,
    /// 每次退避的增长倍数
    pub multiplier: f64,
    /// 单次退避上限
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_interval: Duration::from_millis(100),
            multiplier: 2.0,
            max_interval: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// 第 `retry` 次重试（从 0 开始）前的等待时长
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

/// 一条消息在某个处理器上的最终结果
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    /// 重试耗尽，或遇到不可重试的错误
    Exhausted { error: DomainError, attempts: u32 },
    /// 退避等待期间上下文被取消
    Cancelled { error: DomainError, attempts: u32 },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::Cancelled { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded { .. })
    }

    /// 失败结果携带的最后一次错误
    pub fn error(&self) -> Option<&DomainError> {
        match self {
            RetryOutcome::Succeeded { .. } => None,
            RetryOutcome::Exhausted { error, .. } | RetryOutcome::Cancelled { error, .. } => {
                Some(error)
            }
        }
    }
}

/// 按策略执行 `op`，`op` 收到当前尝试序号（从 1 开始）
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    mut op: F,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let error = match op(attempts).await {
            Ok(value) => return RetryOutcome::Succeeded { value, attempts },
            Err(error) => error,
        };

        if !error.is_retryable() {
            tracing::warn!(attempts, error = %error, "non-retryable failure");
            return RetryOutcome::Exhausted { error, attempts };
        }

        let retries = attempts - 1;
        if retries >= policy.max_retries {
            return RetryOutcome::Exhausted { error, attempts };
        }

        let delay = policy.backoff(retries);
        tracing::debug!(attempts, ?delay, error = %error, "attempt failed, backing off");

        tokio::select! {
            biased;
            _ = token.cancelled() => return RetryOutcome::Cancelled { error, attempts },
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
