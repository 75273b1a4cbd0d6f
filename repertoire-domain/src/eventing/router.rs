//! 消息路由（EventRouter）
//!
//! 进程级唯一的分发循环：
//! - 按注册表中出现的队列各订阅一次，按消息元数据中的主题分发给匹配的处理器；
//! - 中间件顺序：关联 ID 传播 → 重试策略 → panic 隔离；
//! - 每个主题一条顺序通道：同一队列内不同主题并发，同一主题按投递顺序逐条处理，
//!   退避等待只挂起所在主题的通道；
//! - 通过 `RouterHandle` 关闭：停止拉取、排空在途处理、释放订阅后返回。
//!
use super::handler::Publish;
use super::retry::{RetryOutcome, RetryPolicy, retry};
use super::{Delivery, EventHandler, MessageBus};
use crate::error::{DomainError, DomainResult};
use crate::message::Message;
use crate::topic::{Queue, Topic};
use bon::Builder;
use futures_util::{FutureExt, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

// 导入由 bon::Builder 生成的 typestate 模块与状态转换别名
use self::event_router_builder::{IsUnset, SetRegistry, State as BuilderState};

/// EventRouter：
/// - 每个队列一条订阅，按主题查表分发
/// - 处理器调用经过重试与 panic 隔离，派生发布沿用来源消息的关联 ID
#[derive(Builder)]
pub struct EventRouter {
    bus: Arc<dyn MessageBus>,
    #[builder(setters(vis = "pub(crate)"))]
    registry: HandlerRegistry,
    #[builder(default)]
    config: RouterConfig,
}

impl<S: BuilderState> EventRouterBuilder<S> {
    pub fn handlers(self, handlers: Vec<Arc<dyn EventHandler>>) -> EventRouterBuilder<SetRegistry<S>>
    where
        <S as BuilderState>::Registry: IsUnset,
    {
        self.registry(HandlerRegistry::new(handlers))
    }
}

impl EventRouter {
    /// 需要订阅的队列
    pub fn queues(&self) -> Vec<Queue> {
        self.registry.queues().into_iter().collect()
    }

    /// 启动路由，返回可用于关闭/等待/健康检查的句柄
    pub fn start(self: Arc<Self>) -> RouterHandle {
        let token = CancellationToken::new();
        let (errors_tx, errors_rx) = mpsc::channel(self.config.error_channel_capacity.max(1));
        let active = Arc::new(AtomicUsize::new(0));
        let queues = self.queues();

        let tasks = queues
            .iter()
            .map(|&queue| {
                tokio::spawn(Self::consume_queue(
                    self.clone(),
                    queue,
                    token.clone(),
                    errors_tx.clone(),
                    active.clone(),
                ))
            })
            .collect();

        tracing::info!(queues = queues.len(), "event router started");

        RouterHandle {
            token,
            tasks,
            errors: Some(errors_rx),
            active,
            expected: queues.len(),
        }
    }

    async fn consume_queue(
        self: Arc<Self>,
        queue: Queue,
        token: CancellationToken,
        errors: mpsc::Sender<DispatchFailure>,
        active: Arc<AtomicUsize>,
    ) {
        let mut stream = match self.bus.subscribe(queue).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(%queue, error = %e, "subscribe failed");
                report(
                    &errors,
                    DispatchFailure::Subscribe {
                        queue,
                        error: e.to_string(),
                    },
                );
                return;
            }
        };
        active.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(%queue, "subscribed");

        let limiter = Arc::new(Semaphore::new(self.config.handler_concurrency.max(1)));
        // 每个主题一条顺序通道：主题之间并发，主题内部按投递顺序逐条处理
        let mut lanes: HashMap<Option<Topic>, mpsc::UnboundedSender<Delivery>> = HashMap::new();
        let mut running: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                Some(joined) = running.join_next(), if !running.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(%queue, error = %e, "topic lane aborted");
                    }
                }
                next = stream.next() => match next {
                    Some(Ok(delivery)) => {
                        let topic = delivery
                            .message()
                            .topic()
                            .and_then(|t| t.parse::<Topic>().ok());
                        let lane = lanes.entry(topic).or_insert_with(|| {
                            let (tx, rx) = mpsc::unbounded_channel();
                            running.spawn(self.clone().run_lane(
                                queue,
                                rx,
                                limiter.clone(),
                                token.clone(),
                                errors.clone(),
                            ));
                            tx
                        });
                        if let Err(mpsc::error::SendError(delivery)) = lane.send(delivery) {
                            lanes.remove(&topic);
                            nack(&delivery, queue).await;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(%queue, error = %e, "subscription error, skipping");
                    }
                    None => {
                        tracing::info!(%queue, "subscription closed by bus");
                        break;
                    }
                },
            }
        }

        // 关闭通道入口，等待各通道排空在途处理后再释放订阅
        drop(lanes);
        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                tracing::error!(%queue, error = %e, "topic lane aborted");
            }
        }
        drop(stream);
        active.fetch_sub(1, Ordering::AcqRel);
        tracing::debug!(%queue, "unsubscribed");
    }

    /// 顺序处理同一主题的投递；退避等待只挂起本通道
    async fn run_lane(
        self: Arc<Self>,
        queue: Queue,
        mut deliveries: mpsc::UnboundedReceiver<Delivery>,
        limiter: Arc<Semaphore>,
        token: CancellationToken,
        errors: mpsc::Sender<DispatchFailure>,
    ) {
        loop {
            let delivery = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                next = deliveries.recv() => match next {
                    Some(delivery) => delivery,
                    None => return,
                },
            };
            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    nack(&delivery, queue).await;
                    break;
                }
                permit = limiter.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        nack(&delivery, queue).await;
                        break;
                    }
                },
            };
            self.dispatch(queue, delivery, token.child_token(), errors.clone())
                .await;
            drop(permit);
        }

        // 关闭时尚未开始的消息交还总线重投
        deliveries.close();
        while let Ok(delivery) = deliveries.try_recv() {
            nack(&delivery, queue).await;
        }
    }

    async fn dispatch(
        &self,
        queue: Queue,
        delivery: Delivery,
        token: CancellationToken,
        errors: mpsc::Sender<DispatchFailure>,
    ) {
        let mut message = delivery.message().clone();
        let correlation_id = message.ensure_correlation_id();

        let Some(topic) = message.topic().and_then(|t| t.parse::<Topic>().ok()) else {
            tracing::warn!(
                %queue,
                message_id = message.id(),
                topic = ?message.topic(),
                "message without a known topic, acking"
            );
            ack(&delivery, queue).await;
            return;
        };

        let handlers = self.registry.matching(topic);
        if handlers.is_empty() {
            tracing::debug!(%queue, %topic, "no handler for topic, acking");
            ack(&delivery, queue).await;
            return;
        }

        let span = tracing::info_span!(
            "handle_message",
            %queue,
            %topic,
            message_id = message.id(),
            correlation_id = correlation_id.as_str(),
        );

        async {
            for handler in handlers {
                let outcome = retry(&self.config.retry, &token, |attempt| {
                    self.invoke(handler.as_ref(), &message, &correlation_id, attempt)
                })
                .await;
                self.settle(topic, handler.handler_name(), &message, &correlation_id, outcome, &errors);
            }
            // 成功、耗尽与取消都确认：后两者为强制确认，停止重投
            ack(&delivery, queue).await;
        }
        .instrument(span)
        .await;
    }

    /// 单次尝试：处理器 + 派生发布，整体做 panic 隔离
    async fn invoke(
        &self,
        handler: &dyn EventHandler,
        message: &Message,
        correlation_id: &str,
        attempt: u32,
    ) -> DomainResult<()> {
        tracing::trace!(handler = handler.handler_name(), attempt, "invoking handler");

        let run = async {
            let derived = handler.handle(message).await?;
            self.publish_derived(derived, correlation_id).await
        };

        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(DomainError::HandlerPanicked {
                handler: handler.handler_name().to_string(),
                reason: panic_reason(panic.as_ref()),
            }),
        }
    }

    async fn publish_derived(&self, derived: Vec<Publish>, correlation_id: &str) -> DomainResult<()> {
        for Publish { topic, mut message } in derived {
            message.set_correlation_id(correlation_id);
            tracing::debug!(%topic, message_id = message.id(), "publishing derived message");
            self.bus.publish(topic, vec![message]).await?;
        }
        Ok(())
    }

    fn settle(
        &self,
        topic: Topic,
        handler: &str,
        message: &Message,
        correlation_id: &str,
        outcome: RetryOutcome<()>,
        errors: &mpsc::Sender<DispatchFailure>,
    ) {
        let failure = match outcome {
            RetryOutcome::Succeeded { attempts, .. } => {
                tracing::debug!(handler, attempts, "handled");
                return;
            }
            RetryOutcome::Exhausted { error, attempts } => {
                tracing::error!(handler, attempts, error = %error, "retries exhausted, dropping message");
                DispatchFailure::Exhausted(FailedMessage {
                    topic,
                    handler: handler.to_string(),
                    message_id: message.id().to_string(),
                    correlation_id: correlation_id.to_string(),
                    attempts,
                    error: error.to_string(),
                })
            }
            RetryOutcome::Cancelled { error, attempts } => {
                tracing::warn!(handler, attempts, error = %error, "cancelled during backoff, dropping message");
                DispatchFailure::Cancelled(FailedMessage {
                    topic,
                    handler: handler.to_string(),
                    message_id: message.id().to_string(),
                    correlation_id: correlation_id.to_string(),
                    attempts,
                    error: error.to_string(),
                })
            }
        };
        report(errors, failure);
    }
}

async fn ack(delivery: &Delivery, queue: Queue) {
    if let Err(e) = delivery.ack().await {
        tracing::warn!(%queue, message_id = delivery.message().id(), error = %e, "ack failed");
    }
}

async fn nack(delivery: &Delivery, queue: Queue) {
    if let Err(e) = delivery.nack().await {
        tracing::warn!(%queue, message_id = delivery.message().id(), error = %e, "nack failed");
    }
}

/// 失败上报不阻塞分发；通道满或无人接收时仅记录日志
fn report(errors: &mpsc::Sender<DispatchFailure>, failure: DispatchFailure) {
    if let Err(e) = errors.try_send(failure) {
        tracing::debug!(error = %e, "dispatch failure not reported");
    }
}

fn panic_reason(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

#[derive(Clone, Default)]
struct HandlerRegistry {
    by_topic: HashMap<Topic, Vec<Arc<dyn EventHandler>>>,
}

impl HandlerRegistry {
    fn new(handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        let mut by_topic: HashMap<Topic, Vec<Arc<dyn EventHandler>>> = HashMap::new();
        for h in handlers {
            by_topic.entry(h.topic()).or_default().push(h);
        }
        Self { by_topic }
    }

    fn queues(&self) -> BTreeSet<Queue> {
        self.by_topic.keys().map(Topic::queue).collect()
    }

    fn matching(&self, topic: Topic) -> Vec<Arc<dyn EventHandler>> {
        self.by_topic.get(&topic).cloned().unwrap_or_default()
    }
}

/// 路由配置
#[derive(Clone, Copy, Debug)]
pub struct RouterConfig {
    /// 处理器重试策略
    pub retry: RetryPolicy,
    /// 单队列同时处理的消息上限
    pub handler_concurrency: usize,
    /// 失败上报通道容量
    pub error_channel_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            handler_concurrency: 16,
            error_channel_capacity: 256,
        }
    }
}

/// 被丢弃消息的摘要
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedMessage {
    pub topic: Topic,
    pub handler: String,
    pub message_id: String,
    pub correlation_id: String,
    pub attempts: u32,
    pub error: String,
}

/// 通过错误通道上报的失败
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchFailure {
    /// 启动时订阅失败，该队列不会被消费
    Subscribe { queue: Queue, error: String },
    /// 重试耗尽（或不可重试），已强制确认
    Exhausted(FailedMessage),
    /// 退避期间被取消，已确认
    Cancelled(FailedMessage),
}

/// 路由健康状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouterHealth {
    pub running: bool,
    pub active_subscriptions: usize,
    pub expected_subscriptions: usize,
}

impl RouterHealth {
    pub fn is_healthy(&self) -> bool {
        self.running && self.active_subscriptions == self.expected_subscriptions
    }
}

/// 可克隆的路由健康视图，不持有关闭与等待能力
#[derive(Clone, Debug)]
pub struct RouterMonitor {
    token: CancellationToken,
    active: Arc<AtomicUsize>,
    expected: usize,
}

impl RouterMonitor {
    pub fn health(&self) -> RouterHealth {
        let active = self.active.load(Ordering::Acquire);
        RouterHealth {
            running: !self.token.is_cancelled() && active > 0,
            active_subscriptions: active,
            expected_subscriptions: self.expected,
        }
    }
}

/// 路由运行句柄：用于优雅关闭、等待与健康检查
pub struct RouterHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    errors: Option<mpsc::Receiver<DispatchFailure>>,
    active: Arc<AtomicUsize>,
    expected: usize,
}

impl RouterHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// 取走失败上报通道（仅可取一次）
    pub fn take_errors(&mut self) -> Option<mpsc::Receiver<DispatchFailure>> {
        self.errors.take()
    }

    pub fn health(&self) -> RouterHealth {
        RouterHealth {
            running: !self.token.is_cancelled() && self.tasks.iter().any(|t| !t.is_finished()),
            active_subscriptions: self.active.load(Ordering::Acquire),
            expected_subscriptions: self.expected,
        }
    }

    /// 供其他任务（如 HTTP 健康检查）持有的只读视图
    pub fn monitor(&self) -> RouterMonitor {
        RouterMonitor {
            token: self.token.clone(),
            active: self.active.clone(),
            expected: self.expected,
        }
    }

    /// 等待全部队列循环排空并退出
    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            if let Err(e) = t.await {
                tracing::error!(error = %e, "router task aborted");
            }
        }
        tracing::info!("event router stopped");
    }
}

impl Drop for RouterHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
