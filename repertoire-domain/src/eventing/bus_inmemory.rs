//! 内存版消息总线（InMemoryMessageBus）
//!
//! 每个队列一条 `tokio::sync::broadcast` 通道，满足 `MessageBus` 协议：
//! - `publish`：写入主题元数据后广播到主题所属队列；
//! - `subscribe`：返回 `'static` 生命周期投递流，`close` 后流结束；
//! - `nack`：把消息重新广播到原队列，模拟代理的重投。
//!
//! 注意：若队列当前无订阅者，发送将被忽略。
//!
use crate::error::{DomainError, DomainResult as Result};
use crate::eventing::{Acknowledger, Delivery, MessageBus};
use crate::message::Message;
use crate::topic::{Queue, Topic};
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

struct Inner {
    queues: HashMap<Queue, broadcast::Sender<Message>>,
    closed: CancellationToken,
    acked: AtomicUsize,
    nacked: AtomicUsize,
}

impl Inner {
    fn sender(&self, queue: Queue) -> Result<&broadcast::Sender<Message>> {
        self.queues
            .get(&queue)
            .ok_or_else(|| DomainError::event_bus(format!("queue not declared: {queue}")))
    }
}

/// 简单的内存消息总线实现
#[derive(Clone)]
pub struct InMemoryMessageBus {
    inner: Arc<Inner>,
}

impl InMemoryMessageBus {
    /// 创建一个内存总线，`capacity` 为每个队列的广播缓冲区容量
    pub fn new(capacity: usize) -> Self {
        let queues = Queue::ALL
            .into_iter()
            .map(|q| (q, broadcast::channel(capacity).0))
            .collect();
        Self {
            inner: Arc::new(Inner {
                queues,
                closed: CancellationToken::new(),
                acked: AtomicUsize::new(0),
                nacked: AtomicUsize::new(0),
            }),
        }
    }

    /// 累计确认次数
    pub fn acked(&self) -> usize {
        self.inner.acked.load(Ordering::Acquire)
    }

    /// 累计拒绝次数
    pub fn nacked(&self) -> usize {
        self.inner.nacked.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, topic: Topic, messages: Vec<Message>) -> Result<()> {
        if self.is_closed() {
            return Err(DomainError::BusClosed);
        }
        let tx = self.inner.sender(topic.queue())?;
        for mut message in messages {
            message.set_topic(topic);
            // 若当前无订阅者，broadcast 的 send 会返回错误，这里视为非致命并忽略
            let _ = tx.send(message);
        }
        Ok(())
    }

    async fn subscribe(&self, queue: Queue) -> Result<BoxStream<'static, Result<Delivery>>> {
        if self.is_closed() {
            return Err(DomainError::BusClosed);
        }
        let inner = self.inner.clone();
        let rx = inner.sender(queue)?.subscribe();
        let closed = inner.closed.clone().cancelled_owned();

        let stream = BroadcastStream::new(rx)
            .take_until(closed)
            .map(move |r| {
                r.map(|message| {
                    let acker = InMemoryAcker {
                        inner: inner.clone(),
                        queue,
                        message: message.clone(),
                        settled: AtomicBool::new(false),
                    };
                    Delivery::new(message, Arc::new(acker))
                })
                .map_err(|e| DomainError::event_bus(e.to_string()))
            });
        Ok(Box::pin(stream))
    }

    async fn close(&self) -> Result<()> {
        self.inner.closed.cancel();
        Ok(())
    }
}

struct InMemoryAcker {
    inner: Arc<Inner>,
    queue: Queue,
    message: Message,
    settled: AtomicBool,
}

impl InMemoryAcker {
    /// 每条投递只结算一次，重复调用视为幂等
    fn settle(&self) -> bool {
        !self.settled.swap(true, Ordering::AcqRel)
    }
}

#[async_trait]
impl Acknowledger for InMemoryAcker {
    async fn ack(&self) -> Result<()> {
        if self.settle() {
            self.inner.acked.fetch_add(1, Ordering::AcqRel);
        }
        Ok(())
    }

    async fn nack(&self) -> Result<()> {
        if !self.settle() {
            return Ok(());
        }
        self.inner.nacked.fetch_add(1, Ordering::AcqRel);
        if self.inner.closed.is_cancelled() {
            return Ok(());
        }
        let _ = self.inner.sender(self.queue)?.send(self.message.clone());
        Ok(())
    }
}
