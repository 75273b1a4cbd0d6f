//! 消息总线（MessageBus）协议
//!
//! 定义按主题发布、按队列订阅的统一抽象。订阅返回 'static 生命周期的投递流，
//! 便于在 tokio::spawn 中消费；每条投递都需显式确认（ack）或拒绝（nack），
//! 未确认的消息由总线重新投递。
//!
use crate::error::DomainResult as Result;
use crate::message::Message;
use crate::topic::{Queue, Topic};
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use std::fmt;
use std::sync::Arc;

/// 投递确认器，由总线实现提供
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// 确认已处理，停止重投
    async fn ack(&self) -> Result<()>;
    /// 拒绝，交由总线重投
    async fn nack(&self) -> Result<()>;
}

/// 一次投递：消息 + 确认句柄
#[derive(Clone)]
pub struct Delivery {
    message: Message,
    acker: Arc<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(message: Message, acker: Arc<dyn Acknowledger>) -> Self {
        Self { message, acker }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub async fn ack(&self) -> Result<()> {
        self.acker.ack().await
    }

    pub async fn nack(&self) -> Result<()> {
        self.acker.nack().await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// 消息总线：按主题发布，按队列订阅
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// 发布到主题所绑定的队列；实现需在每条消息的元数据中写入主题
    async fn publish(&self, topic: Topic, messages: Vec<Message>) -> Result<()>;

    /// 返回一个 'static 生命周期的投递流，便于在 tokio::spawn 中使用
    async fn subscribe(&self, queue: Queue) -> Result<BoxStream<'static, Result<Delivery>>>;

    /// 关闭总线：拒绝后续发布并结束已打开的订阅
    async fn close(&self) -> Result<()>;
}
