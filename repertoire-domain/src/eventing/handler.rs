//! 事件处理器（EventHandler）
//!
//! 每个处理器绑定唯一主题，把收到的消息翻译为零或多条派生发布。
//! 处理器应对自身载荷幂等：同一消息重复投递、重复执行，得到相同的派生发布。
//!
use crate::error::DomainResult as Result;
use crate::message::Message;
use crate::topic::Topic;
use async_trait::async_trait;
use serde::Serialize;

/// 一条派生发布：目标主题 + 消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub topic: Topic,
    pub message: Message,
}

impl Publish {
    pub fn new(topic: Topic, message: Message) -> Self {
        Self { topic, message }
    }

    /// 以 JSON 载荷构造
    pub fn json<T: Serialize>(topic: Topic, payload: &T) -> Result<Self> {
        Ok(Self::new(topic, Message::json(payload)?))
    }
}

/// 事件处理器：处理某一主题的消息
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称（用于订阅标识、日志与失败上报）
    fn handler_name(&self) -> &str;
    /// 处理器绑定的主题
    fn topic(&self) -> Topic;
    /// 处理消息，返回需要继续发布的派生消息
    async fn handle(&self, message: &Message) -> Result<Vec<Publish>>;
}
