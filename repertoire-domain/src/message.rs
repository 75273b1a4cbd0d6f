//! 总线消息（Message）
//!
//! 线上传输的标准形态：`{ id, payload, metadata }`。元数据始终携带来源主题与关联 ID，
//! 由路由与中间件读取。
//!
use crate::error::{DomainError, DomainResult};
use crate::topic::{METADATA_CORRELATION_ID, METADATA_TOPIC, Topic};
use bon::Builder;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
pub struct Message {
    /// 消息唯一标识符
    #[builder(default = Uuid::new_v4().to_string())]
    id: String,
    /// 消息负载（通常为 JSON）
    payload: Vec<u8>,
    /// 元数据（主题、关联 ID 等）
    #[builder(default)]
    metadata: BTreeMap<String, String>,
}

impl Message {
    pub fn new(payload: Vec<u8>) -> Self {
        Self::builder().payload(payload).build()
    }

    /// 将载荷序列化为 JSON 消息
    pub fn json<T: Serialize>(value: &T) -> DomainResult<Self> {
        Ok(Self::new(serde_json::to_vec(value)?))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// 元数据中的原始主题字符串
    pub fn topic(&self) -> Option<&str> {
        self.metadata_value(METADATA_TOPIC)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.metadata_value(METADATA_CORRELATION_ID)
    }

    pub fn set_topic(&mut self, topic: Topic) {
        self.set_metadata(METADATA_TOPIC, topic.as_str());
    }

    pub fn set_correlation_id(&mut self, correlation_id: impl Into<String>) {
        self.set_metadata(METADATA_CORRELATION_ID, correlation_id);
    }

    /// 读取关联 ID；缺失时生成并写回，保证后续派生发布可追踪
    pub fn ensure_correlation_id(&mut self) -> String {
        if let Some(id) = self.correlation_id() {
            return id.to_string();
        }
        let id = Uuid::new_v4().to_string();
        self.set_correlation_id(id.clone());
        id
    }

    /// 按 JSON 解码载荷，失败归类为不可重试的解码错误
    pub fn decode<T: DeserializeOwned>(&self) -> DomainResult<T> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| DomainError::decode(self.topic().unwrap_or("<unknown>"), e))
    }
}
