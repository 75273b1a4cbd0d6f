//! 曲库领域层（repertoire-domain）
//!
//! 曲库变更事件驱动的异步管道的领域部分：
//! - 主题与队列注册表（`topic`），消息信封（`message`）
//! - 曲库实体快照（`catalog`）与检索文档模型、搜索引擎网关（`search`）
//! - 存储清理（`storage`）与实时通知（`notifier`）协议
//! - 事件系统（`eventing`）：总线、重试中间件与路由
//! - 领域事件处理器（`handlers`）：实体事件 → 索引/清理命令
//!
//! 本 crate 只定义协议与内存实现；HTTP 网关、webhook 与进程装配在上层 crate 完成。
//!
//! 典型用法：
//! 1. 选择 `MessageBus` 实现（内存版或外部消息系统适配）；
//! 2. 收集 `handlers::domain_handlers` 与应用层命令处理器；
//! 3. 通过 `EventRouter::builder()` 构建路由并 `start`，关闭时 `shutdown` + `join`。
//!
pub mod catalog;
pub mod command;
pub mod error;
pub mod message;
pub mod notifier;
pub mod search;
pub mod storage;
pub mod topic;

#[cfg(feature = "eventing")]
pub mod eventing;
#[cfg(feature = "eventing")]
pub mod handlers;
