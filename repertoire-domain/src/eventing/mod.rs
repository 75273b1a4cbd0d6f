//! 事件子系统（eventing）
//!
//! 提供消息发布/订阅与分发处理的基础抽象与运行时：
//! - `MessageBus`：按主题发布、按队列订阅的统一接口，投递需显式确认；
//! - `EventHandler`：绑定单一主题的处理器，输出派生发布；
//! - `retry`：有界指数退避重试，耗尽或取消时强制确认；
//! - `EventRouter`：按队列订阅、按主题分发，并发执行、失败上报与优雅关闭。
//!
//! 该模块仅定义协议与路由，不绑定具体传输实现，可对接任意消息系统或内存实现。
//!
pub mod bus;
pub mod bus_inmemory;
pub mod handler;
pub mod retry;
pub mod router;

pub use bus::{Acknowledger, Delivery, MessageBus};
pub use bus_inmemory::InMemoryMessageBus;
pub use handler::{EventHandler, Publish};
pub use retry::{RetryOutcome, RetryPolicy, retry};
pub use router::{
    DispatchFailure, EventRouter, FailedMessage, RouterConfig, RouterHandle, RouterHealth,
    RouterMonitor,
};
