//! 检索子系统（search）
//!
//! - `document`：检索文档的和类型与前缀 ID 表；
//! - `engine`：外部搜索引擎网关协议；
//! - `inmemory`：进程内实现，供测试与本地运行。
//!
mod document;
mod engine;
mod inmemory;

pub use document::{
    AlbumDocument, ArtistDocument, DocumentBody, DocumentId, DocumentKind, PlaylistDocument,
    SearchDocument, SongDocument,
};
pub use engine::{DocumentFields, DocumentFilter, SearchEngine, TaskUid};
pub use inmemory::{InMemorySearchEngine, TASK_FAILED, TASK_SUCCEEDED};
