//! 曲库实体快照（catalog）
//!
//! CRUD 层在变更发生时序列化的实体快照（created/updated/deleted 事件载荷）。
//! 管道对其只读，负责把它们投影成检索文档与存储路径。
//!
mod album;
mod artist;
mod playlist;
mod song;
mod user;

pub use album::Album;
pub use artist::Artist;
pub use playlist::Playlist;
pub use song::Song;
pub use user::User;

use crate::search::{DocumentId, DocumentKind, SearchDocument};
use crate::storage::StoragePath;
use crate::topic::Topic;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// 嵌入在歌曲/专辑文档中的艺人摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistSummary {
    pub id: Uuid,
    pub name: String,
}

/// 嵌入在歌曲文档中的专辑摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumSummary {
    pub id: Uuid,
    pub title: String,
    pub cover_url: Option<String>,
}

/// 一类实体的生命周期主题
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTopics {
    pub created: Topic,
    pub updated: Topic,
    pub deleted: Topic,
    pub bulk_deleted: Topic,
}

/// 可被检索索引的曲库实体
pub trait CatalogEntity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: DocumentKind;
    const TOPICS: LifecycleTopics;

    fn id(&self) -> Uuid;

    fn user_id(&self) -> Uuid;

    /// 投影为检索文档
    fn to_document(&self) -> SearchDocument;

    fn document_id(&self) -> DocumentId {
        DocumentId::new(Self::KIND, self.id())
    }

    /// 该实体在对象存储中的目录
    fn storage_dir(&self) -> StoragePath {
        StoragePath::entity(self.user_id(), Self::KIND, self.id())
    }
}
