//! 搜索文档（SearchDocument）
//!
//! 每类实体的检索投影：共享信封 `{ id, type, userId, createdAt, updatedAt }` 加各自载荷。
//! 文档 ID 形如 `<type>-<entityUUID>`，前缀既是索引分区键也是反序列化判别符，
//! 前缀与类型的双向映射统一收敛在 `KIND_TABLE`。
//!
use crate::catalog::{AlbumSummary, ArtistSummary};
use crate::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// 可检索的实体类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Song,
    Album,
    Artist,
    Playlist,
}

/// (类别, ID 前缀, 存储目录名)，按 `DocumentKind` 声明顺序排列
const KIND_TABLE: [(DocumentKind, &str, &str); 4] = [
    (DocumentKind::Song, "song", "songs"),
    (DocumentKind::Album, "album", "albums"),
    (DocumentKind::Artist, "artist", "artists"),
    (DocumentKind::Playlist, "playlist", "playlists"),
];

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Song,
        DocumentKind::Album,
        DocumentKind::Artist,
        DocumentKind::Playlist,
    ];

    fn row(&self) -> &'static (DocumentKind, &'static str, &'static str) {
        &KIND_TABLE[*self as usize]
    }

    /// 文档 ID 前缀，同时也是 `type` 字段取值
    pub fn prefix(&self) -> &'static str {
        self.row().1
    }

    /// 存储目录中的复数名
    pub fn plural(&self) -> &'static str {
        self.row().2
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        KIND_TABLE
            .iter()
            .find(|(_, p, _)| *p == prefix)
            .map(|(kind, _, _)| *kind)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// 带类型前缀的文档 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DocumentId {
    kind: DocumentKind,
    entity_id: Uuid,
}

impl DocumentId {
    pub fn new(kind: DocumentKind, entity_id: Uuid) -> Self {
        Self { kind, entity_id }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn entity_id(&self) -> Uuid {
        self.entity_id
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.prefix(), self.entity_id)
    }
}

impl FromStr for DocumentId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // UUID 自身含有 '-'，因此只切第一个分隔符
        let (prefix, rest) = s.split_once('-').ok_or_else(|| DomainError::Parse {
            reason: format!("document id without type prefix: {s}"),
        })?;
        let kind = DocumentKind::from_prefix(prefix).ok_or_else(|| DomainError::Parse {
            reason: format!("unknown document type prefix: {prefix}"),
        })?;
        Ok(Self::new(kind, rest.parse()?))
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for DocumentId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongDocument {
    pub title: String,
    pub artist: Option<ArtistSummary>,
    pub album: Option<AlbumSummary>,
    pub audio_url: Option<String>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumDocument {
    pub title: String,
    pub artist: Option<ArtistSummary>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistDocument {
    pub name: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDocument {
    pub title: String,
    pub cover_url: Option<String>,
}

/// 按类别区分的文档载荷，`type` 字段为判别符
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DocumentBody {
    Song(SongDocument),
    Album(AlbumDocument),
    Artist(ArtistDocument),
    Playlist(PlaylistDocument),
}

impl DocumentBody {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentBody::Song(_) => DocumentKind::Song,
            DocumentBody::Album(_) => DocumentKind::Album,
            DocumentBody::Artist(_) => DocumentKind::Artist,
            DocumentBody::Playlist(_) => DocumentKind::Playlist,
        }
    }
}

/// 检索文档：由实体快照派生，从不作为权威数据
///
/// 反序列化时会校验 ID 前缀与 `type` 一致。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawDocument")]
pub struct SearchDocument {
    id: DocumentId,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(flatten)]
    body: DocumentBody,
}

impl SearchDocument {
    pub fn new(
        entity_id: Uuid,
        user_id: Uuid,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        body: DocumentBody,
    ) -> Self {
        Self {
            id: DocumentId::new(body.kind(), entity_id),
            user_id,
            created_at,
            updated_at,
            body,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn kind(&self) -> DocumentKind {
        self.body.kind()
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn body(&self) -> &DocumentBody {
        &self.body
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    id: DocumentId,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(flatten)]
    body: DocumentBody,
}

impl TryFrom<RawDocument> for SearchDocument {
    type Error = DomainError;

    fn try_from(raw: RawDocument) -> Result<Self, Self::Error> {
        if raw.id.kind() != raw.body.kind() {
            return Err(DomainError::InvalidValue {
                reason: format!(
                    "document {} carries type {}",
                    raw.id,
                    raw.body.kind().prefix()
                ),
            });
        }
        Ok(Self {
            id: raw.id,
            user_id: raw.user_id,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            body: raw.body,
        })
    }
}
