use super::{AlbumSummary, ArtistSummary, CatalogEntity, LifecycleTopics};
use crate::search::{DocumentBody, DocumentKind, SearchDocument, SongDocument};
use crate::topic::Topic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub artist: Option<ArtistSummary>,
    #[serde(default)]
    pub album: Option<AlbumSummary>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogEntity for Song {
    const KIND: DocumentKind = DocumentKind::Song;
    const TOPICS: LifecycleTopics = LifecycleTopics {
        created: Topic::SongCreated,
        updated: Topic::SongUpdated,
        deleted: Topic::SongDeleted,
        bulk_deleted: Topic::SongsDeleted,
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn to_document(&self) -> SearchDocument {
        // 歌曲未单独设置封面时沿用专辑封面
        let cover_url = self
            .cover_url
            .clone()
            .or_else(|| self.album.as_ref().and_then(|a| a.cover_url.clone()));

        SearchDocument::new(
            self.id,
            self.user_id,
            self.created_at,
            self.updated_at,
            DocumentBody::Song(SongDocument {
                title: self.title.clone(),
                artist: self.artist.clone(),
                album: self.album.clone(),
                audio_url: self.audio_url.clone(),
                cover_url,
            }),
        )
    }
}
