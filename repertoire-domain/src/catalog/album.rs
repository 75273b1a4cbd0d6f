use super::{ArtistSummary, CatalogEntity, LifecycleTopics};
use crate::search::{AlbumDocument, DocumentBody, DocumentKind, SearchDocument};
use crate::topic::Topic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub artist: Option<ArtistSummary>,
    #[serde(default)]
    pub cover_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogEntity for Album {
    const KIND: DocumentKind = DocumentKind::Album;
    const TOPICS: LifecycleTopics = LifecycleTopics {
        created: Topic::AlbumCreated,
        updated: Topic::AlbumUpdated,
        deleted: Topic::AlbumDeleted,
        bulk_deleted: Topic::AlbumsDeleted,
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn to_document(&self) -> SearchDocument {
        SearchDocument::new(
            self.id,
            self.user_id,
            self.created_at,
            self.updated_at,
            DocumentBody::Album(AlbumDocument {
                title: self.title.clone(),
                artist: self.artist.clone(),
                cover_url: self.cover_url.clone(),
            }),
        )
    }
}
