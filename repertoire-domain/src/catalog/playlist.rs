use super::{CatalogEntity, LifecycleTopics};
use crate::search::{DocumentBody, DocumentKind, PlaylistDocument, SearchDocument};
use crate::topic::Topic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogEntity for Playlist {
    const KIND: DocumentKind = DocumentKind::Playlist;
    const TOPICS: LifecycleTopics = LifecycleTopics {
        created: Topic::PlaylistCreated,
        updated: Topic::PlaylistUpdated,
        deleted: Topic::PlaylistDeleted,
        bulk_deleted: Topic::PlaylistsDeleted,
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
            DocumentBody::Playlist(PlaylistDocument {
                title: self.title.clone(),
                cover_url: self.cover_url.clone(),
            }),
        )
    }
}
