use super::{CatalogEntity, LifecycleTopics};
use crate::search::{ArtistDocument, DocumentBody, DocumentKind, SearchDocument};
use crate::topic::Topic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogEntity for Artist {
    const KIND: DocumentKind = DocumentKind::Artist;
    const TOPICS: LifecycleTopics = LifecycleTopics {
        created: Topic::ArtistCreated,
        updated: Topic::ArtistUpdated,
        deleted: Topic::ArtistDeleted,
        bulk_deleted: Topic::ArtistsDeleted,
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
            DocumentBody::Artist(ArtistDocument {
                name: self.name.clone(),
                image_url: self.image_url.clone(),
            }),
        )
    }
}
