use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `user_deleted` 的载荷，管道只关心用户 ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub username: Option<String>,
}
