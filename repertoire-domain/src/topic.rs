//! 主题与队列注册表
//!
//! 主题（Topic）命名一个领域事件或管道命令，队列（Queue）命名承载它的物理通道，
//! 多个主题可共享同一队列。两者的字面值是线上路由键，与既有生产者/消费者共用总线时
//! 必须逐字节保持一致。
//!
//! 映射以穷举 `match` 实现：新增主题而未绑定队列会在编译期报错，运行期不存在
//! “未声明主题”。
//!
use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// 消息元数据：来源主题
pub const METADATA_TOPIC: &str = "topic";
/// 消息元数据：关联 ID（贯穿一条派生发布链）
pub const METADATA_CORRELATION_ID: &str = "correlation_id";

/// 物理投递通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Queue {
    Songs,
    Albums,
    Artists,
    Playlists,
    Users,
    SearchIndex,
    Storage,
}

impl Queue {
    pub const ALL: [Queue; 7] = [
        Queue::Songs,
        Queue::Albums,
        Queue::Artists,
        Queue::Playlists,
        Queue::Users,
        Queue::SearchIndex,
        Queue::Storage,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Queue::Songs => "songs",
            Queue::Albums => "albums",
            Queue::Artists => "artists",
            Queue::Playlists => "playlists",
            Queue::Users => "users",
            Queue::SearchIndex => "search_index",
            Queue::Storage => "storage",
        }
    }

    /// 该队列承载的全部主题
    pub fn topics(&self) -> impl Iterator<Item = Topic> + '_ {
        Topic::ALL.into_iter().filter(move |t| t.queue() == *self)
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 领域事件 / 管道命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    SongCreated,
    SongUpdated,
    SongDeleted,
    SongsDeleted,
    AlbumCreated,
    AlbumUpdated,
    AlbumDeleted,
    AlbumsDeleted,
    ArtistCreated,
    ArtistUpdated,
    ArtistDeleted,
    ArtistsDeleted,
    PlaylistCreated,
    PlaylistUpdated,
    PlaylistDeleted,
    PlaylistsDeleted,
    UserDeleted,
    AddToSearchIndex,
    UpdateInSearchIndex,
    RemoveFromSearchIndex,
    DeleteStorageDirectories,
}

impl Topic {
    pub const ALL: [Topic; 21] = [
        Topic::SongCreated,
        Topic::SongUpdated,
        Topic::SongDeleted,
        Topic::SongsDeleted,
        Topic::AlbumCreated,
        Topic::AlbumUpdated,
        Topic::AlbumDeleted,
        Topic::AlbumsDeleted,
        Topic::ArtistCreated,
        Topic::ArtistUpdated,
        Topic::ArtistDeleted,
        Topic::ArtistsDeleted,
        Topic::PlaylistCreated,
        Topic::PlaylistUpdated,
        Topic::PlaylistDeleted,
        Topic::PlaylistsDeleted,
        Topic::UserDeleted,
        Topic::AddToSearchIndex,
        Topic::UpdateInSearchIndex,
        Topic::RemoveFromSearchIndex,
        Topic::DeleteStorageDirectories,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Topic::SongCreated => "song_created",
            Topic::SongUpdated => "song_updated",
            Topic::SongDeleted => "song_deleted",
            Topic::SongsDeleted => "songs_deleted",
            Topic::AlbumCreated => "album_created",
            Topic::AlbumUpdated => "album_updated",
            Topic::AlbumDeleted => "album_deleted",
            Topic::AlbumsDeleted => "albums_deleted",
            Topic::ArtistCreated => "artist_created",
            Topic::ArtistUpdated => "artist_updated",
            Topic::ArtistDeleted => "artist_deleted",
            Topic::ArtistsDeleted => "artists_deleted",
            Topic::PlaylistCreated => "playlist_created",
            Topic::PlaylistUpdated => "playlist_updated",
            Topic::PlaylistDeleted => "playlist_deleted",
            Topic::PlaylistsDeleted => "playlists_deleted",
            Topic::UserDeleted => "user_deleted",
            Topic::AddToSearchIndex => "add_to_search_index",
            Topic::UpdateInSearchIndex => "update_in_search_index",
            Topic::RemoveFromSearchIndex => "remove_from_search_index",
            Topic::DeleteStorageDirectories => "delete_storage_directories",
        }
    }

    /// 主题 → 队列（全函数）
    pub const fn queue(&self) -> Queue {
        match self {
            Topic::SongCreated | Topic::SongUpdated | Topic::SongDeleted | Topic::SongsDeleted => {
                Queue::Songs
            }
            Topic::AlbumCreated
            | Topic::AlbumUpdated
            | Topic::AlbumDeleted
            | Topic::AlbumsDeleted => Queue::Albums,
            Topic::ArtistCreated
            | Topic::ArtistUpdated
            | Topic::ArtistDeleted
            | Topic::ArtistsDeleted => Queue::Artists,
            Topic::PlaylistCreated
            | Topic::PlaylistUpdated
            | Topic::PlaylistDeleted
            | Topic::PlaylistsDeleted => Queue::Playlists,
            Topic::UserDeleted => Queue::Users,
            Topic::AddToSearchIndex | Topic::UpdateInSearchIndex | Topic::RemoveFromSearchIndex => {
                Queue::SearchIndex
            }
            Topic::DeleteStorageDirectories => Queue::Storage,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::Parse {
                reason: format!("unknown topic: {s}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn topic_literals_are_unique_and_parse_back() {
        let literals: HashSet<&str> = Topic::ALL.iter().map(Topic::as_str).collect();
        assert_eq!(literals.len(), Topic::ALL.len());

        for topic in Topic::ALL {
            assert_eq!(topic.as_str().parse::<Topic>().unwrap(), topic);
        }
        assert!("album created".parse::<Topic>().is_err());
    }

    #[test]
    fn every_queue_carries_at_least_one_topic() {
        for queue in Queue::ALL {
            assert!(queue.topics().next().is_some(), "{queue} carries no topic");
        }
        let carried: usize = Queue::ALL.iter().map(|q| q.topics().count()).sum();
        assert_eq!(carried, Topic::ALL.len());
    }

    #[test]
    fn pipeline_commands_share_the_search_queue() {
        assert_eq!(Topic::AddToSearchIndex.queue(), Queue::SearchIndex);
        assert_eq!(Topic::RemoveFromSearchIndex.queue(), Queue::SearchIndex);
        assert_eq!(Topic::DeleteStorageDirectories.queue(), Queue::Storage);
        assert_eq!(Topic::PlaylistsDeleted.queue(), Queue::Playlists);
    }

    #[test]
    fn serde_uses_wire_literals() {
        let json = serde_json::to_string(&Topic::UpdateInSearchIndex).unwrap();
        assert_eq!(json, "\"update_in_search_index\"");
        let json = serde_json::to_string(&Queue::SearchIndex).unwrap();
        assert_eq!(json, "\"search_index\"");
    }
}
