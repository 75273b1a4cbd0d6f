//! 实体生命周期处理器
//!
//! 对任一 `CatalogEntity` 的 created / updated / deleted / bulk deleted 事件，
//! 翻译为搜索索引命令（批量删除额外派生存储清理命令）。纯翻译，不访问外部系统。
//!
use crate::catalog::CatalogEntity;
use crate::command::{DeleteDirectories, IndexDocuments, RemoveDocuments, UpdateDocuments};
use crate::error::DomainResult as Result;
use crate::eventing::{EventHandler, Publish};
use crate::message::Message;
use crate::topic::Topic;
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

/// 生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Created,
    Updated,
    Deleted,
    BulkDeleted,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Created,
        Stage::Updated,
        Stage::Deleted,
        Stage::BulkDeleted,
    ];
}

pub struct LifecycleHandler<E> {
    stage: Stage,
    name: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: CatalogEntity> LifecycleHandler<E> {
    pub fn new(stage: Stage) -> Self {
        let topic = Self::topic_for(stage);
        Self {
            stage,
            name: format!("{topic}_handler"),
            _entity: PhantomData,
        }
    }

    fn topic_for(stage: Stage) -> Topic {
        let topics = E::TOPICS;
        match stage {
            Stage::Created => topics.created,
            Stage::Updated => topics.updated,
            Stage::Deleted => topics.deleted,
            Stage::BulkDeleted => topics.bulk_deleted,
        }
    }

    fn created(entity: E) -> Result<Vec<Publish>> {
        let command = IndexDocuments {
            documents: vec![entity.to_document()],
        };
        Ok(vec![Publish::json(Topic::AddToSearchIndex, &command)?])
    }

    fn updated(entity: E) -> Result<Vec<Publish>> {
        let command = UpdateDocuments {
            user_id: entity.user_id(),
            documents: vec![entity.to_document()],
        };
        Ok(vec![Publish::json(Topic::UpdateInSearchIndex, &command)?])
    }

    fn deleted(entity: E) -> Result<Vec<Publish>> {
        let command = RemoveDocuments {
            user_id: entity.user_id(),
            ids: vec![entity.document_id()],
        };
        Ok(vec![Publish::json(Topic::RemoveFromSearchIndex, &command)?])
    }

    /// 单一用户的批次产生一条移除命令；跨用户的批次每个用户一条，
    /// 随后是一条覆盖全部实体目录的存储清理命令。
    fn bulk_deleted(entities: Vec<E>) -> Result<Vec<Publish>> {
        if entities.is_empty() {
            return Ok(vec![]);
        }

        // 按所属用户分组（保持首次出现顺序），任务完成后才能通知到正确的用户
        let mut by_user: Vec<(Uuid, RemoveDocuments)> = Vec::new();
        for entity in &entities {
            let user_id = entity.user_id();
            match by_user.iter_mut().find(|(u, _)| *u == user_id) {
                Some((_, command)) => command.ids.push(entity.document_id()),
                None => by_user.push((
                    user_id,
                    RemoveDocuments {
                        user_id,
                        ids: vec![entity.document_id()],
                    },
                )),
            }
        }

        let mut publishes = by_user
            .into_iter()
            .map(|(_, command)| Publish::json(Topic::RemoveFromSearchIndex, &command))
            .collect::<Result<Vec<_>>>()?;

        let cleanup = DeleteDirectories {
            paths: entities.iter().map(CatalogEntity::storage_dir).collect(),
        };
        publishes.push(Publish::json(Topic::DeleteStorageDirectories, &cleanup)?);
        Ok(publishes)
    }
}

#[async_trait]
impl<E: CatalogEntity> EventHandler for LifecycleHandler<E> {
    fn handler_name(&self) -> &str {
        &self.name
    }

    fn topic(&self) -> Topic {
        Self::topic_for(self.stage)
    }

    async fn handle(&self, message: &Message) -> Result<Vec<Publish>> {
        match self.stage {
            Stage::Created => Self::created(message.decode()?),
            Stage::Updated => Self::updated(message.decode()?),
            Stage::Deleted => Self::deleted(message.decode()?),
            Stage::BulkDeleted => Self::bulk_deleted(message.decode()?),
        }
    }
}

/// 某类实体全部阶段的处理器
pub fn lifecycle_handlers<E: CatalogEntity>() -> Vec<Arc<dyn EventHandler>> {
    Stage::ALL
        .into_iter()
        .map(|stage| Arc::new(LifecycleHandler::<E>::new(stage)) as Arc<dyn EventHandler>)
        .collect()
}
