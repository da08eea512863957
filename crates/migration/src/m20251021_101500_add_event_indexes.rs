use sea_orm_migration::prelude::*;

use crate::m20251020_090000_add_event_table::Event;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Listing is newest-first and optionally filtered by username.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_event_timestamp")
                    .table(Event::Table)
                    .col(Event::Timestamp)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_event_username")
                    .table(Event::Table)
                    .col(Event::Username)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_event_username")
                    .table(Event::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_event_timestamp")
                    .table(Event::Table)
                    .to_owned(),
            )
            .await
    }
}
