//! Create the append-only `events` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Events::RowId).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Events::EventId).big_integer().not_null())
                    .col(ColumnDef::new(Events::EventType).string().not_null())
                    .col(
                        ColumnDef::new(Events::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Events::Repo).string().not_null())
                    .col(
                        ColumnDef::new(Events::FetchedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Equality lookups for sync state and stored ids
        manager
            .create_index(
                Index::create()
                    .name("idx_events_repo")
                    .table(Events::Table)
                    .col(Events::Repo)
                    .to_owned(),
            )
            .await?;

        // Windowed scans for statistics
        manager
            .create_index(
                Index::create()
                    .name("idx_events_repo_created")
                    .table(Events::Table)
                    .col(Events::Repo)
                    .col(Events::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Events {
    Table,
    RowId,
    EventId,
    EventType,
    CreatedAt,
    Repo,
    FetchedAt,
}
