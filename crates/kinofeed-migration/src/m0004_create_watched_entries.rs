use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WatchedEntries::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(WatchedEntries::UserKey).string().not_null())
                    .col(ColumnDef::new(WatchedEntries::Kind).string().not_null())
                    .col(
                        ColumnDef::new(WatchedEntries::MediaId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WatchedEntries::Rating).integer().null())
                    .col(
                        ColumnDef::new(WatchedEntries::Comment)
                            .string_len(1024)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(WatchedEntries::Favorite)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WatchedEntries::WatchedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(WatchedEntries::UserKey)
                            .col(WatchedEntries::Kind)
                            .col(WatchedEntries::MediaId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_watched_entries_kind_media_id")
                    .table(WatchedEntries::Table)
                    .col(WatchedEntries::Kind)
                    .col(WatchedEntries::MediaId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_watched_entries_kind_media_id")
                    .table(WatchedEntries::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(WatchedEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WatchedEntries {
    Table,
    UserKey,
    Kind,
    MediaId,
    Rating,
    Comment,
    Favorite,
    WatchedAt,
}
