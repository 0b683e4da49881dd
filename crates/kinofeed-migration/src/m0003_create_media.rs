use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Media::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Media::Kind).string().not_null())
                    .col(ColumnDef::new(Media::Id).big_integer().not_null())
                    .col(ColumnDef::new(Media::Title).string().null())
                    .col(ColumnDef::new(Media::Year).integer().null())
                    .col(ColumnDef::new(Media::OtherYear).integer().null())
                    .col(ColumnDef::new(Media::PosterUrl).string().null())
                    .col(ColumnDef::new(Media::SiteRating).double().null())
                    .col(ColumnDef::new(Media::CriticsRating).double().null())
                    .col(
                        ColumnDef::new(Media::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(Index::create().col(Media::Kind).col(Media::Id))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Media::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Media {
    Table,
    Kind,
    Id,
    Title,
    Year,
    OtherYear,
    PosterUrl,
    SiteRating,
    CriticsRating,
    UpdatedAt,
}
