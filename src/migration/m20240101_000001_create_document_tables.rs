use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Document::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Document::Seq)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Document::Id).text().not_null().unique_key())
                    .col(ColumnDef::new(Document::Collection).text().not_null())
                    .col(ColumnDef::new(Document::Data).blob().not_null())
                    .col(
                        ColumnDef::new(Document::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Document::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_document_collection")
                    .table(Document::Table)
                    .col(Document::Collection)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExpiryIndex::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExpiryIndex::Name)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ExpiryIndex::Collection).text().not_null())
                    .col(ColumnDef::new(ExpiryIndex::Field).text().not_null())
                    .col(
                        ColumnDef::new(ExpiryIndex::ExpireAfterSecs)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExpiryIndex::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Document::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Document {
    Table,
    Seq,
    Id,
    Collection,
    Data,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ExpiryIndex {
    Table,
    Name,
    Collection,
    Field,
    ExpireAfterSecs,
}
