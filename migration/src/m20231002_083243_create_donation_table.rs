use entity::donation;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(donation::Entity)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(donation::Column::Seq)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(donation::Column::Id)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(donation::Column::UserId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(donation::Column::Campaign)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(donation::Column::Amount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(donation::Column::Status)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(donation::Column::PaymentId)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(donation::Column::SessionId)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(donation::Column::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(donation::Column::UpdatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_donation_user_id")
                    .col(donation::Column::UserId)
                    .table(donation::Entity)
                    .to_owned(),
            )
            .await?;
        // sweep predicate
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_donation_status_created_at")
                    .col(donation::Column::Status)
                    .col(donation::Column::CreatedAt)
                    .table(donation::Entity)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_donation_status_created_at").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_donation_user_id").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(donation::Entity).to_owned())
            .await
    }
}
