//! Create activity log table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ActivityLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActivityLog::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    // No foreign key: entries outlive the users they mention
                    .col(ColumnDef::new(ActivityLog::ActorId).string_len(32))
                    .col(ColumnDef::new(ActivityLog::Action).string_len(40).not_null())
                    .col(ColumnDef::new(ActivityLog::SubjectType).string_len(32).not_null())
                    .col(ColumnDef::new(ActivityLog::SubjectId).string_len(32).not_null())
                    .col(ColumnDef::new(ActivityLog::Description).text().not_null())
                    .col(
                        ColumnDef::new(ActivityLog::Metadata)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(ColumnDef::new(ActivityLog::IpAddress).string_len(64))
                    .col(
                        ColumnDef::new(ActivityLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_activity_log_actor_id")
                    .table(ActivityLog::Table)
                    .col(ActivityLog::ActorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_activity_log_subject")
                    .table(ActivityLog::Table)
                    .col(ActivityLog::SubjectType)
                    .col(ActivityLog::SubjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_activity_log_created_at")
                    .table(ActivityLog::Table)
                    .col(ActivityLog::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActivityLog::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ActivityLog {
    Table,
    Id,
    ActorId,
    Action,
    SubjectType,
    SubjectId,
    Description,
    Metadata,
    IpAddress,
    CreatedAt,
}
