//! Create registration table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Registration::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Registration::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Registration::FullName).string_len(256).not_null())
                    .col(ColumnDef::new(Registration::Email).string_len(256).not_null())
                    .col(ColumnDef::new(Registration::Phone).string_len(64).not_null())
                    .col(ColumnDef::new(Registration::Gender).string_len(16).not_null())
                    .col(ColumnDef::new(Registration::Address).text())
                    .col(
                        ColumnDef::new(Registration::PreferredRoles)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Registration::Skills)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Registration::Availability)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Registration::HasExperience)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Registration::ExperienceDetails).text())
                    .col(
                        ColumnDef::new(Registration::EmergencyContactName)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Registration::EmergencyContactPhone)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Registration::Motivation).text())
                    .col(
                        ColumnDef::new(Registration::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Registration::UserId).string_len(32))
                    .col(ColumnDef::new(Registration::ReviewedBy).string_len(32))
                    .col(ColumnDef::new(Registration::ReviewedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Registration::RejectionReason).text())
                    .col(
                        ColumnDef::new(Registration::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Registration::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Index: status (review queue and dashboard counts)
        manager
            .create_index(
                Index::create()
                    .name("idx_registration_status")
                    .table(Registration::Table)
                    .col(Registration::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_registration_email")
                    .table(Registration::Table)
                    .col(Registration::Email)
                    .to_owned(),
            )
            .await?;

        // Index: created_at (for pagination)
        manager
            .create_index(
                Index::create()
                    .name("idx_registration_created_at")
                    .table(Registration::Table)
                    .col(Registration::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Registration::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Registration {
    Table,
    Id,
    FullName,
    Email,
    Phone,
    Gender,
    Address,
    PreferredRoles,
    Skills,
    Availability,
    HasExperience,
    ExperienceDetails,
    EmergencyContactName,
    EmergencyContactPhone,
    Motivation,
    Status,
    UserId,
    ReviewedBy,
    ReviewedAt,
    RejectionReason,
    CreatedAt,
    UpdatedAt,
}
