//! Create meeting minutes table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MeetingMinutes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MeetingMinutes::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MeetingMinutes::Title).string_len(256).not_null())
                    .col(
                        ColumnDef::new(MeetingMinutes::MeetingDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MeetingMinutes::EventId).string_len(32))
                    .col(ColumnDef::new(MeetingMinutes::Summary).text())
                    .col(
                        ColumnDef::new(MeetingMinutes::Attendees)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(ColumnDef::new(MeetingMinutes::DocumentUrl).string_len(1024))
                    .col(ColumnDef::new(MeetingMinutes::CreatedBy).string_len(32))
                    .col(
                        ColumnDef::new(MeetingMinutes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(MeetingMinutes::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_meeting_minutes_event")
                            .from(MeetingMinutes::Table, MeetingMinutes::EventId)
                            .to(Event::Table, Event::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: meeting_date (newest first listing)
        manager
            .create_index(
                Index::create()
                    .name("idx_meeting_minutes_meeting_date")
                    .table(MeetingMinutes::Table)
                    .col(MeetingMinutes::MeetingDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_meeting_minutes_event_id")
                    .table(MeetingMinutes::Table)
                    .col(MeetingMinutes::EventId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MeetingMinutes::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MeetingMinutes {
    Table,
    Id,
    Title,
    MeetingDate,
    EventId,
    Summary,
    Attendees,
    DocumentUrl,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Event {
    Table,
    Id,
}
