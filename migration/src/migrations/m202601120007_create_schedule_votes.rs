use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202601120007_create_schedule_votes"
    }
}

fn vote_table(name: &str, fk_name: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(name))
        .if_not_exists()
        .col(
            ColumnDef::new(Alias::new("id"))
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(
            ColumnDef::new(Alias::new("schedule_id"))
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(Alias::new("voter_identifier"))
                .string_len(64)
                .not_null(),
        )
        .col(ColumnDef::new(Alias::new("ip_address")).string().null())
        .col(
            ColumnDef::new(Alias::new("voted_at"))
                .timestamp()
                .not_null()
                .default(Expr::cust("CURRENT_TIMESTAMP")),
        )
        .foreign_key(
            ForeignKey::create()
                .name(fk_name)
                .from(Alias::new(name), Alias::new("schedule_id"))
                .to(Alias::new("class_schedules"), Alias::new("id"))
                .on_delete(ForeignKeyAction::Cascade)
                .on_update(ForeignKeyAction::Cascade),
        )
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(vote_table("cancellation_votes", "fk_cancel_vote_schedule"))
            .await?;
        manager
            .create_table(vote_table("confirmation_votes", "fk_confirm_vote_schedule"))
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cancel_vote_schedule_time")
                    .table(Alias::new("cancellation_votes"))
                    .col(Alias::new("schedule_id"))
                    .col(Alias::new("voted_at"))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_confirm_vote_schedule_time")
                    .table(Alias::new("confirmation_votes"))
                    .col(Alias::new("schedule_id"))
                    .col(Alias::new("voted_at"))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(Alias::new("confirmation_votes"))
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(Alias::new("cancellation_votes"))
                    .to_owned(),
            )
            .await
    }
}
