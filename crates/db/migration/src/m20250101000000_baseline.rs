use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Checklists::Table)
                    .col(pk_id_col(manager, Checklists::Id))
                    .col(ColumnDef::new(Checklists::ObjectDomain).string().not_null())
                    .col(ColumnDef::new(Checklists::ObjectId).string().not_null())
                    .col(ColumnDef::new(Checklists::Description).text().not_null())
                    .col(timestamp_nullable_col(Checklists::Due))
                    .col(ColumnDef::new(Checklists::Urgency).integer())
                    .col(actor_col(Checklists::CreatedBy))
                    .col(actor_col(Checklists::UpdatedBy))
                    .col(timestamp_col(Checklists::CreatedAt))
                    .col(timestamp_col(Checklists::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_checklists_object")
                    .table(Checklists::Table)
                    .col(Checklists::ObjectDomain)
                    .col(Checklists::ObjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Items::Table)
                    .col(pk_id_col(manager, Items::Id))
                    .col(fk_id_col(manager, Items::ChecklistId))
                    .col(ColumnDef::new(Items::Description).text().not_null())
                    .col(
                        ColumnDef::new(Items::IsCompleted)
                            .boolean()
                            .not_null()
                            .default(Expr::val(false)),
                    )
                    .col(timestamp_nullable_col(Items::CompletedAt))
                    .col(timestamp_nullable_col(Items::Due))
                    .col(ColumnDef::new(Items::Urgency).integer())
                    .col(ColumnDef::new(Items::AssigneeId).big_integer())
                    .col(ColumnDef::new(Items::TaskId).big_integer())
                    .col(actor_col(Items::CreatedBy))
                    .col(actor_col(Items::UpdatedBy))
                    .col(timestamp_col(Items::CreatedAt))
                    .col(timestamp_col(Items::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_items_checklist_id")
                            .from(Items::Table, Items::ChecklistId)
                            .to(Checklists::Table, Checklists::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_items_checklist_id")
                    .table(Items::Table)
                    .col(Items::ChecklistId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_items_is_completed_due")
                    .table(Items::Table)
                    .col(Items::IsCompleted)
                    .col(Items::Due)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Items::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Checklists::Table).to_owned())
            .await?;
        Ok(())
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

fn fk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().to_owned()
}

fn actor_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).big_integer().to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

fn timestamp_nullable_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).timestamp_with_time_zone().to_owned()
}

#[derive(Iden)]
enum Checklists {
    Table,
    Id,
    ObjectDomain,
    ObjectId,
    Description,
    Due,
    Urgency,
    CreatedBy,
    UpdatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Items {
    Table,
    Id,
    ChecklistId,
    Description,
    IsCompleted,
    CompletedAt,
    Due,
    Urgency,
    AssigneeId,
    TaskId,
    CreatedBy,
    UpdatedBy,
    CreatedAt,
    UpdatedAt,
}
