use sea_orm_migration::{prelude::*, sea_orm::DatabaseBackend};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(Templates::Table)
                    .col(pk_id_col(manager, Templates::Id))
                    .col(ColumnDef::new(Templates::Name).string().not_null())
                    .col(actor_col(Templates::CreatedBy))
                    .col(actor_col(Templates::UpdatedBy))
                    .col(timestamp_col(Templates::CreatedAt))
                    .col(timestamp_col(Templates::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(TemplateChecklists::Table)
                    .col(pk_id_col(manager, TemplateChecklists::Id))
                    .col(fk_id_col(manager, TemplateChecklists::TemplateId))
                    .col(
                        ColumnDef::new(TemplateChecklists::Description)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TemplateChecklists::DueInterval).integer())
                    .col(ColumnDef::new(TemplateChecklists::DueUnit).string_len(16))
                    .col(ColumnDef::new(TemplateChecklists::Urgency).integer())
                    .col(actor_col(TemplateChecklists::CreatedBy))
                    .col(actor_col(TemplateChecklists::UpdatedBy))
                    .col(timestamp_col(TemplateChecklists::CreatedAt))
                    .col(timestamp_col(TemplateChecklists::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_template_checklists_template_id")
                            .from(TemplateChecklists::Table, TemplateChecklists::TemplateId)
                            .to(Templates::Table, Templates::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One checklist blueprint per template.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_template_checklists_template_id")
                    .table(TemplateChecklists::Table)
                    .col(TemplateChecklists::TemplateId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(TemplateItems::Table)
                    .col(pk_id_col(manager, TemplateItems::Id))
                    .col(fk_id_col(manager, TemplateItems::TemplateId))
                    .col(ColumnDef::new(TemplateItems::Description).text().not_null())
                    .col(ColumnDef::new(TemplateItems::DueInterval).integer())
                    .col(ColumnDef::new(TemplateItems::DueUnit).string_len(16))
                    .col(ColumnDef::new(TemplateItems::Urgency).integer())
                    .col(ColumnDef::new(TemplateItems::AssigneeId).big_integer())
                    .col(ColumnDef::new(TemplateItems::TaskId).big_integer())
                    .col(actor_col(TemplateItems::CreatedBy))
                    .col(actor_col(TemplateItems::UpdatedBy))
                    .col(timestamp_col(TemplateItems::CreatedAt))
                    .col(timestamp_col(TemplateItems::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_template_items_template_id")
                            .from(TemplateItems::Table, TemplateItems::TemplateId)
                            .to(Templates::Table, Templates::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_template_items_template_id")
                    .table(TemplateItems::Table)
                    .col(TemplateItems::TemplateId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TemplateItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TemplateChecklists::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Templates::Table).to_owned())
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

#[derive(Iden)]
enum Templates {
    Table,
    Id,
    Name,
    CreatedBy,
    UpdatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum TemplateChecklists {
    Table,
    Id,
    TemplateId,
    Description,
    DueInterval,
    DueUnit,
    Urgency,
    CreatedBy,
    UpdatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum TemplateItems {
    Table,
    Id,
    TemplateId,
    Description,
    DueInterval,
    DueUnit,
    Urgency,
    AssigneeId,
    TaskId,
    CreatedBy,
    UpdatedBy,
    CreatedAt,
    UpdatedAt,
}
