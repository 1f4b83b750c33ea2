use sea_orm_migration::cli;

/// Runs the checklist schema migrations, e.g. `db-migration up -u sqlite://checklists.sqlite`.
#[tokio::main]
async fn main() {
    cli::run_cli(db_migration::Migrator).await;
}
