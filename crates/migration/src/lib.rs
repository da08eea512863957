pub use sea_orm_migration::prelude::*;

mod m20251020_090000_add_event_table;
mod m20251021_101500_add_event_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251020_090000_add_event_table::Migration),
            Box::new(m20251021_101500_add_event_indexes::Migration),
        ]
    }
}
