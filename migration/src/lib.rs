pub use sea_orm_migration::prelude::*;

mod m20231002_081511_create_user_table;
mod m20231002_083243_create_donation_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20231002_081511_create_user_table::Migration),
            Box::new(m20231002_083243_create_donation_table::Migration),
        ]
    }
}
