use sea_orm_migration::prelude::*;

mod m0001_create_jobs;
mod m0002_create_trackers;
mod m0003_create_media;
mod m0004_create_watched_entries;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m0001_create_jobs::Migration),
            Box::new(m0002_create_trackers::Migration),
            Box::new(m0003_create_media::Migration),
            Box::new(m0004_create_watched_entries::Migration),
        ]
    }
}
