use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202601120001_create_faculties::Migration),
            Box::new(migrations::m202601120002_create_teachers::Migration),
            Box::new(migrations::m202601120003_create_courses::Migration),
            Box::new(migrations::m202601120004_create_floors::Migration),
            Box::new(migrations::m202601120005_create_rooms::Migration),
            Box::new(migrations::m202601120006_create_class_schedules::Migration),
            Box::new(migrations::m202601120007_create_schedule_votes::Migration),
            Box::new(migrations::m202601120008_create_import_jobs::Migration),
        ]
    }
}
