pub mod m202601120001_create_faculties;
pub mod m202601120002_create_teachers;
pub mod m202601120003_create_courses;
pub mod m202601120004_create_floors;
pub mod m202601120005_create_rooms;
pub mod m202601120006_create_class_schedules;
pub mod m202601120007_create_schedule_votes;
pub mod m202601120008_create_import_jobs;
