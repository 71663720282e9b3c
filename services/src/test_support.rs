//! Shared seeding helpers for service tests.

use chrono::{NaiveTime, Utc};
use db::models::{course, faculty, floor, room, teacher};
use db::models::room::{RoomPosition, RoomType};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

pub struct Base {
    pub faculty: faculty::Model,
    pub floor: floor::Model,
    pub room: room::Model,
    pub course: course::Model,
    pub teacher: teacher::Model,
}

pub fn time(v: &str) -> NaiveTime {
    NaiveTime::parse_from_str(v, "%H:%M").unwrap()
}

pub async fn seed_base(db: &DatabaseConnection) -> Base {
    let now = Utc::now();
    let faculty = faculty::ActiveModel {
        code: Set("eng".to_string()),
        name: Set("دانشکده فنی و مهندسی".to_string()),
        image_name: Set(None),
        description: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    let floor = floor::ActiveModel {
        faculty_id: Set(Some(faculty.id)),
        floor_number: Set(1),
        name: Set("طبقه اول".to_string()),
        description: Set(None),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    let room = seed_room(db, floor.id, "101").await;
    let course = seed_course(db, "1912045", "مبانی کامپیوتر").await;
    let teacher = seed_teacher(db, "دکتر احمدی").await;

    Base {
        faculty,
        floor,
        room,
        course,
        teacher,
    }
}

pub async fn seed_room(db: &DatabaseConnection, floor_id: i64, number: &str) -> room::Model {
    let now = Utc::now();
    room::ActiveModel {
        floor_id: Set(floor_id),
        room_number: Set(number.to_string()),
        room_type: Set(RoomType::Classroom),
        position: Set(RoomPosition::Left),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_course(db: &DatabaseConnection, code: &str, name: &str) -> course::Model {
    let now = Utc::now();
    course::ActiveModel {
        code: Set(code.to_string()),
        name: Set(name.to_string()),
        credit_hours: Set(3),
        description: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_teacher(db: &DatabaseConnection, name: &str) -> teacher::Model {
    let now = Utc::now();
    teacher::ActiveModel {
        full_name: Set(name.to_string()),
        email: Set(None),
        phone_number: Set(None),
        specialization: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}
