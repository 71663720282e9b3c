//! Double-booking detection for rooms and teachers.
//!
//! A candidate slot conflicts with an existing schedule when both carry
//! explicit times, share the day, and their intervals overlap in the
//! half-open sense. A booking is a physical claim on a room or a person,
//! so semester and academic year never scope the scan. Schedules that only
//! carry a legacy slot label are never conflict partners.

use chrono::NaiveTime;
use db::models::class_schedule::{self, DayOfWeek};
use db::slots;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Room,
    Teacher,
}

/// The slot a schedule wants to occupy, independent of whether it is being
/// created or moved. `exclude_id` skips the schedule's own row on update.
#[derive(Debug, Clone)]
pub struct CandidateSlot {
    pub room_id: i64,
    pub teacher_id: Option<i64>,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub exclude_id: Option<i64>,
}

/// Human-readable account of the schedule a candidate collided with.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictDescriptor {
    pub dimension: Dimension,
    pub schedule_id: i64,
    pub course_name: String,
    pub teacher_name: Option<String>,
    pub room_number: String,
    pub day_of_week: DayOfWeek,
    pub time_display: String,
    pub semester: String,
    pub academic_year: String,
    pub notes: Option<String>,
}

/// Finds the first active schedule whose room or teacher booking overlaps
/// the candidate. Room collisions are reported before teacher collisions.
pub async fn find_conflict<C>(
    db: &C,
    slot: &CandidateSlot,
) -> Result<Option<(Dimension, class_schedule::Model)>, DbErr>
where
    C: ConnectionTrait,
{
    if let Some(existing) = scan(db, slot, Dimension::Room).await? {
        return Ok(Some((Dimension::Room, existing)));
    }
    if slot.teacher_id.is_some() {
        if let Some(existing) = scan(db, slot, Dimension::Teacher).await? {
            return Ok(Some((Dimension::Teacher, existing)));
        }
    }
    Ok(None)
}

async fn scan<C>(
    db: &C,
    slot: &CandidateSlot,
    dimension: Dimension,
) -> Result<Option<class_schedule::Model>, DbErr>
where
    C: ConnectionTrait,
{
    let mut query = class_schedule::Entity::find()
        .filter(class_schedule::Column::DayOfWeek.eq(slot.day_of_week))
        .filter(class_schedule::Column::IsActive.eq(true))
        .filter(class_schedule::Column::StartTime.is_not_null())
        .filter(class_schedule::Column::EndTime.is_not_null());

    query = match dimension {
        Dimension::Room => query.filter(class_schedule::Column::RoomId.eq(slot.room_id)),
        Dimension::Teacher => {
            // callers guarantee teacher_id is present on this path
            query.filter(class_schedule::Column::TeacherId.eq(slot.teacher_id))
        }
    };
    if let Some(id) = slot.exclude_id {
        query = query.filter(class_schedule::Column::Id.ne(id));
    }

    // Overlap is decided here rather than in SQL so the half-open rule
    // stays in one place.
    let same_day = query.all(db).await?;
    Ok(same_day.into_iter().find(|existing| {
        match (existing.start_time, existing.end_time) {
            (Some(s), Some(e)) => slots::overlaps(slot.start_time, slot.end_time, s, e),
            _ => false,
        }
    }))
}

/// Resolves the course, teacher and room names of a conflicting schedule
/// for error messages and import reports.
pub async fn describe<C>(
    db: &C,
    dimension: Dimension,
    existing: &class_schedule::Model,
) -> Result<ConflictDescriptor, DbErr>
where
    C: ConnectionTrait,
{
    let course = db::models::Course::find_by_id(existing.course_id).one(db).await?;
    let room = db::models::Room::find_by_id(existing.room_id).one(db).await?;
    let teacher = match existing.teacher_id {
        Some(id) => db::models::Teacher::find_by_id(id).one(db).await?,
        None => None,
    };

    Ok(ConflictDescriptor {
        dimension,
        schedule_id: existing.id,
        course_name: course.map(|c| c.name).unwrap_or_else(|| "?".to_string()),
        teacher_name: teacher.map(|t| t.full_name),
        room_number: room.map(|r| r.room_number).unwrap_or_else(|| "?".to_string()),
        day_of_week: existing.day_of_week,
        time_display: existing.time_display(),
        semester: existing.semester.clone(),
        academic_year: existing.academic_year.clone(),
        notes: existing.notes.clone(),
    })
}
