//! Create/update paths for class schedules.
//!
//! All validation runs inside the same transaction as the write so two
//! concurrent submissions cannot both pass the conflict check and then both
//! commit into the same slot.

use chrono::{NaiveTime, Utc};
use db::models::class_schedule::{self, DayOfWeek};
use db::slots;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use thiserror::Error;

use crate::conflict::{self, CandidateSlot, ConflictDescriptor, Dimension};

pub const MIN_DURATION_MINUTES: i64 = 30;
pub const MAX_DURATION_MINUTES: i64 = 360;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("provide both start and end times, or a predefined time slot")]
    MissingTiming,
    #[error("end time must be after start time")]
    InvalidOrder,
    #[error("class duration of {minutes} minutes is outside the allowed {MIN_DURATION_MINUTES}-{MAX_DURATION_MINUTES} minute range")]
    DurationOutOfRange { minutes: i64 },
    #[error("room is already booked by \"{}\" ({})", .0.course_name, .0.time_display)]
    RoomConflict(ConflictDescriptor),
    #[error("teacher is already teaching \"{}\" ({})", .0.course_name, .0.time_display)]
    TeacherConflict(ConflictDescriptor),
    #[error("schedule {0} not found")]
    NotFound(i64),
    #[error("database error: {0}")]
    Db(#[from] DbErr),
}

/// Caller-supplied fields for creating or moving a schedule.
#[derive(Debug, Clone)]
pub struct ScheduleInput {
    pub course_id: i64,
    pub room_id: i64,
    pub teacher_id: Option<i64>,
    pub day_of_week: DayOfWeek,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub time_slot: Option<String>,
    pub semester: String,
    pub academic_year: String,
    pub notes: Option<String>,
}

/// Runs the full validation pipeline for a candidate schedule.
///
/// Checks fire in a fixed order: timing presence, ordering, duration
/// bounds, room conflict, teacher conflict. Schedules without a full time
/// pair stop after the presence check as long as they carry a legacy slot
/// label.
pub async fn validate<C>(
    db: &C,
    input: &ScheduleInput,
    exclude_id: Option<i64>,
) -> Result<(), ScheduleError>
where
    C: ConnectionTrait,
{
    let (start, end) = match (input.start_time, input.end_time) {
        (Some(s), Some(e)) => (s, e),
        _ if input.time_slot.is_some() => return Ok(()),
        _ => return Err(ScheduleError::MissingTiming),
    };

    if slots::minutes_of(end) <= slots::minutes_of(start) {
        return Err(ScheduleError::InvalidOrder);
    }

    let minutes = slots::duration_minutes(start, end);
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
        return Err(ScheduleError::DurationOutOfRange { minutes });
    }

    let candidate = CandidateSlot {
        room_id: input.room_id,
        teacher_id: input.teacher_id,
        day_of_week: input.day_of_week,
        start_time: start,
        end_time: end,
        exclude_id,
    };
    if let Some((dimension, existing)) = conflict::find_conflict(db, &candidate).await? {
        let descriptor = conflict::describe(db, dimension, &existing).await?;
        return Err(match dimension {
            Dimension::Room => ScheduleError::RoomConflict(descriptor),
            Dimension::Teacher => ScheduleError::TeacherConflict(descriptor),
        });
    }
    Ok(())
}

pub async fn create_schedule(
    db: &DatabaseConnection,
    input: ScheduleInput,
) -> Result<class_schedule::Model, ScheduleError> {
    let txn = db.begin().await?;
    validate(&txn, &input, None).await?;

    let now = Utc::now();
    let time_slot = resolve_time_slot(&input);

    // A soft-deleted row can still hold the unique (room, day, start, end)
    // key; revive it in place instead of tripping the index.
    let dormant = match (input.start_time, input.end_time) {
        (Some(start), Some(end)) => {
            class_schedule::Entity::find()
                .filter(class_schedule::Column::IsActive.eq(false))
                .filter(class_schedule::Column::RoomId.eq(input.room_id))
                .filter(class_schedule::Column::DayOfWeek.eq(input.day_of_week))
                .filter(class_schedule::Column::StartTime.eq(start))
                .filter(class_schedule::Column::EndTime.eq(end))
                .one(&txn)
                .await?
        }
        _ => None,
    };

    let model = match dormant {
        Some(existing) => {
            let mut active: class_schedule::ActiveModel = existing.into();
            active.course_id = Set(input.course_id);
            active.teacher_id = Set(input.teacher_id);
            active.time_slot = Set(time_slot);
            active.semester = Set(input.semester);
            active.academic_year = Set(input.academic_year);
            active.notes = Set(input.notes);
            active.is_holding = Set(true);
            active.cancelled_at = Set(None);
            active.student_reported_not_holding = Set(false);
            active.not_holding_reported_at = Set(None);
            active.student_reported_holding = Set(false);
            active.is_active = Set(true);
            active.updated_at = Set(now);
            active.update(&txn).await?
        }
        None => {
            class_schedule::ActiveModel {
                course_id: Set(input.course_id),
                room_id: Set(input.room_id),
                teacher_id: Set(input.teacher_id),
                day_of_week: Set(input.day_of_week),
                start_time: Set(input.start_time),
                end_time: Set(input.end_time),
                time_slot: Set(time_slot),
                semester: Set(input.semester),
                academic_year: Set(input.academic_year),
                notes: Set(input.notes),
                is_holding: Set(true),
                cancelled_at: Set(None),
                student_reported_not_holding: Set(false),
                not_holding_reported_at: Set(None),
                student_reported_holding: Set(false),
                is_active: Set(true),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };

    txn.commit().await?;
    Ok(model)
}

pub async fn update_schedule(
    db: &DatabaseConnection,
    id: i64,
    input: ScheduleInput,
) -> Result<class_schedule::Model, ScheduleError> {
    let txn = db.begin().await?;

    let existing = class_schedule::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(ScheduleError::NotFound(id))?;

    validate(&txn, &input, Some(id)).await?;

    let time_slot = resolve_time_slot(&input);
    let mut active: class_schedule::ActiveModel = existing.into();
    active.course_id = Set(input.course_id);
    active.room_id = Set(input.room_id);
    active.teacher_id = Set(input.teacher_id);
    active.day_of_week = Set(input.day_of_week);
    active.start_time = Set(input.start_time);
    active.end_time = Set(input.end_time);
    active.time_slot = Set(time_slot);
    active.semester = Set(input.semester);
    active.academic_year = Set(input.academic_year);
    active.notes = Set(input.notes);
    active.updated_at = Set(Utc::now());

    let model = active.update(&txn).await?;
    txn.commit().await?;
    Ok(model)
}

/// Admin-only holding toggle. Marking a class not holding stamps
/// `cancelled_at`; restoring it clears the stamp and every student flag.
pub async fn set_holding(
    db: &DatabaseConnection,
    id: i64,
    holding: bool,
) -> Result<class_schedule::Model, ScheduleError> {
    let schedule = class_schedule::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ScheduleError::NotFound(id))?;

    let mut active: class_schedule::ActiveModel = schedule.into();
    active.is_holding = Set(holding);
    if holding {
        active.cancelled_at = Set(None);
        active.student_reported_not_holding = Set(false);
        active.not_holding_reported_at = Set(None);
        active.student_reported_holding = Set(false);
    } else {
        active.cancelled_at = Set(Some(Utc::now()));
    }
    active.updated_at = Set(Utc::now());
    Ok(active.update(db).await?)
}

/// Soft delete. Inactive schedules drop out of listings and conflict checks
/// but keep their vote history.
pub async fn deactivate_schedule(
    db: &DatabaseConnection,
    id: i64,
) -> Result<class_schedule::Model, ScheduleError> {
    let schedule = class_schedule::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ScheduleError::NotFound(id))?;

    let mut active: class_schedule::ActiveModel = schedule.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now());
    Ok(active.update(db).await?)
}

/// Fills in the legacy slot label for rows that have explicit times but no
/// label yet. Returns how many rows were stamped.
pub async fn backfill_time_slots(db: &DatabaseConnection) -> Result<u64, ScheduleError> {
    let pending = class_schedule::Entity::find()
        .filter(class_schedule::Column::TimeSlot.is_null())
        .filter(class_schedule::Column::StartTime.is_not_null())
        .filter(class_schedule::Column::EndTime.is_not_null())
        .all(db)
        .await?;

    let mut stamped = 0u64;
    for schedule in pending {
        let label = match (schedule.start_time, schedule.end_time) {
            (Some(s), Some(e)) => slots::derive_time_slot(s, e),
            _ => None,
        };
        if let Some(label) = label {
            let mut active: class_schedule::ActiveModel = schedule.into();
            active.time_slot = Set(Some(label.to_string()));
            active.updated_at = Set(Utc::now());
            active.update(db).await?;
            stamped += 1;
        }
    }
    Ok(stamped)
}

fn resolve_time_slot(input: &ScheduleInput) -> Option<String> {
    if input.time_slot.is_some() {
        return input.time_slot.clone();
    }
    match (input.start_time, input.end_time) {
        (Some(s), Some(e)) => slots::derive_time_slot(s, e).map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_base, seed_room, seed_teacher, time};
    use db::test_utils::setup_test_db;

    fn input(base: &crate::test_support::Base, start: &str, end: &str) -> ScheduleInput {
        ScheduleInput {
            course_id: base.course.id,
            room_id: base.room.id,
            teacher_id: Some(base.teacher.id),
            day_of_week: DayOfWeek::Monday,
            start_time: Some(time(start)),
            end_time: Some(time(end)),
            time_slot: None,
            semester: "اول".to_string(),
            academic_year: "1404-1405".to_string(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn rejects_room_double_booking() {
        let db = setup_test_db().await;
        let base = seed_base(&db).await;
        create_schedule(&db, input(&base, "08:00", "10:00")).await.unwrap();

        let other_teacher = seed_teacher(&db, "دکتر رضایی").await;
        let mut second = input(&base, "09:00", "11:00");
        second.teacher_id = Some(other_teacher.id);
        match create_schedule(&db, second).await {
            Err(ScheduleError::RoomConflict(d)) => assert_eq!(d.room_number, base.room.room_number),
            other => panic!("expected room conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_teacher_double_booking_across_rooms() {
        let db = setup_test_db().await;
        let base = seed_base(&db).await;
        create_schedule(&db, input(&base, "08:00", "10:00")).await.unwrap();

        let other_room = seed_room(&db, base.floor.id, "102").await;
        let mut second = input(&base, "09:00", "11:00");
        second.room_id = other_room.id;
        match create_schedule(&db, second).await {
            Err(ScheduleError::TeacherConflict(d)) => {
                assert_eq!(d.teacher_name.as_deref(), Some(base.teacher.full_name.as_str()))
            }
            other => panic!("expected teacher conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn room_conflicts_are_not_scoped_by_semester() {
        let db = setup_test_db().await;
        let base = seed_base(&db).await;
        create_schedule(&db, input(&base, "08:00", "10:00")).await.unwrap();

        // same room and day, different term: still one physical room
        let other_teacher = seed_teacher(&db, "دکتر کریمی").await;
        let mut second = input(&base, "09:00", "11:00");
        second.teacher_id = Some(other_teacher.id);
        second.semester = "دوم".to_string();
        second.academic_year = "1405-1406".to_string();
        match create_schedule(&db, second).await {
            Err(ScheduleError::RoomConflict(d)) => assert_eq!(d.room_number, base.room.room_number),
            other => panic!("expected room conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn back_to_back_in_same_room_is_allowed() {
        let db = setup_test_db().await;
        let base = seed_base(&db).await;
        create_schedule(&db, input(&base, "08:00", "10:00")).await.unwrap();

        let other_teacher = seed_teacher(&db, "دکتر موسوی").await;
        let mut second = input(&base, "10:00", "12:00");
        second.teacher_id = Some(other_teacher.id);
        create_schedule(&db, second).await.unwrap();
    }

    #[tokio::test]
    async fn schedules_without_teacher_never_teacher_conflict() {
        let db = setup_test_db().await;
        let base = seed_base(&db).await;

        let mut first = input(&base, "08:00", "10:00");
        first.teacher_id = None;
        create_schedule(&db, first).await.unwrap();

        let other_room = seed_room(&db, base.floor.id, "103").await;
        let mut second = input(&base, "08:00", "10:00");
        second.teacher_id = None;
        second.room_id = other_room.id;
        create_schedule(&db, second).await.unwrap();
    }

    #[tokio::test]
    async fn duration_bounds_are_inclusive() {
        let db = setup_test_db().await;
        let base = seed_base(&db).await;

        match create_schedule(&db, input(&base, "08:00", "08:29")).await {
            Err(ScheduleError::DurationOutOfRange { minutes }) => assert_eq!(minutes, 29),
            other => panic!("expected duration error, got {other:?}"),
        }
        create_schedule(&db, input(&base, "08:00", "08:30")).await.unwrap();
        create_schedule(&db, input(&base, "09:00", "15:00")).await.unwrap();
        match create_schedule(&db, input(&base, "15:30", "21:31")).await {
            Err(ScheduleError::DurationOutOfRange { minutes }) => assert_eq!(minutes, 361),
            other => panic!("expected duration error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_inverted_and_partial_timing() {
        let db = setup_test_db().await;
        let base = seed_base(&db).await;

        match create_schedule(&db, input(&base, "10:00", "08:00")).await {
            Err(ScheduleError::InvalidOrder) => {}
            other => panic!("expected ordering error, got {other:?}"),
        }

        let mut partial = input(&base, "08:00", "10:00");
        partial.end_time = None;
        match create_schedule(&db, partial).await {
            Err(ScheduleError::MissingTiming) => {}
            other => panic!("expected missing timing error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn legacy_slot_only_schedule_is_accepted() {
        let db = setup_test_db().await;
        let base = seed_base(&db).await;

        let mut legacy = input(&base, "08:00", "10:00");
        legacy.start_time = None;
        legacy.end_time = None;
        legacy.time_slot = Some("07:30-09:15".to_string());
        let created = create_schedule(&db, legacy).await.unwrap();
        assert_eq!(created.time_slot.as_deref(), Some("07:30-09:15"));
        assert!(created.start_time.is_none());

        // a half-filled time pair is fine too, as long as the label is there
        let mut partial = input(&base, "13:00", "15:00");
        partial.end_time = None;
        partial.time_slot = Some("13:30-15:15".to_string());
        let created = create_schedule(&db, partial).await.unwrap();
        assert_eq!(created.start_time, Some(time("13:00")));
        assert!(created.end_time.is_none());
    }

    #[tokio::test]
    async fn update_does_not_conflict_with_itself() {
        let db = setup_test_db().await;
        let base = seed_base(&db).await;
        let created = create_schedule(&db, input(&base, "08:00", "10:00")).await.unwrap();

        // shift by 30 minutes, still overlapping its own old slot
        let updated = update_schedule(&db, created.id, input(&base, "08:30", "10:30"))
            .await
            .unwrap();
        assert_eq!(updated.start_time, Some(time("08:30")));
    }

    #[tokio::test]
    async fn predefined_slot_label_is_derived_on_create() {
        let db = setup_test_db().await;
        let base = seed_base(&db).await;

        let created = create_schedule(&db, input(&base, "07:30", "09:15")).await.unwrap();
        assert_eq!(created.time_slot.as_deref(), Some("07:30-09:15"));

        let arbitrary = create_schedule(&db, input(&base, "11:10", "12:40")).await.unwrap();
        assert!(arbitrary.time_slot.is_none());
    }

    #[tokio::test]
    async fn set_holding_round_trip_clears_flags() {
        let db = setup_test_db().await;
        let base = seed_base(&db).await;
        let created = create_schedule(&db, input(&base, "08:00", "10:00")).await.unwrap();

        let cancelled = set_holding(&db, created.id, false).await.unwrap();
        assert!(!cancelled.is_holding);
        assert!(cancelled.cancelled_at.is_some());

        let restored = set_holding(&db, created.id, true).await.unwrap();
        assert!(restored.is_holding);
        assert!(restored.cancelled_at.is_none());
        assert!(!restored.student_reported_not_holding);
        assert!(!restored.student_reported_holding);
    }

    #[tokio::test]
    async fn deactivated_schedule_frees_its_slot() {
        let db = setup_test_db().await;
        let base = seed_base(&db).await;
        let created = create_schedule(&db, input(&base, "08:00", "10:00")).await.unwrap();

        deactivate_schedule(&db, created.id).await.unwrap();
        let revived = create_schedule(&db, input(&base, "08:00", "10:00")).await.unwrap();

        // the dormant row is revived in place, not duplicated
        assert_eq!(revived.id, created.id);
        assert!(revived.is_active);
        assert!(revived.is_holding);
        assert_eq!(
            class_schedule::Entity::find().all(&db).await.unwrap().len(),
            1
        );
    }
}
