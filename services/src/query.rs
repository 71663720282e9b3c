//! Read-side listing of schedules for timetable views.

use chrono::NaiveTime;
use db::models::class_schedule::{self, DayOfWeek};
use db::models::{floor, room};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    QueryTrait,
};

/// Optional filters; unset fields match everything. Inactive schedules are
/// always excluded.
#[derive(Debug, Clone, Default)]
pub struct ScheduleFilter {
    pub faculty_id: Option<i64>,
    pub day_of_week: Option<DayOfWeek>,
    pub room_id: Option<i64>,
    pub floor_id: Option<i64>,
    pub teacher_id: Option<i64>,
    pub course_id: Option<i64>,
    pub starts_after: Option<NaiveTime>,
    pub ends_before: Option<NaiveTime>,
    pub semester: Option<String>,
}

/// Active schedules matching the filter, ordered by day then start time.
pub async fn list_schedules<C>(
    db: &C,
    filter: &ScheduleFilter,
) -> Result<Vec<class_schedule::Model>, DbErr>
where
    C: ConnectionTrait,
{
    let mut query = class_schedule::Entity::find()
        .filter(class_schedule::Column::IsActive.eq(true));

    if let Some(day) = filter.day_of_week {
        query = query.filter(class_schedule::Column::DayOfWeek.eq(day));
    }
    if let Some(room_id) = filter.room_id {
        query = query.filter(class_schedule::Column::RoomId.eq(room_id));
    }
    if let Some(teacher_id) = filter.teacher_id {
        query = query.filter(class_schedule::Column::TeacherId.eq(teacher_id));
    }
    if let Some(course_id) = filter.course_id {
        query = query.filter(class_schedule::Column::CourseId.eq(course_id));
    }
    if let Some(semester) = &filter.semester {
        query = query.filter(class_schedule::Column::Semester.eq(semester.as_str()));
    }
    if let Some(starts_after) = filter.starts_after {
        query = query.filter(class_schedule::Column::StartTime.gte(starts_after));
    }
    if let Some(ends_before) = filter.ends_before {
        query = query.filter(class_schedule::Column::EndTime.lte(ends_before));
    }

    if let Some(floor_id) = filter.floor_id {
        let rooms_on_floor = room::Entity::find()
            .select_only()
            .column(room::Column::Id)
            .filter(room::Column::FloorId.eq(floor_id))
            .into_query();
        query = query.filter(class_schedule::Column::RoomId.in_subquery(rooms_on_floor));
    }
    if let Some(faculty_id) = filter.faculty_id {
        let floors_in_faculty = floor::Entity::find()
            .select_only()
            .column(floor::Column::Id)
            .filter(floor::Column::FacultyId.eq(faculty_id))
            .into_query();
        let rooms_in_faculty = room::Entity::find()
            .select_only()
            .column(room::Column::Id)
            .filter(room::Column::FloorId.in_subquery(floors_in_faculty))
            .into_query();
        query = query.filter(class_schedule::Column::RoomId.in_subquery(rooms_in_faculty));
    }

    query
        .order_by_asc(class_schedule::Column::DayOfWeek)
        .order_by_asc(class_schedule::Column::StartTime)
        .all(db)
        .await
}
