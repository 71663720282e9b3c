use chrono::{DateTime, NaiveTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::slots;

/// One weekly class meeting: a course in a room, optionally with a teacher,
/// on a fixed weekday and time range within a semester.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "class_schedules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
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
    pub is_holding: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub student_reported_not_holding: bool,
    pub not_holding_reported_at: Option<DateTime<Utc>>,
    pub student_reported_holding: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Academic week runs Saturday through Friday.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Display, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "day_of_week")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DayOfWeek {
    #[sea_orm(string_value = "saturday")]
    Saturday,
    #[sea_orm(string_value = "sunday")]
    Sunday,
    #[sea_orm(string_value = "monday")]
    Monday,
    #[sea_orm(string_value = "tuesday")]
    Tuesday,
    #[sea_orm(string_value = "wednesday")]
    Wednesday,
    #[sea_orm(string_value = "thursday")]
    Thursday,
    #[sea_orm(string_value = "friday")]
    Friday,
}

impl Model {
    /// Length of the meeting in minutes, or `None` when timing is absent.
    /// Ranges crossing midnight are measured forward across it.
    pub fn duration_minutes(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(s), Some(e)) => Some(slots::duration_minutes(s, e)),
            _ => None,
        }
    }

    /// `"HH:MM-HH:MM"` when explicit times exist, otherwise the legacy
    /// slot label, otherwise `"-"`.
    pub fn time_display(&self) -> String {
        match (self.start_time, self.end_time) {
            (Some(s), Some(e)) => slots::format_time_range(s, e),
            _ => self.time_slot.clone().unwrap_or_else(|| "-".to_string()),
        }
    }

    /// True when both schedules carry explicit times on the same day and
    /// their ranges overlap. Back-to-back meetings do not overlap.
    pub fn overlaps_with(&self, other: &Model) -> bool {
        if self.day_of_week != other.day_of_week {
            return false;
        }
        match (self.start_time, self.end_time, other.start_time, other.end_time) {
            (Some(a_start), Some(a_end), Some(b_start), Some(b_end)) => {
                slots::overlaps(a_start, a_end, b_start, b_end)
            }
            _ => false,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id"
    )]
    Course,
    #[sea_orm(
        belongs_to = "super::room::Entity",
        from = "Column::RoomId",
        to = "super::room::Column::Id"
    )]
    Room,
    #[sea_orm(
        belongs_to = "super::teacher::Entity",
        from = "Column::TeacherId",
        to = "super::teacher::Column::Id"
    )]
    Teacher,
    #[sea_orm(has_many = "super::cancellation_vote::Entity")]
    CancellationVotes,
    #[sea_orm(has_many = "super::confirmation_vote::Entity")]
    ConfirmationVotes,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::room::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Room.def()
    }
}

impl Related<super::teacher::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teacher.def()
    }
}

impl Related<super::cancellation_vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CancellationVotes.def()
    }
}

impl Related<super::confirmation_vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConfirmationVotes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
