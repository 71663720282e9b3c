use chrono::{DateTime, Utc};
use sea_orm::ActiveValue;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "rooms")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub faculty_id: Option<i64>,
    pub floor_id: i64,
    pub room_number: String,
    pub room_type: RoomType,
    pub position: RoomPosition,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "room_type")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RoomType {
    #[sea_orm(string_value = "classroom")]
    Classroom,
    #[sea_orm(string_value = "lab")]
    Lab,
    #[sea_orm(string_value = "office")]
    Office,
    #[sea_orm(string_value = "study_hall")]
    StudyHall,
    #[sea_orm(string_value = "other")]
    Other,
}

/// Position of the room along the corridor; used only for spatial rendering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "room_position")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RoomPosition {
    #[sea_orm(string_value = "left")]
    Left,
    #[sea_orm(string_value = "right")]
    Right,
    #[sea_orm(string_value = "center")]
    Center,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::faculty::Entity",
        from = "Column::FacultyId",
        to = "super::faculty::Column::Id"
    )]
    Faculty,
    #[sea_orm(
        belongs_to = "super::floor::Entity",
        from = "Column::FloorId",
        to = "super::floor::Column::Id"
    )]
    Floor,
    #[sea_orm(has_many = "super::class_schedule::Entity")]
    Schedules,
}

impl Related<super::faculty::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Faculty.def()
    }
}

impl Related<super::floor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Floor.def()
    }
}

impl Related<super::class_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedules.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    /// Inherit the faculty from the floor when none was given.
    async fn before_save<C>(mut self, db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let has_faculty = matches!(
            &self.faculty_id,
            ActiveValue::Set(Some(_)) | ActiveValue::Unchanged(Some(_))
        );
        if !has_faculty {
            let floor_id = match &self.floor_id {
                ActiveValue::Set(v) | ActiveValue::Unchanged(v) => Some(*v),
                ActiveValue::NotSet => None,
            };
            if let Some(floor_id) = floor_id {
                if let Some(floor) = super::floor::Entity::find_by_id(floor_id).one(db).await? {
                    if floor.faculty_id.is_some() {
                        self.faculty_id = ActiveValue::Set(floor.faculty_id);
                    }
                }
            }
        }
        Ok(self)
    }
}
