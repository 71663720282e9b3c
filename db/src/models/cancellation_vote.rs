use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// A student report that a class is not being held. One row per anonymous
/// fingerprint per 24-hour window; enforced by the vote service, not the DB.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "cancellation_votes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub schedule_id: i64,
    pub voter_identifier: String,
    pub ip_address: Option<String>,
    pub voted_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::class_schedule::Entity",
        from = "Column::ScheduleId",
        to = "super::class_schedule::Column::Id"
    )]
    Schedule,
}

impl Related<super::class_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
