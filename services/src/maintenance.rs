//! Periodic sweeps. Both are best-effort: failures are logged and swallowed
//! so a bad run never takes the scheduler loop down with it.

use chrono::{Duration, Utc};
use db::models::{cancellation_vote, class_schedule, confirmation_vote};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect,
    QueryTrait,
};

/// Restores classes an admin marked not-holding once the expiry has passed.
/// A cancellation is a statement about today, not a standing state.
/// Returns the number of schedules restored.
pub async fn auto_reset_cancelled_schedules(db: &DatabaseConnection, expiry_hours: i64) -> u64 {
    match try_auto_reset(db, expiry_hours).await {
        Ok(restored) => {
            if restored > 0 {
                log::info!("auto-reset restored {restored} cancelled schedule(s)");
            }
            restored
        }
        Err(err) => {
            log::error!("auto-reset sweep failed: {err}");
            0
        }
    }
}

async fn try_auto_reset(db: &DatabaseConnection, expiry_hours: i64) -> Result<u64, DbErr> {
    let cutoff = Utc::now() - Duration::hours(expiry_hours);
    let result = class_schedule::Entity::update_many()
        .col_expr(class_schedule::Column::IsHolding, Expr::value(true))
        .col_expr(
            class_schedule::Column::CancelledAt,
            Expr::value(Option::<chrono::DateTime<Utc>>::None),
        )
        .col_expr(
            class_schedule::Column::StudentReportedNotHolding,
            Expr::value(false),
        )
        .col_expr(
            class_schedule::Column::NotHoldingReportedAt,
            Expr::value(Option::<chrono::DateTime<Utc>>::None),
        )
        .col_expr(
            class_schedule::Column::StudentReportedHolding,
            Expr::value(false),
        )
        .col_expr(class_schedule::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(class_schedule::Column::IsHolding.eq(false))
        .filter(class_schedule::Column::CancelledAt.lte(cutoff))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Purges votes that fell out of the counting window and clears advisory
/// flags no longer backed by recent votes. Returns `(votes_purged,
/// schedules_reset)`.
pub async fn cleanup_old_votes(db: &DatabaseConnection, window_hours: i64) -> (u64, u64) {
    match try_cleanup(db, window_hours).await {
        Ok((purged, reset)) => {
            if purged > 0 || reset > 0 {
                log::info!("vote cleanup purged {purged} vote(s), reset {reset} schedule flag(s)");
            }
            (purged, reset)
        }
        Err(err) => {
            log::error!("vote cleanup sweep failed: {err}");
            (0, 0)
        }
    }
}

async fn try_cleanup(db: &DatabaseConnection, window_hours: i64) -> Result<(u64, u64), DbErr> {
    let cutoff = Utc::now() - Duration::hours(window_hours);

    let purged_cancellations = cancellation_vote::Entity::delete_many()
        .filter(cancellation_vote::Column::VotedAt.lte(cutoff))
        .exec(db)
        .await?
        .rows_affected;
    let purged_confirmations = confirmation_vote::Entity::delete_many()
        .filter(confirmation_vote::Column::VotedAt.lte(cutoff))
        .exec(db)
        .await?
        .rows_affected;

    // not-holding reports expire on their own timestamp
    let reset_not_holding = class_schedule::Entity::update_many()
        .col_expr(
            class_schedule::Column::StudentReportedNotHolding,
            Expr::value(false),
        )
        .col_expr(
            class_schedule::Column::NotHoldingReportedAt,
            Expr::value(Option::<chrono::DateTime<Utc>>::None),
        )
        .filter(class_schedule::Column::StudentReportedNotHolding.eq(true))
        .filter(class_schedule::Column::NotHoldingReportedAt.lte(cutoff))
        .exec(db)
        .await?
        .rows_affected;

    // holding reports expire once no confirmation vote remains in the window
    let recently_confirmed = confirmation_vote::Entity::find()
        .select_only()
        .column(confirmation_vote::Column::ScheduleId)
        .filter(confirmation_vote::Column::VotedAt.gt(cutoff))
        .into_query();
    let reset_holding = class_schedule::Entity::update_many()
        .col_expr(
            class_schedule::Column::StudentReportedHolding,
            Expr::value(false),
        )
        .filter(class_schedule::Column::StudentReportedHolding.eq(true))
        .filter(
            Condition::all()
                .add(class_schedule::Column::Id.in_subquery(recently_confirmed))
                .not(),
        )
        .exec(db)
        .await?
        .rows_affected;

    Ok((
        purged_cancellations + purged_confirmations,
        reset_not_holding + reset_holding,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule_service::{create_schedule, set_holding, ScheduleInput};
    use crate::test_support::{seed_base, time};
    use crate::vote_service::{cast_vote, VoteDirection, VoteRequest};
    use db::models::class_schedule::DayOfWeek;
    use db::test_utils::setup_test_db;
    use sea_orm::Set;
    use sea_orm::ActiveModelTrait;

    async fn seed_schedule(db: &DatabaseConnection) -> class_schedule::Model {
        let base = seed_base(db).await;
        create_schedule(
            db,
            ScheduleInput {
                course_id: base.course.id,
                room_id: base.room.id,
                teacher_id: Some(base.teacher.id),
                day_of_week: DayOfWeek::Wednesday,
                start_time: Some(time("10:15")),
                end_time: Some(time("13:30")),
                time_slot: None,
                semester: "دوم".to_string(),
                academic_year: "1404-1405".to_string(),
                notes: None,
            },
        )
        .await
        .unwrap()
    }

    async fn backdate_cancellation(
        db: &DatabaseConnection,
        schedule: class_schedule::Model,
        minutes_ago: i64,
    ) {
        let mut active: class_schedule::ActiveModel = schedule.into();
        active.cancelled_at = Set(Some(Utc::now() - Duration::minutes(minutes_ago)));
        active.update(db).await.unwrap();
    }

    #[tokio::test]
    async fn restores_only_past_the_expiry() {
        let db = setup_test_db().await;
        let schedule = seed_schedule(&db).await;
        let cancelled = set_holding(&db, schedule.id, false).await.unwrap();

        backdate_cancellation(&db, cancelled, 119).await;
        assert_eq!(auto_reset_cancelled_schedules(&db, 2).await, 0);

        let still_cancelled = class_schedule::Entity::find_by_id(schedule.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(!still_cancelled.is_holding);

        backdate_cancellation(&db, still_cancelled, 121).await;
        assert_eq!(auto_reset_cancelled_schedules(&db, 2).await, 1);

        let restored = class_schedule::Entity::find_by_id(schedule.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(restored.is_holding);
        assert!(restored.cancelled_at.is_none());
        assert!(!restored.student_reported_not_holding);
    }

    #[tokio::test]
    async fn purges_stale_votes_and_expired_flags() {
        let db = setup_test_db().await;
        let schedule = seed_schedule(&db).await;

        for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            cast_vote(
                &db,
                &VoteRequest {
                    schedule_id: schedule.id,
                    direction: VoteDirection::Cancellation,
                    ip_address: ip.to_string(),
                    user_agent: "ua".to_string(),
                },
                24,
            )
            .await
            .unwrap();
        }

        // age everything past the window
        let stale = Utc::now() - Duration::hours(25);
        for vote in cancellation_vote::Entity::find().all(&db).await.unwrap() {
            let mut active: cancellation_vote::ActiveModel = vote.into();
            active.voted_at = Set(stale);
            active.update(&db).await.unwrap();
        }
        let flagged = class_schedule::Entity::find_by_id(schedule.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(flagged.student_reported_not_holding);
        let mut active: class_schedule::ActiveModel = flagged.into();
        active.not_holding_reported_at = Set(Some(stale));
        active.update(&db).await.unwrap();

        let (purged, reset) = cleanup_old_votes(&db, 24).await;
        assert_eq!(purged, 3);
        assert_eq!(reset, 1);

        let cleared = class_schedule::Entity::find_by_id(schedule.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(!cleared.student_reported_not_holding);
        assert!(cleared.not_holding_reported_at.is_none());
    }

    #[tokio::test]
    async fn fresh_votes_survive_cleanup() {
        let db = setup_test_db().await;
        let schedule = seed_schedule(&db).await;
        cast_vote(
            &db,
            &VoteRequest {
                schedule_id: schedule.id,
                direction: VoteDirection::Confirmation,
                ip_address: "10.0.0.1".to_string(),
                user_agent: "ua".to_string(),
            },
            24,
        )
        .await
        .unwrap();

        let (purged, reset) = cleanup_old_votes(&db, 24).await;
        assert_eq!(purged, 0);
        assert_eq!(reset, 0);
    }
}
