//! Anonymous student voting on whether a class is actually being held.
//!
//! Voters are identified by a salted fingerprint of IP address and user
//! agent; no account is involved. Votes only drive the `student_reported_*`
//! advisory flags. The authoritative `is_holding` flag stays admin-only.

use chrono::{Duration, Utc};
use db::models::{cancellation_vote, class_schedule, confirmation_vote};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Votes needed within the window before an advisory flag flips.
pub const VOTE_THRESHOLD: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDirection {
    /// "This class is not being held."
    Cancellation,
    /// "This class is being held after all."
    Confirmation,
}

impl VoteDirection {
    /// Per-direction salt, so one fingerprint cannot be replayed across
    /// directions or correlated between the two vote tables.
    fn salt(self) -> &'static str {
        match self {
            VoteDirection::Cancellation => "cancellation",
            VoteDirection::Confirmation => "confirmation",
        }
    }
}

/// Anonymous fingerprint for one voter in one direction.
pub fn voter_identifier(ip: &str, user_agent: &str, direction: VoteDirection) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hasher.update(user_agent.as_bytes());
    hasher.update(direction.salt().as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct VoteRequest {
    pub schedule_id: i64,
    pub direction: VoteDirection,
    pub ip_address: String,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct VoteOutcome {
    pub already_voted: bool,
    pub cancellation_votes: u64,
    pub confirmation_votes: u64,
    pub reported_not_holding: bool,
    pub reported_holding: bool,
}

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("schedule {0} not found")]
    ScheduleNotFound(i64),
    #[error("schedule {0} is inactive and cannot be voted on")]
    ScheduleInactive(i64),
    #[error("database error: {0}")]
    Db(#[from] DbErr),
}

/// Records a vote and applies the window rules in one transaction.
///
/// Within the window a fingerprint counts once per direction. A new vote
/// nets out the oldest opposing vote still in the window. Both advisory
/// flags are then recomputed from the in-window counts: a flag is set while
/// its direction holds [`VOTE_THRESHOLD`] votes and cleared the moment
/// netting drops it below.
pub async fn cast_vote(
    db: &DatabaseConnection,
    request: &VoteRequest,
    window_hours: i64,
) -> Result<VoteOutcome, VoteError> {
    let txn = db.begin().await?;

    let schedule = class_schedule::Entity::find_by_id(request.schedule_id)
        .one(&txn)
        .await?
        .ok_or(VoteError::ScheduleNotFound(request.schedule_id))?;
    if !schedule.is_active {
        return Err(VoteError::ScheduleInactive(schedule.id));
    }

    let now = Utc::now();
    let cutoff = now - Duration::hours(window_hours);
    let voter = voter_identifier(&request.ip_address, &request.user_agent, request.direction);

    let already_voted = match request.direction {
        VoteDirection::Cancellation => {
            cancellation_vote::Entity::find()
                .filter(cancellation_vote::Column::ScheduleId.eq(schedule.id))
                .filter(cancellation_vote::Column::VoterIdentifier.eq(voter.as_str()))
                .filter(cancellation_vote::Column::VotedAt.gt(cutoff))
                .count(&txn)
                .await?
                > 0
        }
        VoteDirection::Confirmation => {
            confirmation_vote::Entity::find()
                .filter(confirmation_vote::Column::ScheduleId.eq(schedule.id))
                .filter(confirmation_vote::Column::VoterIdentifier.eq(voter.as_str()))
                .filter(confirmation_vote::Column::VotedAt.gt(cutoff))
                .count(&txn)
                .await?
                > 0
        }
    };

    if !already_voted {
        match request.direction {
            VoteDirection::Cancellation => {
                cancellation_vote::ActiveModel {
                    schedule_id: Set(schedule.id),
                    voter_identifier: Set(voter.clone()),
                    ip_address: Set(Some(request.ip_address.clone())),
                    voted_at: Set(now),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;

                // net out one opposing vote
                let opposing = confirmation_vote::Entity::find()
                    .filter(confirmation_vote::Column::ScheduleId.eq(schedule.id))
                    .filter(confirmation_vote::Column::VotedAt.gt(cutoff))
                    .order_by_asc(confirmation_vote::Column::VotedAt)
                    .one(&txn)
                    .await?;
                if let Some(vote) = opposing {
                    vote.delete(&txn).await?;
                }
            }
            VoteDirection::Confirmation => {
                confirmation_vote::ActiveModel {
                    schedule_id: Set(schedule.id),
                    voter_identifier: Set(voter.clone()),
                    ip_address: Set(Some(request.ip_address.clone())),
                    voted_at: Set(now),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;

                let opposing = cancellation_vote::Entity::find()
                    .filter(cancellation_vote::Column::ScheduleId.eq(schedule.id))
                    .filter(cancellation_vote::Column::VotedAt.gt(cutoff))
                    .order_by_asc(cancellation_vote::Column::VotedAt)
                    .one(&txn)
                    .await?;
                if let Some(vote) = opposing {
                    vote.delete(&txn).await?;
                }
            }
        }
    }

    let cancellation_votes = cancellation_vote::Entity::find()
        .filter(cancellation_vote::Column::ScheduleId.eq(schedule.id))
        .filter(cancellation_vote::Column::VotedAt.gt(cutoff))
        .count(&txn)
        .await?;
    let confirmation_votes = confirmation_vote::Entity::find()
        .filter(confirmation_vote::Column::ScheduleId.eq(schedule.id))
        .filter(confirmation_vote::Column::VotedAt.gt(cutoff))
        .count(&txn)
        .await?;

    let mut reported_not_holding = schedule.student_reported_not_holding;
    let mut reported_holding = schedule.student_reported_holding;

    let want_not_holding = cancellation_votes >= VOTE_THRESHOLD;
    let want_holding = confirmation_votes >= VOTE_THRESHOLD;
    if !already_voted
        && (want_not_holding != reported_not_holding || want_holding != reported_holding)
    {
        let first_report = want_not_holding && !reported_not_holding;
        let mut active: class_schedule::ActiveModel = schedule.into();
        active.student_reported_not_holding = Set(want_not_holding);
        active.student_reported_holding = Set(want_holding);
        if first_report {
            active.not_holding_reported_at = Set(Some(now));
        } else if !want_not_holding {
            active.not_holding_reported_at = Set(None);
        }
        active.updated_at = Set(now);
        active.update(&txn).await?;
        reported_not_holding = want_not_holding;
        reported_holding = want_holding;
    }

    txn.commit().await?;
    Ok(VoteOutcome {
        already_voted,
        cancellation_votes,
        confirmation_votes,
        reported_not_holding,
        reported_holding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule_service::{create_schedule, ScheduleInput};
    use crate::test_support::{seed_base, time};
    use db::models::class_schedule::DayOfWeek;
    use db::test_utils::setup_test_db;

    const UA: &str = "Mozilla/5.0 (X11; Linux x86_64)";

    async fn seed_schedule(db: &sea_orm::DatabaseConnection) -> class_schedule::Model {
        let base = seed_base(db).await;
        create_schedule(
            db,
            ScheduleInput {
                course_id: base.course.id,
                room_id: base.room.id,
                teacher_id: Some(base.teacher.id),
                day_of_week: DayOfWeek::Sunday,
                start_time: Some(time("08:00")),
                end_time: Some(time("10:00")),
                time_slot: None,
                semester: "اول".to_string(),
                academic_year: "1404-1405".to_string(),
                notes: None,
            },
        )
        .await
        .unwrap()
    }

    fn request(schedule_id: i64, direction: VoteDirection, ip: &str) -> VoteRequest {
        VoteRequest {
            schedule_id,
            direction,
            ip_address: ip.to_string(),
            user_agent: UA.to_string(),
        }
    }

    #[test]
    fn fingerprints_differ_per_direction() {
        let a = voter_identifier("10.0.0.1", UA, VoteDirection::Cancellation);
        let b = voter_identifier("10.0.0.1", UA, VoteDirection::Confirmation);
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn flag_flips_at_threshold_not_before() {
        let db = setup_test_db().await;
        let schedule = seed_schedule(&db).await;

        for ip in ["10.0.0.1", "10.0.0.2"] {
            let out = cast_vote(&db, &request(schedule.id, VoteDirection::Cancellation, ip), 24)
                .await
                .unwrap();
            assert!(!out.reported_not_holding);
        }

        let out = cast_vote(
            &db,
            &request(schedule.id, VoteDirection::Cancellation, "10.0.0.3"),
            24,
        )
        .await
        .unwrap();
        assert_eq!(out.cancellation_votes, 3);
        assert!(out.reported_not_holding);

        let stored = class_schedule::Entity::find_by_id(schedule.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.student_reported_not_holding);
        assert!(stored.not_holding_reported_at.is_some());
        // votes never touch the admin flag
        assert!(stored.is_holding);
    }

    #[tokio::test]
    async fn repeat_vote_in_window_is_rejected() {
        let db = setup_test_db().await;
        let schedule = seed_schedule(&db).await;

        let first = cast_vote(
            &db,
            &request(schedule.id, VoteDirection::Cancellation, "10.0.0.1"),
            24,
        )
        .await
        .unwrap();
        assert!(!first.already_voted);
        assert_eq!(first.cancellation_votes, 1);

        let second = cast_vote(
            &db,
            &request(schedule.id, VoteDirection::Cancellation, "10.0.0.1"),
            24,
        )
        .await
        .unwrap();
        assert!(second.already_voted);
        assert_eq!(second.cancellation_votes, 1);
    }

    #[tokio::test]
    async fn opposing_vote_nets_out_oldest() {
        let db = setup_test_db().await;
        let schedule = seed_schedule(&db).await;

        cast_vote(&db, &request(schedule.id, VoteDirection::Cancellation, "10.0.0.1"), 24)
            .await
            .unwrap();
        cast_vote(&db, &request(schedule.id, VoteDirection::Cancellation, "10.0.0.2"), 24)
            .await
            .unwrap();

        let out = cast_vote(
            &db,
            &request(schedule.id, VoteDirection::Confirmation, "10.0.0.9"),
            24,
        )
        .await
        .unwrap();
        assert_eq!(out.cancellation_votes, 1);
        assert_eq!(out.confirmation_votes, 1);

        // the oldest cancellation vote is the one that was removed
        let remaining = cancellation_vote::Entity::find()
            .filter(cancellation_vote::Column::ScheduleId.eq(schedule.id))
            .all(&db)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(
            remaining[0].voter_identifier,
            voter_identifier("10.0.0.2", UA, VoteDirection::Cancellation)
        );
    }

    #[tokio::test]
    async fn flag_drops_as_soon_as_netting_falls_below_threshold() {
        let db = setup_test_db().await;
        let schedule = seed_schedule(&db).await;

        for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            cast_vote(&db, &request(schedule.id, VoteDirection::Cancellation, ip), 24)
                .await
                .unwrap();
        }

        // one confirmation nets a cancellation out: 2 < threshold, flag off
        let out = cast_vote(
            &db,
            &request(schedule.id, VoteDirection::Confirmation, "10.1.0.1"),
            24,
        )
        .await
        .unwrap();
        assert_eq!(out.cancellation_votes, 2);
        assert!(!out.reported_not_holding);
        assert!(!out.reported_holding);

        let stored = class_schedule::Entity::find_by_id(schedule.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.student_reported_not_holding);
        assert!(stored.not_holding_reported_at.is_none());
    }

    #[tokio::test]
    async fn confirmation_threshold_clears_not_holding_report() {
        let db = setup_test_db().await;
        let schedule = seed_schedule(&db).await;

        for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            cast_vote(&db, &request(schedule.id, VoteDirection::Cancellation, ip), 24)
                .await
                .unwrap();
        }
        // confirmations both net out cancellations and flip the flag back
        for ip in ["10.1.0.1", "10.1.0.2", "10.1.0.3"] {
            cast_vote(&db, &request(schedule.id, VoteDirection::Confirmation, ip), 24)
                .await
                .unwrap();
        }

        let stored = class_schedule::Entity::find_by_id(schedule.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.student_reported_holding);
        assert!(!stored.student_reported_not_holding);
        assert!(stored.not_holding_reported_at.is_none());
    }

    #[tokio::test]
    async fn inactive_schedule_rejects_votes() {
        let db = setup_test_db().await;
        let schedule = seed_schedule(&db).await;
        crate::schedule_service::deactivate_schedule(&db, schedule.id)
            .await
            .unwrap();

        match cast_vote(&db, &request(schedule.id, VoteDirection::Cancellation, "10.0.0.1"), 24).await {
            Err(VoteError::ScheduleInactive(id)) => assert_eq!(id, schedule.id),
            other => panic!("expected inactive error, got {other:?}"),
        }
    }
}
