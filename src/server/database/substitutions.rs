//! Cover requests, their invitations and the substitution history.
//!
//! Every multi-row transition runs in one transaction. Status changes are
//! decided by [`crate::substitution`] and written with `WHERE status = ...`
//! guards; a guard that matches no row means a concurrent caller got there
//! first, and the transaction is rolled back by dropping it.
//!
//! The first statement of each workflow transaction is a no-op write to the
//! request row. SQLite then holds its write lock before anything is read
//! (a read-first transaction cannot upgrade and fails with `SQLITE_BUSY`), and
//! Postgres holds the row lock. Callers racing on one request are serialized
//! and the loser reads the winner's committed state.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use sqlx::FromRow;
use tracing::warn;

use super::{new_id, query_failed, Database, Page};
use crate::errors::{StaffroomError, StaffroomResult};
use crate::schedule::TimeWindow;
use crate::substitution::{
    HistoryOutcome, InvitationAction, InvitationStatus, RequestAction, RequestStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct SubstitutionRequest {
    pub id: String,
    pub requester_id: String,
    pub department_id: Option<String>,
    pub timetable_entry_id: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub reason: Option<String>,
    pub status: String,
    pub substitute_id: Option<String>,
    pub accepted_invitation_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub closed_at: Option<NaiveDateTime>,
}

impl SubstitutionRequest {
    pub fn status(&self) -> StaffroomResult<RequestStatus> {
        self.status.parse()
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Invitation {
    pub id: String,
    pub request_id: String,
    pub candidate_id: String,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub responded_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

impl Invitation {
    pub fn status(&self) -> StaffroomResult<InvitationStatus> {
        self.status.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct HistoryRecord {
    pub id: String,
    pub request_id: String,
    pub invitation_id: String,
    pub substitute_id: String,
    pub requester_id: String,
    pub date: NaiveDate,
    pub outcome: String,
    pub recorded_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub requester_id: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Result of a successful acceptance.
#[derive(Debug, Clone)]
pub struct AcceptOutcome {
    pub request: SubstitutionRequest,
    pub invitation: Invitation,
    /// Candidates whose pending invitations were disabled.
    pub disabled_candidates: Vec<String>,
}

/// Result of an accepted substitute dropping out.
#[derive(Debug, Clone)]
pub struct DropOutcome {
    pub request: SubstitutionRequest,
    pub invitation: Invitation,
    /// Candidates whose invitations went back to pending.
    pub reactivated_candidates: Vec<String>,
}

/// Result of cancelling a request.
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub request: SubstitutionRequest,
    /// Candidates that were still pending or accepted.
    pub affected_candidates: Vec<String>,
}

const LOCK_REQUEST: &str =
    "UPDATE substitution_requests SET updated_at = updated_at WHERE id = $1";

const LOCK_REQUEST_OF_INVITATION: &str = "UPDATE substitution_requests SET updated_at = updated_at
     WHERE id = (SELECT request_id FROM substitution_invitations WHERE id = $1)";

fn guard_lost(what: &str, id: &str) -> StaffroomError {
    StaffroomError::Conflict(format!("{what} {id} was changed concurrently"))
}

impl Database {
    /// Insert an open request and one pending invitation per candidate.
    pub async fn create_request_with_invitations(
        &self,
        request: &SubstitutionRequest,
        candidate_ids: &[String],
    ) -> StaffroomResult<Vec<Invitation>> {
        let invitations: Vec<Invitation> = candidate_ids
            .iter()
            .map(|candidate_id| Invitation {
                id: new_id(),
                request_id: request.id.clone(),
                candidate_id: candidate_id.clone(),
                status: InvitationStatus::Pending.to_string(),
                created_at: request.created_at,
                responded_at: None,
                updated_at: request.created_at,
            })
            .collect();

        with_pool!(self, pool => {
            let mut tx = pool.begin().await.map_err(query_failed("begin create_request"))?;

            sqlx::query(
                "INSERT INTO substitution_requests
                    (id, requester_id, department_id, timetable_entry_id, date, start_time, end_time,
                     reason, status, substitute_id, accepted_invitation_id, created_by,
                     created_at, updated_at, closed_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
            )
            .bind(&request.id)
            .bind(&request.requester_id)
            .bind(&request.department_id)
            .bind(&request.timetable_entry_id)
            .bind(request.date)
            .bind(request.start_time)
            .bind(request.end_time)
            .bind(&request.reason)
            .bind(&request.status)
            .bind(&request.substitute_id)
            .bind(&request.accepted_invitation_id)
            .bind(&request.created_by)
            .bind(request.created_at)
            .bind(request.updated_at)
            .bind(request.closed_at)
            .execute(&mut *tx)
            .await
            .map_err(query_failed("insert_substitution_request"))?;

            for invitation in &invitations {
                sqlx::query(
                    "INSERT INTO substitution_invitations
                        (id, request_id, candidate_id, status, created_at, responded_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(&invitation.id)
                .bind(&invitation.request_id)
                .bind(&invitation.candidate_id)
                .bind(&invitation.status)
                .bind(invitation.created_at)
                .bind(invitation.responded_at)
                .bind(invitation.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(query_failed("insert_invitation"))?;
            }

            tx.commit().await.map_err(query_failed("commit create_request"))?;
        });

        Ok(invitations)
    }

    pub async fn get_request(&self, id: &str) -> StaffroomResult<Option<SubstitutionRequest>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, SubstitutionRequest>(
                "SELECT * FROM substitution_requests WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(query_failed("get_request"))
        })
    }

    /// Most recent cover date first.
    pub async fn list_requests(
        &self,
        filter: &RequestFilter,
        page: Page,
    ) -> StaffroomResult<(Vec<SubstitutionRequest>, i64)> {
        let status = filter.status.map(|s| s.as_str());

        with_pool!(self, pool => {
            let items = sqlx::query_as::<_, SubstitutionRequest>(
                "SELECT * FROM substitution_requests
                 WHERE ($1 IS NULL OR status = $1)
                   AND ($2 IS NULL OR requester_id = $2)
                   AND ($3 IS NULL OR date = $3)
                 ORDER BY date DESC, start_time, id
                 LIMIT $4 OFFSET $5",
            )
            .bind(status)
            .bind(&filter.requester_id)
            .bind(filter.date)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
            .map_err(query_failed("list_requests"))?;

            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM substitution_requests
                 WHERE ($1 IS NULL OR status = $1)
                   AND ($2 IS NULL OR requester_id = $2)
                   AND ($3 IS NULL OR date = $3)",
            )
            .bind(status)
            .bind(&filter.requester_id)
            .bind(filter.date)
            .fetch_one(pool)
            .await
            .map_err(query_failed("count_requests"))?;

            Ok((items, total))
        })
    }

    pub async fn list_invitations_for_request(
        &self,
        request_id: &str,
    ) -> StaffroomResult<Vec<Invitation>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, Invitation>(
                "SELECT * FROM substitution_invitations WHERE request_id = $1 ORDER BY created_at, id",
            )
            .bind(request_id)
            .fetch_all(pool)
            .await
            .map_err(query_failed("list_invitations_for_request"))
        })
    }

    pub async fn get_invitation(&self, id: &str) -> StaffroomResult<Option<Invitation>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, Invitation>("SELECT * FROM substitution_invitations WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(query_failed("get_invitation"))
        })
    }

    /// Invitations across requests, newest first.
    pub async fn list_invitations(
        &self,
        candidate_id: Option<&str>,
        status: Option<InvitationStatus>,
        page: Page,
    ) -> StaffroomResult<(Vec<Invitation>, i64)> {
        let status = status.map(|s| s.as_str());

        with_pool!(self, pool => {
            let items = sqlx::query_as::<_, Invitation>(
                "SELECT * FROM substitution_invitations
                 WHERE ($1 IS NULL OR candidate_id = $1)
                   AND ($2 IS NULL OR status = $2)
                 ORDER BY created_at DESC, id
                 LIMIT $3 OFFSET $4",
            )
            .bind(candidate_id)
            .bind(status)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
            .map_err(query_failed("list_invitations"))?;

            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM substitution_invitations
                 WHERE ($1 IS NULL OR candidate_id = $1)
                   AND ($2 IS NULL OR status = $2)",
            )
            .bind(candidate_id)
            .bind(status)
            .fetch_one(pool)
            .await
            .map_err(query_failed("count_invitations"))?;

            Ok((items, total))
        })
    }

    /// Invite more candidates to an open request.
    ///
    /// Candidates that already hold an invitation are skipped. The total
    /// number of invitations on the request may not exceed `max_candidates`.
    pub async fn add_invitations(
        &self,
        request_id: &str,
        candidate_ids: &[String],
        max_candidates: u32,
        at: NaiveDateTime,
    ) -> StaffroomResult<Vec<Invitation>> {
        with_pool!(self, pool => {
            let mut tx = pool.begin().await.map_err(query_failed("begin add_invitations"))?;

            sqlx::query(LOCK_REQUEST)
                .bind(request_id)
                .execute(&mut *tx)
                .await
                .map_err(query_failed("lock_request"))?;

            let request = sqlx::query_as::<_, SubstitutionRequest>(
                "SELECT * FROM substitution_requests WHERE id = $1",
            )
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_failed("get_request"))?
            .ok_or_else(|| StaffroomError::NotFound(format!("substitution request {request_id}")))?;

            request.status()?.apply(RequestAction::Invite)?;

            let existing: Vec<String> = sqlx::query_scalar(
                "SELECT candidate_id FROM substitution_invitations WHERE request_id = $1",
            )
            .bind(request_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(query_failed("list_invited_candidates"))?;

            let fresh: Vec<&String> = candidate_ids
                .iter()
                .filter(|c| !existing.contains(*c))
                .collect();

            if existing.len() + fresh.len() > max_candidates as usize {
                return Err(StaffroomError::InvalidInput(format!(
                    "a request may have at most {max_candidates} invitations ({} already sent)",
                    existing.len()
                )));
            }

            let mut created = Vec::with_capacity(fresh.len());
            for candidate_id in fresh {
                let invitation = Invitation {
                    id: new_id(),
                    request_id: request_id.to_string(),
                    candidate_id: candidate_id.clone(),
                    status: InvitationStatus::Pending.to_string(),
                    created_at: at,
                    responded_at: None,
                    updated_at: at,
                };
                sqlx::query(
                    "INSERT INTO substitution_invitations
                        (id, request_id, candidate_id, status, created_at, responded_at, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(&invitation.id)
                .bind(&invitation.request_id)
                .bind(&invitation.candidate_id)
                .bind(&invitation.status)
                .bind(invitation.created_at)
                .bind(invitation.responded_at)
                .bind(invitation.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(query_failed("insert_invitation"))?;
                created.push(invitation);
            }

            tx.commit().await.map_err(query_failed("commit add_invitations"))?;
            Ok(created)
        })
    }

    /// Accept an invitation. Exactly one acceptance per request can win.
    pub async fn accept_invitation(
        &self,
        invitation_id: &str,
        at: NaiveDateTime,
    ) -> StaffroomResult<AcceptOutcome> {
        with_pool!(self, pool => {
            let mut tx = pool.begin().await.map_err(query_failed("begin accept_invitation"))?;

            sqlx::query(LOCK_REQUEST_OF_INVITATION)
                .bind(invitation_id)
                .execute(&mut *tx)
                .await
                .map_err(query_failed("lock_request"))?;

            let invitation = sqlx::query_as::<_, Invitation>(
                "SELECT * FROM substitution_invitations WHERE id = $1",
            )
            .bind(invitation_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_failed("get_invitation"))?
            .ok_or_else(|| StaffroomError::NotFound(format!("invitation {invitation_id}")))?;

            let request = sqlx::query_as::<_, SubstitutionRequest>(
                "SELECT * FROM substitution_requests WHERE id = $1",
            )
            .bind(&invitation.request_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_failed("get_request"))?;

            let request_status = request.status()?;
            if request_status == RequestStatus::Filled {
                return Err(StaffroomError::AlreadyFilled(format!(
                    "request {} already has a substitute",
                    request.id
                )));
            }
            let filled_status = request_status.apply(RequestAction::Fill)?;
            let invitation_status = invitation.status()?;
            let accepted_status = invitation_status.apply(InvitationAction::Accept)?;
            let pending = InvitationStatus::Pending;
            let disabled = pending.apply(InvitationAction::Disable)?;

            let filled = sqlx::query(
                "UPDATE substitution_requests
                 SET status = $5, substitute_id = $2, accepted_invitation_id = $3, updated_at = $4
                 WHERE id = $1 AND status = $6",
            )
            .bind(&request.id)
            .bind(&invitation.candidate_id)
            .bind(&invitation.id)
            .bind(at)
            .bind(filled_status.as_str())
            .bind(request_status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_failed("fill_request"))?
            .rows_affected();

            if filled == 0 {
                return Err(StaffroomError::AlreadyFilled(format!(
                    "request {} already has a substitute",
                    request.id
                )));
            }

            let accepted = sqlx::query(
                "UPDATE substitution_invitations
                 SET status = $3, responded_at = $2, updated_at = $2
                 WHERE id = $1 AND status = $4",
            )
            .bind(&invitation.id)
            .bind(at)
            .bind(accepted_status.as_str())
            .bind(invitation_status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_failed("accept_invitation"))?
            .rows_affected();

            if accepted == 0 {
                return Err(guard_lost("invitation", &invitation.id));
            }

            let disabled_candidates: Vec<String> = sqlx::query_scalar(
                "SELECT candidate_id FROM substitution_invitations
                 WHERE request_id = $1 AND id <> $2 AND status = $3",
            )
            .bind(&request.id)
            .bind(&invitation.id)
            .bind(pending.as_str())
            .fetch_all(&mut *tx)
            .await
            .map_err(query_failed("list_pending_invitations"))?;

            sqlx::query(
                "UPDATE substitution_invitations SET status = $4, updated_at = $3
                 WHERE request_id = $1 AND id <> $2 AND status = $5",
            )
            .bind(&request.id)
            .bind(&invitation.id)
            .bind(at)
            .bind(disabled.as_str())
            .bind(pending.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_failed("disable_pending_invitations"))?;

            let request = sqlx::query_as::<_, SubstitutionRequest>(
                "SELECT * FROM substitution_requests WHERE id = $1",
            )
            .bind(&request.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_failed("get_request"))?;

            let invitation = sqlx::query_as::<_, Invitation>(
                "SELECT * FROM substitution_invitations WHERE id = $1",
            )
            .bind(&invitation.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_failed("get_invitation"))?;

            tx.commit().await.map_err(query_failed("commit accept_invitation"))?;

            Ok(AcceptOutcome {
                request,
                invitation,
                disabled_candidates,
            })
        })
    }

    /// Decline a pending invitation. Also returns the request and how many
    /// invitations are still pending on it.
    pub async fn decline_invitation(
        &self,
        invitation_id: &str,
        at: NaiveDateTime,
    ) -> StaffroomResult<(Invitation, SubstitutionRequest, i64)> {
        with_pool!(self, pool => {
            let mut tx = pool.begin().await.map_err(query_failed("begin decline_invitation"))?;

            sqlx::query(LOCK_REQUEST_OF_INVITATION)
                .bind(invitation_id)
                .execute(&mut *tx)
                .await
                .map_err(query_failed("lock_request"))?;

            let invitation = sqlx::query_as::<_, Invitation>(
                "SELECT * FROM substitution_invitations WHERE id = $1",
            )
            .bind(invitation_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_failed("get_invitation"))?
            .ok_or_else(|| StaffroomError::NotFound(format!("invitation {invitation_id}")))?;

            let current = invitation.status()?;
            let next = current.apply(InvitationAction::Decline)?;

            let declined = sqlx::query(
                "UPDATE substitution_invitations
                 SET status = $3, responded_at = $2, updated_at = $2
                 WHERE id = $1 AND status = $4",
            )
            .bind(&invitation.id)
            .bind(at)
            .bind(next.as_str())
            .bind(current.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_failed("decline_invitation"))?
            .rows_affected();

            if declined == 0 {
                return Err(guard_lost("invitation", &invitation.id));
            }

            let still_pending: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM substitution_invitations WHERE request_id = $1 AND status = $2",
            )
            .bind(&invitation.request_id)
            .bind(InvitationStatus::Pending.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(query_failed("count_pending_invitations"))?;

            let request = sqlx::query_as::<_, SubstitutionRequest>(
                "SELECT * FROM substitution_requests WHERE id = $1",
            )
            .bind(&invitation.request_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_failed("get_request"))?;

            let invitation = sqlx::query_as::<_, Invitation>(
                "SELECT * FROM substitution_invitations WHERE id = $1",
            )
            .bind(&invitation.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_failed("get_invitation"))?;

            tx.commit().await.map_err(query_failed("commit decline_invitation"))?;
            Ok((invitation, request, still_pending))
        })
    }

    /// The accepted substitute drops out and the request reopens.
    ///
    /// With `reactivate`, invitations disabled by the original acceptance go
    /// back to pending.
    pub async fn drop_invitation(
        &self,
        invitation_id: &str,
        reactivate: bool,
        at: NaiveDateTime,
    ) -> StaffroomResult<DropOutcome> {
        with_pool!(self, pool => {
            let mut tx = pool.begin().await.map_err(query_failed("begin drop_invitation"))?;

            sqlx::query(LOCK_REQUEST_OF_INVITATION)
                .bind(invitation_id)
                .execute(&mut *tx)
                .await
                .map_err(query_failed("lock_request"))?;

            let invitation = sqlx::query_as::<_, Invitation>(
                "SELECT * FROM substitution_invitations WHERE id = $1",
            )
            .bind(invitation_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_failed("get_invitation"))?
            .ok_or_else(|| StaffroomError::NotFound(format!("invitation {invitation_id}")))?;

            let request = sqlx::query_as::<_, SubstitutionRequest>(
                "SELECT * FROM substitution_requests WHERE id = $1",
            )
            .bind(&invitation.request_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_failed("get_request"))?;

            let invitation_status = invitation.status()?;
            let dropped_status = invitation_status.apply(InvitationAction::Drop)?;
            let request_status = request.status()?;
            let reopened_status = request_status.apply(RequestAction::Reopen)?;

            let dropped = sqlx::query(
                "UPDATE substitution_invitations
                 SET status = $3, responded_at = $2, updated_at = $2
                 WHERE id = $1 AND status = $4",
            )
            .bind(&invitation.id)
            .bind(at)
            .bind(dropped_status.as_str())
            .bind(invitation_status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_failed("drop_invitation"))?
            .rows_affected();

            if dropped == 0 {
                return Err(guard_lost("invitation", &invitation.id));
            }

            let reopened = sqlx::query(
                "UPDATE substitution_requests
                 SET status = $4, substitute_id = NULL, accepted_invitation_id = NULL, updated_at = $3
                 WHERE id = $1 AND status = $5 AND accepted_invitation_id = $2",
            )
            .bind(&request.id)
            .bind(&invitation.id)
            .bind(at)
            .bind(reopened_status.as_str())
            .bind(request_status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_failed("reopen_request"))?
            .rows_affected();

            if reopened == 0 {
                return Err(guard_lost("substitution request", &request.id));
            }

            let mut reactivated_candidates = Vec::new();
            if reactivate {
                let disabled = InvitationStatus::Disabled;
                let pending = disabled.apply(InvitationAction::Reactivate)?;

                reactivated_candidates = sqlx::query_scalar(
                    "SELECT candidate_id FROM substitution_invitations
                     WHERE request_id = $1 AND status = $2",
                )
                .bind(&request.id)
                .bind(disabled.as_str())
                .fetch_all(&mut *tx)
                .await
                .map_err(query_failed("list_disabled_invitations"))?;

                sqlx::query(
                    "UPDATE substitution_invitations SET status = $3, updated_at = $2
                     WHERE request_id = $1 AND status = $4",
                )
                .bind(&request.id)
                .bind(at)
                .bind(pending.as_str())
                .bind(disabled.as_str())
                .execute(&mut *tx)
                .await
                .map_err(query_failed("reactivate_invitations"))?;
            }

            let request = sqlx::query_as::<_, SubstitutionRequest>(
                "SELECT * FROM substitution_requests WHERE id = $1",
            )
            .bind(&request.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_failed("get_request"))?;

            let invitation = sqlx::query_as::<_, Invitation>(
                "SELECT * FROM substitution_invitations WHERE id = $1",
            )
            .bind(&invitation.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_failed("get_invitation"))?;

            tx.commit().await.map_err(query_failed("commit drop_invitation"))?;

            Ok(DropOutcome {
                request,
                invitation,
                reactivated_candidates,
            })
        })
    }

    /// Cancel an open or filled request and disable its live invitations.
    pub async fn cancel_request(
        &self,
        request_id: &str,
        at: NaiveDateTime,
    ) -> StaffroomResult<CancelOutcome> {
        with_pool!(self, pool => {
            let mut tx = pool.begin().await.map_err(query_failed("begin cancel_request"))?;

            sqlx::query(LOCK_REQUEST)
                .bind(request_id)
                .execute(&mut *tx)
                .await
                .map_err(query_failed("lock_request"))?;

            let request = sqlx::query_as::<_, SubstitutionRequest>(
                "SELECT * FROM substitution_requests WHERE id = $1",
            )
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_failed("get_request"))?
            .ok_or_else(|| StaffroomError::NotFound(format!("substitution request {request_id}")))?;

            let current = request.status()?;
            let next = current.apply(RequestAction::Cancel)?;

            let cancelled = sqlx::query(
                "UPDATE substitution_requests SET status = $4, updated_at = $3, closed_at = $3
                 WHERE id = $1 AND status = $2",
            )
            .bind(&request.id)
            .bind(current.as_str())
            .bind(at)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_failed("cancel_request"))?
            .rows_affected();

            if cancelled == 0 {
                return Err(guard_lost("substitution request", &request.id));
            }

            let mut affected_candidates = Vec::new();
            for live in InvitationStatus::ALL.iter().filter(|s| s.is_live()) {
                let disabled = live.apply(InvitationAction::Disable)?;

                let candidates: Vec<String> = sqlx::query_scalar(
                    "SELECT candidate_id FROM substitution_invitations
                     WHERE request_id = $1 AND status = $2 ORDER BY created_at, id",
                )
                .bind(&request.id)
                .bind(live.as_str())
                .fetch_all(&mut *tx)
                .await
                .map_err(query_failed("list_live_invitations"))?;

                sqlx::query(
                    "UPDATE substitution_invitations SET status = $3, updated_at = $2
                     WHERE request_id = $1 AND status = $4",
                )
                .bind(&request.id)
                .bind(at)
                .bind(disabled.as_str())
                .bind(live.as_str())
                .execute(&mut *tx)
                .await
                .map_err(query_failed("disable_live_invitations"))?;

                affected_candidates.extend(candidates);
            }

            let request = sqlx::query_as::<_, SubstitutionRequest>(
                "SELECT * FROM substitution_requests WHERE id = $1",
            )
            .bind(&request.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_failed("get_request"))?;

            tx.commit().await.map_err(query_failed("commit cancel_request"))?;

            Ok(CancelOutcome {
                request,
                affected_candidates,
            })
        })
    }

    /// Close a filled request with the substitute's outcome and record it in
    /// the history.
    pub async fn close_request(
        &self,
        request_id: &str,
        outcome: HistoryOutcome,
        at: NaiveDateTime,
    ) -> StaffroomResult<(SubstitutionRequest, HistoryRecord)> {
        with_pool!(self, pool => {
            let mut tx = pool.begin().await.map_err(query_failed("begin close_request"))?;

            sqlx::query(LOCK_REQUEST)
                .bind(request_id)
                .execute(&mut *tx)
                .await
                .map_err(query_failed("lock_request"))?;

            let request = sqlx::query_as::<_, SubstitutionRequest>(
                "SELECT * FROM substitution_requests WHERE id = $1",
            )
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_failed("get_request"))?
            .ok_or_else(|| StaffroomError::NotFound(format!("substitution request {request_id}")))?;

            let request_status = request.status()?;
            let closed_status = request_status.apply(RequestAction::Close)?;

            let (Some(invitation_id), Some(substitute_id)) =
                (request.accepted_invitation_id.clone(), request.substitute_id.clone())
            else {
                return Err(StaffroomError::ServerError(format!(
                    "filled request {} has no accepted invitation",
                    request.id
                )));
            };

            let invitation = sqlx::query_as::<_, Invitation>(
                "SELECT * FROM substitution_invitations WHERE id = $1",
            )
            .bind(&invitation_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_failed("get_invitation"))?;

            let invitation_status = invitation.status()?;
            let next = invitation_status.apply(outcome.invitation_action())?;

            let closed = sqlx::query(
                "UPDATE substitution_requests SET status = $3, updated_at = $2, closed_at = $2
                 WHERE id = $1 AND status = $4",
            )
            .bind(&request.id)
            .bind(at)
            .bind(closed_status.as_str())
            .bind(request_status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_failed("close_request"))?
            .rows_affected();

            if closed == 0 {
                return Err(guard_lost("substitution request", &request.id));
            }

            let finished = sqlx::query(
                "UPDATE substitution_invitations SET status = $2, updated_at = $3
                 WHERE id = $1 AND status = $4",
            )
            .bind(&invitation.id)
            .bind(next.as_str())
            .bind(at)
            .bind(invitation_status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_failed("finish_invitation"))?
            .rows_affected();

            if finished == 0 {
                return Err(guard_lost("invitation", &invitation.id));
            }

            let record = HistoryRecord {
                id: new_id(),
                request_id: request.id.clone(),
                invitation_id: invitation.id.clone(),
                substitute_id,
                requester_id: request.requester_id.clone(),
                date: request.date,
                outcome: outcome.to_string(),
                recorded_at: at,
            };

            sqlx::query(
                "INSERT INTO substitution_history
                    (id, request_id, invitation_id, substitute_id, requester_id, date, outcome, recorded_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(&record.id)
            .bind(&record.request_id)
            .bind(&record.invitation_id)
            .bind(&record.substitute_id)
            .bind(&record.requester_id)
            .bind(record.date)
            .bind(&record.outcome)
            .bind(record.recorded_at)
            .execute(&mut *tx)
            .await
            .map_err(query_failed("insert_history"))?;

            let request = sqlx::query_as::<_, SubstitutionRequest>(
                "SELECT * FROM substitution_requests WHERE id = $1",
            )
            .bind(&request.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(query_failed("get_request"))?;

            tx.commit().await.map_err(query_failed("commit close_request"))?;
            Ok((request, record))
        })
    }

    /// Ids of requests in `status` whose cover date is before `before`.
    pub async fn request_ids_before(
        &self,
        status: RequestStatus,
        before: NaiveDate,
    ) -> StaffroomResult<Vec<String>> {
        with_pool!(self, pool => {
            sqlx::query_scalar(
                "SELECT id FROM substitution_requests WHERE status = $1 AND date < $2 ORDER BY date, id",
            )
            .bind(status.as_str())
            .bind(before)
            .fetch_all(pool)
            .await
            .map_err(query_failed("request_ids_before"))
        })
    }

    /// Expire one open request and disable its pending invitations.
    /// Returns false when the request was no longer open.
    pub async fn expire_request(&self, request_id: &str, at: NaiveDateTime) -> StaffroomResult<bool> {
        with_pool!(self, pool => {
            let open = RequestStatus::Open;
            let expired_status = open.apply(RequestAction::Expire)?;
            let pending = InvitationStatus::Pending;
            let disabled = pending.apply(InvitationAction::Disable)?;

            let mut tx = pool.begin().await.map_err(query_failed("begin expire_request"))?;

            let expired = sqlx::query(
                "UPDATE substitution_requests SET status = $3, updated_at = $2, closed_at = $2
                 WHERE id = $1 AND status = $4",
            )
            .bind(request_id)
            .bind(at)
            .bind(expired_status.as_str())
            .bind(open.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_failed("expire_request"))?
            .rows_affected();

            if expired == 0 {
                return Ok(false);
            }

            sqlx::query(
                "UPDATE substitution_invitations SET status = $3, updated_at = $2
                 WHERE request_id = $1 AND status = $4",
            )
            .bind(request_id)
            .bind(at)
            .bind(disabled.as_str())
            .bind(pending.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_failed("disable_pending_invitations"))?;

            tx.commit().await.map_err(query_failed("commit expire_request"))?;
            Ok(true)
        })
    }

    /// Expire every open request dated before `before`.
    pub async fn expire_open_requests(
        &self,
        before: NaiveDate,
        at: NaiveDateTime,
    ) -> StaffroomResult<u64> {
        let mut count = 0;
        for id in self.request_ids_before(RequestStatus::Open, before).await? {
            if self.expire_request(&id, at).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Close every filled request dated before `before` as completed.
    pub async fn rollover_filled_requests(
        &self,
        before: NaiveDate,
        at: NaiveDateTime,
    ) -> StaffroomResult<u64> {
        let mut count = 0;
        for id in self.request_ids_before(RequestStatus::Filled, before).await? {
            match self.close_request(&id, HistoryOutcome::Completed, at).await {
                Ok(_) => count += 1,
                Err(e @ (StaffroomError::InvalidTransition(_) | StaffroomError::Conflict(_))) => {
                    warn!("Skipping rollover of request {id}: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(count)
    }

    /// Most recent first.
    pub async fn list_history(
        &self,
        substitute_id: Option<&str>,
        outcome: Option<HistoryOutcome>,
        page: Page,
    ) -> StaffroomResult<(Vec<HistoryRecord>, i64)> {
        let outcome = outcome.map(|o| o.as_str());

        with_pool!(self, pool => {
            let items = sqlx::query_as::<_, HistoryRecord>(
                "SELECT * FROM substitution_history
                 WHERE ($1 IS NULL OR substitute_id = $1)
                   AND ($2 IS NULL OR outcome = $2)
                 ORDER BY date DESC, recorded_at DESC, id
                 LIMIT $3 OFFSET $4",
            )
            .bind(substitute_id)
            .bind(outcome)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
            .map_err(query_failed("list_history"))?;

            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM substitution_history
                 WHERE ($1 IS NULL OR substitute_id = $1)
                   AND ($2 IS NULL OR outcome = $2)",
            )
            .bind(substitute_id)
            .bind(outcome)
            .fetch_one(pool)
            .await
            .map_err(query_failed("count_history"))?;

            Ok((items, total))
        })
    }

    /// `(completed, no_shows)` for one substitute.
    pub async fn substitution_counts(&self, staff_id: &str) -> StaffroomResult<(i64, i64)> {
        let rows: Vec<(String, i64)> = with_pool!(self, pool => {
            sqlx::query_as(
                "SELECT outcome, COUNT(*) FROM substitution_history
                 WHERE substitute_id = $1 GROUP BY outcome",
            )
            .bind(staff_id)
            .fetch_all(pool)
            .await
            .map_err(query_failed("substitution_counts"))?
        });

        let mut counts = (0, 0);
        for (outcome, count) in rows {
            match outcome.parse()? {
                HistoryOutcome::Completed => counts.0 = count,
                HistoryOutcome::NoShow => counts.1 = count,
            }
        }
        Ok(counts)
    }

    /// `(substitute_id, outcome, count)` across the whole history.
    pub async fn history_counts(&self) -> StaffroomResult<Vec<(String, String, i64)>> {
        with_pool!(self, pool => {
            sqlx::query_as(
                "SELECT substitute_id, outcome, COUNT(*) FROM substitution_history
                 GROUP BY substitute_id, outcome",
            )
            .fetch_all(pool)
            .await
            .map_err(query_failed("history_counts"))
        })
    }

    /// Windows already covered by each substitute on a date.
    pub async fn accepted_windows_on(
        &self,
        date: NaiveDate,
    ) -> StaffroomResult<Vec<(String, TimeWindow)>> {
        let rows: Vec<(String, NaiveTime, NaiveTime)> = with_pool!(self, pool => {
            sqlx::query_as(
                "SELECT substitute_id, start_time, end_time FROM substitution_requests
                 WHERE date = $1 AND status IN ('filled', 'closed') AND substitute_id IS NOT NULL",
            )
            .bind(date)
            .fetch_all(pool)
            .await
            .map_err(query_failed("accepted_windows_on"))?
        });

        Ok(rows
            .into_iter()
            .map(|(staff_id, start, end)| (staff_id, TimeWindow { start, end }))
            .collect())
    }
}
