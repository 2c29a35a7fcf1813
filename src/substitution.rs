//! Substitution cover workflow.
//!
//! A cover request is raised for an absent staff member and fans out to one
//! invitation per candidate. The first candidate to accept fills the request
//! and every other pending invitation is disabled. If that substitute later
//! drops out, the request reopens and the disabled invitations become pending
//! again. Once the cover has happened (or failed to), the request is closed and
//! the outcome is written to the substitution history.
//!
//! ```text
//! request:     open --fill--> filled --close--> closed
//!               ^  \            |  \
//!               |   expire      |   cancel --> cancelled
//!               |    v          |
//!               |  expired      |
//!               +----reopen-----+
//!
//! invitation:  pending --accept--> accepted --complete--> completed
//!               |  ^                 |    \--no_show---> no_show
//!               |  |reactivate       drop
//!               |  |                 v
//!               | disabled         dropped
//!               +--decline--> declined
//! ```
//!
//! This module only decides transitions. Persistence lives in
//! `server::database::substitutions`, which applies these decisions with
//! status-guarded updates inside a transaction.

use std::collections::HashSet;

use serde::Serialize;

use crate::errors::{StaffroomError, StaffroomResult};

text_enum! {
    /// Lifecycle of a cover request.
    pub enum RequestStatus {
        Open => "open",
        Filled => "filled",
        Cancelled => "cancelled",
        Closed => "closed",
        Expired => "expired",
    }
}

text_enum! {
    /// Lifecycle of a single candidate's invitation.
    pub enum InvitationStatus {
        Pending => "pending",
        Accepted => "accepted",
        Declined => "declined",
        Disabled => "disabled",
        Dropped => "dropped",
        Completed => "completed",
        NoShow => "no_show",
    }
}

text_enum! {
    /// Outcome written to the substitution history.
    pub enum HistoryOutcome {
        Completed => "completed",
        NoShow => "no_show",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Invite,
    Fill,
    Reopen,
    Cancel,
    Close,
    Expire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationAction {
    Accept,
    Decline,
    Drop,
    Disable,
    Reactivate,
    Complete,
    MarkNoShow,
}

impl RequestStatus {
    /// Next status after `action`, or `InvalidTransition`.
    pub fn apply(self, action: RequestAction) -> StaffroomResult<RequestStatus> {
        use RequestAction::*;
        use RequestStatus::*;

        match (self, action) {
            (Open, Invite) => Ok(Open),
            (Open, Fill) => Ok(Filled),
            (Filled, Reopen) => Ok(Open),
            (Open | Filled, Cancel) => Ok(Cancelled),
            (Filled, Close) => Ok(Closed),
            (Open, Expire) => Ok(Expired),
            (from, action) => Err(StaffroomError::InvalidTransition(format!(
                "cannot {action:?} a request that is {from}"
            ))),
        }
    }
}

impl InvitationStatus {
    /// Whether the candidate still holds a live stake in the request.
    pub fn is_live(&self) -> bool {
        matches!(self, InvitationStatus::Pending | InvitationStatus::Accepted)
    }

    /// Next status after `action`, or `InvalidTransition`.
    pub fn apply(self, action: InvitationAction) -> StaffroomResult<InvitationStatus> {
        use InvitationAction::*;
        use InvitationStatus::*;

        match (self, action) {
            (Pending, Accept) => Ok(Accepted),
            (Pending, Decline) => Ok(Declined),
            (Accepted, Drop) => Ok(Dropped),
            (Pending | Accepted, Disable) => Ok(Disabled),
            (Disabled, Reactivate) => Ok(Pending),
            (Accepted, Complete) => Ok(Completed),
            (Accepted, MarkNoShow) => Ok(NoShow),
            (from, action) => Err(StaffroomError::InvalidTransition(format!(
                "cannot {action:?} an invitation that is {from}"
            ))),
        }
    }
}

impl HistoryOutcome {
    pub fn invitation_action(&self) -> InvitationAction {
        match self {
            HistoryOutcome::Completed => InvitationAction::Complete,
            HistoryOutcome::NoShow => InvitationAction::MarkNoShow,
        }
    }
}

/// Deduplicate a candidate list, keep first-seen order and drop the requester.
pub fn normalize_candidates(requester_id: &str, candidates: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty() && *c != requester_id)
        .filter(|c| seen.insert(c.to_string()))
        .map(String::from)
        .collect()
}

/// Substitution track record used to rank suggested candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateProfile {
    pub staff_id: String,
    pub full_name: String,
    pub completed: i64,
    pub no_shows: i64,
}

/// Drop unreliable candidates and order the rest.
///
/// Fewer no-shows first, then fewer completed covers so the load is spread,
/// then by name for a stable order.
pub fn rank_candidates(
    mut candidates: Vec<CandidateProfile>,
    no_show_threshold: u32,
) -> Vec<CandidateProfile> {
    candidates.retain(|c| no_show_threshold == 0 || c.no_shows < i64::from(no_show_threshold));
    candidates.sort_by(|a, b| {
        a.no_shows
            .cmp(&b.no_shows)
            .then(a.completed.cmp(&b.completed))
            .then_with(|| a.full_name.cmp(&b.full_name))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_transitions() {
        use RequestAction::*;
        use RequestStatus::*;

        assert_eq!(Open.apply(Invite).unwrap(), Open);
        assert_eq!(Open.apply(Fill).unwrap(), Filled);
        assert_eq!(Filled.apply(Reopen).unwrap(), Open);
        assert_eq!(Open.apply(Cancel).unwrap(), Cancelled);
        assert_eq!(Filled.apply(Cancel).unwrap(), Cancelled);
        assert_eq!(Filled.apply(Close).unwrap(), Closed);
        assert_eq!(Open.apply(Expire).unwrap(), Expired);

        assert!(Filled.apply(Fill).is_err());
        assert!(Open.apply(Close).is_err());
        assert!(Filled.apply(Expire).is_err());
        assert!(Filled.apply(Invite).is_err());
    }

    #[test]
    fn terminal_requests_reject_everything() {
        let actions = [
            RequestAction::Invite,
            RequestAction::Fill,
            RequestAction::Reopen,
            RequestAction::Cancel,
            RequestAction::Close,
            RequestAction::Expire,
        ];
        for status in [
            RequestStatus::Cancelled,
            RequestStatus::Closed,
            RequestStatus::Expired,
        ] {
            for action in actions {
                assert!(
                    status.apply(action).is_err(),
                    "{status} accepted {action:?}"
                );
            }
        }
    }

    #[test]
    fn invitation_transitions() {
        use InvitationAction::*;
        use InvitationStatus::*;

        assert_eq!(Pending.apply(Accept).unwrap(), Accepted);
        assert_eq!(Pending.apply(Decline).unwrap(), Declined);
        assert_eq!(Pending.apply(Disable).unwrap(), Disabled);
        assert_eq!(Accepted.apply(Disable).unwrap(), Disabled);
        assert_eq!(Disabled.apply(Reactivate).unwrap(), Pending);
        assert_eq!(Accepted.apply(Drop).unwrap(), Dropped);
        assert_eq!(Accepted.apply(Complete).unwrap(), Completed);
        assert_eq!(Accepted.apply(MarkNoShow).unwrap(), NoShow);

        assert!(Declined.apply(Accept).is_err());
        assert!(Disabled.apply(Accept).is_err());
        assert!(Pending.apply(Drop).is_err());
        assert!(Dropped.apply(Reactivate).is_err());
        assert!(Completed.apply(MarkNoShow).is_err());

        let live: Vec<_> = InvitationStatus::ALL.iter().filter(|s| s.is_live()).collect();
        assert_eq!(live, [&Pending, &Accepted]);
    }

    #[test]
    fn invalid_transition_error_names_the_state() {
        let err = InvitationStatus::Declined
            .apply(InvitationAction::Accept)
            .unwrap_err();
        assert!(matches!(err, StaffroomError::InvalidTransition(_)));
        assert!(err.to_string().contains("declined"));
    }

    #[test]
    fn outcome_settles_the_accepted_invitation() {
        let settle = |outcome: HistoryOutcome| {
            InvitationStatus::Accepted
                .apply(outcome.invitation_action())
                .unwrap()
        };
        assert_eq!(settle(HistoryOutcome::Completed), InvitationStatus::Completed);
        assert_eq!(settle(HistoryOutcome::NoShow), InvitationStatus::NoShow);
        assert!(InvitationStatus::Pending
            .apply(HistoryOutcome::Completed.invitation_action())
            .is_err());
    }

    #[test]
    fn statuses_parse_from_storage_text() {
        assert_eq!(
            "no_show".parse::<InvitationStatus>().unwrap(),
            InvitationStatus::NoShow
        );
        assert_eq!(
            "filled".parse::<RequestStatus>().unwrap(),
            RequestStatus::Filled
        );
        assert!("accepted".parse::<RequestStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&InvitationStatus::NoShow).unwrap(),
            "\"no_show\""
        );
    }

    #[test]
    fn normalize_dedupes_and_drops_requester() {
        let candidates = vec![
            "b".to_string(),
            "a".to_string(),
            "req".to_string(),
            "b".to_string(),
            " ".to_string(),
            "c".to_string(),
        ];
        assert_eq!(normalize_candidates("req", &candidates), vec!["b", "a", "c"]);
    }

    fn profile(id: &str, name: &str, completed: i64, no_shows: i64) -> CandidateProfile {
        CandidateProfile {
            staff_id: id.to_string(),
            full_name: name.to_string(),
            completed,
            no_shows,
        }
    }

    #[test]
    fn ranking_prefers_reliable_then_least_loaded() {
        let ranked = rank_candidates(
            vec![
                profile("1", "Zoe", 0, 1),
                profile("2", "Adam", 5, 0),
                profile("3", "Bea", 1, 0),
                profile("4", "Carl", 1, 0),
                profile("5", "Dan", 0, 3),
            ],
            3,
        );
        let ids: Vec<&str> = ranked.iter().map(|c| c.staff_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "4", "2", "1"]);
    }

    #[test]
    fn zero_threshold_keeps_everyone() {
        let ranked = rank_candidates(vec![profile("1", "A", 0, 10)], 0);
        assert_eq!(ranked.len(), 1);
    }
}
