//! Notification kinds.

text_enum! {
    pub enum NotificationKind {
        General => "general",
        SubstitutionInvitation => "substitution_invitation",
        SubstitutionAccepted => "substitution_accepted",
        SubstitutionDeclined => "substitution_declined",
        SubstitutionDropped => "substitution_dropped",
        SubstitutionCancelled => "substitution_cancelled",
        TaskAssigned => "task_assigned",
        TaskUpdated => "task_updated",
    }
}

impl Default for NotificationKind {
    fn default() -> Self {
        NotificationKind::General
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_kind() {
        for kind in NotificationKind::ALL {
            assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), *kind);
        }
    }
}
