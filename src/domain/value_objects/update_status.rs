use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    Pending,
    Confirmed,
    Failed,
}

impl UpdateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStatus::Pending => "pending",
            UpdateStatus::Confirmed => "confirmed",
            UpdateStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: UpdateStatus) -> bool {
        matches!(
            (self, next),
            (UpdateStatus::Pending, UpdateStatus::Confirmed)
                | (UpdateStatus::Pending, UpdateStatus::Failed)
                | (UpdateStatus::Failed, UpdateStatus::Pending)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_documented_transitions_are_allowed() {
        assert!(UpdateStatus::Pending.can_transition_to(UpdateStatus::Confirmed));
        assert!(UpdateStatus::Pending.can_transition_to(UpdateStatus::Failed));
        assert!(UpdateStatus::Failed.can_transition_to(UpdateStatus::Pending));
        assert!(!UpdateStatus::Confirmed.can_transition_to(UpdateStatus::Pending));
        assert!(!UpdateStatus::Confirmed.can_transition_to(UpdateStatus::Failed));
        assert!(!UpdateStatus::Failed.can_transition_to(UpdateStatus::Confirmed));
    }
}
