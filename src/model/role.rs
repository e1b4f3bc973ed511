use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// System-wide role of an account. Exactly one account holds `Root`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemRole {
    #[default]
    None,
    User,
    Admin,
    Root,
}

/// Role of an account within a single vote.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteRole {
    #[default]
    None,
    PendingCandidate,
    Candidate,
    Voter,
}

impl Display for SystemRole {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::None => "none",
                Self::User => "user",
                Self::Admin => "admin",
                Self::Root => "root",
            }
        )
    }
}

impl Display for VoteRole {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::None => "none",
                Self::PendingCandidate => "pending_candidate",
                Self::Candidate => "candidate",
                Self::Voter => "voter",
            }
        )
    }
}

/// Accounts that may deploy new votes.
pub fn can_create_vote(role: SystemRole) -> bool {
    matches!(role, SystemRole::Admin | SystemRole::Root)
}

/// Accounts that may grant and revoke system roles.
pub fn can_manage_roles(role: SystemRole) -> bool {
    role == SystemRole::Root
}

/// Accounts that belong in the admin roster.
pub fn is_admin_capable(role: SystemRole) -> bool {
    matches!(role, SystemRole::Admin | SystemRole::Root)
}

/// Accounts that have registered (or been granted a role) and may use account features.
pub fn is_registered(role: SystemRole) -> bool {
    role != SystemRole::None
}

/// Roles that `setRole` may assign. Root is fixed at genesis.
pub fn is_assignable(role: SystemRole) -> bool {
    role != SystemRole::Root
}

/// Whether an account holding `role` in a vote is counted as a ballot-caster for it.
pub fn is_voter(role: VoteRole) -> bool {
    role == VoteRole::Voter
}

/// Whether an account with this role in a vote may cast a ballot without prior registration.
/// Registered voters and accounts with no involvement in the vote qualify. Candidates do not.
pub fn is_implicitly_eligible(role: VoteRole) -> bool {
    matches!(role, VoteRole::None | VoteRole::Voter)
}
