use serde::{Deserialize, Serialize};

use crate::ledger::Revert;

use super::OptionType;

/// Configuration supplied when deploying a new vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub option_type: OptionType,
    #[serde(default)]
    pub need_registration: bool,
    #[serde(default)]
    pub candidate_need_approval: bool,
    /// Option texts for a `PredefinedText` vote; must be empty otherwise.
    #[serde(default)]
    pub options: Vec<String>,
}

impl VoteSpec {
    /// Check the spec describes a vote that can actually run.
    pub fn validate(&self) -> Result<(), Revert> {
        if self.title.trim().is_empty() {
            return Err(Revert::InvalidSpec("title must not be empty".to_string()));
        }
        match self.option_type {
            OptionType::PredefinedText => {
                if self.options.is_empty() {
                    return Err(Revert::InvalidSpec(
                        "a predefined-text vote needs at least one option".to_string(),
                    ));
                }
                if self.options.iter().any(|text| text.trim().is_empty()) {
                    return Err(Revert::InvalidSpec(
                        "option text must not be empty".to_string(),
                    ));
                }
                if self.candidate_need_approval {
                    return Err(Revert::InvalidSpec(
                        "candidate approval only applies to candidate-registration votes"
                            .to_string(),
                    ));
                }
            }
            OptionType::CandidateRegistration => {
                if !self.options.is_empty() {
                    return Err(Revert::InvalidSpec(
                        "candidate-registration votes take their options from candidates"
                            .to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}
