use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// The fixed sequence of outreach emails sent to a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadEmailStage {
    Initial,
    #[serde(rename = "FOLLOW_UP_1")]
    FollowUp1,
    #[serde(rename = "FOLLOW_UP_2")]
    FollowUp2,
    Final,
}

impl LeadEmailStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadEmailStage::Initial => "INITIAL",
            LeadEmailStage::FollowUp1 => "FOLLOW_UP_1",
            LeadEmailStage::FollowUp2 => "FOLLOW_UP_2",
            LeadEmailStage::Final => "FINAL",
        }
    }
}

impl fmt::Display for LeadEmailStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadEmailStage {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIAL" => Ok(LeadEmailStage::Initial),
            "FOLLOW_UP_1" => Ok(LeadEmailStage::FollowUp1),
            "FOLLOW_UP_2" => Ok(LeadEmailStage::FollowUp2),
            "FINAL" => Ok(LeadEmailStage::Final),
            other => Err(AppError::BadRequest(format!("Unknown email stage: {}", other))),
        }
    }
}

/// The stage the next send moves a lead to, or `None` once FINAL has gone out.
pub fn next_stage(current: Option<LeadEmailStage>) -> Option<LeadEmailStage> {
    match current {
        None => Some(LeadEmailStage::Initial),
        Some(LeadEmailStage::Initial) => Some(LeadEmailStage::FollowUp1),
        Some(LeadEmailStage::FollowUp1) => Some(LeadEmailStage::FollowUp2),
        Some(LeadEmailStage::FollowUp2) => Some(LeadEmailStage::Final),
        Some(LeadEmailStage::Final) => None,
    }
}

/// Where a lead sits in the outreach pipeline. Every step is user-triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum OutreachProgress {
    NotStarted,
    Sent(LeadEmailStage),
    Completed,
}

impl OutreachProgress {
    pub fn from_parts(stage: Option<LeadEmailStage>, completed: bool) -> Self {
        match (stage, completed) {
            (_, true) => OutreachProgress::Completed,
            (None, false) => OutreachProgress::NotStarted,
            (Some(stage), false) => OutreachProgress::Sent(stage),
        }
    }

    pub fn last_sent(&self) -> Option<LeadEmailStage> {
        match self {
            OutreachProgress::NotStarted => None,
            OutreachProgress::Sent(stage) => Some(*stage),
            OutreachProgress::Completed => Some(LeadEmailStage::Final),
        }
    }

    /// Total transition: after FINAL the lead is completed, and stays there.
    pub fn advance(self) -> Self {
        match self {
            OutreachProgress::NotStarted => OutreachProgress::Sent(LeadEmailStage::Initial),
            OutreachProgress::Sent(stage) => match next_stage(Some(stage)) {
                Some(next) => OutreachProgress::Sent(next),
                None => OutreachProgress::Completed,
            },
            OutreachProgress::Completed => OutreachProgress::Completed,
        }
    }

    /// The email a manual send would deliver next, if any.
    pub fn email_to_send(&self) -> Option<LeadEmailStage> {
        match self {
            OutreachProgress::Completed => None,
            other => next_stage(other.last_sent()),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, OutreachProgress::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_the_full_sequence() {
        let mut progress = OutreachProgress::NotStarted;
        let mut seen = Vec::new();
        while let Some(stage) = progress.email_to_send() {
            seen.push(stage);
            progress = progress.advance();
        }
        assert_eq!(
            seen,
            vec![
                LeadEmailStage::Initial,
                LeadEmailStage::FollowUp1,
                LeadEmailStage::FollowUp2,
                LeadEmailStage::Final,
            ]
        );
        assert_eq!(progress, OutreachProgress::Sent(LeadEmailStage::Final));
        assert_eq!(progress.advance(), OutreachProgress::Completed);
    }

    #[test]
    fn completed_is_terminal() {
        let done = OutreachProgress::Completed;
        assert_eq!(done.advance(), OutreachProgress::Completed);
        assert_eq!(done.email_to_send(), None);
    }

    #[test]
    fn next_stage_is_total() {
        assert_eq!(next_stage(None), Some(LeadEmailStage::Initial));
        assert_eq!(next_stage(Some(LeadEmailStage::Final)), None);
    }

    #[test]
    fn stage_names_round_trip_through_storage_strings() {
        for stage in [
            LeadEmailStage::Initial,
            LeadEmailStage::FollowUp1,
            LeadEmailStage::FollowUp2,
            LeadEmailStage::Final,
        ] {
            assert_eq!(stage.as_str().parse::<LeadEmailStage>().unwrap(), stage);
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage.as_str()));
        }
        assert!("FOLLOW_UP_3".parse::<LeadEmailStage>().is_err());
    }

    #[test]
    fn completed_flag_overrides_stage() {
        assert_eq!(
            OutreachProgress::from_parts(Some(LeadEmailStage::FollowUp1), true),
            OutreachProgress::Completed
        );
        assert_eq!(OutreachProgress::from_parts(None, false), OutreachProgress::NotStarted);
    }
}
