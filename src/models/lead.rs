use serde::{Deserialize, Serialize};

use crate::leads::{LeadEmailStage, OutreachProgress};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub email: String,
    pub email_stage: Option<LeadEmailStage>,
    pub outreach_completed: bool,
    pub last_emailed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Lead {
    pub fn progress(&self) -> OutreachProgress {
        OutreachProgress::from_parts(self.email_stage, self.outreach_completed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLeadRequest {
    pub name: String,
    pub email: String,
}
