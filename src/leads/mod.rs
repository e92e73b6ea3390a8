pub mod stage;

pub use stage::{LeadEmailStage, OutreachProgress, next_stage};
