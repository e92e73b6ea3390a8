pub mod money;
pub mod status;

pub use money::format_pence;
pub use status::{compute_status, compute_status_from_wire, parse_due_date, parse_timestamp};
