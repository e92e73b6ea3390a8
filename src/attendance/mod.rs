pub mod roster;
pub mod session;
pub mod stats;
pub mod store;

pub use roster::Roster;
pub use session::AttendanceSession;
pub use stats::AttendanceStats;
pub use store::AttendanceStore;
