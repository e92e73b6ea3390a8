pub mod attendance;
pub mod invoice;
pub mod lead;
pub mod student;

pub use attendance::{AttendanceMark, AttendanceRecord, AttendanceStatus, RosterEntry, SaveAttendanceRequest};
pub use invoice::{Invoice, InvoiceState, InvoiceStatus, InvoiceView, NewInvoiceRequest, PaymentMethod, RecordPaymentRequest};
pub use lead::{Lead, NewLeadRequest};
pub use student::{NewStudentRequest, Student};
