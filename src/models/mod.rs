pub mod academic_year;
pub mod automation_run;
pub mod availability;
pub mod quota;
pub mod room;
pub mod session;
pub mod subject;
pub mod user;

pub use academic_year::AcademicYear;
pub use automation_run::{AutomationRun, AutomationRunRow, ConflictKind, SkipReason, SkippedSession};
pub use availability::{Availability, AvailabilityStatus, DeferredAvailability, NewAvailabilityRequest};
pub use quota::{Quota, QuotaReport, QuotaStatus};
pub use room::Room;
pub use session::{Booking, BookedSession, NewSessionRequest, Session, SessionStatus, UpdateSessionRequest};
pub use subject::Subject;
pub use user::{Role, User};
