//! Production collaborators informed after status transitions.
//!
//! - `TracingAuditSink` - audit trail on the `audit` tracing target
//! - `BroadcastNotificationSink` - fan-out to connected UI clients
//! - `HttpEnrollmentNotifier` - enrollment outcome callback

mod audit_log;
mod enrollment_callback;
mod notification_broadcast;

pub use audit_log::TracingAuditSink;
pub use enrollment_callback::HttpEnrollmentNotifier;
pub use notification_broadcast::BroadcastNotificationSink;
