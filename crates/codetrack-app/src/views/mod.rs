//! # View Bindings
//!
//! One [`ViewBinding`] per domain. Derived aggregates are recomputed from the
//! current snapshot on every call, so they can never disagree with it.

mod binding;

pub mod announcements;
pub mod notifications;
pub mod platform_stats;
pub mod teacher_records;
pub mod users;

pub use binding::{remote_fetch, ViewBinding, ViewSubscription};

pub use announcements::AnnouncementsView;
pub use notifications::NotificationsView;
pub use platform_stats::{PlatformStatsView, PracticeTotals};
pub use teacher_records::TeacherRecordsView;
pub use users::{RoleCounts, UsersView};
