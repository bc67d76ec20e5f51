//! # Domain Records
//!
//! Record types carried by each [`Domain`] snapshot, and the
//! [`DomainRecord`] trait tying a record type to its domain.

mod announcement;
mod notification;
mod platform;
mod teacher;
mod user;

pub use announcement::{Announcement, Audience, NewAnnouncement};
pub use notification::{Notification, NotificationKind};
pub use platform::{Platform, PlatformStat};
pub use teacher::{NewAssignment, TeacherRecord};
pub use user::{ApprovalStatus, Role, User};

use crate::domain::Domain;
use crate::errors::{SyncError, SyncResult};
use crate::remote::DomainPayload;

/// A record type stored in exactly one [`Domain`].
///
/// The association is static, so typed store accessors never need a runtime
/// domain argument.
pub trait DomainRecord: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Domain whose snapshot holds records of this type.
    const DOMAIN: Domain;

    /// Extract this domain's records from a remote payload.
    fn from_payload(payload: DomainPayload) -> SyncResult<Vec<Self>>;

    /// Wrap records of this domain into a payload.
    fn into_payload(items: Vec<Self>) -> DomainPayload;
}

macro_rules! domain_record {
    ($record:ty, $domain:ident) => {
        impl DomainRecord for $record {
            const DOMAIN: Domain = Domain::$domain;

            fn from_payload(payload: DomainPayload) -> SyncResult<Vec<Self>> {
                match payload {
                    DomainPayload::$domain(items) => Ok(items),
                    other => Err(SyncError::PayloadMismatch {
                        expected: Self::DOMAIN,
                        actual: other.domain(),
                    }),
                }
            }

            fn into_payload(items: Vec<Self>) -> DomainPayload {
                DomainPayload::$domain(items)
            }
        }
    };
}

domain_record!(User, Users);
domain_record!(PlatformStat, PlatformStats);
domain_record!(TeacherRecord, TeacherRecords);
domain_record!(Notification, Notifications);
domain_record!(Announcement, Announcements);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trip_checks_domain() {
        let payload = User::into_payload(vec![User::new("u1", "Ada", Role::Student)]);
        assert_eq!(payload.domain(), Domain::Users);
        assert_eq!(payload.len(), 1);

        let err = Notification::from_payload(payload).err();
        assert_eq!(
            err,
            Some(SyncError::PayloadMismatch {
                expected: Domain::Notifications,
                actual: Domain::Users,
            })
        );
    }
}
