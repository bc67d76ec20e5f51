//! Typed access to per-domain slots.
//!
//! Each record type owns one cell in the [`SyncStore`](crate::SyncStore) and
//! one in-flight slot in the [`PollingController`](crate::PollingController).
//! The mapping is static, so typed operations never downcast.

use codetrack_core::records::{Announcement, Notification, PlatformStat, TeacherRecord, User};
use codetrack_core::DomainRecord;

use crate::polling::{InFlightSlot, InFlightTable};
use crate::store::{DomainCell, StoreCells};

mod sealed {
    pub trait Sealed {}
}

/// A [`DomainRecord`] the synchronization engine can store and refresh.
///
/// Sealed: implemented for the five dashboard record types only.
pub trait SyncRecord: DomainRecord + sealed::Sealed {
    #[doc(hidden)]
    fn cell(cells: &StoreCells) -> &DomainCell<Self>;

    #[doc(hidden)]
    fn in_flight(table: &InFlightTable) -> &InFlightSlot<Self>;
}

macro_rules! sync_record {
    ($record:ty, $field:ident) => {
        impl sealed::Sealed for $record {}

        impl SyncRecord for $record {
            fn cell(cells: &StoreCells) -> &DomainCell<Self> {
                &cells.$field
            }

            fn in_flight(table: &InFlightTable) -> &InFlightSlot<Self> {
                &table.$field
            }
        }
    };
}

sync_record!(User, users);
sync_record!(PlatformStat, platform_stats);
sync_record!(TeacherRecord, teacher_records);
sync_record!(Notification, notifications);
sync_record!(Announcement, announcements);
