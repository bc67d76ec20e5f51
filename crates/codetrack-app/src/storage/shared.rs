//! Shared in-process storage
//!
//! [`SharedStorage`] holds the dashboard dataset for every tab of one
//! process, applies writes with role checks, and broadcasts a
//! [`StorageChange`] for each domain a write touched.

use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use codetrack_core::records::{
    Announcement, ApprovalStatus, Audience, NewAnnouncement, NewAssignment, Notification,
    NotificationKind, Platform, PlatformStat, Role, TeacherRecord, User,
};
use codetrack_core::{
    Domain, DomainPayload, DomainRecord, Mutation, MutationAck, RecordId, StorageConfig,
    SyncError, SyncResult, UserId,
};

const CHANGE_CAPACITY: usize = 256;

/// Every record of every domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    /// Registered accounts
    pub users: Vec<User>,
    /// Practice statistics
    pub platform_stats: Vec<PlatformStat>,
    /// Assignments
    pub teacher_records: Vec<TeacherRecord>,
    /// Notifications of every user
    pub notifications: Vec<Notification>,
    /// Announcements
    pub announcements: Vec<Announcement>,
}

impl Dataset {
    /// Small dataset covering every role and domain.
    pub fn demo() -> Self {
        let now = Utc::now();
        let users = vec![
            User::new("a1", "Ada Admin", Role::Admin),
            User::new("t1", "Grace Hopper", Role::Teacher).with_department("Computer Science"),
            User::new("t2", "Alan Turing", Role::Teacher).with_department("Mathematics"),
            User::new("s1", "Linus", Role::Student)
                .with_department("Computer Science")
                .with_teacher("t1"),
            User::new("s2", "Margaret", Role::Student)
                .with_department("Computer Science")
                .with_teacher("t1"),
            User::new("s3", "Dennis", Role::Student)
                .with_department("Computer Science")
                .with_teacher("t1")
                .with_status(ApprovalStatus::Pending),
            User::new("s4", "Barbara", Role::Student)
                .with_department("Mathematics")
                .with_teacher("t2")
                .with_status(ApprovalStatus::Pending),
        ];

        let platform_stats = vec![
            PlatformStat::linked("s1", Platform::LeetCode, "linus_lc")
                .with_solved(120, 80, 15)
                .with_rating(1720, 1810, 18)
                .with_streak(12),
            PlatformStat::linked("s1", Platform::Codeforces, "linus")
                .with_solved(40, 25, 6)
                .with_rating(1450, 1530, 22)
                .with_streak(3),
            PlatformStat::linked("s2", Platform::LeetCode, "margaret_h")
                .with_solved(200, 140, 45)
                .with_rating(2010, 2050, 30)
                .with_streak(41),
            PlatformStat::linked("s2", Platform::HackerRank, "mh").with_solved(60, 20, 2),
        ];

        let teacher_records = vec![
            TeacherRecord {
                id: RecordId::new("as1"),
                teacher_id: UserId::new("t1"),
                title: "Dynamic programming warm-up".into(),
                description: "Ten medium DP problems".into(),
                platform: Some(Platform::LeetCode),
                target_problems: 10,
                due_at: now + ChronoDuration::days(7),
                assigned_students: Vec::new(),
                created_at: now - ChronoDuration::days(1),
            },
            TeacherRecord {
                id: RecordId::new("as2"),
                teacher_id: UserId::new("t1"),
                title: "Graph basics".into(),
                description: String::new(),
                platform: Some(Platform::Codeforces),
                target_problems: 5,
                due_at: now - ChronoDuration::days(2),
                assigned_students: vec![UserId::new("s1")],
                created_at: now - ChronoDuration::days(9),
            },
        ];

        let notifications = vec![
            Notification::new(
                "s1",
                NotificationKind::Assignment,
                "New assignment: Dynamic programming warm-up",
            ),
            Notification::new("s2", NotificationKind::Info, "Welcome to codetrack"),
        ];

        let announcements = vec![Announcement {
            id: RecordId::new("an1"),
            author_id: UserId::new("a1"),
            title: "Weekly contest".into(),
            body: "Join the department contest on Saturday.".into(),
            audience: Audience::Everyone,
            created_at: now - ChronoDuration::hours(3),
        }];

        Self {
            users,
            platform_stats,
            teacher_records,
            notifications,
            announcements,
        }
    }

    fn user(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|user| &user.id == id)
    }

    /// Records of `domain` visible to `owner`.
    fn read(&self, domain: Domain, owner: Option<&UserId>) -> SyncResult<DomainPayload> {
        if !domain.is_owner_scoped() {
            return Ok(match domain {
                Domain::Users => User::into_payload(self.users.clone()),
                _ => Announcement::into_payload(self.announcements.clone()),
            });
        }

        let owner = owner.ok_or(SyncError::NotAuthenticated)?;
        let viewer = self.user(owner).ok_or(SyncError::NotAuthenticated)?;
        let supervises = |student: &UserId| {
            self.user(student)
                .is_some_and(|s| s.teacher_id.as_ref() == Some(&viewer.id))
        };

        Ok(match domain {
            Domain::PlatformStats => PlatformStat::into_payload(
                self.platform_stats
                    .iter()
                    .filter(|stat| match viewer.role {
                        Role::Admin => true,
                        Role::Teacher => supervises(&stat.owner_id),
                        Role::Student => stat.owner_id == viewer.id,
                    })
                    .cloned()
                    .collect(),
            ),
            Domain::TeacherRecords => TeacherRecord::into_payload(
                self.teacher_records
                    .iter()
                    .filter(|record| match viewer.role {
                        Role::Admin => true,
                        Role::Teacher => record.teacher_id == viewer.id,
                        Role::Student => {
                            viewer.teacher_id.as_ref() == Some(&record.teacher_id)
                                && record.applies_to(&viewer.id)
                        }
                    })
                    .cloned()
                    .collect(),
            ),
            _ => Notification::into_payload(
                self.notifications
                    .iter()
                    .filter(|n| n.recipient_id == viewer.id)
                    .cloned()
                    .collect(),
            ),
        })
    }

    /// Apply `mutation` as `actor`; returns the ack and every domain changed.
    fn apply(&mut self, actor: &UserId, mutation: &Mutation) -> SyncResult<(MutationAck, Vec<Domain>)> {
        let acting = self
            .user(actor)
            .filter(|user| user.is_approved())
            .cloned()
            .ok_or(SyncError::NotAuthenticated)?;

        match mutation {
            Mutation::ApproveUser { user_id } => {
                self.decide(&acting, user_id, ApprovalStatus::Approved)
            }
            Mutation::RejectUser { user_id } => {
                self.decide(&acting, user_id, ApprovalStatus::Rejected)
            }
            Mutation::LinkPlatform { platform, handle } => {
                self.link(&acting, *platform, handle)
            }
            Mutation::UnlinkPlatform { platform } => {
                let before = self.platform_stats.len();
                self.platform_stats
                    .retain(|stat| !(stat.owner_id == acting.id && stat.platform == *platform));
                let changed = if self.platform_stats.len() == before {
                    Vec::new()
                } else {
                    vec![Domain::PlatformStats]
                };
                Ok((MutationAck::new(Domain::PlatformStats), changed))
            }
            Mutation::CreateAssignment(assignment) => self.create_assignment(&acting, assignment),
            Mutation::DeleteAssignment { id } => {
                let record = self
                    .teacher_records
                    .iter()
                    .find(|record| &record.id == id)
                    .ok_or_else(|| SyncError::rejected(format!("unknown assignment {id}")))?;
                if acting.role != Role::Admin && record.teacher_id != acting.id {
                    return Err(SyncError::rejected("only the issuing teacher may delete an assignment"));
                }
                self.teacher_records.retain(|record| &record.id != id);
                Ok((
                    MutationAck::new(Domain::TeacherRecords).with_record(id.as_str()),
                    vec![Domain::TeacherRecords],
                ))
            }
            Mutation::MarkNotificationRead { id } => {
                let notification = self
                    .notifications
                    .iter_mut()
                    .find(|n| &n.id == id && n.recipient_id == acting.id)
                    .ok_or_else(|| SyncError::rejected(format!("unknown notification {id}")))?;
                let changed = if notification.read {
                    Vec::new()
                } else {
                    notification.read = true;
                    vec![Domain::Notifications]
                };
                Ok((
                    MutationAck::new(Domain::Notifications).with_record(id.as_str()),
                    changed,
                ))
            }
            Mutation::MarkAllNotificationsRead => {
                let mut touched = 0;
                for n in self
                    .notifications
                    .iter_mut()
                    .filter(|n| n.recipient_id == acting.id && !n.read)
                {
                    n.read = true;
                    touched += 1;
                }
                let changed = if touched > 0 {
                    vec![Domain::Notifications]
                } else {
                    Vec::new()
                };
                Ok((MutationAck::new(Domain::Notifications), changed))
            }
            Mutation::CreateAnnouncement(announcement) => {
                self.create_announcement(&acting, announcement)
            }
            Mutation::DeleteAnnouncement { id } => {
                let announcement = self
                    .announcements
                    .iter()
                    .find(|a| &a.id == id)
                    .ok_or_else(|| SyncError::rejected(format!("unknown announcement {id}")))?;
                if acting.role != Role::Admin && announcement.author_id != acting.id {
                    return Err(SyncError::rejected("only the author may delete an announcement"));
                }
                self.announcements.retain(|a| &a.id != id);
                Ok((
                    MutationAck::new(Domain::Announcements).with_record(id.as_str()),
                    vec![Domain::Announcements],
                ))
            }
        }
    }

    fn decide(
        &mut self,
        acting: &User,
        target: &UserId,
        decision: ApprovalStatus,
    ) -> SyncResult<(MutationAck, Vec<Domain>)> {
        let user = self
            .users
            .iter_mut()
            .find(|user| &user.id == target)
            .ok_or_else(|| SyncError::rejected(format!("unknown user {target}")))?;

        let allowed = match acting.role {
            Role::Admin => true,
            Role::Teacher => user.role == Role::Student && user.teacher_id.as_ref() == Some(&acting.id),
            Role::Student => false,
        };
        if !allowed {
            return Err(SyncError::rejected(format!(
                "{} may not decide on account {target}",
                acting.id
            )));
        }

        let ack = MutationAck::new(Domain::Users).with_record(target.as_str());
        if user.status == decision {
            return Ok((ack, Vec::new()));
        }
        user.status = decision;

        let message = match decision {
            ApprovalStatus::Approved => "Your account has been approved",
            _ => "Your registration was not approved",
        };
        self.notifications
            .push(Notification::new(target.clone(), NotificationKind::Approval, message));
        Ok((ack, vec![Domain::Users, Domain::Notifications]))
    }

    fn link(
        &mut self,
        acting: &User,
        platform: Platform,
        handle: &str,
    ) -> SyncResult<(MutationAck, Vec<Domain>)> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(SyncError::rejected("platform handle must not be empty"));
        }

        match self
            .platform_stats
            .iter_mut()
            .find(|stat| stat.owner_id == acting.id && stat.platform == platform)
        {
            Some(stat) => stat.handle = handle.to_string(),
            None => self
                .platform_stats
                .push(PlatformStat::linked(acting.id.clone(), platform, handle)),
        }
        Ok((
            MutationAck::new(Domain::PlatformStats).with_record(platform.label()),
            vec![Domain::PlatformStats],
        ))
    }

    fn create_assignment(
        &mut self,
        acting: &User,
        assignment: &NewAssignment,
    ) -> SyncResult<(MutationAck, Vec<Domain>)> {
        if acting.role == Role::Student {
            return Err(SyncError::rejected("students may not issue assignments"));
        }
        if assignment.title.trim().is_empty() {
            return Err(SyncError::rejected("assignment title must not be empty"));
        }
        if assignment.target_problems == 0 {
            return Err(SyncError::rejected("assignment must target at least one problem"));
        }

        let record = TeacherRecord {
            id: RecordId::generate(),
            teacher_id: acting.id.clone(),
            title: assignment.title.trim().to_string(),
            description: assignment.description.clone(),
            platform: assignment.platform,
            target_problems: assignment.target_problems,
            due_at: assignment.due_at,
            assigned_students: assignment.assigned_students.clone(),
            created_at: Utc::now(),
        };

        let recipients: Vec<UserId> = self
            .users
            .iter()
            .filter(|user| {
                user.role == Role::Student
                    && user.is_approved()
                    && user.teacher_id.as_ref() == Some(&acting.id)
                    && record.applies_to(&user.id)
            })
            .map(|user| user.id.clone())
            .collect();
        let message = format!("New assignment: {}", record.title);
        let mut changed = vec![Domain::TeacherRecords];
        if !recipients.is_empty() {
            changed.push(Domain::Notifications);
        }
        for recipient in recipients {
            self.notifications.push(Notification::new(
                recipient,
                NotificationKind::Assignment,
                message.clone(),
            ));
        }

        let ack = MutationAck::new(Domain::TeacherRecords).with_record(record.id.as_str());
        self.teacher_records.push(record);
        Ok((ack, changed))
    }

    fn create_announcement(
        &mut self,
        acting: &User,
        announcement: &NewAnnouncement,
    ) -> SyncResult<(MutationAck, Vec<Domain>)> {
        if acting.role == Role::Student {
            return Err(SyncError::rejected("students may not publish announcements"));
        }
        if announcement.title.trim().is_empty() {
            return Err(SyncError::rejected("announcement title must not be empty"));
        }

        let created = Announcement {
            id: RecordId::generate(),
            author_id: acting.id.clone(),
            title: announcement.title.trim().to_string(),
            body: announcement.body.clone(),
            audience: announcement.audience,
            created_at: Utc::now(),
        };

        let recipients: Vec<UserId> = self
            .users
            .iter()
            .filter(|user| {
                user.id != acting.id && user.is_approved() && created.audience.includes(user.role)
            })
            .map(|user| user.id.clone())
            .collect();
        let message = format!("Announcement: {}", created.title);
        let mut changed = vec![Domain::Announcements];
        if !recipients.is_empty() {
            changed.push(Domain::Notifications);
        }
        for recipient in recipients {
            self.notifications.push(Notification::new(
                recipient,
                NotificationKind::Announcement,
                message.clone(),
            ));
        }

        let ack = MutationAck::new(Domain::Announcements).with_record(created.id.as_str());
        self.announcements.push(created);
        Ok((ack, changed))
    }
}

/// A write by `origin` changed `domain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageChange {
    /// Remote (tab) that made the write
    pub origin: Uuid,
    /// Domain whose records changed
    pub domain: Domain,
}

struct StorageInner {
    data: RwLock<Dataset>,
    changes: broadcast::Sender<StorageChange>,
    path: Option<PathBuf>,
}

/// Dataset shared by every [`LocalStorageRemote`](super::LocalStorageRemote)
/// of a process.
#[derive(Clone)]
pub struct SharedStorage {
    inner: Arc<StorageInner>,
}

impl SharedStorage {
    /// In-memory storage holding `dataset`.
    pub fn new(dataset: Dataset) -> Self {
        Self::with_path(dataset, None)
    }

    /// In-memory storage seeded with [`Dataset::demo`].
    pub fn demo() -> Self {
        Self::new(Dataset::demo())
    }

    fn with_path(dataset: Dataset, path: Option<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            inner: Arc::new(StorageInner {
                data: RwLock::new(dataset),
                changes,
                path,
            }),
        }
    }

    /// Open storage as configured.
    ///
    /// An existing file is loaded; otherwise the dataset starts as the demo
    /// data or empty, per `seed_demo_data`.
    pub fn open(config: &StorageConfig) -> SyncResult<Self> {
        let Some(path) = &config.path else {
            let dataset = if config.seed_demo_data {
                Dataset::demo()
            } else {
                Dataset::default()
            };
            return Ok(Self::new(dataset));
        };

        let dataset = if path.exists() {
            let dataset = Self::load(path)?;
            tracing::info!(path = %path.display(), users = dataset.users.len(), "Storage loaded");
            dataset
        } else if config.seed_demo_data {
            tracing::info!(path = %path.display(), "Storage file missing; seeding demo data");
            Dataset::demo()
        } else {
            Dataset::default()
        };
        Ok(Self::with_path(dataset, Some(path.clone())))
    }

    fn load(path: &Path) -> SyncResult<Dataset> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            SyncError::config(format!("failed to parse storage file {}: {e}", path.display()))
        })
    }

    /// Write the dataset to the configured file. Returns whether a file was
    /// written.
    pub fn save(&self) -> SyncResult<bool> {
        let Some(path) = &self.inner.path else {
            return Ok(false);
        };
        let content = serde_json::to_string_pretty(&*self.inner.data.read())?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        tracing::debug!(path = %path.display(), "Storage saved");
        Ok(true)
    }

    /// Copy of the whole dataset.
    pub fn dataset(&self) -> Dataset {
        self.inner.data.read().clone()
    }

    /// Receive every future [`StorageChange`].
    pub fn changes(&self) -> broadcast::Receiver<StorageChange> {
        self.inner.changes.subscribe()
    }

    /// Records of `domain` visible to `owner`.
    pub fn read(&self, domain: Domain, owner: Option<&UserId>) -> SyncResult<DomainPayload> {
        self.inner.data.read().read(domain, owner)
    }

    /// Apply `mutation` for `actor` on behalf of `origin` and broadcast the
    /// domains it changed.
    pub fn apply(&self, origin: Uuid, actor: &UserId, mutation: &Mutation) -> SyncResult<MutationAck> {
        let (ack, changed) = self.inner.data.write().apply(actor, mutation)?;
        for domain in changed {
            // No receivers is fine.
            let _ = self.inner.changes.send(StorageChange { origin, domain });
        }
        Ok(ack)
    }

    /// Register a new account; it starts pending.
    pub fn register(&self, mut user: User) -> SyncResult<()> {
        let mut data = self.inner.data.write();
        if data.user(&user.id).is_some() {
            return Err(SyncError::rejected(format!("user {} already exists", user.id)));
        }
        user.status = ApprovalStatus::Pending;
        data.users.push(user);
        drop(data);
        let _ = self.inner.changes.send(StorageChange {
            origin: Uuid::nil(),
            domain: Domain::Users,
        });
        Ok(())
    }

    /// Look up a user by id.
    pub fn user(&self, id: &UserId) -> Option<User> {
        self.inner.data.read().user(id).cloned()
    }
}

impl std::fmt::Debug for SharedStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStorage")
            .field("path", &self.inner.path)
            .field("receivers", &self.inner.changes.receiver_count())
            .finish()
    }
}
