/**
 * Shift Scheduler
 *
 * Validates and stores shift assignments so that no user ever holds two
 * live shifts whose wall-clock times overlap on a shared day, overnight
 * shifts included. Input is checked in a fixed order and each rule has its
 * own [`ShiftRejection`]:
 *
 * 1. start and end time are `HH:MM`
 * 2. start and end time differ
 * 3. start and end date are `YYYY-MM-DD`
 * 4. end date is not before start date
 * 5. start date is not before today in the local zone
 * 6. the assignee id is a UUID of an existing, active user
 *
 * Conflict check and write run under one scheduler-wide lock, so two
 * concurrent requests cannot both pass the check for the same slot.
 * Notifications are targeted at the affected users only.
 */

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::backend::error::{BackendError, ShiftRejection};
use crate::backend::realtime::HubHandle;
use crate::backend::store::{ShiftStore, UserStore};
use crate::shared::event::{ShiftAction, ShiftNotification};
use crate::shared::models::{
    CreateShiftRequest, Shift, ShiftFilter, ShiftView, UpdateShiftRequest, User, UserProfile,
};
use crate::shared::schedule::{local_date, parse_date, ClockTime, DateSpan, TimeRange, ViewType, DATE_FORMAT};
use crate::shared::RealtimeEvent;

/// Who is reading shifts. Admins see everyone's; others only their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub id: Uuid,
    pub is_admin: bool,
}

impl Viewer {
    fn may_view(&self, owner: Uuid) -> bool {
        self.is_admin || self.id == owner
    }
}

fn rejected(reason: ShiftRejection) -> BackendError {
    BackendError::ShiftRejected(reason)
}

fn parse_time(raw: &str) -> Result<ClockTime, BackendError> {
    raw.parse().map_err(|_| rejected(ShiftRejection::InvalidTimeFormat))
}

fn parse_day(field: &str, raw: &str) -> Result<NaiveDate, BackendError> {
    parse_date(field, raw).map_err(|_| rejected(ShiftRejection::InvalidDateFormat))
}

fn time_range(start: ClockTime, end: ClockTime) -> Result<TimeRange, BackendError> {
    if start == end {
        return Err(rejected(ShiftRejection::SameStartAndEnd));
    }
    Ok(TimeRange::new(start, end)?)
}

fn date_span(start: NaiveDate, end: NaiveDate) -> Result<DateSpan, BackendError> {
    if end < start {
        return Err(rejected(ShiftRejection::EndDateBeforeStart));
    }
    Ok(DateSpan::new(start, end)?)
}

/// `22:00 - 06:00, from 2030-01-01 to 2030-01-03`
fn describe(shift: &Shift) -> String {
    format!(
        "{} - {}, from {} to {}",
        shift.times.start(),
        shift.times.end(),
        shift.dates.start().format(DATE_FORMAT),
        shift.dates.end().format(DATE_FORMAT)
    )
}

#[derive(Clone)]
pub struct ShiftScheduler {
    shifts: Arc<dyn ShiftStore>,
    users: Arc<dyn UserStore>,
    hub: HubHandle,
    utc_offset_minutes: i32,
    write_lock: Arc<Mutex<()>>,
}

impl ShiftScheduler {
    pub fn new(shifts: Arc<dyn ShiftStore>, users: Arc<dyn UserStore>, hub: HubHandle, utc_offset_minutes: i32) -> Self {
        Self {
            shifts,
            users,
            hub,
            utc_offset_minutes,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Today in the fixed local zone
    pub fn today(&self) -> NaiveDate {
        local_date(Utc::now(), self.utc_offset_minutes)
    }

    fn ensure_not_past(&self, start: NaiveDate) -> Result<(), BackendError> {
        if start < self.today() {
            return Err(rejected(ShiftRejection::StartDateInPast));
        }
        Ok(())
    }

    async fn assignee(&self, raw: &str) -> Result<User, BackendError> {
        let id = Uuid::parse_str(raw.trim()).map_err(|_| rejected(ShiftRejection::InvalidUserId))?;
        let user = self
            .users
            .find_user(id)
            .await?
            .ok_or_else(|| BackendError::not_found("user"))?;
        if !user.is_active {
            return Err(rejected(ShiftRejection::UserInactive));
        }
        Ok(user)
    }

    /// Reject if any other live shift of `user_id` collides. Caller holds
    /// `write_lock`.
    async fn ensure_free(
        &self,
        user_id: Uuid,
        times: &TimeRange,
        dates: &DateSpan,
        exclude: Option<Uuid>,
    ) -> Result<(), BackendError> {
        let candidates = self.shifts.shifts_for_user_in_dates(user_id, dates, exclude).await?;
        let conflicts: Vec<_> = candidates
            .iter()
            .filter(|shift| shift.collides_with(times, dates))
            .map(Shift::slot)
            .collect();
        if conflicts.is_empty() {
            return Ok(());
        }
        tracing::warn!(
            "[Shifts] Rejected {} - {} for user {}: {} conflicting shift(s)",
            times.start(),
            times.end(),
            user_id,
            conflicts.len()
        );
        Err(BackendError::ShiftConflict { conflicts })
    }

    pub async fn create_shift(&self, request: CreateShiftRequest, actor: Uuid) -> Result<ShiftView, BackendError> {
        let start_time = parse_time(&request.start_time)?;
        let end_time = parse_time(&request.end_time)?;
        let times = time_range(start_time, end_time)?;
        let start_date = parse_day("start_date", &request.start_date)?;
        let end_date = parse_day("end_date", &request.end_date)?;
        let dates = date_span(start_date, end_date)?;
        self.ensure_not_past(start_date)?;
        let user = self.assignee(&request.user_id).await?;

        let now = Utc::now();
        let shift = Shift {
            id: Uuid::new_v4(),
            user_id: user.id,
            times,
            dates,
            note: request.note.trim().to_string(),
            created_by: Some(actor),
            updated_by: Some(actor),
            created_at: now,
            updated_at: now,
        };

        {
            let _guard = self.write_lock.lock().await;
            self.ensure_free(user.id, &times, &dates, None).await?;
            self.shifts.insert_shift(&shift).await?;
        }

        tracing::info!(
            "[Shifts] Shift {} ({}) assigned to {} by {}",
            shift.id,
            describe(&shift),
            user.id,
            actor
        );
        let view = shift.view(Some(user.profile()));
        self.notify(
            user.id,
            ShiftNotification {
                action: ShiftAction::ShiftCreated,
                message: format!("You have been assigned a new shift: {}", describe(&shift)),
                shift: Some(view.clone()),
                new_assignee: None,
                previous_assignee: None,
            },
        );
        Ok(view)
    }

    /// Partial update. Absent fields keep their value; `user_id` reassigns.
    pub async fn update_shift(
        &self,
        id: Uuid,
        request: UpdateShiftRequest,
        actor: Uuid,
    ) -> Result<ShiftView, BackendError> {
        let guard = self.write_lock.lock().await;

        let mut shift = self
            .shifts
            .find_shift(id)
            .await?
            .ok_or_else(|| BackendError::not_found("shift"))?;
        let previous_user_id = shift.user_id;

        let start_time = match request.start_time.as_deref() {
            Some(raw) => parse_time(raw)?,
            None => shift.times.start(),
        };
        let end_time = match request.end_time.as_deref() {
            Some(raw) => parse_time(raw)?,
            None => shift.times.end(),
        };
        let times = time_range(start_time, end_time)?;

        let start_date = match request.start_date.as_deref() {
            Some(raw) => parse_day("start_date", raw)?,
            None => shift.dates.start(),
        };
        let end_date = match request.end_date.as_deref() {
            Some(raw) => parse_day("end_date", raw)?,
            None => shift.dates.end(),
        };
        let dates = date_span(start_date, end_date)?;
        if request.start_date.is_some() {
            self.ensure_not_past(start_date)?;
        }

        let new_assignee = match request.user_id.as_deref() {
            Some(raw) => Some(self.assignee(raw).await?),
            None => None,
        };
        let user_id = new_assignee.as_ref().map_or(shift.user_id, |user| user.id);

        self.ensure_free(user_id, &times, &dates, Some(id)).await?;

        shift.user_id = user_id;
        shift.times = times;
        shift.dates = dates;
        if let Some(note) = request.note {
            shift.note = note.trim().to_string();
        }
        shift.updated_by = Some(actor);
        shift.updated_at = Utc::now();
        self.shifts.update_shift(&shift).await?;
        drop(guard);

        let assignee_profile = match new_assignee {
            Some(user) => Some(user.profile()),
            None => self.committed_profile(user_id).await,
        };
        let view = shift.view(assignee_profile.clone());

        if user_id == previous_user_id {
            tracing::info!("[Shifts] Shift {} updated by {}", id, actor);
            self.notify(
                user_id,
                ShiftNotification {
                    action: ShiftAction::ShiftUpdated,
                    message: format!("Your shift has been updated: {}", describe(&shift)),
                    shift: Some(view.clone()),
                    new_assignee: None,
                    previous_assignee: None,
                },
            );
            return Ok(view);
        }

        tracing::info!(
            "[Shifts] Shift {} reassigned from {} to {} by {}",
            id,
            previous_user_id,
            user_id,
            actor
        );
        let previous_profile = self.committed_profile(previous_user_id).await;
        let new_name = assignee_profile.as_ref().map_or("another user", |p| p.full_name.as_str());
        let previous_name = previous_profile.as_ref().map_or("another user", |p| p.full_name.as_str());

        self.notify(
            previous_user_id,
            ShiftNotification {
                action: ShiftAction::ShiftReassignedFrom,
                message: format!(
                    "Your shift ({} - {}, {} to {}) has been reassigned to {}",
                    shift.times.start(),
                    shift.times.end(),
                    shift.dates.start().format(DATE_FORMAT),
                    shift.dates.end().format(DATE_FORMAT),
                    new_name
                ),
                shift: None,
                new_assignee: assignee_profile.clone(),
                previous_assignee: None,
            },
        );
        self.notify(
            user_id,
            ShiftNotification {
                action: ShiftAction::ShiftReassignedTo,
                message: format!("You are replacing {}'s shift: {}", previous_name, describe(&shift)),
                shift: Some(view.clone()),
                new_assignee: None,
                previous_assignee: previous_profile.clone(),
            },
        );
        Ok(view)
    }

    /// Soft delete; the row is kept for audit but never returned again
    pub async fn cancel_shift(&self, id: Uuid, actor: Uuid) -> Result<(), BackendError> {
        let shift = {
            let _guard = self.write_lock.lock().await;
            let shift = self
                .shifts
                .find_shift(id)
                .await?
                .ok_or_else(|| BackendError::not_found("shift"))?;
            if !self.shifts.soft_delete_shift(id, actor, Utc::now()).await? {
                return Err(BackendError::not_found("shift"));
            }
            shift
        };

        tracing::info!("[Shifts] Shift {} cancelled by {}", id, actor);
        let profile = self.committed_profile(shift.user_id).await;
        self.notify(
            shift.user_id,
            ShiftNotification {
                action: ShiftAction::ShiftCancelled,
                message: format!("Your shift has been cancelled: {}", describe(&shift)),
                shift: Some(shift.view(profile)),
                new_assignee: None,
                previous_assignee: None,
            },
        );
        Ok(())
    }

    pub async fn get_shift(&self, id: Uuid, viewer: Viewer) -> Result<ShiftView, BackendError> {
        let shift = self
            .shifts
            .find_shift(id)
            .await?
            .ok_or_else(|| BackendError::not_found("shift"))?;
        if !viewer.may_view(shift.user_id) {
            return Err(BackendError::forbidden("you can only view your own shifts"));
        }
        let profile = self.users.find_user(shift.user_id).await?.map(|u| u.profile());
        Ok(shift.view(profile))
    }

    /// Shifts intersecting the view window around `reference`
    pub async fn list_shifts(
        &self,
        viewer: Viewer,
        view_type: ViewType,
        reference: NaiveDate,
    ) -> Result<Vec<ShiftView>, BackendError> {
        let filter = ShiftFilter {
            user_id: (!viewer.is_admin).then_some(viewer.id),
            dates: view_type.span(reference),
        };
        let shifts = self.shifts.list_shifts(filter).await?;
        self.views(shifts).await
    }

    pub async fn shifts_for_user(&self, user_id: Uuid, viewer: Viewer) -> Result<Vec<ShiftView>, BackendError> {
        if !viewer.may_view(user_id) {
            return Err(BackendError::forbidden("you can only view your own shifts"));
        }
        let filter = ShiftFilter {
            user_id: Some(user_id),
            dates: None,
        };
        let shifts = self.shifts.list_shifts(filter).await?;
        self.views(shifts).await
    }

    async fn views(&self, shifts: Vec<Shift>) -> Result<Vec<ShiftView>, BackendError> {
        let mut profiles: HashMap<Uuid, Option<UserProfile>> = HashMap::new();
        let mut views = Vec::with_capacity(shifts.len());
        for shift in shifts {
            if !profiles.contains_key(&shift.user_id) {
                let profile = self.users.find_user(shift.user_id).await?.map(|u| u.profile());
                profiles.insert(shift.user_id, profile);
            }
            let profile = profiles.get(&shift.user_id).cloned().flatten();
            views.push(shift.view(profile));
        }
        Ok(views)
    }

    /// Profile for a notification sent after the write committed. A failed
    /// lookup only thins the notification; the write already succeeded.
    async fn committed_profile(&self, user_id: Uuid) -> Option<UserProfile> {
        match self.users.find_user(user_id).await {
            Ok(user) => user.map(|u| u.profile()),
            Err(err) => {
                tracing::warn!("[Shifts] Could not load user {} for notification: {}", user_id, err);
                None
            }
        }
    }

    fn notify(&self, user_id: Uuid, notification: ShiftNotification) {
        self.hub
            .send_to_users(&[user_id], &RealtimeEvent::ShiftNotification(notification));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::error::ErrorKind;
    use crate::backend::store::{MemoryStore, StoreError};
    use crate::shared::models::NewUser;
    use assert_matches::assert_matches;
    use chrono::{DateTime, Duration};

    struct Fixture {
        scheduler: ShiftScheduler,
        store: MemoryStore,
        hub: HubHandle,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let hub = HubHandle::spawn(64, 64);
        let scheduler = ShiftScheduler::new(Arc::new(store.clone()), Arc::new(store.clone()), hub.clone(), 420);
        Fixture { scheduler, store, hub }
    }

    async fn user(store: &MemoryStore, name: &str, active: bool) -> User {
        store
            .insert_user(
                NewUser {
                    email: format!("{}@example.com", name.to_lowercase()),
                    password_hash: String::new(),
                    full_name: name.to_string(),
                    role_code: None,
                    is_active: active,
                    privileges: Vec::new(),
                },
                Utc::now(),
            )
            .await
            .unwrap()
    }

    fn day(scheduler: &ShiftScheduler, offset: i64) -> String {
        (scheduler.today() + Duration::days(offset)).format(DATE_FORMAT).to_string()
    }

    fn request(user: Uuid, start: &str, end: &str, start_date: &str, end_date: &str) -> CreateShiftRequest {
        CreateShiftRequest {
            user_id: user.to_string(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            note: String::new(),
        }
    }

    #[tokio::test]
    async fn test_overnight_shift_created() {
        let f = fixture();
        let alice = user(&f.store, "Alice", true).await;
        let (start, end) = (day(&f.scheduler, 1), day(&f.scheduler, 3));

        let view = f
            .scheduler
            .create_shift(request(alice.id, "22:00", "06:00", &start, &end), alice.id)
            .await
            .unwrap();
        assert!(view.is_overnight);
        assert_eq!(view.total_days, 3);
        assert_eq!(view.user.unwrap().full_name, "Alice");
    }

    #[tokio::test]
    async fn test_validation_order() {
        let f = fixture();
        let alice = user(&f.store, "Alice", true).await;
        let today = day(&f.scheduler, 0);
        let cases = [
            (request(alice.id, "24:00", "06:00", "bad", "bad"), ShiftRejection::InvalidTimeFormat),
            (request(alice.id, "08:00", "08:00", "bad", "bad"), ShiftRejection::SameStartAndEnd),
            (request(alice.id, "08:00", "09:00", "bad", &today), ShiftRejection::InvalidDateFormat),
            (
                request(alice.id, "08:00", "09:00", &day(&f.scheduler, 2), &day(&f.scheduler, 1)),
                ShiftRejection::EndDateBeforeStart,
            ),
            (
                request(alice.id, "08:00", "09:00", &day(&f.scheduler, -1), &today),
                ShiftRejection::StartDateInPast,
            ),
        ];
        for (input, expected) in cases {
            let err = f.scheduler.create_shift(input, alice.id).await.unwrap_err();
            assert_matches!(err, BackendError::ShiftRejected(reason) if reason == expected);
        }

        let mut input = request(alice.id, "08:00", "09:00", &today, &today);
        input.user_id = "not-a-uuid".to_string();
        let err = f.scheduler.create_shift(input, alice.id).await.unwrap_err();
        assert_matches!(err, BackendError::ShiftRejected(ShiftRejection::InvalidUserId));
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_users() {
        let f = fixture();
        let bob = user(&f.store, "Bob", false).await;
        let today = day(&f.scheduler, 0);

        let err = f
            .scheduler
            .create_shift(request(Uuid::new_v4(), "08:00", "09:00", &today, &today), bob.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = f
            .scheduler
            .create_shift(request(bob.id, "08:00", "09:00", &today, &today), bob.id)
            .await
            .unwrap_err();
        assert_matches!(err, BackendError::ShiftRejected(ShiftRejection::UserInactive));
    }

    #[tokio::test]
    async fn test_overlap_with_overnight_tail_conflicts() {
        let f = fixture();
        let alice = user(&f.store, "Alice", true).await;
        let d = day(&f.scheduler, 1);
        f.scheduler
            .create_shift(request(alice.id, "22:00", "06:00", &d, &d), alice.id)
            .await
            .unwrap();

        let err = f
            .scheduler
            .create_shift(request(alice.id, "05:00", "09:00", &d, &d), alice.id)
            .await
            .unwrap_err();
        assert_matches!(&err, BackendError::ShiftConflict { conflicts } if conflicts.len() == 1);
        assert_eq!(err.kind(), ErrorKind::Conflict);

        f.scheduler
            .create_shift(request(alice.id, "07:00", "09:00", &d, &d), alice.id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_other_users_and_other_dates_do_not_conflict() {
        let f = fixture();
        let alice = user(&f.store, "Alice", true).await;
        let bob = user(&f.store, "Bob", true).await;
        let d1 = day(&f.scheduler, 1);
        let d2 = day(&f.scheduler, 2);
        f.scheduler
            .create_shift(request(alice.id, "10:00", "14:00", &d1, &d1), alice.id)
            .await
            .unwrap();

        f.scheduler
            .create_shift(request(bob.id, "10:00", "14:00", &d1, &d1), alice.id)
            .await
            .unwrap();
        f.scheduler
            .create_shift(request(alice.id, "10:00", "14:00", &d2, &d2), alice.id)
            .await
            .unwrap();
        f.scheduler
            .create_shift(request(alice.id, "14:00", "18:00", &d1, &d1), alice.id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_excludes_itself_from_conflicts() {
        let f = fixture();
        let alice = user(&f.store, "Alice", true).await;
        let d = day(&f.scheduler, 1);
        let shift = f
            .scheduler
            .create_shift(request(alice.id, "10:00", "14:00", &d, &d), alice.id)
            .await
            .unwrap();

        let update = UpdateShiftRequest {
            end_time: Some("15:00".to_string()),
            ..Default::default()
        };
        let updated = f.scheduler.update_shift(shift.id, update, alice.id).await.unwrap();
        assert_eq!(updated.end_time, "15:00");
        assert_eq!(updated.start_date, d);
    }

    #[tokio::test]
    async fn test_reassignment_notifies_both_users() {
        let f = fixture();
        let alice = user(&f.store, "Alice", true).await;
        let bob = user(&f.store, "Bob", true).await;
        let d = day(&f.scheduler, 1);
        let shift = f
            .scheduler
            .create_shift(request(alice.id, "10:00", "14:00", &d, &d), alice.id)
            .await
            .unwrap();

        let mut alice_conn = f.hub.register(Some(alice.id)).await.unwrap();
        let mut bob_conn = f.hub.register(Some(bob.id)).await.unwrap();

        let update = UpdateShiftRequest {
            user_id: Some(bob.id.to_string()),
            ..Default::default()
        };
        f.scheduler.update_shift(shift.id, update, alice.id).await.unwrap();

        let to_alice: serde_json::Value = serde_json::from_str(&alice_conn.outbound.recv().await.unwrap()).unwrap();
        assert_eq!(to_alice["action"], "shift_reassigned_from");
        assert_eq!(to_alice["new_assignee"]["full_name"], "Bob");

        let to_bob: serde_json::Value = serde_json::from_str(&bob_conn.outbound.recv().await.unwrap()).unwrap();
        assert_eq!(to_bob["action"], "shift_reassigned_to");
        assert_eq!(to_bob["previous_assignee"]["full_name"], "Alice");
        assert!(to_bob["message"].as_str().unwrap().starts_with("You are replacing Alice's shift"));
    }

    #[tokio::test]
    async fn test_cancel_hides_shift() {
        let f = fixture();
        let alice = user(&f.store, "Alice", true).await;
        let d = day(&f.scheduler, 1);
        let shift = f
            .scheduler
            .create_shift(request(alice.id, "10:00", "14:00", &d, &d), alice.id)
            .await
            .unwrap();

        f.scheduler.cancel_shift(shift.id, alice.id).await.unwrap();
        let viewer = Viewer { id: alice.id, is_admin: true };
        assert_matches!(
            f.scheduler.get_shift(shift.id, viewer).await,
            Err(BackendError::NotFound { entity: "shift" })
        );
        assert_matches!(
            f.scheduler.cancel_shift(shift.id, alice.id).await,
            Err(BackendError::NotFound { .. })
        );

        // the slot is free again
        f.scheduler
            .create_shift(request(alice.id, "10:00", "14:00", &d, &d), alice.id)
            .await
            .unwrap();
    }

    /// Delegates to a [`MemoryStore`] but can make user lookups fail
    struct FlakyUsers {
        store: MemoryStore,
        failing: std::sync::atomic::AtomicBool,
    }

    impl FlakyUsers {
        fn fail(&self) {
            self.failing.store(true, std::sync::atomic::Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(StoreError::Database("connection reset".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl UserStore for FlakyUsers {
        async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            self.check()?;
            self.store.find_user(id).await
        }

        async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            self.check()?;
            self.store.find_user_by_email(email).await
        }

        async fn list_users(&self) -> Result<Vec<User>, StoreError> {
            self.store.list_users().await
        }

        async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User, StoreError> {
            self.store.insert_user(user, now).await
        }

        async fn update_user(&self, user: &User) -> Result<(), StoreError> {
            self.store.update_user(user).await
        }

        async fn soft_delete_user(&self, id: Uuid, by: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
            self.store.soft_delete_user(id, by, at).await
        }

        async fn count_users(&self) -> Result<i64, StoreError> {
            self.store.count_users().await
        }

        async fn start_session(&self, id: Uuid, version: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
            self.store.start_session(id, version, now).await
        }

        async fn touch_last_seen(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
            self.store.touch_last_seen(id, now).await
        }

        async fn update_password(&self, id: Uuid, hash: &str) -> Result<(), StoreError> {
            self.store.update_password(id, hash).await
        }
    }

    #[tokio::test]
    async fn test_committed_changes_survive_failed_profile_lookup() {
        let store = MemoryStore::new();
        let users = Arc::new(FlakyUsers {
            store: store.clone(),
            failing: Default::default(),
        });
        let hub = HubHandle::spawn(64, 64);
        let scheduler = ShiftScheduler::new(Arc::new(store.clone()), users.clone(), hub.clone(), 420);
        let alice = user(&store, "Alice", true).await;
        let d = day(&scheduler, 1);
        let first = scheduler
            .create_shift(request(alice.id, "08:00", "12:00", &d, &d), alice.id)
            .await
            .unwrap();
        let second = scheduler
            .create_shift(request(alice.id, "13:00", "17:00", &d, &d), alice.id)
            .await
            .unwrap();
        let mut conn = hub.register(Some(alice.id)).await.unwrap();

        users.fail();

        let update = UpdateShiftRequest {
            note: Some("moved".to_string()),
            ..Default::default()
        };
        let view = scheduler.update_shift(first.id, update, alice.id).await.unwrap();
        assert_eq!(view.note, "moved");
        assert!(view.user.is_none());

        scheduler.cancel_shift(second.id, alice.id).await.unwrap();
        assert!(store.find_shift(second.id).await.unwrap().is_none());

        // both notifications still go out, without the profile
        let updated: serde_json::Value = serde_json::from_str(&conn.outbound.recv().await.unwrap()).unwrap();
        assert_eq!(updated["action"], "shift_updated");
        let cancelled: serde_json::Value = serde_json::from_str(&conn.outbound.recv().await.unwrap()).unwrap();
        assert_eq!(cancelled["action"], "shift_cancelled");
    }

    #[tokio::test]
    async fn test_non_admin_sees_only_own_shifts() {
        let f = fixture();
        let alice = user(&f.store, "Alice", true).await;
        let bob = user(&f.store, "Bob", true).await;
        let d = day(&f.scheduler, 1);
        let bobs = f
            .scheduler
            .create_shift(request(bob.id, "10:00", "14:00", &d, &d), alice.id)
            .await
            .unwrap();
        f.scheduler
            .create_shift(request(alice.id, "10:00", "14:00", &d, &d), alice.id)
            .await
            .unwrap();

        let alice_viewer = Viewer { id: alice.id, is_admin: false };
        let err = f.scheduler.get_shift(bobs.id, alice_viewer).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(f.scheduler.shifts_for_user(bob.id, alice_viewer).await.is_err());

        let own = f
            .scheduler
            .list_shifts(alice_viewer, ViewType::All, f.scheduler.today())
            .await
            .unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].user_id, alice.id);

        let admin = Viewer { id: alice.id, is_admin: true };
        let all = f.scheduler.list_shifts(admin, ViewType::All, f.scheduler.today()).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
