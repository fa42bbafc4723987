//! Task write path: validation, status transitions, persistence, and the
//! best-effort email/calendar fan-out that follows every successful write.

use chrono::Utc;
use smart_todo_types::{
    CreateTaskRequest, SortOrder, Task, TaskListQuery, TaskSort, TaskStats, TaskStatus,
    UpdateTaskRequest,
};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::integrations::calendar::{CalendarProvider, EventUpdate};
use crate::integrations::mailer::Mailer;
use crate::integrations::templates::{self, TaskEvent};
use crate::models::GoogleAccount;
use crate::repository::{OwnerContext, TaskStore};
use crate::services::calendar_sync::{self, CalendarAction};
use crate::services::status;

/// How integration calls run relative to the request that triggered them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOut {
    /// Spawned on the runtime; the response does not wait. Jobs for the
    /// same task still run one at a time, in write order.
    Background,
    /// Awaited before returning
    Inline,
}

/// Service for task-related business logic
#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    integrations: Integrations,
    fan_out: FanOut,
    queue: FanOutQueue,
}

#[derive(Clone)]
struct Integrations {
    store: Arc<dyn TaskStore>,
    mailer: Arc<dyn Mailer>,
    calendar: Arc<dyn CalendarProvider>,
}

impl TaskService {
    pub fn new(
        store: Arc<dyn TaskStore>,
        mailer: Arc<dyn Mailer>,
        calendar: Arc<dyn CalendarProvider>,
        fan_out: FanOut,
    ) -> Self {
        Self {
            integrations: Integrations {
                store: store.clone(),
                mailer,
                calendar,
            },
            store,
            fan_out,
            queue: FanOutQueue::default(),
        }
    }

    pub async fn list(&self, owner: Uuid, query: &TaskListQuery) -> ApiResult<Vec<Task>> {
        let mut tasks = self.store.list(owner, query).await?;
        sort_tasks(&mut tasks, query.sort, query.order);
        Ok(tasks)
    }

    pub async fn get(&self, owner: Uuid, task_id: Uuid) -> ApiResult<Task> {
        self.store
            .get(owner, task_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Task"))
    }

    pub async fn stats(&self, owner: Uuid) -> ApiResult<TaskStats> {
        let tasks = self.store.list(owner, &TaskListQuery::default()).await?;
        let now = Utc::now();

        let mut stats = TaskStats {
            total: tasks.len() as i64,
            ..Default::default()
        };
        for task in &tasks {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
            }
            if task.is_overdue(now) {
                stats.overdue += 1;
            }
        }

        Ok(stats)
    }

    pub async fn create(&self, owner: Uuid, req: CreateTaskRequest) -> ApiResult<Task> {
        req.validate()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        let now = Utc::now();
        let mut task = Task {
            id: Uuid::new_v4(),
            user_id: owner,
            title: normalize_title(&req.title)?,
            description: normalize_description(req.description),
            status: TaskStatus::Pending,
            previous_status: None,
            priority: req.priority.unwrap_or_default(),
            due_date: req.due_date,
            completed_at: None,
            calendar_event_id: None,
            created_at: now,
            updated_at: now,
        };
        status::initial_status(&mut task, req.status, now);

        let created = self.store.insert(&task).await?;
        tracing::info!("Created task {} for user {}", created.id, owner);

        self.dispatch(created.clone(), TaskEvent::Created).await;
        Ok(created)
    }

    pub async fn update(
        &self,
        owner: Uuid,
        task_id: Uuid,
        req: UpdateTaskRequest,
    ) -> ApiResult<Task> {
        req.validate()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        if req.is_empty() {
            return Err(ApiError::bad_request("No fields to update"));
        }

        let mut task = self.get(owner, task_id).await?;
        let now = Utc::now();

        if let Some(title) = &req.title {
            task.title = normalize_title(title)?;
        }
        if let Some(description) = req.description {
            if description
                .as_ref()
                .is_some_and(|d| d.chars().count() > smart_todo_types::DESCRIPTION_MAX_LEN as usize)
            {
                return Err(ApiError::bad_request("description is too long"));
            }
            task.description = normalize_description(description);
        }
        if let Some(due_date) = req.due_date {
            task.due_date = due_date;
        }
        if let Some(priority) = req.priority {
            task.priority = priority;
        }
        if let Some(next) = req.status {
            status::apply_status(&mut task, next, now);
        }

        self.save(task, now).await
    }

    pub async fn update_status(
        &self,
        owner: Uuid,
        task_id: Uuid,
        next: TaskStatus,
    ) -> ApiResult<Task> {
        let mut task = self.get(owner, task_id).await?;
        let now = Utc::now();
        status::apply_status(&mut task, next, now);
        self.save(task, now).await
    }

    pub async fn toggle(&self, owner: Uuid, task_id: Uuid) -> ApiResult<Task> {
        let mut task = self.get(owner, task_id).await?;
        let now = Utc::now();
        status::toggle_completion(&mut task, now);
        self.save(task, now).await
    }

    pub async fn delete(&self, owner: Uuid, task_id: Uuid) -> ApiResult<()> {
        let deleted = self
            .store
            .delete(owner, task_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Task"))?;
        tracing::info!("Deleted task {} for user {}", deleted.id, owner);

        self.dispatch(deleted, TaskEvent::Deleted).await;
        Ok(())
    }

    async fn save(&self, mut task: Task, now: chrono::DateTime<Utc>) -> ApiResult<Task> {
        task.updated_at = now;
        let saved = self
            .store
            .update(&task)
            .await?
            .ok_or_else(|| ApiError::not_found("Task"))?;
        tracing::info!("Updated task {} ({})", saved.id, saved.status);

        self.dispatch(saved.clone(), TaskEvent::Updated).await;
        Ok(saved)
    }

    async fn dispatch(&self, task: Task, event: TaskEvent) {
        let integrations = self.integrations.clone();
        match self.fan_out {
            FanOut::Inline => integrations.run(task, event).await,
            FanOut::Background => {
                let task_id = task.id;
                self.queue
                    .enqueue(task_id, async move { integrations.run(task, event).await });
            }
        }
    }
}

/// Orders background fan-out per task. Only the newest job for each task is
/// tracked; it awaits its predecessor before doing any work.
#[derive(Clone, Default)]
struct FanOutQueue {
    state: Arc<Mutex<QueueState>>,
}

#[derive(Default)]
struct QueueState {
    next_seq: u64,
    pending: HashMap<Uuid, PendingJob>,
}

struct PendingJob {
    seq: u64,
    handle: JoinHandle<()>,
}

impl FanOutQueue {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue<F>(&self, task_id: Uuid, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let queue = self.clone();
        // Held until the new job is recorded, so the job cannot finish and
        // clean up before its own entry exists.
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let previous = state.pending.remove(&task_id);

        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.handle.await {
                    tracing::error!("Earlier fan-out for task {} failed: {:?}", task_id, e);
                }
            }
            job.await;

            let mut state = queue.lock();
            if state.pending.get(&task_id).is_some_and(|p| p.seq == seq) {
                state.pending.remove(&task_id);
            }
        });
        state.pending.insert(task_id, PendingJob { seq, handle });
    }

    /// Wait until every queued job has finished.
    #[cfg(test)]
    async fn drain(&self) {
        loop {
            let next = {
                let mut state = self.lock();
                let task_id = state.pending.keys().next().copied();
                task_id.and_then(|id| state.pending.remove(&id))
            };
            match next {
                Some(job) => {
                    let _ = job.handle.await;
                }
                None => break,
            }
        }
    }
}

impl Integrations {
    /// Email and calendar side effects of a committed write. Never fails:
    /// every error is logged and dropped.
    async fn run(&self, task: Task, event: TaskEvent) {
        let owner = match self.store.owner_context(task.user_id).await {
            Ok(owner) => owner,
            Err(e) => {
                tracing::error!("Skipping integrations for task {}: {:?}", task.id, e);
                return;
            }
        };

        // An earlier job may have created or removed the event since the
        // snapshot was taken.
        let current = match event {
            TaskEvent::Deleted => Some(task.clone()),
            _ => self.with_stored_event_id(&task).await,
        };

        tokio::join!(self.notify(&owner, &task, event), async {
            if let Some(current) = &current {
                self.sync_calendar(&owner, current, event).await;
            }
        });
    }

    /// The snapshot carrying the event id currently stored for it, or `None`
    /// when the task has since been deleted.
    async fn with_stored_event_id(&self, task: &Task) -> Option<Task> {
        match self.store.get(task.user_id, task.id).await {
            Ok(Some(stored)) => Some(Task {
                calendar_event_id: stored.calendar_event_id,
                ..task.clone()
            }),
            Ok(None) => {
                tracing::debug!("Task {} deleted before calendar sync ran", task.id);
                None
            }
            Err(e) => {
                tracing::error!("Skipping calendar sync for task {}: {:?}", task.id, e);
                None
            }
        }
    }

    async fn notify(&self, owner: &OwnerContext, task: &Task, event: TaskEvent) {
        if !owner.settings.email_notifications {
            return;
        }

        let message = templates::task_notification(&owner.email, task, event);
        if let Err(e) = self.mailer.send(&message).await {
            tracing::warn!("Failed to send notification for task {}: {:?}", task.id, e);
        }
    }

    async fn sync_calendar(&self, owner: &OwnerContext, task: &Task, event: TaskEvent) {
        let action = match event {
            TaskEvent::Deleted => calendar_sync::plan_after_delete(task),
            _ => calendar_sync::plan_after_write(task, owner.settings.calendar_sync),
        };
        if action == CalendarAction::Nothing {
            return;
        }

        let Some(account) = owner.google_account.as_ref() else {
            tracing::debug!("No Google account linked, skipping calendar sync for task {}", task.id);
            if matches!(action, CalendarAction::Delete(_)) && event != TaskEvent::Deleted {
                self.store_event_id(task, None).await;
            }
            return;
        };

        match action {
            CalendarAction::Create => {
                let Some(calendar_event) = calendar_sync::event_for(task) else {
                    return;
                };
                match self.calendar.create_event(account, &calendar_event).await {
                    Ok(id) => self.adopt_event(account, task, &id).await,
                    Err(e) => {
                        tracing::warn!("Failed to create calendar event for task {}: {:?}", task.id, e)
                    }
                }
            }
            CalendarAction::Update(event_id) => {
                let Some(calendar_event) = calendar_sync::event_for(task) else {
                    return;
                };
                match self
                    .calendar
                    .update_event(account, &event_id, &calendar_event)
                    .await
                {
                    Ok(EventUpdate::Updated) => {}
                    Ok(EventUpdate::Missing) => {
                        match self.calendar.create_event(account, &calendar_event).await {
                            Ok(id) => self.adopt_event(account, task, &id).await,
                            Err(e) => tracing::warn!(
                                "Failed to recreate calendar event for task {}: {:?}",
                                task.id,
                                e
                            ),
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to update calendar event for task {}: {:?}", task.id, e)
                    }
                }
            }
            CalendarAction::Delete(event_id) => {
                match self.calendar.delete_event(account, &event_id).await {
                    Ok(()) if event != TaskEvent::Deleted => self.store_event_id(task, None).await,
                    Ok(()) => {}
                    Err(e) => {
                        tracing::warn!("Failed to delete calendar event for task {}: {:?}", task.id, e)
                    }
                }
            }
            CalendarAction::Nothing => {}
        }
    }

    /// Record a freshly created event. When the task was deleted while the
    /// event was being created, the event is removed again.
    async fn adopt_event(&self, account: &GoogleAccount, task: &Task, event_id: &str) {
        match self.store.set_calendar_event_id(task.id, Some(event_id)).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(
                    "Task {} deleted during calendar sync, removing event {}",
                    task.id,
                    event_id
                );
                if let Err(e) = self.calendar.delete_event(account, event_id).await {
                    tracing::warn!("Failed to remove calendar event {}: {:?}", event_id, e);
                }
            }
            Err(e) => {
                tracing::error!("Failed to record calendar event id on task {}: {:?}", task.id, e)
            }
        }
    }

    async fn store_event_id(&self, task: &Task, event_id: Option<&str>) {
        if let Err(e) = self.store.set_calendar_event_id(task.id, event_id).await {
            tracing::error!("Failed to record calendar event id on task {}: {:?}", task.id, e);
        }
    }
}

fn normalize_title(title: &str) -> ApiResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("title must not be empty"));
    }
    Ok(title.to_string())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Order tasks for display. Tasks without a due date sort last when sorting by due date.
pub fn sort_tasks(tasks: &mut [Task], sort: TaskSort, order: SortOrder) {
    let directed = |ordering: Ordering| match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    };

    tasks.sort_by(|a, b| match sort {
        TaskSort::Created => directed(a.created_at.cmp(&b.created_at)),
        TaskSort::Due => match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => directed(x.cmp(&y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => b.created_at.cmp(&a.created_at),
        },
        TaskSort::Priority => directed(a.priority.rank().cmp(&b.priority.rank()))
            .then_with(|| b.created_at.cmp(&a.created_at)),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        google_account, task_fixture, CalendarCall, FakeCalendar, InMemoryStore, RecordingMailer,
    };
    use chrono::Duration;
    use smart_todo_types::{TaskPriority, UserSettings};
    use std::time::Duration as StdDuration;

    struct Harness {
        service: TaskService,
        store: Arc<InMemoryStore>,
        mailer: Arc<RecordingMailer>,
        calendar: Arc<FakeCalendar>,
        owner: Uuid,
    }

    fn harness(settings: UserSettings, linked: bool) -> Harness {
        harness_with(settings, linked, FanOut::Inline)
    }

    fn harness_with(settings: UserSettings, linked: bool, fan_out: FanOut) -> Harness {
        let owner = Uuid::new_v4();
        let store = Arc::new(InMemoryStore::default());
        store.add_owner(
            owner,
            "owner@example.com",
            settings,
            linked.then(|| google_account(owner)),
        );
        let mailer = Arc::new(RecordingMailer::default());
        let calendar = Arc::new(FakeCalendar::default());
        let service = TaskService::new(
            store.clone(),
            mailer.clone(),
            calendar.clone(),
            fan_out,
        );
        Harness {
            service,
            store,
            mailer,
            calendar,
            owner,
        }
    }

    fn synced() -> UserSettings {
        UserSettings {
            email_notifications: true,
            calendar_sync: true,
        }
    }

    fn create_req(title: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            title: title.to_string(),
            description: None,
            due_date: None,
            priority: None,
            status: None,
        }
    }

    #[tokio::test]
    async fn test_create_sends_email_to_owner() {
        let h = harness(UserSettings::default(), false);
        let task = h.service.create(h.owner, create_req("  Buy milk ")).await.unwrap();

        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "owner@example.com");
        assert!(sent[0].subject.contains("created"));
        assert!(h.calendar.calls().is_empty());
    }

    #[tokio::test]
    async fn test_email_disabled() {
        let h = harness(
            UserSettings {
                email_notifications: false,
                calendar_sync: false,
            },
            false,
        );
        h.service.create(h.owner, create_req("Quiet")).await.unwrap();
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_blank_title_rejected() {
        let h = harness(UserSettings::default(), false);
        let err = h.service.create(h.owner, create_req("   ")).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(h.store.tasks().is_empty());
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_due_date_creates_then_updates_event() {
        let h = harness(synced(), true);
        let mut req = create_req("Dentist");
        req.due_date = Some(Utc::now() + Duration::days(1));

        let task = h.service.create(h.owner, req).await.unwrap();
        let stored = h.store.task(task.id).unwrap();
        assert_eq!(stored.calendar_event_id.as_deref(), Some("evt-1"));

        h.service
            .update(
                h.owner,
                task.id,
                UpdateTaskRequest {
                    title: Some("Dentist (moved)".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(
            h.calendar.calls(),
            vec![
                CalendarCall::Create("Dentist".to_string()),
                CalendarCall::Update("evt-1".to_string(), "Dentist (moved)".to_string()),
            ]
        );
        assert_eq!(
            h.store.task(task.id).unwrap().calendar_event_id.as_deref(),
            Some("evt-1")
        );
    }

    #[tokio::test]
    async fn test_background_writes_create_one_event_then_update_it() {
        let h = harness_with(synced(), true, FanOut::Background);
        h.calendar.slow(StdDuration::from_millis(50));
        let mut req = create_req("Dentist");
        req.due_date = Some(Utc::now() + Duration::days(1));

        let task = h.service.create(h.owner, req).await.unwrap();
        // let the create reach the calendar before the next write lands
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        h.service.toggle(h.owner, task.id).await.unwrap();
        assert!(h.calendar.calls().is_empty());

        h.service.queue.drain().await;
        assert_eq!(
            h.calendar.calls(),
            vec![
                CalendarCall::Create("Dentist".to_string()),
                CalendarCall::Update("evt-1".to_string(), "Dentist".to_string()),
            ]
        );
        assert_eq!(
            h.store.task(task.id).unwrap().calendar_event_id.as_deref(),
            Some("evt-1")
        );

        h.service.delete(h.owner, task.id).await.unwrap();
        h.service.queue.drain().await;
        let calls = h.calendar.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2], CalendarCall::Delete("evt-1".to_string()));
        assert_eq!(h.mailer.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_during_background_create_removes_new_event() {
        let h = harness_with(synced(), true, FanOut::Background);
        h.calendar.slow(StdDuration::from_millis(50));
        let mut req = create_req("Gone");
        req.due_date = Some(Utc::now() + Duration::days(1));

        let task = h.service.create(h.owner, req).await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        h.service.delete(h.owner, task.id).await.unwrap();

        h.service.queue.drain().await;
        assert_eq!(
            h.calendar.calls(),
            vec![
                CalendarCall::Create("Gone".to_string()),
                CalendarCall::Delete("evt-1".to_string()),
            ]
        );
        assert!(h.store.task(task.id).is_none());
    }

    #[tokio::test]
    async fn test_update_applies_fields_and_status_in_one_write() {
        let h = harness(UserSettings::default(), false);
        let task = h.service.create(h.owner, create_req("Draft")).await.unwrap();

        let updated = h
            .service
            .update(
                h.owner,
                task.id,
                UpdateTaskRequest {
                    title: Some("Final report".to_string()),
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Final report");
        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.previous_status, Some(TaskStatus::Pending));
        assert!(updated.completed_at.is_some());

        let stored = h.store.task(task.id).unwrap();
        assert_eq!(stored.title, "Final report");
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(h.mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_removing_due_date_deletes_event() {
        let h = harness(synced(), true);
        let mut req = create_req("Dentist");
        req.due_date = Some(Utc::now() + Duration::days(1));
        let task = h.service.create(h.owner, req).await.unwrap();

        let updated = h
            .service
            .update(
                h.owner,
                task.id,
                UpdateTaskRequest {
                    due_date: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.due_date, None);
        assert_eq!(
            h.calendar.calls().last(),
            Some(&CalendarCall::Delete("evt-1".to_string()))
        );
        assert_eq!(h.store.task(task.id).unwrap().calendar_event_id, None);
    }

    #[tokio::test]
    async fn test_disabling_sync_deletes_event_on_next_write() {
        let h = harness(synced(), true);
        let mut req = create_req("Dentist");
        req.due_date = Some(Utc::now() + Duration::days(1));
        let task = h.service.create(h.owner, req).await.unwrap();

        h.store.set_settings(
            h.owner,
            UserSettings {
                email_notifications: true,
                calendar_sync: false,
            },
        );
        h.service.toggle(h.owner, task.id).await.unwrap();

        assert_eq!(
            h.calendar.calls().last(),
            Some(&CalendarCall::Delete("evt-1".to_string()))
        );
        assert_eq!(h.store.task(task.id).unwrap().calendar_event_id, None);
    }

    #[tokio::test]
    async fn test_missing_event_is_recreated() {
        let h = harness(synced(), true);
        let mut req = create_req("Dentist");
        req.due_date = Some(Utc::now() + Duration::days(1));
        let task = h.service.create(h.owner, req).await.unwrap();

        h.calendar.forget("evt-1");
        h.service
            .update_status(h.owner, task.id, TaskStatus::InProgress)
            .await
            .unwrap();

        assert_eq!(
            h.store.task(task.id).unwrap().calendar_event_id.as_deref(),
            Some("evt-2")
        );
    }

    #[tokio::test]
    async fn test_integration_failures_do_not_fail_the_write() {
        let h = harness(synced(), true);
        h.mailer.fail();
        h.calendar.fail();

        let mut req = create_req("Resilient");
        req.due_date = Some(Utc::now() + Duration::days(1));
        let task = h.service.create(h.owner, req).await.unwrap();

        let stored = h.store.task(task.id).unwrap();
        assert_eq!(stored.title, "Resilient");
        assert_eq!(stored.calendar_event_id, None);
    }

    #[tokio::test]
    async fn test_sync_without_linked_account_is_skipped() {
        let h = harness(synced(), false);
        let mut req = create_req("Unlinked");
        req.due_date = Some(Utc::now());
        let task = h.service.create(h.owner, req).await.unwrap();

        assert!(h.calendar.calls().is_empty());
        assert_eq!(h.store.task(task.id).unwrap().calendar_event_id, None);
    }

    #[tokio::test]
    async fn test_delete_removes_event_and_notifies() {
        let h = harness(synced(), true);
        let mut req = create_req("Dentist");
        req.due_date = Some(Utc::now() + Duration::days(1));
        let task = h.service.create(h.owner, req).await.unwrap();

        h.service.delete(h.owner, task.id).await.unwrap();

        assert!(h.store.task(task.id).is_none());
        assert_eq!(
            h.calendar.calls().last(),
            Some(&CalendarCall::Delete("evt-1".to_string()))
        );
        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].subject.contains("deleted"));
    }

    #[tokio::test]
    async fn test_other_users_tasks_are_not_found() {
        let h = harness(UserSettings::default(), false);
        let task = h.service.create(h.owner, create_req("Mine")).await.unwrap();
        let stranger = Uuid::new_v4();

        assert!(matches!(
            h.service.get(stranger, task.id).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            h.service.delete(stranger, task.id).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            h.service.toggle(stranger, task.id).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(h.store.task(task.id).is_some());
    }

    #[tokio::test]
    async fn test_status_round_trip_through_service() {
        let h = harness(UserSettings::default(), false);
        let task = h.service.create(h.owner, create_req("Flow")).await.unwrap();

        let started = h
            .service
            .update_status(h.owner, task.id, TaskStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(started.previous_status, None);

        let done = h.service.toggle(h.owner, task.id).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.previous_status, Some(TaskStatus::InProgress));
        assert!(done.completed_at.is_some());

        let reopened = h.service.toggle(h.owner, task.id).await.unwrap();
        assert_eq!(reopened.status, TaskStatus::InProgress);
        assert_eq!(reopened.completed_at, None);
    }

    #[tokio::test]
    async fn test_empty_update_rejected() {
        let h = harness(UserSettings::default(), false);
        let task = h.service.create(h.owner, create_req("Same")).await.unwrap();
        let err = h
            .service
            .update(h.owner, task.id, UpdateTaskRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_stats() {
        let h = harness(UserSettings::default(), false);
        let mut late = create_req("Late");
        late.due_date = Some(Utc::now() - Duration::days(1));
        h.service.create(h.owner, late).await.unwrap();
        let mut done = create_req("Done");
        done.status = Some(TaskStatus::Completed);
        h.service.create(h.owner, done).await.unwrap();
        h.service.create(h.owner, create_req("Open")).await.unwrap();

        let stats = h.service.stats(h.owner).await.unwrap();
        assert_eq!(
            stats,
            TaskStats {
                total: 3,
                pending: 2,
                in_progress: 0,
                completed: 1,
                overdue: 1,
            }
        );
    }

    #[test]
    fn test_sort_by_due_puts_undated_last() {
        let now = Utc::now();
        let mut undated = task_fixture();
        undated.title = "undated".to_string();
        let mut soon = task_fixture();
        soon.title = "soon".to_string();
        soon.due_date = Some(now + Duration::hours(1));
        let mut later = task_fixture();
        later.title = "later".to_string();
        later.due_date = Some(now + Duration::days(2));

        let mut tasks = vec![undated.clone(), later.clone(), soon.clone()];
        sort_tasks(&mut tasks, TaskSort::Due, SortOrder::Asc);
        let titles: Vec<_> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["soon", "later", "undated"]);

        sort_tasks(&mut tasks, TaskSort::Due, SortOrder::Desc);
        let titles: Vec<_> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["later", "soon", "undated"]);
    }

    #[test]
    fn test_sort_by_priority() {
        let mut low = task_fixture();
        low.priority = TaskPriority::Low;
        let mut high = task_fixture();
        high.priority = TaskPriority::High;

        let mut tasks = vec![low, high];
        sort_tasks(&mut tasks, TaskSort::Priority, SortOrder::Desc);
        assert_eq!(tasks[0].priority, TaskPriority::High);
    }
}
