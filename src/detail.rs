//! The task detail page: loads one task, lets the user edit it, and keeps
//! unsaved input as drafts in a [`DraftStore`].
//!
//! The page knows nothing about widgets. It works on a [`PageView`] and talks
//! to the user through a [`Presenter`], which is where modal dialogs and back
//! navigation live.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

use crate::drafts::{DraftStore, DELETED_KEYS, DESCRIPTION_KEY, DUE_DATE_KEY, PRIORITY_KEY, TASK_KEY};
use crate::models::{Alert, Confirm, Field, PageView, Route, UserTask};
use crate::service::TaskService;

/// Renderer-side collaborator. Every call suspends the page until the user
/// has answered.
#[async_trait]
pub trait Presenter: Send {
    async fn alert(&mut self, view: &PageView, alert: Alert);
    async fn confirm(&mut self, view: &PageView, confirm: Confirm) -> bool;
    async fn navigate_back(&mut self);
}

pub struct DetailPage<S, T, P> {
    store: S,
    service: T,
    presenter: P,
    route: Route,
    view: PageView,
}

impl<S, T, P> DetailPage<S, T, P>
where
    S: DraftStore,
    T: TaskService,
    P: Presenter,
{
    pub fn new(store: S, service: T, presenter: P, route: Route) -> Self {
        let mut page = DetailPage {
            store,
            service,
            presenter,
            route,
            view: PageView::default(),
        };
        page.initialize();
        page
    }

    /// Fills the entries with whatever draft text was saved last time.
    fn initialize(&mut self) {
        self.view.task_entry = self.read_draft(TASK_KEY);
        self.view.description_entry = self.read_draft(DESCRIPTION_KEY);
        self.view.priority_entry = self.read_draft(PRIORITY_KEY);
        self.view.due_date_entry = self.read_draft(DUE_DATE_KEY);
    }

    pub fn view(&self) -> &PageView {
        &self.view
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    /// Text of an entry. The checkbox has no text and reads as empty.
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Task => &self.view.task_entry,
            Field::Description => &self.view.description_entry,
            Field::Priority => &self.view.priority_entry,
            Field::DueDate => &self.view.due_date_entry,
            Field::Completed => "",
        }
    }

    pub fn set_field(&mut self, field: Field, value: String) {
        match field {
            Field::Task => self.view.task_entry = value,
            Field::Description => self.view.description_entry = value,
            Field::Priority => self.view.priority_entry = value,
            Field::DueDate => self.view.due_date_entry = value,
            Field::Completed => {}
        }
    }

    pub fn toggle_completed(&mut self) {
        self.view.is_completed = !self.view.is_completed;
    }

    pub async fn on_appear(&mut self) {
        let Route { task_id, user_id } = self.route;
        log::debug!("Navigated with TaskID: {} and UserID: {}", task_id, user_id);

        match self.service.fetch_task(user_id, task_id).await {
            Ok(Some(task)) => self.show_task(&task),
            Ok(None) => {
                self.presenter
                    .alert(&self.view, Alert::new("Error", "Task not found.", "OK"))
                    .await;
                log::warn!("No task found for TaskID: {} and UserID: {}", task_id, user_id);
                self.presenter.navigate_back().await;
            }
            Err(e) => {
                log::error!("Error loading task details: {}", e);
                self.presenter
                    .alert(&self.view, Alert::new("Error", "Failed to load task details.", "OK"))
                    .await;
            }
        }
    }

    fn show_task(&mut self, task: &UserTask) {
        self.view.page_title = task.title.clone();
        self.view.title_label = task.title.clone();
        self.view.task_entry = task.created_task.clone();
        self.view.description_entry = task.description.clone();
        self.view.priority_entry = format!("Priority: {}", task.priority_level);
        self.view.due_date_entry = format!("Due Date: {}", short_date(&task.due_date));
        self.view.is_completed = task.is_completed;
        self.view.detail_visible = true;
    }

    pub fn save_draft(&mut self) {
        let task = self.view.task_entry.clone();
        let description = self.view.description_entry.clone();
        let priority = self.view.priority_entry.clone();
        let due_date = self.view.due_date_entry.clone();

        self.write_draft(TASK_KEY, &task);
        self.write_draft(DESCRIPTION_KEY, &description);
        self.write_draft(PRIORITY_KEY, &priority);
        self.write_draft(DUE_DATE_KEY, &due_date);

        self.view.result_label = format!(
            "Saved Data: \nTask: {} \nDescription: {} \nPriority: {} \nDueDate: {}",
            task, description, priority, due_date
        );

        // Priority keeps its text.
        self.view.task_entry.clear();
        self.view.description_entry.clear();
        self.view.due_date_entry.clear();
    }

    pub async fn edit_and_save(&mut self) {
        let now = Local::now().naive_local();
        let task = UserTask {
            task_id: self.route.task_id,
            user_id: self.route.user_id,
            title: self.view.title_label.clone(),
            created_task: self.view.task_entry.clone(),
            description: self.view.description_entry.clone(),
            priority_level: parse_priority(&self.view.priority_entry),
            due_date: parse_due_date(&self.view.due_date_entry).unwrap_or(now),
            is_completed: self.view.is_completed,
            updated_date: now,
        };

        match self.service.update_task(&task).await {
            Ok(()) => {
                log::info!("Updated task {} for user {}", task.task_id, task.user_id);
                self.presenter
                    .alert(&self.view, Alert::new("Success", "Task updated successfully.", "OK"))
                    .await;
            }
            Err(e) => {
                log::error!("Error updating task: {}", e);
                self.presenter
                    .alert(&self.view, Alert::new("Error", "Failed to update task.", "OK"))
                    .await;
            }
        }
    }

    pub async fn delete_draft(&mut self) {
        let confirmed = self
            .presenter
            .confirm(
                &self.view,
                Confirm::new(
                    "Confirm Delete",
                    "Are you sure you want to delete your saved data?",
                    "Yes",
                    "No",
                ),
            )
            .await;
        if !confirmed {
            return;
        }

        // These are not the keys save_draft writes; saved drafts survive.
        for key in DELETED_KEYS {
            if let Err(e) = self.store.remove(key) {
                log::error!("Failed to remove draft key {}: {}", key, e);
            }
        }

        // Due date keeps its text.
        self.view.task_entry.clear();
        self.view.description_entry.clear();
        self.view.priority_entry.clear();

        self.presenter
            .alert(&self.view, Alert::new("Deleted", "Your data has been deleted!", "OK"))
            .await;
    }

    fn read_draft(&self, key: &str) -> String {
        match self.store.get(key) {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                log::warn!("Failed to read draft key {}: {}", key, e);
                String::new()
            }
        }
    }

    fn write_draft(&mut self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            log::error!("Failed to save draft key {}: {}", key, e);
        }
    }
}

/// `M/D/YYYY` without zero padding.
pub fn short_date(value: &NaiveDateTime) -> String {
    value.format("%-m/%-d/%Y").to_string()
}

/// Integer priority, or 0 when the text is not a number.
pub fn parse_priority(text: &str) -> i32 {
    text.trim().parse().unwrap_or(0)
}

// `%.f` also matches when there is no fractional part.
const DATE_TIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y"];

/// Parses a due date typed by the user. Date-only input means local midnight.
pub fn parse_due_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Local).naive_local());
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drafts::{MemoryDraftStore, SAVED_KEYS};
    use crate::error::ServiceError;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Shown {
        Alert(Alert),
        Confirm(Confirm),
        Back,
    }

    #[derive(Default)]
    struct RecordingPresenter {
        shown: Vec<Shown>,
        answer: bool,
        visible_at_back: Option<bool>,
        last_view: Option<PageView>,
    }

    #[async_trait]
    impl Presenter for RecordingPresenter {
        async fn alert(&mut self, view: &PageView, alert: Alert) {
            self.last_view = Some(view.clone());
            self.shown.push(Shown::Alert(alert));
        }

        async fn confirm(&mut self, view: &PageView, confirm: Confirm) -> bool {
            self.last_view = Some(view.clone());
            self.shown.push(Shown::Confirm(confirm));
            self.answer
        }

        async fn navigate_back(&mut self) {
            self.visible_at_back = self.last_view.as_ref().map(|v| v.detail_visible);
            self.shown.push(Shown::Back);
        }
    }

    enum Fetch {
        Found(UserTask),
        Missing,
        Broken,
    }

    struct ScriptedService {
        fetch: Fetch,
        fail_updates: bool,
        updates: Mutex<Vec<UserTask>>,
    }

    impl ScriptedService {
        fn new(fetch: Fetch) -> Self {
            ScriptedService {
                fetch,
                fail_updates: false,
                updates: Mutex::new(Vec::new()),
            }
        }

        fn updates(&self) -> Vec<UserTask> {
            self.updates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskService for ScriptedService {
        async fn fetch_task(&self, _user_id: i64, _task_id: i64) -> Result<Option<UserTask>, ServiceError> {
            match &self.fetch {
                Fetch::Found(task) => Ok(Some(task.clone())),
                Fetch::Missing => Ok(None),
                Fetch::Broken => Err(ServiceError::Status(500)),
            }
        }

        async fn update_task(&self, task: &UserTask) -> Result<(), ServiceError> {
            if self.fail_updates {
                return Err(ServiceError::Status(503));
            }
            self.updates.lock().unwrap().push(task.clone());
            Ok(())
        }
    }

    // Forwards to a service the test keeps hold of.
    #[async_trait]
    impl<'a> TaskService for &'a ScriptedService {
        async fn fetch_task(&self, user_id: i64, task_id: i64) -> Result<Option<UserTask>, ServiceError> {
            (**self).fetch_task(user_id, task_id).await
        }

        async fn update_task(&self, task: &UserTask) -> Result<(), ServiceError> {
            (**self).update_task(task).await
        }
    }

    const ROUTE: Route = Route { task_id: 12, user_id: 3 };

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, 0))
            .unwrap()
    }

    fn sample_task() -> UserTask {
        UserTask {
            task_id: 12,
            user_id: 3,
            title: "Plan trip".to_string(),
            created_task: "Book flights".to_string(),
            description: "Window seats".to_string(),
            priority_level: 4,
            due_date: at(2025, 3, 9, 17, 45),
            is_completed: true,
            updated_date: at(2025, 1, 1, 0, 0),
        }
    }

    fn page<'a>(
        store: &'a mut MemoryDraftStore,
        service: &'a ScriptedService,
        answer: bool,
    ) -> DetailPage<&'a mut MemoryDraftStore, &'a ScriptedService, RecordingPresenter> {
        let presenter = RecordingPresenter { answer, ..Default::default() };
        DetailPage::new(store, service, presenter, ROUTE)
    }

    fn shown<S, T>(page: &DetailPage<S, T, RecordingPresenter>) -> &[Shown] {
        &page.presenter.shown
    }

    #[test]
    fn construction_loads_saved_drafts() {
        let mut store = MemoryDraftStore::new();
        store.set(TASK_KEY, "draft task").unwrap();
        store.set(PRIORITY_KEY, "2").unwrap();
        let service = ScriptedService::new(Fetch::Missing);

        let page = page(&mut store, &service, false);
        let view = page.view();
        assert_eq!(view.task_entry, "draft task");
        assert_eq!(view.description_entry, "");
        assert_eq!(view.priority_entry, "2");
        assert_eq!(view.due_date_entry, "");
        assert!(!view.detail_visible);
    }

    #[tokio::test]
    async fn appearing_renders_the_fetched_task() {
        let mut store = MemoryDraftStore::new();
        let service = ScriptedService::new(Fetch::Found(sample_task()));
        let mut page = page(&mut store, &service, false);

        page.on_appear().await;

        let view = page.view();
        assert!(view.detail_visible);
        assert_eq!(view.page_title, "Plan trip");
        assert_eq!(view.title_label, "Plan trip");
        assert_eq!(view.task_entry, "Book flights");
        assert_eq!(view.description_entry, "Window seats");
        assert_eq!(view.priority_entry, "Priority: 4");
        assert_eq!(view.due_date_entry, "Due Date: 3/9/2025");
        assert!(view.is_completed);
        assert!(shown(&page).is_empty());
    }

    #[tokio::test]
    async fn missing_task_alerts_once_then_goes_back() {
        let mut store = MemoryDraftStore::new();
        let service = ScriptedService::new(Fetch::Missing);
        let mut page = page(&mut store, &service, false);

        page.on_appear().await;

        assert_eq!(
            shown(&page),
            &[
                Shown::Alert(Alert::new("Error", "Task not found.", "OK")),
                Shown::Back,
            ]
        );
        assert_eq!(page.presenter.visible_at_back, Some(false));
        assert!(!page.view().detail_visible);
    }

    #[tokio::test]
    async fn fetch_failure_alerts_without_leaving() {
        let mut store = MemoryDraftStore::new();
        store.set(TASK_KEY, "kept").unwrap();
        let service = ScriptedService::new(Fetch::Broken);
        let mut page = page(&mut store, &service, false);
        let before = page.view().clone();

        page.on_appear().await;

        assert_eq!(
            shown(&page),
            &[Shown::Alert(Alert::new("Error", "Failed to load task details.", "OK"))]
        );
        assert_eq!(page.view(), &before);
    }

    #[test]
    fn saved_drafts_come_back_on_a_new_page() {
        let mut store = MemoryDraftStore::new();
        let service = ScriptedService::new(Fetch::Missing);

        {
            let mut page = page(&mut store, &service, false);
            page.set_field(Field::Task, "Walk dog".to_string());
            page.set_field(Field::Description, "Around the park".to_string());
            page.set_field(Field::Priority, "1".to_string());
            page.set_field(Field::DueDate, "2025-05-05".to_string());
            page.save_draft();

            let view = page.view();
            assert_eq!(
                view.result_label,
                "Saved Data: \nTask: Walk dog \nDescription: Around the park \nPriority: 1 \nDueDate: 2025-05-05"
            );
            assert_eq!(view.task_entry, "");
            assert_eq!(view.description_entry, "");
            assert_eq!(view.priority_entry, "1");
            assert_eq!(view.due_date_entry, "");
        }

        assert_eq!(store.get(TASK_KEY).unwrap().as_deref(), Some("Walk dog"));
        assert_eq!(store.get(DESCRIPTION_KEY).unwrap().as_deref(), Some("Around the park"));

        let page = page(&mut store, &service, false);
        assert_eq!(page.field(Field::Task), "Walk dog");
        assert_eq!(page.field(Field::Description), "Around the park");
        assert_eq!(page.field(Field::Priority), "1");
        assert_eq!(page.field(Field::DueDate), "2025-05-05");
    }

    #[tokio::test]
    async fn edit_submits_parsed_fields_and_page_identity() {
        let mut store = MemoryDraftStore::new();
        let service = ScriptedService::new(Fetch::Found(sample_task()));
        let mut page = page(&mut store, &service, false);
        page.on_appear().await;

        page.set_field(Field::Task, "Book trains".to_string());
        page.set_field(Field::Priority, " 7 ".to_string());
        page.set_field(Field::DueDate, "2025-04-01 08:15".to_string());
        page.toggle_completed();
        page.edit_and_save().await;

        let updates = service.updates();
        assert_eq!(updates.len(), 1);
        let sent = &updates[0];
        assert_eq!(sent.task_id, 12);
        assert_eq!(sent.user_id, 3);
        assert_eq!(sent.title, "Plan trip");
        assert_eq!(sent.created_task, "Book trains");
        assert_eq!(sent.description, "Window seats");
        assert_eq!(sent.priority_level, 7);
        assert_eq!(sent.due_date, at(2025, 4, 1, 8, 15));
        assert!(!sent.is_completed);
        assert_eq!(
            shown(&page),
            &[Shown::Alert(Alert::new("Success", "Task updated successfully.", "OK"))]
        );
    }

    #[tokio::test]
    async fn edit_coerces_unparsable_priority_and_date() {
        let mut store = MemoryDraftStore::new();
        let service = ScriptedService::new(Fetch::Missing);
        let mut page = page(&mut store, &service, false);
        page.set_field(Field::Priority, "abc".to_string());
        page.set_field(Field::DueDate, "not-a-date".to_string());

        let before = Local::now().naive_local();
        page.edit_and_save().await;
        let after = Local::now().naive_local();

        let sent = &service.updates()[0];
        assert_eq!(sent.priority_level, 0);
        assert!(sent.due_date >= before && sent.due_date <= after);
        assert!(sent.updated_date >= before && sent.updated_date <= after);
    }

    #[tokio::test]
    async fn loaded_labels_do_not_parse_back() {
        let mut store = MemoryDraftStore::new();
        let service = ScriptedService::new(Fetch::Found(sample_task()));
        let mut page = page(&mut store, &service, false);
        page.on_appear().await;

        let before = Local::now().naive_local();
        page.edit_and_save().await;

        let sent = &service.updates()[0];
        assert_eq!(sent.priority_level, 0);
        assert!(sent.due_date >= before);
    }

    #[tokio::test]
    async fn failed_update_is_reported_not_raised() {
        let mut store = MemoryDraftStore::new();
        let mut service = ScriptedService::new(Fetch::Missing);
        service.fail_updates = true;
        let mut page = page(&mut store, &service, false);

        page.edit_and_save().await;

        assert_eq!(
            shown(&page),
            &[Shown::Alert(Alert::new("Error", "Failed to update task.", "OK"))]
        );
    }

    fn store_with_both_key_sets() -> MemoryDraftStore {
        let mut store = MemoryDraftStore::new();
        for key in SAVED_KEYS.iter().chain(DELETED_KEYS.iter()) {
            store.set(key, "value").unwrap();
        }
        store
    }

    #[tokio::test]
    async fn declined_delete_changes_nothing() {
        let mut store = store_with_both_key_sets();
        let before = store.entries().unwrap();
        let service = ScriptedService::new(Fetch::Missing);

        {
            let mut page = page(&mut store, &service, false);
            let view = page.view().clone();
            page.delete_draft().await;

            assert_eq!(page.view(), &view);
            assert_eq!(shown(&page).len(), 1);
            assert!(matches!(shown(&page)[0], Shown::Confirm(_)));
        }

        assert_eq!(store.entries().unwrap(), before);
    }

    #[tokio::test]
    async fn confirmed_delete_removes_only_the_user_keys() {
        let mut store = store_with_both_key_sets();
        let service = ScriptedService::new(Fetch::Missing);

        {
            let mut page = page(&mut store, &service, true);
            page.delete_draft().await;

            let view = page.view();
            assert_eq!(view.task_entry, "");
            assert_eq!(view.description_entry, "");
            assert_eq!(view.priority_entry, "");
            assert_eq!(view.due_date_entry, "value");
            assert_eq!(
                shown(&page),
                &[
                    Shown::Confirm(Confirm::new(
                        "Confirm Delete",
                        "Are you sure you want to delete your saved data?",
                        "Yes",
                        "No",
                    )),
                    Shown::Alert(Alert::new("Deleted", "Your data has been deleted!", "OK")),
                ]
            );
        }

        for key in DELETED_KEYS {
            assert_eq!(store.get(key).unwrap(), None, "{key} should be gone");
        }
        for key in SAVED_KEYS {
            assert_eq!(store.get(key).unwrap().as_deref(), Some("value"), "{key} should survive");
        }
    }

    #[test]
    fn due_dates_parse_in_common_forms() {
        assert_eq!(parse_due_date("2025-03-09"), Some(at(2025, 3, 9, 0, 0)));
        assert_eq!(parse_due_date(" 3/9/2025 "), Some(at(2025, 3, 9, 0, 0)));
        assert_eq!(parse_due_date("03/09/2025 14:30"), Some(at(2025, 3, 9, 14, 30)));
        assert_eq!(parse_due_date("2025-03-09T14:30:00"), Some(at(2025, 3, 9, 14, 30)));
        assert_eq!(parse_due_date("3/9/2025 5:45 PM"), Some(at(2025, 3, 9, 17, 45)));
        assert_eq!(parse_due_date("3/9/2025 5:45:00 PM"), Some(at(2025, 3, 9, 17, 45)));
        assert_eq!(parse_due_date("3/9/2025 12:10 AM"), Some(at(2025, 3, 9, 0, 10)));
        assert_eq!(parse_due_date("March 9, 2025"), Some(at(2025, 3, 9, 0, 0)));
        assert_eq!(parse_due_date("Mar 9, 2025"), Some(at(2025, 3, 9, 0, 0)));

        let fractional = at(2025, 3, 9, 14, 30) + chrono::Duration::milliseconds(123);
        assert_eq!(parse_due_date("2025-03-09T14:30:00.123"), Some(fractional));
        assert_eq!(parse_due_date("2025-03-09 14:30:00.123"), Some(fractional));
        assert!(parse_due_date("2025-03-09T14:30:00Z").is_some());
        assert_eq!(parse_due_date(""), None);
        assert_eq!(parse_due_date("Due Date: 3/9/2025"), None);
        assert_eq!(parse_due_date("2025-02-30"), None);
    }

    #[test]
    fn priority_parsing_defaults_to_zero() {
        assert_eq!(parse_priority("3"), 3);
        assert_eq!(parse_priority(" -2 "), -2);
        assert_eq!(parse_priority("Priority: 3"), 0);
        assert_eq!(parse_priority(""), 0);
    }

    #[test]
    fn short_date_has_no_padding() {
        assert_eq!(short_date(&at(2025, 1, 5, 23, 59)), "1/5/2025");
        assert_eq!(short_date(&at(2025, 12, 25, 0, 0)), "12/25/2025");
    }
}
