//! Task list controller
//!
//! Orchestrates the tasks board: paged list fetches under the current
//! filter, create, and the confirmed destructive operations. Every
//! mutation re-runs the list fetch afterwards so the view always shows
//! server truth; nothing is mutated optimistically. Gateway failures
//! are converted into an `Error` action plus a notice and never
//! propagate to the caller.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ConfirmPolicy, Notice, Notifier};
use crate::crm::{Task, TaskDraft, TaskPatch};
use crate::gateway::{Gateway, GatewayError, Page};
use crate::state::{Action, ViewError, ViewFilter, ViewState, ViewStore};

/// Records per page on the tasks board
pub const PAGE_SIZE: u64 = 10;

/// The task endpoints a controller needs
///
/// `TaskService` is the HTTP implementation; tests substitute an
/// in-memory fake.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list(
        &self,
        filter: Option<ViewFilter>,
        page: u32,
    ) -> Result<Page<Task>, GatewayError>;

    async fn create(&self, draft: &TaskDraft) -> Result<Task, GatewayError>;

    async fn update(&self, id: u64, patch: &TaskPatch) -> Result<Task, GatewayError>;

    async fn delete(&self, id: u64) -> Result<(), GatewayError>;
}

/// HTTP implementation of [`TaskApi`] over the CRM backend
pub struct TaskService {
    gateway: Gateway,
}

impl TaskService {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl TaskApi for TaskService {
    async fn list(
        &self,
        filter: Option<ViewFilter>,
        page: u32,
    ) -> Result<Page<Task>, GatewayError> {
        let mut query = vec![
            ("page", page.to_string()),
            ("page_size", PAGE_SIZE.to_string()),
        ];
        if let Some(filter) = filter {
            query.push((filter.query_key(), "true".to_string()));
        }

        self.gateway.get_with_query("/tasks/", &query).await
    }

    async fn create(&self, draft: &TaskDraft) -> Result<Task, GatewayError> {
        self.gateway.post("/tasks/", draft).await
    }

    async fn update(&self, id: u64, patch: &TaskPatch) -> Result<Task, GatewayError> {
        self.gateway.patch(&format!("/tasks/{}/", id), patch).await
    }

    async fn delete(&self, id: u64) -> Result<(), GatewayError> {
        self.gateway.delete(&format!("/tasks/{}/", id)).await
    }
}

/// Controller for the tasks board
pub struct TaskController<A: TaskApi> {
    api: A,
    store: Arc<ViewStore<Task>>,
    notifier: Arc<dyn Notifier>,
    confirm: Arc<dyn ConfirmPolicy>,
}

impl<A: TaskApi> TaskController<A> {
    pub fn new(api: A, notifier: Arc<dyn Notifier>, confirm: Arc<dyn ConfirmPolicy>) -> Self {
        Self {
            api,
            store: Arc::new(ViewStore::new()),
            notifier,
            confirm,
        }
    }

    /// The store rendering code subscribes to
    pub fn store(&self) -> Arc<ViewStore<Task>> {
        Arc::clone(&self.store)
    }

    /// Snapshot of the current view state
    pub async fn state(&self) -> ViewState<Task> {
        self.store.snapshot().await
    }

    /// Fresh load of a page; clears any active filter
    pub async fn load(&self, page: u32) {
        self.store.dispatch(Action::Loading).await;
        let generation = self.store.begin_fetch();

        match self.api.list(None, page).await {
            Ok(payload) => {
                self.store
                    .commit(generation, Action::Data { payload, page })
                    .await;
            }
            Err(e) => self.fail_fetch(generation, e).await,
        }
    }

    /// Move to another page under the current filter
    pub async fn change_page(&self, page: u32) {
        let filter = self.store.snapshot().await.filters.current();

        self.store.dispatch(Action::LoadingTable).await;
        let generation = self.store.begin_fetch();

        match self.api.list(filter, page).await {
            Ok(payload) => {
                self.store
                    .commit(generation, Action::Pagination { payload, page })
                    .await;
            }
            Err(e) => self.fail_fetch(generation, e).await,
        }
    }

    /// Apply a filter and reload from page 1
    pub async fn set_filter(&self, filter: ViewFilter) {
        self.store.dispatch(Action::Filter(filter)).await;
        self.store.dispatch(Action::LoadingTable).await;
        let generation = self.store.begin_fetch();

        match self.api.list(Some(filter), 1).await {
            Ok(payload) => {
                // Pagination keeps the filter that was just applied
                self.store
                    .commit(generation, Action::Pagination { payload, page: 1 })
                    .await;
            }
            Err(e) => self.fail_fetch(generation, e).await,
        }
    }

    /// Create a task, then reload the current page
    pub async fn create(&self, draft: TaskDraft) {
        match self.api.create(&draft).await {
            Ok(task) => {
                self.notifier
                    .notify(Notice::success(format!("Task \"{}\" created", task.title)));
                self.refresh().await;
            }
            Err(e) => self.fail(e).await,
        }
    }

    /// Mark a task complete, after confirmation
    pub async fn complete(&self, id: u64) {
        let prompt = format!("Mark task {} as complete?", id);
        if !self.confirm.confirm(&prompt).await {
            self.notifier.notify(Notice::info("Task left unchanged"));
            return;
        }

        match self.api.update(id, &TaskPatch::completed()).await {
            Ok(task) => {
                self.notifier
                    .notify(Notice::success(format!("Task \"{}\" completed", task.title)));
                self.refresh().await;
            }
            Err(e) => self.fail(e).await,
        }
    }

    /// Delete a task, after confirmation
    pub async fn remove(&self, id: u64) {
        let prompt = format!("Delete task {}? This cannot be undone.", id);
        if !self.confirm.confirm(&prompt).await {
            self.notifier.notify(Notice::info("Task left unchanged"));
            return;
        }

        match self.api.delete(id).await {
            Ok(()) => {
                self.notifier.notify(Notice::success("Task deleted"));
                self.refresh().await;
            }
            Err(e) => self.fail(e).await,
        }
    }

    /// Re-run the list fetch for the current page and filter
    async fn refresh(&self) {
        let state = self.store.snapshot().await;
        let filter = state.filters.current();
        let page = state.page;

        self.store.dispatch(Action::LoadingTable).await;
        let generation = self.store.begin_fetch();

        match self.api.list(filter, page).await {
            Ok(payload) => {
                self.store
                    .commit(generation, Action::Pagination { payload, page })
                    .await;
            }
            Err(e) => self.fail_fetch(generation, e).await,
        }
    }

    /// Convert a fetch failure into state + notice, respecting generations
    async fn fail_fetch(&self, generation: u64, error: GatewayError) {
        let error = ViewError::from(error);
        self.notifier.notify(Notice::error(error.message.clone()));
        self.store.commit(generation, Action::Error(error)).await;
    }

    /// Convert a mutation failure into state + notice
    async fn fail(&self, error: GatewayError) {
        let error = ViewError::from(error);
        self.notifier.notify(Notice::error(error.message.clone()));
        self.store.dispatch(Action::Error(error)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{AutoConfirm, ChannelNotifier, NoticeLevel};
    use crate::state::ErrorKind;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// In-memory task backend
    struct FakeApi {
        tasks: Mutex<Vec<Task>>,
        fail_listing: AtomicBool,
        delete_calls: AtomicUsize,
    }

    impl FakeApi {
        fn with_tasks(tasks: Vec<Task>) -> Self {
            Self {
                tasks: Mutex::new(tasks),
                fail_listing: AtomicBool::new(false),
                delete_calls: AtomicUsize::new(0),
            }
        }

        fn task(id: u64, title: &str, priority: bool, complete: bool) -> Task {
            Task {
                id,
                title: title.to_string(),
                description: None,
                due_date: None,
                priority,
                complete,
                client: None,
            }
        }
    }

    #[async_trait]
    impl TaskApi for &FakeApi {
        async fn list(
            &self,
            filter: Option<ViewFilter>,
            page: u32,
        ) -> Result<Page<Task>, GatewayError> {
            if self.fail_listing.load(Ordering::SeqCst) {
                return Err(GatewayError::Unavailable);
            }

            let tasks = self.tasks.lock().await;
            let matching: Vec<Task> = tasks
                .iter()
                .filter(|t| match filter {
                    Some(ViewFilter::Active) => !t.complete,
                    Some(ViewFilter::Priority) => t.priority,
                    Some(ViewFilter::Complete) => t.complete,
                    None => true,
                })
                .cloned()
                .collect();

            let start = ((page.max(1) - 1) as usize) * PAGE_SIZE as usize;
            let results: Vec<Task> = matching
                .iter()
                .skip(start)
                .take(PAGE_SIZE as usize)
                .cloned()
                .collect();

            Ok(Page {
                count: matching.len() as u64,
                next: None,
                previous: None,
                results,
            })
        }

        async fn create(&self, draft: &TaskDraft) -> Result<Task, GatewayError> {
            if draft.title.is_empty() {
                return Err(GatewayError::Validation("title required".to_string()));
            }

            let mut tasks = self.tasks.lock().await;
            let task = Task {
                id: tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1,
                title: draft.title.clone(),
                description: draft.description.clone(),
                due_date: draft.due_date,
                priority: draft.priority,
                complete: false,
                client: draft.client,
            };
            tasks.push(task.clone());
            Ok(task)
        }

        async fn update(&self, id: u64, patch: &TaskPatch) -> Result<Task, GatewayError> {
            let mut tasks = self.tasks.lock().await;
            let task = tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| GatewayError::NotFound(format!("task {}", id)))?;

            if let Some(complete) = patch.complete {
                task.complete = complete;
            }
            if let Some(title) = &patch.title {
                task.title = title.clone();
            }
            Ok(task.clone())
        }

        async fn delete(&self, id: u64) -> Result<(), GatewayError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            let mut tasks = self.tasks.lock().await;
            let before = tasks.len();
            tasks.retain(|t| t.id != id);
            if tasks.len() == before {
                return Err(GatewayError::NotFound(format!("task {}", id)));
            }
            Ok(())
        }
    }

    fn controller(api: &FakeApi) -> TaskController<&FakeApi> {
        let (notifier, _rx) = ChannelNotifier::new();
        TaskController::new(api, Arc::new(notifier), Arc::new(AutoConfirm(true)))
    }

    #[tokio::test]
    async fn test_load_populates_state() {
        let api = FakeApi::with_tasks(vec![
            FakeApi::task(1, "Flush intake line", false, false),
            FakeApi::task(2, "Send monthly report", true, false),
        ]);
        let controller = controller(&api);

        controller.load(1).await;

        let state = controller.state().await;
        assert!(!state.loading);
        assert_eq!(state.data.len(), 2);
        assert_eq!(state.quantity, 2);
        assert_eq!(state.page, 1);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_stale_data() {
        let api = FakeApi::with_tasks(vec![FakeApi::task(1, "Check pump", false, false)]);
        let controller = controller(&api);

        controller.load(1).await;
        api.fail_listing.store(true, Ordering::SeqCst);
        controller.change_page(2).await;

        let state = controller.state().await;
        assert_eq!(state.data.len(), 1, "stale data must stay visible");
        assert_eq!(state.error.as_ref().map(|e| e.kind), Some(ErrorKind::Network));
        assert!(!state.loading_table);
    }

    #[tokio::test]
    async fn test_failure_emits_error_notice() {
        let api = FakeApi::with_tasks(vec![]);
        api.fail_listing.store(true, Ordering::SeqCst);

        let (notifier, mut rx) = ChannelNotifier::new();
        let controller =
            TaskController::new(&api, Arc::new(notifier), Arc::new(AutoConfirm(true)));

        controller.load(1).await;

        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_set_filter_then_page_keeps_filter() {
        let mut tasks = Vec::new();
        for i in 1..=15 {
            tasks.push(FakeApi::task(i, &format!("Task {}", i), true, false));
        }
        tasks.push(FakeApi::task(99, "Not priority", false, false));
        let api = FakeApi::with_tasks(tasks);
        let controller = controller(&api);

        controller.set_filter(ViewFilter::Priority).await;
        let state = controller.state().await;
        assert!(state.filters.priority);
        assert_eq!(state.quantity, 15);
        assert_eq!(state.data.len(), PAGE_SIZE as usize);

        controller.change_page(2).await;
        let state = controller.state().await;
        assert!(state.filters.priority, "pagination keeps the filter");
        assert_eq!(state.page, 2);
        assert_eq!(state.data.len(), 5);
    }

    #[tokio::test]
    async fn test_declined_confirmation_issues_no_call() {
        let api = FakeApi::with_tasks(vec![FakeApi::task(1, "Keep me", false, false)]);
        let (notifier, _rx) = ChannelNotifier::new();
        let controller =
            TaskController::new(&api, Arc::new(notifier), Arc::new(AutoConfirm(false)));

        controller.remove(1).await;

        assert_eq!(api.delete_calls.load(Ordering::SeqCst), 0);
        assert_eq!(api.tasks.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_complete_refetches_server_truth() {
        let api = FakeApi::with_tasks(vec![FakeApi::task(1, "Calibrate", false, false)]);
        let controller = controller(&api);

        controller.load(1).await;
        controller.complete(1).await;

        let state = controller.state().await;
        assert!(state.data[0].complete, "view reflects the refetched record");
    }

    #[tokio::test]
    async fn test_remove_refetches_list() {
        let api = FakeApi::with_tasks(vec![
            FakeApi::task(1, "Old", false, true),
            FakeApi::task(2, "Current", false, false),
        ]);
        let controller = controller(&api);

        controller.load(1).await;
        controller.remove(1).await;

        let state = controller.state().await;
        assert_eq!(state.data.len(), 1);
        assert_eq!(state.data[0].id, 2);
        assert_eq!(state.quantity, 1);
    }

    #[tokio::test]
    async fn test_create_validation_error_surfaces() {
        let api = FakeApi::with_tasks(vec![]);
        let controller = controller(&api);

        controller.create(TaskDraft::new("")).await;

        let state = controller.state().await;
        assert_eq!(
            state.error.as_ref().map(|e| e.kind),
            Some(ErrorKind::Validation)
        );
    }
}
