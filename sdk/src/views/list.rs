//! Generic list view.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::rows::{count_header, ListItem, RowStyle};
use super::{ViewState, LOADING_TEXT, LOGIN_REQUIRED_TEXT};
use crate::client::{ClientConfig, ClientError, LexClient};
use crate::context::AppContext;
use crate::session::{stored_token, KeyValueStore};

/// Fetches one resource list with an authenticated client.
pub type Fetch<T> =
    Arc<dyn Fn(LexClient) -> BoxFuture<'static, Result<Vec<T>, ClientError>> + Send + Sync>;

/// A view over one fetched resource list.
///
/// The fetch runs on its own task. Unmounting (or dropping) the view aborts
/// it, so a late response never updates a view that is gone.
pub struct ListView<T> {
    name: &'static str,
    store: Arc<dyn KeyValueStore>,
    config: ClientConfig,
    fetch: Fetch<T>,
    state: Arc<watch::Sender<ViewState<Vec<T>>>>,
    task: Option<JoinHandle<()>>,
}

impl<T> std::fmt::Debug for ListView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListView")
            .field("name", &self.name)
            .field(
                "fetching",
                &self.task.as_ref().is_some_and(|task| !task.is_finished()),
            )
            .finish()
    }
}

impl<T> ListView<T>
where
    T: Send + Sync + 'static,
{
    /// Creates an unmounted view.
    pub fn new<F, Fut>(
        name: &'static str,
        store: Arc<dyn KeyValueStore>,
        config: ClientConfig,
        fetch: F,
    ) -> Self
    where
        F: Fn(LexClient) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>, ClientError>> + Send + 'static,
    {
        let (state, _) = watch::channel(ViewState::Loading);
        Self {
            name,
            store,
            config,
            fetch: Arc::new(move |client| fetch(client).boxed()),
            state: Arc::new(state),
            task: None,
        }
    }

    /// Creates an unmounted view using the context's store and client setup.
    pub fn from_context<F, Fut>(ctx: &AppContext, name: &'static str, fetch: F) -> Self
    where
        F: Fn(LexClient) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>, ClientError>> + Send + 'static,
    {
        Self::new(
            name,
            Arc::clone(ctx.store()),
            ctx.client_config().clone(),
            fetch,
        )
    }

    /// Returns the view name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Starts the fetch. Without a stored token the view becomes
    /// [`ViewState::LoginRequired`] and no request is made.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn mount(&mut self) {
        self.unmount();

        let Some(token) = stored_token(self.store.as_ref()) else {
            debug!("View {}: no auth token", self.name);
            self.state.send_replace(ViewState::LoginRequired);
            return;
        };

        let client = match LexClient::new(self.config.clone().with_token(token)) {
            Ok(client) => client,
            Err(e) => {
                self.state.send_replace(ViewState::Failed(e.to_string()));
                return;
            }
        };

        self.state.send_replace(ViewState::Loading);

        let name = self.name;
        let fetch = Arc::clone(&self.fetch);
        let state = Arc::clone(&self.state);
        self.task = Some(tokio::spawn(async move {
            let next = match fetch(client).await {
                Ok(items) => {
                    debug!("View {}: loaded {} items", name, items.len());
                    ViewState::Loaded(items)
                }
                Err(e) if e.is_auth_failure() => {
                    warn!("View {}: {}", name, e);
                    ViewState::LoginRequired
                }
                Err(e) => {
                    warn!("View {}: fetch failed: {}", name, e);
                    ViewState::Failed(e.to_string())
                }
            };
            state.send_replace(next);
        }));
    }

    /// Re-runs the fetch.
    pub fn refresh(&mut self) {
        self.mount();
    }

    /// Aborts an outstanding fetch. The state is left as it was.
    pub fn unmount(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                debug!("View {}: aborting fetch", self.name);
            }
            task.abort();
        }
    }

    /// Returns true while a fetch task is running.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Returns a receiver notified on every state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ViewState<Vec<T>>> {
        self.state.subscribe()
    }
}

impl<T> ListView<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Returns a snapshot of the state.
    #[must_use]
    pub fn state(&self) -> ViewState<Vec<T>> {
        self.state.borrow().clone()
    }

    /// Waits until the view leaves [`ViewState::Loading`].
    ///
    /// Returns at once when no fetch is running, so an unmounted or
    /// never-mounted view yields its current state.
    pub async fn settled(&self) -> ViewState<Vec<T>> {
        if !self.is_fetching() {
            return self.state();
        }
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(|state| !state.is_loading())
            .await
            .map(|state| state.clone());
        settled.unwrap_or_else(|_| self.state())
    }
}

impl<T> ListView<T>
where
    T: ListItem + Send + Sync + 'static,
{
    /// Renders the view as plain text.
    #[must_use]
    pub fn render(&self) -> String {
        self.render_styled(RowStyle::Plain)
    }

    /// Renders the view with the given row style.
    #[must_use]
    pub fn render_styled(&self, style: RowStyle) -> String {
        match &*self.state.borrow() {
            ViewState::Loading => LOADING_TEXT.to_string(),
            ViewState::LoginRequired => LOGIN_REQUIRED_TEXT.to_string(),
            ViewState::Failed(message) => format!("Error: {}", message),
            ViewState::Loaded(items) => {
                let mut out = count_header::<T>(items.len());
                for item in items {
                    out.push('\n');
                    out.push_str(&item.row(style));
                }
                out
            }
        }
    }
}

impl<T> Drop for ListView<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemoryStore, TOKEN_KEY};
    use crate::types::Case;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn store(token: Option<&str>) -> Arc<dyn KeyValueStore> {
        let store = MemoryStore::new();
        if let Some(token) = token {
            store.set(TOKEN_KEY, token).expect("set");
        }
        Arc::new(store)
    }

    fn config() -> ClientConfig {
        ClientConfig::new("http://127.0.0.1:9/api")
    }

    fn sample_cases(n: usize) -> Vec<Case> {
        (0..n)
            .map(|i| {
                serde_json::from_value(serde_json::json!({
                    "id": format!("c{}", i),
                    "title": format!("Case {}", i),
                    "status": "open"
                }))
                .expect("case")
            })
            .collect()
    }

    #[tokio::test]
    async fn test_mount_without_token_requires_login() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut view = ListView::new("cases", store(None), config(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(sample_cases(1)) }
        });

        view.mount();
        assert!(matches!(view.state(), ViewState::LoginRequired));
        assert_eq!(view.render(), "Please log in to continue.");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mount_renders_count() {
        let mut view = ListView::new("cases", store(Some("tok")), config(), |_| async {
            Ok(sample_cases(3))
        });
        assert_eq!(view.render(), "Loading...");

        view.mount();
        let state = view.settled().await;
        assert_eq!(state.data().map(Vec::len), Some(3));

        let rendered = view.render();
        let mut lines = rendered.lines();
        assert_eq!(lines.next(), Some("3 cases"));
        assert_eq!(lines.count(), 3);
    }

    #[tokio::test]
    async fn test_mount_renders_failure_without_list() {
        let mut view: ListView<Case> =
            ListView::new("cases", store(Some("tok")), config(), |_| async {
                Err(ClientError::Api {
                    code: "500".to_string(),
                    message: "database offline".to_string(),
                })
            });

        view.mount();
        view.settled().await;
        assert_eq!(view.render(), "Error: API error [500]: database offline");
        assert!(view.state().data().is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_requires_login() {
        let mut view: ListView<Case> =
            ListView::new("cases", store(Some("stale")), config(), |_| async {
                Err(ClientError::Unauthorized)
            });

        view.mount();
        assert!(matches!(view.settled().await, ViewState::LoginRequired));
    }

    #[tokio::test]
    async fn test_unmount_aborts_fetch() {
        let mut view = ListView::new("cases", store(Some("tok")), config(), |_| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(sample_cases(2))
        });

        view.mount();
        assert!(view.is_fetching());
        view.unmount();
        assert!(!view.is_fetching());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(view.state().is_loading());
    }

    #[tokio::test]
    async fn test_settled_returns_after_unmount() {
        let mut view = ListView::new("cases", store(Some("tok")), config(), |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(sample_cases(1))
        });

        view.mount();
        view.unmount();
        let state = tokio::time::timeout(Duration::from_secs(1), view.settled())
            .await
            .expect("settled after unmount");
        assert!(state.is_loading());
        assert_eq!(view.render(), "Loading...");
    }

    #[tokio::test]
    async fn test_settled_on_unmounted_view() {
        let view = ListView::new("cases", store(Some("tok")), config(), |_| async {
            Ok(sample_cases(1))
        });

        let state = tokio::time::timeout(Duration::from_secs(1), view.settled())
            .await
            .expect("settled without mount");
        assert!(state.is_loading());
    }

    #[tokio::test]
    async fn test_refresh_refetches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut view = ListView::new("cases", store(Some("tok")), config(), move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(sample_cases(n)) }
        });

        view.mount();
        view.settled().await;
        assert!(view.render().starts_with("1 case\n"));

        view.refresh();
        view.settled().await;
        assert!(view.render().starts_with("2 cases\n"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
