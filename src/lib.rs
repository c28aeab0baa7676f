//! # Aquaview
//!
//! Client core for a water-monitoring CRM and its telemetry dashboards.
//! Every screen of the product repeats the same machinery; this crate
//! is that machinery, headless:
//!
//! - **Typed gateway**: REST calls with base-URL and bearer-token
//!   injection, explicit payload shapes, closed error taxonomy
//! - **View state**: pure reducers over a closed action enum, with
//!   stale-while-revalidate semantics and superseded-fetch protection
//! - **Controllers**: async orchestration of one user intent at a time,
//!   with confirmation gates on destructive operations
//! - **Telemetry**: IoT samples bucketed into chart-ready series,
//!   refreshed by a background poller
//!
//! ## Modules
//!
//! - [`gateway`]: HTTP access to the CRM backend
//! - [`state`]: view state, actions, reducer, store
//! - [`controller`]: per-intent orchestration and side-effect seams
//! - [`telemetry`]: series fetching, bucketing, polling
//! - [`session`]: persisted login state
//! - [`config`]: TOML + environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aquaview::config::Config;
//! use aquaview::controller::{AutoConfirm, LogNotifier, TaskController, TaskService};
//! use aquaview::gateway::Gateway;
//! use aquaview::session::SessionStore;
//! use aquaview::state::ViewFilter;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::load_default();
//!     let session = SessionStore::default_location().load().ok().flatten();
//!
//!     let gateway = Gateway::new(&config.api, session.as_ref());
//!     let controller = TaskController::new(
//!         TaskService::new(gateway),
//!         Arc::new(LogNotifier),
//!         Arc::new(AutoConfirm(true)),
//!     );
//!
//!     controller.load(1).await;
//!     controller.set_filter(ViewFilter::Priority).await;
//!
//!     let state = controller.state().await;
//!     println!("{} of {} tasks shown", state.data.len(), state.quantity);
//! }
//! ```

pub mod config;
pub mod controller;
pub mod crm;
pub mod gateway;
pub mod session;
pub mod state;
pub mod telemetry;

// Re-export top-level types for convenience
pub use config::{Config, ConfigError};

pub use crm::{Client, Credentials, Task, TaskDraft, TaskPatch};

pub use gateway::{Gateway, GatewayError, Page};

pub use session::{Session, SessionError, SessionStore, UserProfile};

pub use state::{
    reduce, Action, ErrorKind, FilterSet, ViewError, ViewFilter, ViewState, ViewStore,
};

pub use controller::{
    AuthController, AuthError, AutoConfirm, ChannelNotifier, ConfirmPolicy, LogNotifier, Notice,
    NoticeLevel, Notifier, TaskApi, TaskController, TaskService, PAGE_SIZE,
};

pub use telemetry::{
    BucketInterval, ChartSeries, PollStatus, PollerConfig, SeriesBucket, SeriesPoller,
    SeriesSource, TelemetryClient, TimeRange, TimeSeriesSample,
};
