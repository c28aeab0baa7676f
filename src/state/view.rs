//! View state, actions, and the reducer
//!
//! `ViewState` is the in-memory representation of one screen's async
//! data. State only changes by running an `Action` through [`reduce`],
//! which is pure: it never mutates its input and has no side effects.
//! While a fetch is in flight the previous `data` stays visible
//! (stale-while-revalidate); a failed fetch sets `error` and leaves
//! `data` untouched.

use serde::{Deserialize, Serialize};

use crate::gateway::{GatewayError, Page};

/// Named filters a list view can be narrowed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewFilter {
    /// Open tasks
    Active,
    /// Priority tasks
    Priority,
    /// Completed tasks
    Complete,
}

impl ViewFilter {
    /// Query parameter name for this filter
    pub fn query_key(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Priority => "priority",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for ViewFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.query_key())
    }
}

/// Mutually exclusive filter flags
///
/// At most one flag is true at any time. The type is only constructed
/// through [`FilterSet::none`] and [`FilterSet::only`]; every change is
/// a full replacement, never an incremental merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterSet {
    pub active: bool,
    pub priority: bool,
    pub complete: bool,
}

impl FilterSet {
    /// No filter applied
    pub fn none() -> Self {
        Self::default()
    }

    /// Exactly one flag set
    pub fn only(filter: ViewFilter) -> Self {
        let mut set = Self::default();
        match filter {
            ViewFilter::Active => set.active = true,
            ViewFilter::Priority => set.priority = true,
            ViewFilter::Complete => set.complete = true,
        }
        set
    }

    /// The currently selected filter, if any
    pub fn current(&self) -> Option<ViewFilter> {
        if self.active {
            Some(ViewFilter::Active)
        } else if self.priority {
            Some(ViewFilter::Priority)
        } else if self.complete {
            Some(ViewFilter::Complete)
        } else {
            None
        }
    }

    /// Number of flags set
    pub fn set_count(&self) -> usize {
        [self.active, self.priority, self.complete]
            .iter()
            .filter(|b| **b)
            .count()
    }
}

/// Error classification for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport failure or backend unreachable
    Network,
    /// Rejected input, shown inline near the offending field
    Validation,
    /// Resource missing, rendered as an empty state
    NotFound,
    /// Any other backend failure
    Api,
}

/// Render-safe projection of a gateway failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ViewError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ViewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<GatewayError> for ViewError {
    fn from(e: GatewayError) -> Self {
        let kind = match &e {
            GatewayError::Unavailable | GatewayError::Timeout | GatewayError::Request(_) => {
                ErrorKind::Network
            }
            GatewayError::Validation(_) => ErrorKind::Validation,
            GatewayError::NotFound(_) => ErrorKind::NotFound,
            GatewayError::Api { .. } | GatewayError::Decode(_) => ErrorKind::Api,
        };
        Self::new(kind, e.to_string())
    }
}

/// State transition events for a list view
///
/// Created by a controller, consumed exactly once by [`reduce`] (moved
/// in), then dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum Action<R> {
    /// A full reload started
    Loading,
    /// A page change started; only the table area shows a spinner
    LoadingTable,
    /// A fresh load landed
    Data { payload: Page<R>, page: u32 },
    /// A page change landed under the current filter
    Pagination { payload: Page<R>, page: u32 },
    /// The user selected a filter
    Filter(ViewFilter),
    /// A fetch failed
    Error(ViewError),
}

/// One screen's async data and UI flags
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState<R> {
    /// Full-view spinner
    pub loading: bool,
    /// Table-only spinner during pagination
    pub loading_table: bool,
    /// Records from the last successful fetch
    pub data: Vec<R>,
    /// Total records matching the query, across all pages
    pub quantity: u64,
    /// Current page (1-based)
    pub page: u32,
    pub filters: FilterSet,
    pub error: Option<ViewError>,
}

impl<R> Default for ViewState<R> {
    fn default() -> Self {
        Self {
            loading: false,
            loading_table: false,
            data: Vec::new(),
            quantity: 0,
            page: 1,
            filters: FilterSet::none(),
            error: None,
        }
    }
}

impl<R> ViewState<R> {
    /// Number of pages at the given page size (at least 1)
    pub fn total_pages(&self, page_size: u64) -> u64 {
        if page_size == 0 || self.quantity == 0 {
            1
        } else {
            self.quantity.div_ceil(page_size)
        }
    }

    /// Whether any records are currently displayed
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }
}

/// Apply an action to a state snapshot, producing the next state
///
/// Pure and total over the action enum; the match is exhaustive, so a
/// new action variant cannot be added without deciding its transition.
pub fn reduce<R: Clone>(state: &ViewState<R>, action: Action<R>) -> ViewState<R> {
    match action {
        Action::Loading => ViewState {
            loading: true,
            ..state.clone()
        },
        Action::LoadingTable => ViewState {
            loading_table: true,
            ..state.clone()
        },
        // A fresh load replaces everything, including any active filter
        Action::Data { payload, page } => ViewState {
            loading: false,
            loading_table: false,
            data: payload.results,
            quantity: payload.count,
            page,
            filters: FilterSet::none(),
            error: None,
        },
        // A page change keeps the current filter
        Action::Pagination { payload, page } => ViewState {
            loading: false,
            loading_table: false,
            data: payload.results,
            quantity: payload.count,
            page,
            filters: state.filters,
            error: None,
        },
        Action::Filter(filter) => ViewState {
            filters: FilterSet::only(filter),
            ..state.clone()
        },
        Action::Error(error) => ViewState {
            loading: false,
            loading_table: false,
            error: Some(error),
            ..state.clone()
        },
    }
}
