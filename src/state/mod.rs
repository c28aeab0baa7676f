//! List View State
//!
//! The state machinery every list/detail screen repeats: a snapshot of
//! one screen's async data plus UI flags, a closed action enum, a pure
//! reducer, and the store that owns the state and serializes dispatch.

mod store;
mod view;

pub use store::ViewStore;
pub use view::{reduce, Action, ErrorKind, FilterSet, ViewError, ViewFilter, ViewState};
