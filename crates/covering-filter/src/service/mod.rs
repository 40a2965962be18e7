//! Service Layer
//!
//! - `CoveringFilterService` - maintains and publishes the local filter
//! - `RemoteFilterView` - applies a peer's publications

pub mod covering_filter_service;
pub mod remote_filter_view;

pub use covering_filter_service::CoveringFilterService;
pub use remote_filter_view::RemoteFilterView;
