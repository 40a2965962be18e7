//! # Integration Flows
//!
//! - `covering_flows`: server filter publication decoded on a peer
//! - `selector_flows`: shared selector service under concurrent delivery
//! - `subscription_routing`: topic coverage followed by selector evaluation

pub mod covering_flows;
pub mod selector_flows;
pub mod subscription_routing;
