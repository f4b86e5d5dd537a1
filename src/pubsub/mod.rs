//! Cloud Pub/Sub topic and subscription management.
//!
//! Administrative surface only: create, inspect, list and delete topics and
//! subscriptions, and switch subscriptions between pull and push delivery.
//! Names may be given short (`orders`) or fully qualified.

pub mod client;
pub mod names;
pub mod page;
pub mod types;

pub use client::PubSubClient;
pub use page::{collect_all, Page, PageRequest};
pub use types::{PushConfig, Subscription, SubscriptionOptions, Topic};
