//! Topic and subscription value objects and their REST shapes.

use serde::{Deserialize, Serialize};

use super::names;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Full resource name, `projects/{project}/topics/{topic}`.
    pub name: String,
}

impl Topic {
    pub fn short_name(&self) -> &str {
        names::short_name(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub push_endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub name: String,
    /// Full topic name; `_deleted-topic_` once the topic is gone.
    pub topic: String,
    #[serde(default)]
    pub ack_deadline_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_config: Option<PushConfig>,
}

impl Subscription {
    pub fn short_name(&self) -> &str {
        names::short_name(&self.name)
    }

    /// `None` for pull subscriptions.
    pub fn push_endpoint(&self) -> Option<&str> {
        self.push_config
            .as_ref()
            .map(|c| c.push_endpoint.as_str())
            .filter(|e| !e.is_empty())
    }
}

/// Settings for a new subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionOptions {
    /// Seconds the service waits for an ack before redelivery (10..=600).
    pub ack_deadline_seconds: Option<u32>,
    /// Push delivery URL; pull when `None`.
    pub push_endpoint: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateSubscriptionRequest {
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack_deadline_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_config: Option<PushConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ModifyPushConfigRequest {
    pub push_config: PushConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListTopicsResponse {
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListSubscriptionsResponse {
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListTopicSubscriptionsResponse {
    #[serde(default)]
    pub subscriptions: Vec<String>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}
