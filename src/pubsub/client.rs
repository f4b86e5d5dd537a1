//! Pub/Sub administrative client (topics and subscriptions).

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use super::names::{project_path, subscription_path, topic_path};
use super::page::{collect_all, Page, PageRequest};
use super::types::{
    CreateSubscriptionRequest, ListSubscriptionsResponse, ListTopicSubscriptionsResponse,
    ListTopicsResponse, ModifyPushConfigRequest, PushConfig, Subscription, SubscriptionOptions,
    Topic,
};
use crate::config::PubSubConfig;
use crate::google::{Empty, GoogleError, RestClient, TokenProvider};

/// Client scoped to one project.
#[derive(Debug, Clone)]
pub struct PubSubClient {
    rest: RestClient,
    project: String,
    page_size: Option<u32>,
}

/// `Ok(None)` for NOT_FOUND, other errors pass through.
fn found<T>(result: Result<T, GoogleError>) -> Result<Option<T>, GoogleError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

impl PubSubClient {
    pub fn new(rest: RestClient, project: impl Into<String>) -> Self {
        Self {
            rest,
            project: project.into(),
            page_size: None,
        }
    }

    /// Page size used by the `all_*` listings.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn from_config(
        config: &PubSubConfig,
        project: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, GoogleError> {
        Ok(Self::new(RestClient::new(&config.endpoint, tokens)?, project)
            .with_page_size(config.page_size))
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn first_page(&self) -> PageRequest {
        PageRequest {
            page_size: self.page_size,
            page_token: None,
        }
    }

    // ---- topics ----

    pub async fn create_topic(&self, name: &str) -> Result<Topic, GoogleError> {
        let path = topic_path(&self.project, name);
        let topic: Topic = self.rest.put(&format!("v1/{path}"), &json!({})).await?;
        info!(topic = %topic.name, "Created topic");
        Ok(topic)
    }

    pub async fn get_topic(&self, name: &str) -> Result<Option<Topic>, GoogleError> {
        let path = topic_path(&self.project, name);
        found(self.rest.get(&format!("v1/{path}"), &[]).await)
    }

    pub async fn topic_exists(&self, name: &str) -> Result<bool, GoogleError> {
        Ok(self.get_topic(name).await?.is_some())
    }

    pub async fn delete_topic(&self, name: &str) -> Result<(), GoogleError> {
        let path = topic_path(&self.project, name);
        self.rest.delete(&format!("v1/{path}")).await?;
        info!(topic = %path, "Deleted topic");
        Ok(())
    }

    pub async fn list_topics(&self, request: &PageRequest) -> Result<Page<Topic>, GoogleError> {
        let path = format!("v1/{}/topics", project_path(&self.project));
        let response: ListTopicsResponse = self.rest.get(&path, &request.query()).await?;
        debug!(count = response.topics.len(), "Listed topics");
        Ok(Page::new(response.topics, response.next_page_token))
    }

    /// Full names of the subscriptions attached to `topic`.
    pub async fn topic_subscriptions(
        &self,
        topic: &str,
        request: &PageRequest,
    ) -> Result<Page<String>, GoogleError> {
        let path = format!("v1/{}/subscriptions", topic_path(&self.project, topic));
        let response: ListTopicSubscriptionsResponse =
            self.rest.get(&path, &request.query()).await?;
        Ok(Page::new(response.subscriptions, response.next_page_token))
    }

    /// Every topic of the project, up to `max`.
    pub async fn all_topics(&self, max: Option<usize>) -> Result<Vec<Topic>, GoogleError> {
        collect_all(
            move |req| async move { self.list_topics(&req).await },
            self.first_page(),
            max,
        )
        .await
    }

    pub async fn all_topic_subscriptions(
        &self,
        topic: &str,
        max: Option<usize>,
    ) -> Result<Vec<String>, GoogleError> {
        collect_all(
            move |req| async move { self.topic_subscriptions(topic, &req).await },
            self.first_page(),
            max,
        )
        .await
    }

    // ---- subscriptions ----

    pub async fn create_subscription(
        &self,
        topic: &str,
        name: &str,
        options: SubscriptionOptions,
    ) -> Result<Subscription, GoogleError> {
        let path = subscription_path(&self.project, name);
        let body = CreateSubscriptionRequest {
            topic: topic_path(&self.project, topic),
            ack_deadline_seconds: options.ack_deadline_seconds,
            push_config: options
                .push_endpoint
                .map(|push_endpoint| PushConfig { push_endpoint }),
        };
        let subscription: Subscription = self.rest.put(&format!("v1/{path}"), &body).await?;
        info!(
            subscription = %subscription.name,
            topic = %subscription.topic,
            "Created subscription"
        );
        Ok(subscription)
    }

    pub async fn get_subscription(&self, name: &str) -> Result<Option<Subscription>, GoogleError> {
        let path = subscription_path(&self.project, name);
        found(self.rest.get(&format!("v1/{path}"), &[]).await)
    }

    pub async fn subscription_exists(&self, name: &str) -> Result<bool, GoogleError> {
        Ok(self.get_subscription(name).await?.is_some())
    }

    pub async fn delete_subscription(&self, name: &str) -> Result<(), GoogleError> {
        let path = subscription_path(&self.project, name);
        self.rest.delete(&format!("v1/{path}")).await?;
        info!(subscription = %path, "Deleted subscription");
        Ok(())
    }

    pub async fn list_subscriptions(
        &self,
        request: &PageRequest,
    ) -> Result<Page<Subscription>, GoogleError> {
        let path = format!("v1/{}/subscriptions", project_path(&self.project));
        let response: ListSubscriptionsResponse = self.rest.get(&path, &request.query()).await?;
        Ok(Page::new(response.subscriptions, response.next_page_token))
    }

    /// Every subscription of the project, up to `max`.
    pub async fn all_subscriptions(
        &self,
        max: Option<usize>,
    ) -> Result<Vec<Subscription>, GoogleError> {
        collect_all(
            move |req| async move { self.list_subscriptions(&req).await },
            self.first_page(),
            max,
        )
        .await
    }

    /// Switch a subscription to push delivery, or back to pull with `None`.
    pub async fn set_push_endpoint(
        &self,
        name: &str,
        endpoint: Option<&str>,
    ) -> Result<(), GoogleError> {
        let path = subscription_path(&self.project, name);
        let body = ModifyPushConfigRequest {
            push_config: PushConfig {
                push_endpoint: endpoint.unwrap_or_default().to_string(),
            },
        };
        let _: Empty = self
            .rest
            .post(&format!("v1/{path}:modifyPushConfig"), &body)
            .await?;
        debug!(subscription = %path, push = endpoint.is_some(), "Updated push config");
        Ok(())
    }
}
