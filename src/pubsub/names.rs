//! Resource name expansion.
//!
//! `my-topic` becomes `projects/{project}/topics/my-topic`; a name that
//! already starts with `projects/` passes through unchanged.

const PROJECTS_PREFIX: &str = "projects/";

pub fn project_path(project: &str) -> String {
    format!("{PROJECTS_PREFIX}{project}")
}

pub fn topic_path(project: &str, name: &str) -> String {
    expand(project, "topics", name)
}

pub fn subscription_path(project: &str, name: &str) -> String {
    expand(project, "subscriptions", name)
}

/// Last path segment of a full resource name.
pub fn short_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn expand(project: &str, collection: &str, name: &str) -> String {
    if name.starts_with(PROJECTS_PREFIX) {
        name.to_string()
    } else {
        format!("{PROJECTS_PREFIX}{project}/{collection}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expansion() {
        assert_eq!(topic_path("p", "orders"), "projects/p/topics/orders");
        assert_eq!(
            subscription_path("p", "orders-sub"),
            "projects/p/subscriptions/orders-sub"
        );
        assert_eq!(
            topic_path("p", "projects/other/topics/orders"),
            "projects/other/topics/orders"
        );
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("projects/p/topics/orders"), "orders");
        assert_eq!(short_name("orders"), "orders");
    }
}
