/// Errors surfaced by the topic store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A vote targeted a topic id that is not in the store
    TopicNotFound(String),
    /// Backend failure (non-memory implementations, test doubles)
    Internal(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::TopicNotFound(id) => write!(f, "topic not found: {}", id),
            StoreError::Internal(msg) => write!(f, "storage error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            StoreError::TopicNotFound("t42".to_string()).to_string(),
            "topic not found: t42"
        );
        assert_eq!(
            StoreError::Internal("disk on fire".to_string()).to_string(),
            "storage error: disk on fire"
        );
    }
}
