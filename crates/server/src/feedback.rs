//! In-memory feedback store. Contents live for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    ThumbsUp,
    ThumbsDown,
    Alert,
    Star,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Feedback {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: FeedbackType,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct FeedbackStore {
    entries: Arc<RwLock<Vec<Feedback>>>,
}

impl FeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn submit(&self, feedback: Feedback) -> Feedback {
        self.entries.write().await.push(feedback.clone());
        feedback
    }

    /// All feedback in submission order.
    pub async fn list(&self) -> Vec<Feedback> {
        self.entries.read().await.clone()
    }

    pub async fn get(&self, id: Uuid) -> Option<Feedback> {
        self.entries
            .read()
            .await
            .iter()
            .find(|f| f.id == id)
            .cloned()
    }

    /// Removes every entry with `id`. Returns how many were removed.
    pub async fn delete(&self, id: Uuid) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|f| f.id != id);
        before - entries.len()
    }
}
