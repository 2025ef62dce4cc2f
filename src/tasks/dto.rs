use serde::{Deserialize, Deserializer};

use super::repo_types::{NewTask, TaskUpdate};
use crate::errors::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// `description` distinguishes an absent field (`None`, keep) from an
/// explicit `null` (`Some(None)`, clear).
#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn required_title(title: &str) -> Result<String, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::validation("title is required"));
    }
    Ok(title.to_owned())
}

impl TryFrom<CreateTaskRequest> for NewTask {
    type Error = ApiError;

    fn try_from(req: CreateTaskRequest) -> Result<Self, Self::Error> {
        Ok(NewTask {
            title: required_title(req.title.as_deref().unwrap_or_default())?,
            description: req.description,
        })
    }
}

impl TryFrom<UpdateTaskRequest> for TaskUpdate {
    type Error = ApiError;

    fn try_from(req: UpdateTaskRequest) -> Result<Self, Self::Error> {
        Ok(TaskUpdate {
            title: req.title.as_deref().map(required_title).transpose()?,
            description: req.description,
            completed: req.completed,
        })
    }
}
