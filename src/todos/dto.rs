use serde::{Deserialize, Deserializer};

use crate::{error::ApiError, extract::Validate};

pub const MAX_TITLE_LEN: usize = 100;

/// Body of `POST /todos/`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTodo {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// Body of `PUT /todos/{id}`. The outer `Option` records whether the field
/// was sent at all; the inner one carries an explicit `null`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoPatch {
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub completed: Option<Option<bool>>,
}

fn present<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

fn check_title(title: &str) -> Result<(), ApiError> {
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::Validation(format!(
            "title: String should have at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

impl Validate for NewTodo {
    fn validate(&self) -> Result<(), ApiError> {
        check_title(&self.title)
    }
}

impl Validate for TodoPatch {
    fn validate(&self) -> Result<(), ApiError> {
        match &self.title {
            Some(None) => return Err(ApiError::Validation("title: may not be null".into())),
            Some(Some(title)) => check_title(title)?,
            None => {}
        }
        if let Some(None) = self.completed {
            return Err(ApiError::Validation("completed: may not be null".into()));
        }
        Ok(())
    }
}

/// Column assignments of a validated patch. `None` leaves the column as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
}

impl TodoPatch {
    /// Fields absent from the payload become `None`; `description: null`
    /// becomes `Some(None)` and clears the column.
    pub fn into_changes(self) -> TodoChanges {
        TodoChanges {
            title: self.title.flatten(),
            description: self.description,
            completed: self.completed.flatten(),
        }
    }
}
