use serde::Deserialize;

pub mod checklists;
pub mod health;
pub mod items;
pub mod templates;

/// `?include=items` on single-resource endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct IncludeQuery {
    pub include: Option<String>,
}

impl IncludeQuery {
    pub fn items(&self) -> bool {
        self.include
            .as_deref()
            .is_some_and(|include| include.split(',').any(|part| part.trim() == "items"))
    }
}
