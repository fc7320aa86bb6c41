use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::codec::Shape;
use crate::validator::Validator;

pub const NAME_MAX_BYTES: usize = 200;
pub const DESCRIPTION_MAX_BYTES: usize = 2000;

/// A stored todo item. `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Item {
    pub id: i64,
    #[serde(skip_serializing)]
    pub created_at: OffsetDateTime,
    #[serde(rename = "item")]
    pub name: String,
    pub description: String,
}

impl Item {
    #[must_use]
    pub fn draft(&self) -> ItemDraft {
        ItemDraft {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

/// Client-controlled fields of an item, as written by insert and update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDraft {
    pub name: String,
    pub description: String,
}

/// Body of `POST /v1/list`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CreateItemInput {
    #[serde(default)]
    pub item: String,
    #[serde(default)]
    pub description: String,
}

impl Shape for CreateItemInput {
    const FIELDS: &'static [&'static str] = &["item", "description"];
}

impl From<CreateItemInput> for ItemDraft {
    fn from(input: CreateItemInput) -> Self {
        Self {
            name: input.item,
            description: input.description,
        }
    }
}

/// Body of `PATCH /v1/list/:id`; absent or null keys leave the stored value.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct UpdateItemInput {
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Shape for UpdateItemInput {
    const FIELDS: &'static [&'static str] = &["item", "description"];
}

impl UpdateItemInput {
    pub fn merge_into(self, item: &mut Item) {
        if let Some(name) = self.item {
            item.name = name;
        }
        if let Some(description) = self.description {
            item.description = description;
        }
    }
}

pub fn validate_item(v: &mut Validator, draft: &ItemDraft) {
    v.check(!draft.name.is_empty(), "item", "must be provided");
    v.check(
        draft.name.len() <= NAME_MAX_BYTES,
        "item",
        "must not be more than 200 bytes long",
    );
    v.check(
        draft.description.len() <= DESCRIPTION_MAX_BYTES,
        "description",
        "must not be more than 2000 bytes long",
    );
}
