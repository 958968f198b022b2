use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub dev_roles: String,
    pub lang_pref: String,
    pub slug: String,
}

/// Free-text planning notes attached to a structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(default)]
pub struct StructureAttributes {
    // Content organization
    pub content_organization: String,
    pub page_hierarchy: String,
    pub url_structure: String,

    // Design
    pub branding: String,
    pub layout: String,
    pub responsive_design: String,
    pub visual_elements: String,

    // UX/UI development
    pub navigation: String,
    pub user_flows: String,
    pub form_design: String,
    pub accessibility: String,

    // Security
    pub user_authentication: String,
    pub user_roles_permissions: String,
    pub input_validation: String,
    pub attack_protection: String,
    pub regular_updates: String,
}

impl StructureAttributes {
    pub fn fields(&self) -> [(&'static str, &str); 16] {
        [
            ("content_organization", &self.content_organization),
            ("page_hierarchy", &self.page_hierarchy),
            ("url_structure", &self.url_structure),
            ("branding", &self.branding),
            ("layout", &self.layout),
            ("responsive_design", &self.responsive_design),
            ("visual_elements", &self.visual_elements),
            ("navigation", &self.navigation),
            ("user_flows", &self.user_flows),
            ("form_design", &self.form_design),
            ("accessibility", &self.accessibility),
            ("user_authentication", &self.user_authentication),
            ("user_roles_permissions", &self.user_roles_permissions),
            ("input_validation", &self.input_validation),
            ("attack_protection", &self.attack_protection),
            ("regular_updates", &self.regular_updates),
        ]
    }
}

pub const STRUCTURE_COLUMNS: &str = "id, owner_id, project_id, title, \
    content_organization, page_hierarchy, url_structure, \
    branding, layout, responsive_design, visual_elements, \
    navigation, user_flows, form_design, accessibility, \
    user_authentication, user_roles_permissions, input_validation, attack_protection, regular_updates, \
    slug, overview, created_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Structure {
    pub id: String,
    pub owner_id: String,
    pub project_id: String,
    pub title: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub attributes: StructureAttributes,
    pub slug: String,
    pub overview: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Content {
    pub id: String,
    pub structure_id: String,
    pub title: String,
    pub description: String,
    #[sqlx(rename = "position")]
    pub order: i64,
}

/// The closed set of item kinds a content slot can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ItemKind {
    Text,
    Image,
    Video,
    File,
}

impl ItemKind {
    pub const ALL: [ItemKind; 4] = [
        ItemKind::Text,
        ItemKind::Image,
        ItemKind::Video,
        ItemKind::File,
    ];

    /// Resolves a route tag. Unknown tags resolve to `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn tag(self) -> &'static str {
        match self {
            ItemKind::Text => "text",
            ItemKind::Image => "image",
            ItemKind::Video => "video",
            ItemKind::File => "file",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            ItemKind::Text => "texts",
            ItemKind::Image => "images",
            ItemKind::Video => "videos",
            ItemKind::File => "files",
        }
    }

    /// Name of the kind-specific column, which is also its form field name.
    pub fn payload_field(self) -> &'static str {
        match self {
            ItemKind::Text => "content",
            ItemKind::Image | ItemKind::File => "file",
            ItemKind::Video => "url",
        }
    }

    /// Media subdirectory for kinds whose payload is an uploaded file.
    pub fn upload_dir(self) -> Option<&'static str> {
        match self {
            ItemKind::Image => Some("images"),
            ItemKind::File => Some("files"),
            ItemKind::Text | ItemKind::Video => None,
        }
    }

    /// Every model field of the kind, system-managed ones included.
    pub fn model_fields(self) -> [&'static str; 5] {
        ["owner", "title", "created", "updated", self.payload_field()]
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DiverseContent {
    pub id: String,
    pub content_id: String,
    pub item_kind: ItemKind,
    pub item_id: String,
    #[sqlx(rename = "position")]
    pub order: i64,
}

/// Fields shared by every item kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemBase {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ItemPayload {
    Text { content: String },
    Image { file: String },
    Video { url: String },
    File { file: String },
}

impl ItemPayload {
    pub fn from_column(kind: ItemKind, value: String) -> Self {
        match kind {
            ItemKind::Text => ItemPayload::Text { content: value },
            ItemKind::Image => ItemPayload::Image { file: value },
            ItemKind::Video => ItemPayload::Video { url: value },
            ItemKind::File => ItemPayload::File { file: value },
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            ItemPayload::Text { .. } => ItemKind::Text,
            ItemPayload::Image { .. } => ItemKind::Image,
            ItemPayload::Video { .. } => ItemKind::Video,
            ItemPayload::File { .. } => ItemKind::File,
        }
    }

    pub fn column_value(&self) -> &str {
        match self {
            ItemPayload::Text { content } => content,
            ItemPayload::Image { file } | ItemPayload::File { file } => file,
            ItemPayload::Video { url } => url,
        }
    }

    /// Stored media path, for kinds backed by an upload.
    pub fn stored_file(&self) -> Option<&str> {
        match self {
            ItemPayload::Image { file } | ItemPayload::File { file } => Some(file),
            ItemPayload::Text { .. } | ItemPayload::Video { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    #[serde(flatten)]
    pub base: ItemBase,
    #[serde(flatten)]
    pub payload: ItemPayload,
}
