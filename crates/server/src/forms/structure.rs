use serde::{Deserialize, Serialize};

use super::{check_max_length, check_required, check_slug, FieldErrors, MAX_LENGTH};
use crate::db::models::{Structure, StructureAttributes};

/// Editable structure fields. The owner always comes from the authenticated user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureFormData {
    pub title: String,
    /// Project id.
    pub project: String,
    pub overview: String,
    pub slug: String,
    #[serde(flatten)]
    pub attributes: StructureAttributes,
}

impl StructureFormData {
    pub fn from_structure(structure: &Structure) -> Self {
        Self {
            title: structure.title.clone(),
            project: structure.project_id.clone(),
            overview: structure.overview.clone(),
            slug: structure.slug.clone(),
            attributes: structure.attributes.clone(),
        }
    }

    /// Trims the short fields the way they are stored.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.project = self.project.trim().to_string();
        self.slug = self.slug.trim().to_string();
        self
    }

    /// Checks that need no database access.
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();

        if check_required(&mut errors, "title", &self.title) {
            check_max_length(&mut errors, "title", &self.title, MAX_LENGTH);
        }
        check_required(&mut errors, "project", &self.project);
        check_required(&mut errors, "overview", &self.overview);
        check_slug(&mut errors, "slug", &self.slug);

        for (field, value) in self.attributes.fields() {
            check_max_length(&mut errors, field, value, MAX_LENGTH);
        }

        errors
    }
}

#[derive(Debug, Serialize)]
pub struct StructureForm {
    #[serde(flatten)]
    pub data: StructureFormData,
    pub errors: FieldErrors,
}
