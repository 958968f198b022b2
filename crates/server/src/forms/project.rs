use serde::{Deserialize, Serialize};

use super::{check_max_length, check_required, check_slug, slugify, FieldErrors, MAX_LENGTH};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectFormData {
    pub title: String,
    pub dev_roles: String,
    pub lang_pref: String,
    /// Derived from the title when left blank.
    pub slug: String,
}

impl ProjectFormData {
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.slug = self.slug.trim().to_string();
        if self.slug.is_empty() {
            self.slug = slugify(&self.title);
        }
        self
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();

        if check_required(&mut errors, "title", &self.title) {
            check_max_length(&mut errors, "title", &self.title, MAX_LENGTH);
        }
        check_max_length(&mut errors, "dev_roles", &self.dev_roles, MAX_LENGTH);
        check_max_length(&mut errors, "lang_pref", &self.lang_pref, MAX_LENGTH);
        check_slug(&mut errors, "slug", &self.slug);

        errors
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectForm {
    #[serde(flatten)]
    pub data: ProjectFormData,
    pub errors: FieldErrors,
}
