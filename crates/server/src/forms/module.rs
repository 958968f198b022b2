// Batch editing of the content rows of one structure.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{add_error, check_max_length, check_required, FieldErrors, INVALID_CHOICE, MAX_LENGTH};
use crate::db::models::Content;

/// Upper bound on rows accepted in one submission.
pub const MAX_NUM_FORMS: usize = 1000;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentRowData {
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub delete: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ModuleFormSetData {
    pub forms: Vec<ContentRowData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentRow {
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub order: Option<i64>,
    pub delete: bool,
    pub errors: FieldErrors,
}

#[derive(Debug, Serialize)]
pub struct ModuleFormSet {
    pub structure_id: String,
    pub initial_forms: usize,
    pub extra: usize,
    pub max_num_forms: usize,
    pub forms: Vec<ContentRow>,
    pub non_form_errors: Vec<String>,
}

/// A validated change to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowChange {
    Create { title: String, description: String },
    Update { id: String, title: String, description: String },
    Delete { id: String },
}

impl ModuleFormSet {
    pub fn unbound(structure_id: &str, existing: &[Content], extra: usize) -> Self {
        let mut forms: Vec<ContentRow> = existing
            .iter()
            .map(|content| ContentRow {
                id: Some(content.id.clone()),
                title: content.title.clone(),
                description: content.description.clone(),
                order: Some(content.order),
                delete: false,
                errors: FieldErrors::new(),
            })
            .collect();

        forms.extend((0..extra).map(|_| ContentRow {
            id: None,
            title: String::new(),
            description: String::new(),
            order: None,
            delete: false,
            errors: FieldErrors::new(),
        }));

        Self {
            structure_id: structure_id.to_string(),
            initial_forms: existing.len(),
            extra,
            max_num_forms: MAX_NUM_FORMS,
            forms,
            non_form_errors: Vec::new(),
        }
    }

    /// Validates every row. Either all rows are valid and the changes are
    /// returned, or the formset comes back with errors and nothing applies.
    pub fn bind(
        structure_id: &str,
        existing: &[Content],
        extra: usize,
        data: ModuleFormSetData,
    ) -> std::result::Result<Vec<RowChange>, ModuleFormSet> {
        let mut non_form_errors = Vec::new();
        if data.forms.len() > MAX_NUM_FORMS {
            non_form_errors.push(format!("Please submit at most {MAX_NUM_FORMS} forms."));
        }

        let mut seen = HashSet::new();
        let mut changes = Vec::new();
        let mut rows = Vec::with_capacity(data.forms.len());
        let mut valid = non_form_errors.is_empty();

        for row in data.forms {
            let mut errors = FieldErrors::new();
            let title = row.title.trim().to_string();
            let description = row.description.trim().to_string();

            let current = match &row.id {
                Some(id) => match existing.iter().find(|content| &content.id == id) {
                    Some(content) if seen.insert(id.clone()) => Some(content),
                    Some(_) => {
                        add_error(&mut errors, "id", "Please correct the duplicate data for id.");
                        None
                    }
                    None => {
                        add_error(&mut errors, "id", INVALID_CHOICE);
                        None
                    }
                },
                None => None,
            };

            let change = match (&row.id, current) {
                (Some(_), None) => None,
                (Some(id), Some(_)) if row.delete => Some(RowChange::Delete { id: id.clone() }),
                (Some(id), Some(content)) => {
                    if validate_row(&mut errors, &title) {
                        let unchanged = content.title == title && content.description == description;
                        (!unchanged).then(|| RowChange::Update {
                            id: id.clone(),
                            title: title.clone(),
                            description: description.clone(),
                        })
                    } else {
                        None
                    }
                }
                // Untouched or discarded blank rows.
                (None, _) if row.delete || (title.is_empty() && description.is_empty()) => None,
                (None, _) => validate_row(&mut errors, &title).then(|| RowChange::Create {
                    title: title.clone(),
                    description: description.clone(),
                }),
            };

            if !errors.is_empty() {
                valid = false;
            }
            changes.extend(change);
            rows.push(ContentRow {
                order: current.map(|content| content.order),
                id: row.id,
                title: row.title,
                description: row.description,
                delete: row.delete,
                errors,
            });
        }

        if valid {
            return Ok(changes);
        }

        Err(Self {
            structure_id: structure_id.to_string(),
            initial_forms: existing.len(),
            extra,
            max_num_forms: MAX_NUM_FORMS,
            forms: rows,
            non_form_errors,
        })
    }
}

fn validate_row(errors: &mut FieldErrors, title: &str) -> bool {
    if check_required(errors, "title", title) {
        check_max_length(errors, "title", title, MAX_LENGTH);
    }
    errors.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(id: &str, title: &str, order: i64) -> Content {
        Content {
            id: id.into(),
            structure_id: "s".into(),
            title: title.into(),
            description: String::new(),
            order,
        }
    }

    fn row(id: Option<&str>, title: &str, delete: bool) -> ContentRowData {
        ContentRowData {
            id: id.map(str::to_string),
            title: title.into(),
            description: String::new(),
            delete,
        }
    }

    #[test]
    fn unbound_adds_extra_blank_rows() {
        let existing = vec![content("a", "Intro", 0), content("b", "Outro", 1)];
        let formset = ModuleFormSet::unbound("s", &existing, 2);

        assert_eq!(formset.initial_forms, 2);
        assert_eq!(formset.forms.len(), 4);
        assert_eq!(formset.forms[1].order, Some(1));
        assert!(formset.forms[2].id.is_none());
        assert!(formset.forms[3].title.is_empty());
    }

    #[test]
    fn collects_creates_updates_and_deletes() {
        let existing = vec![content("a", "Intro", 0), content("b", "Outro", 1), content("c", "Same", 2)];
        let data = ModuleFormSetData {
            forms: vec![
                row(Some("a"), "Introduction", false),
                row(Some("b"), "Outro", true),
                row(Some("c"), "Same", false),
                row(None, "Pricing", false),
                row(None, "", false),
                row(None, "Discarded", true),
            ],
        };

        let changes = ModuleFormSet::bind("s", &existing, 2, data).unwrap();
        assert_eq!(
            changes,
            vec![
                RowChange::Update {
                    id: "a".into(),
                    title: "Introduction".into(),
                    description: String::new(),
                },
                RowChange::Delete { id: "b".into() },
                RowChange::Create {
                    title: "Pricing".into(),
                    description: String::new(),
                },
            ]
        );
    }

    #[test]
    fn one_bad_row_rejects_the_batch() {
        let existing = vec![content("a", "Intro", 0)];
        let data = ModuleFormSetData {
            forms: vec![
                row(Some("a"), "Introduction", false),
                row(None, "Pricing", false),
                ContentRowData {
                    id: None,
                    title: String::new(),
                    description: "no title".into(),
                    delete: false,
                },
            ],
        };

        let formset = ModuleFormSet::bind("s", &existing, 2, data).unwrap_err();
        assert!(formset.forms[0].errors.is_empty());
        assert!(formset.forms[1].errors.is_empty());
        assert!(formset.forms[2].errors.contains_key("title"));
    }

    #[test]
    fn foreign_and_duplicate_ids_are_errors() {
        let existing = vec![content("a", "Intro", 0)];
        let data = ModuleFormSetData {
            forms: vec![
                row(Some("zzz"), "Other", false),
                row(Some("a"), "Intro", false),
                row(Some("a"), "Intro again", false),
            ],
        };

        let formset = ModuleFormSet::bind("s", &existing, 2, data).unwrap_err();
        assert_eq!(formset.forms[0].errors["id"], vec![INVALID_CHOICE.to_string()]);
        assert!(formset.forms[1].errors.is_empty());
        assert!(formset.forms[2].errors.contains_key("id"));
    }

    #[test]
    fn caps_the_number_of_rows() {
        let data = ModuleFormSetData {
            forms: (0..=MAX_NUM_FORMS).map(|_| row(None, "", false)).collect(),
        };
        let formset = ModuleFormSet::bind("s", &[], 2, data).unwrap_err();
        assert_eq!(formset.non_form_errors.len(), 1);
    }
}
