use std::collections::HashMap;

use serde::Serialize;

use super::{add_error, check_max_length, check_required, FieldErrors, FormField, Widget, MAX_LENGTH};
use crate::db::models::{Item, ItemKind, ItemPayload};

/// Model fields that are set by the server and never accepted from a client.
pub const SYSTEM_FIELDS: [&str; 4] = ["owner", "order", "created", "updated"];

/// Fields of `kind` that a client may edit.
pub fn editable_fields(kind: ItemKind) -> Vec<&'static str> {
    kind.model_fields()
        .into_iter()
        .filter(|field| !SYSTEM_FIELDS.contains(field))
        .collect()
}

fn widget_for(field: &str) -> Widget {
    match field {
        "content" => Widget::Textarea,
        "url" => Widget::Url,
        "file" => Widget::File,
        _ => Widget::Text,
    }
}

fn max_length_for(field: &str) -> Option<usize> {
    match field {
        "title" | "url" => Some(MAX_LENGTH),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Raw submission: text parts by name plus the uploaded file, if any.
#[derive(Debug, Default)]
pub struct ItemFormData {
    pub fields: HashMap<String, String>,
    pub upload: Option<Upload>,
}

impl ItemFormData {
    fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug)]
pub enum CleanedPayload {
    Text(String),
    Video(String),
    Upload(Upload),
    /// Image or file update without a new upload.
    KeepFile,
}

#[derive(Debug)]
pub struct CleanedItem {
    pub title: String,
    pub payload: CleanedPayload,
}

#[derive(Debug, Serialize)]
pub struct ItemForm {
    pub kind: ItemKind,
    pub fields: Vec<FormField>,
    pub errors: FieldErrors,
}

impl ItemForm {
    /// Form for a new item, or prefilled from `instance`.
    pub fn unbound(kind: ItemKind, instance: Option<&Item>) -> Self {
        let fields = editable_fields(kind)
            .into_iter()
            .map(|name| {
                let value = instance.map(|item| match name {
                    "title" => item.base.title.clone(),
                    _ => item.payload.column_value().to_string(),
                });
                Self::field(name, instance, value)
            })
            .collect();

        Self {
            kind,
            fields,
            errors: FieldErrors::new(),
        }
    }

    fn field(name: &'static str, instance: Option<&Item>, value: Option<String>) -> FormField {
        let has_file = instance.is_some_and(|item| item.payload.stored_file().is_some());
        FormField {
            name,
            widget: widget_for(name),
            required: !(name == "file" && has_file),
            max_length: max_length_for(name),
            value,
        }
    }

    /// Validates a submission. On failure returns the form with the submitted values and errors.
    pub fn bind(
        kind: ItemKind,
        instance: Option<&Item>,
        data: ItemFormData,
    ) -> std::result::Result<CleanedItem, ItemForm> {
        let mut errors = FieldErrors::new();

        let title = data.text("title").trim().to_string();
        if check_required(&mut errors, "title", &title) {
            check_max_length(&mut errors, "title", &title, MAX_LENGTH);
        }

        let payload = match kind {
            ItemKind::Text => {
                let content = data.text("content").to_string();
                check_required(&mut errors, "content", &content);
                Some(CleanedPayload::Text(content))
            }
            ItemKind::Video => {
                let url = data.text("url").trim().to_string();
                if check_required(&mut errors, "url", &url) {
                    check_max_length(&mut errors, "url", &url, MAX_LENGTH);
                    if !is_valid_url(&url) {
                        add_error(&mut errors, "url", "Enter a valid URL.");
                    }
                }
                Some(CleanedPayload::Video(url))
            }
            ItemKind::Image | ItemKind::File => match &data.upload {
                Some(upload) if upload.data.is_empty() => {
                    add_error(&mut errors, "file", "The submitted file is empty.");
                    None
                }
                Some(upload) => Some(CleanedPayload::Upload(upload.clone())),
                None if instance.is_some_and(|item| item.payload.stored_file().is_some()) => {
                    Some(CleanedPayload::KeepFile)
                }
                None => {
                    add_error(&mut errors, "file", super::REQUIRED);
                    None
                }
            },
        };

        match payload {
            Some(payload) if errors.is_empty() => Ok(CleanedItem { title, payload }),
            _ => Err(Self::redisplay(kind, instance, &data, errors)),
        }
    }

    fn redisplay(
        kind: ItemKind,
        instance: Option<&Item>,
        data: &ItemFormData,
        errors: FieldErrors,
    ) -> Self {
        let fields = editable_fields(kind)
            .into_iter()
            .map(|name| {
                let value = match name {
                    // Uploads are not echoed; show what is stored.
                    "file" => instance
                        .and_then(|item| item.payload.stored_file())
                        .map(str::to_string),
                    _ => data.fields.get(name).cloned(),
                };
                Self::field(name, instance, value)
            })
            .collect();

        Self {
            kind,
            fields,
            errors,
        }
    }
}

fn is_valid_url(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some(),
        Err(_) => false,
    }
}

impl CleanedPayload {
    /// Final payload once any upload has been stored at `stored_path`.
    pub fn into_payload(
        self,
        kind: ItemKind,
        stored_path: Option<String>,
        previous: Option<&ItemPayload>,
    ) -> Option<ItemPayload> {
        match self {
            CleanedPayload::Text(content) => Some(ItemPayload::Text { content }),
            CleanedPayload::Video(url) => Some(ItemPayload::Video { url }),
            CleanedPayload::Upload(_) => {
                stored_path.map(|path| ItemPayload::from_column(kind, path))
            }
            CleanedPayload::KeepFile => previous.cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db::models::ItemBase;

    fn data(pairs: &[(&str, &str)]) -> ItemFormData {
        ItemFormData {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            upload: None,
        }
    }

    fn stored_image() -> Item {
        let now = Utc::now();
        Item {
            base: ItemBase {
                id: "img".into(),
                owner_id: "u".into(),
                title: "Logo".into(),
                created_at: now,
                updated_at: now,
            },
            payload: ItemPayload::Image {
                file: "images/abc-logo.png".into(),
            },
        }
    }

    #[test]
    fn excludes_system_managed_fields() {
        assert_eq!(editable_fields(ItemKind::Text), vec!["title", "content"]);
        assert_eq!(editable_fields(ItemKind::Video), vec!["title", "url"]);
        assert_eq!(editable_fields(ItemKind::Image), vec!["title", "file"]);
        assert_eq!(editable_fields(ItemKind::File), vec!["title", "file"]);
    }

    #[test]
    fn unbound_form_is_prefilled_from_instance() {
        let item = stored_image();
        let form = ItemForm::unbound(ItemKind::Image, Some(&item));

        assert_eq!(form.fields[0].value.as_deref(), Some("Logo"));
        assert_eq!(form.fields[1].value.as_deref(), Some("images/abc-logo.png"));
        assert!(!form.fields[1].required);
    }

    #[test]
    fn owner_in_submission_is_ignored() {
        let cleaned = ItemForm::bind(
            ItemKind::Text,
            None,
            data(&[("title", "Intro"), ("content", "Hello"), ("owner", "someone-else")]),
        )
        .unwrap();

        assert_eq!(cleaned.title, "Intro");
        assert!(matches!(cleaned.payload, CleanedPayload::Text(ref c) if c == "Hello"));
    }

    #[test]
    fn missing_fields_are_reported_per_field() {
        let form = ItemForm::bind(ItemKind::Text, None, data(&[("title", " ")])).unwrap_err();
        assert!(form.errors.contains_key("title"));
        assert!(form.errors.contains_key("content"));
    }

    #[test]
    fn video_urls_must_be_absolute_http() {
        for bad in ["not a url", "ftp://example.com/v.mp4", "https://"] {
            let form = ItemForm::bind(ItemKind::Video, None, data(&[("title", "Demo"), ("url", bad)]))
                .unwrap_err();
            assert!(form.errors.contains_key("url"), "{bad} accepted");
            assert_eq!(form.fields[1].value.as_deref(), Some(bad));
        }

        let ok = ItemForm::bind(
            ItemKind::Video,
            None,
            data(&[("title", "Demo"), ("url", "https://vimeo.com/123")]),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn new_file_items_need_an_upload() {
        let form = ItemForm::bind(ItemKind::File, None, data(&[("title", "Spec")])).unwrap_err();
        assert_eq!(form.errors["file"], vec![super::super::REQUIRED.to_string()]);

        let mut submitted = data(&[("title", "Spec")]);
        submitted.upload = Some(Upload {
            file_name: "spec.pdf".into(),
            data: Vec::new(),
        });
        let form = ItemForm::bind(ItemKind::File, None, submitted).unwrap_err();
        assert_eq!(form.errors["file"], vec!["The submitted file is empty.".to_string()]);
    }

    #[test]
    fn existing_file_items_keep_their_upload() {
        let item = stored_image();
        let cleaned = ItemForm::bind(ItemKind::Image, Some(&item), data(&[("title", "New logo")]))
            .unwrap();
        assert!(matches!(cleaned.payload, CleanedPayload::KeepFile));

        let payload = cleaned
            .payload
            .into_payload(ItemKind::Image, None, Some(&item.payload))
            .unwrap();
        assert_eq!(payload, item.payload);
    }
}
