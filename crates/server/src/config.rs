use std::env;

use crate::services::permissions::Permission;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Root directory for uploaded image and file items, served under `/media`.
    pub media_path: String,
    pub jwt_secret: String,
    /// Blank rows offered after the existing contents when editing a structure.
    pub module_extra_forms: usize,
    /// Request body limit for item submissions, in bytes.
    pub max_upload_bytes: usize,
    /// Permissions granted to every newly registered user.
    pub default_permissions: Vec<Permission>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/trueflame.db?mode=rwc".to_string()),
            media_path: env::var("MEDIA_PATH").unwrap_or_else(|_| "./data/media".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "development-secret-change-in-production".to_string()),
            module_extra_forms: env::var("MODULE_EXTRA_FORMS")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(2),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(10 * 1024 * 1024),
            default_permissions: env::var("DEFAULT_PERMISSIONS")
                .map(|list| parse_permissions(&list))
                .unwrap_or_else(|_| Permission::ALL.to_vec()),
        }
    }
}

/// Parses a comma-separated list of codenames. Unknown codenames are logged and dropped.
fn parse_permissions(list: &str) -> Vec<Permission> {
    list.split(',')
        .map(str::trim)
        .filter(|codename| !codename.is_empty())
        .filter_map(|codename| {
            let permission = Permission::from_codename(codename);
            if permission.is_none() {
                tracing::warn!("Ignoring unknown permission codename {codename:?}");
            }
            permission
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_permission_list() {
        let parsed = parse_permissions(" add_structure, view_structure ,,bogus");
        assert_eq!(
            parsed,
            vec![Permission::AddStructure, Permission::ViewStructure]
        );
    }

    #[test]
    fn empty_permission_list_grants_nothing() {
        assert!(parse_permissions("").is_empty());
    }
}
