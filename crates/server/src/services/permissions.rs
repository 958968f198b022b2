use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{AppError, Result};

/// Model permissions a user may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewStructure,
    AddStructure,
    ChangeStructure,
    DeleteStructure,
    AddProject,
}

impl Permission {
    pub const ALL: [Permission; 5] = [
        Permission::ViewStructure,
        Permission::AddStructure,
        Permission::ChangeStructure,
        Permission::DeleteStructure,
        Permission::AddProject,
    ];

    pub fn codename(self) -> &'static str {
        match self {
            Permission::ViewStructure => "view_structure",
            Permission::AddStructure => "add_structure",
            Permission::ChangeStructure => "change_structure",
            Permission::DeleteStructure => "delete_structure",
            Permission::AddProject => "add_project",
        }
    }

    pub fn from_codename(codename: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.codename() == codename)
    }
}

pub async fn grant(pool: &SqlitePool, user_id: &str, permissions: &[Permission]) -> Result<()> {
    for permission in permissions {
        sqlx::query("INSERT OR IGNORE INTO user_permissions (user_id, codename) VALUES (?, ?)")
            .bind(user_id)
            .bind(permission.codename())
            .execute(pool)
            .await?;
    }
    Ok(())
}

pub async fn list(pool: &SqlitePool, user_id: &str) -> Result<Vec<Permission>> {
    let codenames = sqlx::query_scalar::<_, String>(
        "SELECT codename FROM user_permissions WHERE user_id = ? ORDER BY codename",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(codenames
        .iter()
        .filter_map(|c| Permission::from_codename(c))
        .collect())
}

/// Fails with 403 unless the user holds `permission`.
pub async fn require(pool: &SqlitePool, user_id: &str, permission: Permission) -> Result<()> {
    let held = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM user_permissions WHERE user_id = ? AND codename = ?",
    )
    .bind(user_id)
    .bind(permission.codename())
    .fetch_one(pool)
    .await?;

    if held == 0 {
        tracing::debug!(user_id, permission = permission.codename(), "permission denied");
        return Err(AppError::Forbidden(format!(
            "Missing permission: {}",
            permission.codename()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{seed_user, test_database};

    #[test]
    fn codenames_round_trip() {
        for permission in Permission::ALL {
            assert_eq!(Permission::from_codename(permission.codename()), Some(permission));
        }
        assert_eq!(Permission::from_codename("delete_project"), None);
    }

    #[tokio::test]
    async fn require_checks_granted_permissions() {
        let (db, _dir) = test_database().await;
        let user = seed_user(&db, "alice").await;

        assert!(matches!(
            require(&db.pool, &user, Permission::AddStructure).await,
            Err(AppError::Forbidden(_))
        ));

        grant(&db.pool, &user, &[Permission::AddStructure]).await.unwrap();
        // Granting twice is harmless.
        grant(&db.pool, &user, &[Permission::AddStructure]).await.unwrap();

        require(&db.pool, &user, Permission::AddStructure).await.unwrap();
        assert_eq!(list(&db.pool, &user).await.unwrap(), vec![Permission::AddStructure]);
    }
}
