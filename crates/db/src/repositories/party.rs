use sqlx::Row;

use lanehaul_core::domain::party::{CompanyId, Role, User, UserId, Vendor, VendorId};

use super::{parse_stored, PartyRepository, RepositoryError};
use crate::DbPool;

const USER_COLUMNS: &str = "id, name, email, phone, role, company_id, vendor_id, is_active";
const VENDOR_COLUMNS: &str = "id, name, email, phone, rating, is_active";

pub struct SqlPartyRepository {
    pool: DbPool,
}

impl SqlPartyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    let decode = |err: sqlx::Error| RepositoryError::Decode(err.to_string());

    let role_str: String = row.try_get("role").map_err(decode)?;

    Ok(User {
        id: UserId(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
        phone: row.try_get("phone").map_err(decode)?,
        role: parse_stored("app_user.role", &role_str, Role::parse)?,
        company_id: row.try_get::<Option<i64>, _>("company_id").map_err(decode)?.map(CompanyId),
        vendor_id: row.try_get::<Option<i64>, _>("vendor_id").map_err(decode)?.map(VendorId),
        is_active: row.try_get::<i64, _>("is_active").map_err(decode)? != 0,
    })
}

pub(crate) fn row_to_vendor(row: &sqlx::sqlite::SqliteRow) -> Result<Vendor, RepositoryError> {
    let decode = |err: sqlx::Error| RepositoryError::Decode(err.to_string());

    Ok(Vendor {
        id: VendorId(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
        phone: row.try_get("phone").map_err(decode)?,
        rating: row.try_get("rating").map_err(decode)?,
        is_active: row.try_get::<i64, _>("is_active").map_err(decode)? != 0,
    })
}

#[async_trait::async_trait]
impl PartyRepository for SqlPartyRepository {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM app_user WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_user(r)?)),
            None => Ok(None),
        }
    }

    async fn find_vendor(&self, id: VendorId) -> Result<Option<Vendor>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {VENDOR_COLUMNS} FROM vendor WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_vendor(r)?)),
            None => Ok(None),
        }
    }

    async fn list_active_vendors(&self, ids: &[i64]) -> Result<Vec<Vendor>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {VENDOR_COLUMNS} FROM vendor
             WHERE is_active = 1 AND id IN ({placeholders})
             ORDER BY id ASC"
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_vendor).collect::<Result<Vec<_>, _>>()
    }

    async fn list_active_vendor_users(
        &self,
        vendor_id: VendorId,
    ) -> Result<Vec<User>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM app_user
             WHERE vendor_id = ? AND is_active = 1
             ORDER BY id ASC"
        ))
        .bind(vendor_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_user).collect::<Result<Vec<_>, _>>()
    }
}
