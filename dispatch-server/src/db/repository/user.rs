//! User Repository

use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::UserRecord;
use shared::models::user::{ApprovalState, Role};

const USER_TABLE: &str = "user";

#[derive(Clone)]
pub struct UserRepository {
    base: BaseRepository,
}

impl UserRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Create a new user; username must be unique
    pub async fn create(&self, record: UserRecord) -> RepoResult<UserRecord> {
        if self.find_by_username(&record.username).await?.is_some() {
            return Err(RepoError::Duplicate(format!(
                "Username {} already taken",
                record.username
            )));
        }

        let created: Option<UserRecord> = self
            .base
            .db()
            .create(USER_TABLE)
            .content(record)
            .await?;
        created.ok_or_else(|| RepoError::Database("Failed to create user".to_string()))
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<UserRecord>> {
        let record_id: RecordId = id
            .parse()
            .map_err(|_| RepoError::NotFound(format!("Invalid user ID format: {}", id)))?;
        let user: Option<UserRecord> = self.base.db().select(record_id).await?;
        Ok(user)
    }

    pub async fn find_by_username(&self, username: &str) -> RepoResult<Option<UserRecord>> {
        let users: Vec<UserRecord> = self
            .base
            .db()
            .query("SELECT * FROM user WHERE username = $username LIMIT 1")
            .bind(("username", username.to_string()))
            .await?
            .take(0)?;
        Ok(users.into_iter().next())
    }

    /// Admin approval update
    pub async fn set_approval(
        &self,
        id: &str,
        approval: ApprovalState,
        rejection_reason: Option<String>,
    ) -> RepoResult<Option<UserRecord>> {
        let record_id: RecordId = id
            .parse()
            .map_err(|_| RepoError::NotFound(format!("Invalid user ID format: {}", id)))?;
        let updated: Vec<UserRecord> = self
            .base
            .db()
            .query(
                "UPDATE user SET approval = $approval, rejection_reason = $reason \
                 WHERE id = $id RETURN AFTER",
            )
            .bind(("id", record_id))
            .bind(("approval", approval))
            .bind(("reason", rejection_reason))
            .await?
            .take(0)?;
        Ok(updated.into_iter().next())
    }

    /// 切换在线状态
    ///
    /// 下线时带守护条件：仅当 `active_order_count = 0` 才命中。
    /// 返回 `None` 表示守护条件未满足（或记录不存在），由调用方区分。
    pub async fn set_online(&self, id: &str, online: bool) -> RepoResult<Option<UserRecord>> {
        let record_id: RecordId = id
            .parse()
            .map_err(|_| RepoError::NotFound(format!("Invalid user ID format: {}", id)))?;

        let sql = if online {
            "UPDATE user SET is_online = true WHERE id = $id RETURN AFTER"
        } else {
            "UPDATE user SET is_online = false \
             WHERE id = $id AND active_order_count = 0 RETURN AFTER"
        };

        let updated: Vec<UserRecord> = self
            .base
            .db()
            .query(sql)
            .bind(("id", record_id))
            .await?
            .take(0)?;
        Ok(updated.into_iter().next())
    }

    /// Adjust the active-order counter (delta may be negative)
    pub async fn adjust_active_orders(&self, id: &str, delta: i64) -> RepoResult<()> {
        let record_id: RecordId = id
            .parse()
            .map_err(|_| RepoError::NotFound(format!("Invalid user ID format: {}", id)))?;
        self.base
            .db()
            .query("UPDATE user SET active_order_count += $delta WHERE id = $id")
            .bind(("id", record_id))
            .bind(("delta", delta))
            .await?;
        Ok(())
    }

    /// 是否已存在管理员账号（注册自举检查）
    pub async fn any_admin_exists(&self) -> RepoResult<bool> {
        let admins: Vec<UserRecord> = self
            .base
            .db()
            .query("SELECT * FROM user WHERE role = $role LIMIT 1")
            .bind(("role", Role::Admin))
            .await?
            .take(0)?;
        Ok(!admins.is_empty())
    }

    /// Agent roster
    pub async fn list_agents(&self) -> RepoResult<Vec<UserRecord>> {
        let agents: Vec<UserRecord> = self
            .base
            .db()
            .query("SELECT * FROM user WHERE role = $role ORDER BY username")
            .bind(("role", Role::DeliveryAgent))
            .await?
            .take(0)?;
        Ok(agents)
    }
}
