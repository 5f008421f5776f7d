//! Session Registry
//!
//! 连接会话的内存映射：session → (user, role)，附带 user 与 role 两个
//! 反向索引。同一用户允许多端在线；fan-out 命中该用户的所有会话。
//!
//! 无持久化：进程重启后注册表为空，客户端重连后必须重新 `register`。
//! 宿主是多线程 tokio，因此用 DashMap 做并发映射。

use std::collections::HashSet;

use dashmap::DashMap;
use serde::Serialize;

use shared::models::user::Role;

/// 一个已注册会话的身份
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionEntry {
    user_id: String,
    role: Role,
}

/// 会话信息（管理端列表用）
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedSession {
    pub session_id: String,
    pub user_id: String,
    pub role: Role,
}

/// 会话注册表
///
/// 显式持有、按引用注入（不是模块级单例），便于干净关闭与测试。
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionEntry>,
    by_user: DashMap<String, HashSet<String>>,
    by_role: DashMap<Role, HashSet<String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册会话（幂等；同一会话重复注册覆盖旧映射）
    pub fn register(&self, session_id: &str, user_id: &str, role: Role) {
        let entry = SessionEntry {
            user_id: user_id.to_string(),
            role,
        };

        if let Some(prev) = self.sessions.insert(session_id.to_string(), entry)
            && (prev.user_id != user_id || prev.role != role)
        {
            self.remove_from_indexes(session_id, &prev);
        }

        self.by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(session_id.to_string());
        self.by_role
            .entry(role)
            .or_default()
            .insert(session_id.to_string());
    }

    /// 注销单个会话；同一用户的其他会话不受影响
    pub fn unregister(&self, session_id: &str) {
        if let Some((_, entry)) = self.sessions.remove(session_id) {
            self.remove_from_indexes(session_id, &entry);
        }
    }

    fn remove_from_indexes(&self, session_id: &str, entry: &SessionEntry) {
        if let Some(mut set) = self.by_user.get_mut(&entry.user_id) {
            set.remove(session_id);
        }
        self.by_user
            .remove_if(&entry.user_id, |_, set| set.is_empty());

        if let Some(mut set) = self.by_role.get_mut(&entry.role) {
            set.remove(session_id);
        }
        self.by_role.remove_if(&entry.role, |_, set| set.is_empty());
    }

    /// 指定用户的所有在线会话
    pub fn sessions_for(&self, user_id: &str) -> Vec<String> {
        self.by_user
            .get(user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 指定角色的所有在线会话
    pub fn sessions_for_role(&self, role: Role) -> Vec<String> {
        self.by_role
            .get(&role)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 管理端会话列表
    pub fn connected(&self) -> Vec<ConnectedSession> {
        self.sessions
            .iter()
            .map(|entry| ConnectedSession {
                session_id: entry.key().clone(),
                user_id: entry.value().user_id.clone(),
                role: entry.value().role,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = SessionRegistry::new();
        registry.register("s1", "user:c1", Role::Customer);
        registry.register("s2", "user:a1", Role::DeliveryAgent);

        assert_eq!(registry.sessions_for("user:c1"), vec!["s1".to_string()]);
        assert_eq!(
            registry.sessions_for_role(Role::DeliveryAgent),
            vec!["s2".to_string()]
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_multi_device_sessions() {
        let registry = SessionRegistry::new();
        registry.register("s1", "user:c1", Role::Customer);
        registry.register("s2", "user:c1", Role::Customer);

        let mut sessions = registry.sessions_for("user:c1");
        sessions.sort();
        assert_eq!(sessions, vec!["s1".to_string(), "s2".to_string()]);

        // Dropping one device leaves the other live
        registry.unregister("s1");
        assert_eq!(registry.sessions_for("user:c1"), vec!["s2".to_string()]);
    }

    #[test]
    fn test_reregister_overwrites_mapping() {
        let registry = SessionRegistry::new();
        registry.register("s1", "user:c1", Role::Customer);
        registry.register("s1", "user:a9", Role::DeliveryAgent);

        assert!(registry.sessions_for("user:c1").is_empty());
        assert_eq!(registry.sessions_for("user:a9"), vec!["s1".to_string()]);
        assert!(registry.sessions_for_role(Role::Customer).is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let registry = SessionRegistry::new();
        registry.register("s1", "user:c1", Role::Customer);
        registry.unregister("nope");
        assert_eq!(registry.len(), 1);
    }
}
