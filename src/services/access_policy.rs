//! 访问策略：角色 → 可见 bucket 与允许的操作
//!
//! 角色到 bucket 槽位、角色到操作的映射都是静态表；只有槽位对应的
//! bucket 名称来自配置，并在启动后固定不变。

use crate::{
    config::BucketsConfig,
    models::role::{Capabilities, Operation, Role, ScopeSlot},
};
use std::collections::BTreeSet;

/// 角色可访问的 bucket 槽位
fn slots_for(role: Role) -> &'static [ScopeSlot] {
    match role {
        Role::Admin => &[ScopeSlot::Public, ScopeSlot::Projects, ScopeSlot::Hr, ScopeSlot::Logs],
        Role::ReadWrite | Role::UploadOnly | Role::DownloadOnly => {
            &[ScopeSlot::Public, ScopeSlot::Projects]
        }
        Role::ReadOnly => &[ScopeSlot::Public],
    }
}

/// 角色允许的操作
pub fn operations_for(role: Role) -> &'static [Operation] {
    match role {
        Role::Admin | Role::ReadWrite => {
            &[Operation::List, Operation::Get, Operation::Put, Operation::Delete]
        }
        Role::UploadOnly => &[Operation::List, Operation::Put],
        Role::DownloadOnly => &[Operation::List, Operation::Get],
        Role::ReadOnly => &[Operation::List],
    }
}

/// 无状态访问策略，可在任意并发下共享
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    buckets: BucketsConfig,
}

impl AccessPolicy {
    pub fn new(buckets: BucketsConfig) -> Self {
        Self { buckets }
    }

    fn bucket_for(&self, slot: ScopeSlot) -> &str {
        match slot {
            ScopeSlot::Public => &self.buckets.public,
            ScopeSlot::Projects => &self.buckets.projects,
            ScopeSlot::Hr => &self.buckets.hr,
            ScopeSlot::Logs => &self.buckets.logs,
        }
    }

    /// 角色可见的全部 bucket
    pub fn scopes_for(&self, role: Role) -> BTreeSet<String> {
        slots_for(role)
            .iter()
            .map(|slot| self.bucket_for(*slot).to_string())
            .collect()
    }

    /// 按组名查询；未知组名返回空集合（失败即拒绝）
    pub fn scopes_for_group(&self, group: &str) -> BTreeSet<String> {
        group
            .parse::<Role>()
            .map(|role| self.scopes_for(role))
            .unwrap_or_default()
    }

    /// 按槽位顺序（public, projects, hr, logs）列出可见 bucket
    pub fn ordered_scopes_for(&self, role: Role) -> Vec<String> {
        slots_for(role)
            .iter()
            .map(|slot| self.bucket_for(*slot).to_string())
            .collect()
    }

    pub fn is_allowed(&self, role: Role, operation: Operation, scope: &str) -> bool {
        let scope_visible = slots_for(role)
            .iter()
            .any(|slot| self.bucket_for(*slot) == scope);

        scope_visible && operations_for(role).contains(&operation)
    }

    pub fn capabilities(&self, role: Role, scope: &str) -> Capabilities {
        Capabilities {
            list: self.is_allowed(role, Operation::List, scope),
            download: self.is_allowed(role, Operation::Get, scope),
            upload: self.is_allowed(role, Operation::Put, scope),
            delete: self.is_allowed(role, Operation::Delete, scope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> AccessPolicy {
        AccessPolicy::new(BucketsConfig {
            public: "cndd-publica".to_string(),
            projects: "cndd-proyectos".to_string(),
            hr: "cndd-recursoshumanos".to_string(),
            logs: "cndd-logs".to_string(),
        })
    }

    fn all_scopes() -> Vec<String> {
        vec![
            "cndd-publica".to_string(),
            "cndd-proyectos".to_string(),
            "cndd-recursoshumanos".to_string(),
            "cndd-logs".to_string(),
            "some-other-bucket".to_string(),
        ]
    }

    #[test]
    fn test_scope_table() {
        let policy = policy();
        assert_eq!(policy.scopes_for(Role::Admin).len(), 4);
        for role in [Role::ReadWrite, Role::UploadOnly, Role::DownloadOnly] {
            let scopes = policy.scopes_for(role);
            assert_eq!(scopes.len(), 2);
            assert!(scopes.contains("cndd-publica"));
            assert!(scopes.contains("cndd-proyectos"));
        }
        let read_only = policy.scopes_for(Role::ReadOnly);
        assert_eq!(read_only.into_iter().collect::<Vec<_>>(), vec!["cndd-publica"]);
    }

    #[test]
    fn test_invisible_scope_denies_every_operation() {
        let policy = policy();
        for role in Role::ALL {
            let visible = policy.scopes_for(role);
            for scope in all_scopes().iter().filter(|s| !visible.contains(*s)) {
                for op in Operation::ALL {
                    assert!(!policy.is_allowed(role, op, scope), "{role} {op} {scope}");
                }
            }
        }
    }

    #[test]
    fn test_privilege_nesting() {
        let policy = policy();
        let admin = policy.scopes_for(Role::Admin);
        let read_write = policy.scopes_for(Role::ReadWrite);
        let read_only = policy.scopes_for(Role::ReadOnly);
        assert!(admin.is_superset(&read_write));
        assert!(read_write.is_superset(&read_only));
    }

    #[test]
    fn test_delete_rules() {
        let policy = policy();
        for scope in policy.scopes_for(Role::ReadOnly) {
            assert!(!policy.is_allowed(Role::ReadOnly, Operation::Delete, &scope));
        }
        for scope in policy.scopes_for(Role::Admin) {
            assert!(policy.is_allowed(Role::Admin, Operation::Delete, &scope));
        }
        assert!(!policy.is_allowed(Role::UploadOnly, Operation::Delete, "cndd-publica"));
        assert!(!policy.is_allowed(Role::DownloadOnly, Operation::Delete, "cndd-publica"));
        assert!(policy.is_allowed(Role::ReadWrite, Operation::Delete, "cndd-proyectos"));
    }

    #[test]
    fn test_list_allowed_wherever_visible() {
        let policy = policy();
        for role in Role::ALL {
            for scope in policy.scopes_for(role) {
                assert!(policy.is_allowed(role, Operation::List, &scope));
            }
        }
    }

    #[test]
    fn test_capabilities_per_role() {
        let policy = policy();
        let caps = policy.capabilities(Role::UploadOnly, "cndd-proyectos");
        assert!(caps.list && caps.upload && !caps.download && !caps.delete);

        let caps = policy.capabilities(Role::DownloadOnly, "cndd-publica");
        assert!(caps.list && caps.download && !caps.upload && !caps.delete);

        let caps = policy.capabilities(Role::ReadOnly, "cndd-publica");
        assert_eq!(caps, Capabilities { list: true, ..Default::default() });

        assert_eq!(policy.capabilities(Role::ReadOnly, "cndd-logs"), Capabilities::default());
    }

    #[test]
    fn test_unknown_group_fails_closed() {
        let policy = policy();
        assert!(policy.scopes_for_group("superuser").is_empty());
        assert!(policy.scopes_for_group("").is_empty());
        assert_eq!(policy.scopes_for_group("solo-lectura").len(), 1);
    }

    #[test]
    fn test_ordered_scopes_follow_slot_order() {
        let policy = policy();
        assert_eq!(
            policy.ordered_scopes_for(Role::Admin),
            vec!["cndd-publica", "cndd-proyectos", "cndd-recursoshumanos", "cndd-logs"]
        );
    }
}
