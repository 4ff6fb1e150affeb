use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

use super::TeamRole;

/// An organization's workspace. The organization id is the owner's user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub owner_id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Individually toggleable capability within a workspace.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PermissionFlag {
    ManageTeam,
    AccessSettings,
    DeleteItems,
    CreateItems,
    ViewAnalytics,
    AccessAdvancedTools,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionSet {
    pub manage_team: bool,
    pub access_settings: bool,
    pub delete_items: bool,
    pub create_items: bool,
    pub view_analytics: bool,
    pub access_advanced_tools: bool,
}

impl PermissionSet {
    pub fn all() -> Self {
        Self {
            manage_team: true,
            access_settings: true,
            delete_items: true,
            create_items: true,
            view_analytics: true,
            access_advanced_tools: true,
        }
    }

    /// Set seeded for a role when a workspace is created.
    pub fn default_for(role: TeamRole) -> Self {
        match role {
            TeamRole::Admin => Self::all(),
            TeamRole::Member => Self {
                create_items: true,
                view_analytics: true,
                ..Self::default()
            },
            TeamRole::Viewer => Self {
                view_analytics: true,
                ..Self::default()
            },
        }
    }

    pub fn get(&self, flag: PermissionFlag) -> bool {
        match flag {
            PermissionFlag::ManageTeam => self.manage_team,
            PermissionFlag::AccessSettings => self.access_settings,
            PermissionFlag::DeleteItems => self.delete_items,
            PermissionFlag::CreateItems => self.create_items,
            PermissionFlag::ViewAnalytics => self.view_analytics,
            PermissionFlag::AccessAdvancedTools => self.access_advanced_tools,
        }
    }

    pub fn set(&mut self, flag: PermissionFlag, value: bool) {
        match flag {
            PermissionFlag::ManageTeam => self.manage_team = value,
            PermissionFlag::AccessSettings => self.access_settings = value,
            PermissionFlag::DeleteItems => self.delete_items = value,
            PermissionFlag::CreateItems => self.create_items = value,
            PermissionFlag::ViewAnalytics => self.view_analytics = value,
            PermissionFlag::AccessAdvancedTools => self.access_advanced_tools = value,
        }
    }

    /// Apply only the flags present in `update`.
    pub fn apply(&mut self, update: &UpdateRolePermissions) {
        let changes = [
            (PermissionFlag::ManageTeam, update.manage_team),
            (PermissionFlag::AccessSettings, update.access_settings),
            (PermissionFlag::DeleteItems, update.delete_items),
            (PermissionFlag::CreateItems, update.create_items),
            (PermissionFlag::ViewAnalytics, update.view_analytics),
            (PermissionFlag::AccessAdvancedTools, update.access_advanced_tools),
        ];
        for (flag, value) in changes {
            if let Some(value) = value {
                self.set(flag, value);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RolePermissions {
    pub organization_id: String,
    pub role: TeamRole,
    pub permissions: PermissionSet,
    pub updated_at: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRolePermissions {
    pub manage_team: Option<bool>,
    pub access_settings: Option<bool>,
    pub delete_items: Option<bool>,
    pub create_items: Option<bool>,
    pub view_analytics: Option<bool>,
    pub access_advanced_tools: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn defaults_narrow_with_role() {
        let admin = PermissionSet::default_for(TeamRole::Admin);
        let member = PermissionSet::default_for(TeamRole::Member);
        let viewer = PermissionSet::default_for(TeamRole::Viewer);

        assert!(PermissionFlag::iter().all(|f| admin.get(f)));
        assert!(member.create_items && !member.manage_team && !member.delete_items);
        assert!(viewer.view_analytics && !viewer.create_items);
    }

    #[test]
    fn apply_only_touches_given_flags() {
        let mut set = PermissionSet::default_for(TeamRole::Member);
        set.apply(&UpdateRolePermissions {
            delete_items: Some(true),
            view_analytics: Some(false),
            ..Default::default()
        });
        assert!(set.delete_items);
        assert!(!set.view_analytics);
        assert!(set.create_items);
        assert!(!set.manage_team);
    }

    #[test]
    fn flag_names_match_column_names() {
        assert_eq!(PermissionFlag::AccessAdvancedTools.as_ref(), "access_advanced_tools");
        assert_eq!(
            "manage_team".parse::<PermissionFlag>().unwrap(),
            PermissionFlag::ManageTeam
        );
    }
}
