use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthMark {
    pub title: String,
    pub auth_mark: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MenuMeta {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub keep_alive: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_hide: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_hide_tab: bool,
    /// Roles allowed to see the node; empty means everyone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auth_list: Vec<AuthMark>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MenuRoute {
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub component: String,
    pub meta: MenuMeta,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schema(no_recursion)]
    pub children: Vec<MenuRoute>,
}

fn route(path: &str, name: &str, component: &str, meta: MenuMeta) -> MenuRoute {
    MenuRoute {
        path: path.to_string(),
        name: name.to_string(),
        component: component.to_string(),
        meta,
        children: Vec::new(),
    }
}

fn meta(title: &str, icon: &str, roles: &[&str]) -> MenuMeta {
    MenuMeta {
        title: title.to_string(),
        icon: icon.to_string(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        ..MenuMeta::default()
    }
}

fn marks(items: &[(&str, &str)]) -> Vec<AuthMark> {
    items
        .iter()
        .map(|(title, mark)| AuthMark {
            title: title.to_string(),
            auth_mark: mark.to_string(),
        })
        .collect()
}

const ALL_ROLES: &[&str] = &["R_SUPER", "R_ADMIN", "R_USER"];
const STAFF_ROLES: &[&str] = &["R_SUPER", "R_ADMIN"];
const SUPER_ONLY: &[&str] = &["R_SUPER"];

/// Full navigation tree before role filtering.
pub static SYSTEM_MENUS: Lazy<Vec<MenuRoute>> = Lazy::new(|| {
    let dashboard = MenuRoute {
        children: vec![route(
            "analysis",
            "Analysis",
            "/dashboard/analysis",
            MenuMeta {
                keep_alive: true,
                ..meta("Analysis", "ri:line-chart-line", STAFF_ROLES)
            },
        )],
        ..route(
            "/dashboard",
            "Dashboard",
            "/index/index",
            meta("Dashboard", "ri:dashboard-3-line", STAFF_ROLES),
        )
    };

    let operations = MenuRoute {
        children: vec![route(
            "hub",
            "MerchantOpsHub",
            "/operations/hub",
            MenuMeta {
                auth_list: marks(&[
                    ("Create member", "member:create"),
                    ("Create order", "order:create"),
                    ("Create campaign", "campaign:create"),
                    ("View follow-ups", "followup:view"),
                    ("Export attribution", "report:export"),
                ]),
                ..meta("Ops Hub", "ri:line-chart-line", ALL_ROLES)
            },
        )],
        ..route(
            "/operations",
            "Operations",
            "/index/index",
            meta("Merchant Ops", "ri:store-2-line", ALL_ROLES),
        )
    };

    let system = MenuRoute {
        children: vec![
            route(
                "user",
                "User",
                "/system/user",
                MenuMeta {
                    keep_alive: true,
                    ..meta("Users", "ri:user-line", STAFF_ROLES)
                },
            ),
            route(
                "role",
                "Role",
                "/system/role",
                MenuMeta {
                    keep_alive: true,
                    ..meta("Roles", "ri:user-settings-line", SUPER_ONLY)
                },
            ),
            route(
                "user-center",
                "UserCenter",
                "/system/user-center",
                MenuMeta {
                    is_hide: true,
                    is_hide_tab: true,
                    keep_alive: true,
                    ..meta("Profile", "ri:user-line", STAFF_ROLES)
                },
            ),
            route(
                "menu",
                "Menus",
                "/system/menu",
                MenuMeta {
                    keep_alive: true,
                    auth_list: marks(&[("Add", "add"), ("Edit", "edit"), ("Delete", "delete")]),
                    ..meta("Menus", "ri:menu-line", SUPER_ONLY)
                },
            ),
        ],
        ..route(
            "/system",
            "System",
            "/index/index",
            meta("System", "ri:user-3-line", STAFF_ROLES),
        )
    };

    vec![dashboard, operations, system]
});

/// Keeps the nodes `user_roles` may see. A hidden parent hides its whole
/// subtree, and a parent left without visible children is dropped too.
pub fn filter_by_roles(routes: &[MenuRoute], user_roles: &[String]) -> Vec<MenuRoute> {
    routes
        .iter()
        .filter(|route| has_role_access(&route.meta.roles, user_roles))
        .filter_map(|route| {
            if route.children.is_empty() {
                return Some(route.clone());
            }
            let children = filter_by_roles(&route.children, user_roles);
            (!children.is_empty()).then(|| MenuRoute {
                children,
                ..route.clone()
            })
        })
        .collect()
}

fn has_role_access(required: &[String], user_roles: &[String]) -> bool {
    required.is_empty() || required.iter().any(|role| user_roles.contains(role))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(items: &[&str]) -> Vec<String> {
        items.iter().map(|r| r.to_string()).collect()
    }

    fn paths(routes: &[MenuRoute]) -> Vec<&str> {
        routes.iter().map(|r| r.path.as_str()).collect()
    }

    #[test]
    fn super_sees_everything() {
        let menus = filter_by_roles(&SYSTEM_MENUS, &roles(&["R_SUPER"]));
        assert_eq!(paths(&menus), vec!["/dashboard", "/operations", "/system"]);
        assert_eq!(menus[2].children.len(), 4);
    }

    #[test]
    fn admin_loses_super_only_children() {
        let menus = filter_by_roles(&SYSTEM_MENUS, &roles(&["R_ADMIN"]));
        let system = menus.iter().find(|m| m.path == "/system").unwrap();
        assert_eq!(paths(&system.children), vec!["user", "user-center"]);
    }

    #[test]
    fn user_only_sees_operations() {
        let menus = filter_by_roles(&SYSTEM_MENUS, &roles(&["R_USER"]));
        assert_eq!(paths(&menus), vec!["/operations"]);
    }

    #[test]
    fn hidden_parent_hides_children_visible_to_the_role() {
        let mut parent = route("/p", "P", "", meta("P", "", &["R_SUPER"]));
        parent.children = vec![route("c", "C", "", meta("C", "", &["R_USER"]))];

        let menus = filter_by_roles(&[parent], &roles(&["R_USER"]));
        assert!(menus.is_empty());
    }

    #[test]
    fn parent_without_visible_children_is_dropped() {
        let mut parent = route("/p", "P", "", meta("P", "", &[]));
        parent.children = vec![route("c", "C", "", meta("C", "", &["R_SUPER"]))];

        assert!(filter_by_roles(&[parent], &roles(&["R_USER"])).is_empty());
    }
}
