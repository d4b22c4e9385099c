use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Profile attached to a session and returned by `/api/user/info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user_id: i32,
    pub user_name: String,
    pub email: String,
    pub avatar: String,
    pub roles: Vec<String>,
    /// Button-level permission marks, e.g. `report:export`
    pub buttons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserListItem {
    pub id: i32,
    pub avatar: String,
    pub status: String,
    pub user_name: String,
    pub user_gender: String,
    pub nick_name: String,
    pub user_phone: String,
    pub user_email: String,
    pub user_roles: Vec<String>,
    pub create_by: String,
    pub create_time: String,
    pub update_by: String,
    pub update_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleListItem {
    pub role_id: i32,
    pub role_name: String,
    pub role_code: String,
    pub description: String,
    pub enabled: bool,
    pub create_time: String,
}

struct MockUser {
    id: i32,
    name: &'static str,
    phone: &'static str,
    role: &'static str,
    buttons: &'static [&'static str],
}

const SEEDED_AT: &str = "2026-02-01 10:00:00";

const MOCK_USERS: &[MockUser] = &[
    MockUser {
        id: 1,
        name: "Super",
        phone: "13800001111",
        role: "R_SUPER",
        buttons: &[
            "member:create",
            "order:create",
            "campaign:create",
            "followup:view",
            "report:export",
        ],
    },
    MockUser {
        id: 2,
        name: "Admin",
        phone: "13800002222",
        role: "R_ADMIN",
        buttons: &["member:create", "order:create", "followup:view"],
    },
    MockUser {
        id: 3,
        name: "User",
        phone: "13800003333",
        role: "R_USER",
        buttons: &["followup:view"],
    },
];

impl MockUser {
    fn email(&self) -> String {
        format!("{}@merchant.local", self.name.to_lowercase())
    }

    fn session(&self) -> AuthSession {
        AuthSession {
            user_id: self.id,
            user_name: self.name.to_string(),
            email: self.email(),
            avatar: String::new(),
            roles: vec![self.role.to_string()],
            buttons: self.buttons.iter().map(|b| b.to_string()).collect(),
        }
    }

    fn list_item(&self) -> UserListItem {
        UserListItem {
            id: self.id,
            avatar: String::new(),
            status: "1".to_string(),
            user_name: self.name.to_string(),
            user_gender: "1".to_string(),
            nick_name: self.name.to_string(),
            user_phone: self.phone.to_string(),
            user_email: self.email(),
            user_roles: vec![self.role.to_string()],
            create_by: "system".to_string(),
            create_time: SEEDED_AT.to_string(),
            update_by: "system".to_string(),
            update_time: SEEDED_AT.to_string(),
        }
    }
}

pub static USERS: Lazy<Vec<UserListItem>> =
    Lazy::new(|| MOCK_USERS.iter().map(MockUser::list_item).collect());

pub static ROLES: Lazy<Vec<RoleListItem>> = Lazy::new(|| {
    [
        (1, "Super Admin", "R_SUPER", "Full access"),
        (2, "Admin", "R_ADMIN", "Operations access without export"),
        (3, "User", "R_USER", "Read-only business access"),
    ]
    .into_iter()
    .map(|(role_id, name, code, description)| RoleListItem {
        role_id,
        role_name: name.to_string(),
        role_code: code.to_string(),
        description: description.to_string(),
        enabled: true,
        create_time: SEEDED_AT.to_string(),
    })
    .collect()
});

/// Case-insensitive lookup of a mock user's profile.
pub fn resolve_user(user_name: &str) -> Option<AuthSession> {
    let wanted = user_name.trim();
    MOCK_USERS
        .iter()
        .find(|user| user.name.eq_ignore_ascii_case(wanted))
        .map(MockUser::session)
}

/// One page of `items`; `current` is 1-based. Pages past the end are empty.
pub fn paginate<T: Clone>(items: &[T], current: usize, size: usize) -> Vec<T> {
    let start = current.saturating_sub(1).saturating_mul(size);
    items.iter().skip(start).take(size).cloned().collect()
}
