// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Staff and customer accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crm_enum! {
    /// Account role. Roles are ordered: admin > manager > agent > customer.
    pub enum UserRole {
        Admin => ("admin", "Administrator"),
        Manager => ("manager", "Manager"),
        #[default]
        Agent => ("agent", "Support Agent"),
        Customer => ("customer", "Customer"),
    }
}

/// A user account.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    pub company: String,
    pub phone: String,
    pub department: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admins count as managers.
    pub fn is_manager(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Manager)
    }

    /// Any staff role.
    pub fn is_agent(&self) -> bool {
        matches!(
            self.role,
            UserRole::Admin | UserRole::Manager | UserRole::Agent
        )
    }

    pub fn is_customer(&self) -> bool {
        self.role == UserRole::Customer
    }

    /// "First Last", or the email address when both names are blank.
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string();
        if name.is_empty() {
            self.email.clone()
        } else {
            name
        }
    }

    /// Phone number if one is on file.
    pub fn phone_number(&self) -> Option<&str> {
        let phone = self.phone.trim();
        (!phone.is_empty()).then_some(phone)
    }
}

/// Fields for creating a user. The password must already be hashed.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub company: String,
    pub phone: String,
    pub department: String,
    pub is_active: bool,
}

/// Partial update of a user profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<UserRole>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub is_active: Option<bool>,
}

/// List filters for users.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub department: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[cfg(test)]
pub(crate) fn test_user(id: i64, role: UserRole) -> User {
    User {
        id,
        email: format!("user{id}@example.com"),
        password_hash: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        role,
        company: String::new(),
        phone: String::new(),
        department: String::new(),
        is_active: true,
        date_joined: Utc::now(),
        last_login: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_hierarchy() {
        let admin = test_user(1, UserRole::Admin);
        assert!(admin.is_admin() && admin.is_manager() && admin.is_agent());

        let manager = test_user(2, UserRole::Manager);
        assert!(!manager.is_admin() && manager.is_manager() && manager.is_agent());

        let agent = test_user(3, UserRole::Agent);
        assert!(!agent.is_manager() && agent.is_agent());

        let customer = test_user(4, UserRole::Customer);
        assert!(!customer.is_agent() && customer.is_customer());
    }

    #[test]
    fn test_full_name_falls_back_to_email() {
        let mut user = test_user(7, UserRole::Agent);
        assert_eq!(user.full_name(), "user7@example.com");

        user.first_name = "Abebe".into();
        assert_eq!(user.full_name(), "Abebe");

        user.last_name = "Kebede".into();
        assert_eq!(user.full_name(), "Abebe Kebede");
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let mut user = test_user(1, UserRole::Agent);
        user.password_hash = "secret-hash".into();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "agent");
    }
}
