// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Companies and the people we deal with there.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

crm_enum! {
    /// Company industry.
    pub enum Industry {
        Technology => ("technology", "Technology"),
        Healthcare => ("healthcare", "Healthcare"),
        Finance => ("finance", "Finance"),
        Education => ("education", "Education"),
        Retail => ("retail", "Retail"),
        Manufacturing => ("manufacturing", "Manufacturing"),
        Consulting => ("consulting", "Consulting"),
        #[default]
        Other => ("other", "Other"),
    }
}

crm_enum! {
    /// Salutation printed before a contact's name.
    pub enum ContactTitle {
        #[default]
        Mr => ("mr", "Mr."),
        Mrs => ("mrs", "Mrs."),
        Ms => ("ms", "Ms."),
        Dr => ("dr", "Dr."),
        Prof => ("prof", "Prof."),
        Other => ("other", "Other"),
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Company {
    pub id: i64,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub industry: Industry,
    pub website: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    pub description: String,
    pub annual_revenue: Option<Decimal>,
    pub employee_count: Option<i32>,
    pub is_active: bool,
    pub is_customer: bool,
    pub is_prospect: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    /// Non-empty address parts joined with ", ".
    pub fn full_address(&self) -> String {
        [
            &self.address,
            &self.city,
            &self.state,
            &self.postal_code,
            &self.country,
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Payload for creating or partially updating a company.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyInput {
    pub name: Option<String>,
    pub industry: Option<Industry>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub description: Option<String>,
    pub annual_revenue: Option<Decimal>,
    pub employee_count: Option<i32>,
    pub is_active: Option<bool>,
    pub is_customer: Option<bool>,
    pub is_prospect: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyFilter {
    pub industry: Option<Industry>,
    pub is_active: Option<bool>,
    pub is_customer: Option<bool>,
    pub is_prospect: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Contact {
    pub id: i64,
    /// One of [`ContactTitle`] values, or empty.
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub mobile: String,
    pub company_id: Option<i64>,
    pub job_title: String,
    pub department: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    pub notes: String,
    pub birthday: Option<NaiveDate>,
    pub linkedin_url: String,
    pub twitter_handle: String,
    pub is_active: bool,
    pub is_customer: bool,
    pub is_prospect: bool,
    pub email_opt_out: bool,
    pub phone_opt_out: bool,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Name with the salutation, e.g. "Dr. Hana Tesfaye".
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string();
        match self.title.parse::<ContactTitle>() {
            Ok(title) => format!("{} {}", title.label(), name),
            Err(_) => name,
        }
    }

    /// Mobile number when present, otherwise the landline.
    pub fn primary_phone(&self) -> Option<&str> {
        [self.mobile.trim(), self.phone.trim()]
            .into_iter()
            .find(|p| !p.is_empty())
    }
}

/// Payload for creating or partially updating a contact.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactInput {
    pub title: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub company_id: Option<Option<i64>>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub birthday: Option<Option<NaiveDate>>,
    pub linkedin_url: Option<String>,
    pub twitter_handle: Option<String>,
    pub is_active: Option<bool>,
    pub is_customer: Option<bool>,
    pub is_prospect: Option<bool>,
    pub email_opt_out: Option<bool>,
    pub phone_opt_out: Option<bool>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub user_id: Option<Option<i64>>,
}

impl ContactInput {
    /// Rejects salutations outside [`ContactTitle`].
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            title
                .parse::<ContactTitle>()
                .map_err(|e| crate::Error::validation(e.to_string()))?;
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(crate::Error::validation("Enter a valid email address"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactFilter {
    pub company: Option<i64>,
    pub is_active: Option<bool>,
    pub is_customer: Option<bool>,
    pub is_prospect: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> Contact {
        Contact {
            id: 1,
            title: String::new(),
            first_name: "Hana".into(),
            last_name: "Tesfaye".into(),
            email: "hana@example.com".into(),
            phone: String::new(),
            mobile: String::new(),
            company_id: None,
            job_title: String::new(),
            department: String::new(),
            address: String::new(),
            city: String::new(),
            state: String::new(),
            country: String::new(),
            postal_code: String::new(),
            notes: String::new(),
            birthday: None,
            linkedin_url: String::new(),
            twitter_handle: String::new(),
            is_active: true,
            is_customer: false,
            is_prospect: true,
            email_opt_out: false,
            phone_opt_out: false,
            user_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_name_includes_title_label() {
        let mut c = contact();
        assert_eq!(c.full_name(), "Hana Tesfaye");
        c.title = "dr".into();
        assert_eq!(c.full_name(), "Dr. Hana Tesfaye");
    }

    #[test]
    fn test_primary_phone_prefers_mobile() {
        let mut c = contact();
        assert_eq!(c.primary_phone(), None);
        c.phone = "0111234567".into();
        assert_eq!(c.primary_phone(), Some("0111234567"));
        c.mobile = "0911223344".into();
        assert_eq!(c.primary_phone(), Some("0911223344"));
    }

    #[test]
    fn test_full_address_skips_blank_parts() {
        let company = Company {
            id: 1,
            name: "Acme".into(),
            industry: Industry::Retail,
            website: String::new(),
            phone: String::new(),
            address: "Bole Road 12".into(),
            city: "Addis Ababa".into(),
            state: String::new(),
            country: "Ethiopia".into(),
            postal_code: " ".into(),
            description: String::new(),
            annual_revenue: None,
            employee_count: None,
            is_active: true,
            is_customer: false,
            is_prospect: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(company.full_address(), "Bole Road 12, Addis Ababa, Ethiopia");
    }

    #[test]
    fn test_contact_input_rejects_unknown_title() {
        let input = ContactInput {
            title: Some("sir".into()),
            ..Default::default()
        };
        assert!(input.validate().is_err());

        let input = ContactInput {
            title: Some("prof".into()),
            email: Some("a@b.c".into()),
            ..Default::default()
        };
        assert!(input.validate().is_ok());
    }
}
