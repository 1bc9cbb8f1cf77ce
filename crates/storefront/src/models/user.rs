//! User and profile types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use gamerly_core::validation::{non_blank, parse_date};
use gamerly_core::{Email, UserId, UserRole, ValidationError};

/// A storefront account.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// First and last name joined, or the username when both are blank.
    #[must_use]
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_owned()
        }
    }
}

/// Per-user store settings, created alongside the account.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Profile {
    pub user_id: UserId,
    pub role: UserRole,
    pub phone: String,
    pub address: String,
    pub birth_date: Option<NaiveDate>,
    pub active: bool,
    pub registered_at: DateTime<Utc>,
}

impl Profile {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// A user together with their profile.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    #[serde(flatten)]
    pub user: User,
    pub profile: Profile,
}

/// Validated profile edits. `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<Email>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Profile fields as submitted. Omitted and blank fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<String>,
}

impl ProfileForm {
    /// # Errors
    ///
    /// Returns `ValidationError::Email` for a malformed email and
    /// `ValidationError::MalformedDate` unless `birth_date` is `YYYY-MM-DD`.
    pub fn validate(&self) -> Result<ProfileUpdate, ValidationError> {
        let text = |v: &Option<String>| non_blank(v.as_deref()).map(str::to_owned);

        Ok(ProfileUpdate {
            first_name: text(&self.first_name),
            last_name: text(&self.last_name),
            email: non_blank(self.email.as_deref())
                .map(Email::parse)
                .transpose()?,
            phone: text(&self.phone),
            address: text(&self.address),
            birth_date: non_blank(self.birth_date.as_deref())
                .map(parse_date)
                .transpose()?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str) -> User {
        User {
            id: UserId::new(1),
            username: "player1".to_owned(),
            email: Email::parse("player1@gamerly.cl").unwrap(),
            first_name: first.to_owned(),
            last_name: last.to_owned(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_name_joins_names() {
        assert_eq!(user("Ada", "Lovelace").full_name(), "Ada Lovelace");
        assert_eq!(user("Ada", "").full_name(), "Ada");
    }

    #[test]
    fn test_full_name_falls_back_to_username() {
        assert_eq!(user(" ", "").full_name(), "player1");
    }

    #[test]
    fn test_empty_profile_update() {
        assert!(ProfileUpdate::default().is_empty());
        let update = ProfileUpdate {
            phone: Some("+56 9 1234 5678".to_owned()),
            ..ProfileUpdate::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_profile_form_skips_blank_fields() {
        let form: ProfileForm = serde_json::from_str(
            r#"{"first_name": "  Ada ", "last_name": "", "phone": "   ", "address": "Av. Siempre Viva 742"}"#,
        )
        .unwrap();
        let update = form.validate().unwrap();
        assert_eq!(update.first_name.as_deref(), Some("Ada"));
        assert_eq!(update.last_name, None);
        assert_eq!(update.phone, None);
        assert_eq!(update.address.as_deref(), Some("Av. Siempre Viva 742"));
        assert_eq!(update.email, None);
    }

    #[test]
    fn test_profile_form_parses_email_and_date() {
        let form = ProfileForm {
            email: Some("New@Gamerly.cl".to_owned()),
            birth_date: Some("1999-12-31".to_owned()),
            ..ProfileForm::default()
        };
        let update = form.validate().unwrap();
        assert_eq!(update.birth_date, NaiveDate::from_ymd_opt(1999, 12, 31));
        assert!(update.email.is_some());
    }

    #[test]
    fn test_profile_form_rejects_malformed_date() {
        let form = ProfileForm {
            birth_date: Some("31/12/1999".to_owned()),
            ..ProfileForm::default()
        };
        assert!(matches!(
            form.validate(),
            Err(ValidationError::MalformedDate(_))
        ));
    }
}
