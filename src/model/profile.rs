use crate::core::{Result, SyncError, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::mem::discriminant;

/// Identity handed over by the authentication provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthIdentity {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl AuthIdentity {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileRole {
    #[default]
    Member,
    Officer,
    Admin,
    Developer,
}

/// The signed-in user's own profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: UserId,
    #[serde(alias = "full_name")]
    pub full_name: String,
    #[serde(default, alias = "first_name")]
    pub first_name: Option<String>,
    #[serde(default, alias = "last_name")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub chapter: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, alias = "linkedin_url")]
    pub linkedin_url: Option<String>,
    #[serde(default, alias = "graduation_year")]
    pub graduation_year: Option<i32>,
    #[serde(default, alias = "avatar_url")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub role: ProfileRole,
    /// Computed by the server on every write; never set locally.
    #[serde(default, alias = "is_developer")]
    pub is_developer: bool,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "updated_at")]
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(id: impl Into<UserId>, full_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            first_name: None,
            last_name: None,
            chapter: None,
            bio: None,
            email: None,
            phone: None,
            linkedin_url: None,
            graduation_year: None,
            avatar_url: None,
            role: ProfileRole::Member,
            is_developer: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Name to show for this profile, falling back to name parts, then id
    pub fn display_name(&self) -> String {
        if !self.full_name.trim().is_empty() {
            return self.full_name.trim().to_string();
        }

        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            self.id.clone()
        } else {
            parts.join(" ")
        }
    }

    /// Apply a single field update in place
    pub fn apply_field(&mut self, field: &ProfileField) {
        match field.clone() {
            ProfileField::FullName(v) => self.full_name = v,
            ProfileField::FirstName(v) => self.first_name = v,
            ProfileField::LastName(v) => self.last_name = v,
            ProfileField::Chapter(v) => self.chapter = v,
            ProfileField::Bio(v) => self.bio = v,
            ProfileField::Email(v) => self.email = v,
            ProfileField::Phone(v) => self.phone = v,
            ProfileField::LinkedinUrl(v) => self.linkedin_url = v,
            ProfileField::GraduationYear(v) => self.graduation_year = v,
            ProfileField::AvatarUrl(v) => self.avatar_url = v,
        }
    }
}

/// One user-editable profile attribute with its new value.
///
/// `role` and `is_developer` are absent: both are owned by the
/// server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ProfileField {
    FullName(String),
    FirstName(Option<String>),
    LastName(Option<String>),
    Chapter(Option<String>),
    Bio(Option<String>),
    Email(Option<String>),
    Phone(Option<String>),
    LinkedinUrl(Option<String>),
    GraduationYear(Option<i32>),
    AvatarUrl(Option<String>),
}

const MAX_BIO_LEN: usize = 2000;
const MAX_TEXT_LEN: usize = 200;

impl ProfileField {
    /// Wire name of the attribute
    pub fn key(&self) -> &'static str {
        match self {
            ProfileField::FullName(_) => "fullName",
            ProfileField::FirstName(_) => "firstName",
            ProfileField::LastName(_) => "lastName",
            ProfileField::Chapter(_) => "chapter",
            ProfileField::Bio(_) => "bio",
            ProfileField::Email(_) => "email",
            ProfileField::Phone(_) => "phone",
            ProfileField::LinkedinUrl(_) => "linkedinUrl",
            ProfileField::GraduationYear(_) => "graduationYear",
            ProfileField::AvatarUrl(_) => "avatarUrl",
        }
    }

    fn json_value(&self) -> Value {
        // Adjacently tagged as {"field": .., "value": ..}
        match serde_json::to_value(self) {
            Ok(Value::Object(mut tagged)) => tagged.remove("value").unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            ProfileField::FullName(name) => {
                if name.trim().is_empty() {
                    return Err(SyncError::validation("full name cannot be empty"));
                }
                check_len(self.key(), name, MAX_TEXT_LEN)
            }
            ProfileField::Bio(Some(bio)) => check_len(self.key(), bio, MAX_BIO_LEN),
            ProfileField::Email(Some(email)) => {
                if !email.contains('@') {
                    return Err(SyncError::validation(format!(
                        "'{}' is not a valid email address",
                        email
                    )));
                }
                check_len(self.key(), email, MAX_TEXT_LEN)
            }
            ProfileField::GraduationYear(Some(year)) => {
                if !(1900..=2100).contains(year) {
                    return Err(SyncError::validation(format!(
                        "graduation year {} is out of range",
                        year
                    )));
                }
                Ok(())
            }
            ProfileField::FirstName(Some(v))
            | ProfileField::LastName(Some(v))
            | ProfileField::Chapter(Some(v))
            | ProfileField::Phone(Some(v))
            | ProfileField::LinkedinUrl(Some(v))
            | ProfileField::AvatarUrl(Some(v)) => check_len(self.key(), v, MAX_TEXT_LEN),
            _ => Ok(()),
        }
    }
}

fn check_len(key: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(SyncError::validation(format!(
            "{} exceeds {} characters",
            key, max
        )));
    }
    Ok(())
}

/// A partial profile write: a set of distinct field updates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    fields: Vec<ProfileField>,
}

impl ProfileUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field update, replacing an earlier update of the same field
    pub fn set(mut self, field: ProfileField) -> Self {
        self.fields
            .retain(|existing| discriminant(existing) != discriminant(&field));
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[ProfileField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check the update before it leaves the process
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(SyncError::validation("profile update has no fields"));
        }

        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i]
                .iter()
                .any(|earlier| discriminant(earlier) == discriminant(field))
            {
                return Err(SyncError::validation(format!(
                    "field '{}' appears more than once",
                    field.key()
                )));
            }
            field.validate()?;
        }

        Ok(())
    }

    /// JSON object body for a PATCH request
    pub fn to_patch_body(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|field| (field.key().to_string(), field.json_value()))
            .collect()
    }
}

impl From<Vec<ProfileField>> for ProfileUpdate {
    fn from(fields: Vec<ProfileField>) -> Self {
        Self { fields }
    }
}
