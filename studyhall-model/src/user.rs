//! User profile snapshot and the shallow patch applied to it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::UserId;

/// Profile snapshot as returned by the server.
///
/// Only the identity fields are typed. Every other profile field the server
/// sends (grade, school, avatar, ...) is kept verbatim in `profile` so the
/// client can round-trip it to storage without knowing its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl User {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            phone: None,
            email: None,
            profile: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Phone number when present, otherwise the email address.
    pub fn contact(&self) -> Option<&str> {
        self.phone.as_deref().or(self.email.as_deref())
    }

    /// Shallow merge: every field present in the patch replaces the current
    /// value, nested profile objects are replaced wholesale. The id is never
    /// touched.
    pub fn merge(&mut self, patch: UserPatch) {
        let UserPatch {
            name,
            phone,
            email,
            profile,
        } = patch;

        if let Some(name) = name {
            self.name = Some(name);
        }
        if let Some(phone) = phone {
            self.phone = Some(phone);
        }
        if let Some(email) = email {
            self.email = Some(email);
        }
        for (key, value) in profile {
            self.profile.insert(key, value);
        }
    }

    /// Returns a merged copy, leaving `self` untouched.
    pub fn merged(&self, patch: UserPatch) -> Self {
        let mut next = self.clone();
        next.merge(patch);
        next
    }
}

/// Partial user update applied locally after profile edits made elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl UserPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.profile.insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.profile.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_fields_land_in_profile() {
        let user: User = serde_json::from_value(json!({
            "id": 7,
            "name": "Asha",
            "phone": "9999999999",
            "grade": 8,
            "school": { "name": "Central" }
        }))
        .unwrap();

        assert_eq!(user.id.as_str(), "7");
        assert_eq!(user.profile.get("grade"), Some(&json!(8)));
        assert_eq!(user.contact(), Some("9999999999"));
    }

    #[test]
    fn merge_is_shallow_and_keeps_id() {
        let mut user = User::new("u-1").with_name("Asha");
        user.profile
            .insert("school".into(), json!({ "name": "Central", "city": "Pune" }));

        user.merge(
            UserPatch::new()
                .name("Asha K")
                .field("school", json!({ "name": "North" })),
        );

        assert_eq!(user.id.as_str(), "u-1");
        assert_eq!(user.name.as_deref(), Some("Asha K"));
        // Nested objects are replaced, not deep-merged.
        assert_eq!(user.profile.get("school"), Some(&json!({ "name": "North" })));
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let user = User::new("u-1").with_email("a@example.com");
        let patch = UserPatch::new();
        assert!(patch.is_empty());
        assert_eq!(user.merged(patch), user);
    }
}
