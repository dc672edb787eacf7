use bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};

use crate::constants::{BACKUPS_COLLECTION, NOTIFICATIONS_COLLECTION, READ_WRITE_ROLE};
use SortOrder::{Ascending, Descending};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn value(&self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

/// Secondary index declaration: ordered key fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub keys: &'static [(&'static str, SortOrder)],
}

impl IndexSpec {
    pub const fn new(keys: &'static [(&'static str, SortOrder)]) -> Self {
        Self { keys }
    }

    /// Index name in the server's default form, e.g. `userId_1_createdAt_-1`
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, order)| format!("{}_{}", field, order.value()))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Key document with fields in declaration order
    pub fn keys_document(&self) -> Document {
        let mut keys = Document::new();
        for (field, order) in self.keys {
            keys.insert(*field, order.value());
        }
        keys
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub indexes: &'static [IndexSpec],
}

/// Notifications by owner, newest first
pub const NOTIFICATIONS_BY_USER: IndexSpec =
    IndexSpec::new(&[("userId", Ascending), ("createdAt", Descending)]);

/// Notifications by category and read state (unread system notices)
pub const NOTIFICATIONS_BY_TYPE_STATUS: IndexSpec =
    IndexSpec::new(&[("type", Ascending), ("status", Ascending)]);

/// Backups by owner, newest first
pub const BACKUPS_BY_USER: IndexSpec =
    IndexSpec::new(&[("userId", Ascending), ("createdAt", Descending)]);

/// Backups by state (sweeping failed backups)
pub const BACKUPS_BY_STATUS: IndexSpec = IndexSpec::new(&[("status", Ascending)]);

pub const NOTIFICATIONS: CollectionSpec = CollectionSpec {
    name: NOTIFICATIONS_COLLECTION,
    indexes: &[NOTIFICATIONS_BY_USER, NOTIFICATIONS_BY_TYPE_STATUS],
};

pub const BACKUPS: CollectionSpec = CollectionSpec {
    name: BACKUPS_COLLECTION,
    indexes: &[BACKUPS_BY_USER, BACKUPS_BY_STATUS],
};

/// Every collection the bootstrap declares, in creation order
pub const COLLECTIONS: &[CollectionSpec] = &[NOTIFICATIONS, BACKUPS];

/// A role granted to a user, scoped to one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: String,
    pub db: String,
}

impl RoleGrant {
    pub fn read_write(database: &str) -> Self {
        Self {
            role: READ_WRITE_ROLE.to_string(),
            db: database.to_string(),
        }
    }

    pub fn to_document(&self) -> Document {
        doc! { "role": self.role.as_str(), "db": self.db.as_str() }
    }
}

/// Application user to create in the target database
#[derive(Clone, PartialEq, Eq)]
pub struct UserSpec {
    pub username: String,
    pub password: String,
    pub roles: Vec<RoleGrant>,
}

impl UserSpec {
    /// User limited to read/write on `database`
    pub fn read_write(username: &str, password: &str, database: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            roles: vec![RoleGrant::read_write(database)],
        }
    }
}

impl std::fmt::Debug for UserSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSpec")
            .field("username", &self.username)
            .field("password", &"****")
            .field("roles", &self.roles)
            .finish()
    }
}

/// An index as reported by the server
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingIndex {
    pub name: String,
    pub keys: Document,
}

impl ExistingIndex {
    /// Same name and same keys in the same order
    ///
    /// Key directions compare numerically: shells that write `1.0` build the same
    /// index as drivers that write `1`.
    pub fn matches(&self, spec: &IndexSpec) -> bool {
        self.name == spec.name()
            && self.keys.len() == spec.keys.len()
            && self
                .keys
                .iter()
                .zip(spec.keys)
                .all(|((field, value), (expected, order))| {
                    field.as_str() == *expected && key_direction(value) == Some(order.value() as f64)
                })
    }
}

fn key_direction(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

impl From<&IndexSpec> for ExistingIndex {
    fn from(spec: &IndexSpec) -> Self {
        Self {
            name: spec.name(),
            keys: spec.keys_document(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_names() {
        assert_eq!(NOTIFICATIONS_BY_USER.name(), "userId_1_createdAt_-1");
        assert_eq!(NOTIFICATIONS_BY_TYPE_STATUS.name(), "type_1_status_1");
        assert_eq!(BACKUPS_BY_USER.name(), "userId_1_createdAt_-1");
        assert_eq!(BACKUPS_BY_STATUS.name(), "status_1");
    }

    #[test]
    fn test_keys_document_preserves_order() {
        let keys = NOTIFICATIONS_BY_USER.keys_document();
        let fields: Vec<&str> = keys.keys().map(String::as_str).collect();

        assert_eq!(fields, vec!["userId", "createdAt"]);
        assert_eq!(keys.get_i32("userId").unwrap(), 1);
        assert_eq!(keys.get_i32("createdAt").unwrap(), -1);
    }

    #[test]
    fn test_existing_index_matching_is_order_sensitive() {
        let reversed = ExistingIndex {
            name: NOTIFICATIONS_BY_USER.name(),
            keys: doc! { "createdAt": -1, "userId": 1 },
        };
        assert!(!reversed.matches(&NOTIFICATIONS_BY_USER));
        assert!(ExistingIndex::from(&NOTIFICATIONS_BY_USER).matches(&NOTIFICATIONS_BY_USER));
    }

    #[test]
    fn test_existing_index_matching_accepts_double_and_long_keys() {
        let doubles = ExistingIndex {
            name: "userId_1_createdAt_-1".to_string(),
            keys: doc! { "userId": 1.0, "createdAt": -1.0 },
        };
        let longs = ExistingIndex {
            name: "status_1".to_string(),
            keys: doc! { "status": 1_i64 },
        };

        assert!(doubles.matches(&NOTIFICATIONS_BY_USER));
        assert!(longs.matches(&BACKUPS_BY_STATUS));
    }

    #[test]
    fn test_existing_index_matching_rejects_other_directions() {
        let ascending = ExistingIndex {
            name: "userId_1_createdAt_-1".to_string(),
            keys: doc! { "userId": 1, "createdAt": 1 },
        };
        let text = ExistingIndex {
            name: "status_1".to_string(),
            keys: doc! { "status": "text" },
        };
        let extra_field = ExistingIndex {
            name: "status_1".to_string(),
            keys: doc! { "status": 1, "userId": 1 },
        };

        assert!(!ascending.matches(&NOTIFICATIONS_BY_USER));
        assert!(!text.matches(&BACKUPS_BY_STATUS));
        assert!(!extra_field.matches(&BACKUPS_BY_STATUS));
    }

    #[test]
    fn test_declared_collections() {
        let names: Vec<&str> = COLLECTIONS.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["notifications", "backups"]);
        assert!(COLLECTIONS.iter().all(|c| c.indexes.len() == 2));
    }

    #[test]
    fn test_user_spec_is_read_write_only() {
        let user = UserSpec::read_write("budget_user", "pw", "budget_tracker");

        assert_eq!(user.roles.len(), 1);
        assert_eq!(user.roles[0].role, "readWrite");
        assert_eq!(user.roles[0].db, "budget_tracker");
        assert!(!format!("{:?}", user).contains("\"pw\""));
    }
}
