/// Database created when `BOOTSTRAP_DATABASE` is not set
pub const DEFAULT_DATABASE_NAME: &str = "budget_tracker";

/// Upper bound on a whole bootstrap run (seconds)
/// Also used as the driver's server selection and connect timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Only role granted to the application user
pub const READ_WRITE_ROLE: &str = "readWrite";

pub const NOTIFICATIONS_COLLECTION: &str = "notifications";
pub const BACKUPS_COLLECTION: &str = "backups";

// =============================================================================
// Seed Data
// =============================================================================

/// Pseudo-user owning system-generated notifications
pub const SYSTEM_USER_ID: &str = "system";

pub const WELCOME_TITLE: &str = "Welcome to Budget Tracker";

pub const WELCOME_MESSAGE: &str =
    "Welcome to Budget Tracker! Start managing your finances today.";

// =============================================================================
// Server Error Codes
// =============================================================================

pub const CODE_HOST_UNREACHABLE: i32 = 6;
pub const CODE_HOST_NOT_FOUND: i32 = 7;
pub const CODE_UNAUTHORIZED: i32 = 13;
pub const CODE_AUTHENTICATION_FAILED: i32 = 18;
pub const CODE_NAMESPACE_EXISTS: i32 = 48;
pub const CODE_INDEX_OPTIONS_CONFLICT: i32 = 85;
pub const CODE_INDEX_KEY_SPECS_CONFLICT: i32 = 86;
pub const CODE_NETWORK_TIMEOUT: i32 = 89;
pub const CODE_SHUTDOWN_IN_PROGRESS: i32 = 91;
pub const CODE_SOCKET_EXCEPTION: i32 = 9001;
pub const CODE_DUPLICATE_KEY: i32 = 11000;

/// Returned by `createUser` when the user already exists
pub const CODE_USER_ALREADY_EXISTS: i32 = 51003;
