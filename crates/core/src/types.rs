/// Connection-scoped identifier assigned by the broker on upgrade.
pub type SessionId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
