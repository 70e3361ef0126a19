pub mod repo;
pub mod sqlite;

pub use repo::{UserDirectory, UserRecord};
pub use sqlite::SqliteUserStore;
