pub mod error;
pub mod local;
pub mod remote;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use local::LocalCollection;
pub use remote::RemoteCollection;
pub use sqlite::SqliteStore;
pub use traits::*;
