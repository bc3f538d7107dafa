//! Domain models persisted by the cache stores.

pub mod characteristics;
pub mod credentials;
pub mod product;
pub mod sync_run;

pub use characteristics::{CachedCharacteristics, CharacteristicsCacheStats};
pub use credentials::{AccountCredential, NewAccountCredential};
pub use product::{CachedProduct, NewCachedProduct, ProductCacheStats, ProductPage};
pub use sync_run::{SyncKind, SyncRun, SyncStatus};
