pub mod memory;
pub mod postgres;
pub mod redis;
pub mod store;

pub use memory::{MemoryCache, MemoryCatalog};
pub use postgres::{create_pool, PgMetadataStore};
pub use self::redis::{create_redis_client, Cache, CacheWriterHandle};
pub use store::{fingerprint, CacheKey, CacheStore};
