/// Memoises a fallible async computation through a [`CacheStore`](crate::db::CacheStore).
///
/// Returns the cached value when present. Otherwise awaits `$block`, stores its
/// successful output in the background and returns it. A failing cache read is
/// logged and treated as a miss; errors from `$block` propagate.
///
/// # Arguments
/// * `$cache`: An `Arc<dyn CacheStore>` (or anything exposing `get_from_cache` and
///   `set_in_background`).
/// * `$key`: The [`CacheKey`](crate::db::CacheKey) for the value.
/// * `$ttl`: The time-to-live in seconds.
/// * `$block`: A future yielding `AppResult<T>`, awaited on a miss.
///
/// # Example
/// ```rust,ignore
/// let vector: Vec<f32> = cached!(self.cache, key, ttl, async {
///     self.request_embedding(text).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        let hit = match $cache.get_from_cache(&key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache read failed, computing value");
                None
            }
        };

        match hit {
            Some(cached) => Ok(cached),
            None => match $block.await {
                Ok(value) => {
                    $cache.set_in_background(&key, &value, $ttl);
                    Ok(value)
                }
                Err(e) => Err(e),
            },
        }
    }};
}
