use std::future::Future;

use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{Deserialize, Serialize};

use crate::{
    database::error::CacheError,
    error::Error,
};

// Caching - keys

#[derive(Serialize, Clone, Debug)]
pub struct CacheKey<T: ToString + Serialize> {
    _value: T,
    _type: CacheKeyType,
}

impl<T: ToString + Serialize> CacheKey<T> {
    pub fn from(r#type: CacheKeyType, key: T) -> Self {
        Self {
            _value: key,
            _type: r#type,
        }
    }
}

impl<T: ToString + Serialize> From<&CacheKey<T>> for String {
    fn from(value: &CacheKey<T>) -> Self {
        match value._type {
            CacheKeyType::Tag => format!("tag-{}", value._value.to_string()),
            CacheKeyType::Ingredient => format!("ingredient-{}", value._value.to_string()),
        }
    }
}

impl<T: ToString + Serialize> std::fmt::Display for CacheKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from(self))
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheKeyType {
    Tag,
    Ingredient,
}

impl CacheKeyType {
    pub fn new<T: ToString + Serialize>(self, key: T) -> CacheKey<T> {
        CacheKey::from(self, key)
    }
}

impl<T: ToString + Serialize> From<&CacheKey<T>> for CacheLifetime {
    fn from(value: &CacheKey<T>) -> Self {
        match value._type {
            CacheKeyType::Tag => CacheLifetime::BindTagCache,
            CacheKeyType::Ingredient => CacheLifetime::BindIngredientCache,
        }
    }
}

// Cache - wrappers

/// Cached values remember the bind token of their lifetime at write time;
/// rotating the token invalidates every value written under the old one.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheLifetime {
    BindTagCache,
    BindIngredientCache,
}

impl CacheLifetime {
    fn bind_key(&self) -> &'static str {
        match self {
            CacheLifetime::BindTagCache => "tag-cache-key",
            CacheLifetime::BindIngredientCache => "ingredient-cache-key",
        }
    }

    async fn current_bind(&self, cache: &mut MultiplexedConnection) -> Result<Option<String>, Error> {
        get_cache_value::<&str, String>(self.bind_key(), cache).await
    }

    /// Rotates the bind token, dropping everything cached under this lifetime.
    pub async fn invalidate(&self, cache: &mut MultiplexedConnection) -> Result<(), Error> {
        let bind = uuid::Uuid::new_v4().to_string();
        log::info!("> Invalidating {} ({bind})", self.bind_key());

        set_cache_value(self.bind_key(), bind, cache).await
    }
}

#[derive(Serialize, serde::Deserialize, FromRedisValue, ToRedisArgs, Clone)]
pub struct RedisValue<T: serde::Serialize + Send + Sync + Clone> {
    pub value: T,
    _lifetime: CacheLifetime,
    _bind: Option<String>,
}

impl<T: serde::Serialize + Send + Sync + Clone + for<'a> Deserialize<'a>> RedisValue<T> {
    async fn new(
        value: T,
        lifetime: CacheLifetime,
        cache: &mut MultiplexedConnection,
    ) -> Result<Self, Error> {
        let bind = lifetime.current_bind(cache).await?;

        Ok(Self {
            value,
            _lifetime: lifetime,
            _bind: bind,
        })
    }

    /// Still current when stored under `key`'s lifetime with the live bind token.
    async fn is_current<K: ToString + Serialize>(
        &self,
        key: &CacheKey<K>,
        cache: &mut MultiplexedConnection,
    ) -> Result<bool, Error> {
        if self._lifetime != CacheLifetime::from(key) {
            log::warn!("> {key} was cached under {:?}", self._lifetime);
            return Ok(false);
        }
        Ok(self._bind == self._lifetime.current_bind(cache).await?)
    }

    /// Returns the cached value under `key` while its bind is current, otherwise
    /// runs `callback`, caches what it produced and returns that.
    pub async fn get_or<'a, F, Fut, K>(
        key: CacheKey<K>,
        cache: &mut MultiplexedConnection,
        callback: F,
    ) -> Result<RedisValue<T>, Error>
    where
        K: ToString + Serialize + Clone + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, Error>> + Send + 'a,
    {
        let value = match read_cache_value::<String, RedisValue<T>>((&key).into(), cache).await {
            Ok(value) => value,
            Err(e) if is_unreadable_entry(&e) => {
                let mut c = cache.clone();
                let k = key.to_string();
                tokio::spawn(async move {
                    log::error!("> Failed to deserialize cached value. Deleting {}", &k);
                    if let Err(e) = delete_cache_value(k, &mut c).await {
                        log::error!("> Failed to delete cached value! {e}");
                    }
                });
                None
            }
            Err(e) => return Err(CacheError::from(e).into()),
        };
        // * Cannot use .map(|| {...}) due to async closures
        let value = match value {
            Some(value) => {
                log::trace!("> Found {}", key);
                match value.is_current(&key, cache).await? {
                    true => Some(value),
                    false => {
                        log::trace!("> Invalidated {}", key);
                        None
                    }
                }
            }
            None => None,
        };

        match value {
            Some(value) => Ok(value),
            None => {
                log::trace!("> Fetching {}", key);
                let value = callback().await?;
                let lifetime: CacheLifetime = (&key).into();
                let value = RedisValue::new(value, lifetime, cache).await?;

                if let Err(e) =
                    set_cache_value::<String, RedisValue<T>>((&key).into(), value.clone(), cache)
                        .await
                {
                    log::warn!("> Failed to cache {}: {e}", key);
                }

                Ok(value)
            }
        }
    }
}

// Cache - raw handlers

pub async fn set_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache
        .set(key, value)
        .await
        .map_err(|e| Error::from(CacheError::from(e)))?;

    Ok(())
}

/// Stores `value` under `key` for `seconds`, after which redis drops it.
pub async fn set_expiring_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    seconds: u64,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache
        .set_ex(key, value, seconds)
        .await
        .map_err(|e| Error::from(CacheError::from(e)))?;

    Ok(())
}

pub async fn delete_cache_value<K: ToRedisArgs + Send + Sync>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache
        .del(key)
        .await
        .map_err(|e| Error::from(CacheError::from(e)))?;

    Ok(())
}

/// An entry that exists but no longer decodes, e.g. written by an older
/// layout of the cached type. Connection failures are not in this class.
fn is_unreadable_entry(e: &redis::RedisError) -> bool {
    e.kind() == redis::ErrorKind::TypeError
}

async fn read_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, redis::RedisError> {
    cache.get(key).await
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, Error> {
    read_cache_value(key, cache)
        .await
        .map_err(|e| Error::from(CacheError::from(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_type() {
        assert_eq!(CacheKeyType::Tag.new("all").to_string(), "tag-all");
        assert_eq!(
            CacheKeyType::Ingredient.new("to").to_string(),
            "ingredient-to"
        );
    }

    #[test]
    fn only_undecodable_entries_are_discarded() {
        let undecodable = redis::RedisError::from((redis::ErrorKind::TypeError, "bad layout"));
        let dropped = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        ));

        assert!(is_unreadable_entry(&undecodable));
        assert!(!is_unreadable_entry(&dropped));
    }

    #[test]
    fn keys_bind_to_their_lifetime() {
        let tag = CacheKeyType::Tag.new("all");
        let ingredient = CacheKeyType::Ingredient.new("");

        assert_eq!(CacheLifetime::from(&tag), CacheLifetime::BindTagCache);
        assert_eq!(
            CacheLifetime::from(&ingredient),
            CacheLifetime::BindIngredientCache
        );
    }
}
