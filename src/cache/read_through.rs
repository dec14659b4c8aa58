use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use redis::{AsyncCommands, Client as RedisClient};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const REDIS_KEY_PREFIX: &str = "cache:";

/// 缓存读取失败
#[derive(Debug, Clone)]
pub enum CacheError {
    /// 填充函数失败，所有等待同一个 key 的调用者收到同一份错误
    Fill(String),
    /// 缓存值编解码失败
    Codec(String),
}

impl CacheError {
    pub fn fill(err: impl fmt::Display) -> Self {
        CacheError::Fill(err.to_string())
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Fill(msg) => write!(f, "cache fill failed: {}", msg),
            CacheError::Codec(msg) => write!(f, "cache codec error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {}

#[derive(Clone)]
struct MemoryEntry {
    payload: String,
    cached_at_ms: i64,
}

/// 持久层存储的信封：写入时间随数据一起落盘，读取时按调用方的 TTL 判新鲜
#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    cached_at: i64,
    data: String,
}

type FillResult = Result<String, CacheError>;

enum Role {
    Leader(broadcast::Sender<FillResult>),
    Follower(broadcast::Receiver<FillResult>),
}

/// 两级读穿缓存
///
/// 内存层命中直接返回；未命中时降级到 redis 持久层；两层都未命中则执行
/// 填充函数，同一个 key 任意时刻至多一个填充在途，并发调用者共享同一份
/// 结果。redis 不可用时静默退化为仅内存模式。
pub struct ReadThroughCache {
    redis: Arc<RedisClient>,
    memory: Mutex<HashMap<String, MemoryEntry>>,
    in_flight: Mutex<HashMap<String, broadcast::Sender<FillResult>>>,
}

impl ReadThroughCache {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self {
            redis,
            memory: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// 读取缓存，未命中时用 fill 填充两级缓存
    pub async fn get<T, F, Fut>(&self, key: &str, ttl: Duration, fill: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        let now = chrono::Utc::now().timestamp_millis();
        let ttl_ms = ttl.as_millis() as i64;

        if let Some(payload) = self.memory_lookup(key, now, ttl_ms) {
            return decode(&payload);
        }

        if let Some(payload) = self.persistent_lookup(key, now, ttl_ms).await {
            return decode(&payload);
        }

        // 要么合并到已在途的填充，要么自己成为发起者
        let role = {
            let mut in_flight = self.in_flight.lock().unwrap();
            match in_flight.get(key) {
                Some(tx) => Role::Follower(tx.subscribe()),
                None => {
                    let (tx, _) = broadcast::channel(1);
                    in_flight.insert(key.to_string(), tx.clone());
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Follower(mut rx) => match rx.recv().await {
                Ok(Ok(payload)) => decode(&payload),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(CacheError::Fill("cache fill was aborted".into())),
            },
            Role::Leader(tx) => {
                let outcome = match fill().await {
                    Ok(value) => match serde_json::to_string(&value) {
                        Ok(payload) => Ok((value, payload)),
                        Err(e) => Err(CacheError::Codec(e.to_string())),
                    },
                    Err(err) => Err(err),
                };

                match outcome {
                    Ok((value, payload)) => {
                        self.store(key, &payload).await;
                        self.in_flight.lock().unwrap().remove(key);
                        let _ = tx.send(Ok(payload));
                        Ok(value)
                    }
                    Err(err) => {
                        // 失败不写任何一层，但在途标记必须摘掉
                        self.in_flight.lock().unwrap().remove(key);
                        let _ = tx.send(Err(err.clone()));
                        Err(err)
                    }
                }
            }
        }
    }

    /// 按 key 失效两级缓存
    pub async fn invalidate(&self, key: &str) {
        self.memory.lock().unwrap().remove(key);

        if let Ok(mut conn) = self.redis.get_multiplexed_async_connection().await {
            let result: Result<(), redis::RedisError> = conn.del(redis_key(key)).await;
            if let Err(e) = result {
                tracing::debug!("cache invalidate skipped persistent tier: {}", e);
            }
        }
    }

    /// 按前缀失效两级缓存
    pub async fn invalidate_prefix(&self, prefix: &str) {
        self.memory
            .lock()
            .unwrap()
            .retain(|k, _| !k.starts_with(prefix));

        let Ok(mut conn) = self.redis.get_multiplexed_async_connection().await else {
            return;
        };

        let pattern = format!("{}{}*", REDIS_KEY_PREFIX, prefix);
        let mut cursor: u64 = 0;
        loop {
            let scanned: Result<(u64, Vec<String>), redis::RedisError> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await;
            let (next, keys) = match scanned {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!("cache prefix scan skipped persistent tier: {}", e);
                    return;
                }
            };
            if !keys.is_empty() {
                let _: Result<(), redis::RedisError> = conn.del(&keys).await;
            }
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
    }

    fn memory_lookup(&self, key: &str, now: i64, ttl_ms: i64) -> Option<String> {
        let memory = self.memory.lock().unwrap();
        memory
            .get(key)
            .filter(|entry| now - entry.cached_at_ms < ttl_ms)
            .map(|entry| entry.payload.clone())
    }

    async fn persistent_lookup(&self, key: &str, now: i64, ttl_ms: i64) -> Option<String> {
        let mut conn = self.redis.get_multiplexed_async_connection().await.ok()?;
        let raw: Option<String> = conn.get(redis_key(key)).await.ok()?;
        let envelope: PersistedEntry = serde_json::from_str(&raw?).ok()?;

        if now - envelope.cached_at >= ttl_ms {
            return None;
        }

        // 提升到内存层，保留原始写入时间，避免变相续命
        self.memory.lock().unwrap().insert(
            key.to_string(),
            MemoryEntry {
                payload: envelope.data.clone(),
                cached_at_ms: envelope.cached_at,
            },
        );
        Some(envelope.data)
    }

    async fn store(&self, key: &str, payload: &str) {
        let now = chrono::Utc::now().timestamp_millis();

        self.memory.lock().unwrap().insert(
            key.to_string(),
            MemoryEntry {
                payload: payload.to_string(),
                cached_at_ms: now,
            },
        );

        // 持久层写失败时静默退化为仅内存
        if let Ok(mut conn) = self.redis.get_multiplexed_async_connection().await {
            let envelope = PersistedEntry {
                cached_at: now,
                data: payload.to_string(),
            };
            if let Ok(json) = serde_json::to_string(&envelope) {
                let result: Result<(), redis::RedisError> = conn.set(redis_key(key), json).await;
                if let Err(e) = result {
                    tracing::debug!("cache persistent tier write failed: {}", e);
                }
            }
        }
    }
}

fn redis_key(key: &str) -> String {
    format!("{}{}", REDIS_KEY_PREFIX, key)
}

fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, CacheError> {
    serde_json::from_str(payload).map_err(|e| CacheError::Codec(e.to_string()))
}
