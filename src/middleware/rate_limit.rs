use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::utils::{error_codes, error_to_api_response};

/// 按资源类别预设的限流参数
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPreset {
    pub limit: u32,
    pub window: Duration,
}

/// AI 类接口：每小时 10 次
pub const AI_PRESET: RateLimitPreset = RateLimitPreset {
    limit: 10,
    window: Duration::from_secs(3600),
};

/// 查询类接口：每小时 100 次
pub const LOOKUP_PRESET: RateLimitPreset = RateLimitPreset {
    limit: 100,
    window: Duration::from_secs(3600),
};

/// 写入类接口：每小时 30 次
pub const MUTATION_PRESET: RateLimitPreset = RateLimitPreset {
    limit: 30,
    window: Duration::from_secs(3600),
};

// 全局清理的最小间隔，防止 key 数量无限增长
const CLEANUP_INTERVAL_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after_secs: u64,
}

struct RateLimitEntry {
    // 窗口内的请求时间戳（毫秒），按时间递增
    hits: VecDeque<i64>,
    // 该 key 最近一次使用的窗口，清理时按它裁剪
    window_ms: i64,
}

struct RateLimiterInner {
    entries: HashMap<String, RateLimitEntry>,
    last_cleanup_ms: i64,
}

/// 滑动窗口限流器
///
/// 状态只存在于进程内存中，重启即清零。这是有意的取舍：限流在这里
/// 只是善意节流，不是安全边界，跨实例的一致性由存储层兜底。
pub struct RateLimiter {
    inner: Mutex<RateLimiterInner>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RateLimiterInner {
                entries: HashMap::new(),
                last_cleanup_ms: chrono::Utc::now().timestamp_millis(),
            }),
        }
    }

    /// 检查 key 在滑动窗口内是否还有配额
    ///
    /// 放行时记录本次请求；拒绝时不消耗配额，只返回需等待的秒数。
    pub fn check(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision {
        let now = chrono::Utc::now().timestamp_millis();
        let window_ms = window.as_millis() as i64;

        let mut inner = self.inner.lock().unwrap();

        if now - inner.last_cleanup_ms >= CLEANUP_INTERVAL_MS {
            Self::cleanup(&mut inner, now);
        }

        let entry = inner
            .entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry {
                hits: VecDeque::new(),
                window_ms,
            });
        entry.window_ms = window_ms;

        // 裁掉滑出窗口的时间戳
        while entry.hits.front().is_some_and(|&ts| ts <= now - window_ms) {
            entry.hits.pop_front();
        }

        if (entry.hits.len() as u32) < limit {
            entry.hits.push_back(now);
            RateLimitDecision {
                allowed: true,
                remaining: limit - entry.hits.len() as u32,
                retry_after_secs: 0,
            }
        } else {
            // 最早的一条滑出窗口后才会腾出配额
            let retry_ms = entry
                .hits
                .front()
                .map(|&oldest| oldest + window_ms - now)
                .unwrap_or(window_ms);
            RateLimitDecision {
                allowed: false,
                remaining: 0,
                retry_after_secs: ((retry_ms + 999) / 1000).max(1) as u64,
            }
        }
    }

    fn cleanup(inner: &mut RateLimiterInner, now: i64) {
        inner.entries.retain(|_, entry| {
            while entry
                .hits
                .front()
                .is_some_and(|&ts| ts <= now - entry.window_ms)
            {
                entry.hits.pop_front();
            }
            !entry.hits.is_empty()
        });
        inner.last_cleanup_ms = now;
    }

    #[cfg(test)]
    fn force_cleanup(&self) {
        let mut inner = self.inner.lock().unwrap();
        let now = chrono::Utc::now().timestamp_millis();
        Self::cleanup(&mut inner, now);
    }

    #[cfg(test)]
    fn key_count(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    #[cfg(test)]
    fn hit_count(&self, key: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .entries
            .get(key)
            .map(|e| e.hits.len())
            .unwrap_or(0)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn preset_for(method: &Method) -> (&'static str, RateLimitPreset) {
    if method == Method::GET {
        ("lookup", LOOKUP_PRESET)
    } else {
        ("mutation", MUTATION_PRESET)
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    // 从连接信息获取原始IP
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());
    // 优先使用代理传递的请求头，连接IP作为降级
    let ip = req
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or_else(|| remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string();

    let (class, preset) = preset_for(req.method());
    let key = format!("{}:{}", ip, class);

    let decision = limiter.check(&key, preset.limit, preset.window);
    if !decision.allowed {
        tracing::debug!(
            key = %key,
            retry_after_secs = decision.retry_after_secs,
            "rate limit exceeded"
        );
        return Ok((
            StatusCode::TOO_MANY_REQUESTS,
            error_to_api_response::<()>(
                error_codes::RATE_LIMIT,
                format!("请求过于频繁，请在{}秒后重试", decision.retry_after_secs),
            ),
        )
            .into_response());
    }

    Ok(next.run(req).await)
}
