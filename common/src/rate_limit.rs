use crate::errors::WebhookError;
use redis::AsyncCommands;
use uuid::Uuid;

/// Redis-backed rate limiter for inbound engine callbacks.
///
/// Uses a sorted set per workflow with request timestamps as scores, so the
/// window slides without a background sweeper.
pub struct RateLimiter {
    redis_client: redis::Client,
}

impl RateLimiter {
    pub fn new(redis_client: redis::Client) -> Self {
        Self { redis_client }
    }

    /// Check whether a callback for `workflow_id` is within its rate limit.
    ///
    /// # Returns
    /// * `Ok(true)` if the request is allowed
    /// * `Ok(false)` if the request should be rejected with 429
    #[tracing::instrument(skip(self))]
    pub async fn check_rate_limit(
        &self,
        workflow_id: Uuid,
        max_requests: u32,
        window_seconds: u32,
    ) -> Result<bool, WebhookError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let key = format!("rate_limit:callback:{}", workflow_id);
        let now = chrono::Utc::now().timestamp();
        let window_start = now - window_seconds as i64;

        // Drop entries that fell out of the window, then count what remains
        let _: () = conn.zrembyscore(&key, 0, window_start).await?;
        let count: u32 = conn.zcard(&key).await?;

        if count >= max_requests {
            tracing::warn!(
                workflow_id = %workflow_id,
                count = count,
                max_requests = max_requests,
                "Callback rate limit exceeded"
            );
            return Ok(false);
        }

        let request_id = Uuid::new_v4().to_string();
        let _: () = conn.zadd(&key, request_id, now).await?;
        let _: () = conn.expire(&key, (window_seconds + 60) as i64).await?;

        Ok(true)
    }

    /// Current request count in the window for a workflow
    #[tracing::instrument(skip(self))]
    pub async fn current_count(
        &self,
        workflow_id: Uuid,
        window_seconds: u32,
    ) -> Result<u32, WebhookError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let key = format!("rate_limit:callback:{}", workflow_id);
        let now = chrono::Utc::now().timestamp();
        let window_start = now - window_seconds as i64;

        let _: () = conn.zrembyscore(&key, 0, window_start).await?;
        let count: u32 = conn.zcard(&key).await?;

        Ok(count)
    }

    /// Reset the counter for a workflow (testing or manual intervention)
    #[tracing::instrument(skip(self))]
    pub async fn reset(&self, workflow_id: Uuid) -> Result<(), WebhookError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let key = format!("rate_limit:callback:{}", workflow_id);
        let _: () = conn.del(&key).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These require a running Redis instance; run with --ignored.

    #[tokio::test]
    #[ignore]
    async fn test_rate_limit_allows_requests_within_limit() {
        let redis_client = redis::Client::open("redis://127.0.0.1:6379").unwrap();
        let rate_limiter = RateLimiter::new(redis_client);
        let workflow_id = Uuid::new_v4();

        rate_limiter.reset(workflow_id).await.unwrap();

        for i in 1..=3 {
            let allowed = rate_limiter
                .check_rate_limit(workflow_id, 5, 60)
                .await
                .unwrap();
            assert!(allowed, "Request {} should be allowed", i);
        }

        let count = rate_limiter.current_count(workflow_id, 60).await.unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    #[ignore]
    async fn test_rate_limit_blocks_requests_over_limit() {
        let redis_client = redis::Client::open("redis://127.0.0.1:6379").unwrap();
        let rate_limiter = RateLimiter::new(redis_client);
        let workflow_id = Uuid::new_v4();

        rate_limiter.reset(workflow_id).await.unwrap();

        for _ in 1..=5 {
            assert!(rate_limiter
                .check_rate_limit(workflow_id, 5, 60)
                .await
                .unwrap());
        }

        let allowed = rate_limiter
            .check_rate_limit(workflow_id, 5, 60)
            .await
            .unwrap();
        assert!(!allowed, "Request over limit should be blocked");
    }
}
