//! Redis-backed queue and device state.
//!
//! Both halves of the shared state live in one Redis instance so several
//! broker processes (or a restarted one) see the same queue:
//!
//! - **Queue**: a list at `<prefix>:job_queue` (RPUSH at the tail, LPOP at the head)
//! - **Sequence**: a counter at `<prefix>:job_seq`, incremented in the same
//!   script that pushes the job so list order and sequence order agree
//! - **Device state**: a string at `<prefix>:device_state`; a missing key reads as IDLE
//!
//! The claim is a Lua script (GET + SET executed atomically by the server).
//! The connection is established lazily and dropped on I/O failure, so the
//! service can start while Redis is down and recover once it is back.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument, warn};

use web2wire_core::{DeviceState, Job, PulseRequest, SequenceId};

use crate::device_state::DeviceStateStore;
use crate::error::StoreError;
use crate::queue::JobQueue;

/// Default key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "web2wire";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

const ENQUEUE_SCRIPT: &str = r#"
local seq = redis.call('INCR', KEYS[2])
local job = cjson.decode(ARGV[1])
job['sequence_id'] = seq
redis.call('RPUSH', KEYS[1], cjson.encode(job))
return seq
"#;

const CLAIM_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if current == false or current == 'IDLE' then
  redis.call('SET', KEYS[1], 'PROCESSING')
  return 1
end
return 0
"#;

/// Queue + device state stored in Redis.
pub struct RedisBrokerStore {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    queue_key: String,
    seq_key: String,
    state_key: String,
    enqueue_script: redis::Script,
    claim_script: redis::Script,
}

impl core::fmt::Debug for RedisBrokerStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisBrokerStore")
            .field("queue_key", &self.queue_key)
            .field("state_key", &self.state_key)
            .finish_non_exhaustive()
    }
}

impl RedisBrokerStore {
    /// Create a store for `redis_url` (e.g. `redis://localhost:6379`).
    ///
    /// Only the URL is validated here; no connection is opened until the
    /// first command.
    pub fn new(redis_url: impl AsRef<str>, key_prefix: Option<&str>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| StoreError::unavailable(format!("invalid redis url: {e}")))?;
        let prefix = key_prefix.unwrap_or(DEFAULT_KEY_PREFIX);

        Ok(Self {
            client,
            conn: Mutex::new(None),
            queue_key: format!("{prefix}:job_queue"),
            seq_key: format!("{prefix}:job_seq"),
            state_key: format!("{prefix}:device_state"),
            enqueue_script: redis::Script::new(ENQUEUE_SCRIPT),
            claim_script: redis::Script::new(CLAIM_SCRIPT),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let mut cached = self.conn.lock().await;
        if let Some(conn) = cached.as_ref() {
            return Ok(conn.clone());
        }

        let conn = tokio::time::timeout(
            CONNECT_TIMEOUT,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| StoreError::unavailable("redis connect timed out"))?
        .map_err(|e| StoreError::unavailable(e.to_string()))?;

        debug!("redis connection established");
        *cached = Some(conn.clone());
        Ok(conn)
    }

    async fn forget_connection(&self) {
        self.conn.lock().await.take();
    }

    /// Run one command on a (possibly fresh) connection with a hard timeout.
    async fn run<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let conn = self.connection().await?;

        match tokio::time::timeout(COMMAND_TIMEOUT, f(conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if is_connection_error(&e) => {
                warn!(op, error = %e, "redis connection lost");
                self.forget_connection().await;
                Err(StoreError::unavailable(e.to_string()))
            }
            Ok(Err(e)) => {
                error!(op, error = %e, "redis command failed");
                Err(StoreError::corrupt(e.to_string()))
            }
            Err(_) => {
                warn!(op, "redis command timed out");
                self.forget_connection().await;
                Err(StoreError::unavailable(format!("{op} timed out")))
            }
        }
    }
}

fn is_connection_error(e: &redis::RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
}

#[async_trait]
impl JobQueue for RedisBrokerStore {
    #[instrument(skip(self, request), fields(queue_key = %self.queue_key), err)]
    async fn enqueue(&self, request: PulseRequest) -> Result<Job, StoreError> {
        let payload = serde_json::to_string(&request)
            .map_err(|e| StoreError::corrupt(format!("serialize request: {e}")))?;

        let script = self.enqueue_script.clone();
        let queue_key = self.queue_key.clone();
        let seq_key = self.seq_key.clone();

        let seq: u64 = self
            .run("enqueue", |mut conn| async move {
                script
                    .key(queue_key)
                    .key(seq_key)
                    .arg(payload)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;

        Ok(request.into_job(SequenceId::new(seq)))
    }

    async fn size(&self) -> Result<usize, StoreError> {
        let key = self.queue_key.clone();
        self.run("size", |mut conn| async move { conn.llen(key).await })
            .await
    }

    #[instrument(skip(self), fields(queue_key = %self.queue_key), err)]
    async fn dequeue(&self) -> Result<Option<Job>, StoreError> {
        let key = self.queue_key.clone();
        let raw: Option<String> = self
            .run("dequeue", |mut conn| async move { conn.lpop(key, None).await })
            .await?;

        match raw {
            None => Ok(None),
            Some(raw) => serde_json::from_str::<Job>(&raw).map(Some).map_err(|e| {
                error!(error = %e, payload = %raw, "dropping unreadable queue entry");
                StoreError::corrupt(format!("queue entry: {e}"))
            }),
        }
    }

    #[instrument(skip(self, job), fields(sequence_id = %job.sequence_id()), err)]
    async fn requeue_front(&self, job: Job) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&job)
            .map_err(|e| StoreError::corrupt(format!("serialize job: {e}")))?;
        let key = self.queue_key.clone();

        let _: i64 = self
            .run("requeue_front", |mut conn| async move { conn.lpush(key, payload).await })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DeviceStateStore for RedisBrokerStore {
    async fn read(&self) -> Result<DeviceState, StoreError> {
        let key = self.state_key.clone();
        let raw: Option<String> = self
            .run("read_state", |mut conn| async move { conn.get(key).await })
            .await?;

        match raw {
            None => Ok(DeviceState::Idle),
            Some(raw) => raw
                .parse()
                .map_err(|e| StoreError::corrupt(format!("{e}"))),
        }
    }

    #[instrument(skip(self), fields(state_key = %self.state_key), err)]
    async fn try_claim(&self) -> Result<bool, StoreError> {
        let script = self.claim_script.clone();
        let key = self.state_key.clone();

        let claimed: i64 = self
            .run("try_claim", |mut conn| async move {
                script.key(key).invoke_async(&mut conn).await
            })
            .await?;
        Ok(claimed == 1)
    }

    #[instrument(skip(self), fields(state_key = %self.state_key), err)]
    async fn release(&self) -> Result<(), StoreError> {
        let key = self.state_key.clone();
        let _: () = self
            .run("release", |mut conn| async move {
                conn.set(key, DeviceState::Idle.as_str()).await
            })
            .await?;
        Ok(())
    }
}
