//! S3/WebHDFS-backed `PoolDriver`/`IODriver` via `opendal`.
//!
//! `opendal` was already a teacher dependency (there driving the
//! orchestrator's own volume storage backend); reused here for the two
//! object-store-shaped pool types spec.md §1 names explicitly. Grounded on
//! `infrastructure/storage/seaweedfs.rs`'s provider-over-a-generic-client
//! shape, adapted from whole-volume operations to individual pfn objects.

use crate::application::io::{IODriver, IOHandler, Whence};
use crate::application::pool::PoolDriver;
use crate::domain::errors::{IoError, PoolError, TokenError};
use crate::domain::location::{Chunk, IoFlags, Location};
use crate::domain::pool::Pool;
use crate::domain::replica::Replica;
use crate::domain::token;
use crate::domain::value::ValueMap;
use async_trait::async_trait;
use opendal::Operator;
use url::Url;
use uuid::Uuid;

/// Backing object-store kind this driver instance talks to. `impl_id`/
/// `pool_type` vary accordingly so `/proc/stack` (§4.8) distinguishes an
/// S3-backed pool from a WebHDFS-backed one even though both share this
/// same driver implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectStoreKind {
    S3,
    WebHdfs,
}

impl ObjectStoreKind {
    fn label(self) -> &'static str {
        match self {
            ObjectStoreKind::S3 => "S3",
            ObjectStoreKind::WebHdfs => "WebHDFS",
        }
    }

    fn pool_type(self) -> &'static str {
        match self {
            ObjectStoreKind::S3 => "s3",
            ObjectStoreKind::WebHdfs => "hadoop",
        }
    }
}

pub struct ObjectStorePoolDriver {
    kind: ObjectStoreKind,
    op: Operator,
    /// Used to build a `Chunk`'s `Url` for callers that need one; opendal
    /// itself only deals in relative object paths.
    public_base: Url,
    secret: Vec<u8>,
}

impl ObjectStorePoolDriver {
    pub fn new(kind: ObjectStoreKind, op: Operator, public_base: Url, secret: Vec<u8>) -> Self {
        ObjectStorePoolDriver { kind, op, public_base, secret }
    }

    fn public_url(&self, pfn: &str) -> Result<Url, PoolError> {
        self.public_base.join(pfn.trim_start_matches('/')).map_err(|e| PoolError::Io(IoError::Internal(e.to_string())))
    }
}

#[async_trait]
impl PoolDriver for ObjectStorePoolDriver {
    fn impl_id(&self) -> String {
        self.kind.label().to_owned()
    }

    fn pool_type(&self) -> String {
        self.kind.pool_type().to_owned()
    }

    async fn total_space(&self, pool: &Pool) -> Result<u64, PoolError> {
        Ok(pool.extra.get("capacity_bytes").and_then(|v| v.as_u64()).unwrap_or(u64::MAX))
    }

    async fn free_space(&self, pool: &Pool) -> Result<u64, PoolError> {
        // Object stores don't expose free-space quota through a generic
        // opendal operation; report configured capacity as an upper bound.
        self.total_space(pool).await
    }

    async fn is_available(&self, _pool: &Pool, _for_write: bool) -> Result<bool, PoolError> {
        Ok(self.op.check().await.is_ok())
    }

    async fn replica_is_available(&self, replica: &Replica) -> Result<bool, PoolError> {
        Ok(self.op.stat(&replica.pfn).await.is_ok())
    }

    async fn where_to_read(&self, _pool: &Pool, replica: &Replica, user_id: &str) -> Result<Location, PoolError> {
        let meta = self.op.stat(&replica.pfn).await.map_err(|e| PoolError::Io(IoError::BackendUnavailable(e.to_string())))?;
        let url = self.public_url(&replica.pfn)?;
        let extra = token::issue_token_extra(user_id, &replica.pfn, &self.secret, false, now_unix());
        Ok(Location::single(Chunk { url, offset: 0, size: meta.content_length(), extra }))
    }

    async fn where_to_write(&self, _pool: &Pool, lfn: &str, user_id: &str) -> Result<(Location, Replica), PoolError> {
        let pfn = format!("{}/{}", lfn.trim_start_matches('/'), Uuid::new_v4());
        let url = self.public_url(&pfn)?;
        let extra = token::issue_token_extra(user_id, &pfn, &self.secret, true, now_unix());
        let now = chrono::Utc::now();
        let replica = Replica {
            id: 0,
            file_id: 0,
            storage_kind: crate::domain::replica::StorageKind::Durable,
            status: crate::domain::replica::ReplicaStatus::BeingPopulated,
            server: self.kind.label().to_owned(),
            pfn,
            pool_name: String::new(),
            filesystem: None,
            access_count: 0,
            create_time: now,
            access_time: now,
            pin_time: None,
            life_time: None,
            extra: ValueMap::new(),
        };
        Ok((Location::single(Chunk { url, offset: 0, size: 0, extra }), replica))
    }

    async fn remove_replica(&self, _pool: &Pool, replica: &Replica) -> Result<(), PoolError> {
        self.op.delete(&replica.pfn).await.map_err(|e| PoolError::Io(IoError::BackendUnavailable(e.to_string())))
    }

    async fn cancel_write(&self, _pool: &Pool, location: &Location) -> Result<(), PoolError> {
        for chunk in location.chunks() {
            let path = chunk.url.path().trim_start_matches('/');
            let _ = self.op.delete(path).await;
        }
        Ok(())
    }

    async fn stat_pfn(&self, _pool: &Pool, pfn: &str) -> Result<u64, PoolError> {
        let meta = self.op.stat(pfn).await.map_err(|e| PoolError::Io(IoError::BackendUnavailable(e.to_string())))?;
        Ok(meta.content_length())
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

fn verify_token(extras: &ValueMap, pfn: &str, secret: &[u8], want_write: bool) -> Result<(), IoError> {
    let tok = extras.get("token").and_then(|v| v.as_str()).ok_or_else(|| IoError::Token(TokenError::Malformed("missing token".into())))?;
    let user_id = extras.get("user_id").and_then(|v| v.as_str()).unwrap_or("");
    token::validate_token(tok, user_id, pfn, secret, want_write, now_unix()).map_err(IoError::Token)
}

pub struct ObjectStoreIoDriver {
    kind: ObjectStoreKind,
    op: Operator,
    secret: Vec<u8>,
}

impl ObjectStoreIoDriver {
    pub fn new(kind: ObjectStoreKind, op: Operator, secret: Vec<u8>) -> Self {
        ObjectStoreIoDriver { kind, op, secret }
    }
}

#[async_trait]
impl IODriver for ObjectStoreIoDriver {
    fn impl_id(&self) -> String {
        format!("{}IO", self.kind.label())
    }

    async fn create_io_handler(
        &self,
        pfn: &str,
        flags: IoFlags,
        extras: ValueMap,
        _mode: u16,
    ) -> Result<Box<dyn IOHandler>, IoError> {
        if !flags.contains(IoFlags::INSECURE) {
            verify_token(&extras, pfn, &self.secret, flags.is_write())?;
        }
        // Object stores have no partial-write append primitive that every
        // opendal backend exposes uniformly; writes are buffered in memory
        // and flushed as one PUT on close, reads are fetched whole on first
        // access. Acceptable for the pfn sizes this middleware's catalog
        // metadata targets; streaming large objects would need a
        // backend-specific multipart path, out of scope here.
        if flags.is_write() {
            Ok(Box::new(ObjectWriteHandler { op: self.op.clone(), pfn: pfn.to_owned(), buffer: Vec::new(), closed: false }))
        } else {
            let data = self.op.read(pfn).await.map_err(|e| IoError::BackendUnavailable(e.to_string()))?;
            Ok(Box::new(ObjectReadHandler { data: data.to_vec(), cursor: 0 }))
        }
    }
}

struct ObjectReadHandler {
    data: Vec<u8>,
    cursor: usize,
}

#[async_trait]
impl IOHandler for ObjectReadHandler {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        let remaining = &self.data[self.cursor..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.cursor += n;
        Ok(n)
    }

    async fn write(&mut self, _buf: &[u8]) -> Result<usize, IoError> {
        Err(IoError::Internal("handler opened read-only".into()))
    }

    async fn pread(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, IoError> {
        self.cursor = offset as usize;
        self.read(buf).await
    }

    async fn pwrite(&mut self, _offset: u64, _buf: &[u8]) -> Result<usize, IoError> {
        Err(IoError::Internal("handler opened read-only".into()))
    }

    async fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, IoError> {
        let base = match whence {
            Whence::Start => 0i64,
            Whence::Current => self.cursor as i64,
            Whence::End => self.data.len() as i64,
        };
        let new_pos = (base + offset).clamp(0, self.data.len() as i64);
        self.cursor = new_pos as usize;
        Ok(self.cursor as u64)
    }

    async fn tell(&mut self) -> Result<u64, IoError> {
        Ok(self.cursor as u64)
    }

    async fn flush(&mut self) -> Result<(), IoError> {
        Ok(())
    }

    fn eof(&self) -> bool {
        self.cursor >= self.data.len()
    }

    async fn fstat(&mut self) -> Result<u64, IoError> {
        Ok(self.data.len() as u64)
    }

    async fn close(&mut self) -> Result<(), IoError> {
        Ok(())
    }
}

struct ObjectWriteHandler {
    op: Operator,
    pfn: String,
    buffer: Vec<u8>,
    closed: bool,
}

#[async_trait]
impl IOHandler for ObjectWriteHandler {
    async fn read(&mut self, _buf: &mut [u8]) -> Result<usize, IoError> {
        Err(IoError::Internal("handler opened write-only".into()))
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, IoError> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn pread(&mut self, _offset: u64, _buf: &mut [u8]) -> Result<usize, IoError> {
        Err(IoError::Internal("handler opened write-only".into()))
    }

    async fn pwrite(&mut self, offset: u64, buf: &[u8]) -> Result<usize, IoError> {
        let end = offset as usize + buf.len();
        if self.buffer.len() < end {
            self.buffer.resize(end, 0);
        }
        self.buffer[offset as usize..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    async fn seek(&mut self, _offset: i64, _whence: Whence) -> Result<u64, IoError> {
        Ok(self.buffer.len() as u64)
    }

    async fn tell(&mut self) -> Result<u64, IoError> {
        Ok(self.buffer.len() as u64)
    }

    async fn flush(&mut self) -> Result<(), IoError> {
        self.op.write(&self.pfn, self.buffer.clone()).await.map_err(|e| IoError::BackendUnavailable(e.to_string()))?;
        Ok(())
    }

    fn eof(&self) -> bool {
        false
    }

    async fn fstat(&mut self) -> Result<u64, IoError> {
        Ok(self.buffer.len() as u64)
    }

    async fn close(&mut self) -> Result<(), IoError> {
        if !self.closed {
            self.flush().await?;
            self.closed = true;
        }
        Ok(())
    }
}
