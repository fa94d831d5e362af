//! Remote-HTTP `PoolDriver`/`IODriver`: spec.md §1's "remote HTTP" backend.
//!
//! Grounded on `infrastructure/agentskills_client.rs`'s `reqwest::Client`
//! usage pattern (one shared client, `.get()`/`.put()` builders, status-code
//! checked with `.error_for_status()`).

use crate::application::io::{IODriver, IOHandler, Whence};
use crate::application::pool::PoolDriver;
use crate::domain::errors::{IoError, PoolError, TokenError};
use crate::domain::location::{Chunk, IoFlags, Location};
use crate::domain::pool::Pool;
use crate::domain::replica::Replica;
use crate::domain::token;
use crate::domain::value::ValueMap;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;
use uuid::Uuid;

pub struct HttpPoolDriver {
    client: Client,
    base_url: Url,
    secret: Vec<u8>,
}

impl HttpPoolDriver {
    pub fn new(client: Client, base_url: Url, secret: Vec<u8>) -> Self {
        HttpPoolDriver { client, base_url, secret }
    }

    fn object_url(&self, pfn: &str) -> Result<Url, PoolError> {
        self.base_url.join(pfn.trim_start_matches('/')).map_err(|e| PoolError::Io(IoError::Internal(e.to_string())))
    }
}

#[async_trait]
impl PoolDriver for HttpPoolDriver {
    fn impl_id(&self) -> String {
        "Http".to_owned()
    }

    fn pool_type(&self) -> String {
        "http".to_owned()
    }

    async fn total_space(&self, pool: &Pool) -> Result<u64, PoolError> {
        Ok(pool.extra.get("capacity_bytes").and_then(|v| v.as_u64()).unwrap_or(u64::MAX))
    }

    async fn free_space(&self, pool: &Pool) -> Result<u64, PoolError> {
        self.total_space(pool).await
    }

    async fn is_available(&self, _pool: &Pool, _for_write: bool) -> Result<bool, PoolError> {
        let resp = self.client.head(self.base_url.clone()).send().await;
        Ok(resp.is_ok())
    }

    async fn replica_is_available(&self, replica: &Replica) -> Result<bool, PoolError> {
        let url = self.object_url(&replica.pfn)?;
        match self.client.head(url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn where_to_read(&self, _pool: &Pool, replica: &Replica, user_id: &str) -> Result<Location, PoolError> {
        let url = self.object_url(&replica.pfn)?;
        let resp = self.client.head(url.clone()).send().await.map_err(|e| PoolError::Io(IoError::BackendUnavailable(e.to_string())))?;
        let size = resp.content_length().unwrap_or(0);
        let extra = token::issue_token_extra(user_id, &replica.pfn, &self.secret, false, now_unix());
        Ok(Location::single(Chunk { url, offset: 0, size, extra }))
    }

    async fn where_to_write(&self, _pool: &Pool, lfn: &str, user_id: &str) -> Result<(Location, Replica), PoolError> {
        let pfn = format!("{}/{}", lfn.trim_start_matches('/'), Uuid::new_v4());
        let url = self.object_url(&pfn)?;
        let extra = token::issue_token_extra(user_id, &pfn, &self.secret, true, now_unix());
        let now = chrono::Utc::now();
        let replica = Replica {
            id: 0,
            file_id: 0,
            storage_kind: crate::domain::replica::StorageKind::Volatile,
            status: crate::domain::replica::ReplicaStatus::BeingPopulated,
            server: self.base_url.host_str().unwrap_or("http").to_owned(),
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
        let url = self.object_url(&replica.pfn)?;
        self.client.delete(url).send().await.map_err(|e| PoolError::Io(IoError::BackendUnavailable(e.to_string())))?;
        Ok(())
    }

    async fn cancel_write(&self, _pool: &Pool, location: &Location) -> Result<(), PoolError> {
        for chunk in location.chunks() {
            let _ = self.client.delete(chunk.url.clone()).send().await;
        }
        Ok(())
    }

    async fn stat_pfn(&self, _pool: &Pool, pfn: &str) -> Result<u64, PoolError> {
        let url = self.object_url(pfn)?;
        let resp = self.client.head(url).send().await.map_err(|e| PoolError::Io(IoError::BackendUnavailable(e.to_string())))?;
        Ok(resp.content_length().unwrap_or(0))
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

pub struct HttpIoDriver {
    client: Client,
    base_url: Url,
    secret: Vec<u8>,
}

impl HttpIoDriver {
    pub fn new(client: Client, base_url: Url, secret: Vec<u8>) -> Self {
        HttpIoDriver { client, base_url, secret }
    }
}

#[async_trait]
impl IODriver for HttpIoDriver {
    fn impl_id(&self) -> String {
        "HttpIO".to_owned()
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
        let url = self.base_url.join(pfn.trim_start_matches('/')).map_err(|e| IoError::Internal(e.to_string()))?;
        if flags.is_write() {
            Ok(Box::new(HttpWriteHandler { client: self.client.clone(), url, buffer: Vec::new(), closed: false }))
        } else {
            let resp = self.client.get(url).send().await.map_err(|e| IoError::BackendUnavailable(e.to_string()))?;
            let bytes = resp.bytes().await.map_err(|e| IoError::BackendUnavailable(e.to_string()))?;
            Ok(Box::new(HttpReadHandler { data: bytes.to_vec(), cursor: 0 }))
        }
    }
}

struct HttpReadHandler {
    data: Vec<u8>,
    cursor: usize,
}

#[async_trait]
impl IOHandler for HttpReadHandler {
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
        self.cursor = (base + offset).clamp(0, self.data.len() as i64) as usize;
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

struct HttpWriteHandler {
    client: Client,
    url: Url,
    buffer: Vec<u8>,
    closed: bool,
}

#[async_trait]
impl IOHandler for HttpWriteHandler {
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
        self.client
            .put(self.url.clone())
            .body(self.buffer.clone())
            .send()
            .await
            .map_err(|e| IoError::BackendUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| IoError::BackendUnavailable(e.to_string()))?;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_handler_serves_buffered_bytes() {
        let mut h = HttpReadHandler { data: b"hello world".to_vec(), cursor: 0 };
        let mut buf = [0u8; 5];
        let n = h.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert!(!h.eof());
    }
}
