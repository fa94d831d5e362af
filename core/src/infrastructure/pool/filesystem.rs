//! Local-disk `PoolDriver`/`IODriver`: spec.md §1's "local POSIX
//! filesystem" backend.
//!
//! Grounded on `infrastructure/storage/local.rs`'s `LocalStorageProvider`
//! (base-path-relative resolution, `std::fs` directory walking for usage
//! accounting), generalized from whole-directory volumes to individual pfn
//! files, and using `tokio::fs` in place of `std::fs` since every other
//! backend in this crate is async. Directory enumeration for usage
//! accounting uses `walkdir`, a new dependency grounded on spec.md §4.5's
//! own naming of this backend's needs.

use crate::application::io::{IODriver, IOHandler, Whence};
use crate::application::pool::PoolDriver;
use crate::domain::errors::{IoError, PoolError, TokenError};
use crate::domain::location::{Chunk, IoFlags, Location};
use crate::domain::pool::Pool;
use crate::domain::replica::Replica;
use crate::domain::token;
use crate::domain::value::ValueMap;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use url::Url;
use uuid::Uuid;

pub struct FilesystemPoolDriver {
    root: PathBuf,
    secret: Vec<u8>,
}

impl FilesystemPoolDriver {
    pub fn new(root: impl Into<PathBuf>, secret: Vec<u8>) -> Self {
        FilesystemPoolDriver { root: root.into(), secret }
    }

    fn resolve(&self, pfn: &str) -> PathBuf {
        self.root.join(pfn.trim_start_matches('/'))
    }

    fn walk_size(dir: &Path) -> u64 {
        walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum()
    }
}

#[async_trait]
impl PoolDriver for FilesystemPoolDriver {
    fn impl_id(&self) -> String {
        "Filesystem".to_owned()
    }

    fn pool_type(&self) -> String {
        "filesystem".to_owned()
    }

    async fn total_space(&self, pool: &Pool) -> Result<u64, PoolError> {
        // No portable statvfs-equivalent in this crate's dependency set;
        // the configured capacity is authoritative (§SUPPLEMENTED 2).
        Ok(pool.extra.get("capacity_bytes").and_then(|v| v.as_u64()).unwrap_or(u64::MAX))
    }

    async fn free_space(&self, pool: &Pool) -> Result<u64, PoolError> {
        let total = self.total_space(pool).await?;
        let used = Self::walk_size(&self.root);
        Ok(total.saturating_sub(used))
    }

    async fn is_available(&self, _pool: &Pool, for_write: bool) -> Result<bool, PoolError> {
        if !self.root.exists() {
            return Ok(false);
        }
        if for_write {
            let probe = self.root.join(format!(".meridian-probe-{}", Uuid::new_v4()));
            let ok = tokio::fs::write(&probe, b"probe").await.is_ok();
            let _ = tokio::fs::remove_file(&probe).await;
            Ok(ok)
        } else {
            Ok(true)
        }
    }

    async fn replica_is_available(&self, replica: &Replica) -> Result<bool, PoolError> {
        Ok(self.resolve(&replica.pfn).exists())
    }

    async fn where_to_read(&self, _pool: &Pool, replica: &Replica, user_id: &str) -> Result<Location, PoolError> {
        let path = self.resolve(&replica.pfn);
        let meta = tokio::fs::metadata(&path).await.map_err(|e| PoolError::Io(IoError::Std(e)))?;
        let url = Url::from_file_path(&path).map_err(|_| PoolError::Io(IoError::Internal(format!("unrepresentable path {}", path.display()))))?;
        let extra = token::issue_token_extra(user_id, &replica.pfn, &self.secret, false, now_unix());
        Ok(Location::single(Chunk { url, offset: 0, size: meta.len(), extra }))
    }

    async fn where_to_write(&self, _pool: &Pool, lfn: &str, user_id: &str) -> Result<(Location, Replica), PoolError> {
        let pfn = format!("/{}/{}", lfn.trim_start_matches('/'), Uuid::new_v4());
        let path = self.resolve(&pfn);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| PoolError::Io(IoError::Std(e)))?;
        }
        let url = Url::from_file_path(&path).map_err(|_| PoolError::Io(IoError::Internal(format!("unrepresentable path {}", path.display()))))?;
        let extra = token::issue_token_extra(user_id, &pfn, &self.secret, true, now_unix());
        let now = chrono::Utc::now();
        let replica = Replica {
            id: 0,
            file_id: 0,
            storage_kind: crate::domain::replica::StorageKind::Durable,
            status: crate::domain::replica::ReplicaStatus::BeingPopulated,
            server: "localhost".into(),
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
        let path = self.resolve(&replica.pfn);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PoolError::Io(IoError::Std(e))),
        }
    }

    async fn cancel_write(&self, _pool: &Pool, location: &Location) -> Result<(), PoolError> {
        for chunk in location.chunks() {
            if let Ok(path) = chunk.url.to_file_path() {
                let _ = tokio::fs::remove_file(path).await;
            }
        }
        Ok(())
    }

    async fn stat_pfn(&self, _pool: &Pool, pfn: &str) -> Result<u64, PoolError> {
        let meta = tokio::fs::metadata(self.resolve(pfn)).await.map_err(|e| PoolError::Io(IoError::Std(e)))?;
        Ok(meta.len())
    }
}

/// Verifies `extras["token"]`/`extras["user_id"]` against `secret` unless
/// `flags` carries `IoFlags::INSECURE` (disk-to-disk tunnelling,
/// §SUPPLEMENTED 4/5).
pub struct FilesystemIoDriver {
    root: PathBuf,
    secret: Vec<u8>,
}

impl FilesystemIoDriver {
    pub fn new(root: impl Into<PathBuf>, secret: Vec<u8>) -> Self {
        FilesystemIoDriver { root: root.into(), secret }
    }

    fn resolve(&self, pfn: &str) -> PathBuf {
        self.root.join(pfn.trim_start_matches('/'))
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

#[async_trait]
impl IODriver for FilesystemIoDriver {
    fn impl_id(&self) -> String {
        "FilesystemIO".to_owned()
    }

    async fn create_io_handler(
        &self,
        pfn: &str,
        flags: IoFlags,
        extras: ValueMap,
        mode: u16,
    ) -> Result<Box<dyn IOHandler>, IoError> {
        if !flags.contains(IoFlags::INSECURE) {
            verify_token(&extras, pfn, &self.secret, flags.is_write())?;
        }
        let path = self.resolve(pfn);
        let mut options = tokio::fs::OpenOptions::new();
        options.read(flags.contains(IoFlags::READ));
        if flags.is_write() {
            options.write(true).create(true).mode_if_unix(mode);
        }
        let file = options.open(&path).await.map_err(IoError::Std)?;
        Ok(Box::new(FileIoHandler { file, eof: false }))
    }
}

/// Extension trait so `set_mode` reads naturally on Unix while staying a
/// no-op elsewhere; mirrors `std::os::unix::fs::OpenOptionsExt::mode`.
trait OpenOptionsModeExt {
    fn mode_if_unix(&mut self, mode: u16) -> &mut Self;
}

impl OpenOptionsModeExt for tokio::fs::OpenOptions {
    #[cfg(unix)]
    fn mode_if_unix(&mut self, mode: u16) -> &mut Self {
        use std::os::unix::fs::OpenOptionsExt;
        self.mode(mode as u32)
    }

    #[cfg(not(unix))]
    fn mode_if_unix(&mut self, _mode: u16) -> &mut Self {
        self
    }
}

struct FileIoHandler {
    file: File,
    eof: bool,
}

#[async_trait]
impl IOHandler for FileIoHandler {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        let n = self.file.read(buf).await.map_err(IoError::Std)?;
        self.eof = n < buf.len();
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, IoError> {
        self.file.write(buf).await.map_err(IoError::Std)
    }

    async fn pread(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, IoError> {
        self.file.seek(std::io::SeekFrom::Start(offset)).await.map_err(IoError::Std)?;
        self.read(buf).await
    }

    async fn pwrite(&mut self, offset: u64, buf: &[u8]) -> Result<usize, IoError> {
        self.file.seek(std::io::SeekFrom::Start(offset)).await.map_err(IoError::Std)?;
        self.write(buf).await
    }

    async fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, IoError> {
        let from = match whence {
            Whence::Start => std::io::SeekFrom::Start(offset as u64),
            Whence::Current => std::io::SeekFrom::Current(offset),
            Whence::End => std::io::SeekFrom::End(offset),
        };
        self.file.seek(from).await.map_err(IoError::Std)
    }

    async fn tell(&mut self) -> Result<u64, IoError> {
        self.file.stream_position().await.map_err(IoError::Std)
    }

    async fn flush(&mut self) -> Result<(), IoError> {
        self.file.flush().await.map_err(IoError::Std)
    }

    fn eof(&self) -> bool {
        self.eof
    }

    async fn fstat(&mut self) -> Result<u64, IoError> {
        Ok(self.file.metadata().await.map_err(IoError::Std)?.len())
    }

    async fn close(&mut self) -> Result<(), IoError> {
        self.file.flush().await.map_err(IoError::Std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let secret = b"s3cr3t".to_vec();
        let driver = FilesystemPoolDriver::new(dir.path(), secret.clone());
        let pool = Pool::new("fs1", crate::domain::pool::PoolType::filesystem());
        let (_loc, mut replica) = driver.where_to_write(&pool, "my/file.dat", "alice").await.unwrap();
        replica.id = 1;

        let io = FilesystemIoDriver::new(dir.path(), secret.clone());
        let tok = token::generate_token("alice", &replica.pfn, &secret, 60, true, 0);
        let mut extras = ValueMap::new();
        extras.insert("token".into(), crate::domain::value::Value::Str(tok));
        extras.insert("user_id".into(), crate::domain::value::Value::Str("alice".into()));
        let mut handler = io.create_io_handler(&replica.pfn, IoFlags::WRITE, extras, 0o644).await.unwrap();
        handler.write(b"hello").await.unwrap();
        handler.close().await.unwrap();

        assert!(driver.replica_is_available(&replica).await.unwrap());
        let size = driver.stat_pfn(&pool, &replica.pfn).await.unwrap();
        assert_eq!(size, 5);
    }

    #[tokio::test]
    async fn where_to_write_issues_a_token_create_io_handler_accepts() {
        let dir = TempDir::new().unwrap();
        let secret = b"s3cr3t".to_vec();
        let driver = FilesystemPoolDriver::new(dir.path(), secret.clone());
        let pool = Pool::new("fs1", crate::domain::pool::PoolType::filesystem());
        let (location, replica) = driver.where_to_write(&pool, "my/file.dat", "alice").await.unwrap();
        let extras = location.chunks()[0].extra.clone();
        assert_eq!(extras.get("user_id").and_then(|v| v.as_str()), Some("alice"));

        let io = FilesystemIoDriver::new(dir.path(), secret);
        let mut handler = io.create_io_handler(&replica.pfn, IoFlags::WRITE, extras, 0o644).await.unwrap();
        handler.write(b"hello").await.unwrap();
        handler.close().await.unwrap();

        let size = driver.stat_pfn(&pool, &replica.pfn).await.unwrap();
        assert_eq!(size, 5);
    }

    #[tokio::test]
    async fn where_to_read_issues_a_read_only_token() {
        let dir = TempDir::new().unwrap();
        let secret = b"s3cr3t".to_vec();
        let driver = FilesystemPoolDriver::new(dir.path(), secret.clone());
        let pool = Pool::new("fs1", crate::domain::pool::PoolType::filesystem());
        let (_loc, replica) = driver.where_to_write(&pool, "my/file.dat", "alice").await.unwrap();
        tokio::fs::write(dir.path().join(replica.pfn.trim_start_matches('/')), b"hello").await.unwrap();

        let location = driver.where_to_read(&pool, &replica, "alice").await.unwrap();
        let extras = &location.chunks()[0].extra;
        let tok = extras.get("token").and_then(|v| v.as_str()).unwrap();
        assert!(token::validate_token(tok, "alice", &replica.pfn, &secret, true, 0).is_err());
        assert!(token::validate_token(tok, "alice", &replica.pfn, &secret, false, 0).is_ok());
    }

    #[tokio::test]
    async fn insecure_flag_bypasses_token_check() {
        let dir = TempDir::new().unwrap();
        let io = FilesystemIoDriver::new(dir.path(), b"secret".to_vec());
        let result = io.create_io_handler("/f.dat", IoFlags::WRITE | IoFlags::INSECURE, ValueMap::new(), 0o644).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn missing_token_rejected_when_not_insecure() {
        let dir = TempDir::new().unwrap();
        let io = FilesystemIoDriver::new(dir.path(), b"secret".to_vec());
        let result = io.create_io_handler("/f.dat", IoFlags::WRITE, ValueMap::new(), 0o644).await;
        assert!(result.is_err());
    }
}
