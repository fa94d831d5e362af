//! `IODriver`/`IOHandler`: open/read/write/seek on a pfn, with token
//! verification (§4.5).
//!
//! Grounded on the teacher's `domain/fsal.rs` `open`/`read`/`write`/`close`
//! method shape, generalized from volume-relative handles to standalone
//! pfn-addressed I/O.

use crate::domain::errors::IoError;
use crate::domain::location::IoFlags;
use crate::domain::value::ValueMap;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

#[async_trait]
pub trait IODriver: Send + Sync {
    fn impl_id(&self) -> String;

    /// Unless `flags` contains `IoFlags::INSECURE`, verifies
    /// `extras["token"]` against the caller's userId (or the tunnelling
    /// subject), the pfn, and the write bit inferred from `flags`, before
    /// opening (§4.5, §SUPPLEMENTED 4/5).
    async fn create_io_handler(
        &self,
        pfn: &str,
        flags: IoFlags,
        extras: ValueMap,
        mode: u16,
    ) -> Result<Box<dyn IOHandler>, IoError>;
}

#[async_trait]
pub trait IOHandler: Send + Sync {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, IoError>;
    async fn write(&mut self, buf: &[u8]) -> Result<usize, IoError>;
    async fn readv(&mut self, bufs: &mut [&mut [u8]]) -> Result<usize, IoError> {
        let mut total = 0;
        for buf in bufs.iter_mut() {
            let n = self.read(buf).await?;
            total += n;
            if n < buf.len() {
                break;
            }
        }
        Ok(total)
    }
    async fn writev(&mut self, bufs: &[&[u8]]) -> Result<usize, IoError> {
        let mut total = 0;
        for buf in bufs {
            total += self.write(buf).await?;
        }
        Ok(total)
    }
    async fn pread(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, IoError>;
    async fn pwrite(&mut self, offset: u64, buf: &[u8]) -> Result<usize, IoError>;
    async fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, IoError>;
    async fn tell(&mut self) -> Result<u64, IoError>;
    async fn flush(&mut self) -> Result<(), IoError>;
    fn eof(&self) -> bool;
    async fn fstat(&mut self) -> Result<u64, IoError>;
    async fn close(&mut self) -> Result<(), IoError>;
}
