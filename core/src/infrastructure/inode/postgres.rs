//! Postgres-backed `InodeStore`.
//!
//! Grounded directly on
//! `infrastructure/repositories/postgres_volume.rs`: `sqlx::query` with
//! positional binds, `ON CONFLICT (id) DO UPDATE` for upserts, JSONB columns
//! for nested structs (`acl`, `checksum`, `xattrs`), and a free
//! `parse_*_row` function converting a `PgRow` back into the domain type.

use crate::application::inode_store::{InodeStore, InodeTransaction};
use crate::domain::acl::Acl;
use crate::domain::dirent::{DirEntry, DirEntryX};
use crate::domain::errors::CatalogError;
use crate::domain::identity::{Gid, Uid};
use crate::domain::inode::{Checksum, FileStatus, FileType, INode, InodeId};
use crate::domain::replica::{Replica, ReplicaId, ReplicaStatus, StorageKind};
use crate::domain::value::ValueMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

pub struct PostgresInodeStore {
    pool: PgPool,
}

impl PostgresInodeStore {
    pub fn new(pool: PgPool) -> Self {
        PostgresInodeStore { pool }
    }

    /// DDL for the two tables this store uses. Exposed so the `cli`'s
    /// `config validate`/migration entry point (or an external migration
    /// tool) can apply it; not run automatically.
    pub const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS inodes (
            id BIGSERIAL PRIMARY KEY,
            parent_id BIGINT,
            name TEXT NOT NULL,
            file_type TEXT NOT NULL,
            mode INTEGER NOT NULL,
            uid INTEGER NOT NULL,
            gid INTEGER NOT NULL,
            size BIGINT NOT NULL,
            nlink INTEGER NOT NULL,
            status TEXT NOT NULL,
            ctime TIMESTAMPTZ NOT NULL,
            mtime TIMESTAMPTZ NOT NULL,
            atime TIMESTAMPTZ NOT NULL,
            guid UUID NOT NULL,
            checksum JSONB,
            acl JSONB NOT NULL,
            comment TEXT,
            xattrs JSONB NOT NULL,
            symlink_target TEXT,
            UNIQUE (parent_id, name)
        );
        CREATE TABLE IF NOT EXISTS replicas (
            id BIGSERIAL PRIMARY KEY,
            file_id BIGINT NOT NULL REFERENCES inodes(id) ON DELETE CASCADE,
            storage_kind TEXT NOT NULL,
            status TEXT NOT NULL,
            server TEXT NOT NULL,
            pfn TEXT NOT NULL,
            pool_name TEXT NOT NULL,
            filesystem TEXT,
            access_count BIGINT NOT NULL,
            create_time TIMESTAMPTZ NOT NULL,
            access_time TIMESTAMPTZ NOT NULL,
            pin_time TIMESTAMPTZ,
            life_time TIMESTAMPTZ,
            extra JSONB NOT NULL
        );
    "#;
}

struct PostgresTransaction(Option<sqlx::Transaction<'static, sqlx::Postgres>>);

#[async_trait]
impl InodeTransaction for PostgresTransaction {
    async fn commit(mut self: Box<Self>) -> Result<(), CatalogError> {
        let tx = self.0.take().ok_or_else(|| CatalogError::InvalidArgument("transaction already finished".into()))?;
        tx.commit().await.map_err(|e| CatalogError::Backend(crate::domain::errors::IoError::Internal(e.to_string())))
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), CatalogError> {
        let tx = self.0.take().ok_or_else(|| CatalogError::InvalidArgument("transaction already finished".into()))?;
        tx.rollback().await.map_err(|e| CatalogError::Backend(crate::domain::errors::IoError::Internal(e.to_string())))
    }
}

fn db_err(e: sqlx::Error) -> CatalogError {
    CatalogError::Backend(crate::domain::errors::IoError::Internal(e.to_string()))
}

fn file_type_str(ft: FileType) -> &'static str {
    match ft {
        FileType::Regular => "regular",
        FileType::Directory => "directory",
        FileType::Symlink => "symlink",
    }
}

fn file_type_from_str(s: &str) -> FileType {
    match s {
        "directory" => FileType::Directory,
        "symlink" => FileType::Symlink,
        _ => FileType::Regular,
    }
}

fn status_str(s: FileStatus) -> &'static str {
    match s {
        FileStatus::Online => "online",
        FileStatus::Migrated => "migrated",
        FileStatus::BeingPopulated => "being_populated",
    }
}

fn status_from_str(s: &str) -> FileStatus {
    match s {
        "migrated" => FileStatus::Migrated,
        "being_populated" => FileStatus::BeingPopulated,
        _ => FileStatus::Online,
    }
}

fn parse_inode_row(row: &PgRow) -> Result<INode, CatalogError> {
    let checksum_val: Option<serde_json::Value> = row.get("checksum");
    let acl_val: serde_json::Value = row.get("acl");
    let xattrs_val: serde_json::Value = row.get("xattrs");
    Ok(INode {
        id: row.get("id"),
        parent_id: row.get("parent_id"),
        name: row.get("name"),
        file_type: file_type_from_str(row.get::<String, _>("file_type").as_str()),
        mode: row.get::<i32, _>("mode") as u16,
        uid: row.get::<i32, _>("uid") as Uid,
        gid: row.get::<i32, _>("gid") as Gid,
        size: row.get::<i64, _>("size") as u64,
        nlink: row.get::<i32, _>("nlink") as u32,
        status: status_from_str(row.get::<String, _>("status").as_str()),
        ctime: row.get("ctime"),
        mtime: row.get("mtime"),
        atime: row.get("atime"),
        guid: row.get("guid"),
        checksum: checksum_val.map(|v| serde_json::from_value(v)).transpose().map_err(|e| CatalogError::InvalidArgument(e.to_string()))?,
        acl: serde_json::from_value::<Vec<_>>(acl_val).map(Acl).map_err(|e| CatalogError::InvalidAcl(e.to_string()))?,
        comment: row.get("comment"),
        xattrs: serde_json::from_value(xattrs_val).map_err(|e| CatalogError::InvalidArgument(e.to_string()))?,
    })
}

fn parse_replica_row(row: &PgRow) -> Result<Replica, CatalogError> {
    let extra_val: serde_json::Value = row.get("extra");
    let storage_kind = match row.get::<String, _>("storage_kind").as_str() {
        "volatile" => StorageKind::Volatile,
        "permanent" => StorageKind::Permanent,
        _ => StorageKind::Durable,
    };
    let status = match row.get::<String, _>("status").as_str() {
        "being_populated" => ReplicaStatus::BeingPopulated,
        "being_deleted" => ReplicaStatus::BeingDeleted,
        _ => ReplicaStatus::Available,
    };
    Ok(Replica {
        id: row.get("id"),
        file_id: row.get("file_id"),
        storage_kind,
        status,
        server: row.get("server"),
        pfn: row.get("pfn"),
        pool_name: row.get("pool_name"),
        filesystem: row.get("filesystem"),
        access_count: row.get::<i64, _>("access_count") as u64,
        create_time: row.get("create_time"),
        access_time: row.get("access_time"),
        pin_time: row.get("pin_time"),
        life_time: row.get("life_time"),
        extra: serde_json::from_value(extra_val).map_err(|e| CatalogError::InvalidArgument(e.to_string()))?,
    })
}

#[async_trait]
impl InodeStore for PostgresInodeStore {
    async fn begin(&self) -> Result<Box<dyn InodeTransaction>, CatalogError> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(PostgresTransaction(Some(tx))))
    }

    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        parent: InodeId,
        name: &str,
        uid: Uid,
        gid: Gid,
        mode: u16,
        size: u64,
        file_type: FileType,
        status: FileStatus,
        checksum: Option<Checksum>,
        acl: Acl,
    ) -> Result<INode, CatalogError> {
        let now = Utc::now();
        let checksum_json = checksum.map(|c| serde_json::to_value(c)).transpose().map_err(|e| CatalogError::InvalidArgument(e.to_string()))?;
        let acl_json = serde_json::to_value(&acl.0).map_err(|e| CatalogError::InvalidAcl(e.to_string()))?;
        let xattrs_json = serde_json::to_value(ValueMap::new()).map_err(|e| CatalogError::InvalidArgument(e.to_string()))?;
        let row = sqlx::query(
            r#"
            INSERT INTO inodes (
                parent_id, name, file_type, mode, uid, gid, size, nlink, status,
                ctime, mtime, atime, guid, checksum, acl, comment, xattrs
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1, $8, $9, $9, $9, $10, $11, $12, NULL, $13)
            RETURNING *
            "#,
        )
        .bind(parent)
        .bind(name)
        .bind(file_type_str(file_type))
        .bind(mode as i32)
        .bind(uid as i32)
        .bind(gid as i32)
        .bind(size as i64)
        .bind(status_str(status))
        .bind(now)
        .bind(Uuid::new_v4())
        .bind(checksum_json)
        .bind(acl_json)
        .bind(xattrs_json)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref dbe) if dbe.constraint().is_some() => CatalogError::FileExists(name.to_owned()),
            other => db_err(other),
        })?;
        parse_inode_row(&row)
    }

    async fn symlink(&self, inode: InodeId, target: &str) -> Result<(), CatalogError> {
        sqlx::query("UPDATE inodes SET symlink_target = $1 WHERE id = $2")
            .bind(target)
            .bind(inode)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn unlink(&self, inode: InodeId) -> Result<(), CatalogError> {
        let result = sqlx::query("DELETE FROM inodes WHERE id = $1").bind(inode).execute(&self.pool).await.map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::NoSuchFile(format!("inode {inode}")));
        }
        Ok(())
    }

    async fn move_inode(&self, inode: InodeId, new_parent: InodeId) -> Result<(), CatalogError> {
        sqlx::query("UPDATE inodes SET parent_id = $1 WHERE id = $2").bind(new_parent).bind(inode).execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn rename_inode(&self, inode: InodeId, new_name: &str) -> Result<(), CatalogError> {
        sqlx::query("UPDATE inodes SET name = $1 WHERE id = $2").bind(new_name).bind(inode).execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn stat(&self, inode: InodeId) -> Result<INode, CatalogError> {
        let row = sqlx::query("SELECT * FROM inodes WHERE id = $1")
            .bind(inode)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))?;
        parse_inode_row(&row)
    }

    async fn stat_by_name(&self, parent: InodeId, name: &str) -> Result<INode, CatalogError> {
        let row = sqlx::query("SELECT * FROM inodes WHERE parent_id = $1 AND name = $2")
            .bind(parent)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| CatalogError::NoSuchFile(name.to_owned()))?;
        parse_inode_row(&row)
    }

    async fn stat_by_guid(&self, guid: Uuid) -> Result<INode, CatalogError> {
        let row = sqlx::query("SELECT * FROM inodes WHERE guid = $1")
            .bind(guid)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| CatalogError::NoSuchFile(format!("guid {guid}")))?;
        parse_inode_row(&row)
    }

    async fn read_link(&self, inode: InodeId) -> Result<String, CatalogError> {
        let row = sqlx::query("SELECT symlink_target FROM inodes WHERE id = $1")
            .bind(inode)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))?;
        row.get::<Option<String>, _>("symlink_target").ok_or_else(|| CatalogError::InvalidArgument(format!("inode {inode} is not a symlink")))
    }

    async fn add_replica(&self, replica: Replica) -> Result<Replica, CatalogError> {
        let extra_json = serde_json::to_value(&replica.extra).map_err(|e| CatalogError::InvalidArgument(e.to_string()))?;
        let storage_kind = match replica.storage_kind {
            StorageKind::Volatile => "volatile",
            StorageKind::Durable => "durable",
            StorageKind::Permanent => "permanent",
        };
        let status = match replica.status {
            ReplicaStatus::Available => "available",
            ReplicaStatus::BeingPopulated => "being_populated",
            ReplicaStatus::BeingDeleted => "being_deleted",
        };
        let row = sqlx::query(
            r#"
            INSERT INTO replicas (
                file_id, storage_kind, status, server, pfn, pool_name, filesystem,
                access_count, create_time, access_time, pin_time, life_time, extra
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(replica.file_id)
        .bind(storage_kind)
        .bind(status)
        .bind(&replica.server)
        .bind(&replica.pfn)
        .bind(&replica.pool_name)
        .bind(&replica.filesystem)
        .bind(replica.access_count as i64)
        .bind(replica.create_time)
        .bind(replica.pin_time)
        .bind(replica.life_time)
        .bind(extra_json)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        parse_replica_row(&row)
    }

    async fn update_replica(&self, replica: Replica) -> Result<(), CatalogError> {
        let extra_json = serde_json::to_value(&replica.extra).map_err(|e| CatalogError::InvalidArgument(e.to_string()))?;
        let result = sqlx::query(
            r#"
            UPDATE replicas SET status = $1, access_count = $2, access_time = $3,
                pin_time = $4, life_time = $5, extra = $6
            WHERE id = $7
            "#,
        )
        .bind(match replica.status {
            ReplicaStatus::Available => "available",
            ReplicaStatus::BeingPopulated => "being_populated",
            ReplicaStatus::BeingDeleted => "being_deleted",
        })
        .bind(replica.access_count as i64)
        .bind(replica.access_time)
        .bind(replica.pin_time)
        .bind(replica.life_time)
        .bind(extra_json)
        .bind(replica.id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::NoSuchFile(format!("replica {}", replica.id)));
        }
        Ok(())
    }

    async fn delete_replica(&self, id: ReplicaId) -> Result<(), CatalogError> {
        let result = sqlx::query("DELETE FROM replicas WHERE id = $1").bind(id).execute(&self.pool).await.map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::NoSuchFile(format!("replica {id}")));
        }
        Ok(())
    }

    async fn get_replicas(&self, file_id: InodeId) -> Result<Vec<Replica>, CatalogError> {
        let rows = sqlx::query("SELECT * FROM replicas WHERE file_id = $1").bind(file_id).fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter().map(parse_replica_row).collect()
    }

    async fn utime(&self, inode: InodeId, atime: DateTime<Utc>, mtime: DateTime<Utc>) -> Result<(), CatalogError> {
        sqlx::query("UPDATE inodes SET atime = $1, mtime = $2 WHERE id = $3").bind(atime).bind(mtime).bind(inode).execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn set_mode(&self, inode: InodeId, mode: u16) -> Result<(), CatalogError> {
        sqlx::query("UPDATE inodes SET mode = $1 WHERE id = $2").bind(mode as i32).bind(inode).execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn set_owner(&self, inode: InodeId, uid: Uid, gid: Gid) -> Result<(), CatalogError> {
        sqlx::query("UPDATE inodes SET uid = $1, gid = $2 WHERE id = $3").bind(uid as i32).bind(gid as i32).bind(inode).execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn set_size(&self, inode: InodeId, size: u64) -> Result<(), CatalogError> {
        sqlx::query("UPDATE inodes SET size = $1 WHERE id = $2").bind(size as i64).bind(inode).execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn set_checksum(&self, inode: InodeId, checksum: Checksum) -> Result<(), CatalogError> {
        let json = serde_json::to_value(checksum).map_err(|e| CatalogError::InvalidArgument(e.to_string()))?;
        sqlx::query("UPDATE inodes SET checksum = $1 WHERE id = $2").bind(json).bind(inode).execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn set_acl(&self, inode: InodeId, acl: Acl) -> Result<(), CatalogError> {
        let json = serde_json::to_value(&acl.0).map_err(|e| CatalogError::InvalidAcl(e.to_string()))?;
        sqlx::query("UPDATE inodes SET acl = $1 WHERE id = $2").bind(json).bind(inode).execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn set_guid(&self, inode: InodeId, guid: Uuid) -> Result<(), CatalogError> {
        sqlx::query("UPDATE inodes SET guid = $1 WHERE id = $2").bind(guid).bind(inode).execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn set_comment(&self, inode: InodeId, comment: Option<String>) -> Result<(), CatalogError> {
        sqlx::query("UPDATE inodes SET comment = $1 WHERE id = $2").bind(comment).bind(inode).execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn get_comment(&self, inode: InodeId) -> Result<Option<String>, CatalogError> {
        let row = sqlx::query("SELECT comment FROM inodes WHERE id = $1")
            .bind(inode)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))?;
        Ok(row.get("comment"))
    }

    async fn update_xattrs(&self, inode: InodeId, attrs: ValueMap) -> Result<(), CatalogError> {
        let row = sqlx::query("SELECT xattrs FROM inodes WHERE id = $1")
            .bind(inode)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| CatalogError::NoSuchFile(format!("inode {inode}")))?;
        let existing: serde_json::Value = row.get("xattrs");
        let mut map: ValueMap = serde_json::from_value(existing).map_err(|e| CatalogError::InvalidArgument(e.to_string()))?;
        map.extend(attrs);
        let json = serde_json::to_value(&map).map_err(|e| CatalogError::InvalidArgument(e.to_string()))?;
        sqlx::query("UPDATE inodes SET xattrs = $1 WHERE id = $2").bind(json).bind(inode).execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn open_dir(&self, inode: InodeId) -> Result<Vec<DirEntryX>, CatalogError> {
        let rows = sqlx::query("SELECT * FROM inodes WHERE parent_id = $1 ORDER BY name").bind(inode).fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter()
            .map(|row| parse_inode_row(row).map(|n| DirEntryX { entry: DirEntry { name: n.name.clone(), inode_id: n.id }, stat: n }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    // Integration tests require a live Postgres instance; covered by
    // `MemoryInodeStore`'s unit tests and `core/tests/` integration tests
    // against a test database instead.
}
