//! 审计结果存储 - 基础设施层

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::AuditRecord;

/// 持久化审计记录
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// run 是否存在
    async fn exists(&self, run_id: i64) -> Result<bool, StoreError>;

    async fn save(&self, record: &AuditRecord) -> Result<(), StoreError>;

    /// 关闭底层连接，关停时调用
    async fn close(&self) {}
}

/// PostgreSQL 实现（表 `audit_runs` / `page_audits`）
#[derive(Clone)]
pub struct PgResultStore {
    pool: PgPool,
}

impl PgResultStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        debug!("正在连接数据库");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        info!("✓ 数据库连接成功");
        Ok(Self { pool })
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn close(&self) {
        self.pool.close().await;
        debug!("数据库连接池已关闭");
    }

    async fn exists(&self, run_id: i64) -> Result<bool, StoreError> {
        let found = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM audit_runs WHERE id = $1)",
        )
        .bind(run_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    async fn save(&self, record: &AuditRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO page_audits (
                run_id, url, status_code, load_time_ms,
                lcp_score, fid_score, cls_score, fcp_score, ttfb_score,
                title, meta_description, h1_tags, canonical_url, has_robots_meta,
                seo_issues, accessibility_issues, performance_issues, ai_suggestions,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, NOW())
            "#,
        )
        .bind(record.run_id)
        .bind(&record.url)
        .bind(record.status_code)
        .bind(record.load_time_ms)
        .bind(record.lcp_score)
        .bind(record.fid_score)
        .bind(record.cls_score)
        .bind(record.fcp_score)
        .bind(record.ttfb_score)
        .bind(&record.title)
        .bind(&record.meta_description)
        .bind(Json(&record.h1_tags))
        .bind(&record.canonical_url)
        .bind(record.has_robots_meta)
        .bind(Json(&record.seo_issues))
        .bind(Json(&record.accessibility_issues))
        .bind(Json(&record.performance_issues))
        .bind(&record.ai_suggestions)
        .execute(&self.pool)
        .await?;

        info!("已保存审计记录: {}", record.url);
        Ok(())
    }
}
