//! Database queries for request logs

use sqlx::PgPool;

use super::models::{NewRequestLog, RequestLogDetail, RequestLogEntry};

/// Insert one record, returning its id
pub async fn insert_request_log(pool: &PgPool, record: &NewRequestLog) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO request_logs (
            method, path, query, ip, headers, status_code, error, duration_ms,
            request_body, original_data, result_data, resource_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING id
        "#,
    )
    .bind(&record.method)
    .bind(&record.path)
    .bind(&record.query)
    .bind(&record.ip)
    .bind(&record.headers)
    .bind(record.status_code)
    .bind(&record.error)
    .bind(record.duration_ms)
    .bind(&record.request_body)
    .bind(&record.original_data)
    .bind(&record.result_data)
    .bind(&record.resource_id)
    .fetch_one(pool)
    .await
}

/// Newest first
pub async fn list_request_logs(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<RequestLogEntry>, sqlx::Error> {
    sqlx::query_as::<_, RequestLogEntry>(
        r#"
        SELECT id, method, path, query, ip, headers, status_code, error,
               duration_ms, resource_id, created_at
        FROM request_logs
        ORDER BY created_at DESC, id DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count_request_logs(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM request_logs")
        .fetch_one(pool)
        .await
}

pub async fn get_request_log(pool: &PgPool, id: i64) -> Result<Option<RequestLogDetail>, sqlx::Error> {
    sqlx::query_as::<_, RequestLogDetail>(
        r#"
        SELECT id, method, path, query, ip, headers, status_code, error,
               duration_ms, resource_id, created_at,
               request_body, original_data, result_data
        FROM request_logs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
