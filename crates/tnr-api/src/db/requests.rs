//! Request persistence.
//!
//! One row per request in the `requests` table. The full record lives in the
//! `document` JSONB column; the scalar columns exist for operator queries.
//! Writes are version-conditional: a row is only overwritten by a newer
//! version, so out-of-order write-through never regresses a request.

use sqlx::PgPool;
use tnr_state::{Request, RequestStatus};

use super::{from_i64, to_i64};

fn serialize_request(request: &Request) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(request).map_err(|e| {
        tracing::error!(error = %e, request_id = request.id.get(), "failed to serialize request");
        sqlx::Error::Encode(Box::new(e))
    })
}

/// Insert or update a request.
///
/// Returns `false` when the stored row already carries the same or a newer
/// version and was left untouched.
pub async fn save(pool: &PgPool, request: &Request) -> Result<bool, sqlx::Error> {
    let document = serialize_request(request)?;

    let result = sqlx::query(
        "INSERT INTO requests (id, name, name_en, province_id, submitter_id, status, status_code,
         version, document, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         ON CONFLICT (id) DO UPDATE SET
           name = EXCLUDED.name,
           name_en = EXCLUDED.name_en,
           status = EXCLUDED.status,
           status_code = EXCLUDED.status_code,
           version = EXCLUDED.version,
           document = EXCLUDED.document,
           updated_at = EXCLUDED.updated_at
         WHERE requests.version < EXCLUDED.version",
    )
    .bind(to_i64(request.id.get())?)
    .bind(&request.name)
    .bind(&request.name_en)
    .bind(to_i64(request.province_id.get())?)
    .bind(to_i64(request.submitter.get())?)
    .bind(request.status.as_str())
    .bind(i16::from(request.status.code()))
    .bind(to_i64(request.version)?)
    .bind(&document)
    .bind(*request.created_at.as_datetime())
    .bind(*request.updated_at.as_datetime())
    .execute(pool)
    .await?;

    let written = result.rows_affected() > 0;
    if !written {
        tracing::debug!(
            request_id = request.id.get(),
            version = request.version,
            "stored request is already at this version or newer"
        );
    }
    Ok(written)
}

/// Load every persisted request.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Request>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RequestRow>(
        "SELECT id, status_code, version, document FROM requests ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(RequestRow::into_request).collect()
}

/// Database row for requests.
#[derive(sqlx::FromRow)]
struct RequestRow {
    id: i64,
    status_code: i16,
    version: i64,
    document: serde_json::Value,
}

impl RequestRow {
    /// Decode the document and check it against the scalar columns.
    fn into_request(self) -> Result<Request, sqlx::Error> {
        let request: Request =
            serde_json::from_value(self.document).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let status = u8::try_from(self.status_code)
            .ok()
            .and_then(RequestStatus::from_code);
        if request.id.get() != from_i64(self.id)?
            || request.version != from_i64(self.version)?
            || status != Some(request.status)
        {
            return Err(sqlx::Error::Decode(
                format!("request row {} disagrees with its document", self.id).into(),
            ));
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tnr_core::{ActorContext, CompanyTypeId, ProvinceId, RequestId, Role, UserId};
    use tnr_state::{FeeSchedule, NameNormalizer, RequestDraft, WorkflowEngine};

    fn stored_request() -> Request {
        let engine = WorkflowEngine::new(NameNormalizer::default(), std::sync::Arc::new(FeeSchedule::new()));
        let officer = ActorContext::new(UserId(100), [Role::ProvincialOfficer]);
        let draft = RequestDraft {
            name: "Furat".into(),
            name_en: None,
            company_type_id: CompanyTypeId(1),
            province_id: ProvinceId(1),
            fee_liable: false,
            purposes: Vec::new(),
            checklist: Vec::new(),
        };
        let none: &[Request] = &[];
        engine
            .create_request(RequestId(4), draft, &officer, none, |_| false)
            .unwrap()
            .request
    }

    fn row_for(request: &Request) -> RequestRow {
        RequestRow {
            id: request.id.get() as i64,
            status_code: i16::from(request.status.code()),
            version: request.version as i64,
            document: serialize_request(request).unwrap(),
        }
    }

    #[test]
    fn consistent_row_decodes() {
        let request = stored_request();
        let decoded = row_for(&request).into_request().unwrap();
        assert_eq!(decoded.id, request.id);
        assert_eq!(decoded.version, request.version);
        assert_eq!(decoded.status, request.status);
    }

    #[test]
    fn id_column_must_match_document() {
        let mut row = row_for(&stored_request());
        row.id += 1;
        assert!(row.into_request().is_err());
    }

    #[test]
    fn version_column_must_match_document() {
        let mut row = row_for(&stored_request());
        row.version += 1;
        assert!(row.into_request().is_err());
    }

    #[test]
    fn status_column_must_match_document() {
        let request = stored_request();
        let mut row = row_for(&request);
        let other = RequestStatus::ALL
            .iter()
            .find(|s| **s != request.status)
            .unwrap();
        row.status_code = i16::from(other.code());
        assert!(row.into_request().is_err());

        let mut row = row_for(&request);
        row.status_code = -3;
        assert!(row.into_request().is_err());
    }

    #[test]
    fn undecodable_document_is_rejected() {
        let mut row = row_for(&stored_request());
        row.document = serde_json::json!({ "id": 4 });
        assert!(row.into_request().is_err());
    }
}
