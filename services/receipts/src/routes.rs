//! HTTP surface of the receipt service
//!
//! Thin handlers over the directory and workflow engines. Reviewing
//! transitions require the CFO capability, account management the Admin
//! capability, and receipt reads are owner-or-CFO.

use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::middleware::{auth_middleware, require_clearance};
use crate::models::{Clearance, NewUser, Receipt, ReceiptSubmission, User};
use crate::state::AppState;
use crate::validation;
use crate::workflow::WorkflowOutcome;

/// Create the router for the receipt service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/change_password", post(change_password))
        .route("/receipts", get(list_my_receipts).post(submit_receipt))
        .route("/receipts/:id", get(view_receipt))
        .route("/receipts/:id/file", get(download_receipt_file))
        .route("/cfo/receipts", get(list_all_receipts))
        .route("/cfo/receipts/:id/approve", post(approve_receipt))
        .route("/cfo/receipts/:id/reject", post(reject_receipt))
        .route("/cfo/receipts/:id/resubmit", post(resubmit_receipt))
        .route("/cfo/receipts/:id/archive", post(archive_receipt))
        .route("/admin/users", get(list_users).post(add_user))
        .route("/admin/users/import", post(import_users))
        .route("/admin/users/:id", delete(delete_user))
        .route("/admin/users/:id/reset_password", post(reset_password))
        .route("/admin/users/:id/roles/grant", post(grant_role))
        .route("/admin/users/:id/roles/revoke", post(revoke_role))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/healthz", get(health_check))
        .route("/auth/login", post(login))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": 1,
    }))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    expires_in: u64,
    needs_password_change: bool,
}

/// User login endpoint
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    info!("Login attempt for {}", payload.email);

    let user = state
        .directory
        .authenticate(&payload.email, &payload.password)
        .await?;

    let token = state.jwt.generate_token(&user)?;

    Ok(Json(LoginResponse {
        token,
        expires_in: state.jwt.expiry(),
        needs_password_change: user.needs_password_change,
    }))
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    old_password: String,
    new_password: String,
}

async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<impl IntoResponse> {
    state
        .directory
        .change_password(user.id, &payload.old_password, &payload.new_password)
        .await?;

    Ok(Json(json!({ "message": "Password changed" })))
}

/// A transition or submission result, with advisory warnings
#[derive(Serialize)]
struct ReceiptResponse {
    receipt: Receipt,
    warnings: Vec<String>,
}

impl From<WorkflowOutcome> for ReceiptResponse {
    fn from(outcome: WorkflowOutcome) -> Self {
        Self {
            receipt: outcome.receipt,
            warnings: outcome.warnings,
        }
    }
}

async fn list_my_receipts(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> AppResult<Json<Vec<Receipt>>> {
    Ok(Json(state.receipts.list_by_owner(user.id).await?))
}

/// Receipt submission as multipart form data: `receipt_date`, `activity`,
/// `amount` (decimal string), and `file`
async fn submit_receipt(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ReceiptResponse>)> {
    let mut receipt_date = None;
    let mut activity = None;
    let mut amount = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {}", e)))?
    {
        match field.name() {
            Some("receipt_date") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                let date = NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                    .map_err(|_| AppError::Validation("Invalid receipt date".to_string()))?;
                receipt_date = Some(date);
            }
            Some("activity") => {
                activity = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                );
            }
            Some("amount") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                amount = Some(validation::parse_amount(&text).map_err(AppError::Validation)?);
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or("receipt").to_string();
                let content = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?;
                file = Some((filename, content.to_vec()));
            }
            _ => {}
        }
    }

    let receipt_date =
        receipt_date.ok_or_else(|| AppError::Validation("Receipt date is required".to_string()))?;
    let activity =
        activity.ok_or_else(|| AppError::Validation("Activity is required".to_string()))?;
    let amount = amount.ok_or_else(|| AppError::Validation("Amount is required".to_string()))?;
    let (original_filename, content) =
        file.ok_or_else(|| AppError::Validation("A receipt file is required".to_string()))?;

    let outcome = state
        .workflow
        .submit(
            &user,
            ReceiptSubmission {
                receipt_date,
                activity,
                amount,
                original_filename,
                content,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// Owner-or-CFO read access
fn authorize_read(user: &User, receipt: &Receipt) -> AppResult<()> {
    if receipt.user_id == user.id || user.clearance.contains(Clearance::CFO) {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

async fn view_receipt(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> AppResult<Json<Receipt>> {
    let receipt = state
        .receipts
        .get(id)
        .await?
        .ok_or(AppError::NotFound("Receipt"))?;

    authorize_read(&user, &receipt)?;
    Ok(Json(receipt))
}

async fn download_receipt_file(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let receipt = state
        .receipts
        .get(id)
        .await?
        .ok_or(AppError::NotFound("Receipt"))?;

    authorize_read(&user, &receipt)?;

    let path = std::path::Path::new(&receipt.file.path).join(&receipt.file.filename);
    let content = tokio::fs::read(&path).await?;

    let content_type = mime_guess::from_path(&receipt.file.filename)
        .first_or_octet_stream()
        .to_string();

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", receipt.file.filename),
            ),
        ],
        content,
    )
        .into_response())
}

#[derive(Deserialize)]
struct ListAllQuery {
    /// Filter on the archive flag; defaults to non-archived receipts
    archived: Option<bool>,
}

async fn list_all_receipts(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListAllQuery>,
) -> AppResult<Json<Vec<Receipt>>> {
    require_clearance(&user, Clearance::CFO)?;

    let archived = Some(query.archived.unwrap_or(false));
    Ok(Json(state.receipts.list_all(archived).await?))
}

async fn approve_receipt(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> AppResult<Json<ReceiptResponse>> {
    require_clearance(&user, Clearance::CFO)?;
    Ok(Json(state.workflow.approve(id).await?.into()))
}

#[derive(Deserialize)]
struct RejectRequest {
    reason: String,
}

async fn reject_receipt(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
    Json(payload): Json<RejectRequest>,
) -> AppResult<Json<ReceiptResponse>> {
    require_clearance(&user, Clearance::CFO)?;
    Ok(Json(state.workflow.reject(id, &payload.reason).await?.into()))
}

async fn resubmit_receipt(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> AppResult<Json<ReceiptResponse>> {
    require_clearance(&user, Clearance::CFO)?;
    Ok(Json(state.workflow.resubmit(id).await?.into()))
}

async fn archive_receipt(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> AppResult<Json<ReceiptResponse>> {
    require_clearance(&user, Clearance::CFO)?;
    Ok(Json(state.workflow.archive(id).await?.into()))
}

async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> AppResult<Json<Vec<User>>> {
    require_clearance(&user, Clearance::ADMIN)?;
    Ok(Json(state.directory.list_users().await?))
}

#[derive(Serialize)]
struct CreatedUserResponse {
    user: User,
    warnings: Vec<String>,
}

async fn add_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<NewUser>,
) -> AppResult<(StatusCode, Json<CreatedUserResponse>)> {
    require_clearance(&user, Clearance::ADMIN)?;

    let outcome = state.directory.create_user(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedUserResponse {
            user: outcome.user,
            warnings: outcome.warnings,
        }),
    ))
}

#[derive(Serialize)]
struct ImportResponse {
    created: usize,
    row_errors: Vec<String>,
    warnings: Vec<String>,
}

/// CSV bulk import: one `name,email` row per account
async fn import_users(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> AppResult<Json<ImportResponse>> {
    require_clearance(&user, Clearance::ADMIN)?;

    let mut csv_content = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {}", e)))?
    {
        if field.name() == Some("file") {
            csv_content = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?,
            );
        }
    }

    let csv_content =
        csv_content.ok_or_else(|| AppError::Validation("A CSV file is required".to_string()))?;

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(csv_content.as_ref());

    for (index, record) in reader.records().enumerate() {
        match record {
            Ok(record) if record.len() >= 2 => rows.push(NewUser {
                name: record[0].to_string(),
                email: record[1].to_string(),
            }),
            Ok(_) => row_errors.push(format!("Row {}: expected name and email", index + 1)),
            Err(e) => row_errors.push(format!("Row {}: {}", index + 1, e)),
        }
    }

    let outcome = state.directory.bulk_import(rows).await?;
    row_errors.extend(outcome.row_errors);

    Ok(Json(ImportResponse {
        created: outcome.created,
        row_errors,
        warnings: outcome.warnings,
    }))
}

async fn delete_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    require_clearance(&user, Clearance::ADMIN)?;

    state.directory.delete_user(&user, id).await?;
    Ok(Json(json!({ "message": "User deleted" })))
}

async fn reset_password(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    require_clearance(&user, Clearance::ADMIN)?;

    let warnings = state.directory.reset_password(id).await?;
    Ok(Json(json!({
        "message": "Password reset",
        "warnings": warnings,
    })))
}

#[derive(Deserialize)]
struct RoleRequest {
    role: String,
}

async fn grant_role(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
    Json(payload): Json<RoleRequest>,
) -> AppResult<Json<User>> {
    require_clearance(&user, Clearance::ADMIN)?;

    let capability: Clearance = payload.role.parse().map_err(AppError::Validation)?;
    Ok(Json(state.directory.grant_role(id, capability).await?))
}

async fn revoke_role(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<i64>,
    Json(payload): Json<RoleRequest>,
) -> AppResult<Json<User>> {
    require_clearance(&user, Clearance::ADMIN)?;

    let capability: Clearance = payload.role.parse().map_err(AppError::Validation)?;
    Ok(Json(state.directory.revoke_role(&user, id, capability).await?))
}
