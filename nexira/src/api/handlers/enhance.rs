use crate::{
    api::models::{
        enhance::{
            AnalyzeImageRequest, AnalyzeImageResponse, EnhanceImageRequest, EnhanceImageResponse, ImageTaskResponse,
            ListImageTasksQuery, StyleInput,
        },
        users::CurrentUser,
    },
    auth::permissions::{self, operation, resource, RequiresPermission},
    db::{
        handlers::{ImageTasks, Ledgers, PriceBooks},
        models::{
            image_tasks::{ImageTaskCreateDBRequest, TaskStatus},
            ledgers::{EntryType, LedgerEntryCreateDBRequest, LedgerReference},
        },
    },
    errors::{Error, Result},
    imaging::{prompt, ImagingError, InlineImage},
    pricing,
    types::{ImageTaskId, Operation, Permission, Resource},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use tracing::{info, warn};

/// Run one enhancement
#[utoipa::path(
    post,
    path = "/enhance",
    tag = "enhance",
    summary = "Enhance an image",
    description = "Run one image enhancement. Credits are checked up front but only debited after the generation succeeds; failed or timed-out generations cost nothing.",
    request_body = EnhanceImageRequest,
    responses(
        (status = 200, description = "Enhancement completed", body = EnhanceImageResponse),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 402, description = "Insufficient credits"),
        (status = 404, description = "No price book in force"),
        (status = 502, description = "Generation failed or timed out; the task is kept as failed and nothing is charged"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn enhance_image(
    State(state): State<AppState>,
    perm: RequiresPermission<resource::ImageTasks, operation::CreateOwn>,
    Json(data): Json<EnhanceImageRequest>,
) -> Result<Json<EnhanceImageResponse>> {
    let cost = pricing::enhancement_credits(&data.style, data.quality);

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // Tasks snapshot the catalog version in force at submission
    let price_book = PriceBooks::new(&mut pool_conn).current().await?.ok_or_else(|| Error::NotFound {
        resource: "Price book".to_string(),
        id: "current".to_string(),
    })?;

    // Reserve: reject before any upstream work if the balance cannot cover
    // the cost. The authoritative check is the debit after generation.
    let balance = Ledgers::new(&mut pool_conn).get_user_balance(perm.id).await?;
    if balance < cost {
        return Err(Error::InsufficientCredits {
            required: cost,
            available: balance,
        });
    }

    let config = serde_json::to_value(&data).map_err(|e| Error::BadRequest {
        message: format!("unserializable request: {e}"),
    })?;

    // The task starts in processing; the reservation and the row land
    // together, so no pending row can be stranded by a crash here.
    let mut tasks = ImageTasks::new(&mut pool_conn);
    let task = tasks
        .create(&ImageTaskCreateDBRequest {
            user_id: perm.id,
            status: TaskStatus::Processing,
            cost,
            config,
            price_snapshot_id: price_book.id,
        })
        .await?;

    match run_generation(&state, &data).await {
        Ok(output) => {
            // Settle: debit first, then finish the task. A concurrent spend
            // can still drain the balance between reserve and settle; the
            // task fails and nothing is charged.
            let entry = Ledgers::new(&mut pool_conn)
                .create_entry(&LedgerEntryCreateDBRequest {
                    user_id: perm.id,
                    entry_type: EntryType::Debit,
                    amount: cost,
                    reference: Some(LedgerReference::EnhancementTask(task.id)),
                    description: Some(format!("Image enhancement ({})", data.quality.as_str())),
                })
                .await;

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let mut tasks = ImageTasks::new(&mut pool_conn);
                    tasks.mark_failed(task.id, "settlement failed").await?;
                    return Err(e.into());
                }
            };

            let mut tasks = ImageTasks::new(&mut pool_conn);
            // Results are returned inline; only the content type is recorded
            let task = tasks
                .mark_completed(task.id, &format!("inline:{}", output.mime_type))
                .await?;

            info!(task_id = %task.id, user_id = %perm.id, cost = %cost, "enhancement completed");

            Ok(Json(EnhanceImageResponse {
                task_id: task.id,
                status: task.status,
                cost,
                image: Some(output.data),
                balance: entry.balance_after,
            }))
        }
        Err(e) => {
            warn!(task_id = %task.id, user_id = %perm.id, error = %e, "enhancement failed, not debited");
            let mut tasks = ImageTasks::new(&mut pool_conn);
            tasks.mark_failed(task.id, &e.to_string()).await?;

            Err(Error::ExternalService { message: e.to_string() })
        }
    }
}

/// The upstream round trip, bounded by the configured deadline.
async fn run_generation(state: &AppState, data: &EnhanceImageRequest) -> std::result::Result<InlineImage, ImagingError> {
    let deadline = state.config.enhancement.generation_deadline;

    let work = async {
        let subject = InlineImage {
            mime_type: data.mime_type.clone(),
            data: data.image.clone(),
        };

        // Reference styles get an analysis pass so the generation prompt
        // carries a textual style summary alongside the raw reference.
        let (style_description, images) = match &data.style {
            StyleInput::Image { data: reference } => {
                let reference = InlineImage {
                    mime_type: data.mime_type.clone(),
                    data: reference.clone(),
                };
                let description = state
                    .generator
                    .analyze(&prompt::build_style_analysis_prompt(), &reference)
                    .await?;
                (Some(description), vec![subject, reference])
            }
            StyleInput::Text { .. } => (None, vec![subject]),
        };

        let instruction = prompt::build_enhancement_prompt(data, style_description.as_deref());
        let output = state.generator.generate(&instruction, &images).await?;
        Ok(output.image)
    };

    tokio::time::timeout(deadline, work)
        .await
        .map_err(|_| ImagingError::Request(format!("generation exceeded deadline of {deadline:?}")))?
}

/// Describe an uploaded image
#[utoipa::path(
    post,
    path = "/analyze/image",
    tag = "enhance",
    summary = "Analyze a subject image",
    description = "Describe the subject of an uploaded image. Free of charge.",
    request_body = AnalyzeImageRequest,
    responses(
        (status = 200, description = "Analysis", body = AnalyzeImageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Generation backend failed"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn analyze_image(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(data): Json<AnalyzeImageRequest>,
) -> Result<Json<AnalyzeImageResponse>> {
    let image = InlineImage {
        mime_type: data.mime_type,
        data: data.image,
    };
    let description = state
        .generator
        .analyze(&prompt::build_subject_analysis_prompt(data.tool_type), &image)
        .await
        .map_err(|e| Error::ExternalService { message: e.to_string() })?;

    Ok(Json(AnalyzeImageResponse { description }))
}

/// Describe a style reference image
#[utoipa::path(
    post,
    path = "/analyze/reference",
    tag = "enhance",
    summary = "Analyze a style reference",
    description = "Extract a textual style description from a reference image. Free of charge.",
    request_body = AnalyzeImageRequest,
    responses(
        (status = 200, description = "Style description", body = AnalyzeImageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Generation backend failed"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn analyze_reference(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(data): Json<AnalyzeImageRequest>,
) -> Result<Json<AnalyzeImageResponse>> {
    let image = InlineImage {
        mime_type: data.mime_type,
        data: data.image,
    };
    let description = state
        .generator
        .analyze(&prompt::build_style_analysis_prompt(), &image)
        .await
        .map_err(|e| Error::ExternalService { message: e.to_string() })?;

    Ok(Json(AnalyzeImageResponse { description }))
}

/// Get an image task
#[utoipa::path(
    get,
    path = "/image-tasks/{task_id}",
    tag = "enhance",
    summary = "Get an image task",
    description = "Get one enhancement task. Users can only read their own tasks.",
    params(
        ("task_id" = String, Path, description = "Image task ID"),
    ),
    responses(
        (status = 200, description = "Task details", body = ImageTaskResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Task not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_image_task(
    State(state): State<AppState>,
    Path(task_id): Path<ImageTaskId>,
    current_user: CurrentUser,
) -> Result<Json<ImageTaskResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut tasks = ImageTasks::new(&mut pool_conn);

    let has_read_all = permissions::has_permission(&current_user, Resource::ImageTasks, Operation::ReadAll);

    let task = tasks.get_by_id(task_id).await?;
    let task = match task {
        Some(task) => {
            if !has_read_all && task.user_id != current_user.id {
                // Return 404 to avoid leaking existence
                return Err(Error::NotFound {
                    resource: "Image task".to_string(),
                    id: task_id.to_string(),
                });
            }
            task
        }
        None => {
            return Err(Error::NotFound {
                resource: "Image task".to_string(),
                id: task_id.to_string(),
            });
        }
    };

    Ok(Json(ImageTaskResponse::from(task)))
}

/// List image tasks
#[utoipa::path(
    get,
    path = "/image-tasks",
    tag = "enhance",
    summary = "List image tasks",
    description = "List enhancement tasks, newest first. Users see their own; admins can filter by user or see all.",
    params(
        ListImageTasksQuery
    ),
    responses(
        (status = 200, description = "List of tasks", body = [ImageTaskResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - cannot access other users' tasks"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_image_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListImageTasksQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<ImageTaskResponse>>> {
    let skip = query.skip.unwrap_or(0);
    let limit = query.limit.unwrap_or(100).min(1000);

    let has_read_all = permissions::has_permission(&current_user, Resource::ImageTasks, Operation::ReadAll);

    let filter_user_id = match query.user_id {
        Some(requested_user_id) => {
            if !has_read_all && requested_user_id != current_user.id {
                return Err(Error::InsufficientPermissions {
                    required: Permission::Allow(Resource::ImageTasks, Operation::ReadAll),
                    action: Operation::ReadAll,
                    resource: "image tasks".to_string(),
                });
            }
            Some(requested_user_id)
        }
        None => {
            if has_read_all {
                None
            } else {
                Some(current_user.id)
            }
        }
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut tasks = ImageTasks::new(&mut pool_conn);

    let all = tasks.list(filter_user_id, skip, limit).await?;
    Ok(Json(all.into_iter().map(ImageTaskResponse::from).collect()))
}
