//! Request and response surfaces for the enhancement endpoints.

use crate::{
    db::models::image_tasks::{ImageTaskDBResponse, TaskStatus},
    types::ImageTaskId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// What kind of subject is being enhanced. Drives prompt framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolType {
    Food,
    Product,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Wide,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "4:3")]
    Classic,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Wide => "16:9",
            AspectRatio::Tall => "9:16",
            AspectRatio::Classic => "4:3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ImageQuality {
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
    #[serde(rename = "8K")]
    EightK,
}

impl ImageQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageQuality::OneK => "1K",
            ImageQuality::TwoK => "2K",
            ImageQuality::FourK => "4K",
            ImageQuality::EightK => "8K",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackgroundMode {
    Transparent,
    Color,
    Custom,
    KeepOriginal,
    StyleMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CameraAngle {
    TopDown,
    EyeLevel,
    Macro,
    FortyFive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageScenario {
    EcommerceMenu,
    WebsiteHero,
    SocialLifestyle,
}

/// Style source: either a reference image to imitate or a free-text
/// description. The variant determines the credit tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StyleInput {
    /// Base64-encoded reference image.
    Image { data: String },
    Text { description: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BackgroundSpec {
    pub mode: BackgroundMode,
    /// Hex color for COLOR mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Free-text scene description for CUSTOM mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnhanceImageRequest {
    /// Base64-encoded source image.
    pub image: String,
    pub mime_type: String,
    pub tool_type: ToolType,
    pub style: StyleInput,
    pub quality: ImageQuality,
    pub aspect_ratio: AspectRatio,
    pub background: BackgroundSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_angle: Option<CameraAngle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_scenario: Option<UsageScenario>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_props: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnhanceImageResponse {
    #[schema(value_type = Uuid)]
    pub task_id: ImageTaskId,
    pub status: TaskStatus,
    /// Credits charged for this enhancement.
    pub cost: Decimal,
    /// Base64-encoded result, present when the task completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Remaining credit balance after settlement.
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeImageRequest {
    /// Base64-encoded image to describe.
    pub image: String,
    pub mime_type: String,
    pub tool_type: ToolType,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeImageResponse {
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageTaskResponse {
    #[schema(value_type = Uuid)]
    pub id: ImageTaskId,
    #[schema(value_type = Uuid)]
    pub user_id: crate::types::UserId,
    pub status: TaskStatus,
    pub cost: Decimal,
    pub config: serde_json::Value,
    #[schema(value_type = Uuid)]
    pub price_snapshot_id: crate::types::PriceBookId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ImageTaskDBResponse> for ImageTaskResponse {
    fn from(task: ImageTaskDBResponse) -> Self {
        Self {
            id: task.id,
            user_id: task.user_id,
            status: task.status,
            cost: task.cost,
            config: task.config,
            price_snapshot_id: task.price_snapshot_id,
            output_ref: task.output_ref,
            error: task.error,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Query parameters for listing image tasks
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListImageTasksQuery {
    /// Restrict to one user (admins only; defaults to the caller)
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<Uuid>)]
    pub user_id: Option<crate::types::UserId>,

    /// Number of items to skip
    #[param(default = 0, minimum = 0)]
    pub skip: Option<i64>,

    /// Maximum number of items to return
    #[param(default = 100, minimum = 1, maximum = 1000)]
    pub limit: Option<i64>,
}
