//! Prompt assembly for the generation backend.
//!
//! The upstream model takes a single instruction string alongside the
//! inline images, so every request knob ends up as a sentence here. Kept
//! as plain functions over the request types so the wording is unit
//! testable without network access.

use crate::api::models::enhance::{
    BackgroundMode, BackgroundSpec, CameraAngle, EnhanceImageRequest, StyleInput, ToolType, UsageScenario,
};

fn subject_noun(tool_type: ToolType) -> &'static str {
    match tool_type {
        ToolType::Food => "dish",
        ToolType::Product => "product",
    }
}

fn background_sentence(spec: &BackgroundSpec) -> String {
    match spec.mode {
        BackgroundMode::Transparent => "Place the subject on a fully transparent background.".to_string(),
        BackgroundMode::Color => {
            let color = spec.color.as_deref().unwrap_or("#FFFFFF");
            format!("Place the subject on a solid {color} background.")
        }
        BackgroundMode::Custom => {
            let description = spec.description.as_deref().unwrap_or("a clean studio setting");
            format!("Place the subject in this setting: {description}.")
        }
        BackgroundMode::KeepOriginal => "Keep the original background unchanged.".to_string(),
        BackgroundMode::StyleMatch => "Compose a background that matches the requested style.".to_string(),
    }
}

fn camera_sentence(angle: CameraAngle) -> &'static str {
    match angle {
        CameraAngle::TopDown => "Shoot from directly above, flat-lay style.",
        CameraAngle::EyeLevel => "Shoot at eye level, straight on.",
        CameraAngle::Macro => "Shoot as a macro close-up emphasizing texture.",
        CameraAngle::FortyFive => "Shoot from a 45 degree angle.",
    }
}

fn scenario_sentence(scenario: UsageScenario) -> &'static str {
    match scenario {
        UsageScenario::EcommerceMenu => {
            "Optimize for an e-commerce listing or menu thumbnail: the subject fills the frame, crisp and unambiguous."
        }
        UsageScenario::WebsiteHero => {
            "Optimize for a website hero banner: generous negative space for overlaid text."
        }
        UsageScenario::SocialLifestyle => {
            "Optimize for social media: a natural lifestyle scene with an authentic, candid feel."
        }
    }
}

/// Assemble the instruction string for one enhancement.
///
/// `style_description` is the analyzed description of a reference image
/// when the style input is an image; text styles are used verbatim.
pub fn build_enhancement_prompt(request: &EnhanceImageRequest, style_description: Option<&str>) -> String {
    let noun = subject_noun(request.tool_type);
    let mut parts = vec![format!(
        "Enhance this {noun} photograph into a professional commercial image. \
         Preserve the {noun} itself exactly as it is; do not alter its shape, ingredients, or labeling."
    )];

    match (&request.style, style_description) {
        (StyleInput::Text { description }, _) => {
            parts.push(format!("Apply this visual style: {description}."));
        }
        (StyleInput::Image { .. }, Some(description)) => {
            parts.push(format!(
                "Match the style of the attached reference image. Reference style summary: {description}."
            ));
        }
        (StyleInput::Image { .. }, None) => {
            parts.push("Match the style of the attached reference image.".to_string());
        }
    }

    parts.push(background_sentence(&request.background));

    if let Some(angle) = request.camera_angle {
        parts.push(camera_sentence(angle).to_string());
    }
    if let Some(scenario) = request.usage_scenario {
        parts.push(scenario_sentence(scenario).to_string());
    }
    if !request.excluded_props.is_empty() {
        parts.push(format!("Do not include any of the following: {}.", request.excluded_props.join(", ")));
    }
    if let Some(instructions) = request.custom_instructions.as_deref() {
        if !instructions.trim().is_empty() {
            parts.push(format!("Additional instructions: {}.", instructions.trim()));
        }
    }

    parts.push(format!(
        "Render at {} quality with a {} aspect ratio.",
        request.quality.as_str(),
        request.aspect_ratio.as_str()
    ));

    parts.join(" ")
}

/// Prompt for describing a style reference image.
pub fn build_style_analysis_prompt() -> String {
    "Describe the photographic style of this image in two or three sentences: \
     lighting, color palette, composition, mood, and surface treatment. \
     Do not describe the subject itself."
        .to_string()
}

/// Prompt for describing the subject of an uploaded image.
pub fn build_subject_analysis_prompt(tool_type: ToolType) -> String {
    let noun = subject_noun(tool_type);
    format!(
        "Describe this {noun} in two or three sentences for a commercial listing: \
         what it is, its notable features, and its current presentation."
    )
}
