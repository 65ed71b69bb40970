//! Credit pricing for enhancement work.
//!
//! The cost of a generation depends on the style source and the output
//! quality, not on the catalog price books (those price credits in fiat).
//! The schedule is fixed at release and snapshotted per task via the
//! active price book id.

use crate::api::models::enhance::{ImageQuality, StyleInput};
use rust_decimal::Decimal;

/// Credits charged for one enhancement.
///
/// Reference-image styles cost more than text styles because they run an
/// extra analysis pass upstream, and high resolutions (4K, 8K) carry a
/// premium within each tier.
pub fn enhancement_credits(style: &StyleInput, quality: ImageQuality) -> Decimal {
    let high_res = matches!(quality, ImageQuality::FourK | ImageQuality::EightK);
    let credits = match (style, high_res) {
        (StyleInput::Text { .. }, false) => 2,
        (StyleInput::Text { .. }, true) => 8,
        (StyleInput::Image { .. }, false) => 4,
        (StyleInput::Image { .. }, true) => 10,
    };
    Decimal::from(credits)
}
