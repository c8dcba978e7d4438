use image::RgbaImage;

/// A live picture source the dartboard stream is read from.
///
/// Implementations must never panic when the source is not ready yet;
/// they report it by returning `None`.
pub trait VideoSource: Send + Sync {
    /// Intrinsic pixel size, if the source knows it already.
    fn intrinsic_size(&self) -> Option<(u32, u32)>;

    /// Current playback position in seconds.
    fn playback_position(&self) -> f64;

    /// Render the current picture into a `width`×`height` RGBA buffer.
    fn render(&self, width: u32, height: u32) -> Option<RgbaImage>;
}
