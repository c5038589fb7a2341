//! Per-platform content policy.

use dreamfeed_core::Platform;

/// Whether `platform` accepts mature content.
pub fn allows_mature(platform: Platform) -> bool {
    match platform {
        Platform::Instagram | Platform::Tiktok | Platform::Youtube => false,
        Platform::X | Platform::Reddit | Platform::Onlyfans => true,
    }
}

/// Drop platforms that reject the post's content rating. Clean posts pass
/// through unchanged.
pub fn filter_for_content(platforms: &[Platform], nsfw: bool) -> Vec<Platform> {
    platforms
        .iter()
        .copied()
        .filter(|p| !nsfw || allows_mature(*p))
        .collect()
}
