//! Per-frame counters.

use std::fmt;

/// What one call to `DeferredRenderer::render` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub geometry_draws: u32,
    pub directional_shadow_draws: u32,
    pub point_shadow_draws: u32,
    /// Directional lights that received a shadow layer
    pub shadowed_directional: u32,
    /// Point lights that received a shadow cube
    pub shadowed_point: u32,
    /// Directional lights packed into the frame uniforms
    pub directional_lights: u32,
    /// Point lights packed into the frame uniforms
    pub point_lights: u32,
    pub ssao_enabled: bool,
    pub skybox_drawn: bool,
}

impl FrameStats {
    pub fn total_draws(&self) -> u32 {
        self.geometry_draws + self.directional_shadow_draws + self.point_shadow_draws
    }
}

impl fmt::Display for FrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} draws ({} geometry, {} dir shadow, {} point shadow), lights {}/{} dir, {}/{} point shadowed, ssao {}",
            self.total_draws(),
            self.geometry_draws,
            self.directional_shadow_draws,
            self.point_shadow_draws,
            self.shadowed_directional,
            self.directional_lights,
            self.shadowed_point,
            self.point_lights,
            if self.ssao_enabled { "on" } else { "off" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_draws() {
        let stats = FrameStats {
            geometry_draws: 3,
            directional_shadow_draws: 2,
            point_shadow_draws: 12,
            ..Default::default()
        };
        assert_eq!(stats.total_draws(), 17);
        assert!(stats.to_string().starts_with("17 draws"));
    }
}
