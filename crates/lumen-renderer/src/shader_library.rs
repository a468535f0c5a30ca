//! Named WGSL sources.
//!
//! Every shader ships embedded in the binary. When an override directory is
//! set, a `<name>.wgsl` file found there replaces the embedded copy, which is
//! what hot reload edits.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::error::{RenderError, RenderResult};

const BUILTIN: &[(&str, &str)] = &[
    ("frame", include_str!("shaders/frame.wgsl")),
    ("object", include_str!("shaders/object.wgsl")),
    ("fullscreen", include_str!("shaders/fullscreen.wgsl")),
    ("geometry", include_str!("shaders/geometry.wgsl")),
    ("lighting", include_str!("shaders/lighting.wgsl")),
    ("ssao", include_str!("shaders/ssao.wgsl")),
    ("ssao_blur", include_str!("shaders/ssao_blur.wgsl")),
    ("shadow_pass", include_str!("shaders/shadow_pass.wgsl")),
    ("directional_shadow", include_str!("shaders/directional_shadow.wgsl")),
    ("point_shadow", include_str!("shaders/point_shadow.wgsl")),
    ("skybox", include_str!("shaders/skybox.wgsl")),
    ("cube_face", include_str!("shaders/cube_face.wgsl")),
    ("ibl_sampling", include_str!("shaders/ibl_sampling.wgsl")),
    ("equirect_to_cube", include_str!("shaders/equirect_to_cube.wgsl")),
    ("cube_copy", include_str!("shaders/cube_copy.wgsl")),
    ("irradiance", include_str!("shaders/irradiance.wgsl")),
    ("prefilter", include_str!("shaders/prefilter.wgsl")),
    ("brdf_lut", include_str!("shaders/brdf_lut.wgsl")),
];

/// Resolves shader names to WGSL source.
#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    dir: Option<PathBuf>,
}

impl ShaderLibrary {
    /// Library serving only the embedded sources.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Library that prefers files in `dir` over embedded sources.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Names of every embedded shader.
    pub fn names() -> impl Iterator<Item = &'static str> {
        BUILTIN.iter().map(|(name, _)| *name)
    }

    fn embedded(name: &str) -> Option<&'static str> {
        BUILTIN
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, source)| *source)
    }

    /// Override file path for `name`, whether or not it exists.
    pub fn path(&self, name: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(format!("{name}.wgsl")))
    }

    /// Returns the source for `name`.
    pub fn source(&self, name: &str) -> RenderResult<Cow<'static, str>> {
        if let Some(path) = self.path(name)
            && path.is_file()
        {
            let source = std::fs::read_to_string(&path).map_err(|e| RenderError::io(&path, e))?;
            tracing::debug!("Loaded shader '{}' from {:?}", name, path);
            return Ok(Cow::Owned(source));
        }
        Self::embedded(name)
            .map(Cow::Borrowed)
            .ok_or_else(|| RenderError::UnknownShader(name.to_string()))
    }

    /// Concatenates the named sources in order into one module.
    pub fn compose(&self, names: &[&str]) -> RenderResult<String> {
        let mut module = String::new();
        for name in names {
            module.push_str(&self.source(name)?);
            module.push('\n');
        }
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lumen-shaders-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_builtin_lookup() {
        let library = ShaderLibrary::builtin();
        assert!(library.source("lighting").unwrap().contains("fn fs_main"));
        assert!(ShaderLibrary::names().any(|n| n == "point_shadow"));
        assert!(library.path("lighting").is_none());
    }

    #[test]
    fn test_unknown_shader() {
        let library = ShaderLibrary::builtin();
        assert!(matches!(
            library.source("missing"),
            Err(RenderError::UnknownShader(name)) if name == "missing"
        ));
        assert!(library.compose(&["frame", "missing"]).is_err());
    }

    #[test]
    fn test_compose_keeps_order() {
        let composed = ShaderLibrary::builtin().compose(&["frame", "geometry"]).unwrap();
        let frame = composed.find("struct VertexMatrices").unwrap();
        let geometry = composed.find("fn vs_main").unwrap();
        assert!(frame < geometry);
    }

    #[test]
    fn test_override_directory_wins() {
        let dir = temp_dir("override");
        std::fs::write(dir.join("ssao_blur.wgsl"), "// edited").unwrap();

        let library = ShaderLibrary::with_dir(&dir);
        assert_eq!(library.source("ssao_blur").unwrap(), "// edited");
        // Files absent from the directory fall back to the embedded copy.
        assert!(library.source("frame").unwrap().contains("VertexMatrices"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
