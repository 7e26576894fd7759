//! Tera rendering engine: [`TemplateKind`] and [`Renderer`].
//!
//! | Kind        | Entry template                 | Partials                          |
//! |-------------|--------------------------------|-----------------------------------|
//! | BuildScript | `script/build_script.sh.tera`  | `shared/_kernel.tera`, `shared/_external.tera`, `shared/_recovery.tera` |
//! | Readme      | `readme/readme.md.tera`        | -                                  |
//!
//! Any embedded template can be replaced by a `.tera` file with the same
//! relative name under the user template directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::Tera;

use crate::context::{ReadmeContext, ScriptContext};
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates: baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("shared/_kernel.tera", include_str!("templates/_partials/kernel.tera")),
    ("shared/_external.tera", include_str!("templates/_partials/external.tera")),
    ("shared/_recovery.tera", include_str!("templates/_partials/recovery.tera")),
    ("script/build_script.sh.tera", include_str!("templates/build_script.sh.tera")),
    ("readme/readme.md.tera", include_str!("templates/readme.md.tera")),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    let mut templates = Vec::new();
    for path in files {
        if path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = HashMap::new();
    for (name, content) in TPLS {
        templates.insert(normalize_template_name(Path::new(name)), (*content).to_string());
    }
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    let items: Vec<(String, String)> = templates.into_iter().collect();
    tera.add_raw_templates(items).map_err(RenderError::Load)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// TemplateKind
// ---------------------------------------------------------------------------

/// Documents the engine knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    BuildScript,
    Readme,
}

impl TemplateKind {
    pub fn all() -> &'static [TemplateKind] {
        &[TemplateKind::BuildScript, TemplateKind::Readme]
    }

    /// Entry template rendered for this kind.
    pub fn template_name(&self) -> &'static str {
        match self {
            TemplateKind::BuildScript => "script/build_script.sh.tera",
            TemplateKind::Readme => "readme/readme.md.tera",
        }
    }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine for rendering templates with optional user overrides.
///
/// `user_template_dir` may contain `.tera` files that override embedded defaults.
/// Template names are normalised to lowercase and relative paths.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        let tera = build_tera(user_template_dir)?;
        Ok(TemplateEngine { tera })
    }

    /// Render one entry template. CRLF line endings from user templates are
    /// normalised to LF so output is byte-identical across platforms.
    pub fn render(&self, kind: TemplateKind, ctx: &tera::Context) -> Result<String, RenderError> {
        let template = kind.template_name();
        let rendered = self
            .tera
            .render(template, ctx)
            .map_err(|source| RenderError::Render { template, source })?;
        Ok(rendered.replace("\r\n", "\n"))
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Typed front door over [`TemplateEngine`]. Create once and reuse.
pub struct Renderer {
    engine: TemplateEngine,
}

impl Renderer {
    /// Construct a new [`Renderer`] with embedded templates only.
    pub fn new() -> Result<Self, RenderError> {
        Ok(Renderer { engine: TemplateEngine::new(None)? })
    }

    /// Construct a [`Renderer`] whose templates may be overridden from `dir`.
    pub fn with_overrides(dir: &Path) -> Result<Self, RenderError> {
        Ok(Renderer { engine: TemplateEngine::new(Some(dir))? })
    }

    /// Render the shell build script. Pure: same context, same bytes.
    pub fn render_script(&self, ctx: &ScriptContext) -> Result<String, RenderError> {
        self.engine.render(TemplateKind::BuildScript, &ctx.to_tera_context()?)
    }

    /// Render the README seeded into freshly created repositories.
    pub fn render_readme(&self, ctx: &ReadmeContext) -> Result<String, RenderError> {
        self.engine.render(TemplateKind::Readme, &ctx.to_tera_context()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ScriptOptions;
    use chrono::Utc;
    use treeforge_core::types::{DeviceConfig, DeviceId, RepoCategory, RepoName, RepositoryRecord};

    fn device() -> DeviceConfig {
        let now = Utc::now();
        DeviceConfig {
            id: DeviceId::from("daisy"),
            name: "Xiaomi Mi A2 Lite".to_string(),
            codename: "daisy".to_string(),
            manufacturer: "Xiaomi".to_string(),
            platform: "msm8953".to_string(),
            android_version: "16".to_string(),
            lineage_version: "lineage-23.0".to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn record(name: &str, path: &str) -> RepositoryRecord {
        RepositoryRecord {
            name: RepoName::from(name),
            url: format!("https://github.com/Gtajisan/{name}"),
            branch: "16".to_string(),
            path: path.to_string(),
            depth: 1,
            category: RepoCategory::Device,
            status: "pending".to_string(),
        }
    }

    #[test]
    fn renderer_new_succeeds() {
        Renderer::new().expect("Renderer::new should succeed with embedded templates");
    }

    #[test]
    fn every_kind_has_an_embedded_template() {
        for kind in TemplateKind::all() {
            assert!(
                TPLS.iter().any(|(name, _)| *name == kind.template_name()),
                "no embedded template for {:?}",
                kind
            );
        }
    }

    #[test]
    fn script_without_repositories_keeps_section_layout() {
        let renderer = Renderer::new().unwrap();
        let ctx = ScriptContext::new(&device(), &[], &ScriptOptions::default(), "Gtajisan");
        let script = renderer.render_script(&ctx).unwrap();
        assert!(script.starts_with("# manifest is from https://github.com/NeedAlt-Room\n\n\n# NOTE:\n"));
        assert!(!script.contains("--branch 16"));
    }

    #[test]
    fn script_is_deterministic() {
        let renderer = Renderer::new().unwrap();
        let records = vec![
            record("android_device_xiaomi_daisy", "device/xiaomi/daisy"),
            record("proprietary_vendor_xiaomi_daisy", "vendor/xiaomi/daisy"),
        ];
        let ctx = ScriptContext::new(&device(), &records, &ScriptOptions::default(), "Gtajisan");
        let first = renderer.render_script(&ctx).unwrap();
        let second = renderer.render_script(&ctx).unwrap();
        assert_eq!(first, second);
        assert!(!first.contains('\r'));
    }

    #[test]
    fn readme_mentions_clone_command() {
        let renderer = Renderer::new().unwrap();
        let rec = record("android_device_xiaomi_daisy", "device/xiaomi/daisy");
        let ctx = ReadmeContext::new(&device(), &rec, "Device tree for daisy", "Gtajisan");
        let readme = renderer.render_readme(&ctx).unwrap();
        assert!(readme.starts_with("# android_device_xiaomi_daisy\n"));
        assert!(readme.contains(
            "git clone --depth=1 --branch 16 https://github.com/Gtajisan/android_device_xiaomi_daisy device/xiaomi/daisy"
        ));
        assert!(readme.contains("LineageOS 23.0"));
        assert!(readme.contains("lunch lineage_daisy-ap2a-userdebug"));
    }

    #[test]
    fn broken_override_names_the_template() {
        let dir = tempfile::TempDir::new().unwrap();
        let readme = dir.path().join("readme");
        std::fs::create_dir_all(&readme).unwrap();
        std::fs::write(readme.join("readme.md.tera"), "{{ no_such_field }}\n").unwrap();

        let renderer = Renderer::with_overrides(dir.path()).unwrap();
        let rec = record("android_device_xiaomi_daisy", "device/xiaomi/daisy");
        let ctx = ReadmeContext::new(&device(), &rec, "d", "Gtajisan");
        match renderer.render_readme(&ctx) {
            Err(RenderError::Render { template, .. }) => {
                assert_eq!(template, "readme/readme.md.tera")
            }
            other => panic!("expected render error, got {other:?}"),
        }
    }

    #[test]
    fn unparsable_override_fails_to_load() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.tera"), "{% if %}").unwrap();
        assert!(matches!(
            Renderer::with_overrides(dir.path()),
            Err(RenderError::Load(_))
        ));
    }

    #[test]
    fn user_override_replaces_partial() {
        let dir = tempfile::TempDir::new().unwrap();
        let shared = dir.path().join("shared");
        std::fs::create_dir_all(&shared).unwrap();
        std::fs::write(shared.join("_recovery.tera"), "# custom recovery\r\n").unwrap();

        let renderer = Renderer::with_overrides(dir.path()).unwrap();
        let ctx = ScriptContext::new(&device(), &[], &ScriptOptions::default(), "Gtajisan");
        let script = renderer.render_script(&ctx).unwrap();
        assert!(script.ends_with("# custom recovery\n"));
        assert!(!script.contains("bootable/recovery"));
    }
}
