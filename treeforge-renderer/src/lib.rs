//! # treeforge-renderer
//!
//! Tera-based assembly of device build scripts and repository READMEs from
//! manifest records. Rendering is pure: no I/O beyond loading optional user
//! template overrides at construction time.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use treeforge_renderer::{assemble_build_script, Renderer, ScriptOptions};
//! use treeforge_core::DeviceManifest;
//!
//! fn print_script(m: &DeviceManifest) {
//!     if let Ok(renderer) = Renderer::new() {
//!         let options = ScriptOptions::default();
//!         if let Ok(script) =
//!             assemble_build_script(&renderer, &m.device, &m.repositories, &options, "owner")
//!         {
//!             println!("{}", script.content);
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod script;

pub use context::{ReadmeContext, ScriptContext, ScriptOptions};
pub use engine::{Renderer, TemplateEngine, TemplateKind};
pub use error::RenderError;
pub use script::{assemble_build_script, script_name};
