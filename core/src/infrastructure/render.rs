//! Template rendering seam.
//!
//! Rules hand a template name, a destination and a JSON context to a
//! `Renderer`. `TeraRenderer` renders Jinja-style templates from a directory;
//! `RecordingRenderer` is the test double.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tera::{Context, Tera};
use tracing::debug;

use crate::error::RenderError;

pub trait Renderer {
    /// Render `template` with `context` and write the result to `target`,
    /// creating parent directories as needed.
    fn render(&self, template: &str, target: &Path, context: &Value) -> Result<(), RenderError>;
}

fn write_output(target: &Path, contents: &[u8]) -> Result<(), RenderError> {
    let write_err = |source| RenderError::Write {
        path: target.to_path_buf(),
        source,
    };
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(target, contents).map_err(write_err)
}

/// Renders templates loaded from a directory tree. Template names are paths
/// relative to that directory, e.g. `addons/kubedns-svc.yaml`.
pub struct TeraRenderer {
    tera: Tera,
    templates_dir: PathBuf,
}

impl TeraRenderer {
    pub fn new(templates_dir: &Path) -> Result<Self, RenderError> {
        let glob = format!("{}/**/*", templates_dir.display());
        let tera = Tera::new(&glob).map_err(|e| RenderError::Load {
            dir: templates_dir.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(
            dir = %templates_dir.display(),
            count = tera.get_template_names().count(),
            "loaded templates"
        );
        Ok(TeraRenderer {
            tera,
            templates_dir: templates_dir.to_path_buf(),
        })
    }

    /// Build a renderer from in-memory `(name, source)` pairs.
    pub fn from_raw(templates: &[(&str, &str)]) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(templates.to_vec())
            .map_err(|e| RenderError::Load {
                dir: PathBuf::from("(raw)"),
                message: e.to_string(),
            })?;
        Ok(TeraRenderer {
            tera,
            templates_dir: PathBuf::from("(raw)"),
        })
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }
}

impl Renderer for TeraRenderer {
    fn render(&self, template: &str, target: &Path, context: &Value) -> Result<(), RenderError> {
        let template_err = |message: String| RenderError::Template {
            template: template.to_string(),
            message,
        };
        let ctx = Context::from_serialize(context).map_err(|e| template_err(e.to_string()))?;
        let rendered = self.tera.render(template, &ctx).map_err(|e| {
            // Tera nests the useful message one level down.
            let detail = std::error::Error::source(&e)
                .map(|s| format!("{}: {}", e, s))
                .unwrap_or_else(|| e.to_string());
            template_err(detail)
        })?;
        debug!(template, target = %target.display(), "rendered");
        write_output(target, rendered.as_bytes())
    }
}

/// One call recorded by `RecordingRenderer`.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub template: String,
    pub target: PathBuf,
    pub context: Value,
}

/// Records every render call and writes the JSON context to the target so
/// later steps find a file on disk.
#[derive(Default)]
pub struct RecordingRenderer {
    rendered: RefCell<Vec<Rendered>>,
    failing: RefCell<HashSet<String>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make renders of `template` fail.
    pub fn fail(&self, template: &str) {
        self.failing.borrow_mut().insert(template.to_string());
    }

    pub fn rendered(&self) -> Vec<Rendered> {
        self.rendered.borrow().clone()
    }

    pub fn templates(&self) -> Vec<String> {
        self.rendered
            .borrow()
            .iter()
            .map(|r| r.template.clone())
            .collect()
    }

    /// The most recent render of `template`.
    pub fn last(&self, template: &str) -> Option<Rendered> {
        self.rendered
            .borrow()
            .iter()
            .rev()
            .find(|r| r.template == template)
            .cloned()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, template: &str, target: &Path, context: &Value) -> Result<(), RenderError> {
        if self.failing.borrow().contains(template) {
            return Err(RenderError::Template {
                template: template.to_string(),
                message: "scripted failure".into(),
            });
        }
        let body = serde_json::to_vec_pretty(context).unwrap_or_default();
        write_output(target, &body)?;
        self.rendered.borrow_mut().push(Rendered {
            template: template.to_string(),
            target: target.to_path_buf(),
            context: context.clone(),
        });
        Ok(())
    }
}
