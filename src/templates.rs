use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A stored signature template. Block content is an opaque structured payload
/// owned by the template editor; the renderer is the only consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureTemplate {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    /// Fallback template when no rule matches
    #[serde(default)]
    pub is_default: bool,
    pub blocks: serde_json::Value,
}

/// Organization-scoped template reads. Lookups outside the caller's
/// organization come back empty.
pub trait TemplateStore: Send + Sync {
    fn get_template(&self, template_id: &str, org_id: &str) -> Option<SignatureTemplate>;
    fn default_template(&self, org_id: &str) -> Option<SignatureTemplate>;
}

pub struct InMemoryTemplateStore {
    templates: Vec<SignatureTemplate>,
}

impl InMemoryTemplateStore {
    pub fn new(templates: Vec<SignatureTemplate>) -> Self {
        InMemoryTemplateStore { templates }
    }
}

impl TemplateStore for InMemoryTemplateStore {
    fn get_template(&self, template_id: &str, org_id: &str) -> Option<SignatureTemplate> {
        self.templates
            .iter()
            .find(|t| t.id == template_id && t.organization_id == org_id)
            .cloned()
    }

    fn default_template(&self, org_id: &str) -> Option<SignatureTemplate> {
        self.templates
            .iter()
            .find(|t| t.organization_id == org_id && t.is_default)
            .cloned()
    }
}

/// Per-target data interpolated into a template
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub display_name: String,
    pub email: String,
    pub attributes: HashMap<String, String>,
}

pub trait SignatureRenderer: Send + Sync {
    fn render(&self, template: &SignatureTemplate, context: &RenderContext)
        -> anyhow::Result<String>;
}

/// Minimal renderer: joins text blocks and substitutes `{{placeholder}}`
/// tokens from the render context. Enough for tests and the demo run; the
/// production renderer lives with the template editor.
pub struct PlaceholderRenderer;

impl SignatureRenderer for PlaceholderRenderer {
    fn render(
        &self,
        template: &SignatureTemplate,
        context: &RenderContext,
    ) -> anyhow::Result<String> {
        let blocks = template
            .blocks
            .as_array()
            .with_context(|| format!("template {} blocks must be an array", template.id))?;

        let mut lines = Vec::with_capacity(blocks.len());
        for block in blocks {
            let content = block
                .get("content")
                .and_then(|v| v.as_str())
                .with_context(|| format!("template {} has a block without content", template.id))?;
            lines.push(interpolate(content, context));
        }
        Ok(format!(
            "<div class=\"signature\">{}</div>",
            lines.join("<br/>")
        ))
    }
}

fn interpolate(text: &str, context: &RenderContext) -> String {
    let mut out = text.replace("{{display_name}}", &context.display_name);
    out = out.replace("{{email}}", &context.email);
    for (key, value) in &context.attributes {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template(blocks: serde_json::Value) -> SignatureTemplate {
        SignatureTemplate {
            id: "tpl-1".to_string(),
            organization_id: "org-1".to_string(),
            name: "Standard".to_string(),
            is_default: false,
            blocks,
        }
    }

    #[test]
    fn test_placeholder_interpolation() {
        let tpl = template(json!([
            { "kind": "text", "content": "{{display_name}}" },
            { "kind": "text", "content": "{{email}} | {{phone}}" },
        ]));
        let ctx = RenderContext {
            display_name: "Alice Doe".to_string(),
            email: "alice@acme.com".to_string(),
            attributes: HashMap::from([("phone".to_string(), "+1 555 0100".to_string())]),
        };

        let html = PlaceholderRenderer.render(&tpl, &ctx).unwrap();
        assert_eq!(
            html,
            "<div class=\"signature\">Alice Doe<br/>alice@acme.com | +1 555 0100</div>"
        );
    }

    #[test]
    fn test_render_rejects_malformed_blocks() {
        let tpl = template(json!({ "not": "an array" }));
        assert!(PlaceholderRenderer
            .render(&tpl, &RenderContext::default())
            .is_err());
    }

    #[test]
    fn test_default_template_lookup_is_org_scoped() {
        let mut default_tpl = template(json!([]));
        default_tpl.id = "tpl-default".to_string();
        default_tpl.is_default = true;
        let store = InMemoryTemplateStore::new(vec![template(json!([])), default_tpl]);

        assert_eq!(
            store.default_template("org-1").map(|t| t.id),
            Some("tpl-default".to_string())
        );
        assert!(store.default_template("org-2").is_none());
        assert!(store.get_template("tpl-1", "org-2").is_none());
    }
}
