//! Minijinja rendering for alert subjects and bodies.
//!
//! Any `Serialize` value can be the context; the supervisor passes its
//! health report directly. Extra filters:
//! - `bullets`: a list of strings as `- item` lines
//! - `plural(noun)`: `3 | plural("alert")` renders `3 alerts`

use minijinja::Environment;
use serde::Serialize;

use crate::traits::NotifyError;

#[derive(Debug)]
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_filter("bullets", bullets);
        env.add_filter("plural", plural);
        Self { env }
    }

    pub fn render<S: Serialize + ?Sized>(&self, template: &str, ctx: &S) -> Result<String, NotifyError> {
        self.env
            .render_str(template, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn bullets(items: Vec<String>) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn plural(count: usize, noun: String) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> serde_json::Value {
        json!({
            "alerts": ["No successful daily-filings run on record", "High failure rate for analyst-data: 7/10 recent runs failed"],
            "actions": [],
            "stuck_jobs_fixed": 1,
        })
    }

    #[test]
    fn bullets_one_line_per_item() {
        let out = TemplateRenderer::new().render("{{ alerts | bullets }}", &ctx()).unwrap();
        assert_eq!(
            out,
            "- No successful daily-filings run on record\n- High failure rate for analyst-data: 7/10 recent runs failed"
        );
    }

    #[test]
    fn plural_counts() {
        let r = TemplateRenderer::new();
        assert_eq!(r.render("{{ alerts | length | plural('alert') }}", &ctx()).unwrap(), "2 alerts");
        assert_eq!(r.render("{{ stuck_jobs_fixed | plural('run') }}", &ctx()).unwrap(), "1 run");
        assert_eq!(r.render("{{ actions | length | plural('action') }}", &ctx()).unwrap(), "0 actions");
    }

    #[test]
    fn broken_templates_are_template_errors() {
        match TemplateRenderer::new().render("{{ alerts | bullets", &ctx()) {
            Err(NotifyError::Template(msg)) => assert!(!msg.is_empty()),
            other => panic!("expected Template error, got {other:?}"),
        }
    }
}
