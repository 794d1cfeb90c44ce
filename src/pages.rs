use crate::error::{PlotError, PlotResult};
use handlebars::Handlebars;
use serde::Serialize;

const PARTIALS: [(&str, &str); 2] = [
    ("header", include_str!("../templates/header.hbs")),
    ("footer", include_str!("../templates/footer.hbs")),
];

const TEMPLATES: [(&str, &str); 9] = [
    ("index", include_str!("../templates/index.hbs")),
    ("about", include_str!("../templates/about.hbs")),
    ("contact", include_str!("../templates/contact.hbs")),
    ("login", include_str!("../templates/login.hbs")),
    ("signup", include_str!("../templates/signup.hbs")),
    ("data", include_str!("../templates/data.hbs")),
    ("describe", include_str!("../templates/describe.hbs")),
    ("chart", include_str!("../templates/chart.hbs")),
    ("export", include_str!("../templates/export.hbs")),
];

/// HTML templates compiled into the binary
pub struct Pages {
    registry: Handlebars<'static>,
}

impl Pages {
    pub fn new() -> PlotResult<Self> {
        let mut registry = Handlebars::new();
        for (name, source) in PARTIALS {
            registry
                .register_partial(name, source)
                .map_err(|e| PlotError::Template(e.to_string()))?;
        }
        for (name, source) in TEMPLATES {
            registry
                .register_template_string(name, source)
                .map_err(|e| PlotError::Template(e.to_string()))?;
        }
        Ok(Pages { registry })
    }

    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> PlotResult<String> {
        self.registry
            .render(name, data)
            .map_err(|e| PlotError::Template(e.to_string()))
    }
}

/// Serialize `value` for embedding inside a `<script>` element.
pub fn script_json<T: Serialize>(value: &T) -> PlotResult<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_template_renders() {
        let pages = Pages::new().unwrap();
        for (name, _) in TEMPLATES {
            let html = pages.render(name, &json!({ "title": "T" })).unwrap();
            assert!(html.contains("<html"), "{} is not a full page", name);
        }
    }

    #[test]
    fn text_is_escaped() {
        let pages = Pages::new().unwrap();
        let html = pages
            .render("index", &json!({ "title": "T", "notice": "<b>hi</b>" }))
            .unwrap();
        assert!(html.contains("&lt;b&gt;hi&lt;/b&gt;"));
    }

    #[test]
    fn script_payload_cannot_close_the_element() {
        let json = script_json(&vec!["</script><script>alert(1)"]).unwrap();
        assert!(!json.contains("</script>"));
        let back: Vec<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[0], "</script><script>alert(1)");
    }
}
