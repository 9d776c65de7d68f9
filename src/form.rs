//! The user-facing form: parsing submitted fields into a render request and
//! writing the single HTML page.

use crate::export;
use crate::render::COLOR_DIRECTION;
use crate::types::{ColorScale, RegionSet, RenderRequest, SavedEntry, ValueMap};
use anyhow::{anyhow, Context, Result};
use std::fmt::Write;
use strum::IntoEnumIterator;
use tracing::debug;

/// Form field prefix for per-region values, e.g. `value:Kerala`.
pub const VALUE_PREFIX: &str = "value:";

/// Builds a request from submitted form fields.
///
/// Region fields not submitted read as 0 and fields for unknown regions are
/// ignored. Title, unit and color scale fall back to `current` when absent.
pub fn parse_form(
    regions: &RegionSet,
    fields: &[(String, String)],
    current: &RenderRequest,
) -> Result<RenderRequest> {
    let mut request = RenderRequest {
        title: current.title.clone(),
        unit: current.unit.clone(),
        color_scale: current.color_scale,
        values: ValueMap::seeded(regions),
    };

    for (key, raw) in fields {
        match key.as_str() {
            "title" => request.title = raw.clone(),
            "unit" => request.unit = raw.clone(),
            "color_scale" => {
                request.color_scale = raw
                    .parse::<ColorScale>()
                    .map_err(|_| anyhow!("Unknown color scale '{}'", raw))?;
            }
            _ => {
                let Some(name) = key.strip_prefix(VALUE_PREFIX) else {
                    continue;
                };
                let raw = raw.trim();
                let value: u64 = if raw.is_empty() {
                    0
                } else {
                    raw.parse()
                        .with_context(|| format!("'{}' is not a non-negative integer for {}", raw, name))?
                };
                if !request.values.set(name, value) {
                    debug!(region = name, "Ignoring value for unknown region");
                }
            }
        }
    }

    Ok(request)
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

const STYLE: &str = r#"
body { margin: 0; font-family: Inter, "Segoe UI", sans-serif; background: #F9FAFB; color: #111827; }
header { display: flex; justify-content: space-between; align-items: center; background: #111827; color: #F9FAFB; padding: 1rem 2rem; }
header .by { color: #9CA3AF; font-size: 0.9rem; }
.layout { display: flex; }
aside { width: 20rem; background: #1F2937; color: #F3F4F6; padding: 1rem 1.5rem; min-height: 100vh; }
aside label { display: block; margin: 0.6rem 0 0.2rem; font-size: 0.9rem; }
aside input, aside select { width: 100%; box-sizing: border-box; background: #111827; color: #F9FAFB; border: 1px solid #374151; border-radius: 8px; padding: 0.35rem 0.5rem; }
main { flex: 1; padding: 2rem 3rem; }
button, .download { display: inline-block; border: none; border-radius: 6px; padding: 0.5rem 1rem; color: white; text-decoration: none; cursor: pointer; margin: 0.3rem 0.3rem 0.3rem 0; }
button.update { background: #4F46E5; }
button.save { background: #0EA5E9; }
.download { background: #22C55E; }
.notice { background: #DCFCE7; border-radius: 6px; padding: 0.6rem 1rem; }
.info { background: #DBEAFE; border-radius: 6px; padding: 0.6rem 1rem; }
img.preview { max-width: 100%; border: 1px solid #E5E7EB; }
pre { background: #F3F4F6; padding: 0.8rem; border-radius: 6px; }
"#;

/// The whole page for one session.
pub fn render_page(regions: &RegionSet, current: &RenderRequest, saved: &[SavedEntry], just_saved: bool) -> String {
    let mut html = String::new();

    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><title>Thematic India Map</title><style>{}</style></head><body>",
        STYLE
    );
    html.push_str("<header><div><strong>Thematic India Map</strong></div><div class=\"by\">Choropleth maker</div></header>");
    html.push_str("<div class=\"layout\">");

    html.push_str("<aside><form method=\"post\" action=\"/update\"><h3>State Data Input</h3>");
    for name in regions.names() {
        let value = current.values.get(name).unwrap_or(0);
        let _ = write!(
            html,
            "<label>{0}<input type=\"number\" name=\"{1}{0}\" min=\"0\" step=\"1\" value=\"{2}\"></label>",
            escape(name),
            VALUE_PREFIX,
            value
        );
    }

    html.push_str("<hr>");
    let _ = write!(
        html,
        "<label>Map Title<input type=\"text\" name=\"title\" value=\"{}\"></label>",
        escape(&current.title)
    );
    let _ = write!(
        html,
        "<label>Data Unit<input type=\"text\" name=\"unit\" value=\"{}\"></label>",
        escape(&current.unit)
    );
    html.push_str("<label>Color Scheme<select name=\"color_scale\">");
    for scale in ColorScale::iter() {
        let selected = if scale == current.color_scale { " selected" } else { "" };
        let _ = write!(html, "<option value=\"{0}\"{1}>{0}</option>", scale, selected);
    }
    html.push_str("</select></label>");
    html.push_str("<p><button class=\"update\" type=\"submit\">Update map</button>");
    html.push_str("<button class=\"save\" type=\"submit\" formaction=\"/save\">Save this map</button></p>");
    html.push_str("</form>");
    html.push_str("<form method=\"post\" action=\"/session/end\"><button class=\"update\" type=\"submit\">End session</button></form>");
    html.push_str("</aside>");

    html.push_str("<main><h3>Map Preview</h3>");
    let _ = write!(
        html,
        "<img class=\"preview\" src=\"/map.png\" alt=\"{}\"><p><small>{}</small></p>",
        escape(&current.title),
        escape(COLOR_DIRECTION)
    );
    let _ = write!(
        html,
        "<a class=\"download\" href=\"/download\" download=\"{0}\">Download Map as PNG</a>",
        escape(&export::export_filename(&current.title))
    );
    if just_saved {
        html.push_str("<p class=\"notice\">Map saved to session memory!</p>");
    }

    html.push_str("<h3>Saved Maps This Session</h3>");
    if saved.is_empty() {
        html.push_str("<p class=\"info\">You haven't saved any maps yet.</p>");
    }
    for entry in saved {
        let values = serde_json::to_string_pretty(entry.values()).unwrap_or_default();
        let _ = write!(
            html,
            "<details><summary>{}. {} ({})</summary><p>Color scale: {}</p><pre>{}</pre></details>",
            entry.position(),
            escape(entry.title()),
            escape(entry.unit()),
            entry.color_scale(),
            escape(&values)
        );
    }
    html.push_str("</main></div></body></html>");

    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DefaultsConfig;
    use crate::session::Session;
    use crate::types::tests::two_squares;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn current() -> RenderRequest {
        Session::new(&two_squares(), &DefaultsConfig::default()).current().clone()
    }

    #[test]
    fn parses_full_submission() {
        let regions = two_squares();
        let req = parse_form(
            &regions,
            &fields(&[
                ("value:Kerala", "12"),
                ("value:Tamil Nadu", " 40 "),
                ("title", "Literacy"),
                ("unit", "%"),
                ("color_scale", "oranges"),
            ]),
            &current(),
        )
        .unwrap();
        assert_eq!(req.title, "Literacy");
        assert_eq!(req.unit, "%");
        assert_eq!(req.color_scale, ColorScale::Oranges);
        assert_eq!(req.values.get("Kerala"), Some(12));
        assert_eq!(req.values.get("Tamil Nadu"), Some(40));
    }

    #[test]
    fn missing_fields_default_and_unknown_regions_are_ignored() {
        let regions = two_squares();
        let req = parse_form(&regions, &fields(&[("value:Atlantis", "5"), ("value:Kerala", "")]), &current()).unwrap();
        assert_eq!(req.title, "India Thematic Map");
        assert_eq!(req.values.len(), 2);
        assert_eq!(req.values.get("Kerala"), Some(0));
        assert_eq!(req.values.get("Tamil Nadu"), Some(0));
    }

    #[test]
    fn rejects_malformed_numbers_and_scales() {
        let regions = two_squares();
        assert!(parse_form(&regions, &fields(&[("value:Kerala", "-1")]), &current()).is_err());
        assert!(parse_form(&regions, &fields(&[("value:Kerala", "2.5")]), &current()).is_err());
        assert!(parse_form(&regions, &fields(&[("color_scale", "Viridis")]), &current()).is_err());
    }

    #[test]
    fn title_and_unit_keep_surrounding_spaces() {
        let regions = two_squares();
        let req = parse_form(&regions, &fields(&[("title", " My Map "), ("unit", " mm ")]), &current()).unwrap();
        assert_eq!(req.title, " My Map ");
        assert_eq!(req.unit, " mm ");
        assert_eq!(export::export_filename(&req.title), "_My_Map_.png");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<a href='x'>&\"</a>"), "&lt;a href=&#39;x&#39;&gt;&amp;&quot;&lt;/a&gt;");
    }

    #[test]
    fn page_lists_every_region_and_saved_map() {
        let regions = two_squares();
        let mut session = Session::new(&regions, &DefaultsConfig::default());
        let empty = render_page(&regions, session.current(), session.saved(), false);
        assert!(empty.contains("name=\"value:Kerala\""));
        assert!(empty.contains("name=\"value:Tamil Nadu\""));
        assert!(empty.contains("You haven't saved any maps yet."));
        assert!(empty.contains("<option value=\"Blues\" selected>"));

        let mut req = session.current().clone();
        req.title = "A <b> title".to_string();
        session.update(req);
        session.save();
        let page = render_page(&regions, session.current(), session.saved(), true);
        assert!(page.contains("Map saved to session memory!"));
        assert!(page.contains("<summary>1. A &lt;b&gt; title (e.g., Literacy Rate (%))</summary>"));
        assert!(page.contains("&quot;Kerala&quot;: 0"));
        assert!(!page.contains("You haven't saved any maps yet."));
    }
}
