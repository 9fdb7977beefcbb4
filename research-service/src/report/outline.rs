use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Rendered in place of a section that has no subsections
pub const NO_SUBSECTIONS_PLACEHOLDER: &str = "(no subsections)";
/// Rendered in place of a subsection with no description
pub const NO_DESCRIPTION_PLACEHOLDER: &str = "No description provided.";

/// The report's table of contents, produced once by the outline transition
/// and immutable thereafter.
///
/// `sections` carries document order. A section missing from `subsections`
/// or `descriptions` is well-formed and simply has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Outline {
    pub sections: Vec<String>,
    #[serde(default)]
    pub subsections: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub descriptions: HashMap<String, HashMap<String, String>>,
}

impl Outline {
    /// The slice of this outline relevant to a single section, serialized for
    /// the per-section writer prompt.
    pub fn section_view(&self, section: &str) -> Value {
        let subsections = self
            .subsections
            .get(section)
            .cloned()
            .unwrap_or_default();
        let descriptions = self
            .descriptions
            .get(section)
            .cloned()
            .unwrap_or_default();

        json!({
            "section": section,
            "subsections": subsections,
            "descriptions": descriptions,
        })
    }
}

/// Render an outline for display.
///
/// Total over any well-formed outline: one heading line per section in
/// `sections` order, placeholders where subsections or descriptions are
/// absent.
pub fn render_outline(outline: &Outline) -> String {
    let mut rendered = String::new();

    for section in &outline.sections {
        rendered.push_str(&format!("## {}\n", section));

        match outline.subsections.get(section) {
            Some(subsections) if !subsections.is_empty() => {
                for subsection in subsections {
                    let description = outline
                        .descriptions
                        .get(section)
                        .and_then(|by_subsection| by_subsection.get(subsection))
                        .map(String::as_str)
                        .unwrap_or(NO_DESCRIPTION_PLACEHOLDER);
                    rendered.push_str(&format!("- {}: {}\n", subsection, description));
                }
            }
            _ => {
                rendered.push_str(&format!("- {}\n", NO_SUBSECTIONS_PLACEHOLDER));
            }
        }
    }

    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_outline() -> Outline {
        let mut subsections = HashMap::new();
        subsections.insert(
            "Introduction".to_string(),
            vec!["Background".to_string(), "Objectives".to_string()],
        );

        let mut intro_descriptions = HashMap::new();
        intro_descriptions.insert(
            "Background".to_string(),
            "Contextualizes the research question".to_string(),
        );

        let mut descriptions = HashMap::new();
        descriptions.insert("Introduction".to_string(), intro_descriptions);

        Outline {
            sections: vec![
                "Introduction".to_string(),
                "Methods".to_string(),
                "Conclusion".to_string(),
            ],
            subsections,
            descriptions,
        }
    }

    #[test]
    fn renders_one_heading_per_section_in_order() {
        let rendered = render_outline(&sample_outline());
        let headings: Vec<&str> = rendered
            .lines()
            .filter(|line| line.starts_with("## "))
            .collect();
        assert_eq!(
            headings,
            vec!["## Introduction", "## Methods", "## Conclusion"]
        );
    }

    #[test]
    fn missing_subsections_get_placeholder() {
        let rendered = render_outline(&sample_outline());
        // Methods and Conclusion have no subsections entry at all
        assert_eq!(
            rendered
                .lines()
                .filter(|line| line.contains(NO_SUBSECTIONS_PLACEHOLDER))
                .count(),
            2
        );
    }

    #[test]
    fn missing_description_gets_placeholder() {
        let rendered = render_outline(&sample_outline());
        assert!(rendered.contains("- Background: Contextualizes the research question"));
        assert!(rendered.contains(&format!("- Objectives: {}", NO_DESCRIPTION_PLACEHOLDER)));
    }

    #[test]
    fn empty_outline_renders_to_empty_string() {
        assert_eq!(render_outline(&Outline::default()), "");
    }

    #[test]
    fn empty_subsection_list_is_treated_as_missing() {
        let outline = Outline {
            sections: vec!["Results".to_string()],
            subsections: HashMap::from([("Results".to_string(), Vec::new())]),
            descriptions: HashMap::new(),
        };
        let rendered = render_outline(&outline);
        assert!(rendered.contains(NO_SUBSECTIONS_PLACEHOLDER));
    }

    #[test]
    fn section_view_is_scoped_to_one_section() {
        let outline = sample_outline();
        let view = outline.section_view("Introduction");
        assert_eq!(view["section"], "Introduction");
        assert_eq!(view["subsections"][0], "Background");
        assert_eq!(
            view["descriptions"]["Background"],
            "Contextualizes the research question"
        );

        let sparse = outline.section_view("Methods");
        assert_eq!(sparse["subsections"].as_array().unwrap().len(), 0);
    }
}
