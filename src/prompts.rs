//! Prompts for VLM-based document field extraction.
//!
//! The field list is generated from [`crate::schema::FIELDS`], so adding a
//! field to the schema automatically asks the model for it.
//!
//! Callers can override the default via
//! [`crate::config::ServiceConfig::extraction_prompt`]; the text built here is
//! used only when no override is provided.

use crate::schema::FIELDS;
use once_cell::sync::Lazy;

const PREAMBLE: &str = r#"You are an expert in extracting structured data from images of documents. Your task is to extract the following information from the provided image and return it as a JSON object. Ensure the output is valid JSON, even if some values are unknown.

If a particular field cannot be reliably extracted from the image, set its value to null. DO NOT include any preamble, explanation, or other text outside of the JSON structure. The output MUST be a single, valid JSON object.

Here are the fields to extract:
"#;

const CLOSING: &str =
    "Ensure that every field listed above is present in the output JSON, even if the value is null.";

static EXTRACTION_PROMPT: Lazy<String> = Lazy::new(|| {
    let fields: Vec<String> = FIELDS
        .iter()
        .map(|f| format!("* `{}`: {}", f.name, f.description))
        .collect();
    format!("{}\n{}\n\n{}\n", PREAMBLE, fields.join("\n"), CLOSING)
});

/// Default instruction sent alongside every uploaded document image.
pub fn extraction_prompt() -> &'static str {
    &EXTRACTION_PROMPT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field_names;

    #[test]
    fn prompt_lists_every_schema_field() {
        let prompt = extraction_prompt();
        for name in field_names() {
            assert!(prompt.contains(&format!("`{name}`")), "missing {name}");
        }
    }

    #[test]
    fn prompt_demands_bare_json_with_nulls() {
        let prompt = extraction_prompt();
        assert!(prompt.contains("single, valid JSON object"));
        assert!(prompt.contains("set its value to null"));
        assert!(prompt.trim_end().ends_with("even if the value is null."));
    }
}
