use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template '{0}' not found")]
    UnknownTemplate(String),
}

/// Output of a template fill: the rendered text plus the placeholders that no
/// variable covered. Missing variables are a warning, not an error; partially
/// filled documents are often completed by hand.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub text: String,
    pub missing: Vec<String>,
}

/// Named document templates with `{key}` placeholders.
pub struct TemplateLibrary {
    templates: HashMap<String, String>,
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateLibrary {
    /// A library preloaded with the standard county forms.
    pub fn new() -> Self {
        let mut templates = HashMap::new();
        templates.insert("court_summons".to_string(), COURT_SUMMONS.to_string());
        templates.insert("public_notice".to_string(), PUBLIC_NOTICE.to_string());
        templates.insert("foia_response".to_string(), FOIA_RESPONSE.to_string());
        Self { templates }
    }

    pub fn register(&mut self, name: &str, template: &str) {
        self.templates.insert(name.to_string(), template.to_string());
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Substitute every `{key}` with its value. Unresolved placeholders stay
    /// literal and come back in `missing`.
    pub fn fill(
        &self,
        name: &str,
        variables: &HashMap<String, String>,
    ) -> Result<GeneratedDocument, TemplateError> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))?;

        let mut text = template.clone();
        for (key, value) in variables {
            text = text.replace(&format!("{{{key}}}"), value);
        }

        let missing = placeholders(&text);
        if !missing.is_empty() {
            warn!(template = name, missing = ?missing, "template filled with missing variables");
        }
        Ok(GeneratedDocument { text, missing })
    }
}

/// Collect the distinct `{identifier}` placeholders left in a string, in
/// order of first appearance.
fn placeholders(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    for (start, c) in text.char_indices() {
        if c != '{' {
            continue;
        }
        let rest = &text[start + 1..];
        if let Some(end) = rest.find('}') {
            let name = &rest[..end];
            if !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !found.iter().any(|f| f == name)
            {
                found.push(name.to_string());
            }
        }
    }
    found
}

const COURT_SUMMONS: &str = "\
COURT SUMMONS

THE STATE OF TEXAS
COUNTY OF {county}

TO: {defendant_name}
ADDRESS: {defendant_address}

YOU ARE HEREBY COMMANDED to appear before the {court_name} Court of {county} County, Texas,
at {court_address}, on {appearance_date} at {appearance_time}.

CASE NUMBER: {case_number}
PLAINTIFF: {plaintiff_name}
DEFENDANT: {defendant_name}

NATURE OF SUIT: {suit_description}

You are further notified that if you fail to appear as commanded, a default judgment may be
entered against you granting the relief demanded in the petition.

ISSUED this {issue_date}.

_____________________
CLERK OF COURT
{county} County, Texas

By: _____________________
    Deputy Clerk
";

const PUBLIC_NOTICE: &str = "\
PUBLIC NOTICE

{county} COUNTY, TEXAS

NOTICE OF {notice_type}

Date: {date}
Time: {time}
Location: {location}

The {department} of {county} County hereby provides notice of {notice_subject}.

DETAILS:
{notice_details}

PUBLIC PARTICIPATION:
{participation_info}

For more information, contact:
{contact_name}
{contact_title}
{contact_phone}
{contact_email}

This notice is posted in accordance with Texas Local Government Code Chapter {code_reference}.

Posted: {post_date}
";

const FOIA_RESPONSE: &str = "\
{department}
{county} County, Texas
{department_address}

{date}

{requestor_name}
{requestor_address}

RE: Public Information Request #{request_number}

Dear {requestor_name}:

This letter is in response to your request for public information received on {request_date}.

REQUEST SUMMARY:
{request_summary}

RESPONSE:
{response_type}

{response_details}

FEES:
{fee_information}

APPEAL RIGHTS:
You may appeal this decision to the Office of the Attorney General of Texas within {appeal_days} days.

Sincerely,

{responder_name}
{responder_title}
Public Information Coordinator
";

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn partial_fill_keeps_placeholders_and_reports_them() {
        let mut lib = TemplateLibrary::new();
        lib.register("case_line", "Case: {case}, Date: {date}");
        let doc = lib
            .fill("case_line", &vars(&[("case", "CV-100")]))
            .unwrap();
        assert_eq!(doc.text, "Case: CV-100, Date: {date}");
        assert_eq!(doc.missing, vec!["date".to_string()]);
    }

    #[test]
    fn complete_fill_has_no_warnings() {
        let mut lib = TemplateLibrary::new();
        lib.register("greeting", "Hello {name}, welcome to {place}.");
        let doc = lib
            .fill("greeting", &vars(&[("name", "Ada"), ("place", "the annex")]))
            .unwrap();
        assert_eq!(doc.text, "Hello Ada, welcome to the annex.");
        assert!(doc.missing.is_empty());
    }

    #[test]
    fn unknown_template_is_an_error() {
        let lib = TemplateLibrary::new();
        assert!(matches!(
            lib.fill("eviction_notice", &HashMap::new()),
            Err(TemplateError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn builtin_summons_fills_and_dedups_repeated_keys() {
        let lib = TemplateLibrary::new();
        let doc = lib
            .fill(
                "court_summons",
                &vars(&[("county", "Dallas"), ("defendant_name", "J. Doe")]),
            )
            .unwrap();
        assert!(doc.text.contains("COUNTY OF Dallas"));
        assert!(doc.text.contains("TO: J. Doe"));
        // county appears several times but is reported at most once per key
        assert!(!doc.missing.contains(&"county".to_string()));
        assert!(doc.missing.contains(&"case_number".to_string()));
        assert_eq!(
            doc.missing.iter().filter(|m| *m == "appearance_date").count(),
            1
        );
    }
}
