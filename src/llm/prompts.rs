//! Prompt templates for generative selection

use std::collections::HashMap;

/// Template for generating prompts
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    variables: Vec<String>,
}

impl PromptTemplate {
    /// Create a new prompt template
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let variables = extract_variables(&template);
        Self {
            template,
            variables,
        }
    }

    /// Fill in the template; unknown variables are left in place
    #[must_use]
    pub fn render(&self, values: &HashMap<&str, String>) -> String {
        let mut result = self.template.clone();
        for var in &self.variables {
            if let Some(value) = values.get(var.as_str()) {
                result = result.replace(&format!("{{{{{var}}}}}"), value);
            }
        }
        result
    }

    /// Get required variables
    #[must_use]
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Variables the caller did not supply
    #[must_use]
    pub fn missing<'a>(&'a self, values: &HashMap<&str, String>) -> Vec<&'a str> {
        self.variables
            .iter()
            .map(String::as_str)
            .filter(|v| !values.contains_key(v))
            .collect()
    }
}

/// Extract variable names from template
fn extract_variables(template: &str) -> Vec<String> {
    let mut variables = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let name = after[..end].trim();
        if !name.is_empty() && !variables.iter().any(|v| v == name) {
            variables.push(name.to_string());
        }
        rest = &after[end + 2..];
    }

    variables
}

/// Prompts for the final candidate pick
pub struct SelectionPrompts;

impl SelectionPrompts {
    #[must_use]
    pub fn system() -> PromptTemplate {
        PromptTemplate::new(
            r#"You are an admissions matching assistant. You pick the people from our community a prospective family should meet first.

Rules:
- Choose exactly one current member and exactly one staff member, and at most one alumnus, using only the ids listed in the request.
- Prefer candidates whose interests, personality and grade relevance fit the child described.
- When two candidates fit equally well, prefer the one with a video available.
- Respond with a single JSON object and nothing else:
{"current_member_id": "...", "staff_id": "...", "alumni_id": "... or null", "match_score": 85-100, "reasoning": "...", "message": "..."}"#,
        )
    }

    #[must_use]
    pub fn user() -> PromptTemplate {
        PromptTemplate::new(
            r"Family profile
Grade band: {{grade_band}}
Description: {{description}}
Personality traits: {{traits}}
Interests: {{interests}}
Family values: {{values}}

Current members:
{{current_members}}

Staff:
{{staff}}

Alumni:
{{alumni}}

Pick the best matches and explain the fit in one or two sentences.",
        )
    }
}
