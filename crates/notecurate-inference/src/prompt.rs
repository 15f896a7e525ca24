//! Prompt construction for schema-guided extraction.
//!
//! All prompts embed the schema description and the example record as
//! pretty-printed JSON so the model sees the exact target shape.

use serde_json::Value as JsonValue;

use notecurate_core::schema::{TargetSchema, ValidationIssue};

/// Fixed opening line of every correction prompt.
pub const CORRECTION_PREAMBLE: &str =
    "The previous output was not a valid JSON or did not match the schema.";

/// Concrete error of the attempt a correction prompt responds to.
#[derive(Debug, Clone, Copy)]
pub enum PreviousError<'a> {
    /// The response parsed but failed schema validation.
    Issues(&'a [ValidationIssue]),
    /// Any other failure, described by its message.
    Message(&'a str),
}

fn pretty(value: &JsonValue) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// System instruction shared by every attempt.
pub fn system_prompt(schema: &TargetSchema, example: &JsonValue) -> String {
    format!(
        "You are a parser. Given an input text, you will extract the relevant information \
         and return a JSON object that conforms strictly to the following schema:\n\n\
         {schema}\n\n\
         Example:\n\
         {example}\n\n\
         Only return a valid JSON object. Do not include any explanations.\n\
         If a field is missing, use null.",
        schema = schema.describe(),
        example = pretty(example),
    )
}

/// User message carrying the raw input text.
pub fn user_prompt(text: &str) -> String {
    format!(
        "\nHere's the input text:\n\n{}\n\nExtract the information as per the schema.\n",
        text
    )
}

/// User message asking the model to fix its previous answer.
pub fn correction_prompt(
    previous: Option<PreviousError<'_>>,
    schema: &TargetSchema,
    example: &JsonValue,
) -> String {
    let mut prompt = CORRECTION_PREAMBLE.to_string();
    match previous {
        Some(PreviousError::Issues(issues)) => {
            let issues = serde_json::to_string_pretty(issues).unwrap_or_default();
            prompt.push_str("\nValidation errors from previous attempt:\n");
            prompt.push_str(&issues);
        }
        Some(PreviousError::Message(message)) => {
            prompt.push_str("\nError from previous attempt: ");
            prompt.push_str(message);
        }
        None => {}
    }
    prompt.push_str(
        "\n\nPlease review the original text carefully and provide a valid JSON object that \
         strictly adheres to the schema. Ensure your output is ONLY the JSON object itself, \
         with no surrounding text or explanations.",
    );
    prompt.push_str("\nSchema to follow:\n");
    prompt.push_str(&schema.describe());
    prompt.push_str("\nExample of correct JSON structure:\n");
    prompt.push_str(&pretty(example));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use notecurate_core::schema::{article_example, article_schema};
    use serde_json::json;

    #[test]
    fn test_system_prompt_embeds_schema_and_example() {
        let schema = article_schema();
        let example = json!({"description": "d", "location": "l", "tags": [], "timestamp": "2024-01-01T00:00:00Z"});
        let prompt = system_prompt(&schema, &example);
        assert!(prompt.contains(&schema.describe()));
        assert!(prompt.contains(&serde_json::to_string_pretty(&example).unwrap()));
        assert!(prompt.contains("If a field is missing, use null."));
    }

    #[test]
    fn test_user_prompt_contains_text() {
        let prompt = user_prompt("road closed near the bridge");
        assert!(prompt.contains("road closed near the bridge"));
        assert!(prompt.contains("Extract the information as per the schema."));
    }

    #[test]
    fn test_correction_prompt_with_issues() {
        let schema = article_schema();
        let issues = vec![ValidationIssue {
            path: "description".to_string(),
            message: "Required".to_string(),
        }];
        let prompt = correction_prompt(
            Some(PreviousError::Issues(&issues)),
            &schema,
            &article_example(),
        );
        assert!(prompt.starts_with(CORRECTION_PREAMBLE));
        assert!(prompt.contains("Validation errors from previous attempt:"));
        assert!(prompt.contains("\"path\": \"description\""));
        assert!(prompt.contains("ONLY the JSON object"));
        assert!(prompt.contains(&schema.describe()));
    }

    #[test]
    fn test_correction_prompt_with_message() {
        let prompt = correction_prompt(
            Some(PreviousError::Message("expected value at line 1 column 1")),
            &article_schema(),
            &article_example(),
        );
        assert!(prompt.contains("Error from previous attempt: expected value at line 1 column 1"));
        assert!(!prompt.contains("Validation errors"));
    }
}
