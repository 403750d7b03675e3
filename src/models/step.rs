use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Free-form submission payload keyed by admin-configured field names.
pub type SubmissionData = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Form,
    Upload,
    Review,
    Approval,
}

impl StepType {
    /// Review and approval steps wait on staff once submitted.
    pub fn awaits_staff(&self) -> bool {
        matches!(self, StepType::Review | StepType::Approval)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Form => "form",
            StepType::Upload => "upload",
            StepType::Review => "review",
            StepType::Approval => "approval",
        }
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            StepType::Form => "Fill in the form below completely",
            StepType::Upload => "Upload the required documents",
            StepType::Review => "This step is being reviewed",
            StepType::Approval => "Waiting for admin approval",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Textarea,
    Select,
    /// Holds the uploaded file name; the bytes never reach this service.
    File,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl FormField {
    /// "passport_number" -> "Passport Number"
    pub fn label(&self) -> String {
        self.name
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Stored as `{"fields": [...]}` in `steps.form_fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    #[serde(default)]
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub step_type: StepType,
    pub order_index: i32,
    pub is_active: bool,
    #[serde(default)]
    pub form_fields: Option<FormSchema>,
}

impl Step {
    pub fn fields(&self) -> &[FormField] {
        self.form_fields
            .as_ref()
            .map(|s| s.fields.as_slice())
            .unwrap_or(&[])
    }

    /// Checks a submission against the declared field schema.
    pub fn validate_submission(&self, data: &SubmissionData) -> Result<(), String> {
        let fields = self.fields();

        if !fields.is_empty() {
            if let Some(unknown) = data.keys().find(|k| !fields.iter().any(|f| &f.name == *k)) {
                return Err(format!("'{}' is not a field of step '{}'", unknown, self.name));
            }
        }

        for field in fields {
            if field.field_type == FieldType::Unsupported {
                continue;
            }
            let value = match data.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(format!("{} is required", field.label()));
                    }
                    continue;
                }
                Some(v) => v,
            };

            let text = value
                .as_str()
                .ok_or_else(|| format!("{} must be a string", field.label()))?;

            if field.required && text.trim().is_empty() {
                return Err(format!("{} is required", field.label()));
            }

            if field.field_type == FieldType::Select
                && !text.is_empty()
                && !field.options.iter().any(|o| o == text)
            {
                return Err(format!("'{}' is not a valid option for {}", text, field.label()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn application_form() -> Step {
        serde_json::from_value(json!({
            "id": "0b5f2f8e-8f6c-4c0e-b1c4-1c1e9f7d2a10",
            "name": "Application form",
            "description": null,
            "step_type": "form",
            "order_index": 1,
            "is_active": true,
            "form_fields": {
                "fields": [
                    {"name": "full_name", "type": "text", "required": true},
                    {"name": "motivation", "type": "textarea", "required": false},
                    {"name": "semester", "type": "select", "required": true, "options": ["5", "6", "7"]},
                    {"name": "passport_scan", "type": "file", "required": false},
                    {"name": "signature", "type": "drawing"}
                ]
            }
        }))
        .unwrap()
    }

    fn data(v: Value) -> SubmissionData {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn accepts_complete_submission() {
        let step = application_form();
        let d = data(json!({"full_name": "Ayu", "semester": "6", "passport_scan": "passport.pdf"}));
        assert!(step.validate_submission(&d).is_ok());
    }

    #[test]
    fn rejects_missing_or_blank_required_field() {
        let step = application_form();
        let err = step
            .validate_submission(&data(json!({"semester": "6"})))
            .unwrap_err();
        assert_eq!(err, "Full Name is required");

        let err = step
            .validate_submission(&data(json!({"full_name": "   ", "semester": "6"})))
            .unwrap_err();
        assert_eq!(err, "Full Name is required");
    }

    #[test]
    fn rejects_option_outside_select_list() {
        let step = application_form();
        let err = step
            .validate_submission(&data(json!({"full_name": "Ayu", "semester": "9"})))
            .unwrap_err();
        assert!(err.contains("not a valid option"));
    }

    #[test]
    fn rejects_undeclared_keys_and_non_strings() {
        let step = application_form();
        assert!(step
            .validate_submission(&data(json!({"full_name": "Ayu", "semester": "6", "gpa": "3.9"})))
            .is_err());
        assert!(step
            .validate_submission(&data(json!({"full_name": 42, "semester": "6"})))
            .is_err());
    }

    #[test]
    fn step_without_schema_accepts_anything() {
        let mut step = application_form();
        step.form_fields = None;
        assert!(step.validate_submission(&data(json!({"note": "hi"}))).is_ok());
    }

    #[test]
    fn unknown_field_type_deserializes() {
        let step = application_form();
        assert_eq!(step.fields()[4].field_type, FieldType::Unsupported);
    }
}
