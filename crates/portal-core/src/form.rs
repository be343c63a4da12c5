//! Dynamic form rendering, validation and submission
//!
//! A [`FormSession`] holds one form instance: its schema, the values entered
//! so far, the current per-field errors and the last notice. It only ever
//! lets one submission run at a time.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{info, warn};

use crate::fields::{Choice, FieldDescriptor, FieldKind, FormSchema};
use crate::orchestrator::SubmissionOutcome;
use crate::PortalError;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

pub const VALIDATION_NOTICE: &str = "Please fix the errors in the form";
pub const SUBMISSION_FAILED_NOTICE: &str = "An error occurred while submitting the form";
pub const UNREACHABLE_NOTICE: &str = "could not reach service";

// =============================================================================
// Values and errors
// =============================================================================

/// Field name to entered value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormValues(BTreeMap<String, Value>);

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.0).unwrap_or(Value::Null)
    }
}

impl FromIterator<(String, Value)> for FormValues {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Null, missing, an empty list, or a string that is empty after trimming.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldError {
    Required,
    InvalidEmail,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::Required => f.write_str("required"),
            FieldError::InvalidEmail => f.write_str("invalid email"),
        }
    }
}

pub type ErrorMap = BTreeMap<String, FieldError>;

// =============================================================================
// Visibility and validation
// =============================================================================

pub fn is_visible(field: &FieldDescriptor, values: &FormValues) -> bool {
    field.visibility_rule.as_ref().map_or(true, |rule| rule.is_satisfied(values))
}

pub fn visible_fields<'a>(
    fields: &'a [FieldDescriptor],
    values: &'a FormValues,
) -> impl Iterator<Item = &'a FieldDescriptor> + 'a {
    fields.iter().filter(move |f| is_visible(f, values))
}

/// Validates visible fields only. Hidden fields are neither required nor checked.
pub fn validate(fields: &[FieldDescriptor], values: &FormValues) -> ErrorMap {
    let mut errors = ErrorMap::new();

    for field in visible_fields(fields, values) {
        let value = values.get(&field.name);

        if field.mandatory && is_blank(value) {
            errors.insert(field.name.clone(), FieldError::Required);
            continue;
        }

        if field.kind == FieldKind::Email && !is_blank(value) {
            let valid = value.and_then(Value::as_str).map_or(false, |s| EMAIL_PATTERN.is_match(s.trim()));
            if !valid {
                errors.insert(field.name.clone(), FieldError::InvalidEmail);
            }
        }
    }

    errors
}

/// Values of the currently visible fields, the payload handed to submission.
pub fn collect_visible(fields: &[FieldDescriptor], values: &FormValues) -> FormValues {
    visible_fields(fields, values)
        .filter_map(|f| values.get(&f.name).map(|v| (f.name.clone(), v.clone())))
        .collect()
}

// =============================================================================
// Rendering
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum Widget {
    TextInput,
    NumberInput,
    Checkbox,
    Select { options: Vec<Choice> },
    ReferencePicker { options: Vec<Choice> },
    /// Choice or reference field whose option list could not be loaded.
    FreeText,
    DatePicker,
    DateTimePicker,
    EmailInput,
    UrlInput,
    TextArea { max_length: Option<u32> },
    FileInput,
}

impl Widget {
    pub fn for_field(field: &FieldDescriptor) -> Self {
        match field.kind {
            FieldKind::Text => Widget::TextInput,
            FieldKind::Number => Widget::NumberInput,
            FieldKind::Boolean => Widget::Checkbox,
            FieldKind::Choice | FieldKind::Reference if field.choices.is_empty() => Widget::FreeText,
            FieldKind::Choice => Widget::Select { options: field.choices.clone() },
            FieldKind::Reference => Widget::ReferencePicker { options: field.choices.clone() },
            FieldKind::Date => Widget::DatePicker,
            FieldKind::DateTime => Widget::DateTimePicker,
            FieldKind::Email => Widget::EmailInput,
            FieldKind::Url => Widget::UrlInput,
            FieldKind::Textarea => Widget::TextArea { max_length: field.max_length },
            FieldKind::File => Widget::FileInput,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Widget::TextInput => "text input",
            Widget::NumberInput => "number input",
            Widget::Checkbox => "checkbox",
            Widget::Select { .. } => "select",
            Widget::ReferencePicker { .. } => "reference picker",
            Widget::FreeText => "free text",
            Widget::DatePicker => "date picker",
            Widget::DateTimePicker => "datetime picker",
            Widget::EmailInput => "email input",
            Widget::UrlInput => "url input",
            Widget::TextArea { .. } => "text area",
            Widget::FileInput => "file input",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderedField {
    pub name: String,
    pub label: String,
    #[serde(flatten)]
    pub widget: Widget,
    pub mandatory: bool,
    pub help_text: Option<String>,
    pub placeholder: Option<String>,
    pub value: Option<Value>,
    pub error: Option<FieldError>,
}

/// Widgets for the visible fields, in schema order.
pub fn render(fields: &[FieldDescriptor], values: &FormValues, errors: &ErrorMap) -> Vec<RenderedField> {
    visible_fields(fields, values)
        .map(|field| RenderedField {
            name: field.name.clone(),
            label: field.label.clone(),
            widget: Widget::for_field(field),
            mandatory: field.mandatory,
            help_text: field.help_text.clone(),
            placeholder: field.placeholder.clone(),
            value: values.get(&field.name).cloned(),
            error: errors.get(&field.name).copied(),
        })
        .collect()
}

// =============================================================================
// Session
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "level", content = "message", rename_all = "snake_case")]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Success(m) | Notice::Error(m) => m,
        }
    }

    pub fn for_outcome(outcome: &SubmissionOutcome) -> Self {
        if outcome.is_simulated {
            Notice::Success(format!(
                "Request {} recorded and queued for manual processing",
                outcome.display_number
            ))
        } else {
            Notice::Success(format!("Request {} created successfully", outcome.display_number))
        }
    }
}

#[derive(Error, Debug)]
pub enum FormError {
    #[error("{} field(s) need attention", .0.len())]
    Invalid(ErrorMap),

    #[error("a submission is already in progress")]
    AlreadySubmitting,

    #[error("submission failed: {0}")]
    Submission(#[source] PortalError),
}

/// Receiver of validated form values.
#[async_trait]
pub trait SubmitHandler: Send + Sync {
    async fn on_submit(&self, values: FormValues) -> crate::Result<SubmissionOutcome>;
}

#[derive(Default)]
struct SessionState {
    values: FormValues,
    errors: ErrorMap,
    notice: Option<Notice>,
}

pub struct FormSession {
    schema: FormSchema,
    state: Mutex<SessionState>,
    submitting: AtomicBool,
}

/// Re-enables submission when dropped, including on early return.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl FormSession {
    pub fn new(schema: FormSchema) -> Self {
        Self { schema, state: Mutex::new(SessionState::default()), submitting: AtomicBool::new(false) }
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    /// Sets a value and clears that field's error.
    pub fn set_value(&self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let mut state = self.state.lock();
        state.errors.remove(&name);
        state.values.set(name, value);
    }

    pub fn values(&self) -> FormValues {
        self.state.lock().values.clone()
    }

    pub fn errors(&self) -> ErrorMap {
        self.state.lock().errors.clone()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.state.lock().notice.clone()
    }

    pub fn is_submit_enabled(&self) -> bool {
        !self.submitting.load(Ordering::Acquire)
    }

    pub fn render(&self) -> Vec<RenderedField> {
        let state = self.state.lock();
        render(self.schema.fields(), &state.values, &state.errors)
    }

    /// Validates, then hands the visible values to `handler`. Entered values
    /// survive a failed submission.
    pub async fn submit(&self, handler: &dyn SubmitHandler) -> Result<SubmissionOutcome, FormError> {
        if self
            .submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(FormError::AlreadySubmitting);
        }
        let _guard = InFlight(&self.submitting);

        let payload = {
            let mut state = self.state.lock();
            let errors = validate(self.schema.fields(), &state.values);
            if !errors.is_empty() {
                state.errors = errors.clone();
                state.notice = Some(Notice::Error(VALIDATION_NOTICE.to_string()));
                return Err(FormError::Invalid(errors));
            }
            state.errors.clear();
            collect_visible(self.schema.fields(), &state.values)
        };

        match handler.on_submit(payload).await {
            Ok(outcome) => {
                info!(number = %outcome.display_number, simulated = outcome.is_simulated, "form submitted");
                self.state.lock().notice = Some(Notice::for_outcome(&outcome));
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "form submission failed");
                let message = if e.is_unreachable() { UNREACHABLE_NOTICE } else { SUBMISSION_FAILED_NOTICE };
                self.state.lock().notice = Some(Notice::Error(message.to_string()));
                Err(FormError::Submission(e))
            }
        }
    }
}
