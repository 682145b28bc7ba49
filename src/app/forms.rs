use serde::Serialize;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::domain::group::Group;
use crate::domain::post::Post;

/// Field name to human readable messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const INVALID_CHOICE_MESSAGE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE_MESSAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const INVALID_USERNAME_MESSAGE: &str = "Enter a valid username. This value may contain only \
     letters, numbers, and @/./+/-/_ characters.";
pub const USERNAME_TAKEN_MESSAGE: &str = "A user with that username already exists.";
pub const INVALID_LOGIN_MESSAGE: &str = "Please enter a correct username and password.";

/// Errors that belong to the form as a whole rather than one field.
pub const NON_FIELD_ERRORS: &str = "__all__";

const USERNAME_MAX_LEN: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Password,
    Choice,
    Image,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub help_text: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

pub const POST_FORM_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "text",
        label: "Post text",
        help_text: "The text of the post",
        required: true,
        kind: FieldKind::Text,
    },
    FieldSpec {
        name: "group",
        label: "Group",
        help_text: "Group the post belongs to",
        required: false,
        kind: FieldKind::Choice,
    },
    FieldSpec {
        name: "image",
        label: "Image",
        help_text: "Image attached to the post",
        required: false,
        kind: FieldKind::Image,
    },
];

pub const COMMENT_FORM_FIELDS: &[FieldSpec] = &[FieldSpec {
    name: "text",
    label: "Comment text",
    help_text: "The text of the comment",
    required: true,
    kind: FieldKind::Text,
}];

pub const CREDENTIALS_FORM_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "username",
        label: "Username",
        help_text: "150 characters or fewer. Letters, digits and @/./+/-/_ only.",
        required: true,
        kind: FieldKind::Text,
    },
    FieldSpec {
        name: "password",
        label: "Password",
        help_text: "",
        required: true,
        kind: FieldKind::Password,
    },
];

#[derive(Debug, Clone, Default, Validate)]
pub struct PostForm {
    #[validate(custom(function = "required_text"))]
    pub text: String,
    pub group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedPost {
    pub text: String,
    pub group_id: Option<i64>,
}

impl PostForm {
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        Self {
            text: fields.get("text").cloned().unwrap_or_default(),
            group: fields.get("group").cloned(),
        }
    }

    pub fn from_post(post: &Post) -> Self {
        Self {
            text: post.text.clone(),
            group: post.group.as_ref().map(|group| group.id.to_string()),
        }
    }

    /// Runs the schema checks that need no database access.
    pub fn clean(&self) -> Result<CleanedPost, FieldErrors> {
        let mut errors = match self.validate() {
            Ok(()) => FieldErrors::new(),
            Err(err) => field_errors(&err),
        };

        let group_id = match self.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    add_error(&mut errors, "group", INVALID_CHOICE_MESSAGE);
                    None
                }
            },
        };

        if errors.is_empty() {
            Ok(CleanedPost {
                text: self.text.trim().to_string(),
                group_id,
            })
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Default, Validate)]
pub struct CommentForm {
    #[validate(custom(function = "required_text"))]
    pub text: String,
}

impl CommentForm {
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        Self {
            text: fields.get("text").cloned().unwrap_or_default(),
        }
    }

    pub fn clean(&self) -> Result<String, FieldErrors> {
        match self.validate() {
            Ok(()) => Ok(self.text.trim().to_string()),
            Err(err) => Err(field_errors(&err)),
        }
    }
}

/// Username and password, shared by signup and login.
#[derive(Debug, Clone, Default, Validate)]
pub struct CredentialsForm {
    #[validate(custom(function = "valid_username"))]
    pub username: String,
    #[validate(custom(function = "required_text"))]
    pub password: String,
}

impl CredentialsForm {
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        Self {
            username: fields.get("username").cloned().unwrap_or_default(),
            password: fields.get("password").cloned().unwrap_or_default(),
        }
    }

    /// Returns the trimmed username; the password is kept as typed.
    pub fn clean(&self) -> Result<(String, String), FieldErrors> {
        match self.validate() {
            Ok(()) => Ok((self.username.trim().to_string(), self.password.clone())),
            Err(err) => Err(field_errors(&err)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub value: i64,
    pub label: String,
}

impl From<&Group> for Choice {
    fn from(group: &Group) -> Self {
        Self {
            value: group.id,
            label: group.title.clone(),
        }
    }
}

/// A form as handed to the rendering layer.
#[derive(Debug, Clone, Serialize)]
pub struct FormContext {
    pub fields: &'static [FieldSpec],
    pub values: BTreeMap<&'static str, String>,
    pub errors: FieldErrors,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
}

impl FormContext {
    pub fn post(form: &PostForm, errors: FieldErrors, groups: &[Group]) -> Self {
        let mut values = BTreeMap::new();
        values.insert("text", form.text.clone());
        values.insert("group", form.group.clone().unwrap_or_default());
        Self {
            fields: POST_FORM_FIELDS,
            values,
            errors,
            choices: groups.iter().map(Choice::from).collect(),
        }
    }

    pub fn comment() -> Self {
        Self {
            fields: COMMENT_FORM_FIELDS,
            values: BTreeMap::new(),
            errors: FieldErrors::new(),
            choices: Vec::new(),
        }
    }

    /// The password is never echoed back.
    pub fn credentials(username: &str, errors: FieldErrors) -> Self {
        let mut values = BTreeMap::new();
        values.insert("username", username.to_string());
        Self {
            fields: CREDENTIALS_FORM_FIELDS,
            values,
            errors,
            choices: Vec::new(),
        }
    }
}

pub fn add_error(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|err| match &err.message {
                    Some(message) => message.to_string(),
                    None => err.code.to_string(),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

fn required_text(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some(Cow::Borrowed(REQUIRED_MESSAGE));
        return Err(err);
    }
    Ok(())
}

fn valid_username(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return required_text(value);
    }
    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
    if value.chars().count() > USERNAME_MAX_LEN || !value.chars().all(allowed) {
        let mut err = ValidationError::new("invalid_username");
        err.message = Some(Cow::Borrowed(INVALID_USERNAME_MESSAGE));
        return Err(err);
    }
    Ok(())
}
