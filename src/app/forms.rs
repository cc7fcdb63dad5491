//! Field validation for everything users submit. Validators return the cleaned value or
//! the messages keyed by field, never touching storage.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use validator::ValidateEmail as _;

use crate::app::category::Category;
use crate::app::location::Location;
use crate::app::login::PASSWORD_MIN_LENGTH;
use crate::app::media::ImageUpload;
use crate::app::post::{Post, PostDraft, TITLE_MAX_LENGTH};
use crate::app::user::{ProfileChanges, USERNAME_MAX_LENGTH, User, is_valid_username};
use crate::app::{CategoryId, LocationId};

pub const NON_FIELD: &str = "__all__";
pub const COMMENT_PLACEHOLDER: &str = "Enter your comment...";
const NAME_MAX_LENGTH: usize = 150;
const EMAIL_MAX_LENGTH: usize = 254;
const REQUIRED: &str = "This field is required.";
const PUB_DATE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];
const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn non_field(&self) -> &[String] {
        self.get(NON_FIELD)
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

fn check_max_length(errors: &mut FormErrors, field: &str, value: &str, max: usize) {
    let length = value.chars().count();
    if length > max {
        errors.add(
            field,
            format!("Ensure this value has at most {max} characters (it has {length})."),
        );
    }
}

fn check_required(errors: &mut FormErrors, field: &str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
        false
    } else {
        true
    }
}

fn check_username(errors: &mut FormErrors, username: &str) {
    if !check_required(errors, "username", username) {
        return;
    }
    check_max_length(errors, "username", username, USERNAME_MAX_LENGTH);
    if !is_valid_username(username) && username.chars().count() <= USERNAME_MAX_LENGTH {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
}

/// Choice shown in a `<select>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

impl Choice {
    pub fn categories(categories: &[Category]) -> Vec<Choice> {
        categories
            .iter()
            .map(|c| Choice {
                value: c.id.to_string(),
                label: c.title.clone(),
            })
            .collect()
    }

    pub fn locations(locations: &[Location]) -> Vec<Choice> {
        locations
            .iter()
            .map(|l| Choice {
                value: l.id.to_string(),
                label: l.name.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
}

impl ProfileForm {
    pub fn from_user(user: &User) -> Self {
        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }

    /// Uniqueness of the username is checked against storage by the caller.
    pub fn clean(&self) -> Result<ProfileChanges, FormErrors> {
        let mut errors = FormErrors::default();
        let first_name = self.first_name.trim();
        let last_name = self.last_name.trim();
        let username = self.username.trim();
        let email = self.email.trim();
        check_max_length(&mut errors, "first_name", first_name, NAME_MAX_LENGTH);
        check_max_length(&mut errors, "last_name", last_name, NAME_MAX_LENGTH);
        check_username(&mut errors, username);
        if !email.is_empty() {
            check_max_length(&mut errors, "email", email, EMAIL_MAX_LENGTH);
            if !email.validate_email() {
                errors.add("email", "Enter a valid email address.");
            }
        }
        errors.into_result(|| ProfileChanges {
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            username: username.to_owned(),
            email: email.to_owned(),
        })
    }
}

/// What to do with the stored image of a post.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageChange {
    Keep,
    Clear,
    Replace(ImageUpload),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanPost {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub location: Option<LocationId>,
    pub category: CategoryId,
    pub is_published: bool,
    pub image: ImageChange,
}

impl CleanPost {
    pub fn into_draft(self, image: Option<String>) -> PostDraft {
        PostDraft {
            title: self.title,
            text: self.text,
            pub_date: self.pub_date,
            location: self.location,
            category: Some(self.category),
            is_published: self.is_published,
            image,
        }
    }
}

/// Raw post form values, as submitted or as prefilled from an existing post.
#[derive(Debug, Clone, PartialEq)]
pub struct PostForm {
    pub title: String,
    pub text: String,
    pub pub_date: String,
    pub location: String,
    pub category: String,
    pub is_published: bool,
    pub image_clear: bool,
    /// Stored image of the post being edited.
    pub current_image: Option<String>,
}

impl Default for PostForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            text: String::new(),
            pub_date: String::new(),
            location: String::new(),
            category: String::new(),
            is_published: true,
            image_clear: false,
            current_image: None,
        }
    }
}

impl PostForm {
    pub fn from_post(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            text: post.text.clone(),
            pub_date: post.pub_date.format("%Y-%m-%dT%H:%M").to_string(),
            location: post
                .location
                .as_ref()
                .map(|l| l.id.to_string())
                .unwrap_or_default(),
            category: post
                .category
                .as_ref()
                .map(|c| c.id.to_string())
                .unwrap_or_default(),
            is_published: post.is_published,
            image_clear: false,
            current_image: post.image.clone(),
        }
    }

    /// Builds the form from submitted text fields. Checkboxes are present only when ticked.
    pub fn from_fields(fields: &HashMap<String, String>, current_image: Option<String>) -> Self {
        let text = |name: &str| fields.get(name).cloned().unwrap_or_default();
        Self {
            title: text("title"),
            text: text("text"),
            pub_date: text("pub_date"),
            location: text("location"),
            category: text("category"),
            is_published: fields.contains_key("is_published"),
            image_clear: fields.contains_key("image-clear"),
            current_image,
        }
    }

    pub fn clean(
        &self,
        categories: &[Category],
        locations: &[Location],
        upload: Option<ImageUpload>,
    ) -> Result<CleanPost, FormErrors> {
        let mut errors = FormErrors::default();
        let title = self.title.trim();
        if check_required(&mut errors, "title", title) {
            check_max_length(&mut errors, "title", title, TITLE_MAX_LENGTH);
        }
        check_required(&mut errors, "text", &self.text);

        let pub_date = if check_required(&mut errors, "pub_date", &self.pub_date) {
            let parsed = parse_pub_date(&self.pub_date);
            if parsed.is_none() {
                errors.add("pub_date", "Enter a valid date/time.");
            }
            parsed
        } else {
            None
        };

        let category = if check_required(&mut errors, "category", &self.category) {
            let found = choose(&self.category, categories.iter().map(|c| c.id.0)).map(CategoryId);
            if found.is_none() {
                errors.add(
                    "category",
                    "Select a valid choice. That choice is not one of the available choices.",
                );
            }
            found
        } else {
            None
        };

        let location = if self.location.trim().is_empty() {
            None
        } else {
            let found = choose(&self.location, locations.iter().map(|l| l.id.0)).map(LocationId);
            if found.is_none() {
                errors.add(
                    "location",
                    "Select a valid choice. That choice is not one of the available choices.",
                );
            }
            found
        };

        let image = match upload {
            Some(upload) => {
                if !is_valid_image(&upload) {
                    errors.add(
                        "image",
                        "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
                    );
                }
                if self.image_clear {
                    errors.add(
                        "image",
                        "Please either submit a file or check the clear checkbox, not both.",
                    );
                }
                ImageChange::Replace(upload)
            }
            None if self.image_clear => ImageChange::Clear,
            None => ImageChange::Keep,
        };

        match (pub_date, category) {
            (Some(pub_date), Some(category)) if errors.is_empty() => Ok(CleanPost {
                title: title.to_owned(),
                text: self.text.clone(),
                pub_date,
                location,
                category,
                is_published: self.is_published,
                image,
            }),
            _ => Err(errors),
        }
    }
}

fn choose(raw: &str, mut ids: impl Iterator<Item = i64>) -> Option<i64> {
    let wanted = raw.trim().parse::<i64>().ok()?;
    ids.find(|id| *id == wanted)
}

fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    PUB_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// The extension must be an allowed one, and the bytes must decode as that format.
fn is_valid_image(upload: &ImageUpload) -> bool {
    let Some(ext) = upload
        .file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
    else {
        return false;
    };
    if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return false;
    }
    let Ok(format) = image::guess_format(&upload.bytes) else {
        return false;
    };
    format.extensions_str().contains(&ext.as_str())
        && image::load_from_memory_with_format(&upload.bytes, format).is_ok()
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

impl CommentForm {
    pub fn clean(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::default();
        check_required(&mut errors, "text", &self.text);
        errors.into_result(|| self.text.clone())
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: String,
}

impl LoginForm {
    pub fn clean(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        check_required(&mut errors, "username", &self.username);
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.into_result(|| ())
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistrationForm {
    pub username: String,
    pub password1: String,
    pub password2: String,
}

impl RegistrationForm {
    /// Returns the username and password. Uniqueness is checked by the caller.
    pub fn clean(&self) -> Result<(String, String), FormErrors> {
        let mut errors = FormErrors::default();
        let username = self.username.trim();
        check_username(&mut errors, username);
        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        } else if self.password1.chars().count() < PASSWORD_MIN_LENGTH {
            errors.add(
                "password1",
                format!(
                    "This password is too short. It must contain at least {PASSWORD_MIN_LENGTH} characters."
                ),
            );
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        } else if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }
        errors.into_result(|| (username.to_owned(), self.password1.clone()))
    }
}
