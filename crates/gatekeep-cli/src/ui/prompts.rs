//! Interactive prompt utilities.

use dialoguer::{Password, theme::ColorfulTheme};

/// Prompt for a password (hidden input).
pub fn password(prompt: &str) -> Result<String, dialoguer::Error> {
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .interact()
}
