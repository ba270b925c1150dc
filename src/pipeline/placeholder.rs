//! Placeholder Markdown written for protected documents.
//!
//! The layout is fixed: a title naming the file, a reason line, remedies,
//! a file information block and a generated-by footer. Downstream indexes
//! and golden files match on it, so the wording only changes deliberately.

use chrono::{DateTime, Local};
use std::path::Path;

/// Render the placeholder for `original_name`.
pub fn render(original_name: &str, protection_label: &str, at: DateTime<Local>) -> String {
    format!(
        "# Conversion warning: {original_name}\n\
         \n\
         ## ⚠️ Could not be processed\n\
         \n\
         **Reason**: Protected by {protection_label}\n\
         \n\
         This file is protected by {protection_label}, so it could not be converted to Markdown.\n\
         \n\
         ### What to do\n\
         1. Contact the file owner and ask for access\n\
         2. Obtain a version of the file without protection\n\
         3. Open the file in a viewer that supports {protection_label}\n\
         \n\
         ### File information\n\
         - Original file: {original_name}\n\
         - Processed at: {timestamp}\n\
         - Detected protection: {protection_label}\n\
         \n\
         ---\n\
         *This warning file was generated automatically.*\n",
        timestamp = at.format("%Y-%m-%d %H:%M:%S"),
    )
}

/// Write the placeholder to `output`, creating its parent directory.
pub async fn write(
    output: &Path,
    original_name: &str,
    protection_label: &str,
) -> std::io::Result<()> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output, render(original_name, protection_label, Local::now())).await
}
