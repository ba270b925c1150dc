//! System prompts for the vision Markdown renderer.
//!
//! The pages sent to the model are print renderings of Word documents,
//! Excel sheets and PowerPoint slides, so the prompts name those layouts
//! explicitly. [`system_prompt`] picks the variant for the requested options.

use crate::config::MarkdownOptions;

/// Prompt used when structure preservation is requested (the default).
pub const STRUCTURED_PROMPT: &str = r#"You are an expert document converter. The image is one printed page of an office document (a word-processor page, a spreadsheet sheet, or a presentation slide). Convert it to clean Markdown suitable for a retrieval index.

Follow these rules precisely:

1. TEXT
   - Preserve ALL visible text in human reading order
   - Do not summarise, translate, or invent content

2. STRUCTURE
   - Use # for the document or slide title, ## and ### for sections
   - Keep bulleted and numbered lists, including nesting
   - Keep **bold** and *italic* emphasis where it carries meaning

3. SPREADSHEETS AND TABLES
   - Render every table or cell grid as a GFM pipe table with a header row
   - Keep empty cells as empty columns; do not merge or drop columns
   - Keep numbers exactly as displayed, including units and separators

4. SLIDES
   - Put speaker-visible slide text first, then any chart or diagram labels as a list

5. FIGURES
   - Describe charts and diagrams in one italic sentence; never emit image links

6. OUTPUT
   - Output ONLY the Markdown content
   - Do NOT wrap the answer in ```markdown fences
   - Do NOT add page numbers, headers or footers repeated from the print layout"#;

/// Prompt used when only the text is wanted.
pub const PLAIN_PROMPT: &str = r#"You are an expert document converter. The image is one printed page of an office document. Transcribe all visible text in reading order as plain paragraphs.

- Do not use headings, tables, or list markup
- Separate paragraphs with a blank line
- Do not summarise, translate, or invent content
- Output ONLY the text, without code fences or commentary"#;

/// Select the system prompt for `options`.
pub fn system_prompt(options: MarkdownOptions) -> &'static str {
    if options.preserve_structure {
        STRUCTURED_PROMPT
    } else {
        PLAIN_PROMPT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_follows_preserve_structure() {
        let structured = system_prompt(MarkdownOptions {
            preserve_structure: true,
        });
        assert!(structured.contains("GFM pipe table"));

        let plain = system_prompt(MarkdownOptions {
            preserve_structure: false,
        });
        assert!(plain.contains("plain paragraphs"));
    }
}
