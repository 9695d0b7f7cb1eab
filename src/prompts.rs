//! Instruction templates for the two generation stages.
//!
//! Centralising every template here serves two purposes:
//!
//! 1. **Single source of truth** — changing stage behaviour (e.g. tightening
//!    the summary register or the sentence-selection criteria) requires
//!    editing exactly one place.
//!
//! 2. **Testability** — unit tests can import and inspect templates directly
//!    without calling a real model, making template regressions easy to catch.
//!
//! Unlike generation parameters, the templates are fixed assets of the
//! pipeline: stages select one by [`crate::backend::TemplateId`] and callers
//! cannot substitute their own text per call.

/// Instruction template for the summarization stage.
///
/// The document travels alongside this text as an attached payload part.
pub const PDF_SUMMARIZATION_PROMPT: &str = r#"You are an expert document analyst. Your task is to read the attached PDF document and produce a concise, faithful summary.

Follow these rules precisely:

1. DOCUMENT TYPE
   - Identify what kind of document this is (book, research paper, report, article)
   - Tailor the summary to that type

2. FOR BOOKS
   - Focus on the main themes, the plot where applicable, and the key arguments or takeaways

3. FOR RESEARCH PAPERS
   - Cover the research aims, methodology, key findings, and conclusions

4. STYLE
   - Write flowing prose, not bullet fragments
   - Stay concise: a few paragraphs at most
   - Never invent content that is not in the document

5. OUTPUT FORMAT
   - Respond with a JSON object containing a single "summary" string field
   - The summary must not be empty"#;

/// Instruction template for the key-sentence stage.
///
/// The committed summary travels alongside this text as a labelled part.
pub const KEY_SENTENCE_PROMPT: &str = r#"You are an expert in extracting the most important sentences from a text. Your task is to read the document summary provided and pull out the sentences that carry its core arguments and findings.

Follow these rules precisely:

1. SELECTION
   - Choose only sentences that state a central claim, finding, or conclusion
   - Keep the sentences in the order they appear in the summary
   - It is acceptable to extract nothing from a summary with no substantive sentences

2. OUTPUT FORMAT
   - Respond with a JSON object containing a single "keySentences" string field
   - Separate each sentence with a newline character
   - Do not number the sentences or add commentary"#;
