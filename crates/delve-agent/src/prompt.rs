//! Instruction prompt — the first turn of every transcript.

use delve_core::types::{ANSWER_MARKERS, TOOL_RESPONSE_MARKERS};
use delve_core::utils::today_date;

use crate::tools::ToolRegistry;

/// `<tools>` block with one pretty-printed signature per capability.
pub fn tools_block(registry: &ToolRegistry) -> String {
    let mut block = String::from("<tools>\n");
    for signature in registry.signatures() {
        let rendered = serde_json::to_string_pretty(&signature).unwrap_or_else(|_| signature.to_string());
        block.push_str(&rendered);
        block.push('\n');
    }
    block.push_str("</tools>");
    block
}

/// Build the instruction turn text for `registry`, dated today.
pub fn build_instruction(registry: &ToolRegistry) -> String {
    build_instruction_for_date(registry, &today_date())
}

/// Same as [`build_instruction`] with an explicit date.
pub fn build_instruction_for_date(registry: &ToolRegistry, date: &str) -> String {
    let tools = tools_block(registry);
    let answer_open = ANSWER_MARKERS.open;
    let answer_close = ANSWER_MARKERS.close;
    let result_open = TOOL_RESPONSE_MARKERS.open;
    let result_close = TOOL_RESPONSE_MARKERS.close;

    let mut guidelines = vec![
        "Start with broad searches to map out the topic.",
        "Visit the most relevant pages to read the details, stating a precise goal.",
        "Synthesize findings from several sources and cross-check key facts.",
    ];
    if registry.has("google_scholar") {
        guidelines.insert(1, "Use google_scholar for academic and research-oriented questions.");
    }
    if registry.has("python_sandbox") {
        guidelines.push("Use python_sandbox for calculations and data processing; report results with print().");
    }
    let guidelines: String = guidelines
        .iter()
        .enumerate()
        .map(|(i, g)| format!("{}. {g}\n", i + 1))
        .collect();

    format!(
        "You are a research agent that conducts deep, systematic investigations. \
         Gather information from several sources, analyze it and give a thorough, accurate answer.\n\n\
         {tools}\n\n\
         # Tool Call Format\n\n\
         To use a tool, write ONLY the JSON object on its own line:\n\
         {{\"name\": \"tool_name\", \"arguments\": {{\"parameter\": \"value\"}}}}\n\n\
         Several calls may be written on separate lines. Tool output comes back between \
         {result_open} and {result_close}.\n\n\
         # Research Guidelines\n\n\
         {guidelines}\n\
         # Response Format\n\n\
         When the research is complete, write the final answer between {answer_open} and {answer_close}. \
         Cite sources where appropriate.\n\n\
         Current date: {date}"
    )
}
