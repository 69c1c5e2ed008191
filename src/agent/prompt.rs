use crate::llm::prompt::{estimate_tokens, keep_last_lines};
use crate::tools::ToolSpec;

/// System prompt for an agent deciding one tool call.
pub fn build_system_prompt(name: &str, role: &str) -> String {
    format!(
        r##"You are {name}, a browser automation agent. Your role: {role}

You receive one task at a time and must pick exactly one tool call that performs it.

Respond with a single JSON object and nothing else:
{{"tool_name": "<one of the available tools>", "parameters": {{ ... }}}}

The parameters must match the tool's schema exactly: include every required field and no others.
Selectors are CSS selectors (e.g., #id, .class, tag, [attr=value])."##
    )
}

/// User prompt: task, dependency result, memory and available tools.
///
/// The task, dependency and tool sections are always present. Memory
/// sections fill what is left of `max_tokens`, newest first, and the two
/// share it evenly when both are present.
pub fn build_decision_prompt(
    task: &str,
    dependency: Option<&str>,
    own_history: &[String],
    shared_context: &str,
    tools: &[ToolSpec],
    max_tokens: usize,
) -> String {
    let tools_str = tools
        .iter()
        .map(|spec| {
            format!(
                "- {}: {}\n  parameters: {}",
                spec.name, spec.description, spec.parameters
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!("Task: {}\n", task);
    if let Some(result) = dependency {
        prompt.push_str(&format!("\nResult of the previous task: {}\n", result));
    }
    let tail = format!(
        "\nAvailable tools:\n{}\n\nWhich tool call performs the task? Respond with JSON only.",
        tools_str
    );

    let mut remaining =
        max_tokens.saturating_sub(estimate_tokens(&prompt) + estimate_tokens(&tail));
    let has_shared = !shared_context.trim().is_empty();

    if !own_history.is_empty() {
        let header = "\nYour recent actions:\n";
        let share = if has_shared { remaining / 2 } else { remaining };
        let mut used = estimate_tokens(header);
        let mut kept: Vec<&String> = Vec::new();
        for entry in own_history.iter().rev() {
            let cost = estimate_tokens(entry) + 1;
            if used + cost > share {
                break;
            }
            used += cost;
            kept.push(entry);
        }
        if !kept.is_empty() {
            prompt.push_str(header);
            for entry in kept.into_iter().rev() {
                prompt.push_str(entry);
                prompt.push('\n');
            }
            remaining -= used;
        }
    }

    if has_shared {
        let header = "\nCrew context:\n";
        let header_cost = estimate_tokens(header);
        if remaining > header_cost + 1 {
            let context = keep_last_lines(shared_context, remaining - header_cost - 1);
            if !context.trim().is_empty() && context.trim() != "..." {
                prompt.push_str(header);
                prompt.push_str(&context);
                if !context.ends_with('\n') {
                    prompt.push('\n');
                }
            }
        }
    }

    prompt.push_str(&tail);
    prompt
}
