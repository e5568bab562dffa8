//! Generation backends and the prompt they are given.

use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use ragkit_core::config::GenerationConfig;
use ragkit_core::traits::GenerationBackend;
use ragkit_core::types::RankedResult;
use ragkit_core::{Error, FailureKind, Result, Service};

pub const EXTRACTIVE_BACKEND: &str = "extractive";

pub const NOT_FOUND_ANSWER: &str = "I could not find that information in the available documents.";

const CONTEXT_MARKER: &str = "CONTEXT:";
const QUESTION_MARKER: &str = "QUESTION:";
const INSTRUCTIONS_MARKER: &str = "INSTRUCTIONS:";

/// Render the prompt for `question` over ranked context passages.
pub fn build_prompt(question: &str, results: &[RankedResult]) -> String {
    let mut prompt = String::from(
        "You are an HR assistant answering questions from official company documents.\n\n",
    );
    prompt.push_str(CONTEXT_MARKER);
    prompt.push('\n');
    for (i, r) in results.iter().enumerate() {
        let _ = writeln!(
            prompt,
            "[{}] ({}) {}",
            i + 1,
            r.candidate.metadata.section,
            r.candidate.chunk_text.trim()
        );
    }
    let _ = write!(
        prompt,
        "\n{QUESTION_MARKER}\n{}\n\n{INSTRUCTIONS_MARKER}\n\
         1. Answer only from the context above.\n\
         2. If the information is incomplete, say so.\n\
         3. Be specific with numbers, dates and policies.\n\
         4. If the context does not contain the answer, reply: \"{NOT_FOUND_ANSWER}\"\n",
        question.trim()
    );
    prompt
}

pub fn backend_from_config(cfg: &GenerationConfig) -> Result<Arc<dyn GenerationBackend>> {
    match cfg.backend.as_str() {
        EXTRACTIVE_BACKEND => Ok(Arc::new(ExtractiveBackend)),
        other => Err(Error::config(format!(
            "unknown generation backend '{other}' (available: {EXTRACTIVE_BACKEND})"
        ))),
    }
}

/// Answers by quoting the context sentences that share the most terms with
/// the question. Deterministic; `temperature` is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractiveBackend;

struct ParsedPrompt<'a> {
    passages: Vec<&'a str>,
    question: &'a str,
}

fn parse_prompt(prompt: &str) -> Option<ParsedPrompt<'_>> {
    let (_, rest) = prompt.split_once(CONTEXT_MARKER)?;
    let (context, rest) = rest.split_once(QUESTION_MARKER)?;
    let question = rest.split_once(INSTRUCTIONS_MARKER).map_or(rest, |(q, _)| q).trim();
    let passages = context
        .lines()
        .map(strip_passage_label)
        .filter(|p| !p.is_empty())
        .collect();
    Some(ParsedPrompt { passages, question })
}

/// `[3] (vacation) text` -> `text`
fn strip_passage_label(line: &str) -> &str {
    let mut line = line.trim();
    if let Some(rest) = line.strip_prefix('[') {
        line = rest.split_once(']').map_or(line, |(_, r)| r.trim_start());
    }
    if let Some(rest) = line.strip_prefix('(') {
        line = rest.split_once(')').map_or(line, |(_, r)| r.trim_start());
    }
    line
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

fn sentences(passage: &str) -> impl Iterator<Item = &str> {
    passage
        .split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl GenerationBackend for ExtractiveBackend {
    fn name(&self) -> &str {
        EXTRACTIVE_BACKEND
    }

    async fn complete(&self, prompt: &str, _temperature: f32, max_tokens: usize) -> Result<String> {
        let parsed = parse_prompt(prompt).ok_or_else(|| {
            Error::failure(Service::Generation, FailureKind::Malformed, "prompt has no context section")
        })?;
        let wanted = terms(parsed.question);

        let mut scored: Vec<(usize, &str)> = parsed
            .passages
            .iter()
            .flat_map(|p| sentences(p))
            .map(|s| (terms(s).intersection(&wanted).count(), s))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let mut seen = HashSet::new();
        let mut words = 0;
        let mut picked = Vec::new();
        for (_, sentence) in scored {
            if !seen.insert(sentence) {
                continue;
            }
            let len = sentence.split_whitespace().count();
            if words > 0 && words + len > max_tokens {
                break;
            }
            words += len;
            picked.push(sentence);
        }

        if picked.is_empty() {
            return Ok(NOT_FOUND_ANSWER.to_string());
        }
        let answer = picked.join(" ");
        Ok(answer.split_whitespace().take(max_tokens).collect::<Vec<_>>().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_labels() {
        assert_eq!(strip_passage_label("[2] (vacation) 22 days."), "22 days.");
        assert_eq!(strip_passage_label("plain"), "plain");
    }

    #[test]
    fn unknown_backend_is_config_error() {
        let cfg = GenerationConfig { backend: "gpt".into(), ..GenerationConfig::default() };
        assert!(matches!(backend_from_config(&cfg), Err(Error::Configuration(_))));
    }
}
