//! Prompt guard and prompt history

use regex::Regex;
use std::collections::VecDeque;
use std::sync::OnceLock;
use tracing::warn;

/// Shortest accepted prompt, in characters
pub const MIN_PROMPT_CHARS: usize = 5;

/// Default number of prompts kept in history
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

const SHELL_PATTERNS: &[&str] = &[
    r"(?i)^(cd|ls|pwd|mkdir|rm|cp|mv|cat|echo|grep|find|chmod|chown|sudo|apt|brew|npm|pip|python|node|uvicorn|pkill|kill)\s",
    r"^\.{0,2}/[a-zA-Z]",
    r"&&|\|\||;.*\$",
    r"^\s*#!",
    r"(?i)--[a-z]+=",
];

const CODE_PATTERNS: &[&str] = &[
    r"(?i)^(import|from|def|class|function|const|let|var|select|insert|update|delete)\s",
    r"(?s)^\{.*\}$",
    r"(?s)^\[.*\]$",
];

struct Patterns {
    shell: Vec<Regex>,
    code: Vec<Regex>,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |sources: &[&str]| {
            sources
                .iter()
                .map(|p| Regex::new(p).expect("prompt guard patterns are valid"))
                .collect()
        };
        Patterns {
            shell: compile(SHELL_PATTERNS),
            code: compile(CODE_PATTERNS),
        }
    })
}

/// Why a prompt was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ShellCommand,
    CodeSnippet,
    TooShort,
}

impl Rejection {
    pub fn reason(self) -> &'static str {
        match self {
            Rejection::ShellCommand => {
                "Detected shell command instead of a question. Please enter a natural language question about your data."
            }
            Rejection::CodeSnippet => {
                "Detected code instead of a question. Please enter a natural language question about your data."
            }
            Rejection::TooShort => {
                "Question is too short. Please provide more detail about what you want to know."
            }
        }
    }
}

/// Heuristic filter for text that is not a natural language question
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptGuard;

impl PromptGuard {
    /// Check a prompt, returning the trimmed text if accepted
    pub fn check(prompt: &str) -> Result<String, Rejection> {
        let prompt = prompt.trim();
        let patterns = patterns();

        if patterns.shell.iter().any(|re| re.is_match(prompt)) {
            warn!("Detected shell command in prompt: {}", preview(prompt));
            return Err(Rejection::ShellCommand);
        }
        if patterns.code.iter().any(|re| re.is_match(prompt)) {
            warn!("Detected code snippet in prompt: {}", preview(prompt));
            return Err(Rejection::CodeSnippet);
        }
        if prompt.chars().count() < MIN_PROMPT_CHARS {
            warn!("Prompt too short: {}", prompt);
            return Err(Rejection::TooShort);
        }
        Ok(prompt.to_string())
    }
}

fn preview(prompt: &str) -> String {
    prompt.chars().take(50).collect()
}

/// Bounded list of accepted prompts, oldest first
#[derive(Debug, Clone)]
pub struct PromptHistory {
    capacity: usize,
    entries: VecDeque<String>,
}

impl PromptHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a prompt, evicting the oldest entry when full
    pub fn push(&mut self, prompt: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(prompt.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for PromptHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
