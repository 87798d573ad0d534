use crate::sanitize::has_disallowed_chars;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PLACEHOLDER: char = '@';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenameMode {
    KeepFirstN,
    KeepFromN,
    KeepThroughLiteral,
    KeepFromLiteral,
    RemoveLiteral,
    SequentialPattern,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenameError {
    #[error("値を入力してください(文字数または文字列)")]
    EmptyParameter,
    #[error("文字数には整数を指定してください: {0}")]
    InvalidParameter(String),
    #[error("連番パターンにプレースホルダー '{0}' が含まれていません")]
    MissingPlaceholder(char),
    #[error("プレースホルダーに使えない文字です: {0:?}")]
    InvalidPlaceholder(char),
    #[error("ファイル名に使えない文字が含まれています: {0}")]
    InvalidCharacters(String),
}

/// User-facing rename settings, validated by [`RenameRule::compile`] before a batch starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRule {
    pub mode: RenameMode,
    pub parameter: String,
    pub start: u64,
    pub placeholder: char,
}

impl RenameRule {
    pub fn new(mode: RenameMode, parameter: impl Into<String>) -> Self {
        Self {
            mode,
            parameter: parameter.into(),
            start: 1,
            placeholder: DEFAULT_PLACEHOLDER,
        }
    }

    pub fn with_start(mut self, start: u64) -> Self {
        self.start = start;
        self
    }

    pub fn with_placeholder(mut self, placeholder: char) -> Self {
        self.placeholder = placeholder;
        self
    }

    pub fn compile(&self) -> Result<CompiledRule, RenameError> {
        if self.parameter.is_empty() {
            return Err(RenameError::EmptyParameter);
        }

        let value = self.parameter.clone();
        let compiled = match self.mode {
            RenameMode::KeepFirstN => CompiledRule::KeepFirst(parse_count(&value)?),
            RenameMode::KeepFromN => CompiledRule::KeepFrom(parse_count(&value)?),
            RenameMode::KeepThroughLiteral => CompiledRule::KeepThrough(value),
            RenameMode::KeepFromLiteral => CompiledRule::KeepFromLiteral(value),
            RenameMode::RemoveLiteral => CompiledRule::Remove(value),
            RenameMode::SequentialPattern => {
                CompiledRule::Sequence(SequencePattern::parse(&value, self.placeholder)?)
            }
        };
        Ok(compiled)
    }
}

#[derive(Debug, Clone)]
pub enum CompiledRule {
    KeepFirst(i64),
    KeepFrom(i64),
    KeepThrough(String),
    KeepFromLiteral(String),
    Remove(String),
    Sequence(SequencePattern),
}

impl CompiledRule {
    pub fn uses_counter(&self) -> bool {
        matches!(self, CompiledRule::Sequence(_))
    }

    /// Resolves a new stem. `counter` is only read by sequence patterns.
    pub fn apply(&self, stem: &str, counter: u64) -> String {
        match self {
            CompiledRule::KeepFirst(n) => {
                let end = char_offset(stem.chars().count(), *n);
                stem.chars().take(end).collect()
            }
            CompiledRule::KeepFrom(n) => {
                let start = char_offset(stem.chars().count(), *n);
                stem.chars().skip(start).collect()
            }
            CompiledRule::KeepThrough(literal) => match stem.find(literal.as_str()) {
                Some(idx) => stem[..idx + literal.len()].to_string(),
                None => stem.to_string(),
            },
            CompiledRule::KeepFromLiteral(literal) => match stem.find(literal.as_str()) {
                Some(idx) => stem[idx..].to_string(),
                None => stem.to_string(),
            },
            CompiledRule::Remove(literal) => stem.replace(literal.as_str(), ""),
            CompiledRule::Sequence(pattern) => pattern.render(counter),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SequencePattern {
    template: String,
    runs: Regex,
}

impl SequencePattern {
    pub fn parse(template: &str, placeholder: char) -> Result<Self, RenameError> {
        if placeholder.is_whitespace() || has_disallowed_chars(&placeholder.to_string()) {
            return Err(RenameError::InvalidPlaceholder(placeholder));
        }
        if has_disallowed_chars(template) {
            return Err(RenameError::InvalidCharacters(template.to_string()));
        }
        if !template.contains(placeholder) {
            return Err(RenameError::MissingPlaceholder(placeholder));
        }

        let runs = Regex::new(&format!("{}+", regex::escape(&placeholder.to_string())))
            .map_err(|_| RenameError::InvalidPlaceholder(placeholder))?;
        Ok(Self {
            template: template.to_string(),
            runs,
        })
    }

    pub fn render(&self, counter: u64) -> String {
        self.runs
            .replace_all(&self.template, |caps: &Captures| {
                let width = caps[0].chars().count();
                format!("{:0width$}", counter, width = width)
            })
            .into_owned()
    }
}

/// One-shot form of [`RenameRule::compile`] followed by [`CompiledRule::apply`].
pub fn rename_stem(
    stem: &str,
    mode: RenameMode,
    parameter: &str,
    counter: u64,
) -> Result<String, RenameError> {
    let rule = RenameRule::new(mode, parameter).compile()?;
    Ok(rule.apply(stem, counter))
}

fn parse_count(value: &str) -> Result<i64, RenameError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| RenameError::InvalidParameter(value.to_string()))
}

// Negative positions count from the end; out-of-range positions clamp.
fn char_offset(len: usize, n: i64) -> usize {
    if n < 0 {
        let back = usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX);
        len.saturating_sub(back)
    } else {
        usize::try_from(n).unwrap_or(usize::MAX).min(len)
    }
}
