//! Grammar-aware completion engine shared by firmware and emulator consoles.
//!
//! The line editor can invoke this module to look up suggestions based on the
//! current buffer contents and cursor position without pulling in `std`.

use super::grammar::{self, Command, GrammarErrorKind, Token, TokenKind};
use crate::config::{RESPONSE_POLICY_NAMES, STIMULUS_EDGE_NAMES};
use heapless::Vec as HeaplessVec;

const MAX_SUGGESTIONS: usize = 16;

const ROOT_COMMANDS: &[&str] = &[
    "trigger", "latency", "config", "unlock", "lock", "status", "help",
];
const CONFIG_SUBCOMMANDS: &[&str] = &["show", "stimulus", "response", "reset"];
const STIMULUS_VALUES: &[&str] = &STIMULUS_EDGE_NAMES;
const RESPONSE_VALUES: &[&str] = &RESPONSE_POLICY_NAMES;

/// Completion result returned to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionResult {
    /// Replacement metadata to apply automatically when only one candidate
    /// matches or when a longer shared prefix exists across candidates.
    pub replacement: Option<Replacement>,
    /// Candidate list corresponding to the current cursor position. An empty
    /// list indicates that no completions were found.
    pub options: HeaplessVec<&'static str, MAX_SUGGESTIONS>,
}

/// Replacement metadata describing which portion of the buffer should be
/// substituted by the completion string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub value: &'static str,
    pub append_space: bool,
}

/// Stateless completion engine that mirrors the console grammar.
#[derive(Default)]
pub struct CompletionEngine;

impl CompletionEngine {
    /// Creates a new completion engine.
    pub const fn new() -> Self {
        Self
    }

    /// Computes completions for the provided buffer at the supplied cursor
    /// position.
    ///
    /// The cursor must be positioned at a valid UTF-8 boundary; the caller is
    /// expected to enforce ASCII-only input.
    pub fn complete(&self, buffer: &str, cursor: usize) -> CompletionResult {
        if cursor > buffer.len() {
            return CompletionResult {
                replacement: None,
                options: HeaplessVec::new(),
            };
        }

        let upto_cursor = &buffer[..cursor];
        let prefix_start = token_start(upto_cursor);
        let prefix = &upto_cursor[prefix_start..];
        let leading = &upto_cursor[..prefix_start];

        let leading_tokens = match grammar::lex(leading) {
            Ok(tokens) => tokens,
            Err(_) => {
                return CompletionResult {
                    replacement: None,
                    options: HeaplessVec::new(),
                };
            }
        };

        if leading_tokens
            .iter()
            .any(|token| token.kind == TokenKind::Error)
        {
            return CompletionResult {
                replacement: None,
                options: HeaplessVec::new(),
            };
        }

        let context = determine_context(leading_tokens.as_slice());
        let candidates = match context {
            CompletionContext::Root => ROOT_COMMANDS,
            CompletionContext::ConfigKeyword => CONFIG_SUBCOMMANDS,
            CompletionContext::StimulusValue => STIMULUS_VALUES,
            CompletionContext::ResponseValue => RESPONSE_VALUES,
            CompletionContext::HelpTopic => ROOT_COMMANDS,
            CompletionContext::None => {
                return CompletionResult {
                    replacement: None,
                    options: HeaplessVec::new(),
                };
            }
        };

        let mut matches: HeaplessVec<&'static str, MAX_SUGGESTIONS> = HeaplessVec::new();
        for candidate in candidates {
            if starts_with_ignore_ascii_case(candidate, prefix) {
                let _ = matches.push(*candidate);
            }
        }

        if matches.is_empty() {
            return CompletionResult {
                replacement: None,
                options: matches,
            };
        }

        let matches_slice = matches.as_slice();
        let mut append_space = false;
        let replacement_value = if matches_slice.len() == 1 {
            let candidate = matches_slice[0];
            append_space = should_append_space(context, candidate);
            Some(candidate)
        } else {
            let lcp = longest_common_prefix(matches_slice);
            let shared = common_prefix_len_ignore_case(prefix, lcp);
            if lcp.len() > shared { Some(lcp) } else { None }
        };

        let replacement = replacement_value.map(|value| Replacement {
            start: prefix_start,
            end: cursor,
            value,
            append_space,
        });

        CompletionResult {
            replacement,
            options: matches,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CompletionContext {
    Root,
    ConfigKeyword,
    StimulusValue,
    ResponseValue,
    HelpTopic,
    None,
}

fn determine_context(tokens: &[Token<'_>]) -> CompletionContext {
    if tokens.is_empty() {
        return CompletionContext::Root;
    }

    if tokens.iter().any(|token| token.kind == TokenKind::Error) {
        return CompletionContext::None;
    }

    match grammar::parse_tokens_partial(tokens) {
        Ok((command, _)) => classify_success(tokens, &command),
        Err(err) => classify_error(tokens, &err.kind),
    }
}

fn classify_success(tokens: &[Token<'_>], command: &Command<'_>) -> CompletionContext {
    match command {
        Command::Config(_) if tokens.len() == 1 => CompletionContext::ConfigKeyword,
        Command::Help(_) if tokens.len() == 1 => CompletionContext::HelpTopic,
        _ => infer_from_tokens(tokens),
    }
}

fn classify_error(tokens: &[Token<'_>], error: &GrammarErrorKind<'_>) -> CompletionContext {
    let expected = match error {
        GrammarErrorKind::UnexpectedEnd { expected } => *expected,
        GrammarErrorKind::UnexpectedToken { expected, .. } => *expected,
        _ => return infer_from_tokens(tokens),
    };

    match expected {
        "command keyword" => CompletionContext::Root,
        "show" | "config subcommand" => CompletionContext::ConfigKeyword,
        "rise" | "stimulus edge" => CompletionContext::StimulusValue,
        "same" | "response policy" => CompletionContext::ResponseValue,
        "identifier" if first_token_is(tokens, "help") => CompletionContext::HelpTopic,
        _ => infer_from_tokens(tokens),
    }
}

fn infer_from_tokens(tokens: &[Token<'_>]) -> CompletionContext {
    match tokens {
        [] => CompletionContext::Root,
        [first] if equals_ignore_ascii_case(first.lexeme, "config") => {
            CompletionContext::ConfigKeyword
        }
        [first, second]
            if equals_ignore_ascii_case(first.lexeme, "config")
                && equals_ignore_ascii_case(second.lexeme, "stimulus") =>
        {
            CompletionContext::StimulusValue
        }
        [first, second]
            if equals_ignore_ascii_case(first.lexeme, "config")
                && equals_ignore_ascii_case(second.lexeme, "response") =>
        {
            CompletionContext::ResponseValue
        }
        [first] if equals_ignore_ascii_case(first.lexeme, "help") => CompletionContext::HelpTopic,
        _ => CompletionContext::None,
    }
}

fn first_token_is(tokens: &[Token<'_>], expected: &str) -> bool {
    tokens
        .first()
        .map(|token| equals_ignore_ascii_case(token.lexeme, expected))
        .unwrap_or(false)
}

fn token_start(buffer: &str) -> usize {
    let mut index = buffer.len();
    let bytes = buffer.as_bytes();
    while index > 0 {
        let byte = bytes[index - 1];
        if byte == b' ' || byte == b'\t' {
            break;
        }
        index -= 1;
    }
    index
}

fn equals_ignore_ascii_case(lhs: &str, rhs: &str) -> bool {
    lhs.eq_ignore_ascii_case(rhs)
}

fn starts_with_ignore_ascii_case(candidate: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }

    if prefix.len() > candidate.len() {
        return false;
    }

    candidate[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn common_prefix_len_ignore_case(lhs: &str, rhs: &str) -> usize {
    lhs.as_bytes()
        .iter()
        .zip(rhs.as_bytes())
        .take_while(|(l, r)| l.eq_ignore_ascii_case(r))
        .count()
}

fn longest_common_prefix(candidates: &[&'static str]) -> &'static str {
    if let Some((first, rest)) = candidates.split_first() {
        let mut prefix = *first;
        for candidate in rest {
            let len = common_prefix_len_ignore_case(prefix, candidate);
            prefix = &prefix[..len];
            if prefix.is_empty() {
                break;
            }
        }
        prefix
    } else {
        ""
    }
}

fn should_append_space(context: CompletionContext, candidate: &'static str) -> bool {
    if !matches!(context, CompletionContext::Root) {
        return false;
    }

    let tokens = match grammar::lex(candidate) {
        Ok(tokens) => tokens,
        Err(_) => return false,
    };

    !matches!(
        determine_context(tokens.as_slice()),
        CompletionContext::Root | CompletionContext::None
    )
}
