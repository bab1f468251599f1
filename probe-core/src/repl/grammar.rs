#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the probe console.
//!
//! This module exposes an embedded-friendly lexer/parser pipeline. The lexer
//! uses `regal` to produce a bounded token stream, while the parser composes
//! `winnow` combinators over those tokens to build structured command values.

use super::catalog::{
    self, ChoiceBranch, ChoiceTag, CommandTag, HelpTopics, Node, SubcommandBranch, SubcommandTag,
    ValueSpec,
};
use core::fmt;
use core::ops::Range;
use core::time::Duration;

use crate::config::{ResponsePolicy, StimulusEdge};
use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
#[allow(deprecated)]
use winnow::error::ErrorKind;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::stream::Stream;

/// Maximum number of tokens produced per console line. Commands remain short
/// and bounded.
pub const MAX_TOKENS: usize = 32;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Lexical token kinds recognized by the console grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Unsuffixed integer literal, read as milliseconds in duration slots.
    #[regex(r"[0-9]+")]
    Integer,
    /// Identifier or keyword (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9-]*")]
    Ident,
    /// CLI-style flag placeholder (future extension).
    #[regex(r"-{1,2}[A-Za-z][A-Za-z0-9-]*")]
    Flag,
    /// Inline whitespace is ignored.
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

/// Bounded token buffer to avoid dynamic allocation in `no_std` environments.
pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

/// Lexer errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

/// Grammar errors emitted by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: Option<TokenKind>,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    InvalidDuration {
        span: Range<usize>,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl<'a> fmt::Display for GrammarErrorKind<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found {found:?} at {span:?}"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::InvalidDuration { span } => {
                write!(f, "invalid duration literal at {span:?}")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

/// Wrapper type enabling a consistent error surface for consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl<'a> fmt::Display for GrammarError<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: Some(tok.kind),
                    span: tok.span.clone(),
                },
                None => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn invalid_duration(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidDuration {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

#[allow(deprecated)]
impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    fn from_error_kind(input: &Input<'src, 'slice>, _kind: ErrorKind) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn append(
        self,
        _input: &Input<'src, 'slice>,
        _token_start: &<Input<'src, 'slice> as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl<'a> fmt::Display for ParseError<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Trigger,
    Latency,
    Config(ConfigCommand),
    Unlock,
    Lock,
    Status,
    Help(HelpCommand<'a>),
}

/// Configuration subcommands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigCommand {
    Show,
    Stimulus(StimulusEdge),
    Response(ResponsePolicy),
    Reset(Duration),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

pub(crate) fn parse_tokens_partial<'src, 'slice>(
    tokens: &'slice [Token<'src>],
) -> Result<(Command<'src>, &'slice [Token<'src>]), GrammarError<'src>>
where
    'src: 'slice,
{
    let mut input = tokens;
    match command().parse_next(&mut input) {
        Ok(cmd) => Ok((cmd, input)),
        Err(ErrMode::Backtrack(err)) | Err(ErrMode::Cut(err)) => Err(err),
        Err(ErrMode::Incomplete(_)) => Err(GrammarError::unexpected("token", input.first())),
    }
}

/// Tokenize the provided line.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        if buffer
            .push(Token {
                kind: record.token,
                lexeme,
                span,
            })
            .is_err()
        {
            return Err(LexError::TooManyTokens {
                processed: buffer.len() + 1,
            });
        }
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let end = start + partial.fragment.len();
        let span = start..end;
        if buffer
            .push(Token {
                kind: TokenKind::Error,
                lexeme: partial.fragment,
                span,
            })
            .is_err()
        {
            return Err(LexError::TooManyTokens {
                processed: buffer.len() + 1,
            });
        }
    }

    Ok(buffer)
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a console command from the provided line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    for token in tokens.iter() {
        if token.kind == TokenKind::Error {
            return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
        }
    }

    let (command, mut rest) =
        parse_tokens_partial(tokens.as_slice()).map_err(ParseError::Grammar)?;

    while let Some((token, remaining)) = rest.split_first() {
        if token.kind == TokenKind::Eol {
            rest = remaining;
        } else {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "end of command",
                Some(token),
            )));
        }
    }

    Ok(command)
}

fn command<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Command<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let snapshot = *input;
        let command_token = expect_kind(TokenKind::Ident, "command keyword").parse_next(input)?;

        match catalog::find(command_token.lexeme) {
            Some(spec) => {
                let mut state = CommandState::new(spec.tag);
                parse_node(spec.grammar, input, &mut state)?;
                state.finish()
            }
            None => {
                *input = snapshot;
                Err(ErrMode::Backtrack(GrammarError::unexpected(
                    "command keyword",
                    Some(&command_token),
                )))
            }
        }
    }
}

fn parse_node<'src, 'slice>(
    node: &'static Node,
    input: &mut Input<'src, 'slice>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match node {
        Node::End => Ok(()),
        Node::OptionalChoice { choices } => parse_optional_choice(input, choices, state),
        Node::Subcommands { branches, default } => {
            parse_subcommands(input, branches, *default, state)
        }
        Node::Value { spec, tag, next } => {
            let value = parse_value(input, *spec)?;
            state.apply_choice(*tag, value)?;
            parse_node(next, input, state)
        }
        Node::Topic { topics, next } => {
            parse_topic(*topics, input, state)?;
            parse_node(next, input, state)
        }
    }
}

fn parse_optional_choice<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    choices: &'static [ChoiceBranch],
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            if let Some(branch) = find_choice(choices, token.lexeme) {
                *input = rest;
                parse_choice_branch(input, branch, state)
            } else {
                Err(ErrMode::Backtrack(GrammarError::unexpected(
                    choice_expected_label(choices),
                    Some(token),
                )))
            }
        }
        Some((token, _)) if token.kind == TokenKind::Eol => Ok(()),
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            choice_expected_label(choices),
            Some(token),
        ))),
        None => Ok(()),
    }
}

fn parse_choice_branch<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    branch: &'static ChoiceBranch,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    let value = parse_value(input, branch.value)?;
    state.apply_choice(branch.tag, value)?;
    parse_node(branch.next, input, state)
}

fn parse_subcommands<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    branches: &'static [SubcommandBranch],
    default: Option<SubcommandTag>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            if let Some(branch) = branches
                .iter()
                .find(|candidate| candidate.name.eq_ignore_ascii_case(token.lexeme))
            {
                *input = rest;
                state.set_subcommand(branch.tag);
                parse_node(branch.grammar, input, state)
            } else {
                Err(ErrMode::Backtrack(GrammarError::unexpected(
                    subcommand_expected_label(branches),
                    Some(token),
                )))
            }
        }
        Some((token, _)) if token.kind == TokenKind::Eol => {
            if let Some(tag) = default {
                state.set_subcommand(tag);
                Ok(())
            } else {
                Err(ErrMode::Backtrack(GrammarError::unexpected(
                    subcommand_expected_label(branches),
                    Some(token),
                )))
            }
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            subcommand_expected_label(branches),
            Some(token),
        ))),
        None => {
            if let Some(tag) = default {
                state.set_subcommand(tag);
                Ok(())
            } else {
                Err(ErrMode::Backtrack(GrammarError::unexpected(
                    subcommand_expected_label(branches),
                    None,
                )))
            }
        }
    }
}

fn parse_topic<'src, 'slice>(
    _topics: HelpTopics,
    input: &mut Input<'src, 'slice>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    state.set_topic(None);

    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            state.set_topic(Some(token.lexeme));
            *input = rest;
            Ok(())
        }
        Some((token, _)) if token.kind == TokenKind::Eol => Ok(()),
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            "identifier",
            Some(token),
        ))),
        None => Ok(()),
    }
}

fn parse_value<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    spec: ValueSpec,
) -> Result<ChoiceValue, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match spec {
        ValueSpec::None => Ok(ChoiceValue::None),
        ValueSpec::Duration => match input.split_first() {
            Some((token, rest)) if token.kind == TokenKind::Duration => {
                let duration = parse_duration(token).map_err(ErrMode::Cut)?;
                *input = rest;
                Ok(ChoiceValue::Duration(duration))
            }
            Some((token, rest)) if token.kind == TokenKind::Integer => {
                let duration = parse_integer_millis(token).map_err(ErrMode::Cut)?;
                *input = rest;
                Ok(ChoiceValue::Duration(duration))
            }
            other => Err(ErrMode::Backtrack(GrammarError::unexpected(
                "duration",
                other.map(|(token, _)| token),
            ))),
        },
    }
}

fn find_choice(choices: &'static [ChoiceBranch], lexeme: &str) -> Option<&'static ChoiceBranch> {
    choices
        .iter()
        .find(|choice| choice.keyword.eq_ignore_ascii_case(lexeme))
}

fn choice_expected_label(choices: &'static [ChoiceBranch]) -> &'static str {
    choices
        .first()
        .map(|choice| choice.keyword)
        .unwrap_or("keyword")
}

fn subcommand_expected_label(branches: &'static [SubcommandBranch]) -> &'static str {
    branches
        .first()
        .map(|branch| branch.name)
        .unwrap_or("subcommand")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChoiceValue {
    None,
    Duration(Duration),
}

enum CommandState<'a> {
    Trigger,
    Latency,
    Config {
        subcommand: Option<SubcommandTag>,
        edge: Option<StimulusEdge>,
        policy: Option<ResponsePolicy>,
        reset: Option<Duration>,
    },
    Unlock,
    Lock,
    Status,
    Help {
        topic: Option<&'a str>,
    },
}

impl<'a> CommandState<'a> {
    fn new(tag: CommandTag) -> Self {
        match tag {
            CommandTag::Trigger => CommandState::Trigger,
            CommandTag::Latency => CommandState::Latency,
            CommandTag::Config => CommandState::Config {
                subcommand: None,
                edge: None,
                policy: None,
                reset: None,
            },
            CommandTag::Unlock => CommandState::Unlock,
            CommandTag::Lock => CommandState::Lock,
            CommandTag::Status => CommandState::Status,
            CommandTag::Help => CommandState::Help { topic: None },
        }
    }

    fn apply_choice(
        &mut self,
        tag: ChoiceTag,
        value: ChoiceValue,
    ) -> Result<(), ErrMode<GrammarError<'a>>> {
        match (self, tag, value) {
            (CommandState::Config { edge, .. }, ChoiceTag::StimulusRise, _) => {
                *edge = Some(StimulusEdge::Rise);
                Ok(())
            }
            (CommandState::Config { edge, .. }, ChoiceTag::StimulusFall, _) => {
                *edge = Some(StimulusEdge::Fall);
                Ok(())
            }
            (CommandState::Config { edge, .. }, ChoiceTag::StimulusToggle, _) => {
                *edge = Some(StimulusEdge::Toggle);
                Ok(())
            }
            (CommandState::Config { policy, .. }, ChoiceTag::ResponseSame, _) => {
                *policy = Some(ResponsePolicy::Same);
                Ok(())
            }
            (CommandState::Config { policy, .. }, ChoiceTag::ResponseReverse, _) => {
                *policy = Some(ResponsePolicy::Reverse);
                Ok(())
            }
            (CommandState::Config { policy, .. }, ChoiceTag::ResponseRise, _) => {
                *policy = Some(ResponsePolicy::Rise);
                Ok(())
            }
            (CommandState::Config { policy, .. }, ChoiceTag::ResponseFall, _) => {
                *policy = Some(ResponsePolicy::Fall);
                Ok(())
            }
            (
                CommandState::Config { reset, .. },
                ChoiceTag::ResetAfter,
                ChoiceValue::Duration(duration),
            ) => {
                *reset = Some(duration);
                Ok(())
            }
            (_, unexpected_tag, _) => {
                let _ = unexpected_tag;
                Err(ErrMode::Backtrack(GrammarError::unexpected("choice", None)))
            }
        }
    }

    fn set_subcommand(&mut self, tag: SubcommandTag) {
        if let CommandState::Config { subcommand, .. } = self {
            *subcommand = Some(tag);
        } else {
            unreachable!("subcommands only apply to config commands");
        }
    }

    fn set_topic(&mut self, topic: Option<&'a str>) {
        if let CommandState::Help { topic: slot } = self {
            *slot = topic;
        }
    }

    fn finish(self) -> Result<Command<'a>, ErrMode<GrammarError<'a>>> {
        match self {
            CommandState::Trigger => Ok(Command::Trigger),
            CommandState::Latency => Ok(Command::Latency),
            CommandState::Unlock => Ok(Command::Unlock),
            CommandState::Lock => Ok(Command::Lock),
            CommandState::Status => Ok(Command::Status),
            CommandState::Help { topic } => Ok(Command::Help(HelpCommand { topic })),
            CommandState::Config {
                subcommand: Some(SubcommandTag::ConfigShow),
                ..
            } => Ok(Command::Config(ConfigCommand::Show)),
            CommandState::Config {
                subcommand: Some(SubcommandTag::ConfigStimulus),
                edge: Some(edge),
                ..
            } => Ok(Command::Config(ConfigCommand::Stimulus(edge))),
            CommandState::Config {
                subcommand: Some(SubcommandTag::ConfigResponse),
                policy: Some(policy),
                ..
            } => Ok(Command::Config(ConfigCommand::Response(policy))),
            CommandState::Config {
                subcommand: Some(SubcommandTag::ConfigReset),
                reset: Some(duration),
                ..
            } => Ok(Command::Config(ConfigCommand::Reset(duration))),
            CommandState::Config {
                subcommand: Some(SubcommandTag::ConfigStimulus),
                ..
            } => Err(ErrMode::Backtrack(GrammarError::unexpected(
                "stimulus edge",
                None,
            ))),
            CommandState::Config {
                subcommand: Some(SubcommandTag::ConfigResponse),
                ..
            } => Err(ErrMode::Backtrack(GrammarError::unexpected(
                "response policy",
                None,
            ))),
            CommandState::Config {
                subcommand: Some(SubcommandTag::ConfigReset),
                ..
            } => Err(ErrMode::Backtrack(GrammarError::unexpected(
                "duration",
                None,
            ))),
            CommandState::Config {
                subcommand: None, ..
            } => Err(ErrMode::Backtrack(GrammarError::unexpected(
                "config subcommand",
                None,
            ))),
        }
    }
}

fn expect_kind<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(label, None))),
    }
}

fn parse_duration<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    let text = token.lexeme;
    if let Some(rest) = text.strip_suffix("ms") {
        let millis = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_millis(millis.into()))
    } else if let Some(rest) = text.strip_suffix('s') {
        let seconds = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_secs(seconds.into()))
    } else {
        Err(GrammarError::invalid_duration(token))
    }
}

fn parse_integer_millis<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    let millis = token
        .lexeme
        .parse::<u32>()
        .map_err(|_| GrammarError::invalid_duration(token))?;
    Ok(Duration::from_millis(millis.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Command<'_> {
        parse(input).expect("command should parse")
    }

    #[test]
    fn parses_bare_commands() {
        assert_eq!(parse_ok("trigger"), Command::Trigger);
        assert_eq!(parse_ok("latency"), Command::Latency);
        assert_eq!(parse_ok("unlock"), Command::Unlock);
        assert_eq!(parse_ok("lock"), Command::Lock);
        assert_eq!(parse_ok("status"), Command::Status);
    }

    #[test]
    fn bare_config_defaults_to_show() {
        assert_eq!(parse_ok("config"), Command::Config(ConfigCommand::Show));
        assert_eq!(parse_ok("config show"), Command::Config(ConfigCommand::Show));
    }

    #[test]
    fn parses_stimulus_choices() {
        assert_eq!(
            parse_ok("config stimulus rise"),
            Command::Config(ConfigCommand::Stimulus(StimulusEdge::Rise))
        );
        assert_eq!(
            parse_ok("config stimulus fall"),
            Command::Config(ConfigCommand::Stimulus(StimulusEdge::Fall))
        );
        assert_eq!(
            parse_ok("config stimulus toggle"),
            Command::Config(ConfigCommand::Stimulus(StimulusEdge::Toggle))
        );
    }

    #[test]
    fn parses_response_choices() {
        assert_eq!(
            parse_ok("config response reverse"),
            Command::Config(ConfigCommand::Response(ResponsePolicy::Reverse))
        );
        assert_eq!(
            parse_ok("config response fall"),
            Command::Config(ConfigCommand::Response(ResponsePolicy::Fall))
        );
    }

    #[test]
    fn parses_reset_duration_suffixes() {
        match parse_ok("config reset 100ms") {
            Command::Config(ConfigCommand::Reset(duration)) => {
                assert_eq!(duration, Duration::from_millis(100));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        match parse_ok("config reset 2s") {
            Command::Config(ConfigCommand::Reset(duration)) => {
                assert_eq!(duration, Duration::from_secs(2));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn bare_integers_read_as_milliseconds() {
        match parse_ok("config reset 250") {
            Command::Config(ConfigCommand::Reset(duration)) => {
                assert_eq!(duration, Duration::from_millis(250));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn missing_values_are_rejected() {
        assert!(parse("config stimulus").is_err());
        assert!(parse("config response").is_err());
        assert!(parse("config reset").is_err());
        assert!(parse("config reset soon").is_err());
    }

    #[test]
    fn unknown_choice_is_rejected() {
        match parse("config stimulus spike") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::UnexpectedToken { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn parses_help_topic() {
        assert_eq!(
            parse_ok("help trigger"),
            Command::Help(HelpCommand {
                topic: Some("trigger"),
            })
        );
        assert_eq!(parse_ok("help"), Command::Help(HelpCommand { topic: None }));
    }

    #[test]
    fn rejects_invalid_token() {
        match parse("trigger$") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::InvalidToken { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_trailing_arguments() {
        match parse("trigger now") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::UnexpectedToken { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn supports_case_insensitive_keywords() {
        assert_eq!(
            parse_ok("CoNfIg StImUlUs ToGgLe"),
            Command::Config(ConfigCommand::Stimulus(StimulusEdge::Toggle))
        );
    }

    #[test]
    fn accepts_line_terminators() {
        assert_eq!(parse_ok("trigger\r\n"), Command::Trigger);
        assert_eq!(
            parse_ok("config stimulus fall\n"),
            Command::Config(ConfigCommand::Stimulus(StimulusEdge::Fall))
        );
    }

    #[test]
    fn lexer_emits_error_token_for_unknown_symbol() {
        let tokens = lex("trigger$").expect("lexing should succeed");
        let last = tokens.last().expect("expected at least one token");
        assert_eq!(last.kind, TokenKind::Error);
        assert_eq!(last.lexeme, "$");
    }

    #[test]
    fn unknown_command_reports_keyword_error() {
        match parse("launch") {
            Err(ParseError::Grammar(err)) => match err.kind {
                GrammarErrorKind::UnexpectedToken { expected, .. } => {
                    assert_eq!(expected, "command keyword");
                }
                other => panic!("unexpected error kind: {other:?}"),
            },
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
