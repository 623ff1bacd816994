use std::path::Path;

use anyhow::Context;
use tracing::info;
use winnow::{
    ModalResult, Parser,
    ascii::{multispace0, multispace1, space0, till_line_ending},
    combinator::{alt, opt, preceded, repeat},
    error::{ContextError, ParseError, StrContext},
    token::take_while,
};

/// A blocklist file that failed to parse, with the offending span of the
/// input kept for rendering.
#[derive(Debug)]
pub struct BlocklistError {
    message: String,
    span: std::ops::Range<usize>,
    input: String,
}

impl BlocklistError {
    fn from_parse(error: ParseError<&str, ContextError>) -> Self {
        Self {
            message: error.inner().to_string(),
            input: (*error.input()).to_owned(),
            span: error.char_span(),
        }
    }
}

impl std::fmt::Display for BlocklistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = annotate_snippets::Level::ERROR
            .primary_title(&self.message)
            .element(
                annotate_snippets::Snippet::source(&self.input)
                    .fold(true)
                    .annotation(annotate_snippets::AnnotationKind::Primary.span(self.span.clone())),
            );
        let renderer = annotate_snippets::Renderer::plain();
        let rendered = renderer.render(&[message]);
        rendered.fmt(f)
    }
}

impl std::error::Error for BlocklistError {}

fn parse_hostname(input: &mut &str) -> ModalResult<String> {
    take_while(1.., |c: char| {
        c.is_alphanumeric() || c == '.' || c == '-' || c == '_'
    })
    .map(|host: &str| host.to_string())
    .parse_next(input)
}

fn parse_comment<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded('#', till_line_ending).parse_next(input)
}

fn parse_comments_or_empty(input: &mut &str) -> ModalResult<()> {
    repeat(
        1..,
        alt((
            multispace1.context(StrContext::Label("empty line")).void(),
            parse_comment.context(StrContext::Label("comment")).void(),
        ))
        .void(),
    )
    .parse_next(input)
}

fn parse_entry(input: &mut &str) -> ModalResult<String> {
    (
        opt(parse_comments_or_empty),
        parse_hostname.context(StrContext::Label("hostname")),
        space0,
        opt(parse_comment.context(StrContext::Label("trailing comment"))),
        multispace0,
    )
        .map(|(_, host, _, _, _)| host)
        .parse_next(input)
}

/// Parse a blocklist: one hostname per line, `#` comments and blank lines
/// allowed anywhere.
pub fn parse_blocklist(input: &str) -> Result<Vec<String>, BlocklistError> {
    (
        repeat(0.., parse_entry.context(StrContext::Label("blocklist entry"))),
        opt(parse_comments_or_empty),
    )
        .map(|(hosts, _): (Vec<String>, _)| hosts)
        .parse(input)
        .map_err(BlocklistError::from_parse)
}

pub fn load_hosts_from_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let contents = String::from_utf8_lossy(
        &std::fs::read(path).context("while reading blocklist file")?,
    )
    .into_owned();
    let hosts = parse_blocklist(&contents).context("while parsing blocklist")?;
    info!("Parsed {} blocked hostnames", hosts.len());
    Ok(hosts)
}
