// parser.rs — Parser for the textual graph IR
//
// Parses a token stream (from the lexer) into the syntax tree in `ast`.
// Uses chumsky combinators; region bodies are recursive.
//
//   graph     := 'graph' block
//   block     := '(' decls? ')' '{' inst* ('return' '(' names? ')')? '}'
//   inst      := (decls '=')? OPNAME attrs? '(' names? ')' regions?
//   regions   := '{' ('block' block)* '}'
//   attrs     := '[' IDENT '=' attr (',' IDENT '=' attr)* ']'
//   attr      := tensor | '[' ints ']' | INT | FLOAT | STRING
//   tensor    := 'tensor' '<' KIND '>' ('[' dims ']')? '{' elements? '}'
//   decl      := VALUE (':' KIND)?
//
// Preconditions: input is a token stream from `lexer::lex()`.
// Postconditions: returns a syntax tree plus any parse errors.
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::kind::ScalarKind;
use crate::lexer::Token;

/// Result of parsing: syntax tree plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub graph: Option<Block>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse textual IR. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = graph_parser(source);
    let (graph, parse_errors) = parser.parse(stream).into_output_errors();

    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        graph,
        errors: all_errors,
    }
}

// ── Parser builder ──
//
// Every rule is built inside `graph_parser` so the `source` reference is
// captured once and shared by all combinators.

fn graph_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Block, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // ── Names and kinds ──

    let value_name = just(Token::ValueName).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Name {
            name: source[span.start() + 1..span.end()].to_string(),
            span,
        }
    });

    let kind = just(Token::Ident).try_map(move |_, span: SimpleSpan| {
        let name = &source[span.start()..span.end()];
        ScalarKind::from_name(name).ok_or_else(|| {
            Rich::custom(
                span,
                format!(
                    "expected scalar kind (bool, u8, i8, i16, i32, i64, f16, bf16, f32, f64), found '{name}'"
                ),
            )
        })
    });

    let value_decl = value_name
        .clone()
        .then(just(Token::Colon).ignore_then(kind.clone()).or_not())
        .map(|(name, kind)| ValueDecl { name, kind });

    let params = value_decl
        .clone()
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let operands = value_name
        .clone()
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    // ── Tensor literal ──

    let element = select! {
        Token::True => Element::Bool(true),
        Token::False => Element::Bool(false),
        Token::Int(n) => Element::Int(n),
        Token::Float(v) => Element::Float(v),
        Token::Nan => Element::Float(f64::NAN),
        Token::Inf => Element::Float(f64::INFINITY),
        Token::NegInf => Element::Float(f64::NEG_INFINITY),
    };

    let dims = select! {
        Token::Int(n) if n >= 0 => n as usize,
    }
    .separated_by(just(Token::Comma))
    .collect::<Vec<_>>()
    .delimited_by(just(Token::LBracket), just(Token::RBracket));

    let tensor = just(Token::Tensor)
        .ignore_then(kind.clone().delimited_by(just(Token::Lt), just(Token::Gt)))
        .then(dims.or_not())
        .then(
            element
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LBrace), just(Token::RBrace)),
        )
        .map_with(|((kind, dims), elements), e| TensorSyntax {
            kind,
            dims: dims.unwrap_or_default(),
            elements,
            span: e.span(),
        });

    // ── Attributes ──

    let int_list = select! { Token::Int(n) => n }
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LBracket), just(Token::RBracket));

    let attr_value = choice((
        tensor.map(AttrValue::Tensor),
        int_list.map(AttrValue::Ints),
        select! {
            Token::Int(n) => AttrValue::Int(n),
            Token::Float(v) => AttrValue::Float(v),
            Token::Nan => AttrValue::Float(f64::NAN),
            Token::Inf => AttrValue::Float(f64::INFINITY),
            Token::NegInf => AttrValue::Float(f64::NEG_INFINITY),
            Token::StringLit(s) => AttrValue::Str(s),
        },
    ));

    let attr_name = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        source[span.start()..span.end()].to_string()
    });

    let attrs = attr_name
        .then_ignore(just(Token::Equals))
        .then(attr_value)
        .map_with(|(name, value), e| AttrDef {
            name,
            value,
            span: e.span(),
        })
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LBracket), just(Token::RBracket));

    let op_name = just(Token::OpName).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        (source[span.start()..span.end()].to_string(), span)
    });

    // ── Blocks and instructions ──

    let block = recursive(|block| {
        let regions = just(Token::Block)
            .ignore_then(block)
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace));

        let outputs = value_decl
            .clone()
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>()
            .then_ignore(just(Token::Equals));

        let inst = outputs
            .or_not()
            .then(op_name.clone())
            .then(attrs.clone().or_not())
            .then(operands.clone())
            .then(regions.or_not())
            .map_with(
                |((((outputs, (op, op_span)), attrs), inputs), regions), e| InstDef {
                    outputs: outputs.unwrap_or_default(),
                    op,
                    op_span,
                    attrs: attrs.unwrap_or_default(),
                    inputs,
                    regions: regions.unwrap_or_default(),
                    span: e.span(),
                },
            );

        let returns = just(Token::Return).ignore_then(operands.clone());

        params
            .clone()
            .then(
                inst.repeated()
                    .collect::<Vec<_>>()
                    .then(returns.or_not())
                    .delimited_by(just(Token::LBrace), just(Token::RBrace)),
            )
            .map_with(|(params, (insts, returns)), e| Block {
                params,
                insts,
                returns: returns.unwrap_or_default(),
                span: e.span(),
            })
    });

    just(Token::Graph).ignore_then(block)
}

// ── Tests ──
