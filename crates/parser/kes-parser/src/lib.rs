//! Chunked, re-entrant parsing of session inputs
//!
//! Library files are parsed to exhaustion in a single call. Main-kind files
//! are pumped: each [`parse_chunk`] call consumes one chunk — a maximal run
//! of top-level statements (or, in low-level-IR mode, of IR definitions) —
//! and reports whether the buffer is exhausted, so the driver can interleave
//! incremental checking between pumps. Resume offsets live in [`ParseState`],
//! which is threaded through every call of one frontend run.

pub mod delayed;
pub mod lexer;
pub mod state;

pub use delayed::DelayedPolicy;
pub use lexer::is_identifier;
pub use state::{DelayedBody, ParseState, TopLevelScope};

use crate::lexer::{Lexer, Token, TokenKind};
use kes_ast::{BinOp, Block, Body, Decl, Expr, IrDef, IrModule, Param, SourceFile, SourceFileKind, Stmt};
use kes_buffers::Buffer;
use kes_diag::DiagnosticEngine;
use kes_intern::Interner;
use kes_span::{BufferId, BufferSpan, Span};

/// Result of one pump over a file
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChunkOutcome {
    /// Number of declarations appended to the file by this pump
    pub appended: usize,
    /// Whether the buffer has been fully consumed
    pub exhausted: bool,
}

/// Pumps the parser once over `file`
///
/// Appends one chunk's worth of declarations and, in low-level-IR mode,
/// captures IR definitions into `ir`. Pumping an already-exhausted file is a
/// no-op that reports exhausted.
pub fn parse_chunk(
    file: &mut SourceFile,
    buffer: &Buffer,
    ir: Option<&mut IrModule>,
    state: &mut ParseState,
    policy: &DelayedPolicy,
    diagnostics: &mut DiagnosticEngine,
    interner: &Interner,
) -> ChunkOutcome {
    if file.parse_complete {
        return ChunkOutcome {
            appended: 0,
            exhausted: true,
        };
    }

    let text = buffer.text();
    let source = text.as_ref();
    let mut start = state.resume_offset(buffer.id);

    // A hashbang line is tolerated at the very start of the main file.
    if start == 0 && file.kind == SourceFileKind::Main && source.starts_with("#!") {
        start = source.find('\n').map_or(source.len(), |eol| eol + 1);
    }

    let mut parser = Parser::new(source, buffer.id, start, diagnostics, interner);
    let before = file.decls.len();
    let mut ir = ir;

    loop {
        let token = parser.peek();
        if token.kind == TokenKind::Eof {
            break;
        }

        match token.kind {
            TokenKind::KwImport => {
                if let Some(decl) = parser.parse_import() {
                    file.decls.push(decl);
                }
            }
            TokenKind::KwFn => {
                if let Some(decl) = parser.parse_function(policy, state) {
                    file.decls.push(decl);
                }
            }
            TokenKind::KwIr => {
                let def = parser.parse_ir_def();
                match (&mut ir, file.kind) {
                    (Some(module), SourceFileKind::LowLevelIr) => {
                        if let Some(def) = def {
                            module.definitions.push(def);
                        }
                        // Chunk boundary: a maximal run of IR definitions.
                        if !parser.at(TokenKind::KwIr) {
                            break;
                        }
                    }
                    _ => {
                        parser.report(
                            "parser::ir_only_in_ir_mode",
                            "low-level IR definitions are only allowed in low-level IR input",
                            token.span,
                        );
                    }
                }
            }
            kind if is_statement_start(kind) => {
                if !statements_allowed(file.kind) {
                    parser.report(
                        "parser::statements_only_in_main",
                        "statements are only allowed at the top level of the main file",
                        token.span,
                    );
                }
                if let Some(decl) = parser.parse_statement_decl() {
                    file.decls.push(decl);
                }
                // Chunk boundary: a maximal run of top-level statements.
                if statements_allowed(file.kind) && !is_statement_start(parser.peek().kind) {
                    break;
                }
            }
            _ => {
                parser.report(
                    "parser::unexpected_token",
                    format!("unexpected token `{}`", token.text(source)),
                    token.span,
                );
                parser.bump();
            }
        }
    }

    let exhausted = parser.at(TokenKind::Eof);
    state.set_resume_offset(buffer.id, parser.resume_pos());
    if exhausted {
        file.parse_complete = true;
    }

    ChunkOutcome {
        appended: file.decls.len() - before,
        exhausted,
    }
}

/// Parses a library file in full
///
/// Library files never chunk, so a single pump must exhaust the buffer.
pub fn parse_source_file(
    file: &mut SourceFile,
    buffer: &Buffer,
    state: &mut ParseState,
    policy: &DelayedPolicy,
    diagnostics: &mut DiagnosticEngine,
    interner: &Interner,
) {
    let outcome = parse_chunk(file, buffer, None, state, policy, diagnostics, interner);
    debug_assert!(outcome.exhausted, "library parse returned early");
}

/// Realizes every delayed body in `file`, re-parsing the recorded spans
///
/// Returns the indices of the declarations whose bodies were realized.
pub fn realize_delayed_bodies(
    file: &mut SourceFile,
    buffer: &Buffer,
    diagnostics: &mut DiagnosticEngine,
    interner: &Interner,
) -> Vec<usize> {
    let text = buffer.text();
    let source = text.as_ref();
    let mut realized = Vec::new();

    for (index, decl) in file.decls.iter_mut().enumerate() {
        if let Decl::Function { body, .. } = decl
            && let Body::Delayed(span) = *body
        {
            let block = parse_block_at(source, buffer.id, span, diagnostics, interner);
            *body = Body::Parsed(block);
            realized.push(index);
        }
    }

    realized
}

/// Parses the brace-delimited block at `span` with a fresh sub-parser
fn parse_block_at(
    source: &str,
    buffer: BufferId,
    span: Span,
    diagnostics: &mut DiagnosticEngine,
    interner: &Interner,
) -> Block {
    let mut parser = Parser::new(source, buffer, span.start as usize, diagnostics, interner);
    parser.parse_block()
}

fn is_statement_start(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::KwLet | TokenKind::Ident | TokenKind::Int | TokenKind::Str | TokenKind::LParen
    )
}

fn statements_allowed(kind: SourceFileKind) -> bool {
    matches!(kind, SourceFileKind::Main | SourceFileKind::ReplLine)
}

struct Parser<'src, 'ctx> {
    source: &'src str,
    buffer: BufferId,
    lexer: Lexer<'src>,
    peeked: Option<Token>,
    diagnostics: &'ctx mut DiagnosticEngine,
    interner: &'ctx Interner,
}

impl<'src, 'ctx> Parser<'src, 'ctx> {
    fn new(
        source: &'src str,
        buffer: BufferId,
        start: usize,
        diagnostics: &'ctx mut DiagnosticEngine,
        interner: &'ctx Interner,
    ) -> Self {
        Self {
            source,
            buffer,
            lexer: Lexer::new(source, start),
            peeked: None,
            diagnostics,
            interner,
        }
    }

    fn peek(&mut self) -> Token {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token());
        }
        self.peeked.unwrap_or(Token {
            kind: TokenKind::Eof,
            span: Span::new(self.source.len() as u32, self.source.len() as u32),
        })
    }

    fn bump(&mut self) -> Token {
        let token = self.peek();
        self.peeked = None;
        token
    }

    fn at(&mut self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        self.at(kind).then(|| self.bump())
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Option<Token> {
        let token = self.peek();
        if token.kind == kind {
            return Some(self.bump());
        }
        self.report(
            "parser::missing_token",
            format!("expected {what}, found `{}`", describe(token, self.source)),
            token.span,
        );
        None
    }

    /// Byte offset at which a subsequent pump should resume
    fn resume_pos(&self) -> usize {
        self.peeked
            .map_or_else(|| self.lexer.pos(), |token| token.span.start as usize)
    }

    fn report(&mut self, code: &'static str, message: impl Into<String>, span: Span) {
        self.diagnostics
            .error(code, message, Some(BufferSpan::new(self.buffer, span)));
    }

    fn parse_import(&mut self) -> Option<Decl> {
        let keyword = self.bump();
        let name_token = self.expect(TokenKind::Ident, "a module name after `import`")?;
        let name = self.interner.intern(name_token.text(self.source));
        let end = self
            .eat(TokenKind::Semi)
            .map_or(name_token.span.end, |semi| semi.span.end);
        Some(Decl::Import {
            name,
            span: Span::new(keyword.span.start, end),
        })
    }

    fn parse_function(&mut self, policy: &DelayedPolicy, state: &mut ParseState) -> Option<Decl> {
        let keyword = self.bump();
        let name_token = self.expect(TokenKind::Ident, "a function name after `fn`")?;
        let name = self.interner.intern(name_token.text(self.source));

        let mut params = Vec::new();
        if self.expect(TokenKind::LParen, "`(`").is_some() {
            while let Some(param_token) = self.eat(TokenKind::Ident) {
                params.push(Param {
                    name: self.interner.intern(param_token.text(self.source)),
                    span: param_token.span,
                });
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "`)`")?;
        }

        if !self.at(TokenKind::LBrace) {
            let token = self.peek();
            self.report(
                "parser::missing_token",
                format!("expected `{{`, found `{}`", describe(token, self.source)),
                token.span,
            );
            return None;
        }

        let body = if *policy == DelayedPolicy::None {
            Body::Parsed(self.parse_block())
        } else {
            let span = self.scan_balanced_block();
            if policy.should_delay(self.buffer, span) {
                state.record_delayed(DelayedBody {
                    buffer: self.buffer,
                    span,
                });
                Body::Delayed(span)
            } else {
                Body::Parsed(parse_block_at(
                    self.source,
                    self.buffer,
                    span,
                    self.diagnostics,
                    self.interner,
                ))
            }
        };

        let end = match &body {
            Body::Parsed(block) => block.span.end,
            Body::Delayed(span) => span.end,
        };
        Some(Decl::Function {
            name,
            params,
            body,
            span: Span::new(keyword.span.start, end),
        })
    }

    fn parse_ir_def(&mut self) -> Option<IrDef> {
        let keyword = self.bump();
        let name_token = self.expect(TokenKind::Ident, "a definition name after `ir`")?;
        let name = self.interner.intern(name_token.text(self.source));

        if !self.at(TokenKind::LBrace) {
            let token = self.peek();
            self.report(
                "parser::missing_token",
                format!("expected `{{`, found `{}`", describe(token, self.source)),
                token.span,
            );
            return None;
        }

        // IR bodies stay opaque at this level; only the span is captured.
        let body = self.scan_balanced_block();
        Some(IrDef {
            name,
            span: Span::new(keyword.span.start, body.end),
            body,
        })
    }

    fn parse_statement_decl(&mut self) -> Option<Decl> {
        match self.parse_stmt()? {
            Stmt::Let { name, value, span } => Some(Decl::Binding { name, value, span }),
            Stmt::Expr { value, span } => Some(Decl::Expression { value, span }),
        }
    }

    fn parse_stmt(&mut self) -> Option<Stmt> {
        if self.at(TokenKind::KwLet) {
            let keyword = self.bump();
            let name_token = self.expect(TokenKind::Ident, "a name after `let`")?;
            let name = self.interner.intern(name_token.text(self.source));
            self.expect(TokenKind::Eq, "`=`")?;
            let value = self.parse_expr();
            let end = self
                .eat(TokenKind::Semi)
                .map_or(value.span().end, |semi| semi.span.end);
            return Some(Stmt::Let {
                name,
                value,
                span: Span::new(keyword.span.start, end),
            });
        }

        let value = self.parse_expr();
        let start = value.span().start;
        let end = self
            .eat(TokenKind::Semi)
            .map_or(value.span().end, |semi| semi.span.end);
        Some(Stmt::Expr {
            value,
            span: Span::new(start, end),
        })
    }

    fn parse_block(&mut self) -> Block {
        let open = self.bump();
        debug_assert_eq!(open.kind, TokenKind::LBrace);

        let mut stmts = Vec::new();
        let end = loop {
            match self.peek().kind {
                TokenKind::RBrace => break self.bump().span.end,
                TokenKind::Eof => {
                    self.report(
                        "parser::unterminated_body",
                        "this body is missing a closing `}`",
                        open.span,
                    );
                    break self.peek().span.end;
                }
                _ => {
                    if let Some(stmt) = self.parse_stmt() {
                        stmts.push(stmt);
                    } else {
                        // Recovery: skip the offending token.
                        self.bump();
                    }
                }
            }
        };

        Block {
            stmts,
            span: Span::new(open.span.start, end),
        }
    }

    /// Skips a brace-balanced body without parsing it, returning its span
    fn scan_balanced_block(&mut self) -> Span {
        let open = self.bump();
        debug_assert_eq!(open.kind, TokenKind::LBrace);

        let mut depth = 1_u32;
        let end;
        loop {
            let token = self.bump();
            match token.kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        end = token.span.end;
                        break;
                    }
                }
                TokenKind::Eof => {
                    self.report(
                        "parser::unterminated_body",
                        "this body is missing a closing `}`",
                        open.span,
                    );
                    end = token.span.end;
                    break;
                }
                _ => {}
            }
        }

        Span::new(open.span.start, end)
    }

    fn parse_expr(&mut self) -> Expr {
        let mut lhs = self.parse_primary();
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_primary();
            let span = Span::new(lhs.span().start, rhs.span().end);
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        lhs
    }

    fn parse_primary(&mut self) -> Expr {
        let token = self.peek();
        match token.kind {
            TokenKind::Ident => {
                self.bump();
                let name = self.interner.intern(token.text(self.source));
                let base = Expr::Name {
                    name,
                    span: token.span,
                };
                if self.at(TokenKind::LParen) {
                    self.parse_call(base)
                } else {
                    base
                }
            }
            TokenKind::Int => {
                self.bump();
                match token.text(self.source).parse::<i64>() {
                    Ok(value) => Expr::Int {
                        value,
                        span: token.span,
                    },
                    Err(_) => {
                        self.report(
                            "parser::int_overflow",
                            "integer literal does not fit in 64 bits",
                            token.span,
                        );
                        Expr::Error { span: token.span }
                    }
                }
            }
            TokenKind::Str => {
                self.bump();
                Expr::Str {
                    value: unescape(token.text(self.source)),
                    span: token.span,
                }
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr();
                self.expect(TokenKind::RParen, "`)`");
                inner
            }
            _ => {
                self.report(
                    "parser::unexpected_token",
                    format!("expected an expression, found `{}`", describe(token, self.source)),
                    token.span,
                );
                self.bump();
                Expr::Error { span: token.span }
            }
        }
    }

    fn parse_call(&mut self, callee: Expr) -> Expr {
        let open = self.bump();
        debug_assert_eq!(open.kind, TokenKind::LParen);

        let mut args = Vec::new();
        let end = loop {
            match self.peek().kind {
                TokenKind::RParen => break self.bump().span.end,
                TokenKind::Eof => {
                    self.report(
                        "parser::missing_token",
                        "expected `)` to close this call",
                        open.span,
                    );
                    break self.peek().span.end;
                }
                _ => {
                    args.push(self.parse_expr());
                    if self.eat(TokenKind::Comma).is_none() && !self.at(TokenKind::RParen) {
                        let token = self.peek();
                        self.report(
                            "parser::missing_token",
                            format!("expected `,` or `)`, found `{}`", describe(token, self.source)),
                            token.span,
                        );
                        break token.span.end;
                    }
                }
            }
        };

        let span = Span::new(callee.span().start, end);
        Expr::Call {
            callee: Box::new(callee),
            args,
            span,
        }
    }
}

fn describe(token: Token, source: &str) -> &str {
    if token.kind == TokenKind::Eof {
        "end of file"
    } else {
        token.text(source)
    }
}

/// Strips quotes and resolves the recognized escapes of a string literal
fn unescape(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .map_or(raw, |rest| rest.strip_suffix('"').unwrap_or(rest));
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kes_buffers::BufferRegistry;

    struct Fixture {
        buffers: BufferRegistry,
        diagnostics: DiagnosticEngine,
        interner: Interner,
        state: ParseState,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                buffers: BufferRegistry::new(),
                diagnostics: DiagnosticEngine::new(),
                interner: Interner::new(),
                state: ParseState::new(),
            }
        }

        fn file(&mut self, kind: SourceFileKind, source: &str) -> (SourceFile, BufferId) {
            let id = self.buffers.register_memory(source.as_bytes(), "test.kes");
            (SourceFile::new(kind, Some(id)), id)
        }

        fn pump(&mut self, file: &mut SourceFile, buffer: BufferId) -> ChunkOutcome {
            let buffer = self.buffers.get(buffer).clone();
            parse_chunk(
                file,
                &buffer,
                None,
                &mut self.state,
                &DelayedPolicy::None,
                &mut self.diagnostics,
                &self.interner,
            )
        }
    }

    #[test]
    fn library_file_parses_in_one_pump() {
        let mut fixture = Fixture::new();
        let (mut file, id) = fixture.file(
            SourceFileKind::Library,
            "import core;\nfn helper(x) { let y = x + 1; y; }\nfn other() {}",
        );
        let outcome = fixture.pump(&mut file, id);
        assert!(outcome.exhausted);
        assert_eq!(outcome.appended, 3);
        assert!(file.parse_complete);
        assert!(!fixture.diagnostics.has_errors());
    }

    #[test]
    fn main_file_chunks_at_statement_runs() {
        let mut fixture = Fixture::new();
        let (mut file, id) = fixture.file(
            SourceFileKind::Main,
            "let a = 1;\nlet b = a + 1;\nfn tail() {}\nb;",
        );

        let first = fixture.pump(&mut file, id);
        assert!(!first.exhausted);
        assert_eq!(first.appended, 2);

        let second = fixture.pump(&mut file, id);
        assert!(second.exhausted);
        assert_eq!(second.appended, 2);
        assert_eq!(file.decls.len(), 4);
    }

    #[test]
    fn pump_after_exhaustion_is_noop() {
        let mut fixture = Fixture::new();
        let (mut file, id) = fixture.file(SourceFileKind::Main, "let a = 1;");
        let first = fixture.pump(&mut file, id);
        assert!(first.exhausted);

        let again = fixture.pump(&mut file, id);
        assert!(again.exhausted);
        assert_eq!(again.appended, 0);
        assert_eq!(file.decls.len(), 1);
    }

    #[test]
    fn hashbang_is_skipped_in_main_files() {
        let mut fixture = Fixture::new();
        let (mut file, id) = fixture.file(SourceFileKind::Main, "#!/usr/bin/env kestrel\nlet a = 1;");
        let outcome = fixture.pump(&mut file, id);
        assert!(outcome.exhausted);
        assert_eq!(outcome.appended, 1);
        assert!(!fixture.diagnostics.has_errors());
    }

    #[test]
    fn statements_in_library_files_are_diagnosed() {
        let mut fixture = Fixture::new();
        let (mut file, id) = fixture.file(SourceFileKind::Library, "let a = 1;");
        let outcome = fixture.pump(&mut file, id);
        assert!(outcome.exhausted);
        assert!(fixture.diagnostics.has_errors());
        assert_eq!(
            fixture.diagnostics.diagnostics()[0].code,
            "parser::statements_only_in_main"
        );
        // The statement is still parsed for recovery.
        assert_eq!(file.decls.len(), 1);
    }

    #[test]
    fn always_delayed_defers_every_body() {
        let mut fixture = Fixture::new();
        let source = "fn one() { let a = 1; }\nfn two() { let b = 2; }";
        let (mut file, id) = fixture.file(SourceFileKind::Library, source);
        let buffer = fixture.buffers.get(id).clone();
        parse_chunk(
            &mut file,
            &buffer,
            None,
            &mut fixture.state,
            &DelayedPolicy::AlwaysDelayed,
            &mut fixture.diagnostics,
            &fixture.interner,
        );

        assert_eq!(fixture.state.delayed_bodies().len(), 2);
        assert!(file
            .decls
            .iter()
            .all(|decl| matches!(decl, Decl::Function { body: Body::Delayed(_), .. })));

        let realized = realize_delayed_bodies(
            &mut file,
            &buffer,
            &mut fixture.diagnostics,
            &fixture.interner,
        );
        assert_eq!(realized, vec![0, 1]);
        assert!(file
            .decls
            .iter()
            .all(|decl| matches!(decl, Decl::Function { body: Body::Parsed(_), .. })));
        assert!(!fixture.diagnostics.has_errors());
    }

    #[test]
    fn completion_policy_parses_only_the_target_body() {
        let mut fixture = Fixture::new();
        let source = "fn one() { let a = 1; }\nfn two() { let b = 2; }";
        let (mut file, id) = fixture.file(SourceFileKind::Library, source);
        let offset = source.find("let a").map(|pos| pos as u32).unwrap_or(0);
        let buffer = fixture.buffers.get(id).clone();
        parse_chunk(
            &mut file,
            &buffer,
            None,
            &mut fixture.state,
            &DelayedPolicy::CodeCompletion { buffer: id, offset },
            &mut fixture.diagnostics,
            &fixture.interner,
        );

        assert!(matches!(
            &file.decls[0],
            Decl::Function {
                body: Body::Parsed(_),
                ..
            }
        ));
        assert!(matches!(
            &file.decls[1],
            Decl::Function {
                body: Body::Delayed(_),
                ..
            }
        ));
        assert_eq!(fixture.state.delayed_bodies().len(), 1);
    }

    #[test]
    fn ir_definitions_chunk_and_fill_the_container() {
        let mut fixture = Fixture::new();
        let source = "import core;\nir alpha { raw }\nir beta { raw }\nfn decl() {}\nir gamma { raw }";
        let id = fixture.buffers.register_memory(source.as_bytes(), "main.kir");
        let mut file = SourceFile::new(SourceFileKind::LowLevelIr, Some(id));
        let mut module = IrModule::new();
        let buffer = fixture.buffers.get(id).clone();

        let first = parse_chunk(
            &mut file,
            &buffer,
            Some(&mut module),
            &mut fixture.state,
            &DelayedPolicy::None,
            &mut fixture.diagnostics,
            &fixture.interner,
        );
        assert!(!first.exhausted);
        assert_eq!(module.definitions.len(), 2);
        assert_eq!(first.appended, 1);

        let second = parse_chunk(
            &mut file,
            &buffer,
            Some(&mut module),
            &mut fixture.state,
            &DelayedPolicy::None,
            &mut fixture.diagnostics,
            &fixture.interner,
        );
        assert!(second.exhausted);
        assert_eq!(module.definitions.len(), 3);
        assert_eq!(file.decls.len(), 2);
    }

    #[test]
    fn unexpected_tokens_recover() {
        let mut fixture = Fixture::new();
        let (mut file, id) = fixture.file(SourceFileKind::Library, "} fn ok() {}");
        let outcome = fixture.pump(&mut file, id);
        assert!(outcome.exhausted);
        assert!(fixture.diagnostics.has_errors());
        assert_eq!(file.decls.len(), 1);
    }
}
