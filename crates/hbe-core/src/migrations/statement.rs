//! Splitting migration scripts into statements.
//!
//! Migrations are executed one statement at a time so that a failure can be
//! attributed to a statement, and so that `ADD COLUMN IF NOT EXISTS` (which
//! SQLite does not understand) can be resolved against the live schema.

/// One executable statement from a migration script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Plain SQL, executed as written
    Sql(String),
    /// `ALTER TABLE .. ADD COLUMN IF NOT EXISTS ..` with the guard stripped from `sql`
    AddColumnIfMissing {
        table: String,
        column: String,
        sql: String,
    },
}

impl Statement {
    /// SQL text that would be executed for this statement
    pub fn sql(&self) -> &str {
        match self {
            Self::Sql(sql) | Self::AddColumnIfMissing { sql, .. } => sql,
        }
    }
}

/// Split a script and classify each statement.
pub fn parse_script(script: &str) -> Vec<Statement> {
    split(script).into_iter().map(classify).collect()
}

/// Split a script on top-level semicolons.
///
/// Semicolons inside string literals, quoted identifiers, comments and
/// `CREATE TRIGGER .. BEGIN .. END` bodies do not terminate a statement.
/// Comments are replaced by whitespace and empty statements are dropped.
pub fn split(script: &str) -> Vec<String> {
    let mut splitter = Splitter::default();
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' | '[' => {
                splitter.end_word();
                splitter.last_word.clear();
                let close = if c == '[' { ']' } else { c };
                splitter.current.push(c);
                for inner in chars.by_ref() {
                    splitter.current.push(inner);
                    if inner == close {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                splitter.end_word();
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
                splitter.current.push('\n');
            }
            '/' if chars.peek() == Some(&'*') => {
                splitter.end_word();
                chars.next();
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
                splitter.current.push(' ');
            }
            ';' => {
                splitter.end_word();
                if splitter.in_trigger_body() {
                    splitter.current.push(';');
                    splitter.last_word.clear();
                } else {
                    splitter.finish();
                }
            }
            c if c.is_alphanumeric() || c == '_' => {
                splitter.word.push(c);
                splitter.current.push(c);
            }
            c => {
                splitter.end_word();
                if !c.is_whitespace() {
                    splitter.last_word.clear();
                }
                splitter.current.push(c);
            }
        }
    }

    splitter.end_word();
    splitter.finish();
    splitter.statements
}

#[derive(Default)]
struct Splitter {
    statements: Vec<String>,
    current: String,
    word: String,
    /// First few keywords of the current statement, uppercased
    leading: Vec<String>,
    /// Most recent bare word, cleared by any other token
    last_word: String,
    case_depth: usize,
}

impl Splitter {
    fn end_word(&mut self) {
        if self.word.is_empty() {
            return;
        }
        let upper = self.word.to_ascii_uppercase();
        self.word.clear();

        if self.leading.len() < 3 {
            self.leading.push(upper.clone());
        }
        match upper.as_str() {
            "CASE" => self.case_depth += 1,
            "END" if self.case_depth > 0 => {
                self.case_depth -= 1;
                self.last_word.clear();
                return;
            }
            _ => {}
        }
        self.last_word = upper;
    }

    fn is_trigger(&self) -> bool {
        match self.leading.as_slice() {
            [create, trigger, ..] if create == "CREATE" && trigger == "TRIGGER" => true,
            [create, temp, trigger]
                if create == "CREATE"
                    && (temp == "TEMP" || temp == "TEMPORARY")
                    && trigger == "TRIGGER" =>
            {
                true
            }
            _ => false,
        }
    }

    fn in_trigger_body(&self) -> bool {
        self.is_trigger() && self.last_word != "END"
    }

    fn finish(&mut self) {
        let trimmed = self.current.trim();
        if !trimmed.is_empty() {
            self.statements.push(trimmed.to_string());
        }
        self.current.clear();
        self.leading.clear();
        self.last_word.clear();
        self.case_depth = 0;
    }
}

/// Recognise `ALTER TABLE t ADD [COLUMN] IF NOT EXISTS c ...`.
pub fn classify(sql: String) -> Statement {
    match parse_add_column_guard(&sql) {
        Some((table, column, rewritten)) => Statement::AddColumnIfMissing {
            table,
            column,
            sql: rewritten,
        },
        None => Statement::Sql(sql),
    }
}

fn parse_add_column_guard(sql: &str) -> Option<(String, String, String)> {
    let mut lexer = Lexer::new(sql);

    lexer.keyword("ALTER")?;
    lexer.keyword("TABLE")?;
    let mut table = lexer.identifier()?;
    if lexer.peek_punct('.') {
        lexer.next_token()?;
        table = lexer.identifier()?;
    }
    lexer.keyword("ADD")?;

    let mut guard = lexer.next_token()?;
    if guard.is_keyword("COLUMN") {
        guard = lexer.next_token()?;
    }
    if !guard.is_keyword("IF") {
        return None;
    }
    lexer.keyword("NOT")?;
    let exists = lexer.keyword("EXISTS")?;
    let column = lexer.identifier()?;

    let rewritten = format!("{}{}", &sql[..guard.start], sql[exists.end..].trim_start());
    Some((table, column, rewritten))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    Quoted,
    Literal,
    Punct,
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: TokenKind,
    text: &'a str,
    start: usize,
    end: usize,
}

impl Token<'_> {
    fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    fn identifier(&self) -> Option<String> {
        match self.kind {
            TokenKind::Word => Some(self.text.to_string()),
            TokenKind::Quoted => {
                let quote = self.text.chars().next()?;
                let close = if quote == '[' { ']' } else { quote };
                // Unterminated quotes are not identifiers
                let inner = self.text.strip_prefix(quote)?.strip_suffix(close)?;
                Some(match quote {
                    '"' => inner.replace("\"\"", "\""),
                    '`' => inner.replace("``", "`"),
                    _ => inner.to_string(),
                })
            }
            _ => None,
        }
    }
}

struct Lexer<'a> {
    sql: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(sql: &'a str) -> Self {
        Self { sql, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.sql[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn next_token(&mut self) -> Option<Token<'a>> {
        self.skip_whitespace();
        let start = self.pos;
        let mut chars = self.sql[start..].char_indices();
        let (_, first) = chars.next()?;

        let (kind, len) = match first {
            '"' | '`' | '[' | '\'' => {
                let close = if first == '[' { ']' } else { first };
                let mut end = self.sql.len() - start;
                let mut iter = chars.peekable();
                while let Some((i, c)) = iter.next() {
                    if c == close {
                        // doubled quote is an escape, except for brackets
                        if close != ']' && iter.peek().map(|&(_, n)| n) == Some(close) {
                            iter.next();
                            continue;
                        }
                        end = i + c.len_utf8();
                        break;
                    }
                }
                let kind = if first == '\'' {
                    TokenKind::Literal
                } else {
                    TokenKind::Quoted
                };
                (kind, end)
            }
            c if c.is_alphanumeric() || c == '_' => {
                let end = chars
                    .find(|&(_, c)| !(c.is_alphanumeric() || c == '_'))
                    .map(|(i, _)| i)
                    .unwrap_or(self.sql.len() - start);
                (TokenKind::Word, end)
            }
            c => (TokenKind::Punct, c.len_utf8()),
        };

        self.pos = start + len;
        Some(Token {
            kind,
            text: &self.sql[start..self.pos],
            start,
            end: self.pos,
        })
    }

    fn keyword(&mut self, keyword: &str) -> Option<Token<'a>> {
        self.next_token().filter(|t| t.is_keyword(keyword))
    }

    fn identifier(&mut self) -> Option<String> {
        self.next_token()?.identifier()
    }

    fn peek_punct(&self, punct: char) -> bool {
        self.sql[self.pos..].trim_start().starts_with(punct)
    }
}
