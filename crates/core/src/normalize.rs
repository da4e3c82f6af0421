//! Deterministic line reflow for JavaScript so minified bundles diff line by line.
//!
//! Not a parser. Outside string literals and comments, breaks after `;` (at paren depth 0),
//! `{` and `}`, trims lines, drops blank ones and re-indents by brace depth. Regex literals
//! are not recognised; a quote inside one can shift the string state for the rest of the line.

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    Str(char),
    LineComment,
    BlockComment,
}

struct Reflow {
    lines: Vec<String>,
    cur: String,
    depth: usize,
    line_depth: usize,
    parens: Vec<usize>,
    after_close: bool,
}

impl Reflow {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            cur: String::new(),
            depth: 0,
            line_depth: 0,
            parens: vec![0],
            after_close: false,
        }
    }

    fn break_line(&mut self) {
        let trimmed = self.cur.trim();
        if !trimmed.is_empty() {
            let mut line = "  ".repeat(self.line_depth);
            line.push_str(trimmed);
            self.lines.push(line);
        }
        self.cur.clear();
        self.line_depth = self.depth;
    }

    fn top_parens(&mut self) -> &mut usize {
        if self.parens.is_empty() {
            self.parens.push(0);
        }
        let last = self.parens.len() - 1;
        &mut self.parens[last]
    }

    fn code(&mut self, c: char, next: Option<char>) -> State {
        if self.after_close {
            if c.is_whitespace() {
                return State::Code;
            }
            self.after_close = false;
            if !matches!(c, ';' | ',' | ')' | '.') {
                self.break_line();
            }
        }

        match c {
            '"' | '\'' | '`' => {
                self.cur.push(c);
                return State::Str(c);
            }
            '/' if next == Some('/') => {
                self.cur.push(c);
                return State::LineComment;
            }
            '/' if next == Some('*') => {
                self.cur.push(c);
                return State::BlockComment;
            }
            '\n' | '\r' => self.break_line(),
            '(' => {
                *self.top_parens() += 1;
                self.cur.push(c);
            }
            ')' => {
                let p = self.top_parens();
                *p = p.saturating_sub(1);
                self.cur.push(c);
            }
            ';' => {
                self.cur.push(c);
                if *self.top_parens() == 0 {
                    self.break_line();
                }
            }
            '{' => {
                self.cur.push(c);
                self.depth += 1;
                self.parens.push(0);
                self.break_line();
            }
            '}' => {
                self.break_line();
                self.depth = self.depth.saturating_sub(1);
                if self.parens.len() > 1 {
                    self.parens.pop();
                }
                self.line_depth = self.depth;
                self.cur.push(c);
                self.after_close = true;
            }
            _ => self.cur.push(c),
        }
        State::Code
    }
}

/// Reflows `source`; equal inputs always give equal outputs.
pub fn reflow(source: &str) -> String {
    let mut r = Reflow::new();
    let mut state = State::Code;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        state = match state {
            State::Code => r.code(c, chars.peek().copied()),
            State::Str(quote) => {
                r.cur.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        r.cur.push(escaped);
                    }
                    State::Str(quote)
                } else if c == quote || (c == '\n' && quote != '`') {
                    State::Code
                } else {
                    State::Str(quote)
                }
            }
            State::LineComment => {
                if c == '\n' || c == '\r' {
                    r.break_line();
                    State::Code
                } else {
                    r.cur.push(c);
                    State::LineComment
                }
            }
            State::BlockComment => {
                if c == '\n' {
                    r.break_line();
                    State::BlockComment
                } else {
                    r.cur.push(c);
                    if c == '/' && r.cur.ends_with("*/") && !r.cur.ends_with("/*/") {
                        State::Code
                    } else {
                        State::BlockComment
                    }
                }
            }
        };
    }
    r.break_line();
    r.lines.join("\n")
}
