//! LL(1) parser for the textual instruction format.

use std::str::FromStr;

use derive_more::Display;
use logos::Logos;

use super::*;

// SECTION: interface

impl FromStr for Program {
    type Err = ParseError;

    fn from_str(code: &str) -> std::result::Result<Self, ParseError> {
        let mut parser = Parser::new(code)?;
        program_r(&mut parser)
    }
}

/// A parse error with explanatory message.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub struct ParseError(pub String);

impl std::error::Error for ParseError {}

type Result<T> = std::result::Result<T, ParseError>;

// SECTION: lexer

#[derive(Logos, Copy, Clone, Debug, Eq, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
enum TokenKind {
    #[token("fn")]
    Fn,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("=")]
    Equals,
    #[regex(r"v[0-9]+", priority = 10)]
    Reg,
    #[regex(r"-?[0-9]+")]
    Int,
    #[regex(r"\$[a-z_]+")]
    Op,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, w: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use TokenKind::*;
        let s = match self {
            Fn => "fn",
            LBrace => "{",
            RBrace => "}",
            LParen => "(",
            RParen => ")",
            Comma => ",",
            Colon => ":",
            Equals => "=",
            Reg => "a register",
            Int => "an integer",
            Op => "an opcode",
            Ident => "an identifier",
        };
        write!(w, "{s}")
    }
}

#[derive(Clone, Debug)]
struct Token {
    kind: TokenKind,
    text: String,
}

fn lex(code: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(code);
    while let Some(next) = lexer.next() {
        match next {
            Ok(kind) => tokens.push(Token {
                kind,
                text: lexer.slice().to_string(),
            }),
            Err(()) => {
                return Err(ParseError(format!(
                    "unexpected character `{}`",
                    lexer.slice()
                )))
            }
        }
    }
    Ok(tokens)
}

// SECTION: parser functionality

#[derive(Clone, Debug)]
struct Parser {
    tokens: Vec<Token>, // the token stream
    pos: usize,         // the position in the token stream
}

// utility functions for traversing the token stream and creating error
// messages.
impl Parser {
    // always use this to create new Parsers.
    fn new(code: &str) -> Result<Self> {
        let tokens = lex(code)?;
        if tokens.is_empty() {
            Err(ParseError("empty token stream".to_string()))
        } else {
            Ok(Parser { tokens, pos: 0 })
        }
    }

    // if the next token has the given kind advances the iterator and returns
    // true, otherwise returns false.
    fn eat(&mut self, kind: TokenKind) -> bool {
        match self.peek() {
            Some(k) if k == kind => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    // returns an Ok or Err result depending on whether the next token has the
    // given kind, advancing the iterator on an Ok result.
    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            self.error_next(&format!("expected `{kind}`"))
        }
    }

    // returns the next token's kind (if it exists) without advancing.
    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    // advances the iterator and returns the text of the next token, which
    // must have the given kind.
    fn expect_text(&mut self, kind: TokenKind) -> Result<String> {
        match self.tokens.get(self.pos) {
            Some(t) if t.kind == kind => {
                self.pos += 1;
                Ok(t.text.clone())
            }
            _ => self.error_next(&format!("expected {kind}")),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        self.expect_text(TokenKind::Ident)
    }

    fn expect_reg(&mut self) -> Result<Reg> {
        let text = self.expect_text(TokenKind::Reg)?;
        match text[1..].parse::<u32>() {
            Ok(n) => Ok(Reg(n)),
            Err(_) => Err(ParseError(format!("register number out of range: {text}"))),
        }
    }

    fn expect_int(&mut self) -> Result<i64> {
        let text = self.expect_text(TokenKind::Int)?;
        text.parse::<i64>()
            .map_err(|_| ParseError(format!("integer literal out of range: {text}")))
    }

    fn end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    // produces an error result pointing at the current token.
    fn error_next<T>(&self, msg: &str) -> Result<T> {
        match self.tokens.get(self.pos) {
            Some(t) => Err(ParseError(format!("{msg}, found `{}`", t.text))),
            None => Err(ParseError(format!("{msg}, found end of input"))),
        }
    }
}

// SECTION: grammar

fn program_r(p: &mut Parser) -> Result<Program> {
    let mut functions = Map::new();
    while !p.end() {
        let f = function_r(p)?;
        if functions.insert(f.name.clone(), f).is_some() {
            return Err(ParseError("duplicate function name".to_string()));
        }
    }
    Ok(Program { functions })
}

fn function_r(p: &mut Parser) -> Result<Function> {
    p.expect(TokenKind::Fn)?;
    let name = func_id(&p.expect_ident()?);
    let num_regs = p.expect_int()?;
    if !(0..=u32::MAX as i64).contains(&num_regs) {
        return Err(ParseError(format!("bad frame size for {name}: {num_regs}")));
    }
    p.expect(TokenKind::LBrace)?;

    let mut body = Map::new();
    while !p.eat(TokenKind::RBrace) {
        let (id, bb) = block_r(p)?;
        if body.insert(id.clone(), bb).is_some() {
            return Err(ParseError(format!("duplicate block label {id} in {name}")));
        }
    }

    Ok(Function {
        name,
        num_regs: num_regs as u32,
        body,
    })
}

fn block_r(p: &mut Parser) -> Result<(BbId, BasicBlock)> {
    let id = bb_id(&p.expect_ident()?);
    p.expect(TokenKind::Colon)?;

    let mut insts = Vec::new();
    loop {
        match p.peek() {
            Some(TokenKind::Reg) => insts.push(defining_inst_r(p)?),
            Some(TokenKind::Op) => {
                // either a source-only instruction or this block's terminal
                let is_term = matches!(
                    p.tokens[p.pos].text.as_str(),
                    "$jump" | "$branch" | "$ret"
                );
                if is_term {
                    let term = terminal_r(p)?;
                    return Ok((id, BasicBlock { insts, term }));
                }
                insts.push(plain_inst_r(p)?);
            }
            _ => return p.error_next("expected an instruction or terminal"),
        }
    }
}

// instructions of the form `reg = $op ...`
fn defining_inst_r(p: &mut Parser) -> Result<Instruction> {
    let dst = p.expect_reg()?;
    p.expect(TokenKind::Equals)?;
    let op = p.expect_text(TokenKind::Op)?;
    match op.as_str() {
        "$const" => Ok(Instruction::Const {
            dst,
            value: p.expect_int()?,
        }),
        "$copy" => Ok(Instruction::Copy {
            dst,
            src: p.expect_reg()?,
        }),
        "$copyobj" => Ok(Instruction::CopyObj {
            dst,
            src: p.expect_reg()?,
        }),
        "$arith" => Ok(Instruction::Arith {
            dst,
            aop: arith_op_r(p)?,
            op1: operand_r(p)?,
            op2: operand_r(p)?,
        }),
        "$cmp" => Ok(Instruction::Cmp {
            dst,
            rop: cmp_op_r(p)?,
            op1: operand_r(p)?,
            op2: operand_r(p)?,
        }),
        "$invoke" => invoke_r(p, Some(dst)),
        _ => Err(ParseError(format!("`{op}` cannot define a register"))),
    }
}

// instructions without a destination
fn plain_inst_r(p: &mut Parser) -> Result<Instruction> {
    let op = p.expect_text(TokenKind::Op)?;
    match op.as_str() {
        "$invoke" => invoke_r(p, None),
        "$monitor_enter" => Ok(Instruction::MonitorEnter(p.expect_reg()?)),
        "$monitor_exit" => Ok(Instruction::MonitorExit(p.expect_reg()?)),
        _ => Err(ParseError(format!("unknown instruction `{op}`"))),
    }
}

fn invoke_r(p: &mut Parser, dst: Option<Reg>) -> Result<Instruction> {
    let callee = p.expect_ident()?;
    p.expect(TokenKind::LParen)?;
    let mut args = Vec::new();
    if !p.eat(TokenKind::RParen) {
        loop {
            args.push(p.expect_reg()?);
            if !p.eat(TokenKind::Comma) {
                break;
            }
        }
        p.expect(TokenKind::RParen)?;
    }
    Ok(Instruction::Invoke { dst, callee, args })
}

fn terminal_r(p: &mut Parser) -> Result<Terminal> {
    let op = p.expect_text(TokenKind::Op)?;
    match op.as_str() {
        "$jump" => Ok(Terminal::Jump(bb_id(&p.expect_ident()?))),
        "$branch" => Ok(Terminal::Branch {
            cond: operand_r(p)?,
            tt: bb_id(&p.expect_ident()?),
            ff: bb_id(&p.expect_ident()?),
        }),
        "$ret" => match p.peek() {
            Some(TokenKind::Reg) | Some(TokenKind::Int) => Ok(Terminal::Ret(Some(operand_r(p)?))),
            _ => Ok(Terminal::Ret(None)),
        },
        _ => Err(ParseError(format!("unknown terminal `{op}`"))),
    }
}

fn operand_r(p: &mut Parser) -> Result<Operand> {
    match p.peek() {
        Some(TokenKind::Reg) => Ok(Operand::Reg(p.expect_reg()?)),
        Some(TokenKind::Int) => Ok(Operand::Imm(p.expect_int()?)),
        _ => p.error_next("expected a register or literal operand"),
    }
}

fn arith_op_r(p: &mut Parser) -> Result<ArithOp> {
    let name = p.expect_ident()?;
    match name.as_str() {
        "add" => Ok(ArithOp::Add),
        "sub" => Ok(ArithOp::Sub),
        "mul" => Ok(ArithOp::Mul),
        "div" => Ok(ArithOp::Div),
        _ => Err(ParseError(format!("unknown arithmetic op `{name}`"))),
    }
}

fn cmp_op_r(p: &mut Parser) -> Result<CmpOp> {
    let name = p.expect_ident()?;
    match name.as_str() {
        "eq" => Ok(CmpOp::Eq),
        "neq" => Ok(CmpOp::Neq),
        "lt" => Ok(CmpOp::Lt),
        "lte" => Ok(CmpOp::Lte),
        "gt" => Ok(CmpOp::Gt),
        "gte" => Ok(CmpOp::Gte),
        _ => Err(ParseError(format!("unknown comparison op `{name}`"))),
    }
}
