use chumsky::prelude::*;

use crate::lexer::lr::{Literal, TokenKind};
use crate::parser::ast::*;
use crate::parser::perror::PError;
use crate::parser::{ctrl, field_name, ident_part, keyword, search_value};

/// The boolean grammar of a search stage: terms joined by implicit AND,
/// explicit `AND`/`OR`, and `NOT`, with parenthesized groups and inline
/// subsearches.
pub(crate) fn search_expr<'a>(
    subsearch: impl Parser<TokenKind, Subsearch, Error = PError> + Clone + 'a,
) -> impl Parser<TokenKind, SearchExpr, Error = PError> + Clone + 'a {
    recursive(move |expr| {
        let group = expr
            .delimited_by(ctrl('('), ctrl(')'))
            .recover_with(nested_delimiters(
                TokenKind::Control('('),
                TokenKind::Control(')'),
                [(TokenKind::Control('['), TokenKind::Control(']'))],
                |_| SearchExpr::Term(SearchTerm::Word(String::new())),
            ))
            .map(|e| SearchExpr::Group(Box::new(e)))
            .boxed();

        let compare = field_name()
            .then(compare_op())
            .then(search_value())
            .map(|((field, op), value)| SearchTerm::Compare { field, op, value });

        let in_list = field_name()
            .then_ignore(keyword("in"))
            .then(
                search_value()
                    .separated_by(ctrl(','))
                    .allow_trailing()
                    .delimited_by(ctrl('('), ctrl(')')),
            )
            .map(|(field, values)| SearchTerm::InList { field, values });

        let phrase = select! {
            TokenKind::Literal(Literal::String(s)) => SearchTerm::Phrase(s),
        };

        let word = select! {
            TokenKind::Ident(s) => SearchTerm::Word(s),
            TokenKind::Literal(Literal::Number(n)) => SearchTerm::Word(n),
        };

        let term = choice((
            in_list,
            compare,
            subsearch.map(SearchTerm::Sub),
            phrase,
            word,
        ))
        .map(SearchExpr::Term)
        .labelled("search term");

        let atom = group.or(term).boxed();

        // Negation applies to the term (or group) that follows it.
        let unit = keyword("not")
            .repeated()
            .then(atom)
            .map(|(nots, t)| {
                let mut e = t;
                for _ in nots {
                    e = SearchExpr::Not(Box::new(e));
                }
                e
            })
            .boxed();

        // Adjacent units are joined by an implicit AND.
        let and_chain = unit
            .clone()
            .then(keyword("and").or_not().ignore_then(unit).repeated())
            .foldl(|left, right| SearchExpr::Binary {
                op: SearchOp::And,
                left: Box::new(left),
                right: Box::new(right),
            })
            .boxed();

        and_chain
            .clone()
            .then(keyword("or").ignore_then(and_chain).repeated())
            .foldl(|left, right| SearchExpr::Binary {
                op: SearchOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            })
    })
}

fn compare_op() -> impl Parser<TokenKind, CompareOp, Error = PError> + Clone {
    choice((
        just(TokenKind::Ne).to(CompareOp::Ne),
        just(TokenKind::Lte).to(CompareOp::Lte),
        just(TokenKind::Gte).to(CompareOp::Gte),
        // `==` is tolerated where `=` is expected
        ctrl('=').then_ignore(ctrl('=').or_not()).to(CompareOp::Eq),
        ctrl('<').to(CompareOp::Lt),
        ctrl('>').to(CompareOp::Gt),
    ))
}

/// The `where`/`eval` expression grammar:
/// or > and > not > comparison > additive > multiplicative > unary > primary.
pub(crate) fn where_expr() -> impl Parser<TokenKind, Expr, Error = PError> + Clone {
    recursive(|expr| {
        let func_call = ident_part()
            .then(
                expr.clone()
                    .separated_by(ctrl(','))
                    .allow_trailing()
                    .delimited_by(ctrl('('), ctrl(')')),
            )
            .map(|(name, args)| Expr::FuncCall { name, args })
            .labelled("function call");

        let group = expr
            .clone()
            .delimited_by(ctrl('('), ctrl(')'))
            .recover_with(nested_delimiters(
                TokenKind::Control('('),
                TokenKind::Control(')'),
                [(TokenKind::Control('['), TokenKind::Control(']'))],
                |_| Expr::Ident(String::new()),
            ))
            .map(|e| Expr::Group(Box::new(e)));

        let literal = select! {
            TokenKind::Literal(Literal::Number(n)) => Expr::Number(n),
            TokenKind::Literal(Literal::String(s)) => Expr::String(s),
        };

        let primary = choice((func_call, literal, ident_part().map(Expr::Ident), group)).boxed();

        let unary = ctrl('-')
            .repeated()
            .then(primary)
            .map(|(negs, e)| {
                let mut e = e;
                for _ in negs {
                    e = Expr::Unary {
                        op: UnOp::Neg,
                        expr: Box::new(e),
                    };
                }
                e
            })
            .boxed();

        let multiplicative = binary_fold(unary, operator_mul());
        let additive = binary_fold(multiplicative, operator_add());

        // Comparisons don't chain: `a < b < c` is not a thing in SPL.
        enum Tail {
            Bin(BinOp, Expr),
            In(Vec<Expr>),
        }

        let in_values = expr
            .clone()
            .separated_by(ctrl(','))
            .allow_trailing()
            .delimited_by(ctrl('('), ctrl(')'));

        let comparison = additive
            .clone()
            .then(
                choice((
                    operator_compare()
                        .then(additive)
                        .map(|(op, r)| Tail::Bin(op, r)),
                    keyword("in").ignore_then(in_values).map(Tail::In),
                ))
                .or_not(),
            )
            .map(|(left, tail)| match tail {
                None => left,
                Some(Tail::Bin(op, right)) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Some(Tail::In(values)) => Expr::InList {
                    expr: Box::new(left),
                    values,
                },
            })
            .boxed();

        let not_level = keyword("not")
            .repeated()
            .then(comparison)
            .map(|(nots, e)| {
                let mut e = e;
                for _ in nots {
                    e = Expr::Unary {
                        op: UnOp::Not,
                        expr: Box::new(e),
                    };
                }
                e
            })
            .boxed();

        let and_level = binary_fold(not_level, keyword("and").to(BinOp::And));
        binary_fold(and_level, keyword("or").to(BinOp::Or))
    })
}

fn binary_fold<'a>(
    term: impl Parser<TokenKind, Expr, Error = PError> + Clone + 'a,
    op: impl Parser<TokenKind, BinOp, Error = PError> + Clone + 'a,
) -> impl Parser<TokenKind, Expr, Error = PError> + Clone + 'a {
    term.clone()
        .then(op.then(term).repeated())
        .foldl(|left, (op, right)| Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
        .boxed()
}

fn operator_mul() -> impl Parser<TokenKind, BinOp, Error = PError> + Clone {
    // `*` lexes as a word (it doubles as the wildcard), so the operator
    // position has to pick it back out.
    let star = filter_map(|span, t| match t {
        TokenKind::Ident(s) if s == "*" => Ok(BinOp::Mul),
        t => Err(PError::expected_input_found(
            span,
            [Some(TokenKind::Ident("*".to_string()))],
            Some(t),
        )),
    });

    choice((
        star,
        ctrl('/').to(BinOp::Div),
        ctrl('%').to(BinOp::Mod),
    ))
}

fn operator_add() -> impl Parser<TokenKind, BinOp, Error = PError> + Clone {
    choice((
        ctrl('+').to(BinOp::Add),
        ctrl('-').to(BinOp::Sub),
        ctrl('.').to(BinOp::Concat),
    ))
}

fn operator_compare() -> impl Parser<TokenKind, BinOp, Error = PError> + Clone {
    choice((
        just(TokenKind::Ne).to(BinOp::Ne),
        just(TokenKind::Lte).to(BinOp::Lte),
        just(TokenKind::Gte).to(BinOp::Gte),
        // both `=` and `==` compare for equality
        ctrl('=').then_ignore(ctrl('=').or_not()).to(BinOp::Eq),
        ctrl('<').to(BinOp::Lt),
        ctrl('>').to(BinOp::Gt),
        keyword("like").to(BinOp::Like),
    ))
}
