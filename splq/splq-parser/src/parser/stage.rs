use chumsky::prelude::*;

use crate::lexer::lr::{Literal, TokenKind};
use crate::parser::ast::*;
use crate::parser::expr;
use crate::parser::perror::PError;
use crate::parser::{cmd, cmd_one_of, ctrl, field_name, ident_part, keyword, named_arg};
use crate::span::Span;

/// The root parser: a pipeline of stages. Trailing tokens the pipeline
/// cannot place (stray `]` and friends) are consumed with a diagnostic so
/// the stages parsed so far still come back.
pub(crate) fn query_root() -> impl Parser<TokenKind, Query, Error = PError> {
    query()
        .then(any().map_with_span(|t, s: Span| (t, s)).repeated())
        .validate(|(q, trailing), _span, emit| {
            if let Some((t, s)) = trailing.first() {
                emit(PError::custom(*s, format!("unexpected {t}")));
            }
            q
        })
        .then_ignore(end())
}

/// `query := pipelineStage ( '|' pipelineStage )*`, with an optional
/// leading `|` for generating commands.
pub(crate) fn query() -> impl Parser<TokenKind, Query, Error = PError> + Clone {
    recursive(|query| {
        let subsearch = query
            .map_with_span(|q: Query, span: Span| Subsearch {
                query: Box::new(q),
                span,
            })
            .delimited_by(ctrl('['), ctrl(']'))
            .recover_with(nested_delimiters(
                TokenKind::Control('['),
                TokenKind::Control(']'),
                [(TokenKind::Control('('), TokenKind::Control(')'))],
                |span| Subsearch {
                    query: Box::new(Query::default()),
                    span,
                },
            ))
            .boxed();

        let known = known_stage(subsearch.clone()).boxed();
        let generic = generic_stage(subsearch.clone()).boxed();
        let implicit = expr::search_expr(subsearch)
            .map(StageKind::Search)
            .boxed();

        // Only the leading stage may be an implicit search; piped stages
        // must name a command (unrecognized ones fall through to generic).
        let first = stage(known.clone().or(implicit));
        let rest = stage(known.or(generic));

        let build = |(head, tail): (Stage, Vec<Stage>)| {
            let mut stages = vec![head];
            stages.extend(tail);
            Query { stages }
        };

        let piped = ctrl('|')
            .ignore_then(rest.clone())
            .then(ctrl('|').ignore_then(rest.clone()).repeated())
            .map(build);

        let unpiped = first
            .then(ctrl('|').ignore_then(rest).repeated())
            .map(build);

        piped.or(unpiped)
    })
}

/// Wrap a stage body so it always yields a [`Stage`]: an empty stage is
/// legal (`| |`), and tokens the body could not place are consumed with a
/// diagnostic instead of failing the whole pipeline.
fn stage<'a>(
    kinds: impl Parser<TokenKind, StageKind, Error = PError> + Clone + 'a,
) -> impl Parser<TokenKind, Stage, Error = PError> + Clone + 'a {
    let junk = filter(|t: &TokenKind| {
        !matches!(t, TokenKind::Control('|') | TokenKind::Control(']'))
    })
    .map_with_span(|t, s: Span| (t, s));

    kinds
        .or(empty().to(StageKind::Empty))
        .then(junk.repeated())
        .validate(|(kind, junk), _span, emit| {
            if let Some((t, s)) = junk.first() {
                emit(PError::custom(*s, format!("unexpected {t} in pipeline stage")));
            }
            kind
        })
        .map_with_span(Stage::new)
}

fn known_stage<'a>(
    subsearch: impl Parser<TokenKind, Subsearch, Error = PError> + Clone + 'a,
) -> impl Parser<TokenKind, StageKind, Error = PError> + Clone + 'a {
    choice((
        cmd("search")
            .ignore_then(expr::search_expr(subsearch.clone()))
            .map(StageKind::Search)
            .boxed(),
        cmd("where")
            .ignore_then(expr::where_expr())
            .map(StageKind::Where)
            .boxed(),
        eval_stage().boxed(),
        stats_stage().boxed(),
        rex_stage().boxed(),
        join_stage(subsearch.clone()).boxed(),
        append_stage(subsearch.clone()).boxed(),
        multisearch_stage(subsearch.clone()).boxed(),
        transaction_stage().boxed(),
        tstats_stage(subsearch.clone()).boxed(),
        inputlookup_stage(subsearch).boxed(),
        rename_stage().boxed(),
        lookup_stage().boxed(),
        table_stage().boxed(),
        fields_stage().boxed(),
        dedup_stage().boxed(),
        sort_stage().boxed(),
        top_rare_stage().boxed(),
    ))
}

fn eval_stage() -> impl Parser<TokenKind, StageKind, Error = PError> + Clone {
    let target = select! {
        TokenKind::Ident(s) => s,
        TokenKind::Literal(Literal::Number(n)) => n,
        TokenKind::Literal(Literal::String(s)) => s,
    };

    let assignment = target
        .then_ignore(ctrl('='))
        .then(expr::where_expr())
        .map(|(field, expr)| EvalAssignment { field, expr });

    cmd("eval")
        .ignore_then(
            assignment
                .separated_by(ctrl(','))
                .allow_trailing()
                .at_least(1),
        )
        .map(StageKind::Eval)
}

enum StatsItem {
    Func(StatsFunc),
    Opt(NamedArg),
    By(Vec<String>),
    Over(String),
}

fn stats_stage() -> impl Parser<TokenKind, StageKind, Error = PError> + Clone {
    let item = choice((
        keyword("by").ignore_then(by_fields()).map(StatsItem::By),
        keyword("over").ignore_then(field_name()).map(StatsItem::Over),
        named_arg().map(StatsItem::Opt),
        stats_func().map(StatsItem::Func),
    ));

    cmd_one_of(&["stats", "eventstats", "streamstats", "chart", "timechart"])
        .then(item.repeated())
        .map(|(command, items)| {
            let mut stage = StatsStage {
                command,
                options: vec![],
                functions: vec![],
                by: vec![],
                over: None,
            };
            for item in items {
                match item {
                    StatsItem::Func(f) => stage.functions.push(f),
                    StatsItem::Opt(o) => stage.options.push(o),
                    StatsItem::By(fields) => stage.by.extend(fields),
                    StatsItem::Over(f) => stage.over = Some(f),
                }
            }
            StageKind::Stats(stage)
        })
}

/// `count`, `count()`, `dc(Computer)`, `sum(bytes) as total`, …
fn stats_func() -> impl Parser<TokenKind, StatsFunc, Error = PError> + Clone {
    ident_part()
        .then(
            expr::where_expr()
                .or_not()
                .delimited_by(ctrl('('), ctrl(')'))
                .or_not(),
        )
        .then(keyword("as").ignore_then(field_name()).or_not())
        .map(|((name, arg), alias)| StatsFunc {
            name,
            arg: arg.flatten(),
            alias,
        })
}

/// A `by`/`groupby` field list. Commas are optional, and option pairs like
/// `span=1h` may sit inside the list without becoming fields.
fn by_fields() -> impl Parser<TokenKind, Vec<String>, Error = PError> + Clone {
    choice((
        named_arg().map(|_| None),
        field_name().map(Some),
    ))
    .then_ignore(ctrl(',').or_not())
    .repeated()
    .at_least(1)
    .map(|items| items.into_iter().flatten().collect())
}

fn rex_stage() -> impl Parser<TokenKind, StageKind, Error = PError> + Clone {
    let pattern = select! { TokenKind::Literal(Literal::String(s)) => s };

    cmd("rex")
        .ignore_then(named_arg().repeated())
        .then(pattern.or_not())
        .map(|(options, pattern)| {
            let field = options
                .iter()
                .find(|o| o.name.eq_ignore_ascii_case("field"))
                .map(|o| o.value.clone());
            StageKind::Rex {
                field,
                pattern: pattern.unwrap_or_default(),
            }
        })
}

fn join_stage<'a>(
    subsearch: impl Parser<TokenKind, Subsearch, Error = PError> + Clone + 'a,
) -> impl Parser<TokenKind, StageKind, Error = PError> + Clone + 'a {
    cmd("join")
        .ignore_then(named_arg().repeated())
        .then(field_name().then_ignore(ctrl(',').or_not()).repeated())
        .then(subsearch)
        .map(|((options, fields), subsearch)| {
            StageKind::Join(JoinStage {
                options,
                fields,
                subsearch,
            })
        })
}

fn append_stage<'a>(
    subsearch: impl Parser<TokenKind, Subsearch, Error = PError> + Clone + 'a,
) -> impl Parser<TokenKind, StageKind, Error = PError> + Clone + 'a {
    cmd("append")
        .ignore_then(named_arg().repeated())
        .then(subsearch)
        .map(|(options, subsearch)| {
            StageKind::Append(JoinStage {
                options,
                fields: vec![],
                subsearch,
            })
        })
}

fn multisearch_stage<'a>(
    subsearch: impl Parser<TokenKind, Subsearch, Error = PError> + Clone + 'a,
) -> impl Parser<TokenKind, StageKind, Error = PError> + Clone + 'a {
    cmd("multisearch")
        .ignore_then(subsearch.repeated().at_least(1))
        .map(StageKind::Multisearch)
}

fn transaction_stage() -> impl Parser<TokenKind, StageKind, Error = PError> + Clone {
    cmd("transaction")
        .ignore_then(list_items())
        .map(|items| {
            let (fields, options) = split_items(items);
            StageKind::Transaction { fields, options }
        })
}

enum TstatsItem {
    Func(StatsFunc),
    Opt(NamedArg),
    From(Option<String>),
    Where(SearchExpr),
    By(Vec<String>),
}

fn tstats_stage<'a>(
    subsearch: impl Parser<TokenKind, Subsearch, Error = PError> + Clone + 'a,
) -> impl Parser<TokenKind, StageKind, Error = PError> + Clone + 'a {
    // `from datamodel=Endpoint.Processes` carries the datamodel; a bare
    // `from x` is accepted but contributes nothing.
    let from = cmd("from").ignore_then(choice((
        named_arg().map(|a| a.name.eq_ignore_ascii_case("datamodel").then_some(a.value)),
        field_name().map(|_| None),
    )));

    // The inline where-clause takes search-style terms, time modifiers
    // included: `where index=main earliest=-24h`.
    let where_clause = cmd("where").ignore_then(expr::search_expr(subsearch));

    let item = choice((
        from.map(TstatsItem::From),
        where_clause.map(TstatsItem::Where),
        keyword("by").ignore_then(by_fields()).map(TstatsItem::By),
        cmd("groupby").ignore_then(by_fields()).map(TstatsItem::By),
        named_arg().map(TstatsItem::Opt),
        stats_func().map(TstatsItem::Func),
    ));

    cmd_one_of(&["tstats", "mstats"])
        .then(item.repeated())
        .map(|(command, items)| {
            let mut stage = TstatsStage {
                command,
                options: vec![],
                functions: vec![],
                datamodel: None,
                where_expr: None,
                by: vec![],
            };
            for item in items {
                match item {
                    TstatsItem::Func(f) => stage.functions.push(f),
                    TstatsItem::Opt(o) => stage.options.push(o),
                    TstatsItem::From(dm) => stage.datamodel = dm.or(stage.datamodel),
                    TstatsItem::Where(e) => stage.where_expr = Some(e),
                    TstatsItem::By(fields) => stage.by.extend(fields),
                }
            }
            StageKind::Tstats(stage)
        })
}

fn inputlookup_stage<'a>(
    subsearch: impl Parser<TokenKind, Subsearch, Error = PError> + Clone + 'a,
) -> impl Parser<TokenKind, StageKind, Error = PError> + Clone + 'a {
    cmd("inputlookup")
        .ignore_then(named_arg().repeated())
        .then(ident_part().or_not())
        .then(
            cmd("where")
                .ignore_then(expr::search_expr(subsearch))
                .or_not(),
        )
        .map(|((options, source), where_expr)| StageKind::Inputlookup {
            options,
            source,
            where_expr,
        })
}

fn rename_stage() -> impl Parser<TokenKind, StageKind, Error = PError> + Clone {
    let spec = field_name()
        .then_ignore(keyword("as"))
        .then(field_name())
        .map(|(source, target)| RenameSpec { source, target });

    cmd("rename")
        .ignore_then(spec.separated_by(ctrl(',')).allow_trailing().at_least(1))
        .map(StageKind::Rename)
}

fn lookup_stage() -> impl Parser<TokenKind, StageKind, Error = PError> + Clone {
    // `OUTPUT`/`OUTPUTNEW` splits inputs from outputs, so it cannot be a
    // field in either list.
    let lookup_ident = filter_map(|span, t| match t {
        TokenKind::Ident(s)
            if !s.eq_ignore_ascii_case("output") && !s.eq_ignore_ascii_case("outputnew") =>
        {
            Ok(s)
        }
        t => Err(PError::expected_input_found(
            span,
            [Some(TokenKind::Ident("".to_string()))],
            Some(t),
        )),
    });

    let spec = lookup_ident
        .then(keyword("as").ignore_then(field_name()).or_not())
        .map(|(field, alias)| LookupField { field, alias })
        .then_ignore(ctrl(',').or_not());

    cmd("lookup")
        .ignore_then(named_arg().repeated())
        .then(ident_part())
        .then(spec.clone().repeated())
        .then(
            cmd_one_of(&["output", "outputnew"])
                .ignore_then(spec.repeated())
                .or_not(),
        )
        .map(|(((options, table), inputs), outputs)| {
            StageKind::Lookup(LookupStage {
                options,
                table,
                inputs,
                outputs: outputs.unwrap_or_default(),
            })
        })
}

fn table_stage() -> impl Parser<TokenKind, StageKind, Error = PError> + Clone {
    cmd("table")
        .ignore_then(field_name().then_ignore(ctrl(',').or_not()).repeated())
        .map(StageKind::Table)
}

fn fields_stage() -> impl Parser<TokenKind, StageKind, Error = PError> + Clone {
    cmd("fields")
        .ignore_then(
            choice((ctrl('-').to(true), ctrl('+').to(false))).or_not(),
        )
        .then(field_name().then_ignore(ctrl(',').or_not()).repeated())
        .map(|(mode, fields)| StageKind::Fields {
            removed: mode.unwrap_or(false),
            fields: fields.into_iter().map(clean_field).collect(),
        })
}

fn dedup_stage() -> impl Parser<TokenKind, StageKind, Error = PError> + Clone {
    let limit = select! { TokenKind::Literal(Literal::Number(n)) => n };

    // `sortby` opens a trailing sort clause; its fields are not dedup keys.
    let dedup_field = filter_map(|span, t| match t {
        TokenKind::Ident(s) if !s.eq_ignore_ascii_case("sortby") => Ok(s),
        t => Err(PError::expected_input_found(
            span,
            [Some(TokenKind::Ident("".to_string()))],
            Some(t),
        )),
    });

    let item = choice((
        named_arg().map(ListItem::Opt),
        dedup_field.map(ListItem::Field),
    ))
    .then_ignore(ctrl(',').or_not());

    let sortby_tail = cmd("sortby").ignore_then(sort_field().repeated());

    cmd("dedup")
        .ignore_then(limit.or_not())
        .then(item.repeated())
        .then_ignore(sortby_tail.or_not())
        .map(|(limit, items)| {
            let (fields, mut options) = split_items(items);
            if let Some(n) = limit {
                options.push(NamedArg {
                    name: "limit".to_string(),
                    value: n,
                });
            }
            StageKind::Dedup { fields, options }
        })
}

fn sort_stage() -> impl Parser<TokenKind, StageKind, Error = PError> + Clone {
    let limit = select! { TokenKind::Literal(Literal::Number(n)) => n };

    cmd("sort")
        .ignore_then(limit.or_not())
        .ignore_then(sort_field().then_ignore(ctrl(',').or_not()).repeated())
        .map(StageKind::Sort)
}

fn sort_field() -> impl Parser<TokenKind, SortField, Error = PError> + Clone {
    choice((ctrl('-').to(true), ctrl('+').to(false)))
        .or_not()
        .then(field_name())
        .map(|(prefix, field)| {
            // `-field` with no space lexes as one word.
            let (descending, field) = match prefix {
                Some(d) => (d, field),
                None => match field.strip_prefix('-') {
                    Some(rest) => (true, rest.to_string()),
                    None => (false, field),
                },
            };
            SortField { field, descending }
        })
}

fn top_rare_stage() -> impl Parser<TokenKind, StageKind, Error = PError> + Clone {
    enum Item {
        Plain(ListItem),
        By(Vec<String>),
    }

    let item = choice((
        keyword("by").ignore_then(by_fields()).map(Item::By),
        named_arg().map(|o| Item::Plain(ListItem::Opt(o))),
        field_name().map(|f| Item::Plain(ListItem::Field(f))),
    ))
    .then_ignore(ctrl(',').or_not());

    cmd_one_of(&["top", "rare"])
        .then(item.repeated())
        .map(|(command, items)| {
            let mut fields = vec![];
            let mut by = vec![];
            let mut options = vec![];
            for item in items {
                match item {
                    Item::Plain(ListItem::Field(f)) => fields.push(f),
                    Item::Plain(ListItem::Opt(o)) => options.push(o),
                    Item::By(f) => by.extend(f),
                }
            }
            StageKind::TopRare {
                command,
                fields,
                by,
                options,
            }
        })
}

fn generic_stage<'a>(
    subsearch: impl Parser<TokenKind, Subsearch, Error = PError> + Clone + 'a,
) -> impl Parser<TokenKind, StageKind, Error = PError> + Clone + 'a {
    let bare = filter_map(|span, t: TokenKind| match t {
        TokenKind::Control('|') | TokenKind::Control(']') | TokenKind::Control('[') => {
            Err(PError::expected_input_found(span, [], Some(t)))
        }
        TokenKind::Ident(s) => Ok(s),
        TokenKind::Keyword(k) => Ok(k),
        TokenKind::Literal(Literal::Number(n)) => Ok(n),
        TokenKind::Literal(Literal::String(s)) => Ok(s),
        t => Ok(t.to_string()),
    });

    ident_part()
        .then(
            choice((
                named_arg().map(GenericArg::Named),
                subsearch.map(GenericArg::Sub),
                bare.map(GenericArg::Bare),
            ))
            .repeated(),
        )
        .map(|(name, args)| StageKind::Generic { name, args })
}

enum ListItem {
    Field(String),
    Opt(NamedArg),
}

fn list_items() -> impl Parser<TokenKind, Vec<ListItem>, Error = PError> + Clone {
    choice((
        named_arg().map(ListItem::Opt),
        field_name().map(ListItem::Field),
    ))
    .then_ignore(ctrl(',').or_not())
    .repeated()
}

fn split_items(items: Vec<ListItem>) -> (Vec<String>, Vec<NamedArg>) {
    let mut fields = vec![];
    let mut options = vec![];
    for item in items {
        match item {
            ListItem::Field(f) => fields.push(f),
            ListItem::Opt(o) => options.push(o),
        }
    }
    (fields, options)
}

fn clean_field(field: String) -> String {
    field
        .strip_prefix('-')
        .or_else(|| field.strip_prefix('+'))
        .map(str::to_string)
        .unwrap_or(field)
}
