//! Pipeline-stage classification: one [`PipelineStageInfo`] per
//! `|`-separated command, with the original stage text sliced back out of
//! the source by character offsets.

use serde::{Deserialize, Serialize};
use splq_parser::{ast, parse_query, slice_chars};

use crate::guard;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStageInfo {
    /// Zero-based stage index in the pipeline.
    pub index: usize,
    pub command_type: CommandType,
    pub is_aggregation: bool,
    /// The stage's source text, intra-stage whitespace preserved.
    pub original_text: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CommandType {
    Search,
    Where,
    Eval,
    Stats,
    Eventstats,
    Streamstats,
    Chart,
    Timechart,
    Rex,
    Join,
    Append,
    Multisearch,
    Transaction,
    Tstats,
    Mstats,
    Inputlookup,
    Rename,
    Lookup,
    Table,
    Fields,
    Dedup,
    Sort,
    Top,
    Rare,
    /// A command without a dedicated grammar rule.
    Generic,
    Unknown,
}

impl CommandType {
    /// Stages whose command summarizes across events.
    pub fn is_aggregation(self) -> bool {
        matches!(
            self,
            CommandType::Stats
                | CommandType::Eventstats
                | CommandType::Streamstats
                | CommandType::Chart
                | CommandType::Timechart
                | CommandType::Transaction
                | CommandType::Dedup
                | CommandType::Top
                | CommandType::Rare
                | CommandType::Tstats
                | CommandType::Mstats
        )
    }
}

/// Classify every pipeline stage of `query`, in order. Returns an empty
/// sequence when the query is beyond recovery, times out, or panics.
pub fn classify_pipeline_stages(query: &str) -> Vec<PipelineStageInfo> {
    let owned = query.to_string();
    guard::run_guarded(
        move || classify_inner(&owned),
        |message| {
            log::warn!("stage classification failed: {message}");
            vec![]
        },
    )
}

/// The index of the first `join` or `append` stage, if any; callers use
/// it to cap condition scope before a join.
pub fn first_join_or_subsearch_stage(query: &str) -> Option<usize> {
    classify_pipeline_stages(query)
        .iter()
        .find(|s| matches!(s.command_type, CommandType::Join | CommandType::Append))
        .map(|s| s.index)
}

fn classify_inner(query: &str) -> Vec<PipelineStageInfo> {
    let (tree, _errors) = parse_query(query);
    let Some(tree) = tree else {
        return vec![];
    };

    tree.stages
        .iter()
        .enumerate()
        .filter(|(_, stage)| !stage.kind.is_empty())
        .map(|(index, stage)| {
            let command_type = command_type_of(&stage.kind);
            PipelineStageInfo {
                index,
                command_type,
                is_aggregation: command_type.is_aggregation(),
                original_text: slice_chars(query, stage.span),
            }
        })
        .collect()
}

fn command_type_of(kind: &ast::StageKind) -> CommandType {
    use ast::StageKind::*;

    match kind {
        Search(_) => CommandType::Search,
        Where(_) => CommandType::Where,
        Eval(_) => CommandType::Eval,
        Stats(stats) => match stats.command.as_str() {
            "eventstats" => CommandType::Eventstats,
            "streamstats" => CommandType::Streamstats,
            "chart" => CommandType::Chart,
            "timechart" => CommandType::Timechart,
            _ => CommandType::Stats,
        },
        Rex { .. } => CommandType::Rex,
        Join(_) => CommandType::Join,
        Append(_) => CommandType::Append,
        Multisearch(_) => CommandType::Multisearch,
        Transaction { .. } => CommandType::Transaction,
        Tstats(tstats) => match tstats.command.as_str() {
            "mstats" => CommandType::Mstats,
            _ => CommandType::Tstats,
        },
        Inputlookup { .. } => CommandType::Inputlookup,
        Rename(_) => CommandType::Rename,
        Lookup(_) => CommandType::Lookup,
        Table(_) => CommandType::Table,
        Fields { .. } => CommandType::Fields,
        Dedup { .. } => CommandType::Dedup,
        Sort(_) => CommandType::Sort,
        TopRare { command, .. } => match command.as_str() {
            "rare" => CommandType::Rare,
            _ => CommandType::Top,
        },
        Generic { .. } => CommandType::Generic,
        Empty => CommandType::Unknown,
    }
}
