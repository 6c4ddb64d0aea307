//! Scrape detection-rule YAML files into a JSON query corpus.
//!
//! Walks a directory of Splunk Security Content detections, pulls out
//! each rule's `name` and `search`, dedupes on the query text against
//! the existing corpus, and appends the new entries.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "scrape-corpus", about = "Append detection searches to a query corpus")]
struct Cli {
    /// Directory of detection YAML files to scan.
    detections_dir: PathBuf,

    /// Corpus file to append to (created if missing).
    #[arg(default_value = "testdata/corpus.json")]
    corpus: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct QueryEntry {
    source: String,
    name: String,
    query: String,
}

#[derive(Deserialize)]
struct Detection {
    #[serde(default)]
    name: String,
    #[serde(default)]
    search: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut corpus: Vec<QueryEntry> = match fs::read(&cli.corpus) {
        Ok(data) => serde_json::from_slice(&data)
            .with_context(|| format!("parsing existing corpus {}", cli.corpus.display()))?,
        Err(_) => vec![],
    };
    let mut existing: HashSet<String> = corpus.iter().map(|q| q.query.clone()).collect();

    println!("Existing corpus: {} entries", corpus.len());

    let mut added = 0;
    for entry in WalkDir::new(&cli.detections_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        if !is_yaml(entry.path()) {
            continue;
        }

        // Unreadable or non-detection YAML files are just skipped.
        let Ok(raw) = fs::read_to_string(entry.path()) else {
            continue;
        };
        let Ok(detection) = serde_yaml::from_str::<Detection>(&raw) else {
            continue;
        };

        let query = detection.search.trim().to_string();
        if query.is_empty() || !existing.insert(query.clone()) {
            continue;
        }

        let name = if detection.name.is_empty() {
            entry
                .path()
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            detection.name
        };

        corpus.push(QueryEntry {
            source: "splunk_security_content".to_string(),
            name,
            query,
        });
        added += 1;
    }

    println!("Added: {added} new queries");
    println!("Total: {} entries", corpus.len());

    if let Some(parent) = cli.corpus.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let out = serde_json::to_vec_pretty(&corpus)?;
    fs::write(&cli.corpus, out)
        .with_context(|| format!("writing {}", cli.corpus.display()))?;

    println!("Written to {}", cli.corpus.display());
    Ok(())
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"))
}
