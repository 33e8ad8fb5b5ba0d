use std::{
    env,
    ffi::{OsStr, OsString},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context};
use clap::{ArgAction, Parser};
use console::{style, Color, Style};
use rhyme_core::{
    find_occurrences, phonetic_ending, DocumentStats, HighlightApplier, HighlightSpan, RhymeConfig, RhymeDetector,
    RhymeGroups, Styling,
};
use serde::Serialize;
use walkdir::WalkDir;

/// Rhyme highlighter CLI entry point.
#[derive(Debug, Parser)]
#[command(name = "rhyme", about = "Find and highlight rhyming words in text files.")]
struct Args {
    /// Path to config file (YAML). Defaults to rhyme-style.yml if present.
    #[arg(long, default_value = "rhyme-style.yml")]
    config: PathBuf,

    /// Emit JSON output for automation.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Print the text itself with rhyming words colored.
    #[arg(long, action = ArgAction::SetTrue)]
    render: bool,

    /// Only print the per-file summary line.
    #[arg(long, action = ArgAction::SetTrue)]
    quiet: bool,

    /// Set config overrides (repeatable as key=value). Example: --set max_group_size=10
    #[arg(long = "set", value_name = "KEY=VALUE", num_args = 0..)]
    sets: Vec<String>,

    /// Files or directories to analyse.
    #[arg(value_name = "PATH", default_value = ".", num_args = 0..)]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Parser)]
#[command(name = "rhyme pair", about = "Check whether two words rhyme.")]
struct PairArgs {
    first: String,
    second: String,

    /// Emit JSON output for automation.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct FileResult {
    path: String,
    stats: DocumentStats,
    groups: RhymeGroups,
    spans: Vec<HighlightSpan>,
}

#[derive(Debug, Serialize)]
struct OutputReport {
    files: Vec<FileResult>,
    total_words: usize,
    total_rhymes: usize,
}

#[derive(Debug, Serialize)]
struct PairResult {
    first: String,
    second: String,
    first_key: Option<String>,
    second_key: Option<String>,
    rhymes: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let argv: Vec<OsString> = env::args_os().collect();
    if argv.len() > 1 && argv[1].as_os_str() == OsStr::new("pair") {
        let mut forwarded = Vec::with_capacity(argv.len() - 1);
        forwarded.push(argv[0].clone());
        forwarded.extend_from_slice(&argv[2..]);
        return run_pair(PairArgs::parse_from(forwarded));
    }

    run_analyze(Args::parse())
}

fn run_analyze(args: Args) -> anyhow::Result<()> {
    let mut cfg = load_config(&args.config)?;
    apply_overrides(&mut cfg, &args.sets)?;
    let detector = RhymeDetector::new(cfg).context("invalid rhyme configuration")?;
    let applier = HighlightApplier::new(detector.palette_len());

    let mut files = collect_files(&args.paths)?;
    files.sort();

    let mut results = Vec::new();
    for path in files {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let result = detector.analyze(content.as_str());
        let mut styling = Styling::default();
        let update = applier
            .apply(&result, &content, &mut styling)
            .ok_or_else(|| anyhow!("analysis of {} went stale", path.display()))?;
        log::debug!(
            "{}: {} groups, {} spans",
            path.display(),
            result.groups().len(),
            update.spans.len()
        );

        let file = FileResult {
            path: path.to_string_lossy().replace('\\', "/"),
            stats: update.stats,
            groups: result.into_groups(),
            spans: update.spans,
        };
        if !args.json {
            print_human_report(&file, &content, args.quiet, detector.palette_len());
            if args.render {
                print_rendered(&content, &styling);
            }
        }
        results.push(file);
    }

    if args.json {
        let report = OutputReport {
            total_words: results.iter().map(|f| f.stats.words).sum(),
            total_rhymes: results.iter().map(|f| f.stats.rhymes).sum(),
            files: results,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn run_pair(args: PairArgs) -> anyhow::Result<()> {
    let result = PairResult {
        rhymes: rhyme_core::words_rhyme(&args.first, &args.second),
        first_key: phonetic_ending(&args.first),
        second_key: phonetic_ending(&args.second),
        first: args.first,
        second: args.second,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    let verdict = if result.rhymes {
        style("rhyme").green()
    } else {
        style("do not rhyme").red()
    };
    println!(
        "{} ({}) and {} ({}) {}",
        style(&result.first).bold(),
        result.first_key.as_deref().unwrap_or("-"),
        style(&result.second).bold(),
        result.second_key.as_deref().unwrap_or("-"),
        verdict
    );
    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<RhymeConfig> {
    if !path.exists() {
        return Ok(RhymeConfig::default());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let cfg: RhymeConfig = serde_yaml::from_str(&text)
        .with_context(|| format!("Invalid config structure in {}", path.display()))?;
    Ok(cfg)
}

fn apply_overrides(cfg: &mut RhymeConfig, sets: &[String]) -> anyhow::Result<()> {
    for kv in sets {
        let Some((key, val)) = kv.split_once('=') else {
            bail!("override `{kv}` is not KEY=VALUE");
        };
        let (key, val) = (key.trim(), val.trim());
        match key {
            "debounce_ms" => cfg.debounce_ms = parse_override(key, val)?,
            "min_word_length" => cfg.min_word_length = parse_override(key, val)?,
            "max_group_size" => cfg.max_group_size = parse_override(key, val)?,
            "common_suffix_threshold" => cfg.common_suffix_threshold = parse_override(key, val)?,
            "common_suffixes" => {
                cfg.common_suffixes = val
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "highlighting" => cfg.highlighting = matches!(val, "true" | "1" | "yes"),
            _ => log::warn!("ignoring unknown override `{key}`"),
        }
    }
    Ok(())
}

fn parse_override<T: std::str::FromStr>(key: &str, val: &str) -> anyhow::Result<T> {
    val.parse::<T>()
        .map_err(|_| anyhow!("invalid value `{val}` for {key}"))
}

fn collect_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            for entry in WalkDir::new(path).into_iter().filter_map(Result::ok) {
                if entry.file_type().is_file() && is_supported(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else {
            bail!("Path not found: {}", path.display());
        }
    }
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "txt" | "md" | "markdown" | "lyrics"
        ),
        None => false,
    }
}

/// Terminal color for a palette slot; the configured hex colors are for GUI clients.
fn palette_style(palette_index: usize) -> Style {
    let color = match palette_index % 8 {
        0 => Color::Red,
        1 => Color::Blue,
        2 => Color::Green,
        3 => Color::Color256(208),
        4 => Color::Magenta,
        5 => Color::Cyan,
        6 => Color::Color256(205),
        _ => Color::Yellow,
    };
    Style::new().fg(color).bold()
}

/// Whole-word occurrences of each group's members, in group order.
fn group_hits(text: &str, groups: &RhymeGroups) -> Vec<usize> {
    groups
        .values()
        .map(|words| find_occurrences(text, words.as_slice()).len())
        .collect()
}

fn print_human_report(file: &FileResult, content: &str, quiet: bool, palette_len: usize) {
    println!(
        "{} ({} words, {} characters, {} rhymes)",
        style(&file.path).bold(),
        file.stats.words,
        file.stats.chars,
        file.stats.rhymes
    );
    if quiet {
        return;
    }
    if file.groups.is_empty() {
        println!("  {}", style("no rhymes").dim());
        return;
    }
    let hits = group_hits(content, &file.groups);
    for (n, (key, words)) in file.groups.iter().enumerate() {
        let palette_index = n % palette_len.max(1);
        println!(
            "  [{}] {} ({} highlighted in slot {})",
            palette_style(palette_index).apply_to(format!("-{key}")),
            words.join(", "),
            hits[n],
            palette_index
        );
    }
}

fn print_rendered(text: &str, styling: &Styling) {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for run in styling.runs() {
        out.push_str(&text[cursor..run.start]);
        out.push_str(
            &palette_style(run.palette_index)
                .apply_to(&text[run.start..run.end()])
                .to_string(),
        );
        cursor = run.end();
    }
    out.push_str(&text[cursor..]);
    println!("{out}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_update_config() {
        let mut cfg = RhymeConfig::default();
        apply_overrides(
            &mut cfg,
            &[
                "max_group_size=10".into(),
                "common_suffixes=ing, ed".into(),
                "highlighting=no".into(),
            ],
        )
        .unwrap();
        assert_eq!(cfg.max_group_size, 10);
        assert_eq!(cfg.common_suffixes, vec!["ing", "ed"]);
        assert!(!cfg.highlighting);
    }

    #[test]
    fn malformed_overrides_are_errors() {
        let mut cfg = RhymeConfig::default();
        assert!(apply_overrides(&mut cfg, &["max_group_size".into()]).is_err());
        assert!(apply_overrides(&mut cfg, &["max_group_size=lots".into()]).is_err());
    }

    #[test]
    fn hits_are_counted_per_group_not_per_palette_slot() {
        // Nine groups, so the first and the ninth share palette slot 0.
        let text = "cap map bat cat bed red dig fig hog log bun fun hop top gut nut dud mud";
        let detector = RhymeDetector::default();
        let groups = detector.find_rhymes(text);
        assert_eq!(groups.len(), 9);
        let hits = group_hits(text, &groups);
        assert_eq!(hits[0], 2);
        assert_eq!(hits[8], 2);
        let (_, words) = groups.iter().nth(8).unwrap();
        assert_eq!(hits[8], find_occurrences(text, words.as_slice()).len());
    }

    #[test]
    fn supported_extensions() {
        assert!(is_supported(Path::new("poem.TXT")));
        assert!(is_supported(Path::new("song.lyrics")));
        assert!(!is_supported(Path::new("main.rs")));
        assert!(!is_supported(Path::new("README")));
    }
}
