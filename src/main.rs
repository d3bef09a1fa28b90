use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use usfm_corpus::cli::{parse_selection, parse_selector, Cli, Command};
use usfm_corpus::config::ProjectConfig;
use usfm_corpus::models::{AlignmentEdit, TestResults};
use usfm_corpus::pipeline::Workspace;
use usfm_corpus::schema;

fn main() -> Result<()> {
    let cli = Cli::parse();

    println!("USFM corpus manager starting...");

    let mut config = ProjectConfig::load(&cli.project).context("Failed to load project config")?;
    if let Some(source_language) = cli.source_language {
        config.source_language = source_language;
    }
    if let Some(target_language) = cli.target_language {
        config.target_language = target_language;
    }
    if let Some(log_dir) = cli.log_dir {
        config.log_dir = log_dir;
    }

    println!("Project directory: {:?}", cli.project);
    println!("Log directory: {:?}", config.resolved_log_dir(&cli.project));

    let mut workspace = Workspace::open(&cli.project, config).context("Failed to open project")?;

    let changed = run(&mut workspace, cli.command)?;
    if changed {
        let manifest = workspace.save()?;
        println!(
            "Saved {} group(s), {} book(s), {} verse(s)",
            manifest.stats.groups, manifest.stats.books, manifest.stats.verses
        );
    }

    let report = workspace.finalize()?;
    println!("Done!");
    println!("Errors: {}, Warnings: {}", report.errors, report.warnings);

    Ok(())
}

/// Runs one subcommand; true when the corpus changed and must be saved
fn run(workspace: &mut Workspace, command: Command) -> Result<bool> {
    match command {
        Command::ImportTarget {
            group,
            inputs,
            overwrite,
        } => {
            let books = workspace.read_books(&inputs)?;
            println!("Importing {} book(s) into {}...", books.len(), group);
            let summary = workspace.import_target(&group, &books, overwrite)?;
            for skipped in &summary.skipped {
                println!("Skipped {} (already imported, use --overwrite)", skipped);
            }
            println!("Imported {} book(s)", summary.imported.len());
            Ok(!summary.imported.is_empty())
        }
        Command::ImportSource { inputs, selectors } => {
            let selection = if selectors.is_empty() {
                parse_selection(&["*".to_string()])?
            } else {
                parse_selection(&selectors)?
            };
            let books = workspace.read_books(&inputs)?;
            println!("Attaching source text from {} book(s)...", books.len());
            let counts = workspace.import_source(&books, &selection);
            println!(
                "Added {} verse(s), dropped {} verse(s)",
                counts.added_verse_count, counts.dropped_verse_count
            );
            Ok(counts.added_verse_count > 0)
        }
        Command::List { scope } => {
            let (headers, rows) = workspace.list(scope);
            println!("{}", headers.join("\t"));
            for row in rows {
                println!("{}", row.data.join("\t"));
            }
            Ok(false)
        }
        Command::Remove { selectors } => {
            workspace.remove(&parse_selection(&selectors)?)?;
            println!("Removed selection");
            Ok(true)
        }
        Command::Rename { to, selectors } => {
            workspace.rename(&to, &parse_selection(&selectors)?)?;
            println!("Moved selection into {}", to);
            Ok(true)
        }
        Command::Export { out, gzip, selectors } => {
            let gzip = gzip || workspace.config.gzip_export;
            let summary = workspace.export(&parse_selection(&selectors)?, &out, gzip)?;
            for file in &summary.files {
                println!("Wrote {}", file);
            }
            println!("Exported {} book(s) to {:?}", summary.books, out);
            Ok(false)
        }
        Command::Alignment { selector, edit } => {
            let selector = parse_selector(&selector)?;
            let changed = match edit {
                Some(path) => {
                    let content = fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read alignment edit: {:?}", path))?;
                    let edit: AlignmentEdit =
                        serde_json::from_str(&content).context("Failed to parse alignment edit")?;
                    workspace.update_alignment(&selector, &edit)?;
                    true
                }
                None => false,
            };
            let state = workspace.alignment_state(&selector)?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            Ok(changed)
        }
        Command::TrainingData { testing, out } => {
            let batch = workspace.alignment_batch(testing);
            let json = serde_json::to_string_pretty(&batch)?;
            match out {
                Some(path) => {
                    fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Wrote {} sample(s) to {:?}", batch.len(), path);
                }
                None => println!("{}", json),
            }
            Ok(false)
        }
        Command::TestResults { results } => {
            let content = fs::read_to_string(&results)
                .with_context(|| format!("Failed to read test results: {:?}", results))?;
            let results: TestResults = serde_json::from_str(&content).context("Failed to parse test results")?;
            workspace.apply_test_results(&results);
            println!(
                "Recorded {} score(s), average ratio correct {:.2}",
                results.test_results.len(),
                results.average_ratio_correct
            );
            Ok(true)
        }
        Command::Reserve { release, selectors } => {
            workspace.reserve_for_testing(&parse_selection(&selectors)?, !release)?;
            println!("{} selection", if release { "Released" } else { "Reserved" });
            Ok(true)
        }
        Command::Stats => {
            let stats = workspace.collection.stats();
            println!(
                "Groups: {}, Books: {}, Chapters: {}, Verses: {}",
                stats.groups, stats.books, stats.chapters, stats.verses
            );
            for (state, count) in &stats.states {
                println!("  {}: {}", state, count);
            }
            Ok(false)
        }
        Command::Validate { inputs } => {
            println!("Validation-only mode: checking books...");
            let books = workspace.read_books(&inputs)?;
            let result = workspace.validate(&books);
            for error in &result.errors {
                println!("error: {}", error.message);
            }
            for warning in &result.warnings {
                println!("warning: {}", warning.message);
            }
            println!(
                "{} book(s), {} chapter(s), {} verse(s), {} missing verse(s)",
                result.statistics.total_books,
                result.statistics.total_chapters,
                result.statistics.total_verses,
                result.statistics.missing_verses
            );
            Ok(false)
        }
        Command::Schema { out } => {
            let written = schema::generate_schemas(&out, &workspace.config.schema_version)
                .context("Schema generation failed")?;
            for path in written {
                println!("Wrote {:?}", path);
            }
            Ok(false)
        }
    }
}
