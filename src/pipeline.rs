use crate::alignment::MilestoneBridge;
use crate::chapter::ListScope;
use crate::config::ProjectConfig;
use crate::export::{ArchiveWriter, DirectoryArchive};
use crate::group_collection::GroupCollection;
use crate::logger::{DiagnosticLogger, SessionReport};
use crate::models::{
    AlignmentBatch, AlignmentEdit, ExportSummary, ListRow, ParsedBooks, SourceImportCounts, TestResults,
    VerseAlignmentState,
};
use crate::parser::{UsfmCodec, UsfmTextCodec};
use crate::selection::{Selection, Selector};
use crate::store::{ProjectStore, StoreManifest};
use crate::validation::{InputValidator, ValidationResult};
use anyhow::{anyhow, bail, Context, Result};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use strsim::normalized_levenshtein;
use walkdir::WalkDir;

const BOOK_EXTENSIONS: &[&str] = &["usfm", "sfm", "json"];
const SUGGESTION_THRESHOLD: f64 = 0.5;

/// What a target import did with each incoming book
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetImportSummary {
    pub imported: Vec<String>,
    pub skipped: Vec<String>,
}

/// A project directory opened for editing: the current tree plus everything
/// needed to read, check, write and record changes to it
pub struct Workspace {
    pub project_dir: PathBuf,
    pub config: ProjectConfig,
    pub collection: GroupCollection,
    pub codec: UsfmTextCodec,
    pub bridge: MilestoneBridge,
    pub validator: InputValidator,
    pub logger: DiagnosticLogger,
    store: ProjectStore,
}

impl Workspace {
    /// Opens `project_dir` with its stored config and a session log under the
    /// configured log directory
    pub fn open(project_dir: &Path, config: ProjectConfig) -> Result<Self> {
        let logger = DiagnosticLogger::new(&config.resolved_log_dir(project_dir))
            .context("Failed to create DiagnosticLogger")?;
        Self::open_with_logger(project_dir, config, logger)
    }

    pub fn open_with_logger(project_dir: &Path, config: ProjectConfig, logger: DiagnosticLogger) -> Result<Self> {
        let bridge = MilestoneBridge::new(&config.source_language, &config.target_language)
            .context("Failed to create alignment bridge")?;
        let store = ProjectStore::new(project_dir, &config.schema_version);
        let collection = store
            .load_or_default(&bridge)
            .with_context(|| format!("Failed to load project from {:?}", project_dir))?;

        logger.info_with(
            format!("Opened project {:?}", project_dir),
            json!({
                "groups": collection.groups().len(),
                "source_language": config.source_language,
                "target_language": config.target_language,
            }),
        );

        Ok(Workspace {
            project_dir: project_dir.to_path_buf(),
            config,
            collection,
            codec: UsfmTextCodec::new().context("Failed to create UsfmTextCodec")?,
            bridge,
            validator: InputValidator::new().context("Failed to create InputValidator")?,
            logger,
            store,
        })
    }

    /// Parses every book file named in `inputs`. Directories are walked for
    /// `.usfm`, `.sfm` and `.json` files; `.json` files hold the parsed shape.
    pub fn read_books(&self, inputs: &[PathBuf]) -> Result<ParsedBooks> {
        let mut parsed_books = ParsedBooks::new();

        for input in inputs {
            if !input.exists() {
                bail!("Input not found: {:?}", input);
            }

            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry.with_context(|| format!("Failed to walk {:?}", input))?;
                if !entry.file_type().is_file() || (entry.depth() > 0 && !is_book_file(entry.path())) {
                    continue;
                }

                let path = entry.path();
                let filename = entry.file_name().to_string_lossy().to_string();
                let content = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

                let book = if has_extension(path, "json") {
                    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON book {:?}", path))?
                } else {
                    self.codec
                        .parse(&content)
                        .with_context(|| format!("Failed to parse USFM {:?}", path))?
                };

                if parsed_books.insert(filename.clone(), book).is_some() {
                    self.logger.warning(
                        format!("File name {} given more than once; the later file wins", filename),
                        Some(json!({ "path": path.display().to_string() })),
                    );
                }
            }
        }

        self.logger.info(format!("Read {} book file(s)", parsed_books.len()));
        Ok(parsed_books)
    }

    /// Runs the input checks and logs every finding
    pub fn validate(&self, parsed_books: &ParsedBooks) -> ValidationResult {
        let result = self.validator.validate_books(parsed_books);

        for error in &result.errors {
            self.logger.error(
                error.message.clone(),
                Some(json!({
                    "filename": error.context.filename,
                    "book": error.context.book,
                    "chapter": error.context.chapter,
                    "verse": error.context.verse,
                })),
            );
        }

        for warning in &result.warnings {
            self.logger.warning(
                warning.message.clone(),
                Some(json!({
                    "filename": warning.context.filename,
                    "book": warning.context.book,
                    "chapter": warning.context.chapter,
                    "verse": warning.context.verse,
                })),
            );
        }

        self.logger.info_with(
            format!(
                "Validated {} books, {} chapters, {} verses",
                result.statistics.total_books, result.statistics.total_chapters, result.statistics.total_verses
            ),
            json!(result.statistics),
        );

        result
    }

    /// Imports target text into `group_name`. Books already in the group are
    /// skipped unless `overwrite` is set.
    pub fn import_target(
        &mut self,
        group_name: &str,
        parsed_books: &ParsedBooks,
        overwrite: bool,
    ) -> Result<TargetImportSummary> {
        let validation = self.validate(parsed_books);
        if !validation.is_valid {
            bail!(
                "Refusing to import into {}: {} validation error(s)",
                group_name,
                validation.errors.len()
            );
        }

        let mut summary = TargetImportSummary::default();
        let mut accepted = ParsedBooks::new();
        for (filename, usfm_book) in parsed_books {
            if !overwrite && self.collection.has_book_in_group(group_name, filename, usfm_book) {
                self.logger.warning(
                    format!("{} is already in {}; skipped", filename, group_name),
                    Some(json!({ "group": group_name, "filename": filename })),
                );
                summary.skipped.push(filename.clone());
            } else {
                accepted.insert(filename.clone(), usfm_book.clone());
                summary.imported.push(filename.clone());
            }
        }

        if !accepted.is_empty() {
            self.collection = self.collection.add_target_usfm(group_name, &accepted, &self.bridge);
        }

        self.logger.info_with(
            format!("Imported {} target book(s) into {}", summary.imported.len(), group_name),
            json!({ "imported": summary.imported, "skipped": summary.skipped }),
        );
        Ok(summary)
    }

    /// Attaches source text to every book sharing its toc3, limited to the
    /// verses `selection` covers
    pub fn import_source(&mut self, parsed_books: &ParsedBooks, selection: &Selection) -> SourceImportCounts {
        self.validate(parsed_books);

        let is_selected = |key: &Selector| selection.is_fully_selected(key);
        let result = self.collection.add_source_usfm(parsed_books, &is_selected, &self.bridge);
        self.collection = result.group_collection;

        let counts = SourceImportCounts {
            added_verse_count: result.added_verse_count,
            dropped_verse_count: result.dropped_verse_count,
        };
        self.logger.info_with(
            format!(
                "Imported source text: {} verse(s) added, {} dropped",
                counts.added_verse_count, counts.dropped_verse_count
            ),
            json!(counts),
        );
        if counts.dropped_verse_count > 0 {
            self.logger.warning(
                format!("{} source verse(s) had no matching target verse", counts.dropped_verse_count),
                None,
            );
        }
        counts
    }

    pub fn remove(&mut self, selection: &Selection) -> Result<()> {
        self.check_selection(selection)?;
        let before = self.collection.stats();
        self.collection = self.collection.remove_selected_resources(selection);
        let after = self.collection.stats();

        self.logger.info_with(
            format!("Removed {} verse(s)", before.verses - after.verses),
            json!({ "selection": selection.selectors(), "groups_left": after.groups }),
        );
        Ok(())
    }

    pub fn rename(&mut self, new_group_name: &str, selection: &Selection) -> Result<()> {
        if new_group_name.trim().is_empty() {
            bail!("Group name cannot be empty");
        }
        self.check_selection(selection)?;
        self.collection = self.collection.rename_selected_groups(new_group_name, selection);

        self.logger.info_with(
            format!("Moved selection into group {}", new_group_name),
            json!({ "selection": selection.selectors() }),
        );
        Ok(())
    }

    /// Exports the selected books as USFM under `out_dir`, one folder per group
    pub fn export(&self, selection: &Selection, out_dir: &Path, gzip: bool) -> Result<ExportSummary> {
        let mut archive = DirectoryArchive::new(out_dir, gzip)?;
        self.export_to(selection, &mut archive)
    }

    pub fn export_to(&self, selection: &Selection, archive: &mut dyn ArchiveWriter) -> Result<ExportSummary> {
        self.check_selection(selection)?;
        let is_partially_selected = |key: &Selector| selection.is_partially_selected(key);
        let summary = self
            .collection
            .save_selected_resources_to_usfm_archive(archive, &is_partially_selected, &self.codec)
            .context("Failed to export selected resources")?;

        self.logger.info_with(
            format!("Exported {} book(s) from {} group(s)", summary.books, summary.groups),
            json!({ "files": summary.files }),
        );
        Ok(summary)
    }

    pub fn reserve_for_testing(&mut self, selection: &Selection, reserved: bool) -> Result<()> {
        self.check_selection(selection)?;
        self.collection = self
            .collection
            .set_reserved_for_testing(selection, reserved, &self.bridge);

        self.logger.info_with(
            format!(
                "{} selection for testing",
                if reserved { "Reserved" } else { "Released" }
            ),
            json!({ "selection": selection.selectors() }),
        );
        Ok(())
    }

    pub fn alignment_state(&self, selector: &Selector) -> Result<VerseAlignmentState> {
        self.collection
            .verse_alignment_state(selector, &self.bridge)
            .map_err(|e| anyhow!("{}{}", e, self.suggestion_for(selector)))
    }

    pub fn update_alignment(&mut self, selector: &Selector, edit: &AlignmentEdit) -> Result<()> {
        self.collection
            .verse(selector)
            .map_err(|e| anyhow!("{}{}", e, self.suggestion_for(selector)))?;

        let before = self.collection.verse(selector)?.state();
        self.collection = self.collection.update_alignment_state(edit, selector, &self.bridge);
        let after = self.collection.verse(selector)?.state();

        self.logger.info_with(
            format!("Updated alignment of {}", selector),
            json!({ "from": before.as_str(), "to": after.as_str() }),
        );
        Ok(())
    }

    pub fn alignment_batch(&self, for_testing: bool) -> AlignmentBatch {
        let batch = self
            .collection
            .alignment_data_for_training_or_testing(for_testing, &self.bridge);
        self.logger.info(format!(
            "Collected {} {} sample(s)",
            batch.len(),
            if for_testing { "testing" } else { "training" }
        ));
        batch
    }

    pub fn apply_test_results(&mut self, results: &TestResults) {
        self.collection = self.collection.add_alignment_test_results(results);
        self.logger.info_with(
            format!("Recorded test results for {} verse(s)", results.test_results.len()),
            json!({ "average_ratio_correct": results.average_ratio_correct }),
        );
    }

    pub fn list(&self, scope: ListScope) -> (Vec<String>, Vec<ListRow>) {
        (GroupCollection::list_headers(scope), self.collection.list_rows(scope))
    }

    pub fn save(&self) -> Result<StoreManifest> {
        self.config
            .save(&self.project_dir)
            .context("Failed to save project config")?;
        let manifest = self.store.save(&self.collection).context("Failed to save corpus")?;

        self.logger.info_with(
            format!("Saved corpus (SHA-256: {})", manifest.snapshot_sha256),
            json!(manifest.stats),
        );
        Ok(manifest)
    }

    /// Closes the session: report plus rotation of old session logs
    pub fn finalize(&self) -> Result<SessionReport> {
        let report = self
            .logger
            .generate_report(self.collection.stats())
            .context("Failed to generate session report")?;
        self.logger
            .rotate_logs(self.config.max_session_logs)
            .context("Failed to rotate session logs")?;
        Ok(report)
    }

    /// Rejects selectors naming a group or book that does not exist
    fn check_selection(&self, selection: &Selection) -> Result<()> {
        for selector in selection.selectors() {
            let Some(group_name) = selector.group_name() else {
                continue;
            };
            let Some(group) = self.collection.group(group_name) else {
                bail!(
                    "No group named {}{}",
                    group_name,
                    suggest(group_name, self.collection.groups().keys())
                );
            };
            if let Selector::Book { book, .. } | Selector::Chapter { book, .. } | Selector::Verse { book, .. } =
                selector
            {
                if !group.has_book(book) {
                    bail!(
                        "No book named {} in {}{}",
                        book,
                        group_name,
                        suggest(book, group.books().keys())
                    );
                }
            }
        }
        Ok(())
    }

    fn suggestion_for(&self, selector: &Selector) -> String {
        let Selector::Verse { group, book, .. } = selector else {
            return String::new();
        };
        match self.collection.group(group) {
            None => suggest(group, self.collection.groups().keys()),
            Some(existing) if !existing.has_book(book) => suggest(book, existing.books().keys()),
            Some(_) => String::new(),
        }
    }
}

/// ` (did you mean X?)` for the closest candidate, or nothing
pub fn suggest<'a, I>(name: &str, candidates: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    candidates
        .into_iter()
        .map(|candidate| (candidate, normalized_levenshtein(name, candidate)))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| format!(" (did you mean {}?)", candidate))
        .unwrap_or_default()
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case(extension))
}

fn is_book_file(path: &Path) -> bool {
    BOOK_EXTENSIONS.iter().any(|extension| has_extension(path, extension))
}
