#[cfg(test)]
mod tests {
    use crate::alignment::MilestoneBridge;
    use crate::export::DirectoryArchive;
    use crate::group_collection::GroupCollection;
    use crate::models::{ParsedBooks, UsfmBook, UsfmHeader};
    use crate::parser::UsfmTextCodec;
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;

    fn book_named(name: &str) -> UsfmBook {
        UsfmBook {
            headers: vec![UsfmHeader {
                tag: "h".to_string(),
                content: name.to_string(),
            }],
            chapters: [(
                "1".to_string(),
                [("1".to_string(), json!({"verseObjects": [{"type": "text", "text": "In the beginning"}]}))]
                    .into_iter()
                    .collect(),
            )]
            .into_iter()
            .collect(),
        }
    }

    fn export_all(collection: &GroupCollection, root: &Path) -> Vec<std::path::PathBuf> {
        let mut archive = DirectoryArchive::new(root, false).unwrap();
        collection
            .save_selected_resources_to_usfm_archive(&mut archive, &|_| true, &UsfmTextCodec::default())
            .unwrap();
        archive.written().to_vec()
    }

    fn assert_inside(root: &Path, written: &[std::path::PathBuf]) {
        for path in written {
            assert_eq!(
                path.parent().and_then(Path::parent),
                Some(root),
                "{:?} must sit one folder below the export root",
                path
            );
            assert!(path.exists(), "{:?} should have been written", path);
        }
    }

    #[test]
    fn test_group_names_cannot_traverse() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("export");
        let bridge = MilestoneBridge::new("grc", "en").unwrap();
        let books: ParsedBooks = [("gen.usfm".to_string(), book_named("Genesis"))].into_iter().collect();

        let collection = GroupCollection::default()
            .add_target_usfm("../../etc", &books, &bridge)
            .add_target_usfm("..", &books, &bridge)
            .add_target_usfm("/abs/olute", &books, &bridge);

        let written = export_all(&collection, &root);

        assert_eq!(written.len(), 3);
        assert_inside(&root, &written);
        assert!(root.join("etc").join("gen.usfm").exists());
        assert!(root.join("untitled").join("gen.usfm").exists());
        assert!(root.join("absolute").join("gen.usfm").exists());
        assert!(!temp_dir.path().join("etc").exists());
    }

    #[test]
    fn test_book_filenames_cannot_traverse() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("export");
        let bridge = MilestoneBridge::new("grc", "en").unwrap();
        let books: ParsedBooks = [
            ("../escape.usfm".to_string(), book_named("Genesis")),
            ("..\\..\\win.usfm".to_string(), book_named("Exodus")),
            ("".to_string(), book_named("/root/.ssh")),
        ]
        .into_iter()
        .collect();

        let collection = GroupCollection::default().add_target_usfm("Draft", &books, &bridge);
        let written = export_all(&collection, &root);

        assert_eq!(written.len(), 3);
        assert_inside(&root, &written);
        assert!(root.join("Draft").join("escape.usfm").exists());
        assert!(root.join("Draft").join("win.usfm").exists());
        assert!(root.join("Draft").join("root.ssh.usfm").exists());
    }

    #[test]
    fn test_control_characters_are_stripped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("export");
        let bridge = MilestoneBridge::new("grc", "en").unwrap();
        let books: ParsedBooks = [("gen\u{0}.usfm".to_string(), book_named("Genesis"))].into_iter().collect();

        let collection = GroupCollection::default().add_target_usfm("Dr\naft\t", &books, &bridge);
        let written = export_all(&collection, &root);

        assert_inside(&root, &written);
        assert!(root.join("Draft").join("gen.usfm").exists());
    }
}
