use burn_ner::pipelines::token_classification::labels::{LabelError, LabelSet};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_label_file_gets_sentinels_appended() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("labels.txt");

    let file_labels = [
        "O", "B-LOC", "I-LOC", "B-PER", "I-PER", "B-ORG", "I-ORG", "B-OTH", "I-OTH",
    ];
    std::fs::write(&path, format!("{}\n\n", file_labels.join("\n")))?;

    let labels = LabelSet::from_file(&path).await?;

    assert_eq!(labels.len(), file_labels.len() + 2);
    assert_eq!(labels.task_labels(), file_labels.map(String::from).as_slice());
    assert_eq!(labels.label(labels.len() - 2), Some("X"));
    assert_eq!(labels.label(labels.len() - 1), Some("[PAD]"));

    for (id, label) in file_labels.iter().enumerate() {
        assert_eq!(labels.id(label), Some(id));
    }

    Ok(())
}

#[tokio::test]
async fn test_duplicate_labels_are_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("labels.txt");
    std::fs::write(&path, "O\nB-PER\nO\n")?;

    let result = LabelSet::from_file(&path).await;

    assert!(matches!(result, Err(LabelError::Duplicate(label)) if label == "O"));

    Ok(())
}

#[tokio::test]
async fn test_missing_and_empty_label_files_are_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    let missing = LabelSet::from_file(dir.path().join("missing.txt")).await;
    assert!(matches!(missing, Err(LabelError::Io { .. })));

    let path = dir.path().join("empty.txt");
    std::fs::write(&path, "\n\n")?;

    let empty = LabelSet::from_file(&path).await;
    assert!(matches!(empty, Err(LabelError::Empty)));

    Ok(())
}
