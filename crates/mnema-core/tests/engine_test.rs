//! End-to-end engine test over a small corpus
//!
//! Covers:
//! 1. Initial indexing of a three-file corpus
//! 2. Idempotent second run
//! 3. Hash-triggered chunk replacement
//! 4. Importance ordering (referenced document ranks highest)
//! 5. Lexical search surfacing a middle chunk with its heading

use mnema_core::{
    reindex, search, Config, NoopEmbedder, RootKind, SearchOptions, Store, WatchedRoot,
};

fn write(dir: &std::path::Path, rel: &str, text: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

fn corpus(temp: &tempfile::TempDir) -> Config {
    write(
        temp.path(),
        "notes/a.md",
        "# Alpha\nintro paragraph about the subsystem\n\n## Deployment\nthe zanzibar rollout happens in waves\n\n## Appendix\nsee [the beta notes](b.md) for details\n",
    );
    write(
        temp.path(),
        "notes/b.md",
        "# Beta\nreference material that alpha links to\n",
    );
    write(temp.path(), "notes/c.md", "# Gamma\nisolated side note\n");

    Config {
        store_path: None,
        roots: vec![WatchedRoot::new(temp.path().join("notes"), RootKind::Docs)],
        embedding: Default::default(),
    }
}

#[tokio::test]
async fn test_index_search_and_rank_end_to_end() {
    let temp = tempfile::TempDir::new().unwrap();
    let config = corpus(&temp);
    let store = Store::open_in_memory().unwrap();
    let caps = store.initialize().unwrap();
    assert!(!caps.rebuilt);

    // 1. Initial indexing
    let stats = reindex(&store, &config, &NoopEmbedder).await.unwrap();
    assert_eq!(stats.added, 3);
    assert_eq!(stats.updated, 0);
    assert_eq!(stats.removed, 0);

    // 2. Idempotence: nothing changes on the second run
    let stats = reindex(&store, &config, &NoopEmbedder).await.unwrap();
    assert_eq!(stats.added, 0);
    assert_eq!(stats.updated, 0);
    assert_eq!(stats.removed, 0);
    assert_eq!(stats.unchanged, 3);

    let chunk_rows_before: Vec<(i64, String)> = {
        let a = store.find_document("notes/a.md").unwrap().unwrap();
        store
            .document_chunks(a.id)
            .unwrap()
            .into_iter()
            .map(|(index, _, content)| (index as i64, content))
            .collect()
    };

    // 4. Importance: the referenced document outranks everything
    let b = store.find_document("notes/b.md").unwrap().unwrap();
    let a = store.find_document("notes/a.md").unwrap().unwrap();
    let c = store.find_document("notes/c.md").unwrap().unwrap();
    assert!(b.pagerank > a.pagerank, "referenced doc must rank higher");
    assert!(b.pagerank > c.pagerank);

    // 5. Lexical search hits the middle chunk of A with its heading
    let results = search(
        &store,
        &NoopEmbedder,
        None,
        "zanzibar rollout",
        &SearchOptions::default(),
    )
    .await
    .unwrap();
    assert!(!results.is_empty());
    let top = &results[0];
    assert_eq!(top.path, "notes/a.md");
    assert_eq!(top.heading.as_deref(), Some("Deployment"));
    assert_eq!(top.match_type.as_str(), "lexical");
    assert!(top.labels.contains(&"doc".to_string()));

    // 3. Hash-triggered update: one changed character replaces A's chunks
    write(
        temp.path(),
        "notes/a.md",
        "# Alpha\nintro paragraph about the subsystem!\n\n## Deployment\nthe zanzibar rollout happens in waves\n\n## Appendix\nsee [the beta notes](b.md) for details\n",
    );
    let stats = reindex(&store, &config, &NoopEmbedder).await.unwrap();
    assert_eq!(stats.added, 0);
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.unchanged, 2);

    let a = store.find_document("notes/a.md").unwrap().unwrap();
    let chunk_rows_after = store.document_chunks(a.id).unwrap();
    assert_eq!(a.chunk_count, chunk_rows_after.len());
    assert_eq!(chunk_rows_after.len(), chunk_rows_before.len());
    assert!(chunk_rows_after
        .iter()
        .any(|(_, _, content)| content.ends_with('!')));
}

#[tokio::test]
async fn test_removed_file_cascades_out() {
    let temp = tempfile::TempDir::new().unwrap();
    let config = corpus(&temp);
    let store = Store::open_in_memory().unwrap();
    store.initialize().unwrap();

    reindex(&store, &config, &NoopEmbedder).await.unwrap();
    std::fs::remove_file(temp.path().join("notes/c.md")).unwrap();

    let stats = reindex(&store, &config, &NoopEmbedder).await.unwrap();
    assert_eq!(stats.removed, 1);
    assert!(store.find_document("notes/c.md").unwrap().is_none());

    let stats = store.stats().unwrap();
    assert_eq!(stats.documents, 2);
}
