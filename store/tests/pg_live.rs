//! Integration tests against a live Postgres with pgvector.
//!
//! Run with a prepared database:
//! `DATABASE_URL=postgres://... cargo test -p styledeck-store -- --ignored`

use std::time::Duration;

use styledeck_store::{ProductStore, SearchFilter};

fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

#[tokio::test]
#[ignore = "requires a live Postgres with the pgvector extension"]
async fn category_filtered_search_orders_by_similarity() {
    let Some(url) = database_url() else {
        panic!("set DATABASE_URL to run this test");
    };

    let store = ProductStore::connect_lazy(&url, 4, Duration::from_secs(5)).unwrap();

    let mut query = vec![0.0f32; 512];
    query[0] = 1.0;

    let filter = SearchFilter {
        category: Some("top".to_string()),
        ..SearchFilter::default()
    };

    let hits = store.search_similar(&query, &filter, 10).await.unwrap();

    assert!(hits.len() <= 10);
    for hit in &hits {
        assert_eq!(hit.category, "top");
    }
    for pair in hits.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[tokio::test]
#[ignore = "requires a live Postgres with the pgvector extension"]
async fn pending_products_shrink_after_batch_update() {
    let Some(url) = database_url() else {
        panic!("set DATABASE_URL to run this test");
    };

    let store = ProductStore::connect_lazy(&url, 4, Duration::from_secs(5)).unwrap();

    let before = store.pending_products(32).await.unwrap();
    if before.is_empty() {
        return;
    }

    let rows: Vec<_> = before
        .iter()
        .map(|p| styledeck_store::ProductEmbeddings {
            id: p.id,
            image: vec![0.1; 512],
            text: vec![0.2; 512],
        })
        .collect();

    let updated = store.batch_update_embeddings(&rows).await.unwrap();
    assert_eq!(updated, rows.len());

    let after = store.pending_products(32).await.unwrap();
    assert!(after.len() <= before.len() - updated.min(before.len()));
}
