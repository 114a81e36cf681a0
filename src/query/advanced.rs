use serde::Serialize;

use super::collection::Collection;
use super::find::FindQuery;
use super::params::{ParsedQuery, QueryParams};
use super::types::{Document, PaginationWindow, Populate};
use crate::config::QueryConfig;
use crate::database::{DataAccessor, DatabaseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageLink {
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageLink>,
}

impl Pagination {
    pub fn for_window(window: &PaginationWindow, total: u64) -> Self {
        Self {
            next: window
                .has_next(total)
                .then(|| PageLink { page: window.page + 1, limit: window.limit }),
            prev: window
                .has_prev()
                .then(|| PageLink { page: window.page - 1, limit: window.limit }),
        }
    }
}

/// Response body shared by every paginated list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvancedResults {
    pub success: bool,
    /// Records in this page, not the filtered total.
    pub count: usize,
    pub pagination: Pagination,
    pub data: Vec<Document>,
}

/// Translates query-string parameters into one count and one windowed fetch against `collection`.
pub async fn advanced_results<A>(
    accessor: &A,
    params: &QueryParams,
    collection: &Collection,
    populate: &[Populate],
    options: &QueryConfig,
) -> Result<AdvancedResults, DatabaseError>
where
    A: DataAccessor + ?Sized,
{
    let parsed = ParsedQuery::from_params(params, collection, options.default_limit)?;
    let window = cap_window(parsed.window, options);

    let mut query = FindQuery::find(collection.name, parsed.filter)
        .select_fields(parsed.projection)
        .sort(parsed.sort);
    for relation in populate {
        query = query.populate(relation.clone());
    }
    let query = query.skip(window.skip()).limit(window.take());

    if options.debug_logging {
        tracing::debug!(collection = collection.name, ?query, "advanced results query");
    }

    let total = accessor.count_matching(collection.name, query.filter()).await?;
    let data = accessor.execute(&query).await?;

    Ok(AdvancedResults {
        success: true,
        count: data.len(),
        pagination: Pagination::for_window(&window, total),
        data,
    })
}

fn cap_window(window: PaginationWindow, options: &QueryConfig) -> PaginationWindow {
    match options.max_limit {
        Some(max) if window.limit > max => {
            tracing::warn!("Limit {} exceeds max {}, capping to max", window.limit, max);
            PaginationWindow::new(window.page, max)
        }
        _ => window,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::query::collection::FieldKind;
    use serde_json::json;

    static ITEMS: Collection = Collection {
        name: "items",
        fields: &[("n", FieldKind::Number), ("group", FieldKind::String)],
        unique: &[],
        hidden: &[],
    };

    static OWNERS: Collection = Collection::untyped("owners");

    fn options() -> QueryConfig {
        QueryConfig { default_limit: 25, max_limit: None, debug_logging: false }
    }

    async fn seeded(total: u64) -> MemoryStore {
        let store = MemoryStore::new();
        for n in 1..=total {
            let doc = json!({
                "_id": format!("00000000-0000-4000-8000-{:012}", n),
                "n": n,
                "group": if n % 2 == 0 { "even" } else { "odd" },
                "owner": "owner-1",
                "createdAt": format!("2024-01-01T00:00:{:02}Z", n),
            });
            store.insert("items", doc.as_object().cloned().unwrap()).await.unwrap();
        }
        store
    }

    async fn run(store: &MemoryStore, query: &str) -> AdvancedResults {
        advanced_results(store, &QueryParams::parse(query), &ITEMS, &[], &options()).await.unwrap()
    }

    fn numbers(results: &AdvancedResults) -> Vec<u64> {
        results.data.iter().map(|d| d["n"].as_u64().unwrap()).collect()
    }

    #[tokio::test]
    async fn middle_page_links_both_ways() {
        let store = seeded(25).await;
        let results = run(&store, "page=2&limit=10&sort=n").await;
        assert_eq!(numbers(&results), (11..=20).collect::<Vec<_>>());
        assert_eq!(results.count, 10);
        assert_eq!(results.pagination.prev, Some(PageLink { page: 1, limit: 10 }));
        assert_eq!(results.pagination.next, Some(PageLink { page: 3, limit: 10 }));
    }

    #[tokio::test]
    async fn single_full_page_has_no_links() {
        let store = seeded(25).await;
        let results = run(&store, "page=1&limit=25").await;
        assert_eq!(results.count, 25);
        assert_eq!(results.pagination, Pagination::default());
        let body = serde_json::to_value(&results).unwrap();
        assert_eq!(body["pagination"], json!({}));
    }

    #[tokio::test]
    async fn count_is_page_size_not_total() {
        let store = seeded(25).await;
        let results = run(&store, "page=3&limit=10").await;
        assert_eq!(results.count, 5);
        assert!(results.pagination.next.is_none());
        assert_eq!(results.pagination.prev, Some(PageLink { page: 2, limit: 10 }));
    }

    #[tokio::test]
    async fn default_sort_is_newest_first() {
        let store = seeded(3).await;
        let results = run(&store, "").await;
        assert_eq!(numbers(&results), vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn total_counts_filtered_set() {
        let store = seeded(25).await;
        // 12 even records; a page of 10 leaves a next link only because the filtered total is 12
        let results = run(&store, "group=even&limit=10&sort=n").await;
        assert_eq!(results.count, 10);
        assert!(results.data.iter().all(|d| d["group"] == "even"));
        assert_eq!(results.pagination.next, Some(PageLink { page: 2, limit: 10 }));

        let page_two = run(&store, "group=even&limit=10&page=2&sort=n").await;
        assert_eq!(page_two.count, 2);
        assert!(page_two.pagination.next.is_none());
    }

    #[tokio::test]
    async fn comparison_and_projection() {
        let store = seeded(25).await;
        let results = run(&store, "n[gt]=5&n[lte]=8&select=n&sort=-n").await;
        assert_eq!(numbers(&results), vec![8, 7, 6]);
        for doc in &results.data {
            let keys: Vec<&String> = doc.keys().collect();
            assert!(keys.iter().all(|k| *k == "_id" || *k == "n"), "unexpected keys {:?}", keys);
        }
    }

    #[tokio::test]
    async fn invalid_values_surface_as_query_errors() {
        let store = seeded(1).await;
        let err = advanced_results(&store, &QueryParams::parse("n[gt]=many"), &ITEMS, &[], &options())
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Query(_)));
    }

    #[tokio::test]
    async fn identical_requests_yield_identical_envelopes() {
        let store = seeded(25).await;
        let first = run(&store, "group=odd&page=2&limit=4&sort=-n").await;
        let second = run(&store, "group=odd&page=2&limit=4&sort=-n").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn limit_is_capped_by_configuration() {
        let store = seeded(25).await;
        let capped = QueryConfig { default_limit: 25, max_limit: Some(5), debug_logging: false };
        let results = advanced_results(&store, &QueryParams::parse("limit=100"), &ITEMS, &[], &capped)
            .await
            .unwrap();
        assert_eq!(results.count, 5);
        assert_eq!(results.pagination.next, Some(PageLink { page: 2, limit: 5 }));
    }

    #[tokio::test]
    async fn populates_relations() {
        let store = seeded(2).await;
        store
            .insert(
                OWNERS.name,
                json!({"_id": "owner-1", "name": "Ada", "email": "ada@example.com"}).as_object().cloned().unwrap(),
            )
            .await
            .unwrap();
        let relation = Populate::belongs_to("owner", "owners").select(&["name"]);
        let results = advanced_results(&store, &QueryParams::default(), &ITEMS, &[relation], &options())
            .await
            .unwrap();
        for doc in &results.data {
            assert_eq!(doc["owner"], json!({"_id": "owner-1", "name": "Ada"}));
        }
    }

    #[test]
    fn links_follow_window() {
        let links = Pagination::for_window(&PaginationWindow::new(1, 10), 0);
        assert_eq!(links, Pagination::default());
        let links = Pagination::for_window(&PaginationWindow::new(1, 10), 11);
        assert_eq!(links.next, Some(PageLink { page: 2, limit: 10 }));
        assert!(links.prev.is_none());
    }
}
