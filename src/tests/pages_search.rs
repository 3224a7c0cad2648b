use super::{at, Fixture};
use crate::{
    app::IndexOpts,
    pages::PageData,
    search::{ContentTypes, IncExc, PageSearchResult, SearchParams},
};

fn urls(result: &PageSearchResult) -> Vec<&str> {
    result.docs.iter().map(|doc| doc.url.as_str()).collect()
}

#[test]
fn test_blank_query_lists_every_page_by_activity() {
    let fx = Fixture::new();

    let result = fx.app.search_pages(&SearchParams::default()).unwrap();
    assert_eq!(urls(&result), vec!["lorem.com/ipsum", "annotation.url"]);
    assert_eq!(result.total_count, 2);
    assert!(result.results_exhausted);

    let lorem = &result.docs[0];
    assert_eq!(lorem.display_time, at(2, 1, 10));
    assert_eq!(lorem.hostname, "lorem.com");
    assert_eq!(lorem.full_url, "https://www.lorem.com/ipsum");
    assert!(!lorem.has_bookmark);

    let annotated = &result.docs[1];
    assert_eq!(annotated.display_time, at(1, 29, 10));
    assert_eq!(annotated.title.as_deref(), Some("Annotation page"));
    assert_eq!(annotated.annotations.len(), 3);
}

#[test]
fn test_page_text_matches() {
    let fx = Fixture::new();

    let result = fx.app.search_pages(&fx.query("lorem")).unwrap();
    assert_eq!(urls(&result), vec!["lorem.com/ipsum"]);
    // no annotation matched, so the doc carries the passing ones
    let annots: Vec<&str> = result.docs[0]
        .annotations
        .iter()
        .map(|view| view.annotation.url.as_str())
        .collect();
    assert_eq!(annots, vec![fx.hybrid.as_str()]);

    let only_annotations = SearchParams {
        content_types: ContentTypes {
            highlights: true,
            notes: true,
            pages: false,
        },
        ..fx.query("lorem")
    };
    assert!(fx.app.search_pages(&only_annotations).unwrap().docs.is_empty());
}

#[test]
fn test_pages_without_annotations() {
    let fx = Fixture::new();
    fx.app
        .index_page(
            PageData {
                full_url: "https://rust-lang.org/learn".to_string(),
                title: Some("Learn Rust".to_string()),
                text: Some("ownership and borrowing".to_string()),
                content_type: None,
            },
            Some(at(1, 10, 0)),
            IndexOpts::default(),
        )
        .unwrap();

    let result = fx.app.search_pages(&fx.query("borrowing")).unwrap();
    assert_eq!(urls(&result), vec!["rust-lang.org/learn"]);
    assert!(result.docs[0].annotations.is_empty());
    assert_eq!(result.docs[0].display_time, at(1, 10, 0));
}

#[test]
fn test_annotation_terms_find_their_pages() {
    let fx = Fixture::new();

    let result = fx.app.search_pages(&fx.query("term")).unwrap();
    assert_eq!(urls(&result), vec!["lorem.com/ipsum", "annotation.url"]);

    let annots: Vec<&str> = result.docs[1]
        .annotations
        .iter()
        .map(|view| view.annotation.url.as_str())
        .collect();
    assert_eq!(annots, vec![fx.comment.as_str()]);
}

#[test]
fn test_page_filters() {
    let fx = Fixture::new();

    let tagged = SearchParams {
        tags: IncExc {
            include: vec!["tag1".to_string()],
            exclude: vec![],
        },
        ..Default::default()
    };
    assert_eq!(
        urls(&fx.app.search_pages(&tagged).unwrap()),
        vec!["annotation.url"]
    );

    let in_coll2 = SearchParams {
        lists: vec![fx.coll2],
        ..Default::default()
    };
    assert_eq!(
        urls(&fx.app.search_pages(&in_coll2).unwrap()),
        vec!["annotation.url"]
    );

    let in_coll1 = SearchParams {
        lists: vec![fx.coll1],
        ..Default::default()
    };
    assert_eq!(fx.app.search_pages(&in_coll1).unwrap().docs.len(), 2);

    let on_lorem = SearchParams {
        domains: IncExc {
            include: vec!["lorem.com".to_string()],
            exclude: vec![],
        },
        ..Default::default()
    };
    assert_eq!(
        urls(&fx.app.search_pages(&on_lorem).unwrap()),
        vec!["lorem.com/ipsum"]
    );

    let recent = SearchParams {
        start_date: Some(at(1, 30, 0)),
        ..Default::default()
    };
    assert_eq!(
        urls(&fx.app.search_pages(&recent).unwrap()),
        vec!["lorem.com/ipsum"]
    );

    // annotation bookmarks do not make a page bookmarked
    let bookmarked = SearchParams {
        bookmarks_only: true,
        ..Default::default()
    };
    assert!(fx.app.search_pages(&bookmarked).unwrap().docs.is_empty());
}

#[test]
fn test_pagination_exhaustion() {
    let fx = Fixture::new();
    let page = |skip| {
        fx.app
            .search_pages(&SearchParams {
                limit: 1,
                skip,
                ..Default::default()
            })
            .unwrap()
    };

    let first = page(0);
    assert_eq!(urls(&first), vec!["lorem.com/ipsum"]);
    assert_eq!(first.total_count, 2);
    assert!(!first.results_exhausted);

    let second = page(1);
    assert_eq!(urls(&second), vec!["annotation.url"]);
    assert!(!second.results_exhausted);

    let third = page(2);
    assert!(third.docs.is_empty());
    assert!(third.results_exhausted);
}
