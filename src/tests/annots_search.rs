use chrono::NaiveDate;

use super::{at, is_by_day, Fixture, PAGE_1, PAGE_2};
use crate::{
    errors::StoreError,
    search::{AnnotationsSearchResult, ContentTypes, IncExc, SearchParams, SearchRequest},
};

#[test]
fn test_terms_match_comments_and_bodies() {
    let fx = Fixture::new();

    assert_eq!(
        fx.find(fx.query("comment")),
        fx.sorted(&[&fx.annotation, &fx.comment])
    );
    assert_eq!(
        fx.find(fx.query("bla")),
        fx.sorted(&[&fx.annotation, &fx.hybrid])
    );
    assert_eq!(
        fx.find(fx.query("highlight")),
        fx.sorted(&[&fx.highlight, &fx.hybrid])
    );
    assert_eq!(
        fx.find(fx.query("term")),
        fx.sorted(&[&fx.comment, &fx.hybrid])
    );
}

#[test]
fn test_every_query_term_has_to_match() {
    let fx = Fixture::new();

    assert_eq!(fx.find(fx.query("bla term")), vec![fx.hybrid.clone()]);
    assert!(fx.find(fx.query("bla nothing")).is_empty());
    // case and punctuation are ignored
    assert_eq!(fx.find(fx.query("HYBRID,")), vec![fx.hybrid.clone()]);
}

#[test]
fn test_bookmarks_only() {
    let fx = Fixture::new();

    let params = SearchParams {
        bookmarks_only: true,
        ..fx.query("bla")
    };
    assert_eq!(fx.find(params), vec![fx.hybrid.clone()]);
}

#[test]
fn test_lists_intersect() {
    let fx = Fixture::new();

    let params = SearchParams {
        lists: vec![fx.coll1],
        ..fx.query("highlight")
    };
    assert_eq!(fx.find(params), fx.sorted(&[&fx.highlight, &fx.hybrid]));

    let params = SearchParams {
        lists: vec![fx.coll1, fx.coll2],
        ..fx.query("highlight")
    };
    assert_eq!(fx.find(params), vec![fx.highlight.clone()]);
}

#[test]
fn test_content_types_select_fields() {
    let fx = Fixture::new();

    let notes_only = SearchParams {
        content_types: ContentTypes {
            highlights: false,
            notes: true,
            pages: true,
        },
        ..fx.query("term")
    };
    assert_eq!(fx.find(notes_only), vec![fx.hybrid.clone()]);

    let highlights_only = SearchParams {
        content_types: ContentTypes {
            highlights: true,
            notes: false,
            pages: true,
        },
        ..fx.query("term")
    };
    assert_eq!(fx.find(highlights_only), vec![fx.comment.clone()]);

    let nothing = SearchParams {
        content_types: ContentTypes {
            highlights: false,
            notes: false,
            pages: true,
        },
        ..fx.query("term")
    };
    assert!(fx.find(nothing).is_empty());
}

#[test]
fn test_date_range() {
    let fx = Fixture::new();

    let from = SearchParams {
        start_date: Some(at(1, 30, 0)),
        ..Default::default()
    };
    assert_eq!(fx.find(from), vec![fx.hybrid.clone()]);

    let until = SearchParams {
        end_date: Some(at(1, 26, 0)),
        ..Default::default()
    };
    assert_eq!(fx.find(until), vec![fx.highlight.clone()]);

    let between = SearchParams {
        start_date: Some(at(1, 25, 0)),
        end_date: Some(at(1, 28, 23)),
        ..Default::default()
    };
    assert_eq!(fx.find(between), fx.sorted(&[&fx.comment, &fx.highlight]));
}

#[test]
fn test_inverted_date_range_is_rejected() {
    let fx = Fixture::new();

    let params = SearchParams {
        start_date: Some(at(1, 28, 0)),
        end_date: Some(at(1, 25, 0)),
        ..Default::default()
    };
    assert!(matches!(
        fx.app.search_annotations(&params),
        Err(StoreError::Validation(_))
    ));
}

#[test]
fn test_tags_and_domains() {
    let fx = Fixture::new();

    let tagged = SearchParams {
        tags: IncExc {
            include: vec!["tag1".to_string()],
            exclude: vec![],
        },
        ..Default::default()
    };
    assert_eq!(fx.find(tagged), vec![fx.annotation.clone()]);

    let untagged = SearchParams {
        tags: IncExc {
            include: vec![],
            exclude: vec!["tag2".to_string()],
        },
        ..fx.query("bla")
    };
    assert_eq!(fx.find(untagged), vec![fx.hybrid.clone()]);

    let on_lorem = SearchParams {
        domains: IncExc {
            include: vec!["lorem.com".to_string()],
            exclude: vec![],
        },
        ..Default::default()
    };
    assert_eq!(fx.find(on_lorem), vec![fx.hybrid.clone()]);

    let not_on_lorem = SearchParams {
        domains: IncExc {
            include: vec![],
            exclude: vec!["www.lorem.com".to_string()],
        },
        ..fx.query("term")
    };
    assert_eq!(fx.find(not_on_lorem), vec![fx.comment.clone()]);
}

#[test]
fn test_blank_query_groups_by_day() {
    let fx = Fixture::new();

    let result = fx.app.search_annotations(&SearchParams::default()).unwrap();
    let AnnotationsSearchResult::ByDay {
        annots_by_day,
        results_exhausted,
    } = result
    else {
        panic!("expected day buckets");
    };

    assert!(results_exhausted);
    let days: Vec<NaiveDate> = annots_by_day.iter().map(|bucket| bucket.day).collect();
    assert_eq!(
        days,
        vec![
            NaiveDate::from_ymd_opt(2019, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2019, 1, 29).unwrap(),
            NaiveDate::from_ymd_opt(2019, 1, 28).unwrap(),
            NaiveDate::from_ymd_opt(2019, 1, 25).unwrap(),
        ]
    );
    assert_eq!(annots_by_day[0].pages[0].page_url, "lorem.com/ipsum");
    assert_eq!(annots_by_day[1].pages[0].page_url, "annotation.url");
    assert_eq!(annots_by_day[1].pages[0].annotations[0].annotation.url, fx.annotation);
}

#[test]
fn test_blank_query_paginates_annotations() {
    let fx = Fixture::new();

    let first = fx
        .app
        .search_annotations(&SearchParams {
            limit: 2,
            ..Default::default()
        })
        .unwrap();
    assert!(is_by_day(&first));
    assert!(!first.results_exhausted());
    let urls: Vec<&str> = first
        .annotations()
        .into_iter()
        .map(|view| view.annotation.url.as_str())
        .collect();
    assert_eq!(urls, vec![fx.hybrid.as_str(), fx.annotation.as_str()]);

    let second = fx
        .app
        .search_annotations(&SearchParams {
            limit: 2,
            skip: 2,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(second.annotations().len(), 2);
    assert!(!second.results_exhausted());

    let third = fx
        .app
        .search_annotations(&SearchParams {
            limit: 2,
            skip: 4,
            ..Default::default()
        })
        .unwrap();
    assert!(third.annotations().is_empty());
    assert!(third.results_exhausted());
}

#[test]
fn test_query_groups_into_page_docs() {
    let fx = Fixture::new();

    let result = fx.app.search_annotations(&fx.query("term")).unwrap();
    let AnnotationsSearchResult::Docs {
        docs,
        total_count,
        results_exhausted,
    } = result
    else {
        panic!("expected page docs");
    };

    assert_eq!(total_count, 2);
    assert!(results_exhausted);
    // newest matching annotation first
    assert_eq!(docs[0].url, "lorem.com/ipsum");
    assert_eq!(docs[0].title.as_deref(), Some("Lorem ipsum"));
    assert_eq!(docs[1].url, "annotation.url");
    assert_eq!(docs[1].annotations.len(), 1);
    assert_eq!(docs[1].annotations[0].annotation.url, fx.comment);
    assert_eq!(docs[1].lists.len(), 2);
}

#[test]
fn test_results_carry_sharing_state() {
    let fx = Fixture::new();

    let result = fx.app.search_annotations(&SearchParams::default()).unwrap();
    let views = result.annotations();
    let view = |url: &String| {
        views
            .iter()
            .find(|view| &view.annotation.url == url)
            .copied()
            .unwrap()
    };

    let highlight = view(&fx.highlight);
    assert!(highlight.is_shared);
    assert!(highlight.is_bulk_share_protected);
    assert!(highlight.has_bookmark);
    assert_eq!(highlight.lists.len(), 2);

    let annotation = view(&fx.annotation);
    assert!(annotation.is_shared);
    assert!(!annotation.is_bulk_share_protected);
    assert_eq!(annotation.tags, vec!["tag1", "tag2"]);

    let hybrid = view(&fx.hybrid);
    assert!(!hybrid.is_shared);
    assert!(hybrid.is_bulk_share_protected);

    let comment = view(&fx.comment);
    assert!(!comment.is_shared);
    assert!(!comment.has_bookmark);
}

#[test]
fn test_annotations_by_url() {
    let fx = Fixture::new();

    let views = fx
        .app
        .get_all_annotations_by_url(
            "http://annotation.url/?utm_source=feed",
            SearchRequest::default(),
        )
        .unwrap();
    let urls: Vec<&str> = views.iter().map(|v| v.annotation.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            fx.annotation.as_str(),
            fx.comment.as_str(),
            fx.highlight.as_str()
        ]
    );

    let views = fx
        .app
        .get_all_annotations_by_url(
            PAGE_1,
            SearchRequest {
                limit: Some(1),
                skip: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].annotation.url, fx.comment);
}

#[test]
fn test_annotations_by_url_filters() {
    let fx = Fixture::new();
    let by_url = |url: &str, request: SearchRequest| -> Vec<String> {
        let mut urls: Vec<String> = fx
            .app
            .get_all_annotations_by_url(url, request)
            .unwrap()
            .into_iter()
            .map(|view| view.annotation.url)
            .collect();
        urls.sort();
        urls
    };

    let bookmarked = SearchRequest {
        bookmarks_only: true,
        ..Default::default()
    };
    assert_eq!(by_url(PAGE_1, bookmarked), vec![fx.highlight.clone()]);

    let tagged = SearchRequest {
        tags_inc: vec!["tag1".to_string()],
        ..Default::default()
    };
    assert_eq!(by_url(PAGE_1, tagged), vec![fx.annotation.clone()]);

    // a page carrying an excluded tag lists nothing, untagged annotations included
    let excluded = SearchRequest {
        tags_exc: vec!["tag1".to_string(), "tag2".to_string(), "dummy".to_string()],
        ..Default::default()
    };
    assert!(by_url(PAGE_1, excluded).is_empty());
    let excluded_elsewhere = SearchRequest {
        tags_exc: vec!["tag1".to_string()],
        ..Default::default()
    };
    assert_eq!(by_url(PAGE_2, excluded_elsewhere), vec![fx.hybrid.clone()]);

    let in_coll1 = SearchRequest {
        collections: vec![fx.coll1],
        ..Default::default()
    };
    assert_eq!(
        by_url(PAGE_1, in_coll1.clone()),
        fx.sorted(&[&fx.highlight, &fx.annotation, &fx.comment])
    );
    assert_eq!(by_url(PAGE_2, in_coll1), vec![fx.hybrid.clone()]);

    let in_both = SearchRequest {
        collections: vec![fx.coll1, fx.coll2],
        ..Default::default()
    };
    assert_eq!(
        by_url(PAGE_1, in_both.clone()),
        fx.sorted(&[&fx.highlight, &fx.annotation, &fx.comment])
    );
    assert!(by_url(PAGE_2, in_both).is_empty());
}

#[test]
fn test_stop_word_query_keeps_the_docs_shape() {
    let fx = Fixture::new();

    let result = fx.app.search_annotations(&fx.query("the a")).unwrap();
    assert!(!is_by_day(&result));
    // no searchable term is left, so every annotation matches
    assert_eq!(
        fx.find(fx.query("the a")),
        fx.sorted(&[&fx.highlight, &fx.annotation, &fx.comment, &fx.hybrid])
    );
}
