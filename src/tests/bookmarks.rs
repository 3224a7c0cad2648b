use std::sync::Arc;

use super::{at, create_app};
use crate::{
    db::{Collection, Filter, MemoryStore, ObjectStore},
    errors::StoreError,
    lists::SpecialList,
    search::SearchParams,
};

const URL: &str = "https://www.lorem.com/ipsum?utm_source=feed";

fn bookmarked_only() -> SearchParams {
    SearchParams {
        bookmarks_only: true,
        ..Default::default()
    }
}

#[test]
fn test_bookmark_scenario() {
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
    let app = create_app(store.clone());
    let time = at(1, 25, 12);

    app.add_page_bookmark(URL, Some(time)).unwrap();

    let bookmark = app.bookmarks.get_bookmark("lorem.com/ipsum").unwrap().unwrap();
    assert_eq!(bookmark.time, time);
    let visits = app.pages.get_visits(URL).unwrap();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].time, time);
    assert!(app.pages.get_page(URL).unwrap().unwrap().is_stub());

    let inbox = SpecialList::Inbox.id();
    assert_eq!(app.lists.get_list_ids_for_page(URL).unwrap(), vec![inbox]);

    let result = app.search_pages(&bookmarked_only()).unwrap();
    assert_eq!(result.docs.len(), 1);
    assert_eq!(result.docs[0].url, "lorem.com/ipsum");
    assert!(result.docs[0].has_bookmark);
    assert_eq!(result.docs[0].display_time, time);

    // the visit keeps the page alive
    assert!(!app.del_page_bookmark(URL).unwrap());
    assert!(app.search_pages(&bookmarked_only()).unwrap().docs.is_empty());
    assert!(app.pages.page_exists(URL).unwrap());

    assert!(matches!(
        app.del_page_bookmark(URL),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn test_second_bookmark_keeps_one_inbox_entry() {
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
    let app = create_app(store.clone());

    app.add_page_bookmark(URL, Some(at(1, 25, 12))).unwrap();
    app.del_page_bookmark(URL).unwrap();
    app.add_page_bookmark(URL, Some(at(1, 26, 12))).unwrap();
    app.add_page_bookmark(URL, Some(at(1, 27, 12))).unwrap();

    let entries = store
        .count_objects(
            Collection::PageListEntries,
            &Filter::eq("page_url", "lorem.com/ipsum"),
        )
        .unwrap();
    assert_eq!(entries, 1);
    assert_eq!(
        store
            .count_objects(Collection::Bookmarks, &Filter::all())
            .unwrap(),
        1
    );
    // one visit per bookmarking
    assert_eq!(app.pages.get_visits(URL).unwrap().len(), 3);
}

#[test]
fn test_unvisited_page_goes_with_its_bookmark() {
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
    let app = create_app(store.clone());

    app.add_page_bookmark(URL, Some(at(1, 25, 12))).unwrap();
    store
        .delete_all(Collection::Visits, &Filter::eq("url", "lorem.com/ipsum"))
        .unwrap();

    assert!(app.del_page_bookmark(URL).unwrap());
    assert!(!app.pages.page_exists(URL).unwrap());
}

#[test]
fn test_tab_bookmarks() {
    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
    let app = create_app(store);

    app.add_page_bookmark(URL, None).unwrap();

    let tabs = vec![
        "http://lorem.com/ipsum/".to_string(),
        "https://lorem.com/other".to_string(),
    ];
    let found = app.bookmarks.find_tab_bookmarks(&tabs).unwrap();
    assert_eq!(found.get(&tabs[0]), Some(&true));
    assert_eq!(found.get(&tabs[1]), Some(&false));
}
