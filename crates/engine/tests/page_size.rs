use tether_engine::{
    BindingConfig, CollectionProps, DEFAULT_PAGE_SIZE, bind_collection, bind_collection_with, default_page_size, reset_default_page_size,
    set_default_page_size,
};
use tether_types::QueryDescriptor;

// One test only: the process-wide default is shared by every test in this binary.
#[test]
fn process_default_only_seeds_views_without_explicit_configuration() {
    let query = || QueryDescriptor::new("Person").select("name");
    let render = |_props: &CollectionProps| ();
    assert_eq!(default_page_size(), DEFAULT_PAGE_SIZE);

    set_default_page_size(5);
    let seeded = bind_collection("NameList", query(), render).expect("declare");
    let limited = bind_collection("NameList", query().with_limit(2), render).expect("declare");
    let explicit = bind_collection_with("NameList", query(), BindingConfig::with_page_size(7), render).expect("declare");
    assert_eq!(seeded.metadata().initial_limit(), 5);
    assert_eq!(limited.metadata().initial_limit(), 2);
    assert_eq!(explicit.metadata().initial_limit(), 7);

    reset_default_page_size();
    assert_eq!(default_page_size(), 12);
    assert_eq!(BindingConfig::default().default_page_size, 12);
    assert_eq!(seeded.metadata().initial_limit(), 5);
}
