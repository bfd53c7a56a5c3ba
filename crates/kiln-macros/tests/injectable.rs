//! Integration tests for the `#[injectable]` macro.
//!
//! These tests check that generated callables declare the right
//! parameters and resolve through a real `Resolver`.

use std::sync::Arc;

use http::StatusCode;
use kiln_core::{
    Callable, Component, InstanceMap, KilnError, KilnResult, Provider, QueryParams, Reply,
    Resolver,
};
use kiln_extract::{QueryParam, QueryParamComponent};
use kiln_macros::injectable;
use serde_json::json;

#[derive(Debug)]
struct Accounts {
    names: Vec<&'static str>,
}

#[injectable]
fn list_accounts(accounts: Arc<Accounts>, prefix: Option<QueryParam>) -> Result<Reply, KilnError> {
    let names: Vec<&str> = accounts
        .names
        .iter()
        .copied()
        .filter(|name| prefix.as_ref().map_or(true, |p| name.starts_with(p.as_str())))
        .collect();
    Reply::serialize(&names)
}

#[injectable(name = "count")]
fn count_accounts(accounts: Option<Arc<Accounts>>) -> KilnResult<usize> {
    Ok(accounts.map_or(0, |a| a.names.len()))
}

#[injectable]
fn page_size(size: QueryParam) -> Result<u32, anyhow::Error> {
    Ok(size.parse::<u32>()?)
}

fn accounts_component() -> Arc<dyn Component> {
    Arc::new(
        Provider::<Accounts>::new(Callable::builder("accounts").build(|_| {
            Ok(Accounts {
                names: vec!["alice", "bob", "alfred"],
            })
        }))
        .singleton(),
    )
}

fn resolver(query: &str, components: Vec<Arc<dyn Component>>) -> Resolver {
    let mut instances = InstanceMap::new();
    instances.insert(QueryParams::parse(query));
    let mut all = components;
    all.push(Arc::new(QueryParamComponent));
    Resolver::new(all, instances)
}

#[test]
fn test_parameters_follow_signature() {
    let handler = list_accounts();
    assert_eq!(handler.name(), "list_accounts");

    let params = handler.parameters();
    assert_eq!(params.len(), 2);
    assert_eq!(params[0].name(), "accounts");
    assert!(params[0].is::<Accounts>());
    assert!(!params[0].is_optional());
    assert_eq!(params[1].name(), "prefix");
    assert!(params[1].is::<QueryParam>());
    assert!(params[1].is_optional());
}

#[test]
fn test_resolves_shared_and_optional_arguments() {
    let handler = list_accounts();

    let all = resolver("", vec![accounts_component()]).call(&handler).unwrap();
    assert_eq!(all, Reply::ok(json!(["alice", "bob", "alfred"])));

    let filtered = resolver("prefix=al", vec![accounts_component()])
        .call(&handler)
        .unwrap();
    assert_eq!(filtered, Reply::ok(json!(["alice", "alfred"])));
}

#[test]
fn test_custom_name() {
    let handler = count_accounts();
    assert_eq!(handler.name(), "count");
    assert_eq!(resolver("", vec![accounts_component()]).call(&handler).unwrap(), 3);
}

#[test]
fn test_missing_required_argument() {
    let err = resolver("", Vec::new()).call(&list_accounts()).unwrap_err();
    assert!(matches!(err, KilnError::DependencyResolution { ref function, .. } if function == "list_accounts"));
}

#[test]
fn test_foreign_errors_convert() {
    assert_eq!(resolver("size=25", Vec::new()).call(&page_size()).unwrap(), 25);

    let err = resolver("size=many", Vec::new()).call(&page_size()).unwrap_err();
    assert!(matches!(err, KilnError::Other(_)));
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}
