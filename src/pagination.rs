//! Cursor-based pagination over listing queries.
//!
//! A [`PaginationAdapter`] is a named strategy describing how to walk a
//! paginated listing to completion. The sourcing engine only looks at the
//! two fields of [`PageState`]; everything else about continuation is the
//! adapter's business.
//!
//! Listing responses follow one wire contract:
//!
//! ```json
//! { "items": [ { "handle": "shirt", ... } ], "nextToken": "opaque-or-null" }
//! ```

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::model::item::HANDLE_FIELD;
use crate::model::{NaturalKey, RawItem};

/// Number of items requested per page.
pub const PAGE_SIZE: usize = 100;

/// Field of a listing payload holding the page's items.
pub const ITEMS_FIELD: &str = "items";

/// Field of a listing payload holding the continuation token.
pub const NEXT_TOKEN_FIELD: &str = "nextToken";

/// Variables for the next request and whether another request is needed.
#[derive(Debug, Clone, PartialEq)]
pub struct PageState {
    pub variables: Map<String, Value>,
    pub has_next_page: bool,
}

/// One fetched page of a listing.
///
/// Every item is guaranteed to carry a natural key for `remote_type`.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    remote_type: String,
    items: Vec<RawItem>,
    next_token: Option<String>,
}

impl Page {
    /// Build a page, checking that every item has a natural key.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPage` naming the first item without a key.
    pub fn new(
        operation: &str,
        remote_type: &str,
        items: Vec<RawItem>,
        next_token: Option<String>,
    ) -> Result<Self> {
        if let Some(position) = items
            .iter()
            .position(|item| item.natural_key(remote_type).is_none())
        {
            return Err(Error::MalformedPage {
                operation: operation.to_string(),
                reason: format!(
                    "item {position} has no `{HANDLE_FIELD}` to key it by"
                ),
            });
        }

        Ok(Self {
            remote_type: remote_type.to_string(),
            items,
            next_token,
        })
    }

    /// Parse the listing payload found under `root_field` of a response.
    ///
    /// An absent or null `nextToken` means there are no further pages. A
    /// missing or non-array `items`, a non-object item or a non-string token
    /// is a malformed page; nothing is coerced.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPage` if the payload does not match the contract.
    pub fn from_response(
        data: &Value,
        operation: &str,
        root_field: &str,
        remote_type: &str,
    ) -> Result<Self> {
        let malformed = |reason: String| Error::MalformedPage {
            operation: operation.to_string(),
            reason,
        };

        let payload = data
            .get(root_field)
            .and_then(Value::as_object)
            .ok_or_else(|| malformed(format!("`{root_field}` is missing or not an object")))?;

        let items = payload
            .get(ITEMS_FIELD)
            .and_then(Value::as_array)
            .ok_or_else(|| malformed(format!("`{root_field}.{ITEMS_FIELD}` is missing or not a list")))?
            .iter()
            .enumerate()
            .map(|(i, value)| {
                RawItem::from_value(value.clone())
                    .ok_or_else(|| malformed(format!("item {i} is not an object")))
            })
            .collect::<Result<Vec<_>>>()?;

        let next_token = match payload.get(NEXT_TOKEN_FIELD) {
            None | Some(Value::Null) => None,
            Some(Value::String(token)) => Some(token.clone()),
            Some(other) => {
                return Err(malformed(format!(
                    "`{root_field}.{NEXT_TOKEN_FIELD}` must be a string or null, got {other}"
                )));
            }
        };

        Self::new(operation, remote_type, items, next_token)
    }

    #[must_use]
    pub fn remote_type(&self) -> &str {
        &self.remote_type
    }

    #[must_use]
    pub fn items(&self) -> &[RawItem] {
        &self.items
    }

    #[must_use]
    pub fn next_token(&self) -> Option<&str> {
        self.next_token.as_deref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn into_keyed_items(self) -> impl Iterator<Item = (NaturalKey, RawItem)> {
        let remote_type = self.remote_type;
        self.items
            .into_iter()
            .filter_map(move |item| item.natural_key(&remote_type).map(|key| (key, item)))
    }
}

/// Items gathered across all pages of one entity type so far.
///
/// Keys are natural keys, so a later page's item with the same
/// (type, handle, locale) replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccumulatedResult {
    pub items: BTreeMap<NaturalKey, RawItem>,
    pub cursor: Option<String>,
}

impl AccumulatedResult {
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Either a single page or a whole accumulator, for [`PaginationAdapter::get_items`].
#[derive(Debug, Clone, Copy)]
pub enum Paged<'a> {
    Page(&'a Page),
    Accumulated(&'a AccumulatedResult),
}

impl<'a> From<&'a Page> for Paged<'a> {
    fn from(page: &'a Page) -> Self {
        Self::Page(page)
    }
}

impl<'a> From<&'a AccumulatedResult> for Paged<'a> {
    fn from(result: &'a AccumulatedResult) -> Self {
        Self::Accumulated(result)
    }
}

/// Strategy for walking a paginated listing.
///
/// All operations are pure: they derive new values from their inputs and
/// never perform I/O.
pub trait PaginationAdapter: Send + Sync {
    /// Adapter name, for logs.
    fn name(&self) -> &str;

    /// Variable names a listing query must declare to be walked by this adapter.
    fn expected_variable_names(&self) -> &[&str];

    /// Initial request variables, with `has_next_page` set.
    fn start(&self) -> PageState;

    /// Variables for the request after `page`, and whether to make it.
    fn next(&self, state: &PageState, page: &Page) -> PageState;

    /// Fold a page into the accumulator.
    fn concat(&self, acc: AccumulatedResult, page: Page) -> AccumulatedResult;

    /// Project a page or an accumulator down to its items.
    fn get_items<'a>(&self, source: Paged<'a>) -> Vec<&'a RawItem> {
        match source {
            Paged::Page(page) => page.items().iter().collect(),
            Paged::Accumulated(result) => result.items.values().collect(),
        }
    }
}

/// Nacelle's `first`/`after` token pagination.
#[derive(Debug, Clone)]
pub struct NacellePagination {
    page_size: usize,
}

impl NacellePagination {
    #[must_use]
    pub fn new() -> Self {
        Self { page_size: PAGE_SIZE }
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn variables(&self, after: Option<&str>) -> Map<String, Value> {
        let mut variables = Map::new();
        variables.insert("first".to_string(), Value::from(self.page_size));
        if let Some(token) = after {
            variables.insert("after".to_string(), Value::from(token));
        }
        variables
    }
}

impl Default for NacellePagination {
    fn default() -> Self {
        Self::new()
    }
}

impl PaginationAdapter for NacellePagination {
    fn name(&self) -> &str {
        "NacellePagination"
    }

    fn expected_variable_names(&self) -> &[&str] {
        &["first", "after"]
    }

    fn start(&self) -> PageState {
        PageState {
            variables: self.variables(None),
            has_next_page: true,
        }
    }

    fn next(&self, _state: &PageState, page: &Page) -> PageState {
        // A short page ends the walk even if the source still hands out a token.
        PageState {
            variables: self.variables(page.next_token()),
            has_next_page: page.next_token().is_some() && page.len() == self.page_size,
        }
    }

    fn concat(&self, mut acc: AccumulatedResult, page: Page) -> AccumulatedResult {
        acc.cursor = page.next_token.clone();
        acc.items.extend(page.into_keyed_items());
        acc
    }
}
