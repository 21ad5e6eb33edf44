//! Raw remote items and their natural keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding a handle-keyed entity's handle.
pub const HANDLE_FIELD: &str = "handle";
/// Field holding a handle-keyed entity's locale.
pub const LOCALE_FIELD: &str = "locale";
/// Field the remote id of a singleton is read from first.
pub const REMOTE_ID_FIELD: &str = "remoteId";
/// Fallback field for the remote id of a singleton.
pub const ID_FIELD: &str = "id";

/// One entity instance as returned by the remote source.
///
/// An arbitrary field-value mapping. Keys are kept sorted, which makes the
/// JSON encoding (and the content digest) independent of response order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawItem(Map<String, Value>);

impl RawItem {
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build an item from a JSON value, if the value is an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    /// String value of a field, if present and a string.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Derive the natural key of a multi-instance item within `remote_type`.
    ///
    /// Keyed by (type, handle, locale); a null or absent locale is part of
    /// the key as `None`. Returns `None` for an item without a handle.
    #[must_use]
    pub fn natural_key(&self, remote_type: &str) -> Option<NaturalKey> {
        self.get_str(HANDLE_FIELD).map(|handle| NaturalKey::Handle {
            remote_type: remote_type.to_string(),
            handle: handle.to_string(),
            locale: self.get_str(LOCALE_FIELD).map(str::to_string),
        })
    }

    /// Key of a singleton item: its type and remote id.
    #[must_use]
    pub fn singleton_key(&self, remote_type: &str) -> Option<NaturalKey> {
        self.remote_id().map(|remote_id| NaturalKey::RemoteId {
            remote_type: remote_type.to_string(),
            remote_id,
        })
    }

    /// Remote id of the item, read from `remoteId` or `id`.
    ///
    /// Numeric ids are rendered in their decimal form.
    #[must_use]
    pub fn remote_id(&self) -> Option<String> {
        [REMOTE_ID_FIELD, ID_FIELD]
            .iter()
            .filter_map(|field| self.0.get(*field))
            .find_map(|value| match value {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }
}

impl From<Map<String, Value>> for RawItem {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// The field combination that uniquely identifies an instance within its type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NaturalKey {
    /// Multi-instance entities: (type, handle, locale).
    Handle {
        remote_type: String,
        handle: String,
        locale: Option<String>,
    },
    /// Singletons: (type, remote id).
    RemoteId {
        remote_type: String,
        remote_id: String,
    },
}

impl NaturalKey {
    #[must_use]
    pub fn remote_type(&self) -> &str {
        match self {
            Self::Handle { remote_type, .. } | Self::RemoteId { remote_type, .. } => remote_type,
        }
    }

    /// Stable node id: the type name followed by the key values.
    ///
    /// `Product` + `shirt` + `en-us` gives `Productshirten-us`; a missing
    /// locale contributes nothing.
    #[must_use]
    pub fn node_id(&self) -> String {
        match self {
            Self::Handle {
                remote_type,
                handle,
                locale,
            } => format!("{remote_type}{handle}{}", locale.as_deref().unwrap_or_default()),
            Self::RemoteId {
                remote_type,
                remote_id,
            } => format!("{remote_type}{remote_id}"),
        }
    }
}
