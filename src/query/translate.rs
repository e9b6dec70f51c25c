//! Translation between external paths and canonical metric ids
//!
//! The store only knows canonical ids. Externally a leaf carries one extra
//! trailing segment: a submetric alias such as `_avg`, the enum token, or an
//! enum value.
//!
//! ```text
//! mode     selector          node path        matched by
//! plain    Default           a.b.c            a.b.c
//! plain    Enum("v1")        a.b.c.v1         a.b.c.v1
//! aliased  Alias("_avg")     a.b.c._avg       a.b.c._avg
//! aliased  Alias("_enum")    a.b.c._enum      a.b.c._enum
//! aliased  Enum("v1")        a.b.c.v1         a.b.c.v1._enum
//! ```
//!
//! In aliased mode enum values are only reachable by naming the enum token
//! after them; the token itself is not part of the node path.

use std::collections::BTreeMap;
use tracing::warn;

use crate::query::data_key::DataKey;
use crate::query::error::{QueryError, QueryResult};
use crate::query::path::MetricPath;

/// Which part of a sample a leaf reads
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Selector {
    /// First available field of the default preference list
    Default,
    /// The field mapped to this alias token, or the rollup's default field
    /// for the enum token
    Alias(String),
    /// A named counter of an enum metric
    Enum(String),
}

/// Alias table for aliased mode
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmetricAliases {
    /// Alias token to sample field name
    aliases: BTreeMap<String, String>,
    /// Token selecting enum values
    enum_token: Option<String>,
}

impl SubmetricAliases {
    pub fn new(aliases: BTreeMap<String, String>, enum_token: Option<String>) -> QueryResult<Self> {
        for (token, field) in &aliases {
            if !is_segment(token) {
                return Err(QueryError::Configuration(format!(
                    "invalid alias token: {:?}",
                    token
                )));
            }
            if field.is_empty() {
                return Err(QueryError::Configuration(format!(
                    "alias {} maps to an empty field name",
                    token
                )));
            }
        }
        if let Some(token) = &enum_token {
            if !is_segment(token) {
                return Err(QueryError::Configuration(format!(
                    "invalid enum token: {:?}",
                    token
                )));
            }
            if aliases.contains_key(token) {
                return Err(QueryError::Configuration(format!(
                    "enum token {} is also an alias",
                    token
                )));
            }
        }
        Ok(Self {
            aliases,
            enum_token,
        })
    }

    /// Field aliases in sorted order
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.aliases.keys().map(String::as_str)
    }

    /// Every token that ends a leaf path: the aliases, then the enum token
    pub fn leaf_tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens().chain(self.enum_token())
    }

    pub fn field(&self, token: &str) -> Option<&str> {
        self.aliases.get(token).map(String::as_str)
    }

    pub fn is_alias(&self, token: &str) -> bool {
        self.aliases.contains_key(token)
    }

    pub fn enum_token(&self) -> Option<&str> {
        self.enum_token.as_deref()
    }

    pub fn is_enum_token(&self, token: &str) -> bool {
        self.enum_token.as_deref() == Some(token)
    }

    pub fn is_leaf_token(&self, token: &str) -> bool {
        self.is_alias(token) || self.is_enum_token(token)
    }
}

fn is_segment(s: &str) -> bool {
    !s.is_empty() && !s.contains('.')
}

/// One external leaf of a canonical metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLeaf {
    /// Node path reported to callers
    pub path: MetricPath,
    /// Path a query has to match to reach the leaf
    pub query_path: MetricPath,
}

impl ExternalLeaf {
    fn visible(path: MetricPath) -> Self {
        Self {
            query_path: path.clone(),
            path,
        }
    }

    /// Whether the leaf is reached only through an explicit token and so
    /// never shows up as a branch of a shorter query
    pub fn is_hidden(&self) -> bool {
        self.path != self.query_path
    }
}

/// Path translation mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathTranslator {
    /// No aliases; enum values appear as one extra segment
    Plain,
    /// Every metric is exposed once per alias
    Aliased(SubmetricAliases),
}

impl PathTranslator {
    pub fn aliases(&self) -> Option<&SubmetricAliases> {
        match self {
            PathTranslator::Plain => None,
            PathTranslator::Aliased(aliases) => Some(aliases),
        }
    }

    /// Split an external node path into its canonical id and selector
    ///
    /// `parent_enum_values` are the enum values known for the path's parent
    /// metric. A trailing segment found there is read as an enum value,
    /// which is what lets plain-mode enum leaves translate back.
    pub fn to_canonical(
        &self,
        path: &MetricPath,
        parent_enum_values: &[String],
    ) -> (MetricPath, Selector) {
        let Some(parent) = path.parent() else {
            return (path.clone(), Selector::Default);
        };
        let last = path.last();

        if let Some(aliases) = self.aliases() {
            if aliases.is_leaf_token(last) {
                return (parent, Selector::Alias(last.to_string()));
            }
        }
        if parent_enum_values.iter().any(|v| v == last) {
            return (parent, Selector::Enum(last.to_string()));
        }
        (path.clone(), Selector::Default)
    }

    /// External node path of a canonical id under `selector`
    ///
    /// Fails for combinations that [`to_canonical`](Self::to_canonical)
    /// could not read back, such as an enum value equal to an alias.
    pub fn to_external(&self, canonical: &MetricPath, selector: &Selector) -> QueryResult<MetricPath> {
        match (self, selector) {
            (PathTranslator::Plain, Selector::Default) => Ok(canonical.clone()),
            (PathTranslator::Aliased(aliases), Selector::Default) => {
                if aliases.is_leaf_token(canonical.last()) {
                    return Err(QueryError::Configuration(format!(
                        "metric {} ends in a submetric token",
                        canonical
                    )));
                }
                Ok(canonical.clone())
            }
            (PathTranslator::Plain, Selector::Alias(token)) => Err(QueryError::Configuration(
                format!("alias {} used without submetric aliases enabled", token),
            )),
            (PathTranslator::Aliased(aliases), Selector::Alias(token)) => {
                if aliases.is_leaf_token(token) {
                    Ok(canonical.child(token.clone()))
                } else {
                    Err(QueryError::Configuration(format!("unknown alias: {}", token)))
                }
            }
            (_, Selector::Enum(value)) => {
                if !is_segment(value) {
                    return Err(QueryError::InvalidPath(format!("{}.{}", canonical, value)));
                }
                if self.aliases().is_some_and(|a| a.is_leaf_token(value)) {
                    return Err(QueryError::Configuration(format!(
                        "enum value {} of {} collides with a submetric token",
                        value, canonical
                    )));
                }
                Ok(canonical.child(value.clone()))
            }
        }
    }

    /// Every external leaf of a canonical metric
    ///
    /// Plain mode exposes the metric itself, or one leaf per enum value.
    /// Aliased mode exposes one leaf per alias and enum token, plus one
    /// hidden leaf per enum value. Enum values that cannot be translated are
    /// skipped.
    pub fn external_leaves(&self, canonical: &MetricPath, enum_values: &[String]) -> Vec<ExternalLeaf> {
        let mut selectors: Vec<Selector> = match self {
            PathTranslator::Plain if enum_values.is_empty() => vec![Selector::Default],
            PathTranslator::Plain => Vec::new(),
            PathTranslator::Aliased(aliases) => aliases
                .leaf_tokens()
                .map(|t| Selector::Alias(t.to_string()))
                .collect(),
        };
        selectors.extend(enum_values.iter().map(|v| Selector::Enum(v.clone())));

        let enum_token = self.aliases().and_then(SubmetricAliases::enum_token);
        selectors
            .into_iter()
            .filter_map(|selector| match self.to_external(canonical, &selector) {
                Ok(path) => Some(match (&selector, enum_token) {
                    (Selector::Enum(_), Some(token)) => ExternalLeaf {
                        query_path: path.child(token),
                        path,
                    },
                    _ => ExternalLeaf::visible(path),
                }),
                Err(e) => {
                    warn!(metric = %canonical, "Skipping leaf: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Sample key for a selector
    pub fn data_key(&self, selector: &Selector, default_keys: &[String]) -> QueryResult<DataKey> {
        match selector {
            Selector::Default => Ok(DataKey::Plain(default_keys.to_vec())),
            Selector::Enum(value) => Ok(DataKey::Enum(value.clone())),
            Selector::Alias(token) => {
                let aliases = self.aliases().ok_or_else(|| {
                    QueryError::Configuration(format!("unknown alias: {}", token))
                })?;
                match aliases.field(token) {
                    Some(field) => Ok(DataKey::field(field)),
                    None if aliases.is_enum_token(token) => Ok(DataKey::Plain(default_keys.to_vec())),
                    None => Err(QueryError::Configuration(format!("unknown alias: {}", token))),
                }
            }
        }
    }
}
